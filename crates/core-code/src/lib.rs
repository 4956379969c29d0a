//! Machine instruction alphabet, option symbols, and pure encoders.
//!
//! Everything the rest of the pipeline writes into a raster cell comes from
//! this crate: the sealed `Instr` byte alphabet, the `Direction` codes, the
//! `OptionKey` symbols addressing the margin option bars, and the pure
//! encoding functions (`transfer_code`, `transfer_type`, cross helpers).
//!
//! Invariants:
//! * Every `Instr` value carries a fixed side (front / back / both / none)
//!   and a fixed bed-state effect (none / same / opposite / both); the caster
//!   consults only these attributes when updating occupancy.
//! * Code families never overlap: knit, tuck, miss, cross, move (61..97),
//!   transfer (20..90), split (101..129), link-process (99), carrier
//!   position (13), cross joint (150).
//! * Encoders are total over their validated domain and never write state;
//!   out-of-range requests surface as `CodeError`, not panics.

mod encode;
mod instr;
mod options;

pub use encode::{
    CodeError, cross_code, cross_complement, direction_between, split_shift_code, transfer_code,
};
pub use instr::{BedEffect, CodeSide, Instr};
pub use options::{LineOptions, MarginSide, OptionKey, carriage, dscs, presser, tension, yarn};

/// Needle bed side. The machine has exactly two beds facing each other;
/// `flip` crosses to the opposing bed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Side {
    Front,
    Back,
}

impl Side {
    pub fn flip(self) -> Self {
        match self {
            Side::Front => Side::Back,
            Side::Back => Side::Front,
        }
    }

    pub fn is_front(self) -> bool {
        matches!(self, Side::Front)
    }
}

/// Carrier travel direction for one raster line.
///
/// The numeric values double as the R5 "independent direction" option values
/// (6 / 7) and the knit-cancel marker (1); `code` returns the raw byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Knit-cancel line: loops move between beds, the carrier stands still.
    Transfer,
    Left,
    Right,
}

impl Direction {
    pub fn code(self) -> u8 {
        match self {
            Direction::Transfer => 1,
            Direction::Left => 6,
            Direction::Right => 7,
        }
    }

    /// The opposite travel direction. Transfer lines have no travel, so they
    /// flip to themselves.
    pub fn flip(self) -> Self {
        match self {
            Direction::Transfer => Direction::Transfer,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    pub fn is_transfer(self) -> bool {
        matches!(self, Direction::Transfer)
    }

    /// Signed needle step for one advance in this direction.
    pub fn step(self) -> i64 {
        match self {
            Direction::Transfer => 0,
            Direction::Left => -1,
            Direction::Right => 1,
        }
    }
}

/// Transfer-type values written into L13. Split into the plain / compulsive
/// and needle / slider quadrants the machine distinguishes.
pub fn transfer_type(side: Side, use_sliders: bool, compulsive: bool) -> u8 {
    match (side, use_sliders, compulsive) {
        (Side::Front, false, false) => 31,
        (Side::Back, false, false) => 32,
        (Side::Front, true, false) => 81,
        (Side::Back, true, false) => 82,
        (Side::Front, false, true) => 51,
        (Side::Back, false, true) => 52,
        (Side::Front, true, true) => 91,
        (Side::Back, true, true) => 92,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_codes_match_r5_values() {
        assert_eq!(Direction::Transfer.code(), 1);
        assert_eq!(Direction::Left.code(), 6);
        assert_eq!(Direction::Right.code(), 7);
    }

    #[test]
    fn flip_is_involutive() {
        for d in [Direction::Transfer, Direction::Left, Direction::Right] {
            assert_eq!(d.flip().flip(), d);
        }
        assert_eq!(Side::Front.flip(), Side::Back);
        assert_eq!(Side::Back.flip().flip(), Side::Back);
    }

    #[test]
    fn transfer_type_quadrants() {
        assert_eq!(transfer_type(Side::Front, false, false), 31);
        assert_eq!(transfer_type(Side::Back, false, false), 32);
        assert_eq!(transfer_type(Side::Front, true, false), 81);
        assert_eq!(transfer_type(Side::Back, true, false), 82);
        assert_eq!(transfer_type(Side::Front, false, true), 51);
        assert_eq!(transfer_type(Side::Back, true, true), 92);
    }
}
