//! The sealed raster instruction alphabet.
//!
//! Codes are raw bytes in a fixed machine palette; `Instr` wraps them so the
//! rest of the pipeline can only produce values this module vouches for.
//! Ranged families (moves, shifted transfers, shifted splits) are built
//! through the constructors below rather than enumerated one const per code.

use crate::{Direction, Side};

/// One raster instruction cell value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Instr(pub u8);

/// Side a code acts on, as printed in the machine manual: `None` codes touch
/// no needle (misses, fillers, markers), `Both` codes act on the facing pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSide {
    None,
    Front,
    Back,
    Both,
}

/// Effect of a code on bed occupancy at its needle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BedEffect {
    /// Occupancy untouched.
    None,
    /// A loop is (re)formed on the code's own side.
    Same,
    /// The loop leaves the code's side and lands on the opposing bed.
    Opposite,
    /// Loops end up on both beds (full-bed knits, splits).
    Both,
}

impl Instr {
    pub const EMPTY: Instr = Instr(0);

    // Knit family.
    pub const FRONT_KNIT: Instr = Instr(1);
    pub const BACK_KNIT: Instr = Instr(2);
    pub const BOTH_KNIT: Instr = Instr(3);
    pub const FRONT_KNIT_MISS: Instr = Instr(51);
    pub const BACK_KNIT_MISS: Instr = Instr(52);

    // Tuck family.
    pub const FRONT_TUCK: Instr = Instr(11);
    pub const BACK_TUCK: Instr = Instr(12);
    pub const BOTH_TUCK: Instr = Instr(88);
    pub const FRONT_TUCK_MISS: Instr = Instr(171);
    pub const BACK_TUCK_MISS: Instr = Instr(172);
    pub const BOTH_TUCK_MISS: Instr = Instr(175);

    // Miss family. 216/217 are the empty-carriage clearing passes used by the
    // preamble, postamble, and post-cast-off sweeps.
    pub const MISS: Instr = Instr(16);
    pub const FRONT_MISS: Instr = Instr(116);
    pub const BACK_MISS: Instr = Instr(117);
    pub const MISS_RIGHT: Instr = Instr(216);
    pub const MISS_LEFT: Instr = Instr(217);

    // Cross (cable) family. Below/above pick which leg passes in front; the
    // `_SECOND` variants distinguish adjacent pairs of the same line. The
    // joint code fills the cells a pair straddles.
    pub const CROSS_BELOW: Instr = Instr(4);
    pub const CROSS_ABOVE: Instr = Instr(5);
    pub const CROSS_BELOW_SECOND: Instr = Instr(14);
    pub const CROSS_ABOVE_SECOND: Instr = Instr(15);
    pub const CROSS_NEUTRAL: Instr = Instr(10);
    pub const CROSS_SPLIT: Instr = Instr(100);
    pub const CROSS_JOINT: Instr = Instr(150);

    // Restack: transfer out and straight back to untwist a loop.
    pub const FRONT_RESTACK: Instr = Instr(6);
    pub const BACK_RESTACK: Instr = Instr(7);

    // Bed-switch transfers. Shifted variants live at BASE + delta, keeping
    // the whole family inside 20..=50; switch-then-knit closes the range.
    pub const TO_BACK: Instr = Instr(Self::TO_BACK_BASE);
    pub const TO_FRONT: Instr = Instr(Self::TO_FRONT_BASE);
    pub const TO_BACK_KNIT: Instr = Instr(89);
    pub const TO_FRONT_KNIT: Instr = Instr(90);
    pub(crate) const TO_BACK_BASE: u8 = 27; // 20..=34
    pub(crate) const TO_FRONT_BASE: u8 = 43; // 36..=50

    // Split family: knit on the source needle while the held loop moves to
    // the opposing bed. Shifted variants at BASE + delta, |delta| <= 2.
    pub const FRONT_SPLIT: Instr = Instr(101);
    pub const BACK_SPLIT: Instr = Instr(102);
    pub(crate) const FRONT_SPLIT_BASE: u8 = 110; // 108..=112, 110 itself unused
    pub(crate) const BACK_SPLIT_BASE: u8 = 120; // 118..=122, 120 itself unused

    pub const LINK_PROCESS: Instr = Instr(99);
    pub const CARRIER_POS: Instr = Instr(13);

    /// Same-bed move: shift a loop by `dist` needles (1..=7) without leaving
    /// its bed. Family layout: 60/70/80/90 + dist for front-left,
    /// front-right, back-left, back-right.
    pub fn move_code(side: Side, dir: Direction, dist: u8) -> Option<Instr> {
        if dist == 0 || dist > 7 {
            return None;
        }
        let base = match (side, dir) {
            (Side::Front, Direction::Left) => 60,
            (Side::Front, Direction::Right) => 70,
            (Side::Back, Direction::Left) => 80,
            (Side::Back, Direction::Right) => 90,
            (_, Direction::Transfer) => return None,
        };
        Some(Instr(base + dist))
    }

    /// Decompose a move code back into (side, direction, distance).
    pub fn move_params(self) -> Option<(Side, Direction, u8)> {
        match self.0 {
            61..=67 => Some((Side::Front, Direction::Left, self.0 - 60)),
            71..=77 => Some((Side::Front, Direction::Right, self.0 - 70)),
            81..=87 => Some((Side::Back, Direction::Left, self.0 - 80)),
            91..=97 => Some((Side::Back, Direction::Right, self.0 - 90)),
            _ => None,
        }
    }

    /// Bed-switch transfer with a horizontal shift, `delta` in -7..=7.
    pub(crate) fn switch_code(from: Side, delta: i8) -> Option<Instr> {
        if delta < -7 || delta > 7 {
            return None;
        }
        let base = match from {
            Side::Front => Self::TO_BACK_BASE,
            Side::Back => Self::TO_FRONT_BASE,
        };
        Some(Instr((base as i16 + delta as i16) as u8))
    }

    /// Decompose a bed-switch code into (source side, delta).
    pub fn switch_params(self) -> Option<(Side, i8)> {
        match self.0 {
            20..=34 => Some((Side::Front, self.0 as i8 - Self::TO_BACK_BASE as i8)),
            36..=50 => Some((Side::Back, self.0 as i8 - Self::TO_FRONT_BASE as i8)),
            89 => Some((Side::Front, 0)),
            90 => Some((Side::Back, 0)),
            _ => None,
        }
    }

    /// Split with a horizontal shift of the held loop, `delta` in -2..=2.
    pub(crate) fn split_code(side: Side, delta: i8) -> Option<Instr> {
        if delta == 0 {
            return Some(match side {
                Side::Front => Self::FRONT_SPLIT,
                Side::Back => Self::BACK_SPLIT,
            });
        }
        if delta < -2 || delta > 2 {
            return None;
        }
        let base = match side {
            Side::Front => Self::FRONT_SPLIT_BASE,
            Side::Back => Self::BACK_SPLIT_BASE,
        };
        Some(Instr((base as i16 + delta as i16) as u8))
    }

    pub fn split_params(self) -> Option<(Side, i8)> {
        match self.0 {
            101 => Some((Side::Front, 0)),
            102 => Some((Side::Back, 0)),
            108..=112 if self.0 != 110 => {
                Some((Side::Front, self.0 as i8 - Self::FRONT_SPLIT_BASE as i8))
            },
            118..=122 if self.0 != 120 => {
                Some((Side::Back, self.0 as i8 - Self::BACK_SPLIT_BASE as i8))
            },
            _ => None,
        }
    }

    pub fn side(self) -> CodeSide {
        if let Some((s, _, _)) = self.move_params() {
            return from_side(s);
        }
        if let Some((s, _)) = self.switch_params() {
            return from_side(s);
        }
        if let Some((s, _)) = self.split_params() {
            return from_side(s);
        }
        match self.0 {
            1 | 51 | 11 | 116 | 171 | 4 | 5 | 14 | 15 | 10 | 100 | 6 => CodeSide::Front,
            2 | 52 | 12 | 117 | 172 | 7 => CodeSide::Back,
            3 | 88 | 175 => CodeSide::Both,
            _ => CodeSide::None,
        }
    }

    pub fn bed_effect(self) -> BedEffect {
        if self.move_params().is_some() {
            return BedEffect::Same;
        }
        if self.switch_params().is_some() {
            return BedEffect::Opposite;
        }
        if self.split_params().is_some() {
            return BedEffect::Both;
        }
        match self.0 {
            1 | 2 | 51 | 52 | 11 | 12 | 171 | 172 | 4 | 5 | 14 | 15 | 10 | 6 | 7 => BedEffect::Same,
            3 | 88 | 175 => BedEffect::Both,
            100 => BedEffect::Opposite,
            _ => BedEffect::None,
        }
    }

    /// True for codes that open or close a cable pair at flush time.
    pub fn is_cross(self) -> bool {
        matches!(self.0, 4 | 5 | 14 | 15 | 10 | 100)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn is_link_process(self) -> bool {
        self.0 == 99
    }

    /// Codes that anchor the carrier-position span: anything visible on the
    /// line except fillers and the markers themselves.
    pub fn anchors_carrier(self) -> bool {
        !self.is_empty() && !self.is_link_process() && self.0 != 13
    }
}

fn from_side(s: Side) -> CodeSide {
    match s {
        Side::Front => CodeSide::Front,
        Side::Back => CodeSide::Back,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_family_layout() {
        assert_eq!(Instr::move_code(Side::Front, Direction::Left, 3), Some(Instr(63)));
        assert_eq!(Instr::move_code(Side::Front, Direction::Right, 7), Some(Instr(77)));
        assert_eq!(Instr::move_code(Side::Back, Direction::Left, 1), Some(Instr(81)));
        assert_eq!(Instr::move_code(Side::Back, Direction::Right, 6), Some(Instr(96)));
        assert_eq!(Instr::move_code(Side::Front, Direction::Right, 8), None);
        assert_eq!(Instr::move_code(Side::Front, Direction::Transfer, 1), None);
    }

    #[test]
    fn move_params_round_trip() {
        for side in [Side::Front, Side::Back] {
            for dir in [Direction::Left, Direction::Right] {
                for dist in 1..=7u8 {
                    let code = Instr::move_code(side, dir, dist).unwrap();
                    assert_eq!(code.move_params(), Some((side, dir, dist)));
                    assert_eq!(code.bed_effect(), BedEffect::Same);
                }
            }
        }
    }

    #[test]
    fn switch_family_stays_in_range() {
        for delta in -7..=7i8 {
            let f = Instr::switch_code(Side::Front, delta).unwrap();
            let b = Instr::switch_code(Side::Back, delta).unwrap();
            assert!((20..=34).contains(&f.0), "front code {} out of range", f.0);
            assert!((36..=50).contains(&b.0), "back code {} out of range", b.0);
            assert_eq!(f.switch_params(), Some((Side::Front, delta)));
            assert_eq!(b.switch_params(), Some((Side::Back, delta)));
            assert_eq!(f.bed_effect(), BedEffect::Opposite);
        }
    }

    #[test]
    fn families_do_not_collide() {
        // Every constructor output must decompose through exactly one family.
        for byte in 0..=255u8 {
            let code = Instr(byte);
            let families = [
                code.move_params().is_some(),
                code.switch_params().is_some(),
                code.split_params().is_some(),
                code.is_cross(),
            ];
            assert!(
                families.iter().filter(|f| **f).count() <= 1,
                "code {byte} claimed by multiple families"
            );
        }
    }

    #[test]
    fn split_shift_bounds() {
        assert_eq!(Instr::split_code(Side::Front, 0), Some(Instr::FRONT_SPLIT));
        assert_eq!(Instr::split_code(Side::Front, 2), Some(Instr(112)));
        assert_eq!(Instr::split_code(Side::Back, -2), Some(Instr(118)));
        assert_eq!(Instr::split_code(Side::Back, 3), None);
        assert_eq!(Instr(112).split_params(), Some((Side::Front, 2)));
        assert_eq!(Instr(110).split_params(), None);
    }

    #[test]
    fn carrier_anchor_excludes_fillers() {
        assert!(Instr::FRONT_KNIT.anchors_carrier());
        assert!(Instr::CROSS_BELOW.anchors_carrier());
        assert!(!Instr::EMPTY.anchors_carrier());
        assert!(!Instr::LINK_PROCESS.anchors_carrier());
        assert!(!Instr::CARRIER_POS.anchors_carrier());
    }
}
