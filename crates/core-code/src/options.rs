//! Option-bar symbols and per-line option storage.
//!
//! The machine reads up to 20 options per margin side (L1..L20, R1..R20),
//! each written as an identifier cell plus a value cell. Storage here is a
//! fixed-size array indexed by option kind; no string-keyed maps.

use crate::encode::CodeError;
use std::fmt;

/// Which margin bar an option lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MarginSide {
    Left,
    Right,
}

/// One of the 40 option symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OptionKey {
    side: MarginSide,
    n: u8,
}

pub const OPTION_SLOTS: usize = 40;

impl OptionKey {
    /// Repeat count (line expansion).
    pub const R1: OptionKey = OptionKey::right_unchecked(1);
    /// Carrier id.
    pub const R3: OptionKey = OptionKey::right_unchecked(3);
    /// Carrier/carriage mode: 1 knit-cancel (transfer), 2 carriage move,
    /// 6/7 independent left/right.
    pub const R5: OptionKey = OptionKey::right_unchecked(5);
    /// Tension.
    pub const R6: OptionKey = OptionKey::right_unchecked(6);
    /// Link-process control.
    pub const R9: OptionKey = OptionKey::right_unchecked(9);
    /// Holding hook.
    pub const R10: OptionKey = OptionKey::right_unchecked(10);
    /// Fabric presser.
    pub const R11: OptionKey = OptionKey::right_unchecked(11);
    /// Manual yarn insert/remove.
    pub const R15: OptionKey = OptionKey::right_unchecked(15);
    /// DSCS toggle/state.
    pub const L9: OptionKey = OptionKey::left_unchecked(9);
    /// Split-to-hook / A-miss.
    pub const L12: OptionKey = OptionKey::left_unchecked(12);
    /// Transfer type.
    pub const L13: OptionKey = OptionKey::left_unchecked(13);

    const fn left_unchecked(n: u8) -> OptionKey {
        OptionKey { side: MarginSide::Left, n }
    }

    const fn right_unchecked(n: u8) -> OptionKey {
        OptionKey { side: MarginSide::Right, n }
    }

    pub fn new(side: MarginSide, n: u8) -> Result<OptionKey, CodeError> {
        if n == 0 || n > 20 {
            let prefix = match side {
                MarginSide::Left => "L",
                MarginSide::Right => "R",
            };
            return Err(CodeError::InvalidOption { symbol: format!("{prefix}{n}") });
        }
        Ok(OptionKey { side, n })
    }

    pub fn left(n: u8) -> Result<OptionKey, CodeError> {
        OptionKey::new(MarginSide::Left, n)
    }

    pub fn right(n: u8) -> Result<OptionKey, CodeError> {
        OptionKey::new(MarginSide::Right, n)
    }

    pub fn side(self) -> MarginSide {
        self.side
    }

    /// Option ordinal within its bar (the identifier-cell byte).
    pub fn number(self) -> u8 {
        self.n
    }

    /// Dense slot index: L1..L20 -> 0..19, R1..R20 -> 20..39.
    pub fn slot(self) -> usize {
        match self.side {
            MarginSide::Left => self.n as usize - 1,
            MarginSide::Right => 19 + self.n as usize,
        }
    }

    fn from_slot(slot: usize) -> OptionKey {
        if slot < 20 {
            OptionKey::left_unchecked(slot as u8 + 1)
        } else {
            OptionKey::right_unchecked(slot as u8 - 19)
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.side {
            MarginSide::Left => write!(f, "L{}", self.n),
            MarginSide::Right => write!(f, "R{}", self.n),
        }
    }
}

/// The option set attached to one raster line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineOptions {
    values: [Option<u8>; OPTION_SLOTS],
}

impl Default for LineOptions {
    fn default() -> Self {
        Self {
            values: [None; OPTION_SLOTS],
        }
    }
}

impl LineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, returning the previous value if any.
    pub fn set(&mut self, key: OptionKey, value: u8) -> Option<u8> {
        self.values[key.slot()].replace(value)
    }

    pub fn get(&self, key: OptionKey) -> Option<u8> {
        self.values[key.slot()]
    }

    pub fn contains(&self, key: OptionKey) -> bool {
        self.values[key.slot()].is_some()
    }

    pub fn remove(&mut self, key: OptionKey) -> Option<u8> {
        self.values[key.slot()].take()
    }

    /// Merge `other` in; incoming values win on overlap.
    pub fn merge(&mut self, other: &LineOptions) {
        for (slot, v) in other.values.iter().enumerate() {
            if let Some(v) = v {
                self.values[slot] = Some(*v);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    pub fn clear(&mut self) {
        self.values = [None; OPTION_SLOTS];
    }

    pub fn iter(&self) -> impl Iterator<Item = (OptionKey, u8)> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter_map(|(slot, v)| v.map(|v| (OptionKey::from_slot(slot), v)))
    }
}

/// R5 carrier/carriage mode values.
pub mod carriage {
    /// Knit-cancel: the line is a transfer pass.
    pub const TRANSFER: u8 = 1;
    /// Alternate knit-cancel marker accepted by the direction sweep.
    pub const TRANSFER_ALT: u8 = 11;
    /// Carriage move: flip the running direction for this line.
    pub const MOVE: u8 = 2;
    /// Independent direction overrides.
    pub const LEFT: u8 = 6;
    pub const RIGHT: u8 = 7;
}

/// R6 tension presets.
pub mod tension {
    pub const NORMAL: u8 = 5;
    pub const TIGHT_END: u8 = 24;
    pub const TIGHT_START: u8 = 33;
}

/// R11 fabric presser values.
pub mod presser {
    pub const OFF: u8 = 0;
    pub const SHORTROW: u8 = 101;
}

/// R15 manual yarn handling.
pub mod yarn {
    pub const INSERT: u8 = 1;
    pub const REMOVE: u8 = 2;
}

/// L9 DSCS states. 0/1 toggle; values >= 2 select absolute special states.
pub mod dscs {
    pub const OFF: u8 = 0;
    pub const ON: u8 = 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_dense_and_disjoint() {
        let mut seen = [false; OPTION_SLOTS];
        for n in 1..=20 {
            for key in [OptionKey::left(n).unwrap(), OptionKey::right(n).unwrap()] {
                assert!(!seen[key.slot()], "slot collision at {key}");
                seen[key.slot()] = true;
            }
        }
        assert!(seen.iter().all(|s| *s));
    }

    #[test]
    fn rejects_out_of_range_symbols() {
        assert!(OptionKey::left(0).is_err());
        assert!(OptionKey::right(21).is_err());
        assert!(OptionKey::left(20).is_ok());
    }

    #[test]
    fn merge_prefers_incoming() {
        let mut a = LineOptions::new();
        a.set(OptionKey::R6, 5);
        a.set(OptionKey::R3, 1);
        let mut b = LineOptions::new();
        b.set(OptionKey::R6, 7);
        a.merge(&b);
        assert_eq!(a.get(OptionKey::R6), Some(7));
        assert_eq!(a.get(OptionKey::R3), Some(1));
    }

    #[test]
    fn display_matches_manual_symbols() {
        assert_eq!(OptionKey::L13.to_string(), "L13");
        assert_eq!(OptionKey::R5.to_string(), "R5");
    }
}
