//! Two-sided needle bed occupancy.

use crate::Needle;
use core_code::{BedEffect, CodeSide, Instr, Side};

/// Boolean occupancy per needle on both beds. Out-of-range reads answer
/// `false`; out-of-range writes grow the bed, since shaping regularly walks
/// one needle past the current edge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BedState {
    front: Vec<bool>,
    back: Vec<bool>,
}

impl BedState {
    pub fn new(width: usize) -> Self {
        BedState { front: vec![false; width], back: vec![false; width] }
    }

    pub fn width(&self) -> usize {
        self.front.len().max(self.back.len())
    }

    fn row(&self, side: Side) -> &Vec<bool> {
        match side {
            Side::Front => &self.front,
            Side::Back => &self.back,
        }
    }

    fn row_mut(&mut self, side: Side) -> &mut Vec<bool> {
        match side {
            Side::Front => &mut self.front,
            Side::Back => &mut self.back,
        }
    }

    pub fn get(&self, side: Side, index: usize) -> bool {
        self.row(side).get(index).copied().unwrap_or(false)
    }

    pub fn set(&mut self, side: Side, index: usize, value: bool) {
        let row = self.row_mut(side);
        if index >= row.len() {
            if !value {
                return;
            }
            row.resize(index + 1, false);
        }
        row[index] = value;
    }

    pub fn occupied(&self, needle: Needle) -> bool {
        self.get(needle.side, needle.index)
    }

    /// Whether the facing needle on the opposite bed holds a loop. This is
    /// the slider criterion for same-bed moves.
    pub fn other_side(&self, needle: Needle) -> bool {
        self.get(needle.side.flip(), needle.index)
    }

    /// Whether either bed holds a loop at `index` (the link-process fill
    /// criterion at flush time).
    pub fn any(&self, index: usize) -> bool {
        self.get(Side::Front, index) || self.get(Side::Back, index)
    }

    /// Leftmost and rightmost occupied indices across both beds.
    pub fn extent(&self) -> Option<(usize, usize)> {
        let mut lo = None;
        let mut hi = None;
        for i in 0..self.width() {
            if self.any(i) {
                lo.get_or_insert(i);
                hi = Some(i);
            }
        }
        lo.zip(hi)
    }

    /// Apply the occupancy effect of emitting `code` at needle `at`.
    ///
    /// Moves and shifted transfers relocate the loop; splits populate both
    /// beds; plain stitches re-form on their own side.
    pub fn apply(&mut self, at: usize, code: Instr) {
        if let Some((side, dir, dist)) = code.move_params() {
            self.set(side, at, false);
            let target = at as i64 + dir.step() * dist as i64;
            if target >= 0 {
                self.set(side, target as usize, true);
            }
            return;
        }
        if let Some((from, delta)) = code.switch_params() {
            self.set(from, at, false);
            let target = at as i64 + delta as i64;
            if target >= 0 {
                self.set(from.flip(), target as usize, true);
            }
            return;
        }
        if let Some((side, delta)) = code.split_params() {
            self.set(side, at, true);
            let target = at as i64 + delta as i64;
            if target >= 0 {
                self.set(side.flip(), target as usize, true);
            }
            return;
        }
        match (code.bed_effect(), code.side()) {
            (BedEffect::None, _) => {},
            (BedEffect::Same, CodeSide::Front) => self.set(Side::Front, at, true),
            (BedEffect::Same, CodeSide::Back) => self.set(Side::Back, at, true),
            (BedEffect::Same, CodeSide::Both) | (BedEffect::Both, _) => {
                self.set(Side::Front, at, true);
                self.set(Side::Back, at, true);
            },
            (BedEffect::Same, CodeSide::None) => {},
            (BedEffect::Opposite, CodeSide::Front) => {
                self.set(Side::Front, at, false);
                self.set(Side::Back, at, true);
            },
            (BedEffect::Opposite, CodeSide::Back) => {
                self.set(Side::Back, at, false);
                self.set(Side::Front, at, true);
            },
            (BedEffect::Opposite, _) => {},
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_code::Direction;

    #[test]
    fn knit_sets_own_side() {
        let mut bed = BedState::new(10);
        bed.apply(3, Instr::FRONT_KNIT);
        assert!(bed.get(Side::Front, 3));
        assert!(!bed.get(Side::Back, 3));
        bed.apply(3, Instr::BOTH_KNIT);
        assert!(bed.get(Side::Back, 3));
    }

    #[test]
    fn transfer_moves_across() {
        let mut bed = BedState::new(10);
        bed.set(Side::Front, 4, true);
        bed.apply(4, Instr::TO_BACK);
        assert!(!bed.get(Side::Front, 4));
        assert!(bed.get(Side::Back, 4));
    }

    #[test]
    fn shifted_switch_lands_offset() {
        let mut bed = BedState::new(10);
        bed.set(Side::Back, 6, true);
        let code = core_code::transfer_code(6, Side::Back, 8, Side::Front, false).unwrap();
        bed.apply(6, code);
        assert!(!bed.get(Side::Back, 6));
        assert!(bed.get(Side::Front, 8));
    }

    #[test]
    fn move_relocates_on_same_bed() {
        let mut bed = BedState::new(10);
        bed.set(Side::Front, 5, true);
        bed.apply(5, Instr::move_code(Side::Front, Direction::Left, 2).unwrap());
        assert!(!bed.get(Side::Front, 5));
        assert!(bed.get(Side::Front, 3));
    }

    #[test]
    fn split_populates_both() {
        let mut bed = BedState::new(10);
        bed.set(Side::Front, 2, true);
        bed.apply(2, Instr::FRONT_SPLIT);
        assert!(bed.get(Side::Front, 2));
        assert!(bed.get(Side::Back, 2));
    }

    #[test]
    fn writes_grow_the_bed() {
        let mut bed = BedState::new(2);
        bed.set(Side::Front, 7, true);
        assert!(bed.get(Side::Front, 7));
        assert!(!bed.get(Side::Back, 12));
        assert_eq!(bed.extent(), Some((7, 7)));
    }
}
