//! Time-indexed needle beds: one snapshot of the machine per course step.

use crate::{BedState, Needle, Pass, StitchId};
use std::collections::HashMap;

/// One time step of the traced program: the passes to run and the loop
/// state the step starts from. `group` ties the bed to its shape block so
/// the pass compiler can compute precast covers and expansion runs.
#[derive(Debug, Clone, Default)]
pub struct TimeBed {
    pub time: usize,
    /// Shape-block group this bed belongs to.
    pub group: usize,
    pub width: usize,
    pub passes: Vec<Pass>,
    /// Loop occupancy entering this time step.
    pub states: BedState,
    /// Course circularity of the active group (drives cast-on shape).
    pub circular: bool,
    /// Short-row step: narrower than the enclosing shape, knit under the
    /// fabric presser.
    pub shortrow: bool,
    /// Repeat expansion of the owning shape (R1 when neighbors agree).
    pub expansion: u8,
    needles: HashMap<StitchId, Needle>,
}

impl TimeBed {
    pub fn new(time: usize, width: usize) -> Self {
        TimeBed {
            time,
            width,
            states: BedState::new(width),
            ..Default::default()
        }
    }

    pub fn assign(&mut self, stitch: StitchId, needle: Needle) {
        self.needles.insert(stitch, needle);
    }

    /// Needle carrying `stitch` at this time step.
    pub fn needle_of(&self, stitch: StitchId) -> Option<Needle> {
        self.needles.get(&stitch).copied()
    }

    /// Needles of the given stitches in sequence order, skipping unmapped
    /// ids (the tracing layer only maps stitches that land on needles).
    pub fn needles_of(&self, stitches: &[StitchId]) -> Vec<Needle> {
        stitches.iter().filter_map(|s| self.needle_of(*s)).collect()
    }

    /// All needles this bed's state currently occupies, front before back,
    /// left to right. This is the per-bed contribution to a precast cover.
    pub fn occupied_needles(&self) -> Vec<Needle> {
        let mut out = Vec::new();
        for i in 0..self.states.width() {
            if self.states.get(core_code::Side::Front, i) {
                out.push(Needle::front(i));
            }
        }
        for i in 0..self.states.width() {
            if self.states.get(core_code::Side::Back, i) {
                out.push(Needle::back(i));
            }
        }
        out
    }
}
