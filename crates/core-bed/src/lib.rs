//! Machine-facing data model shared by the whole back end.
//!
//! This crate is the vocabulary layer between the scheduler/tracing front end
//! and the caster/raster back end: needles, bed occupancy, stitch actions,
//! passes, time-indexed beds, and the typed `CompileError` taxonomy. It owns
//! no behavior beyond occupancy bookkeeping; everything that *emits* lives
//! downstream of it.
//!
//! Invariants:
//! * `BedState` is the single source of truth for loop occupancy during a
//!   compile; the caster mutates it through `apply` and the transfer planner
//!   through explicit clear/set sweeps.
//! * A `Pass` is self-contained: its sequence, action map, and yarn flags
//!   describe one carrier traversal without reference to neighbors.
//! * `TimeBed::needle_of` is total over the stitches named by its passes.

mod bed;
mod errors;
mod pass;
mod timebed;

pub use bed::BedState;
pub use errors::{CompileError, ErrorKind};
pub use pass::{Action, ActionKind, Increase, IncreaseKind, Pairing, Pass, PassKind, StitchId};
pub use timebed::TimeBed;

use core_code::Side;

/// One needle slot: horizontal index plus bed side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Needle {
    pub index: usize,
    pub side: Side,
}

impl Needle {
    pub fn front(index: usize) -> Self {
        Needle { index, side: Side::Front }
    }

    pub fn back(index: usize) -> Self {
        Needle { index, side: Side::Back }
    }

    /// The facing needle on the opposite bed.
    pub fn across(self) -> Self {
        Needle { index: self.index, side: self.side.flip() }
    }
}

impl std::fmt::Display for Needle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.side {
            Side::Front => write!(f, "f{}", self.index),
            Side::Back => write!(f, "b{}", self.index),
        }
    }
}
