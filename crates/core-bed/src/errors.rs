//! Compile error taxonomy.
//!
//! Five kinds, matching how failures propagate: topology and structural and
//! capacity errors abort the current block's compile; inference failures
//! degrade to documented defaults upstream and only reach this type when a
//! caller opts into strictness; format errors guard the raster/encoder seam.

use core_code::CodeError;
use thiserror::Error;

/// Coarse classification used for exit codes and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Topology,
    Structural,
    Capacity,
    Inference,
    Format,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    // -- topology ---------------------------------------------------------
    #[error("dependency loop while scheduling the shape graph at {node}; not knittable")]
    DependencyLoop { node: String },

    #[error("disconnected component has no startable interface (near {node})")]
    NoStartableInterface { node: String },

    // -- structural -------------------------------------------------------
    #[error("cable cross spans the bed boundary at needle {index}")]
    CrossAcrossSides { index: usize },

    #[error("cross instruction at needle {index} never paired before the group ended")]
    UnpairedCross { index: usize },

    #[error("cable pair split across transfer sub-pass boundaries at needle {index}")]
    CableAcrossPasses { index: usize },

    #[error("needle transfers cross across boundaries ({a} and {b} swap beds)")]
    TransferConstraintLoop { a: usize, b: usize },

    #[error("restack combined with a move at needle {index}")]
    RestackWithMove { index: usize },

    #[error(transparent)]
    Code(#[from] CodeError),

    // -- capacity ---------------------------------------------------------
    #[error("partial cast-on touches already-cast needle {index}")]
    AlreadyCast { index: usize },

    #[error("needle {index} appears as a transfer source twice in one sub-pass")]
    DoubleSource { index: usize },

    #[error("holding requested on occupied needle {index}")]
    HoldingOccupied { index: usize },

    #[error("no pending instruction at holding position {index}")]
    MissingHold { index: usize },

    // -- inference --------------------------------------------------------
    #[error("sidedness/size undecidable at interface {interface}")]
    Undecidable { interface: String },

    // -- format -----------------------------------------------------------
    #[error("raster access out of bounds at ({x}, {y})")]
    OutOfBounds { x: usize, y: usize },

    #[error("conflicting value for option {key}: already {prev}, asked for {next}")]
    OptionConflict { key: String, prev: u8, next: u8 },

    #[error("run length {len} exceeds the raster width {width}")]
    RunTooLong { len: usize, width: usize },

    #[error("program input malformed: {reason}")]
    MalformedProgram { reason: String },
}

impl CompileError {
    pub fn kind(&self) -> ErrorKind {
        use CompileError::*;
        match self {
            DependencyLoop { .. } | NoStartableInterface { .. } => ErrorKind::Topology,
            CrossAcrossSides { .. }
            | UnpairedCross { .. }
            | CableAcrossPasses { .. }
            | TransferConstraintLoop { .. }
            | RestackWithMove { .. }
            | Code(_) => ErrorKind::Structural,
            AlreadyCast { .. }
            | DoubleSource { .. }
            | HoldingOccupied { .. }
            | MissingHold { .. } => ErrorKind::Capacity,
            Undecidable { .. } => ErrorKind::Inference,
            OutOfBounds { .. }
            | OptionConflict { .. }
            | RunTooLong { .. }
            | MalformedProgram { .. } => ErrorKind::Format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_classify() {
        assert_eq!(
            CompileError::DependencyLoop { node: "s0".into() }.kind(),
            ErrorKind::Topology
        );
        assert_eq!(
            CompileError::TransferConstraintLoop { a: 5, b: 5 }.kind(),
            ErrorKind::Structural
        );
        assert_eq!(CompileError::DoubleSource { index: 2 }.kind(), ErrorKind::Capacity);
        assert_eq!(CompileError::OutOfBounds { x: 0, y: 9 }.kind(), ErrorKind::Format);
    }
}
