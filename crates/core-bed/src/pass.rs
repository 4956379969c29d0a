//! Passes and per-stitch actions, as handed over by the tracing front end.

use crate::Needle;
use std::collections::HashMap;

/// Stable stitch identifier within one traced program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StitchId(pub u32);

impl std::fmt::Display for StitchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    CastOn,
    CastOff,
    Actions,
    Transfers,
}

/// What one stitch does in an action pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionKind {
    #[default]
    None,
    Knit,
    Tuck,
    Miss,
    Split,
    FbKnit,
    Kickback,
    SplitMiss,
}

/// Cable pairing: the partner stitch this one swaps with, and whether this
/// leg crosses above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pairing {
    pub partner: StitchId,
    pub above: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncreaseKind {
    Split,
    Kickback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Increase {
    pub kind: IncreaseKind,
    pub target: Needle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    pub source: Needle,
    pub targets: Vec<Needle>,
    /// Work the stitch on the opposite face (purl form of the primitive).
    pub reverse: bool,
    /// The needle already carries a loop when this action runs.
    pub casting: bool,
    pub pairing: Option<Pairing>,
    pub restack: bool,
    pub increase: Option<Increase>,
}

impl Action {
    pub fn new(kind: ActionKind, source: Needle) -> Self {
        Action {
            kind,
            source,
            targets: Vec::new(),
            reverse: false,
            casting: false,
            pairing: None,
            restack: false,
            increase: None,
        }
    }

    pub fn with_target(mut self, target: Needle) -> Self {
        self.targets.push(target);
        self
    }

    /// First target, if the action relocates its loop.
    pub fn target(&self) -> Option<Needle> {
        self.targets.first().copied()
    }
}

/// One carrier traversal over a time bed.
#[derive(Debug, Clone, Default)]
pub struct Pass {
    pub kind: PassKind,
    /// Stitches in carrier order.
    pub sequence: Vec<StitchId>,
    pub actions: HashMap<StitchId, Action>,
    pub yarn_starts: bool,
    pub yarn_ends: bool,
    /// Whether casting runs inside this pass get a partial cast-on ramp.
    pub safe_cast: bool,
    /// Free-form tag from the tracing layer (diagnostics only).
    pub tag: Option<String>,
}

impl Default for PassKind {
    fn default() -> Self {
        PassKind::Actions
    }
}

impl Pass {
    pub fn new(kind: PassKind) -> Self {
        Pass { kind, safe_cast: true, ..Default::default() }
    }

    pub fn action_of(&self, stitch: StitchId) -> Option<&Action> {
        self.actions.get(&stitch)
    }
}
