//! Shape graph: nodes and interfaces in a shared arena, plus the sidedness
//! and size inference the scheduler and layout consult.
//!
//! Shapes and interfaces form a cyclic graph; both live in one `Skeleton`
//! arena indexed by stable integer ids. Interface sides store `{node,
//! path}` pairs instead of back-pointers, and every traversal carries a
//! visited set, so the graph can be walked in either direction without
//! ownership gymnastics.

mod infer;

pub use infer::{SizeTable, infer_all_sizes, infer_sidedness};

use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItfId(pub usize);

/// Where on a node an interface attaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Path {
    Bottom,
    Top,
    Base,
    Branch(usize),
}

impl Path {
    /// Entering here walks the node bottom-up.
    pub fn is_lower(self) -> bool {
        matches!(self, Path::Bottom | Path::Base)
    }
}

impl std::fmt::Display for Path {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Path::Bottom => write!(f, "bottom"),
            Path::Top => write!(f, "top"),
            Path::Base => write!(f, "base"),
            Path::Branch(i) => write!(f, "branches/{i}"),
        }
    }
}

/// Width of a shape as a function of normalized course time `t` in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub enum WidthProfile {
    Constant(usize),
    /// Linear interpolation bottom to top.
    Linear { bottom: usize, top: usize },
}

impl WidthProfile {
    pub fn eval(&self, t: f64) -> usize {
        match self {
            WidthProfile::Constant(w) => *w,
            WidthProfile::Linear { bottom, top } => {
                let w = *bottom as f64 + (*top as f64 - *bottom as f64) * t.clamp(0.0, 1.0);
                w.round() as usize
            },
        }
    }

    pub fn max(&self) -> usize {
        match self {
            WidthProfile::Constant(w) => *w,
            WidthProfile::Linear { bottom, top } => *bottom.max(top),
        }
    }
}

/// Whether a sheet lays its courses on one bed or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sidedness {
    #[default]
    Flat,
    Cylinder,
    /// Fixed point over connected neighbors.
    Auto,
}

#[derive(Debug, Clone)]
pub struct Sheet {
    pub width: WidthProfile,
    pub sides: Sidedness,
    pub courses: usize,
    pub shortrows: bool,
}

#[derive(Debug, Clone)]
pub struct Joint {
    pub width: WidthProfile,
    pub courses: usize,
}

#[derive(Debug, Clone)]
pub struct Split {
    pub degree: usize,
    pub folded: bool,
}

/// Seam to the external shape DSL: custom shapes arrive with their course
/// metadata already evaluated.
#[derive(Debug, Clone)]
pub struct Custom {
    pub courses: usize,
    pub first_two_sided: bool,
    pub last_two_sided: bool,
    pub bottom_size: usize,
    pub top_size: usize,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Sheet(Sheet),
    Joint(Joint),
    Split(Split),
    Custom(Custom),
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
}

impl Node {
    /// Attachment paths this node exposes.
    pub fn paths(&self) -> Vec<Path> {
        match &self.kind {
            NodeKind::Sheet(_) | NodeKind::Joint(_) | NodeKind::Custom(_) => {
                vec![Path::Bottom, Path::Top]
            },
            NodeKind::Split(s) => {
                let mut out = vec![Path::Base];
                out.extend((0..s.degree).map(Path::Branch));
                out
            },
        }
    }
}

/// One side of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItfSide {
    pub node: NodeId,
    pub path: Path,
}

#[derive(Debug, Clone)]
pub struct Interface {
    pub id: ItfId,
    pub sides: [Option<ItfSide>; 2],
    /// A dangling end can be sewn closed; closure flattens cylinders.
    pub closed: bool,
}

impl Interface {
    pub fn other(&self, side: ItfSide) -> Option<ItfSide> {
        match self.sides {
            [Some(a), b] if a == side => b,
            [a, Some(b)] if b == side => a,
            _ => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.sides.iter().all(Option::is_some)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Skeleton {
    nodes: Vec<Node>,
    itfs: Vec<Interface>,
    by_side: HashMap<(NodeId, Path), ItfId>,
}

impl Skeleton {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        let node = Node { id, name: name.into(), kind };
        // Every path owns a dangling interface until connected.
        for path in node.paths() {
            let itf_id = ItfId(self.itfs.len());
            self.itfs.push(Interface {
                id: itf_id,
                sides: [Some(ItfSide { node: id, path }), None],
                closed: false,
            });
            self.by_side.insert((id, path), itf_id);
        }
        self.nodes.push(node);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn itf(&self, id: ItfId) -> &Interface {
        &self.itfs[id.0]
    }

    pub fn itf_of(&self, node: NodeId, path: Path) -> Option<&Interface> {
        self.by_side.get(&(node, path)).map(|id| &self.itfs[id.0])
    }

    /// Merge the dangling interfaces of two sides into one connection.
    /// Unknown sides (a path the node does not expose) are ignored.
    pub fn connect(&mut self, a: NodeId, a_path: Path, b: NodeId, b_path: Path) {
        let a_side = ItfSide { node: a, path: a_path };
        let b_side = ItfSide { node: b, path: b_path };
        let (Some(&id), Some(_)) = (
            self.by_side.get(&(a, a_path)),
            self.by_side.get(&(b, b_path)),
        ) else {
            tracing::warn!(?a_side, ?b_side, "connect ignored: unknown interface side");
            return;
        };
        self.itfs[id.0].sides = [Some(a_side), Some(b_side)];
        // The b-side's old dangling interface is superseded.
        let old = self.by_side.insert((b, b_path), id);
        if let Some(old) = old {
            if old != id {
                self.itfs[old.0].sides = [None, None];
            }
        }
    }

    /// Sew a dangling end closed.
    pub fn close(&mut self, node: NodeId, path: Path) {
        if let Some(id) = self.by_side.get(&(node, path)) {
            self.itfs[id.0].closed = true;
        }
    }

    /// The far side connected across the interface at (node, path).
    pub fn other_side(&self, node: NodeId, path: Path) -> Option<ItfSide> {
        self.itf_of(node, path)?.other(ItfSide { node, path })
    }

    /// All (path, far side) connections of a node.
    pub fn connections(&self, node: NodeId) -> Vec<(Path, ItfSide)> {
        self.node(node)
            .paths()
            .into_iter()
            .filter_map(|p| self.other_side(node, p).map(|far| (p, far)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet(w: usize) -> NodeKind {
        NodeKind::Sheet(Sheet {
            width: WidthProfile::Constant(w),
            sides: Sidedness::Flat,
            courses: 4,
            shortrows: false,
        })
    }

    #[test]
    fn connect_links_both_directions() {
        let mut skel = Skeleton::new();
        let a = skel.add("a", sheet(10));
        let b = skel.add("b", sheet(10));
        skel.connect(a, Path::Top, b, Path::Bottom);
        assert_eq!(
            skel.other_side(a, Path::Top),
            Some(ItfSide { node: b, path: Path::Bottom })
        );
        assert_eq!(
            skel.other_side(b, Path::Bottom),
            Some(ItfSide { node: a, path: Path::Top })
        );
        assert_eq!(skel.other_side(a, Path::Bottom), None);
    }

    #[test]
    fn split_paths_enumerate_branches() {
        let mut skel = Skeleton::new();
        let s = skel.add("s", NodeKind::Split(Split { degree: 3, folded: false }));
        assert_eq!(
            skel.node(s).paths(),
            vec![Path::Base, Path::Branch(0), Path::Branch(1), Path::Branch(2)]
        );
    }

    #[test]
    fn width_profile_eval() {
        let w = WidthProfile::Linear { bottom: 10, top: 20 };
        assert_eq!(w.eval(0.0), 10);
        assert_eq!(w.eval(1.0), 20);
        assert_eq!(w.eval(0.5), 15);
        assert_eq!(w.max(), 20);
    }
}
