//! Scheduler: topological numbering of the shape graph and single-carrier
//! planning across it.
//!
//! Output is a total order of `Block`s: which node to trace next, which of
//! its course groups to walk and in which vertical direction, and how the
//! yarn behaves at the block edges (fresh start, suspension, termination).
//! The tracing front end consumes this list one block at a time.

mod order;

pub use order::{OrderKey, order_graph};

use core_shape::{ItfSide, NodeId, NodeKind, Path, Skeleton};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, trace};

/// Which courses of the node a block covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CourseRef {
    /// The node's whole course list, bottom-up or top-down.
    All { ascending: bool },
    /// The split's continuity course.
    Continuity,
    /// One branch course group.
    Branch(usize),
    /// The split's base course group.
    Base,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct YarnPlan {
    pub starting: bool,
    pub ending: bool,
    pub suspending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub node: NodeId,
    pub courses: Vec<CourseRef>,
    pub yarn: YarnPlan,
    pub order: i64,
}

/// Plan the carrier across the whole skeleton, starting at the user-chosen
/// side. Fails on dependency loops discovered during numbering.
pub fn schedule(
    skel: &Skeleton,
    start: NodeId,
    start_path: Path,
) -> Result<Vec<Block>, core_bed::CompileError> {
    let orders = order_graph(skel, start, start_path)?;
    let mut planner = Planner {
        skel,
        orders: &orders,
        produced: HashSet::new(),
        queue: VecDeque::new(),
        starts: Vec::new(),
        blocks: Vec::new(),
        pending_start: true,
        postponed: std::collections::HashMap::new(),
    };
    planner.queue.push_back((start, start_path));
    planner.run()?;

    if let Some(last) = planner.blocks.last_mut() {
        last.yarn.ending = true;
    }
    debug!(blocks = planner.blocks.len(), "carrier plan ready");
    Ok(planner.blocks)
}

struct Planner<'s> {
    skel: &'s Skeleton,
    orders: &'s std::collections::HashMap<OrderKey, i64>,
    produced: HashSet<NodeId>,
    queue: VecDeque<(NodeId, Path)>,
    /// Pending fresh-yarn entry points, drained in ascending order.
    starts: Vec<(NodeId, Path)>,
    blocks: Vec<Block>,
    /// The next emitted block begins a fresh yarn.
    pending_start: bool,
    /// Postponed split entries, keyed to the production count at postpone
    /// time: a re-postponement with no progress is a dependency loop.
    postponed: std::collections::HashMap<(NodeId, Path), usize>,
}

impl<'s> Planner<'s> {
    fn order_of(&self, node: NodeId, path: Path) -> i64 {
        self.orders.get(&OrderKey { node, path }).copied().unwrap_or(i64::MAX)
    }

    fn push_block(&mut self, node: NodeId, courses: Vec<CourseRef>, mut yarn: YarnPlan) {
        if self.pending_start {
            yarn.starting = true;
            self.pending_start = false;
        }
        let order = self.blocks.len() as i64;
        self.blocks.push(Block { node, courses, yarn, order });
    }

    fn run(&mut self) -> Result<(), core_bed::CompileError> {
        loop {
            while let Some((node, entry)) = self.queue.pop_front() {
                if self.produced.contains(&node) {
                    continue;
                }
                match &self.skel.node(node).kind {
                    NodeKind::Sheet(_) | NodeKind::Joint(_) | NodeKind::Custom(_) => {
                        self.plain_block(node, entry);
                    },
                    NodeKind::Split(split) => {
                        let degree = split.degree;
                        if entry == Path::Base {
                            self.split_from_base(node, degree);
                        } else {
                            self.split_from_branch(node, entry, degree)?;
                        }
                    },
                }
            }
            // Main queue drained: resume from the best pending start.
            let mut starts = std::mem::take(&mut self.starts);
            starts.retain(|(n, _)| !self.produced.contains(n));
            if starts.is_empty() {
                return Ok(());
            }
            starts.sort_by_key(|(n, p)| self.order_of(*n, *p));
            let (node, path) = starts.remove(0);
            self.starts = starts;
            trace!(node = %self.skel.node(node).name, %path, "fresh yarn start");
            self.pending_start = true;
            self.queue.push_back((node, path));
        }
    }

    /// Sheet / joint / custom: one block over the whole course list, walked
    /// away from the entry path.
    fn plain_block(&mut self, node: NodeId, entry: Path) {
        let ascending = entry.is_lower();
        self.produced.insert(node);
        let exit = if ascending { Path::Top } else { Path::Bottom };
        let onward = self.skel.other_side(node, exit);
        let yarn = YarnPlan { ending: onward.is_none(), ..Default::default() };
        self.push_block(node, vec![CourseRef::All { ascending }], yarn);
        if let Some(far) = onward {
            self.queue.push_back((far.node, far.path));
        }
    }

    /// Split entered from its base.
    fn split_from_base(&mut self, node: NodeId, degree: usize) {
        let connected: Vec<usize> = (0..degree)
            .filter(|b| self.skel.other_side(node, Path::Branch(*b)).is_some())
            .collect();
        let disconnected: Vec<usize> = (0..degree)
            .filter(|b| !connected.contains(b))
            .collect();
        self.produced.insert(node);

        if !disconnected.is_empty() {
            // Ride over continuity into the first empty branch and end the
            // yarn there; the other empty branches each get their own
            // end-yarn block; connected branches restart fresh.
            self.push_block(
                node,
                vec![CourseRef::Continuity, CourseRef::Branch(disconnected[0])],
                YarnPlan { ending: true, ..Default::default() },
            );
            for b in disconnected.iter().skip(1) {
                self.push_block(
                    node,
                    vec![CourseRef::Branch(*b)],
                    YarnPlan { starting: true, ending: true, ..Default::default() },
                );
            }
            for b in &connected {
                if let Some(far) = self.skel.other_side(node, Path::Branch(*b)) {
                    self.starts.push((far.node, far.path));
                }
            }
            return;
        }

        let Some(first) = connected.first().copied() else {
            // Degenerate split without branches: nothing to ride into.
            self.push_block(node, vec![CourseRef::Continuity], YarnPlan {
                ending: true,
                ..Default::default()
            });
            return;
        };
        let suspending = connected.len() > 1;
        self.push_block(
            node,
            vec![CourseRef::Continuity, CourseRef::Branch(first)],
            YarnPlan { suspending, ..Default::default() },
        );
        if let Some(far) = self.skel.other_side(node, Path::Branch(first)) {
            self.queue.push_back((far.node, far.path));
        }
        for b in connected.iter().skip(1) {
            if let Some(far) = self.skel.other_side(node, Path::Branch(*b)) {
                self.starts.push((far.node, far.path));
            }
        }
    }

    /// Split entered from one of its branches: every other connected branch
    /// must already be produced, otherwise the yarn suspends here and a
    /// fresh start is found inside an unfinished branch.
    fn split_from_branch(
        &mut self,
        node: NodeId,
        entry: Path,
        degree: usize,
    ) -> Result<(), core_bed::CompileError> {
        let unfinished: Vec<ItfSide> = (0..degree)
            .map(Path::Branch)
            .filter(|p| *p != entry)
            .filter_map(|p| self.skel.other_side(node, p))
            .filter(|far| !self.produced.contains(&far.node))
            .collect();

        if let Some(first) = unfinished.first() {
            let tick = self.produced.len();
            if self.postponed.insert((node, entry), tick) == Some(tick) {
                // Re-postponed with no progress: the branches depend on each
                // other.
                return Err(core_bed::CompileError::DependencyLoop {
                    node: self.skel.node(node).name.clone(),
                });
            }
            // Park the yarn on the block that brought us here.
            if let Some(last) = self.blocks.last_mut() {
                last.yarn.ending = true;
                last.yarn.suspending = true;
            }
            // Restart inside the unfinished branch (never back through this
            // split) and retry the entry once the queue drains.
            let source = self
                .reachable_source(first.node, node)
                .unwrap_or((first.node, first.path));
            self.pending_start = true;
            self.queue.push_back(source);
            self.starts.push((node, entry));
            return Ok(());
        }

        self.postponed.remove(&(node, entry));
        self.produced.insert(node);
        self.push_block(
            node,
            vec![CourseRef::Continuity, CourseRef::Base],
            YarnPlan::default(),
        );
        if let Some(far) = self.skel.other_side(node, Path::Base) {
            self.queue.push_back((far.node, far.path));
        }
        Ok(())
    }

    /// An unproduced entry point from which `target` is reachable without
    /// walking back through `avoid`: the dangling position with the
    /// earliest order wins.
    fn reachable_source(&self, target: NodeId, avoid: NodeId) -> Option<(NodeId, Path)> {
        let mut seen = HashSet::new();
        seen.insert(avoid);
        let mut stack = vec![target];
        let mut best: Option<(NodeId, Path, i64)> = None;
        while let Some(n) = stack.pop() {
            if !seen.insert(n) || self.produced.contains(&n) {
                continue;
            }
            for path in self.skel.node(n).paths() {
                match self.skel.other_side(n, path) {
                    Some(far) => stack.push(far.node),
                    None => {
                        let o = self.order_of(n, path);
                        if best.is_none_or(|(_, _, b)| o < b) {
                            best = Some((n, path, o));
                        }
                    },
                }
            }
        }
        best.map(|(n, p, _)| (n, p))
    }
}

/// Depth-first reachability through opposite sides, used when resolving
/// postponed splits.
pub fn path_reaches(skel: &Skeleton, from: NodeId, to: NodeId) -> bool {
    let mut seen = HashSet::new();
    let mut stack = vec![from];
    while let Some(n) = stack.pop() {
        if n == to {
            return true;
        }
        if !seen.insert(n) {
            continue;
        }
        for (_, far) in skel.connections(n) {
            stack.push(far.node);
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_shape::{Sheet, Sidedness, Split, WidthProfile};

    fn sheet(w: usize) -> NodeKind {
        NodeKind::Sheet(Sheet {
            width: WidthProfile::Constant(w),
            sides: Sidedness::Flat,
            courses: 4,
            shortrows: false,
        })
    }

    #[test]
    fn linear_chain_is_one_yarn() {
        let mut skel = Skeleton::new();
        let a = skel.add("a", sheet(10));
        let b = skel.add("b", sheet(10));
        let c = skel.add("c", sheet(10));
        skel.connect(a, Path::Top, b, Path::Bottom);
        skel.connect(b, Path::Top, c, Path::Bottom);

        let blocks = schedule(&skel, a, Path::Bottom).unwrap();
        assert_eq!(blocks.len(), 3);
        assert!(blocks[0].yarn.starting);
        assert!(!blocks[1].yarn.starting);
        assert!(blocks[2].yarn.ending);
        assert_eq!(blocks[0].courses, vec![CourseRef::All { ascending: true }]);
    }

    #[test]
    fn entry_from_top_walks_descending() {
        let mut skel = Skeleton::new();
        let a = skel.add("a", sheet(10));
        let blocks = schedule(&skel, a, Path::Top).unwrap();
        assert_eq!(blocks[0].courses, vec![CourseRef::All { ascending: false }]);
    }

    #[test]
    fn folded_split_suspends_and_restarts() {
        let mut skel = Skeleton::new();
        let base = skel.add("base", sheet(12));
        let split = skel.add("split", NodeKind::Split(Split { degree: 2, folded: true }));
        let left = skel.add("left", sheet(6));
        let right = skel.add("right", sheet(6));
        skel.connect(base, Path::Top, split, Path::Base);
        skel.connect(split, Path::Branch(0), left, Path::Bottom);
        skel.connect(split, Path::Branch(1), right, Path::Bottom);

        let blocks = schedule(&skel, base, Path::Bottom).unwrap();
        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0].node, base);
        assert_eq!(blocks[1].node, split);
        assert_eq!(
            blocks[1].courses,
            vec![CourseRef::Continuity, CourseRef::Branch(0)]
        );
        assert!(blocks[1].yarn.suspending);
        assert_eq!(blocks[2].node, left);
        // The second branch restarts fresh right after the first finishes.
        assert_eq!(blocks[3].node, right);
        assert!(blocks[3].yarn.starting);
        assert!(blocks[3].yarn.ending);
    }

    #[test]
    fn split_with_disconnected_branch_ends_yarn_there() {
        let mut skel = Skeleton::new();
        let base = skel.add("base", sheet(12));
        let split = skel.add("split", NodeKind::Split(Split { degree: 2, folded: false }));
        let right = skel.add("right", sheet(6));
        skel.connect(base, Path::Top, split, Path::Base);
        skel.connect(split, Path::Branch(1), right, Path::Bottom);

        let blocks = schedule(&skel, base, Path::Bottom).unwrap();
        // base, split (continuity + empty branch 0, ending), right (fresh).
        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[1].courses,
            vec![CourseRef::Continuity, CourseRef::Branch(0)]
        );
        assert!(blocks[1].yarn.ending);
        assert!(blocks[2].yarn.starting);
        assert_eq!(blocks[2].node, right);
    }

    #[test]
    fn branch_entry_waits_for_siblings() {
        let mut skel = Skeleton::new();
        let left = skel.add("left", sheet(6));
        let right = skel.add("right", sheet(6));
        let split = skel.add("split", NodeKind::Split(Split { degree: 2, folded: false }));
        let below = skel.add("below", sheet(12));
        skel.connect(left, Path::Top, split, Path::Branch(0));
        skel.connect(right, Path::Top, split, Path::Branch(1));
        skel.connect(split, Path::Base, below, Path::Top);

        let blocks = schedule(&skel, left, Path::Bottom).unwrap();
        let nodes: Vec<NodeId> = blocks.iter().map(|b| b.node).collect();
        // Both branches precede the split; the base sheet comes last,
        // walked downward.
        assert_eq!(nodes, vec![left, right, split, below]);
        assert!(blocks[0].yarn.ending && blocks[0].yarn.suspending);
        assert_eq!(
            blocks[2].courses,
            vec![CourseRef::Continuity, CourseRef::Base]
        );
        assert_eq!(
            blocks[3].courses,
            vec![CourseRef::All { ascending: false }]
        );
    }

    #[test]
    fn reachability_walks_connections() {
        let mut skel = Skeleton::new();
        let a = skel.add("a", sheet(4));
        let b = skel.add("b", sheet(4));
        let c = skel.add("c", sheet(4));
        skel.connect(a, Path::Top, b, Path::Bottom);
        assert!(path_reaches(&skel, a, b));
        assert!(!path_reaches(&skel, a, c));
    }
}
