//! Sidedness and size inference over the shape graph.
//!
//! Both run as bounded fixed points: sidedness recurses with a visited set,
//! size inference sweeps the reachable interfaces until one full pass makes
//! no change, then falls back to minimum bounds for whatever stayed open.

use crate::{ItfId, ItfSide, NodeId, NodeKind, Path, Sidedness, Skeleton};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Whether the course entered at (node, path) lays out on both beds.
pub fn infer_sidedness(skel: &Skeleton, node: NodeId, path: Path) -> bool {
    let mut visited = HashSet::new();
    sidedness(skel, node, path, &mut visited)
}

fn sidedness(
    skel: &Skeleton,
    node: NodeId,
    path: Path,
    visited: &mut HashSet<(NodeId, Path)>,
) -> bool {
    if !visited.insert((node, path)) {
        // Revisit during the fixed point: contribute the neutral answer.
        return false;
    }
    match &skel.node(node).kind {
        NodeKind::Sheet(sheet) => match sheet.sides {
            Sidedness::Flat => false,
            Sidedness::Cylinder => {
                // A closed end flattens the tube at that interface.
                !skel.itf_of(node, path).is_some_and(|itf| itf.closed)
            },
            Sidedness::Auto => {
                // Fixed point over connected neighbors.
                skel.connections(node)
                    .into_iter()
                    .any(|(_, far)| sidedness(skel, far.node, far.path, visited))
            },
        },
        NodeKind::Custom(custom) => match path {
            Path::Top => custom.last_two_sided,
            _ => custom.first_two_sided,
        },
        NodeKind::Joint(_) => {
            // Joints default to both beds, overridden by a resolved far side.
            match skel.other_side(node, path) {
                Some(far) => match &skel.node(far.node).kind {
                    NodeKind::Sheet(s) if s.sides == Sidedness::Flat => false,
                    NodeKind::Sheet(s) if s.sides == Sidedness::Cylinder => {
                        sidedness(skel, far.node, far.path, visited)
                    },
                    _ => true,
                },
                None => true,
            }
        },
        NodeKind::Split(split) => match path {
            Path::Branch(_) => split.folded,
            _ => match skel.other_side(node, Path::Base) {
                Some(far) => sidedness(skel, far.node, far.path, visited),
                None => false,
            },
        },
    }
}

/// Resolved interface widths.
#[derive(Debug, Clone, Default)]
pub struct SizeTable {
    sizes: HashMap<ItfId, usize>,
    min_sizes: HashMap<ItfId, usize>,
    /// Interfaces the fixed point could not resolve (reported, defaulted).
    pub unresolved: Vec<ItfId>,
}

impl SizeTable {
    pub fn get(&self, skel: &Skeleton, node: NodeId, path: Path) -> Option<usize> {
        let itf = skel.itf_of(node, path)?;
        self.sizes.get(&itf.id).copied()
    }

    fn propose(&mut self, itf: ItfId, size: usize) -> bool {
        match self.sizes.get(&itf) {
            Some(_) => false,
            None => {
                self.sizes.insert(itf, size);
                true
            },
        }
    }

    fn bound(&mut self, itf: ItfId, min: usize) {
        let entry = self.min_sizes.entry(itf).or_insert(min);
        *entry = (*entry).max(min);
    }
}

/// Compute widths for every interface reachable from `start` by bounded
/// propagation. Unresolvable interfaces fall back to their minimum bound
/// (default 2) with a warning.
pub fn infer_all_sizes(skel: &Skeleton, start: NodeId) -> SizeTable {
    let mut table = SizeTable::default();
    let reachable = reach(skel, start);

    // Seed pass plus propagation until a full sweep changes nothing.
    let mut changed = true;
    let mut sweeps = 0usize;
    while changed && sweeps <= skel.node_count() + 1 {
        changed = false;
        sweeps += 1;
        for &node in &reachable {
            if sweep_node(skel, node, &mut table) {
                changed = true;
            }
        }
    }

    // Fallback for anything still open.
    for &node in &reachable {
        for path in skel.node(node).paths() {
            let Some(itf) = skel.itf_of(node, path) else { continue };
            let id = itf.id;
            if !table.sizes.contains_key(&id) {
                let fallback = table.min_sizes.get(&id).copied().unwrap_or(2);
                warn!(node = %skel.node(node).name, %path, fallback, "interface size unresolved");
                table.sizes.insert(id, fallback);
                table.unresolved.push(id);
            }
        }
    }
    table
}

fn sweep_node(skel: &Skeleton, node: NodeId, table: &mut SizeTable) -> bool {
    let mut changed = false;
    let ids: HashMap<Path, ItfId> = skel
        .node(node)
        .paths()
        .into_iter()
        .filter_map(|p| skel.itf_of(node, p).map(|itf| (p, itf.id)))
        .collect();

    match &skel.node(node).kind {
        NodeKind::Sheet(sheet) => {
            // Sheets know both ends outright: width(t) at the extremes.
            if let Some(&bottom) = ids.get(&Path::Bottom) {
                changed |= table.propose(bottom, sheet.width.eval(0.0));
            }
            if let Some(&top) = ids.get(&Path::Top) {
                changed |= table.propose(top, sheet.width.eval(1.0));
            }
        },
        NodeKind::Custom(custom) => {
            if let Some(&bottom) = ids.get(&Path::Bottom) {
                changed |= table.propose(bottom, custom.bottom_size);
            }
            if let Some(&top) = ids.get(&Path::Top) {
                changed |= table.propose(top, custom.top_size);
            }
        },
        NodeKind::Joint(joint) => {
            // A joint spans the larger of its own width and whatever the far
            // side already resolved; connected ends carry a minimum bound.
            for (&path, &id) in &ids {
                let far = skel
                    .other_side(node, path)
                    .and_then(|far: ItfSide| {
                        skel.itf_of(far.node, far.path).and_then(|i| table.sizes.get(&i.id))
                    })
                    .copied();
                let proposal = far.map_or(joint.width.max(), |f| f.max(joint.width.max()));
                if skel.itf_of(node, path).is_some_and(|i| i.is_connected()) {
                    table.bound(id, joint.width.max());
                }
                if far.is_some() {
                    changed |= table.propose(id, proposal);
                }
            }
        },
        NodeKind::Split(split) => {
            let base = ids.get(&Path::Base).copied();
            let branches: Vec<ItfId> = (0..split.degree)
                .filter_map(|b| ids.get(&Path::Branch(b)).copied())
                .collect();
            let known: Vec<Option<usize>> =
                branches.iter().map(|id| table.sizes.get(id).copied()).collect();
            let two_sided_unfolded =
                !split.folded && infer_sidedness(skel, node, Path::Base);

            // Base from branches.
            if known.iter().all(Option::is_some) {
                let sum: usize = known.iter().map(|s| s.unwrap()).sum();
                let base_size = if two_sided_unfolded { sum.div_ceil(2) } else { sum };
                if let Some(base) = base {
                    changed |= table.propose(base, base_size);
                }
            }
            // Last missing branch from the base.
            if let Some(base_size) = base.and_then(|b| table.sizes.get(&b).copied()) {
                let missing: Vec<usize> = known
                    .iter()
                    .enumerate()
                    .filter(|(_, s)| s.is_none())
                    .map(|(i, _)| i)
                    .collect();
                if missing.len() == 1 {
                    let others: usize = known.iter().flatten().sum();
                    let total = if two_sided_unfolded { base_size * 2 } else { base_size };
                    let rest = total.saturating_sub(others).max(1);
                    changed |= table.propose(branches[missing[0]], rest);
                }
            }
        },
    }
    changed
}

fn reach(skel: &Skeleton, start: NodeId) -> Vec<NodeId> {
    let mut seen = HashSet::new();
    let mut stack = vec![start];
    let mut out = Vec::new();
    while let Some(n) = stack.pop() {
        if !seen.insert(n) {
            continue;
        }
        out.push(n);
        for (_, far) in skel.connections(n) {
            stack.push(far.node);
        }
    }
    out
}
