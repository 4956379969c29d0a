//! Topological numbering of shape positions.
//!
//! Breadth-first from the user-chosen start side with forward and backward
//! expansion folded into one signed order: stepping through a node from a
//! lower path (bottom/base) to an upper path (top/branch) adds one,
//! stepping down subtracts one, and the two sides of an interface share
//! their order. Only a smaller absolute order may override an assignment;
//! orders past the node count flag the graph as not knittable.

use core_bed::CompileError;
use core_shape::{NodeId, Path, Skeleton};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OrderKey {
    pub node: NodeId,
    pub path: Path,
}

fn level(path: Path) -> i64 {
    if path.is_lower() { 0 } else { 1 }
}

pub fn order_graph(
    skel: &Skeleton,
    start: NodeId,
    start_path: Path,
) -> Result<HashMap<OrderKey, i64>, CompileError> {
    let bound = skel.node_count() as i64 + 1;
    let mut orders: HashMap<OrderKey, i64> = HashMap::new();
    let mut queue: VecDeque<(NodeId, Path, i64)> = VecDeque::new();
    queue.push_back((start, start_path, 0));

    while let Some((node, path, o)) = queue.pop_front() {
        if o.abs() > bound {
            return Err(CompileError::DependencyLoop {
                node: skel.node(node).name.clone(),
            });
        }
        let key = OrderKey { node, path };
        if let Some(&existing) = orders.get(&key) {
            if existing.abs() <= o.abs() {
                continue;
            }
        }
        orders.insert(key, o);

        // The far side of the seam shares the order; continue through it.
        if let Some(far) = skel.other_side(node, path) {
            let far_key = OrderKey { node: far.node, path: far.path };
            let improves = orders.get(&far_key).is_none_or(|e| e.abs() > o.abs());
            if improves {
                orders.insert(far_key, o);
                for p in skel.node(far.node).paths() {
                    if p != far.path {
                        queue.push_back((far.node, p, o + level(p) - level(far.path)));
                    }
                }
            }
        }

        // Step to this node's other paths.
        for p in skel.node(node).paths() {
            if p != path {
                queue.push_back((node, p, o + level(p) - level(path)));
            }
        }
    }
    Ok(orders)
}
