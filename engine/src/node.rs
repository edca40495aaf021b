//! The search node arena: one node per explored partial path, owned by an
//! `index_vec`-keyed arena rather than linked by intrusive pointers.
//!
//! Nodes are never physically freed mid-search (relocating indices on
//! removal would be more expensive than leaving an orphaned slot);
//! pruning only removes a child's id from its parent's `children` map.

use std::collections::HashMap;

use step_graph::{GraphLink, GraphNode};

use crate::cost::CostVector;

index_vec::define_index_type! {
    /// Arena index of a [`SearchNode`]. Monotonically increasing per
    /// search invocation, giving each node a stable identity.
    pub struct NodeId = usize;
}

/// The sliding-window tracking state snapshotted at each node, used by the
/// cost subroutines in [`crate::cost`] without needing to walk back up
/// the tree.
#[derive(Debug, Clone, Copy)]
pub struct SlidingWindow {
    pub last_time_foot_stepped: [f64; 2],
    pub last_time_foot_released: [f64; 2],
    pub step_counts_total: u32,
    pub total_steps_in_pattern: u32,
    pub total_num_inward_steps: u32,
    pub total_num_outward_steps: u32,
    pub total_num_same_arrow: u32,
    pub total_num_new_arrow: u32,
    pub total_num_same_arrow_in_a_row_over_max: u32,
    pub same_arrow_run_per_foot: [u32; 2],
    pub lateral_body_position: f64,
    pub lateral_movement_direction: LateralDirection,
    pub last_lateral_start_time: f64,
    pub last_lateral_start_position: f64,
    pub lateral_movement_num_steps: u32,
    pub lateral_movement_speed: f64,
    pub chart_average_nps: f64,
    pub transitioned_left: Option<bool>,
    pub steps_since_last_transition: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LateralDirection {
    Left,
    Right,
    None,
}

impl SlidingWindow {
    pub fn initial(chart_average_nps: f64) -> Self {
        Self {
            last_time_foot_stepped: [f64::NEG_INFINITY; 2],
            last_time_foot_released: [f64::NEG_INFINITY; 2],
            step_counts_total: 0,
            total_steps_in_pattern: 0,
            total_num_inward_steps: 0,
            total_num_outward_steps: 0,
            total_num_same_arrow: 0,
            total_num_new_arrow: 0,
            total_num_same_arrow_in_a_row_over_max: 0,
            same_arrow_run_per_foot: [0, 0],
            lateral_body_position: 0.0,
            lateral_movement_direction: LateralDirection::None,
            last_lateral_start_time: 0.0,
            last_lateral_start_position: 0.0,
            lateral_movement_num_steps: 0,
            lateral_movement_speed: 0.0,
            chart_average_nps,
            transitioned_left: None,
            steps_since_last_transition: 0,
        }
    }
}

/// A single explored partial path. Immutable once constructed except for
/// `children`, which the driver mutates during pruning.
#[derive(Debug, Clone)]
pub struct SearchNode {
    pub graph_node: GraphNode,
    pub incoming_link: Option<GraphLink>,
    pub depth: u32,
    pub parent: Option<NodeId>,
    pub cost: CostVector,
    pub window: SlidingWindow,
    /// Per-lane observed step counts, used by the distribution cost.
    pub lane_counts: Vec<u32>,
    /// Owns the edges to this node's children, keyed by the link that was
    /// actually traversed (several graph-nodes may share the same
    /// incoming link from this parent; each gets its own arena slot).
    pub children: HashMap<GraphLink, Vec<NodeId>>,
}

impl SearchNode {
    pub fn root(graph_node: GraphNode, num_lanes: usize, chart_average_nps: f64) -> Self {
        Self {
            graph_node,
            incoming_link: None,
            depth: 0,
            parent: None,
            cost: CostVector::zero(),
            window: SlidingWindow::initial(chart_average_nps),
            lane_counts: vec![0; num_lanes],
            children: HashMap::new(),
        }
    }
}

/// The arena owning every [`SearchNode`] explored during one invocation of
/// `satisfy` or `generate`.
#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    nodes: index_vec::IndexVec<NodeId, SearchNode>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self {
            nodes: index_vec::IndexVec::new(),
        }
    }

    pub fn insert(&mut self, node: SearchNode) -> NodeId {
        self.nodes.push(node)
    }

    pub fn get(&self, id: NodeId) -> &SearchNode {
        &self.nodes[id]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut SearchNode {
        &mut self.nodes[id]
    }

    /// Remove `child` from `parent`'s children map. If `parent` then has
    /// no surviving children and has a parent of its own, recursively
    /// collapse upward until a parent still has other children.
    pub fn prune(&mut self, parent: NodeId, link: &GraphLink, child: NodeId) {
        let grandparent = {
            let parent_node = self.get_mut(parent);
            if let Some(children) = parent_node.children.get_mut(link) {
                children.retain(|&id| id != child);
                if children.is_empty() {
                    parent_node.children.remove(link);
                }
            }
            if parent_node.children.is_empty() {
                parent_node.parent
            } else {
                return;
            }
        };
        if let Some(grandparent) = grandparent {
            if let Some(incoming) = self.get(parent).incoming_link {
                self.prune(grandparent, &incoming, parent);
            }
        }
    }

    /// If `id` has no surviving children, unlink it from its own parent
    /// (recursively collapsing upward). A no-op for the root or for any
    /// node that still has children.
    pub fn collapse_if_childless(&mut self, id: NodeId) {
        if !self.get(id).children.is_empty() {
            return;
        }
        let (parent, incoming) = match (self.get(id).parent, self.get(id).incoming_link) {
            (Some(parent), Some(incoming)) => (parent, incoming),
            _ => return,
        };
        self.prune(parent, &incoming, id);
    }

    /// Walk from `leaf` back to the root, returning ids in root-to-leaf
    /// order as a dense sequence.
    pub fn path_to_root(&self, leaf: NodeId) -> Vec<NodeId> {
        let mut path = vec![leaf];
        let mut current = leaf;
        while let Some(parent) = self.get(current).parent {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use step_graph::ArrowIdx;

    fn dummy_node(arrow: usize) -> GraphNode {
        GraphNode {
            portions: [
                [
                    step_graph::FootPortionState {
                        arrow: ArrowIdx::from(arrow),
                        holding: false,
                    },
                    step_graph::FootPortionState {
                        arrow: ArrowIdx::from(arrow),
                        holding: false,
                    },
                ],
                [
                    step_graph::FootPortionState {
                        arrow: ArrowIdx::from(arrow + 1),
                        holding: false,
                    },
                    step_graph::FootPortionState {
                        arrow: ArrowIdx::from(arrow + 1),
                        holding: false,
                    },
                ],
            ],
        }
    }

    #[test]
    fn prune_collapses_empty_parents_upward() {
        let mut arena = NodeArena::new();
        let root = arena.insert(SearchNode::root(dummy_node(0), 4, 1.0));
        let link = GraphLink::BLANK;
        let mid = arena.insert(SearchNode {
            graph_node: dummy_node(0),
            incoming_link: Some(link),
            depth: 1,
            parent: Some(root),
            cost: CostVector::zero(),
            window: SlidingWindow::initial(1.0),
            lane_counts: vec![0; 4],
            children: HashMap::new(),
        });
        arena.get_mut(root).children.insert(link, vec![mid]);

        let leaf = arena.insert(SearchNode {
            graph_node: dummy_node(0),
            incoming_link: Some(link),
            depth: 2,
            parent: Some(mid),
            cost: CostVector::zero(),
            window: SlidingWindow::initial(1.0),
            lane_counts: vec![0; 4],
            children: HashMap::new(),
        });
        arena.get_mut(mid).children.insert(link, vec![leaf]);

        arena.prune(mid, &link, leaf);
        assert!(arena.get(root).children.is_empty());
    }

    #[test]
    fn path_to_root_orders_root_first() {
        let mut arena = NodeArena::new();
        let root = arena.insert(SearchNode::root(dummy_node(0), 4, 1.0));
        let child = arena.insert(SearchNode {
            graph_node: dummy_node(0),
            incoming_link: Some(GraphLink::BLANK),
            depth: 1,
            parent: Some(root),
            cost: CostVector::zero(),
            window: SlidingWindow::initial(1.0),
            lane_counts: vec![0; 4],
            children: HashMap::new(),
        });
        let path = arena.path_to_root(child);
        assert_eq!(path, vec![root, child]);
    }
}
