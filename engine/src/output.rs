//! Output assembly: walk a finished search path once, decorate each
//! traversed link into concrete performed events, place mines against the
//! resulting step stream, then produce the final time-ordered output.

use rand::Rng;

use step_graph::{Foot, FootAction, GraphLink, Pad, Portion};

use crate::chart::{ExpressedChart, InstanceVariant, PerformedAction, PerformedEvent, PerformedPath};
use crate::mines;
use crate::node::{NodeArena, NodeId};

/// Turn a root-to-leaf `path` through `arena` into the final performed
/// event stream, matching chart events to the link traversed at each step.
pub fn assemble(
    arena: &NodeArena,
    path: &[NodeId],
    chart: &ExpressedChart,
    pad: &Pad,
    rng: &mut impl Rng,
) -> PerformedPath {
    let mut events = Vec::new();

    for (i, &id) in path.iter().enumerate().skip(1) {
        let node = arena.get(id);
        let Some(link) = node.incoming_link else {
            continue;
        };
        let Some(event) = chart.events.get(i - 1) else {
            continue;
        };
        let parent_node = arena.get(node.parent.expect("non-root node has a parent")).graph_node;
        decorate_link(&mut events, &link, event, &parent_node, &node.graph_node);
    }

    mines::place_mines(&mut events, &chart.mines, pad.num_arrows(), rng);

    events.sort_by_key(|e| (e.position, sort_rank(e.action)));
    PerformedPath { events }
}

fn sort_rank(action: PerformedAction) -> u8 {
    match action {
        PerformedAction::Mine => 1,
        _ => 0,
    }
}

fn decorate_link(
    events: &mut Vec<PerformedEvent>,
    link: &GraphLink,
    event: &crate::chart::ExpressedEvent,
    parent_node: &step_graph::GraphNode,
    dest_node: &step_graph::GraphNode,
) {
    for &foot in &Foot::ALL {
        for &portion in &Portion::ALL {
            let cell = link.cell(foot, portion);
            if !cell.valid {
                continue;
            }
            let variant = event.instance_variants[foot.index()][portion.index()];
            let (lane, action) = match cell.action {
                FootAction::Release => (
                    parent_node.portion(foot, portion).arrow.index(),
                    PerformedAction::HoldEnd,
                ),
                FootAction::Hold => (
                    dest_node.portion(foot, portion).arrow.index(),
                    if variant == InstanceVariant::Roll {
                        PerformedAction::RollStart
                    } else {
                        PerformedAction::HoldStart
                    },
                ),
                FootAction::Tap => {
                    let lane = dest_node.portion(foot, portion).arrow.index();
                    let action = match variant {
                        InstanceVariant::Fake => PerformedAction::Fake,
                        InstanceVariant::Lift => PerformedAction::Lift,
                        InstanceVariant::Roll | InstanceVariant::Default => PerformedAction::Tap,
                    };
                    (lane, action)
                }
            };
            events.push(PerformedEvent {
                position: event.position,
                lane,
                action,
                foot: Some(foot),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{EventIdx, ExpressedEvent};
    use crate::cost::CostVector;
    use crate::node::{SearchNode, SlidingWindow};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use std::collections::HashMap;
    use step_graph::{ArrowIdx, FootPortionState, GraphNode, LinkCell, StepType};

    fn four_panel_pad() -> Pad {
        let positions = vec![(-1.0, 0.0), (0.0, -1.0), (0.0, 1.0), (1.0, 0.0)];
        let mirror = vec![3, 1, 2, 0].into_iter().map(ArrowIdx::from).collect();
        let flip = vec![0, 2, 1, 3].into_iter().map(ArrowIdx::from).collect();
        Pad::new(positions, mirror, flip, 0.25, 0.25)
    }

    fn resting(arrow_left: usize, arrow_right: usize) -> GraphNode {
        GraphNode {
            portions: [
                [
                    FootPortionState { arrow: ArrowIdx::from(arrow_left), holding: false },
                    FootPortionState { arrow: ArrowIdx::from(arrow_left), holding: false },
                ],
                [
                    FootPortionState { arrow: ArrowIdx::from(arrow_right), holding: false },
                    FootPortionState { arrow: ArrowIdx::from(arrow_right), holding: false },
                ],
            ],
        }
    }

    #[test]
    fn assemble_emits_one_tap_per_single_foot_step() {
        let pad = four_panel_pad();
        let mut arena = NodeArena::new();
        let root = arena.insert(SearchNode::root(resting(0, 3), pad.num_arrows(), 1.0));

        let mut link = GraphLink::BLANK;
        link.set_cell(
            Foot::Left,
            Portion::Heel,
            LinkCell { step_type: StepType::NewArrow, action: FootAction::Tap, valid: true, stretch: false },
        );
        let child = arena.insert(SearchNode {
            graph_node: resting(1, 3),
            incoming_link: Some(link),
            depth: 1,
            parent: Some(root),
            cost: CostVector::zero(),
            window: SlidingWindow::initial(1.0),
            lane_counts: vec![0; pad.num_arrows()],
            children: HashMap::new(),
        });
        arena.get_mut(root).children.insert(link, vec![child]);

        let chart = ExpressedChart {
            events: {
                let mut v = index_vec::IndexVec::<EventIdx, _>::new();
                v.push(ExpressedEvent {
                    position: 0,
                    time: 0.0,
                    link,
                    instance_variants: Default::default(),
                });
                v
            },
            mines: Vec::new(),
        };

        let path = arena.path_to_root(child);
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let performed = assemble(&arena, &path, &chart, &pad, &mut rng);
        assert_eq!(performed.events.len(), 1);
        assert_eq!(performed.events[0].action, PerformedAction::Tap);
        assert_eq!(performed.events[0].lane, 1);
    }
}
