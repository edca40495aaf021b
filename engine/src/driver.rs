//! The two search entry points: satisfy an already-expressed chart exactly,
//! or generate a pattern bounded by start/end positions. Both share the
//! same frontier-expansion/dominance-pruning shape: explore one event at a
//! time, keep only the cheapest child per reachable graph-node, collapse
//! parents that end up with no surviving children.

use std::collections::{HashMap, HashSet};

use index_vec::IndexVec;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use step_graph::fallback::ReplacementTable;
use step_graph::{ArrowIdx, FallbackTable, Foot, FootAction, GraphLink, GraphNode, Pad, Portion, StepGraph, StepType};

use crate::chart::{EventIdx, ExpressedChart, ExpressedEvent, InstanceVariant, PerformedPath};
use crate::config::{Config, FootEndChoice, FootStartChoice, PatternConfig, StartingFootChoice};
use crate::cost::{self, CostIncrement};
use crate::error::{Error, Result};
use crate::node::{LateralDirection, NodeArena, NodeId, SearchNode};
use crate::output;

index_vec::define_index_type! {
    /// One equivalence class of starting graph-nodes within a tiered root
    /// list — a rank-ordered equivalence class of initial graph-nodes.
    pub struct RootIdx = usize;
}

fn nn(v: f64) -> ordered_float::NotNan<f64> {
    ordered_float::NotNan::new(v).unwrap_or_else(|_| ordered_float::NotNan::new(0.0).unwrap())
}

// ---------------------------------------------------------------------
// satisfy
// ---------------------------------------------------------------------

/// Try every root in every tier (best tier first, roots shuffled within a
/// tier) until one produces a complete path.
#[allow(clippy::too_many_arguments)]
pub fn satisfy(
    graph: &StepGraph,
    pad: &Pad,
    config: &Config,
    root_tiers: &[Vec<GraphNode>],
    fallback_table: &FallbackTable,
    replacements: &ReplacementTable,
    chart: &ExpressedChart,
    seed: u64,
    log_id: &str,
) -> Result<PerformedPath> {
    satisfy_cancellable(
        graph,
        pad,
        config,
        root_tiers,
        fallback_table,
        replacements,
        chart,
        seed,
        log_id,
        &|| false,
    )
}

/// As [`satisfy`], but polls `cancel` between events and between children,
/// returning [`Error::Cancelled`] as soon as it answers `true`.
#[allow(clippy::too_many_arguments)]
pub fn satisfy_cancellable(
    graph: &StepGraph,
    pad: &Pad,
    config: &Config,
    root_tiers: &[Vec<GraphNode>],
    fallback_table: &FallbackTable,
    replacements: &ReplacementTable,
    chart: &ExpressedChart,
    seed: u64,
    log_id: &str,
    cancel: &dyn Fn() -> bool,
) -> Result<PerformedPath> {
    config.validate()?;
    pad.validate()
        .map_err(|e| Error::ConfigError(e.to_string()))?;

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut furthest_per_root: IndexVec<RootIdx, EventIdx> = IndexVec::new();

    for (tier_idx, tier) in root_tiers.iter().enumerate() {
        let mut roots = tier.clone();
        roots.shuffle(&mut rng);
        for root_graph_node in roots {
            if cancel() {
                return Err(Error::Cancelled);
            }
            match run_satisfy_root(graph, pad, config, fallback_table, replacements, chart, root_graph_node, &mut rng, cancel)? {
                RootOutcome::Success(arena, leaf) => {
                    if tier_idx > 0 {
                        log::info!(
                            "[{log_id}] satisfied {} events using fallback tier {tier_idx}",
                            chart.events.len()
                        );
                    }
                    let path = arena.path_to_root(leaf);
                    return Ok(output::assemble(&arena, &path, chart, pad, &mut rng));
                }
                RootOutcome::DeadEnd(furthest) => furthest_per_root.push(furthest),
            }
        }
    }

    let furthest = crate::error::furthest_reached(&furthest_per_root);
    log::error!("[{log_id}] no feasible path; furthest event reached was {furthest:?}");
    Err(Error::NoFeasiblePath { furthest })
}

enum RootOutcome {
    Success(NodeArena, NodeId),
    DeadEnd(EventIdx),
}

#[allow(clippy::too_many_arguments)]
fn run_satisfy_root(
    graph: &StepGraph,
    pad: &Pad,
    config: &Config,
    fallback_table: &FallbackTable,
    replacements: &ReplacementTable,
    chart: &ExpressedChart,
    root_graph_node: GraphNode,
    rng: &mut ChaCha8Rng,
    cancel: &dyn Fn() -> bool,
) -> Result<RootOutcome> {
    let num_lanes = pad.num_arrows();
    let mut arena = NodeArena::new();

    if !graph.contains(&root_graph_node) {
        return Ok(RootOutcome::DeadEnd(EventIdx::from(0)));
    }

    let root_id = arena.insert(SearchNode::root(root_graph_node, num_lanes, average_nps(chart)));
    let mut frontier = vec![root_id];

    for (event_idx, event) in chart.events.iter_enumerated() {
        if frontier.is_empty() {
            return Ok(RootOutcome::DeadEnd(event_idx));
        }
        let fallback_list = fallback_table.expand(&event.link, replacements);
        let num_siblings = fallback_list.len();
        let mut best_per_dest: HashMap<GraphNode, (NodeId, GraphLink, SearchNode)> = HashMap::new();

        for &parent_id in &frontier {
            if cancel() {
                return Err(Error::Cancelled);
            }
            let parent_graph_node = arena.get(parent_id).graph_node;
            let siblings = graph.successors(&parent_graph_node).to_vec();

            for (link_idx, candidate_link) in fallback_list.iter().enumerate() {
                let fallback_cost = cost::fallback_cost(&event.link, candidate_link, link_idx, num_siblings);

                if candidate_link.is_blank() {
                    // A blank link never moves the graph-node and carries
                    // no lane actions.
                    let dest = parent_graph_node;
                    let slots = vec![None; num_lanes];
                    if let Some(child) = build_child(
                        pad, config, graph, &arena, parent_id, *candidate_link, dest, &slots,
                        event.time, fallback_cost, (0, 0), None, None, rng,
                    ) {
                        consider(&mut best_per_dest, parent_id, *candidate_link, dest, child);
                    }
                    continue;
                }
                for &(link, dest) in siblings.iter().filter(|(l, _)| l == candidate_link) {
                    let Some(slots) = lane_actions(num_lanes, &parent_graph_node, &link, &dest) else {
                        continue;
                    };
                    let (misleading, ambiguous) =
                        cost::misleading_and_ambiguous(&parent_graph_node, &link, &dest, &siblings);
                    if let Some(child) = build_child(
                        pad, config, graph, &arena, parent_id, link, dest, &slots, event.time,
                        fallback_cost, (misleading, ambiguous), None, None, rng,
                    ) {
                        consider(&mut best_per_dest, parent_id, link, dest, child);
                    }
                }
            }
        }

        if best_per_dest.is_empty() {
            return Ok(RootOutcome::DeadEnd(event_idx));
        }
        frontier = commit_level(&mut arena, &frontier, best_per_dest);
    }

    let leaf = frontier
        .into_iter()
        .min_by_key(|&id| arena.get(id).cost)
        .expect("non-empty frontier checked above");
    Ok(RootOutcome::Success(arena, leaf))
}

/// Keep only the lowest-cost candidate per destination graph-node
/// (dominance pruning), insert the survivors into the arena, wire them
/// under their parent, and collapse any parent left with no children.
fn commit_level(
    arena: &mut NodeArena,
    old_frontier: &[NodeId],
    best_per_dest: HashMap<GraphNode, (NodeId, GraphLink, SearchNode)>,
) -> Vec<NodeId> {
    let mut surviving_parents = HashSet::new();
    let mut new_frontier = Vec::with_capacity(best_per_dest.len());
    for (_, (parent_id, link, node)) in best_per_dest {
        let child_id = arena.insert(node);
        arena
            .get_mut(parent_id)
            .children
            .entry(link)
            .or_default()
            .push(child_id);
        surviving_parents.insert(parent_id);
        new_frontier.push(child_id);
    }
    for &parent_id in old_frontier {
        if !surviving_parents.contains(&parent_id) {
            arena.collapse_if_childless(parent_id);
        }
    }
    new_frontier
}

fn consider(
    best: &mut HashMap<GraphNode, (NodeId, GraphLink, SearchNode)>,
    parent_id: NodeId,
    link: GraphLink,
    dest: GraphNode,
    node: SearchNode,
) {
    match best.get(&dest) {
        Some((_, _, existing)) if existing.cost <= node.cost => {}
        _ => {
            best.insert(dest, (parent_id, link, node));
        }
    }
}

/// For every valid cell of `link`, the lane it acts on — the *old* arrow
/// (from `parent`) for a release, the *new* arrow (from `dest`) otherwise —
/// paired with the foot responsible. Returns `None` if two cells disagree
/// about the same lane's action ("no step at the same position as a
/// release on the same lane"), rejecting the candidate outright rather
/// than letting it reach a downstream invariant check.
fn lane_actions(
    num_lanes: usize,
    parent: &GraphNode,
    link: &GraphLink,
    dest: &GraphNode,
) -> Option<Vec<Option<(Foot, FootAction)>>> {
    let mut slots: Vec<Option<(Foot, FootAction)>> = vec![None; num_lanes];
    for &foot in &Foot::ALL {
        for &portion in &Portion::ALL {
            let cell = link.cell(foot, portion);
            if !cell.valid {
                continue;
            }
            let lane = if cell.action == FootAction::Release {
                parent.portion(foot, portion).arrow.index()
            } else {
                dest.portion(foot, portion).arrow.index()
            };
            match slots[lane] {
                Some((_, existing)) if existing != cell.action => return None,
                _ => slots[lane] = Some((foot, cell.action)),
            }
        }
    }
    Some(slots)
}

fn average_nps(chart: &ExpressedChart) -> f64 {
    if chart.events.len() < 2 {
        return 0.0;
    }
    let first = chart.events.first().unwrap().time;
    let last = chart.events.last().unwrap().time;
    let span = (last - first).max(1e-9);
    chart.events.len() as f64 / span
}

fn foot_position_of(pad: &Pad, node: &GraphNode, foot: Foot) -> (f64, f64) {
    let arrows = node.foot_arrows(foot);
    let n = arrows.len() as f64;
    let (sx, sy) = arrows
        .iter()
        .map(|&a| pad.position(a))
        .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
    (sx / n, sy / n)
}

fn dominant_step_type(link: &GraphLink) -> Option<StepType> {
    for &foot in &Foot::ALL {
        for &portion in &Portion::ALL {
            let cell = link.cell(foot, portion);
            if cell.valid && cell.action != FootAction::Release {
                return Some(cell.step_type);
            }
        }
    }
    None
}

/// Build the candidate child node for traversing `link` from `parent_id`
/// to `dest`, computing the full lexicographic cost increment. Returns
/// `None` only if a cost component fails to build as a finite `NotNan`
/// (never hit in practice; costs are bounded sums of finite subroutine
/// outputs).
#[allow(clippy::too_many_arguments)]
fn build_child(
    pad: &Pad,
    config: &Config,
    graph: &StepGraph,
    arena: &NodeArena,
    parent_id: NodeId,
    link: GraphLink,
    dest: GraphNode,
    lane_slots: &[Option<(Foot, FootAction)>],
    event_time: f64,
    fallback: f64,
    (misleading, ambiguous): (u32, u32),
    pattern_weights: Option<(f64, f64)>,
    same_arrow_max_per_foot: Option<u32>,
    rng: &mut ChaCha8Rng,
) -> Option<SearchNode> {
    let _ = graph; // kept for signature symmetry / future sibling lookups
    let parent = arena.get(parent_id);
    let parent_graph_node = parent.graph_node;
    let mut window = parent.window;
    let mut lane_counts = parent.lane_counts.clone();

    let is_step = !link.is_blank() && !link.is_release();
    let time_since_prev_event =
        (event_time - window.last_time_foot_stepped[0].max(window.last_time_foot_stepped[1])).max(0.0);

    let mut travel_distance_total = 0.0_f64;
    let mut travel_speed_total = 0.0_f64;
    let mut same_arrow_overflow = 0u32;

    for &foot in &Foot::ALL {
        let acted = lane_slots
            .iter()
            .flatten()
            .any(|&(f, a)| f == foot && a != FootAction::Release);
        if !acted {
            continue;
        }
        let old_pos = foot_position_of(pad, &parent_graph_node, foot);
        let new_pos = foot_position_of(pad, &dest, foot);
        let time_since = event_time - window.last_time_foot_stepped[foot.index()];
        let distance = cost::compensated_distance(
            pad,
            config,
            old_pos,
            parent_graph_node.is_bracket(foot),
            new_pos,
            dest.is_bracket(foot),
        );
        travel_distance_total += cost::travel_distance_cost(
            config.step_tightening.distance_tightening_enabled,
            distance,
            time_since,
            config.step_tightening.speed_max_time_seconds,
            config.step_tightening.distance_min,
            config.step_tightening.distance_max,
        );
        travel_speed_total += cost::travel_speed_cost(
            config.step_tightening.speed_tightening_enabled,
            distance,
            time_since,
            config.step_tightening.speed_min_time_seconds,
            config.step_tightening.speed_max_time_seconds,
            config.step_tightening.speed_tightening_min_distance,
        );
        window.last_time_foot_stepped[foot.index()] = event_time;

        let foot_step_types: Vec<StepType> = Portion::ALL
            .iter()
            .filter_map(|&p| {
                let c = link.cell(foot, p);
                c.valid.then_some(c.step_type)
            })
            .collect();
        let all_same_arrow = !foot_step_types.is_empty()
            && foot_step_types
                .iter()
                .all(|t| matches!(t, StepType::SameArrow | StepType::BracketSameArrow));
        if all_same_arrow {
            window.same_arrow_run_per_foot[foot.index()] += 1;
        } else {
            window.same_arrow_run_per_foot[foot.index()] = 0;
        }
        if let Some(max) = same_arrow_max_per_foot {
            let run = window.same_arrow_run_per_foot[foot.index()];
            if run > max {
                same_arrow_overflow += run - max;
                window.total_num_same_arrow_in_a_row_over_max += run - max;
            }
        }
    }
    for &foot in &Foot::ALL {
        let released = lane_slots
            .iter()
            .flatten()
            .any(|&(f, a)| f == foot && a == FootAction::Release);
        if released {
            window.last_time_foot_released[foot.index()] = event_time;
        }
    }

    for &foot in &Foot::ALL {
        for &portion in &Portion::ALL {
            let cell = link.cell(foot, portion);
            if !cell.valid || cell.action == FootAction::Release {
                continue;
            }
            let lane = dest.portion(foot, portion).arrow.index();
            lane_counts[lane] += 1;
            if matches!(cell.step_type, StepType::SameArrow | StepType::BracketSameArrow) {
                window.total_num_same_arrow += 1;
            } else {
                window.total_num_new_arrow += 1;
            }
        }
    }

    if is_step {
        window.step_counts_total += 1;
        window.total_steps_in_pattern += 1;
    }

    let mut stretch = 0.0;
    if config.step_tightening.stretch_tightening_enabled {
        let l_pos = foot_position_of(pad, &dest, Foot::Left);
        let r_pos = foot_position_of(pad, &dest, Foot::Right);
        let d = cost::compensated_distance(
            pad,
            config,
            l_pos,
            dest.is_bracket(Foot::Left),
            r_pos,
            dest.is_bracket(Foot::Right),
        );
        stretch = cost::stretch_cost(
            d,
            config.step_tightening.stretch_distance_min.unwrap_or(0.0),
            config.step_tightening.stretch_distance_max.unwrap_or(f64::INFINITY),
        );
    }

    let mut facing = 0;
    if is_step {
        let fraction = dest.feet_on_one_side_fraction(pad);
        let inward_cutoff = config.facing.inward_percentage_cutoff.unwrap_or(1.1);
        let outward_cutoff = config.facing.outward_percentage_cutoff.unwrap_or(-0.1);
        if fraction >= inward_cutoff {
            window.total_num_inward_steps += 1;
        } else if fraction <= outward_cutoff {
            window.total_num_outward_steps += 1;
        }
        facing = cost::facing_cost(
            window.total_num_inward_steps,
            window.total_num_outward_steps,
            window.total_steps_in_pattern,
            config.facing.max_inward_percentage,
            config.facing.max_outward_percentage,
        );
    }

    let mut early_transition = 0;
    let mut late_transition = 0;
    let new_lateral = dest.lateral_body_position(pad);
    if is_step {
        let cutoff = config.transitions.transition_cutoff_percentage.unwrap_or(0.5);
        let side_now = cost::body_side(pad, new_lateral, cutoff);
        let transitioned = matches!(window.transitioned_left, Some(prev) if prev != side_now);
        if config.transitions.enabled {
            let (early, late) = cost::transition_cost(
                pad.width(),
                config.transitions.minimum_pad_width.map(|w| w as f64),
                window.steps_since_last_transition,
                transitioned,
                config.transitions.steps_per_transition_min,
                config.transitions.steps_per_transition_max,
            );
            early_transition = early;
            late_transition = late;
        }
        if transitioned {
            window.transitioned_left = Some(side_now);
            window.steps_since_last_transition = 0;
        } else {
            window.transitioned_left.get_or_insert(side_now);
            window.steps_since_last_transition += 1;
        }
    }

    let mut lateral_body_speed = 0.0;
    if is_step {
        let prev_pos = window.lateral_body_position;
        let direction = if new_lateral > prev_pos + 1e-9 {
            LateralDirection::Right
        } else if new_lateral < prev_pos - 1e-9 {
            LateralDirection::Left
        } else {
            LateralDirection::None
        };
        if direction != LateralDirection::None && direction == window.lateral_movement_direction {
            window.lateral_movement_num_steps += 1;
        } else if direction != LateralDirection::None {
            window.lateral_movement_direction = direction;
            window.last_lateral_start_time = event_time;
            window.last_lateral_start_position = prev_pos;
            window.lateral_movement_num_steps = 1;
        }
        let elapsed = (event_time - window.last_lateral_start_time).max(1e-9);
        window.lateral_movement_speed = (new_lateral - window.last_lateral_start_position).abs() / elapsed;
        let current_nps = 1.0 / time_since_prev_event.max(1e-9);
        lateral_body_speed = cost::lateral_body_speed_cost(&window, current_nps, config);
    }
    window.lateral_body_position = new_lateral;

    let (pattern_type, distribution) = if is_step {
        let weights = dominant_step_type(&link).and_then(|st| config.arrow_weights.weights.get(&st));
        let pattern_type = pattern_weights
            .map(|(same_w, new_w)| {
                cost::pattern_type_cost(window.total_num_same_arrow, window.total_num_new_arrow, same_w, new_w)
            })
            .unwrap_or(0.0);
        let distribution = weights.map(|w| cost::distribution_cost(&lane_counts, w)).unwrap_or(0.0);
        (pattern_type, distribution)
    } else {
        (0.0, 0.0)
    };

    let increment = CostIncrement {
        fallback: nn(fallback),
        misleading,
        ambiguous,
        same_arrow_overflow,
        stretch: nn(stretch),
        facing,
        travel_distance: nn(travel_distance_total),
        travel_speed: nn(travel_speed_total),
        pattern_type: Some(nn(pattern_type)),
        lateral_body_speed: nn(lateral_body_speed),
        early_transition,
        late_transition,
        distribution: Some(nn(distribution)),
        tie_break: nn(rng.gen::<f64>()),
    };

    Some(SearchNode {
        graph_node: dest,
        incoming_link: Some(link),
        depth: parent.depth + 1,
        parent: Some(parent_id),
        cost: parent.cost.accumulate(&increment),
        window,
        lane_counts,
        children: HashMap::new(),
    })
}

// ---------------------------------------------------------------------
// generate
// ---------------------------------------------------------------------

/// The footing for one foot at the start or the following-step boundary:
/// the lane it is known to occupy, if any.
#[derive(Debug, Clone, Copy)]
pub struct Footing {
    pub left: Option<ArrowIdx>,
    pub right: Option<ArrowIdx>,
}

impl Footing {
    fn get(&self, foot: Foot) -> Option<ArrowIdx> {
        match foot {
            Foot::Left => self.left,
            Foot::Right => self.right,
        }
    }
}

/// Generate a pattern between `start_pos` and `end_pos`, seeded from the
/// previous step's foot/time/footing and bounded by the chart's next
/// footing. `position_to_time` stands in for an external tempo/stop
/// timeline; callers supply it so this core never has to know about tempo
/// maps.
#[allow(clippy::too_many_arguments)]
pub fn generate(
    graph: &StepGraph,
    pad: &Pad,
    pattern_config: &PatternConfig,
    config: &Config,
    start_pos: i64,
    end_pos: i64,
    inclusive: bool,
    seed: u64,
    prev_foot: Foot,
    prev_time: f64,
    prev_footing: Footing,
    following_footing: Footing,
    current_lane_counts: &[u32],
    current_chart: &ExpressedChart,
    position_to_time: &dyn Fn(i64) -> f64,
    log_id: &str,
) -> Result<PerformedPath> {
    pattern_config.validate()?;
    config.validate()?;

    const TICKS_PER_MEASURE: i64 = 192;
    let step = (TICKS_PER_MEASURE / pattern_config.beat_subdivision as i64).max(1);

    let mut positions = Vec::new();
    let mut pos = start_pos;
    loop {
        if inclusive {
            if pos > end_pos {
                break;
            }
        } else if pos >= end_pos {
            break;
        }
        positions.push(pos);
        pos += step;
    }
    if positions.len() < 2 {
        log::error!("[{log_id}] generate: range too small to hold two placeholders");
        return Err(Error::RangeTooSmall);
    }
    // Extend two placeholders beyond the end so the search can land on a
    // lane compatible with `following_footing` under normal tightening
    // rules.
    let last = *positions.last().unwrap();
    positions.push(last + step);
    positions.push(last + 2 * step);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    let starting_foot = match pattern_config.starting_foot_choice {
        StartingFootChoice::Specified => {
            if pattern_config.starting_foot_specified == 0 {
                Foot::Left
            } else {
                Foot::Right
            }
        }
        StartingFootChoice::Automatic => prev_foot.other(),
        StartingFootChoice::Random => {
            if rng.gen_bool(0.5) {
                Foot::Left
            } else {
                Foot::Right
            }
        }
    };

    let mut start_lane = [None; 2];
    for &foot in &Foot::ALL {
        let prev_lane = prev_footing.get(foot);
        let specified = pattern_config.foot_start_lane_specified[foot.index()];
        start_lane[foot.index()] = match pattern_config.foot_start_choice[foot.index()] {
            FootStartChoice::SpecifiedLane => specified.map(ArrowIdx::from).or(prev_lane),
            FootStartChoice::AutomaticSameLane => prev_lane,
            FootStartChoice::AutomaticNewLane | FootStartChoice::AutomaticSameOrNewLane => prev_lane
                .and_then(|from| {
                    (0..pad.num_arrows())
                        .map(ArrowIdx::from)
                        .find(|&to| to != from && pad.valid_pairing.get(foot, from, to))
                })
                .or(prev_lane),
        };
    }
    let (Some(left), Some(right)) = (start_lane[0], start_lane[1]) else {
        log::error!("[{log_id}] generate: could not resolve a starting footing");
        return Err(Error::NoFeasiblePath {
            furthest: EventIdx::from(0),
        });
    };
    let root_graph_node = resting_node(left, right);
    if !graph.contains(&root_graph_node) {
        log::error!("[{log_id}] generate: starting footing is not in the step graph");
        return Err(Error::NoFeasiblePath {
            furthest: EventIdx::from(0),
        });
    }

    let num_lanes = pad.num_arrows();
    let mut arena = NodeArena::new();
    let chart_average_nps = average_nps(current_chart);
    let root_id = arena.insert(SearchNode::root(root_graph_node, num_lanes, chart_average_nps));
    {
        let root = arena.get_mut(root_id);
        root.lane_counts = current_lane_counts.to_vec();
        root.window.last_time_foot_stepped[prev_foot.index()] = prev_time;
    }
    let mut frontier = vec![root_id];

    let total_placeholders = positions.len();
    let same_weight_total = pattern_config.same_arrow_step_weight + pattern_config.new_arrow_step_weight;
    let max_per_foot = pattern_config
        .limit_same_arrows_in_a_row
        .then_some(pattern_config.max_same_arrows_in_a_row_per_foot);

    for (i, &position) in positions.iter().enumerate() {
        if frontier.is_empty() {
            log::error!("[{log_id}] generate: frontier exhausted at placeholder {i}");
            return Err(Error::NoFeasiblePath {
                furthest: EventIdx::from(i),
            });
        }
        let event_time = position_to_time(position);
        let acting_foot = if i % 2 == 0 { starting_foot } else { starting_foot.other() };
        let is_trailing = i + 2 >= total_placeholders;
        let trailing_slot = total_placeholders - i; // 2 for the penultimate event, 1 for the last

        let mut best_per_dest: HashMap<GraphNode, (NodeId, GraphLink, SearchNode)> = HashMap::new();

        for &parent_id in &frontier {
            let parent_graph_node = arena.get(parent_id).graph_node;
            let siblings = graph.successors(&parent_graph_node).to_vec();
            let resting_arrow = parent_graph_node.portion(acting_foot, Portion::Heel).arrow;

            let desired_step_types: Vec<StepType> = if is_trailing {
                desired_end_step_types(pattern_config, acting_foot, following_footing, resting_arrow, trailing_slot)
            } else {
                let draw_same = same_weight_total > 0.0
                    && rng.gen_bool((pattern_config.same_arrow_step_weight / same_weight_total).clamp(0.0, 1.0));
                vec![if draw_same { StepType::SameArrow } else { StepType::NewArrow }]
            };

            for (link, dest) in siblings.iter().filter(|(link, _)| {
                is_single_foot_tap(link, acting_foot) && desired_step_types.contains(&link.cell(acting_foot, Portion::Heel).step_type)
            }) {
                let Some(slots) = lane_actions(num_lanes, &parent_graph_node, link, dest) else {
                    continue;
                };
                let (misleading, ambiguous) =
                    cost::misleading_and_ambiguous(&parent_graph_node, link, dest, &siblings);
                if let Some(child) = build_child(
                    pad, config, graph, &arena, parent_id, *link, *dest, &slots, event_time, 0.0,
                    (misleading, ambiguous),
                    Some((pattern_config.same_arrow_step_weight, pattern_config.new_arrow_step_weight)),
                    max_per_foot,
                    &mut rng,
                ) {
                    consider(&mut best_per_dest, parent_id, *link, *dest, child);
                }
            }
        }

        if best_per_dest.is_empty() {
            log::error!("[{log_id}] generate: no candidate step at placeholder {i}");
            return Err(Error::NoFeasiblePath {
                furthest: EventIdx::from(i),
            });
        }
        frontier = commit_level(&mut arena, &frontier, best_per_dest);
    }

    let survivors: Vec<NodeId> = frontier
        .into_iter()
        .filter(|&id| satisfies_end_lanes(&arena.get(id).graph_node, following_footing, pattern_config))
        .collect();
    if survivors.is_empty() {
        log::error!("[{log_id}] generate: no survivor satisfied the end-lane rules");
        return Err(Error::CannotEndAtDesiredLocation);
    }
    let leaf = survivors
        .into_iter()
        .min_by_key(|&id| arena.get(id).cost)
        .expect("non-empty survivor list checked above");

    let mut path = arena.path_to_root(leaf);
    // Trim the two trailing placeholder nodes used only to steer toward
    // `following_footing`.
    path.truncate(path.len().saturating_sub(2));

    let synthetic_chart = synthetic_chart_for_path(&arena, &path, &positions, position_to_time);
    Ok(output::assemble(&arena, &path, &synthetic_chart, pad, &mut rng))
}

fn resting_node(left: ArrowIdx, right: ArrowIdx) -> GraphNode {
    use step_graph::FootPortionState;
    GraphNode {
        portions: [
            [
                FootPortionState { arrow: left, holding: false },
                FootPortionState { arrow: left, holding: false },
            ],
            [
                FootPortionState { arrow: right, holding: false },
                FootPortionState { arrow: right, holding: false },
            ],
        ],
    }
}

fn is_single_foot_tap(link: &GraphLink, foot: Foot) -> bool {
    let other = foot.other();
    let acting = Portion::ALL.iter().any(|&p| link.cell(foot, p).valid);
    let other_acts = Portion::ALL.iter().any(|&p| link.cell(other, p).valid);
    acting && !other_acts && link.cell(foot, Portion::Heel).action == FootAction::Tap
}

/// The end-foot-choice override for the two trailing placeholders.
fn desired_end_step_types(
    pattern_config: &PatternConfig,
    foot: Foot,
    following_footing: Footing,
    resting_arrow: ArrowIdx,
    trailing_slot: usize,
) -> Vec<StepType> {
    use crate::config::FootEndChoice::*;
    if trailing_slot > 2 {
        return vec![StepType::SameArrow, StepType::NewArrow];
    }
    let from_choice = match pattern_config.foot_end_choice[foot.index()] {
        AutomaticNewLane => vec![StepType::NewArrow],
        AutomaticSameLane => vec![StepType::SameArrow],
        AutomaticSameOrNewLane | SpecifiedLane => vec![StepType::SameArrow, StepType::NewArrow],
    };
    let hint = following_hint(following_footing, foot, resting_arrow);
    let combined: std::collections::HashSet<StepType> =
        from_choice.into_iter().filter(|t| hint.contains(t)).collect();
    if combined.is_empty() {
        hint
    } else {
        combined.into_iter().collect()
    }
}

fn following_hint(following_footing: Footing, foot: Foot, resting_arrow: ArrowIdx) -> Vec<StepType> {
    match following_footing.get(foot) {
        Some(lane) if lane == resting_arrow => vec![StepType::SameArrow],
        Some(_) => vec![StepType::NewArrow],
        None => vec![StepType::SameArrow, StepType::NewArrow],
    }
}

fn satisfies_end_lanes(node: &GraphNode, following_footing: Footing, pattern_config: &PatternConfig) -> bool {
    for &foot in &Foot::ALL {
        let Some(expected) = following_footing.get(foot) else {
            continue;
        };
        let actual = node.portion(foot, Portion::Heel).arrow;
        let ok = match pattern_config.foot_end_choice[foot.index()] {
            FootEndChoice::AutomaticSameLane => actual == expected,
            FootEndChoice::AutomaticNewLane => actual != expected,
            FootEndChoice::AutomaticSameOrNewLane => true,
            FootEndChoice::SpecifiedLane => pattern_config.foot_end_lane_specified[foot.index()]
                .map_or(true, |lane| actual == ArrowIdx::from(lane)),
        };
        if !ok {
            return false;
        }
    }
    true
}

/// Reconstruct a minimal expressed chart describing the already-chosen
/// `path` so [`output::assemble`] can walk it uniformly with `satisfy`'s
/// output. Positions/times come from the placeholder timeline; instance
/// variants default (pattern generation does not produce rolls/fakes/lifts).
fn synthetic_chart_for_path(
    arena: &NodeArena,
    path: &[NodeId],
    positions: &[i64],
    position_to_time: &dyn Fn(i64) -> f64,
) -> ExpressedChart {
    let mut events = index_vec::IndexVec::new();
    for (i, &id) in path.iter().enumerate().skip(1) {
        let link = arena.get(id).incoming_link.unwrap_or(GraphLink::BLANK);
        let position = positions.get(i - 1).copied().unwrap_or(0);
        events.push(ExpressedEvent {
            position,
            time: position_to_time(position),
            link,
            instance_variants: [[InstanceVariant::Default; 2]; 2],
        });
    }
    ExpressedChart { events, mines: Vec::new() }
}
