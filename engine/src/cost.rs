//! The fourteen-field lexicographic cost vector and the pure subroutines
//! that compute its entries.

use ordered_float::NotNan;
use step_graph::{Foot, GraphLink, GraphNode, Pad};

use crate::config::Config;
use crate::node::SlidingWindow;

/// Ascending = better. Field order *is* the comparator: a totally ordered
/// comparison falls directly out of `#[derive(Ord)]`'s field-order
/// lexicographic comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CostVector {
    pub fallback: NotNan<f64>,
    pub misleading: u32,
    pub ambiguous: u32,
    pub same_arrow_overflow: u32,
    pub stretch: NotNan<f64>,
    pub facing: u32,
    pub travel_distance: NotNan<f64>,
    pub travel_speed: NotNan<f64>,
    pub pattern_type: NotNan<f64>,
    pub lateral_body_speed: NotNan<f64>,
    pub early_transition: u32,
    pub late_transition: u32,
    pub distribution: NotNan<f64>,
    pub tie_break: NotNan<f64>,
}

fn nn(v: f64) -> NotNan<f64> {
    NotNan::new(v).unwrap_or_else(|_| NotNan::new(0.0).unwrap())
}

impl CostVector {
    pub fn zero() -> Self {
        Self {
            fallback: nn(0.0),
            misleading: 0,
            ambiguous: 0,
            same_arrow_overflow: 0,
            stretch: nn(0.0),
            facing: 0,
            travel_distance: nn(0.0),
            travel_speed: nn(0.0),
            pattern_type: nn(0.0),
            lateral_body_speed: nn(0.0),
            early_transition: 0,
            late_transition: 0,
            distribution: nn(0.0),
            tie_break: nn(0.0),
        }
    }

    pub fn accumulate(&self, increment: &CostIncrement) -> Self {
        Self {
            fallback: self.fallback + increment.fallback,
            misleading: self.misleading + increment.misleading,
            ambiguous: self.ambiguous + increment.ambiguous,
            same_arrow_overflow: self.same_arrow_overflow + increment.same_arrow_overflow,
            stretch: self.stretch + increment.stretch,
            facing: self.facing + increment.facing,
            travel_distance: self.travel_distance + increment.travel_distance,
            travel_speed: self.travel_speed + increment.travel_speed,
            pattern_type: increment.pattern_type.unwrap_or(self.pattern_type),
            lateral_body_speed: self.lateral_body_speed + increment.lateral_body_speed,
            early_transition: self.early_transition + increment.early_transition,
            late_transition: self.late_transition + increment.late_transition,
            distribution: increment.distribution.unwrap_or(self.distribution),
            tie_break: increment.tie_break,
        }
    }
}

/// The per-step cost delta computed by [`compute_increment`], folded onto
/// the parent's accumulated [`CostVector`] by [`CostVector::accumulate`].
/// `pattern_type`/`distribution` are recomputed wholesale (not summed)
/// when present (they are periodically-recomputed deviations, not running
/// sums) rather than accumulated like the rest of the vector.
#[derive(Debug, Clone, Copy)]
pub struct CostIncrement {
    pub fallback: NotNan<f64>,
    pub misleading: u32,
    pub ambiguous: u32,
    pub same_arrow_overflow: u32,
    pub stretch: NotNan<f64>,
    pub facing: u32,
    pub travel_distance: NotNan<f64>,
    pub travel_speed: NotNan<f64>,
    pub pattern_type: Option<NotNan<f64>>,
    pub lateral_body_speed: NotNan<f64>,
    pub early_transition: u32,
    pub late_transition: u32,
    pub distribution: Option<NotNan<f64>>,
    pub tie_break: NotNan<f64>,
}

/// Distance with compensation, delegating the geometry to the pad (it
/// owns panel half-extents); this wrapper just picks out the per-config
/// tightening minimums and whether each side is a bracket.
pub fn compensated_distance(
    pad: &Pad,
    config: &Config,
    a_pos: (f64, f64),
    a_is_bracket: bool,
    b_pos: (f64, f64),
    b_is_bracket: bool,
) -> f64 {
    let lateral_min = config
        .step_tightening
        .lateral_min_panel_distance
        .unwrap_or(0.0);
    let longitudinal_min = config
        .step_tightening
        .longitudinal_min_panel_distance
        .unwrap_or(0.0);
    pad.compensated_distance(
        a_pos,
        b_pos,
        a_is_bracket,
        b_is_bracket,
        lateral_min,
        longitudinal_min,
    )
}

/// Stretch cost: zero unless the compensated left/right foot distance
/// clears `stretch-min`, in which case a `[0,1]`-clamped normalization
/// against `[stretch-min, stretch-max]`.
pub fn stretch_cost(distance: f64, stretch_min: f64, stretch_max: f64) -> f64 {
    if distance < stretch_min || stretch_max <= stretch_min {
        return 0.0;
    }
    ((distance - stretch_min) / (stretch_max - stretch_min)).clamp(0.0, 1.0)
}

/// Facing cost: inward/outward run-fraction gates against configured
/// cutoffs and maximums. Returns `1` if either gate trips, else `0`.
pub fn facing_cost(
    inward_count: u32,
    outward_count: u32,
    total_steps_in_pattern: u32,
    max_inward_percentage: Option<f64>,
    max_outward_percentage: Option<f64>,
) -> u32 {
    if total_steps_in_pattern == 0 {
        return 0;
    }
    let total = total_steps_in_pattern as f64;
    let inward_ratio = inward_count as f64 / total;
    let outward_ratio = outward_count as f64 / total;
    let inward_trip = max_inward_percentage.is_some_and(|max| inward_ratio > max);
    let outward_trip = max_outward_percentage.is_some_and(|max| outward_ratio > max);
    (inward_trip || outward_trip) as u32
}

/// Transition cost: early/late shortfall-or-excess relative to the
/// configured per-transition step-count bounds, gated on `pad_width >=
/// minimum_pad_width`.
pub fn transition_cost(
    pad_width: f64,
    minimum_pad_width: Option<f64>,
    steps_since_last_transition: u32,
    transitioned_this_step: bool,
    steps_per_transition_min: Option<u32>,
    steps_per_transition_max: Option<u32>,
) -> (u32, u32) {
    if let Some(min_width) = minimum_pad_width {
        if pad_width < min_width {
            return (0, 0);
        }
    }
    let early = if transitioned_this_step {
        steps_per_transition_min
            .map(|min| min.saturating_sub(steps_since_last_transition))
            .unwrap_or(0)
    } else {
        0
    };
    let late = if !transitioned_this_step {
        steps_per_transition_max
            .map(|max| steps_since_last_transition.saturating_sub(max))
            .unwrap_or(0)
    } else {
        0
    };
    (early, late)
}

/// Is `window`'s mean foot x-coordinate, as a fraction of pad width from
/// the pad's minimum x, past `cutoff_percentage`? Used to decide which
/// side of the pad the body currently leans, for transition detection.
pub fn body_side(pad: &Pad, lateral_body_position: f64, cutoff_percentage: f64) -> bool {
    let (min_x, max_x) = pad_x_extent(pad);
    if max_x <= min_x {
        return false;
    }
    let fraction = (lateral_body_position - min_x) / (max_x - min_x);
    fraction > cutoff_percentage
}

fn pad_x_extent(pad: &Pad) -> (f64, f64) {
    (0..pad.num_arrows())
        .map(|i| pad.position(step_graph::ArrowIdx::from(i)).0)
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
            (lo.min(x), hi.max(x))
        })
}

/// A step is *misleading* if a simpler (more same-arrow-leaning) sibling
/// link reachable from the same parent produces the same per-lane action
/// array; *ambiguous* if a footing-flipped variant reaches a different
/// graph-node but emits the same lane actions, following a jump with
/// coincident releases and equal bracketability.
pub fn misleading_and_ambiguous(
    parent_node: &GraphNode,
    chosen_link: &GraphLink,
    chosen_dest: &GraphNode,
    sibling_links: &[(GraphLink, GraphNode)],
) -> (u32, u32) {
    let chosen_actions = lane_actions(chosen_link);
    let mut misleading = 0;
    let mut ambiguous = 0;
    for (sibling_link, sibling_dest) in sibling_links {
        if sibling_link == chosen_link {
            continue;
        }
        if lane_actions(sibling_link) == chosen_actions {
            if is_simpler(sibling_link, chosen_link) {
                misleading += 1;
            }
            if sibling_dest != chosen_dest && jump_with_coincident_releases(parent_node, chosen_link)
            {
                ambiguous += 1;
            }
        }
    }
    (misleading, ambiguous)
}

fn lane_actions(link: &GraphLink) -> Vec<(Foot, step_graph::Portion, step_graph::FootAction)> {
    let mut out = Vec::new();
    for &foot in &Foot::ALL {
        for &portion in &step_graph::Portion::ALL {
            let cell = link.cell(foot, portion);
            if cell.valid {
                out.push((foot, portion, cell.action));
            }
        }
    }
    out
}

fn is_simpler(candidate: &GraphLink, chosen: &GraphLink) -> bool {
    fn same_arrow_count(link: &GraphLink) -> usize {
        let mut n = 0;
        for &foot in &Foot::ALL {
            for &portion in &step_graph::Portion::ALL {
                let cell = link.cell(foot, portion);
                if cell.valid && cell.step_type == step_graph::StepType::SameArrow {
                    n += 1;
                }
            }
        }
        n
    }
    same_arrow_count(candidate) > same_arrow_count(chosen)
}

fn jump_with_coincident_releases(parent: &GraphNode, link: &GraphLink) -> bool {
    if !link.is_jump() {
        return false;
    }
    let releases: Vec<_> = Foot::ALL
        .iter()
        .filter(|&&foot| {
            let arrows = parent.foot_arrows(foot);
            arrows.len() == 1
        })
        .collect();
    !releases.is_empty() && link.is_release()
}

/// Total fallback cost for a single candidate link drawn from a source
/// link's fallback expansion — the siblings-relative position term plus
/// the blank/whole-foot-dropped/individually-dropped additive penalties.
pub fn fallback_cost(
    original: &GraphLink,
    chosen: &GraphLink,
    link_idx: usize,
    num_siblings: usize,
) -> f64 {
    let denom = num_siblings.saturating_sub(1).max(1) as f64;
    let mut term = link_idx as f64 / denom;
    if chosen.is_blank() {
        return term + 1000.0;
    }
    let mut individually_dropped = 0u32;
    for &foot in &Foot::ALL {
        let orig_has = original.cells[foot.index()].iter().any(|c| c.valid);
        let chosen_has = chosen.cells[foot.index()].iter().any(|c| c.valid);
        if orig_has && !chosen_has {
            term += 900.0;
        } else if orig_has {
            for portion in 0..2 {
                if original.cells[foot.index()][portion].valid
                    && !chosen.cells[foot.index()][portion].valid
                {
                    individually_dropped += 1;
                }
            }
        }
    }
    term + 100.0 * individually_dropped as f64
}

/// Travel-distance cost — zero unless distance tightening is enabled and
/// the moving foot's previous step was recent enough (within `max_time`),
/// else a `[0,1]`-clamped normalization of the compensated distance
/// against `[distance_min, distance_max]`.
pub fn travel_distance_cost(
    enabled: bool,
    distance: f64,
    time_since_last_step: f64,
    max_time: Option<f64>,
    distance_min: Option<f64>,
    distance_max: Option<f64>,
) -> f64 {
    if !enabled {
        return 0.0;
    }
    if let Some(max_t) = max_time {
        if time_since_last_step > max_t {
            return 0.0;
        }
    }
    match (distance_min, distance_max) {
        (Some(min), Some(max)) if max > min => ((distance - min) / (max - min)).clamp(0.0, 1.0),
        _ => 0.0,
    }
}

/// Travel-speed cost — a normalized time penalty (`1` at `min_time`, `0`
/// at `max_time`) multiplied by the raw travel distance, gated on the
/// distance clearing `min_distance`.
pub fn travel_speed_cost(
    enabled: bool,
    distance: f64,
    time_since_last_step: f64,
    min_time: Option<f64>,
    max_time: Option<f64>,
    min_distance: Option<f64>,
) -> f64 {
    if !enabled {
        return 0.0;
    }
    if let Some(min_d) = min_distance {
        if distance < min_d {
            return 0.0;
        }
    }
    match (min_time, max_time) {
        (Some(min_t), Some(max_t)) if max_t > min_t => {
            let normalized = ((max_t - time_since_last_step) / (max_t - min_t)).clamp(0.0, 1.0);
            normalized * distance
        }
        _ => 0.0,
    }
}

/// Lateral body speed cost: the additional cost once an uninterrupted
/// same-direction lateral run exceeds both the configured speed and
/// notes-per-second thresholds.
pub fn lateral_body_speed_cost(
    window: &SlidingWindow,
    current_nps: f64,
    config: &Config,
) -> f64 {
    let cfg = &config.lateral_tightening;
    if !cfg.enabled {
        return 0.0;
    }
    let absolute_nps = cfg.absolute_nps.unwrap_or(0.0);
    let relative_nps = cfg.relative_nps.unwrap_or(0.0);
    let chart_average_nps = window.chart_average_nps;
    let nps_threshold = absolute_nps.max(relative_nps * chart_average_nps);
    if current_nps <= nps_threshold {
        return 0.0;
    }
    let configured_speed = cfg.speed.unwrap_or(0.0);
    let body_speed = window.lateral_movement_speed;
    if body_speed > configured_speed {
        body_speed - configured_speed
    } else {
        0.0
    }
}

/// Pattern-type cost: deviation of observed `(SameArrow, NewArrow)`
/// ratios from configured weights.
pub fn pattern_type_cost(
    same_arrow_count: u32,
    new_arrow_count: u32,
    configured_same_arrow_weight: f64,
    configured_new_arrow_weight: f64,
) -> f64 {
    let total = same_arrow_count + new_arrow_count;
    if total == 0 {
        return 0.0;
    }
    let total_weight = configured_same_arrow_weight + configured_new_arrow_weight;
    if total_weight <= 0.0 {
        return 0.0;
    }
    let observed_same = same_arrow_count as f64 / total as f64;
    let target_same = configured_same_arrow_weight / total_weight;
    (observed_same - target_same).abs()
}

/// Distribution cost: average per-lane absolute deviation of observed
/// step counts from configured per-lane weights.
pub fn distribution_cost(observed_counts: &[u32], configured_weights: &[f64]) -> f64 {
    if observed_counts.is_empty() || observed_counts.len() != configured_weights.len() {
        return 0.0;
    }
    let total: u32 = observed_counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let weight_total: f64 = configured_weights.iter().sum();
    if weight_total <= 0.0 {
        return 0.0;
    }
    let n = observed_counts.len() as f64;
    let sum_abs_dev: f64 = observed_counts
        .iter()
        .zip(configured_weights)
        .map(|(&count, &weight)| {
            let observed = count as f64 / total as f64;
            let target = weight / weight_total;
            (observed - target).abs()
        })
        .sum();
    sum_abs_dev / n
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn cost_vectors_compare_lexicographically_by_fallback_first() {
        let mut cheap = CostVector::zero();
        let mut expensive = CostVector::zero();
        expensive.fallback = nn(1.0);
        cheap.misleading = 1000;
        assert!(expensive > cheap);
    }

    #[test]
    fn stretch_cost_is_zero_below_minimum() {
        assert_eq!(stretch_cost(0.1, 0.5, 1.0), 0.0);
    }

    #[test]
    fn stretch_cost_clamps_to_one() {
        assert_eq!(stretch_cost(10.0, 0.5, 1.0), 1.0);
    }

    #[test]
    fn transition_cost_zero_below_pad_width_gate() {
        let (early, late) = transition_cost(0.5, Some(1.0), 0, true, Some(4), Some(8));
        assert_eq!((early, late), (0, 0));
    }

    #[test]
    fn transition_cost_penalizes_early_transition() {
        let (early, late) = transition_cost(2.0, Some(1.0), 1, true, Some(4), Some(8));
        assert_eq!((early, late), (3, 0));
    }

    #[test]
    fn fallback_cost_penalizes_blank_most_heavily() {
        assert!(fallback_cost(&GraphLink::BLANK, &GraphLink::BLANK, 0, 1) >= 1000.0);
    }

    #[test]
    fn travel_distance_cost_is_zero_when_disabled() {
        assert_eq!(
            travel_distance_cost(false, 10.0, 0.1, Some(1.0), Some(0.0), Some(1.0)),
            0.0
        );
    }

    proptest! {
        /// Total early/late-transition cost accumulated along a path is
        /// monotonically non-decreasing, for any sequence of per-step
        /// transition outcomes. `transition_cost`'s outputs are always >= 0
        /// (shortfall/excess via `saturating_sub`), so summing them step by
        /// step can never decrease the running total.
        #[test]
        fn transition_cost_accumulates_monotonically(
            steps in prop::collection::vec(
                (0u32..12, any::<bool>()),
                1..20,
            ),
            min in 0u32..6,
            max in 6u32..12,
        ) {
            let mut running_early = 0u32;
            let mut running_late = 0u32;
            for (steps_since_last_transition, transitioned) in steps {
                let (early, late) = transition_cost(
                    10.0,
                    Some(1.0),
                    steps_since_last_transition,
                    transitioned,
                    Some(min),
                    Some(max),
                );
                let next_early = running_early + early;
                let next_late = running_late + late;
                prop_assert!(next_early >= running_early);
                prop_assert!(next_late >= running_late);
                running_early = next_early;
                running_late = next_late;
            }
        }
    }
}
