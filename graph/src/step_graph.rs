//! The step graph: a directed multigraph whose nodes are foot-positioning
//! states and whose labeled edges are step-links.

use std::collections::{HashMap, VecDeque};

use itertools::Itertools;

use crate::arrow::{ArrowIdx, Foot, Portion};
use crate::pad::Pad;

/// The abstract character of a step, read off the moving foot's old/new
/// arrow against the pad's relation tables. The `Bracket*` variants are
/// used when a single foot's heel and toe move together.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
pub enum StepType {
    SameArrow,
    NewArrow,
    CrossoverFront,
    CrossoverBehind,
    Invert,
    FootSwap,
    BracketSameArrow,
    BracketNewArrow,
    BracketCrossoverFront,
    BracketCrossoverBehind,
    BracketInvert,
}

impl StepType {
    pub fn is_bracket(self) -> bool {
        matches!(
            self,
            StepType::BracketSameArrow
                | StepType::BracketNewArrow
                | StepType::BracketCrossoverFront
                | StepType::BracketCrossoverBehind
                | StepType::BracketInvert
        )
    }

    /// The non-bracket step-type with the same "character" (same arrow /
    /// crossover direction / inversion), used when the fallback table maps
    /// replacements without regard to bracketing.
    pub fn non_bracket(self) -> StepType {
        match self {
            StepType::BracketSameArrow => StepType::SameArrow,
            StepType::BracketNewArrow => StepType::NewArrow,
            StepType::BracketCrossoverFront => StepType::CrossoverFront,
            StepType::BracketCrossoverBehind => StepType::CrossoverBehind,
            StepType::BracketInvert => StepType::Invert,
            other => other,
        }
    }
}

/// What a single foot-portion does between two graph nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FootAction {
    Tap,
    Hold,
    Release,
}

/// One cell of a [`GraphLink`]'s 2x2 matrix: what foot-portion `(foot,
/// portion)` does, or nothing if `valid` is `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkCell {
    pub step_type: StepType,
    pub action: FootAction,
    pub valid: bool,
    /// Qualifier: this cell's movement exceeds the pad's ordinary reach and
    /// should be counted by the stretch-cost subroutine.
    pub stretch: bool,
}

impl LinkCell {
    pub const INVALID: LinkCell = LinkCell {
        step_type: StepType::SameArrow,
        action: FootAction::Tap,
        valid: false,
        stretch: false,
    };
}

impl Default for LinkCell {
    fn default() -> Self {
        Self::INVALID
    }
}

/// A 2x2 matrix of `(step-type, foot-action, valid)` cells, one per
/// foot x foot-portion, describing what each foot does between two nodes.
/// A link with no valid cells is the *blank* link (skip the step).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphLink {
    /// Indexed `[foot.index()][portion.index()]`.
    pub cells: [[LinkCell; 2]; 2],
}

impl GraphLink {
    pub const BLANK: GraphLink = GraphLink {
        cells: [[LinkCell::INVALID; 2]; 2],
    };

    pub fn cell(&self, foot: Foot, portion: Portion) -> LinkCell {
        self.cells[foot.index()][portion.index()]
    }

    pub fn set_cell(&mut self, foot: Foot, portion: Portion, cell: LinkCell) {
        self.cells[foot.index()][portion.index()] = cell;
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().flatten().all(|c| !c.valid)
    }

    /// A step where both feet act simultaneously.
    pub fn is_jump(&self) -> bool {
        Foot::ALL
            .iter()
            .all(|&foot| self.cells[foot.index()].iter().any(|c| c.valid))
    }

    /// Any cell of this link is a release.
    pub fn is_release(&self) -> bool {
        self.cells
            .iter()
            .flatten()
            .any(|c| c.valid && c.action == FootAction::Release)
    }

    /// Exactly one foot carries a bracket (both its portions valid with the
    /// same step-type).
    pub fn is_bracket(&self) -> bool {
        Foot::ALL.iter().any(|&foot| self.foot_is_bracket(foot))
    }

    fn foot_is_bracket(&self, foot: Foot) -> bool {
        let [heel, toe] = self.cells[foot.index()];
        heel.valid && toe.valid
    }

    /// Exactly one foot-portion, across the whole link, is valid.
    pub fn is_single_step(&self) -> bool {
        self.cells.iter().flatten().filter(|c| c.valid).count() == 1
    }

    /// A foot-swap: both feet act, neither is a bracket, and both cells
    /// carry [`StepType::FootSwap`].
    pub fn is_foot_swap(&self) -> bool {
        self.is_jump()
            && !self.is_bracket()
            && Foot::ALL.iter().all(|&foot| {
                self.cells[foot.index()]
                    .iter()
                    .filter(|c| c.valid)
                    .all(|c| c.step_type == StepType::FootSwap)
            })
    }

    /// True if bracket consistency holds: for each foot, if both portions
    /// are valid they carry the same step-type, and a release cell never
    /// coexists with a non-release cell on the same foot unless the
    /// non-release cell is a tap on the other portion of a bracket step
    /// (i.e. stepping onto one half of a bracket while releasing the
    /// other).
    pub fn is_structurally_valid(&self) -> bool {
        for &foot in &Foot::ALL {
            let [heel, toe] = self.cells[foot.index()];
            if heel.valid && toe.valid && heel.step_type != toe.step_type {
                return false;
            }
            if heel.valid && toe.valid {
                let actions = [heel.action, toe.action];
                let releases = actions.iter().filter(|a| **a == FootAction::Release).count();
                if releases == 1 {
                    let non_release_is_tap = actions.contains(&FootAction::Tap);
                    if !non_release_is_tap {
                        return false;
                    }
                }
            }
        }
        true
    }
}

/// A foot-positioning state: for each foot and each portion, the arrow it
/// rests on and whether it is resting or holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GraphNode {
    /// Indexed `[foot.index()][portion.index()]`.
    pub portions: [[FootPortionState; 2]; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FootPortionState {
    pub arrow: ArrowIdx,
    pub holding: bool,
}

impl GraphNode {
    pub fn portion(&self, foot: Foot, portion: Portion) -> FootPortionState {
        self.portions[foot.index()][portion.index()]
    }

    /// A foot is bracketing if its heel and toe rest on different arrows.
    pub fn is_bracket(&self, foot: Foot) -> bool {
        let [heel, toe] = self.portions[foot.index()];
        heel.arrow != toe.arrow
    }

    /// The arrows currently occupied by `foot` (one entry if not
    /// bracketing, two if it is).
    pub fn foot_arrows(&self, foot: Foot) -> Vec<ArrowIdx> {
        let [heel, toe] = self.portions[foot.index()];
        if heel.arrow == toe.arrow {
            vec![heel.arrow]
        } else {
            vec![heel.arrow, toe.arrow]
        }
    }

    fn foot_position(&self, pad: &Pad, foot: Foot) -> (f64, f64) {
        let arrows = self.foot_arrows(foot);
        let positions = arrows.iter().map(|&a| pad.position(a)).collect_vec();
        let n = positions.len() as f64;
        let sum = positions
            .iter()
            .fold((0.0, 0.0), |(sx, sy), (x, y)| (sx + x, sy + y));
        (sum.0 / n, sum.1 / n)
    }

    /// The midpoint x-coordinate of both feet, used by the transition and
    /// facing cost subroutines.
    pub fn lateral_body_position(&self, pad: &Pad) -> f64 {
        let (lx, _) = self.foot_position(pad, Foot::Left);
        let (rx, _) = self.foot_position(pad, Foot::Right);
        (lx + rx) / 2.0
    }

    /// The fraction of a foot's portions that sit strictly on the side of
    /// the pad's centerline the *other* foot is not on; used by facing
    /// classification (inward/outward) in the cost model.
    pub fn feet_on_one_side_fraction(&self, pad: &Pad) -> f64 {
        let (lx, _) = self.foot_position(pad, Foot::Left);
        let (rx, _) = self.foot_position(pad, Foot::Right);
        let center = {
            let (min, max) = (0..pad.num_arrows())
                .map(|i| pad.position(ArrowIdx::from(i)).0)
                .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
                    (lo.min(x), hi.max(x))
                });
            (min + max) / 2.0
        };
        let same_side = (lx - center).signum() == (rx - center).signum();
        if same_side {
            1.0
        } else {
            0.0
        }
    }
}

/// A directed multigraph of [`GraphNode`]s connected by [`GraphLink`]s.
#[derive(Debug, Clone)]
pub struct StepGraph {
    edges: HashMap<GraphNode, Vec<(GraphLink, GraphNode)>>,
}

impl StepGraph {
    /// Enumerate every [`GraphNode`] reachable from a starting set of
    /// "feet resting, not bracketing, on two distinct arrows" nodes, and
    /// every structurally valid [`GraphLink`] between them.
    ///
    /// A worklist of not-yet-expanded nodes is drained until empty, each
    /// popped node's successors are computed and enqueued if not already
    /// visited. Edge weights aren't needed (this is unweighted
    /// reachability, not shortest-path), so a plain FIFO `VecDeque` is
    /// enough.
    pub fn build(pad: &Pad) -> Self {
        let mut edges: HashMap<GraphNode, Vec<(GraphLink, GraphNode)>> = HashMap::new();
        let mut frontier: VecDeque<GraphNode> = VecDeque::new();
        let mut seen: std::collections::HashSet<GraphNode> = std::collections::HashSet::new();

        for start in starting_nodes(pad) {
            if seen.insert(start) {
                frontier.push_back(start);
            }
        }

        while let Some(node) = frontier.pop_front() {
            let succs = successors(pad, &node);
            log::trace!("expanding node with {} successors", succs.len());
            for (link, succ) in &succs {
                debug_assert!(link.is_structurally_valid());
                if seen.insert(*succ) {
                    frontier.push_back(*succ);
                }
            }
            edges.insert(node, succs);
        }

        log::info!(
            "step graph has {} nodes, {} edges",
            edges.len(),
            edges.values().map(Vec::len).sum::<usize>()
        );
        Self { edges }
    }

    /// Outgoing edges from `node`, keyed by the link traversed. Returns an
    /// empty slice for nodes not in the graph.
    pub fn successors(&self, node: &GraphNode) -> &[(GraphLink, GraphNode)] {
        self.edges
            .get(node)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn contains(&self, node: &GraphNode) -> bool {
        self.edges.contains_key(node)
    }

    pub fn num_nodes(&self) -> usize {
        self.edges.len()
    }

    /// All nodes reachable by taking `link` (structurally; callers still
    /// need [`StepGraph::successors`] to know which are *actually* wired
    /// up in this graph).
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.edges.keys()
    }
}

fn starting_nodes(pad: &Pad) -> Vec<GraphNode> {
    let n = pad.num_arrows();
    let mut out = Vec::new();
    for l in 0..n {
        for r in 0..n {
            if l == r {
                continue;
            }
            let (l, r) = (ArrowIdx::from(l), ArrowIdx::from(r));
            if pad.valid_pairing.get(Foot::Left, l, r) {
                out.push(GraphNode {
                    portions: [
                        [
                            FootPortionState {
                                arrow: l,
                                holding: false,
                            },
                            FootPortionState {
                                arrow: l,
                                holding: false,
                            },
                        ],
                        [
                            FootPortionState {
                                arrow: r,
                                holding: false,
                            },
                            FootPortionState {
                                arrow: r,
                                holding: false,
                            },
                        ],
                    ],
                });
            }
        }
    }
    out
}

/// Classify a single-foot step from `from` to `to` for `foot`, using the
/// pad's relation tables. Returns `None` if neither a plain nor stretch
/// relation covers the pair (the move is not legal on this pad for this
/// foot), else `(step_type, stretch)`.
fn classify_step(pad: &Pad, foot: Foot, from: ArrowIdx, to: ArrowIdx) -> Option<(StepType, bool)> {
    if from == to {
        return Some((StepType::SameArrow, false));
    }
    if pad.crossover_front.get(foot, from, to) {
        return Some((StepType::CrossoverFront, false));
    }
    if pad.crossover_behind.get(foot, from, to) {
        return Some((StepType::CrossoverBehind, false));
    }
    if pad.inverted.get(foot, from, to) {
        return Some((StepType::Invert, false));
    }
    if pad.valid_pairing.get(foot, from, to) {
        return Some((StepType::NewArrow, false));
    }
    if pad.stretch_crossover_front.get(foot, from, to) {
        return Some((StepType::CrossoverFront, true));
    }
    if pad.stretch_crossover_behind.get(foot, from, to) {
        return Some((StepType::CrossoverBehind, true));
    }
    if pad.stretch_inverted.get(foot, from, to) {
        return Some((StepType::Invert, true));
    }
    if pad.stretch_valid_pairing.get(foot, from, to) {
        return Some((StepType::NewArrow, true));
    }
    None
}

fn bracket_step_type(step_type: StepType) -> StepType {
    match step_type {
        StepType::SameArrow => StepType::BracketSameArrow,
        StepType::NewArrow => StepType::BracketNewArrow,
        StepType::CrossoverFront => StepType::BracketCrossoverFront,
        StepType::CrossoverBehind => StepType::BracketCrossoverBehind,
        StepType::Invert => StepType::BracketInvert,
        other => other,
    }
}

fn is_occupied_elsewhere(node: &GraphNode, mover_foot: Foot, arrow: ArrowIdx) -> bool {
    node.foot_arrows(mover_foot.other()).contains(&arrow)
}

/// Candidate single-foot moves for `foot` from `node`, each paired with
/// the destination node it actually produces: non-bracket taps to every
/// reachable arrow, a release (if holding), and bracket taps to every
/// reachable pair of arrows. The destination is computed right alongside
/// the link it belongs to rather than re-derived later, so two moves that
/// happen to share a step-type never get collapsed onto a single arrow.
fn single_foot_links(pad: &Pad, node: &GraphNode, foot: Foot) -> Vec<(GraphLink, GraphNode)> {
    let mut out = Vec::new();
    let [heel, toe] = node.portions[foot.index()];
    let holding = heel.holding || toe.holding;

    if holding {
        let mut link = GraphLink::BLANK;
        link.set_cell(
            foot,
            Portion::Heel,
            LinkCell {
                step_type: StepType::SameArrow,
                action: FootAction::Release,
                valid: true,
                stretch: false,
            },
        );
        let mut dest = *node;
        dest.portions[foot.index()][0].holding = false;
        dest.portions[foot.index()][1].holding = false;
        if heel.arrow != toe.arrow {
            link.set_cell(
                foot,
                Portion::Toe,
                LinkCell {
                    step_type: StepType::SameArrow,
                    action: FootAction::Release,
                    valid: true,
                    stretch: false,
                },
            );
        }
        out.push((link, dest));
        return out;
    }

    let resting_arrow = heel.arrow;
    for to in 0..pad.num_arrows() {
        let to = ArrowIdx::from(to);
        if is_occupied_elsewhere(node, foot, to) {
            continue;
        }
        if let Some((step_type, stretch)) = classify_step(pad, foot, resting_arrow, to) {
            for action in [FootAction::Tap, FootAction::Hold] {
                let mut link = GraphLink::BLANK;
                link.set_cell(
                    foot,
                    Portion::Heel,
                    LinkCell {
                        step_type,
                        action,
                        valid: true,
                        stretch,
                    },
                );
                let mut dest = *node;
                let holding = action == FootAction::Hold;
                dest.portions[foot.index()][0] = FootPortionState { arrow: to, holding };
                dest.portions[foot.index()][1] = FootPortionState { arrow: to, holding };
                out.push((link, dest));
            }
        }
    }

    // Bracket taps: heel and toe move to two distinct reachable arrows.
    for heel_to in 0..pad.num_arrows() {
        for toe_to in 0..pad.num_arrows() {
            if heel_to == toe_to {
                continue;
            }
            let (heel_to, toe_to) = (ArrowIdx::from(heel_to), ArrowIdx::from(toe_to));
            if is_occupied_elsewhere(node, foot, heel_to)
                || is_occupied_elsewhere(node, foot, toe_to)
            {
                continue;
            }
            if !pad.bracketable_as_heel.get(foot, heel_to, toe_to)
                && !pad.stretch_bracketable_as_heel.get(foot, heel_to, toe_to)
            {
                continue;
            }
            if !pad.bracketable_as_toe.get(foot, toe_to, heel_to)
                && !pad.stretch_bracketable_as_toe.get(foot, toe_to, heel_to)
            {
                continue;
            }
            let (Some((heel_ty, heel_stretch)), Some((toe_ty, toe_stretch))) = (
                classify_step(pad, foot, resting_arrow, heel_to),
                classify_step(pad, foot, resting_arrow, toe_to),
            ) else {
                continue;
            };
            if heel_ty != toe_ty {
                continue;
            }
            let step_type = bracket_step_type(heel_ty);
            for action in [FootAction::Tap, FootAction::Hold] {
                let mut link = GraphLink::BLANK;
                link.set_cell(
                    foot,
                    Portion::Heel,
                    LinkCell {
                        step_type,
                        action,
                        valid: true,
                        stretch: heel_stretch,
                    },
                );
                link.set_cell(
                    foot,
                    Portion::Toe,
                    LinkCell {
                        step_type,
                        action,
                        valid: true,
                        stretch: toe_stretch,
                    },
                );
                let mut dest = *node;
                let holding = action == FootAction::Hold;
                dest.portions[foot.index()][0] = FootPortionState { arrow: heel_to, holding };
                dest.portions[foot.index()][1] = FootPortionState { arrow: toe_to, holding };
                out.push((link, dest));
            }
        }
    }

    out
}

fn merge_links(a: GraphLink, b: GraphLink) -> Option<GraphLink> {
    let mut merged = GraphLink::BLANK;
    for &foot in &Foot::ALL {
        for &portion in &Portion::ALL {
            let ca = a.cell(foot, portion);
            let cb = b.cell(foot, portion);
            match (ca.valid, cb.valid) {
                (true, true) => return None,
                (true, false) => merged.set_cell(foot, portion, ca),
                (false, true) => merged.set_cell(foot, portion, cb),
                (false, false) => {}
            }
        }
    }
    Some(merged)
}

/// All structurally valid successors of `node`: the blank link (if the
/// node has no required action), every single-foot move, and every jump
/// (simultaneous move of both feet) formed by combining two single-foot
/// moves that don't collide.
fn successors(pad: &Pad, node: &GraphNode) -> Vec<(GraphLink, GraphNode)> {
    let mut out = Vec::new();
    let left_links = single_foot_links(pad, node, Foot::Left);
    let right_links = single_foot_links(pad, node, Foot::Right);

    for &(link, dest) in &left_links {
        out.push((link, dest));
    }
    for &(link, dest) in &right_links {
        out.push((link, dest));
    }
    for &(l, l_dest) in &left_links {
        for &(r, r_dest) in &right_links {
            if let Some(merged) = merge_links(l, r) {
                if merged.is_structurally_valid() {
                    let mut merged_dest = *node;
                    merged_dest.portions[Foot::Left.index()] = l_dest.portions[Foot::Left.index()];
                    merged_dest.portions[Foot::Right.index()] = r_dest.portions[Foot::Right.index()];
                    out.push((merged, merged_dest));
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pad::tests::four_panel;

    #[test]
    fn builds_nonempty_graph() {
        let pad = four_panel();
        let graph = StepGraph::build(&pad);
        assert!(graph.num_nodes() > 0);
    }

    #[test]
    fn every_node_has_a_successor_for_each_legal_single_tap() {
        let pad = four_panel();
        let graph = StepGraph::build(&pad);
        let start = GraphNode {
            portions: [
                [
                    FootPortionState {
                        arrow: ArrowIdx::from(0),
                        holding: false,
                    },
                    FootPortionState {
                        arrow: ArrowIdx::from(0),
                        holding: false,
                    },
                ],
                [
                    FootPortionState {
                        arrow: ArrowIdx::from(3),
                        holding: false,
                    },
                    FootPortionState {
                        arrow: ArrowIdx::from(3),
                        holding: false,
                    },
                ],
            ],
        };
        assert!(graph.contains(&start));
        let succs = graph.successors(&start);
        assert!(!succs.is_empty());
        assert!(succs.iter().any(|(link, _)| !link.is_jump()));
    }

    /// Two NewArrow taps for the same foot that land on different arrows
    /// must remain distinct successor edges, not collapse onto one arrow.
    #[test]
    fn same_step_type_single_taps_reach_every_distinct_destination() {
        let pad = four_panel();
        let graph = StepGraph::build(&pad);
        let start = GraphNode {
            portions: [
                [
                    FootPortionState {
                        arrow: ArrowIdx::from(0),
                        holding: false,
                    },
                    FootPortionState {
                        arrow: ArrowIdx::from(0),
                        holding: false,
                    },
                ],
                [
                    FootPortionState {
                        arrow: ArrowIdx::from(1),
                        holding: false,
                    },
                    FootPortionState {
                        arrow: ArrowIdx::from(1),
                        holding: false,
                    },
                ],
            ],
        };
        assert!(graph.contains(&start));
        let succs = graph.successors(&start);
        let new_arrow_destinations: std::collections::HashSet<ArrowIdx> = succs
            .iter()
            .filter(|(link, _)| {
                !link.is_jump()
                    && link.cells[Foot::Left.index()][0].valid
                    && link.cells[Foot::Left.index()][0].step_type == StepType::NewArrow
                    && link.cells[Foot::Left.index()][0].action == FootAction::Tap
            })
            .map(|(_, dest)| dest.portion(Foot::Left, Portion::Heel).arrow)
            .collect();
        assert!(
            new_arrow_destinations.len() > 1,
            "expected more than one reachable NewArrow destination, got {:?}",
            new_arrow_destinations
        );
    }
}
