//! Mine placement: walks the finalized step path once, then places each
//! mine event relative to the nearest arrow (or an arrow-free lane) on
//! either side.

use rand::seq::SliceRandom;
use rand::Rng;
use step_graph::Foot;

use crate::chart::{MineEvent, MineKind, PerformedAction, PerformedEvent};

#[derive(Debug, Clone, Copy)]
struct LaneEvent {
    position: i64,
    lane: usize,
    foot: Option<Foot>,
}

/// Place every mine in `mines` (already in arrival order) into `events`,
/// appended to the tail; the caller sorts the combined stream afterward.
pub fn place_mines(
    events: &mut Vec<PerformedEvent>,
    mines: &[MineEvent],
    num_lanes: usize,
    rng: &mut impl Rng,
) {
    let steps = collect(events, |a| {
        matches!(
            a,
            PerformedAction::Tap | PerformedAction::HoldStart | PerformedAction::RollStart
        )
    });
    let releases = collect(events, |a| matches!(a, PerformedAction::HoldEnd));

    let lanes_with_arrows: std::collections::HashSet<usize> =
        steps.iter().map(|e| e.lane).collect();
    let arrow_free_lanes: Vec<usize> = (0..num_lanes)
        .filter(|l| !lanes_with_arrows.contains(l))
        .collect();

    for mine in mines {
        let mut occupied_at_position: std::collections::HashSet<usize> = events
            .iter()
            .filter(|e| e.position == mine.position && e.action == PerformedAction::Mine)
            .map(|e| e.lane)
            .collect();

        let lane = match mine.kind {
            MineKind::BeforeArrow => nth_from_side(
                &steps,
                mine.position,
                mine.nth_closest,
                true,
                mine.paired_foot,
                &mut occupied_at_position,
                rng,
            ),
            MineKind::AfterArrow => nth_from_side(
                &steps,
                mine.position,
                mine.nth_closest,
                false,
                mine.paired_foot,
                &mut occupied_at_position,
                rng,
            )
            .or_else(|| {
                nth_from_side(
                    &releases,
                    mine.position,
                    mine.nth_closest,
                    false,
                    mine.paired_foot,
                    &mut occupied_at_position,
                    rng,
                )
            }),
            MineKind::NoArrow => {
                let mut candidates: Vec<usize> = arrow_free_lanes
                    .iter()
                    .copied()
                    .filter(|l| !occupied_at_position.contains(l))
                    .collect();
                candidates.sort_unstable();
                candidates.first().copied()
            }
        };

        if let Some(lane) = lane {
            events.push(PerformedEvent {
                position: mine.position,
                lane,
                action: PerformedAction::Mine,
                foot: None,
            });
        } else {
            log::warn!(
                "skipped mine at position {} ({:?}): no eligible lane",
                mine.position,
                mine.kind
            );
        }
    }
}

fn collect(events: &[PerformedEvent], pred: impl Fn(PerformedAction) -> bool) -> Vec<LaneEvent> {
    let mut out: Vec<LaneEvent> = events
        .iter()
        .filter(|e| pred(e.action))
        .map(|e| LaneEvent {
            position: e.position,
            lane: e.lane,
            foot: e.foot,
        })
        .collect();
    out.sort_by_key(|e| e.position);
    out
}

/// The `n`-th most recent arrow from `position` (1-indexed: `n=1` is the
/// nearest), on the `before` side if `before` else the `after` side,
/// skipping lanes already occupied by a mine at this position and
/// breaking ties in distance first by the mine's associated foot hint,
/// then by a seeded shuffle of the remaining candidate lane order.
fn nth_from_side(
    events: &[LaneEvent],
    position: i64,
    nth_closest: u32,
    before: bool,
    foot_hint: Foot,
    occupied: &mut std::collections::HashSet<usize>,
    rng: &mut impl Rng,
) -> Option<usize> {
    let mut candidates: Vec<&LaneEvent> = events
        .iter()
        .filter(|e| if before { e.position < position } else { e.position > position })
        .collect();
    candidates.sort_by_key(|e| if before { -e.position } else { e.position });

    let mut by_distance: Vec<Vec<&LaneEvent>> = Vec::new();
    let mut last_position = None;
    for event in &candidates {
        if Some(event.position) != last_position {
            by_distance.push(Vec::new());
            last_position = Some(event.position);
        }
        by_distance.last_mut().unwrap().push(event);
    }

    for group in by_distance.into_iter().skip(nth_closest.saturating_sub(1) as usize) {
        let mut matching: Vec<usize> = group
            .iter()
            .filter(|e| e.foot == Some(foot_hint) && !occupied.contains(&e.lane))
            .map(|e| e.lane)
            .collect();
        let mut rest: Vec<usize> = group
            .iter()
            .filter(|e| e.foot != Some(foot_hint) && !occupied.contains(&e.lane))
            .map(|e| e.lane)
            .collect();
        if matching.is_empty() && rest.is_empty() {
            continue;
        }
        matching.shuffle(rng);
        rest.shuffle(rng);
        let chosen = matching.first().or_else(|| rest.first()).copied().unwrap();
        occupied.insert(chosen);
        return Some(chosen);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn tap(position: i64, lane: usize) -> PerformedEvent {
        PerformedEvent {
            position,
            lane,
            action: PerformedAction::Tap,
            foot: None,
        }
    }

    #[test]
    fn before_arrow_mine_attaches_to_nearest_preceding_step() {
        let mut events = vec![tap(0, 0), tap(4, 1)];
        let mines = vec![MineEvent {
            position: 8,
            kind: MineKind::BeforeArrow,
            paired_foot: step_graph::Foot::Left,
            nth_closest: 0,
        }];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        place_mines(&mut events, &mines, 4, &mut rng);
        let mine = events.iter().find(|e| e.action == PerformedAction::Mine);
        assert_eq!(mine.map(|m| m.lane), Some(1));
    }

    #[test]
    fn before_arrow_mine_with_n_equals_one_lands_on_nearest_preceding_lane() {
        // spec.md §8 "Mine BeforeArrow": step path [0, 3, 1, 2] at positions
        // [0, 48, 96, 144]; a BeforeArrow, n=1, foot=R mine at position 72
        // places on lane 3 (the nearest preceding step).
        let mut events = vec![tap(0, 0), tap(48, 3), tap(96, 1), tap(144, 2)];
        let mines = vec![MineEvent {
            position: 72,
            kind: MineKind::BeforeArrow,
            paired_foot: step_graph::Foot::Right,
            nth_closest: 1,
        }];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        place_mines(&mut events, &mines, 4, &mut rng);
        let mine = events.iter().find(|e| e.action == PerformedAction::Mine);
        assert_eq!(mine.map(|m| m.lane), Some(3));
    }

    #[test]
    fn no_arrow_mine_prefers_lane_with_no_steps() {
        let mut events = vec![tap(0, 0), tap(4, 0)];
        let mines = vec![MineEvent {
            position: 2,
            kind: MineKind::NoArrow,
            paired_foot: step_graph::Foot::Left,
            nth_closest: 0,
        }];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        place_mines(&mut events, &mines, 4, &mut rng);
        let mine = events.iter().find(|e| e.action == PerformedAction::Mine);
        assert_eq!(mine.map(|m| m.lane), Some(1));
    }

    #[test]
    fn unplaceable_mine_is_skipped_not_panicking() {
        let mut events = vec![];
        let mines = vec![MineEvent {
            position: 0,
            kind: MineKind::BeforeArrow,
            paired_foot: step_graph::Foot::Left,
            nth_closest: 0,
        }];
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        place_mines(&mut events, &mines, 4, &mut rng);
        assert!(events.iter().all(|e| e.action != PerformedAction::Mine));
    }
}
