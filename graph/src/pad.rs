//! Static per-pad data: arrow positions, mirror/flip tables, pairwise
//! relations between arrows (per foot), and precomputed travel distances.
//!
//! A [`Pad`] is immutable once built and is shared (read-only) between
//! every node of a search.

use bit_vec::BitVec;

use crate::arrow::{ArrowIdx, Foot};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PadError {
    #[error("pad has {0} arrows but `{1}` has {2} entries")]
    WrongLen(usize, &'static str, usize),
    #[error("position of arrow {0} is not finite")]
    NonFinitePosition(usize),
    #[error("mirror table is not an involution at arrow {0}")]
    MirrorNotInvolution(usize),
    #[error("flip table is not an involution at arrow {0}")]
    FlipNotInvolution(usize),
}

/// A square (per foot) boolean relation between arrows, e.g. "is arrow `b`
/// reachable as a crossover-front step from arrow `a` with this foot".
///
/// Stored as one [`BitVec`] per `(foot, arrow)` pair, each holding one bit
/// per possible other arrow.
#[derive(Debug, Clone)]
pub struct PadRelation {
    num_arrows: usize,
    rows: Vec<BitVec>,
}

impl PadRelation {
    pub fn empty(num_arrows: usize) -> Self {
        Self {
            num_arrows,
            rows: (0..num_arrows * Foot::ALL.len())
                .map(|_| BitVec::from_elem(num_arrows, false))
                .collect(),
        }
    }

    fn row_idx(&self, foot: Foot, a: ArrowIdx) -> usize {
        foot.index() * self.num_arrows + a.index()
    }

    pub fn set(&mut self, foot: Foot, a: ArrowIdx, b: ArrowIdx, value: bool) {
        let idx = self.row_idx(foot, a);
        self.rows[idx].set(b.index(), value);
    }

    pub fn get(&self, foot: Foot, a: ArrowIdx, b: ArrowIdx) -> bool {
        self.rows[self.row_idx(foot, a)][b.index()]
    }

    fn check_len(&self, num_arrows: usize, name: &'static str) -> Result<(), PadError> {
        if self.rows.len() != num_arrows * Foot::ALL.len() {
            return Err(PadError::WrongLen(num_arrows, name, self.rows.len()));
        }
        Ok(())
    }
}

/// Static per-pad geometry and relation tables, for a pad with `num_arrows`
/// arrows (lanes) and exactly two feet.
#[derive(Debug, Clone)]
pub struct Pad {
    num_arrows: usize,
    positions: Vec<(f64, f64)>,
    mirror_lane: Vec<ArrowIdx>,
    flip_lane: Vec<ArrowIdx>,
    travel_distance: Vec<f64>,

    pub bracketable_as_heel: PadRelation,
    pub bracketable_as_toe: PadRelation,
    pub valid_pairing: PadRelation,
    pub crossover_front: PadRelation,
    pub crossover_behind: PadRelation,
    pub inverted: PadRelation,
    pub stretch_bracketable_as_heel: PadRelation,
    pub stretch_bracketable_as_toe: PadRelation,
    pub stretch_valid_pairing: PadRelation,
    pub stretch_crossover_front: PadRelation,
    pub stretch_crossover_behind: PadRelation,
    pub stretch_inverted: PadRelation,

    /// Half the panel width/height along x/y, used by [`Pad::compensated_distance`].
    pub panel_half_width: f64,
    pub panel_half_height: f64,
}

impl Pad {
    pub fn new(
        positions: Vec<(f64, f64)>,
        mirror_lane: Vec<ArrowIdx>,
        flip_lane: Vec<ArrowIdx>,
        panel_half_width: f64,
        panel_half_height: f64,
    ) -> Self {
        let num_arrows = positions.len();
        let travel_distance = Self::precompute_travel(&positions);
        Self {
            num_arrows,
            positions,
            mirror_lane,
            flip_lane,
            travel_distance,
            bracketable_as_heel: PadRelation::empty(num_arrows),
            bracketable_as_toe: PadRelation::empty(num_arrows),
            valid_pairing: PadRelation::empty(num_arrows),
            crossover_front: PadRelation::empty(num_arrows),
            crossover_behind: PadRelation::empty(num_arrows),
            inverted: PadRelation::empty(num_arrows),
            stretch_bracketable_as_heel: PadRelation::empty(num_arrows),
            stretch_bracketable_as_toe: PadRelation::empty(num_arrows),
            stretch_valid_pairing: PadRelation::empty(num_arrows),
            stretch_crossover_front: PadRelation::empty(num_arrows),
            stretch_crossover_behind: PadRelation::empty(num_arrows),
            stretch_inverted: PadRelation::empty(num_arrows),
            panel_half_width,
            panel_half_height,
        }
    }

    fn precompute_travel(positions: &[(f64, f64)]) -> Vec<f64> {
        let n = positions.len();
        let mut out = vec![0.0; n * n];
        for (i, pa) in positions.iter().enumerate() {
            for (j, pb) in positions.iter().enumerate() {
                out[i * n + j] = euclid(*pa, *pb);
            }
        }
        out
    }

    pub fn num_arrows(&self) -> usize {
        self.num_arrows
    }

    pub fn position(&self, arrow: ArrowIdx) -> (f64, f64) {
        self.positions[arrow.index()]
    }

    pub fn mirror(&self, arrow: ArrowIdx) -> ArrowIdx {
        self.mirror_lane[arrow.index()]
    }

    pub fn flip(&self, arrow: ArrowIdx) -> ArrowIdx {
        self.flip_lane[arrow.index()]
    }

    /// Raw, uncompensated travel distance between two arrows.
    pub fn travel_distance(&self, a: ArrowIdx, b: ArrowIdx) -> f64 {
        self.travel_distance[a.index() * self.num_arrows + b.index()]
    }

    /// The pad's overall width (max x minus min x across all arrows), used
    /// by the transition cost subroutine's `MinimumPadWidth` gate.
    pub fn width(&self) -> f64 {
        let (min, max) = self
            .positions
            .iter()
            .map(|(x, _)| *x)
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), x| {
                (lo.min(x), hi.max(x))
            });
        if self.positions.is_empty() {
            0.0
        } else {
            max - min
        }
    }

    /// Distance with compensation: the minimum effective movement
    /// between two foot positions, shrinking non-bracket sides down to
    /// `(lateral_min, longitudinal_min)` half-extents and measuring the gap
    /// between the resulting boxes. Brackets keep their full panel
    /// half-extents; when both sides are brackets the raw center-to-center
    /// distance is used instead.
    pub fn compensated_distance(
        &self,
        pos_a: (f64, f64),
        pos_b: (f64, f64),
        a_is_bracket: bool,
        b_is_bracket: bool,
        lateral_min: f64,
        longitudinal_min: f64,
    ) -> f64 {
        if a_is_bracket && b_is_bracket {
            return euclid(pos_a, pos_b);
        }
        let half_extents = |is_bracket: bool| -> (f64, f64) {
            if is_bracket {
                (self.panel_half_width, self.panel_half_height)
            } else {
                (lateral_min, longitudinal_min)
            }
        };
        let (ax, ay) = half_extents(a_is_bracket);
        let (bx, by) = half_extents(b_is_bracket);
        let dx = ((pos_a.0 - pos_b.0).abs() - ax - bx).max(0.0);
        let dy = ((pos_a.1 - pos_b.1).abs() - ay - by).max(0.0);
        (dx * dx + dy * dy).sqrt()
    }

    /// Validate internal consistency. This does not check that the
    /// relation tables are *semantically* sensible (that is the caller's
    /// responsibility when constructing a `Pad`), only that every table
    /// has the shape implied by `num_arrows` and that the lane tables are
    /// involutions, matching the invariant the `GraphNode` and `GraphLink`
    /// invariants assume.
    pub fn validate(&self) -> Result<(), PadError> {
        if self.mirror_lane.len() != self.num_arrows {
            return Err(PadError::WrongLen(
                self.num_arrows,
                "mirror_lane",
                self.mirror_lane.len(),
            ));
        }
        if self.flip_lane.len() != self.num_arrows {
            return Err(PadError::WrongLen(
                self.num_arrows,
                "flip_lane",
                self.flip_lane.len(),
            ));
        }
        for (i, (x, y)) in self.positions.iter().enumerate() {
            if !x.is_finite() || !y.is_finite() {
                return Err(PadError::NonFinitePosition(i));
            }
        }
        for (i, &m) in self.mirror_lane.iter().enumerate() {
            if self.mirror_lane[m.index()].index() != i {
                return Err(PadError::MirrorNotInvolution(i));
            }
        }
        for (i, &f) in self.flip_lane.iter().enumerate() {
            if self.flip_lane[f.index()].index() != i {
                return Err(PadError::FlipNotInvolution(i));
            }
        }
        for (name, rel) in [
            ("bracketable_as_heel", &self.bracketable_as_heel),
            ("bracketable_as_toe", &self.bracketable_as_toe),
            ("valid_pairing", &self.valid_pairing),
            ("crossover_front", &self.crossover_front),
            ("crossover_behind", &self.crossover_behind),
            ("inverted", &self.inverted),
            ("stretch_bracketable_as_heel", &self.stretch_bracketable_as_heel),
            ("stretch_bracketable_as_toe", &self.stretch_bracketable_as_toe),
            ("stretch_valid_pairing", &self.stretch_valid_pairing),
            ("stretch_crossover_front", &self.stretch_crossover_front),
            ("stretch_crossover_behind", &self.stretch_crossover_behind),
            ("stretch_inverted", &self.stretch_inverted),
        ] {
            rel.check_len(self.num_arrows, name)?;
        }
        Ok(())
    }
}

fn euclid(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// A standard 4-arrow dance pad: Left, Down, Up, Right, laid out in a
    /// diamond. Arrows 0=L 1=D 2=U 3=R, used by the concrete scenarios in
    /// the step-type and search tests throughout this workspace.
    pub fn four_panel() -> Pad {
        let positions = vec![(-1.0, 0.0), (0.0, -1.0), (0.0, 1.0), (1.0, 0.0)];
        let mirror = vec![3, 1, 2, 0]
            .into_iter()
            .map(ArrowIdx::from)
            .collect();
        let flip = vec![0, 2, 1, 3].into_iter().map(ArrowIdx::from).collect();
        let mut pad = Pad::new(positions, mirror, flip, 0.25, 0.25);
        for a in 0..4 {
            for b in 0..4 {
                let (a, b) = (ArrowIdx::from(a), ArrowIdx::from(b));
                if a != b {
                    pad.valid_pairing.set(Foot::Left, a, b, true);
                    pad.valid_pairing.set(Foot::Right, a, b, true);
                }
            }
        }
        // Left foot crosses in front when stepping from Down/Up onto Right,
        // right foot crosses in front stepping onto Left; a loose but
        // representative crossover relation for a 4-panel pad.
        pad.crossover_front
            .set(Foot::Left, ArrowIdx::from(1), ArrowIdx::from(3), true);
        pad.crossover_front
            .set(Foot::Left, ArrowIdx::from(2), ArrowIdx::from(3), true);
        pad.crossover_front
            .set(Foot::Right, ArrowIdx::from(1), ArrowIdx::from(0), true);
        pad.crossover_front
            .set(Foot::Right, ArrowIdx::from(2), ArrowIdx::from(0), true);
        pad
    }

    #[test]
    fn validates_clean_pad() {
        four_panel().validate().unwrap();
    }

    #[test]
    fn rejects_non_involutive_mirror() {
        let mut pad = four_panel();
        pad.mirror_lane[0] = ArrowIdx::from(1);
        assert!(pad.validate().is_err());
    }

    #[test]
    fn compensated_distance_is_bounded_by_raw() {
        let pad = four_panel();
        let a = pad.position(ArrowIdx::from(0));
        let b = pad.position(ArrowIdx::from(3));
        let raw = euclid(a, b);
        let compensated = pad.compensated_distance(a, b, false, false, 0.1, 0.1);
        assert!(compensated <= raw + 1e-9);
        assert!(compensated >= 0.0);
    }

    #[test]
    fn compensated_distance_for_brackets_is_raw() {
        let pad = four_panel();
        let a = pad.position(ArrowIdx::from(0));
        let b = pad.position(ArrowIdx::from(3));
        let raw = euclid(a, b);
        let compensated = pad.compensated_distance(a, b, true, true, 0.1, 0.1);
        assert!((compensated - raw).abs() < 1e-9);
    }

    proptest! {
        /// The compensated distance between any two positions is >= 0 and
        /// <= the raw center-to-center distance, regardless of bracket
        /// flags or tightening minimums.
        #[test]
        fn compensated_distance_is_nonnegative_and_bounded_by_raw(
            ax in -2.0f64..2.0,
            ay in -2.0f64..2.0,
            bx in -2.0f64..2.0,
            by in -2.0f64..2.0,
            a_bracket in any::<bool>(),
            b_bracket in any::<bool>(),
            lateral_min in 0.0f64..1.0,
            longitudinal_min in 0.0f64..1.0,
        ) {
            let pad = four_panel();
            let a = (ax, ay);
            let b = (bx, by);
            let raw = euclid(a, b);
            let compensated =
                pad.compensated_distance(a, b, a_bracket, b_bracket, lateral_min, longitudinal_min);
            prop_assert!(compensated >= 0.0);
            prop_assert!(compensated <= raw + 1e-9);
        }
    }
}
