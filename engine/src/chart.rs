//! The data exchanged at the core's boundary: an expressed chart going in,
//! a performed path coming out.

use index_vec::IndexVec;
use step_graph::{Foot, GraphLink};

index_vec::define_index_type! {
    /// Position of an event within an expressed (or performed) chart.
    pub struct EventIdx = usize;
}

/// Roll / fake / lift variant carried per foot-portion of an expressed
/// event, on top of the base step-type/foot-action a `GraphLink` encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InstanceVariant {
    #[default]
    Default,
    Roll,
    Fake,
    Lift,
}

/// One abstract step-event in an expressed chart.
#[derive(Debug, Clone)]
pub struct ExpressedEvent {
    pub position: i64,
    pub time: f64,
    pub link: GraphLink,
    /// Indexed `[foot.index()][portion.index()]`, matching `GraphLink`.
    pub instance_variants: [[InstanceVariant; 2]; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MineKind {
    BeforeArrow,
    AfterArrow,
    NoArrow,
}

/// A non-step event: a mine placed relative to the nearest arrow on
/// either side, or on a lane that never hosts an arrow.
#[derive(Debug, Clone, Copy)]
pub struct MineEvent {
    pub position: i64,
    pub kind: MineKind,
    pub paired_foot: Foot,
    /// How many arrows back/forward from this position to count, per the
    /// "nth most recent" placement rule. 1-indexed (`1` = nearest arrow on
    /// that side); `0` is treated the same as `1`.
    pub nth_closest: u32,
}

/// The expressed chart handed to `satisfy`: a sequence of step-events plus
/// a parallel mine stream.
#[derive(Debug, Clone, Default)]
pub struct ExpressedChart {
    pub events: IndexVec<EventIdx, ExpressedEvent>,
    pub mines: Vec<MineEvent>,
}

/// Foot-action-derived action vocabulary for a single lane at a single
/// event, as emitted into the final performed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformedAction {
    Tap,
    HoldStart,
    HoldEnd,
    RollStart,
    Fake,
    Lift,
    Mine,
}

/// One entry of the final, time-ordered output stream. `foot` is `None`
/// for mines, which are not performed by either foot.
#[derive(Debug, Clone, Copy)]
pub struct PerformedEvent {
    pub position: i64,
    pub lane: usize,
    pub action: PerformedAction,
    pub foot: Option<Foot>,
}

/// The final output of `satisfy`/`generate`: a flat, time-ordered event
/// list over the chart's lanes.
#[derive(Debug, Clone, Default)]
pub struct PerformedPath {
    pub events: Vec<PerformedEvent>,
}
