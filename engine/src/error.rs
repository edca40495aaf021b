use index_vec::IndexVec;

use crate::chart::EventIdx;

/// The failure taxonomy for every fallible entry point in this crate.
///
/// Every variant is surfaced synchronously: configuration problems before
/// any search runs, `NoFeasiblePath`/`CannotEndAtDesiredLocation` at the
/// end of an exhausted search, `Cancelled` as soon as the caller's
/// cancellation signal answers `true`. `CachePrimeRequired` stays in the
/// taxonomy for callers that already match on it, but this crate never
/// raises it: a fallback lookup computes and caches its own expansion on
/// first miss rather than rejecting the call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    #[error("no feasible path found; furthest event reached was {furthest:?}")]
    NoFeasiblePath { furthest: EventIdx },

    #[error("search reached the end of the chart but not at the desired end location")]
    CannotEndAtDesiredLocation,

    #[error("requested start/end range is too small to hold the generated pattern")]
    RangeTooSmall,

    #[error("search was cancelled")]
    Cancelled,

    #[error("fallback cache must be primed with this replacement table before use")]
    CachePrimeRequired,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Used by the driver to report the furthest point reached across every
/// abandoned root when every tier fails.
pub(crate) fn furthest_reached(furthest_per_root: &IndexVec<crate::driver::RootIdx, EventIdx>) -> EventIdx {
    furthest_per_root
        .iter()
        .copied()
        .max()
        .unwrap_or(EventIdx::from(0))
}
