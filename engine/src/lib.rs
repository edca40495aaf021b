//! Translates an expressed dance chart into a performed one: a weighted
//! best-first search over the step graph built by the `step-graph` crate,
//! plus the standalone pattern generator used to fill in freeform gaps.
//!
//! `satisfy`/`satisfy_cancellable` (in [`driver`]) are the main entry
//! points; `generate` produces a pattern against a desired start/end
//! footing rather than an expressed chart. [`output::assemble`] turns
//! either search's winning path into the flat, time-ordered
//! [`chart::PerformedPath`].

pub mod chart;
pub mod config;
pub mod cost;
pub mod driver;
pub mod error;
pub mod mines;
pub mod node;
pub mod output;

pub use chart::{
    EventIdx, ExpressedChart, ExpressedEvent, InstanceVariant, MineEvent, MineKind,
    PerformedAction, PerformedEvent, PerformedPath,
};
pub use config::{
    ArrowWeights, BracketParsingDetermination, BracketParsingMethod, Config, ExpressedChartConfig,
    FacingConfig, FootEndChoice, FootStartChoice, LateralTighteningConfig, PatternConfig,
    StartingFootChoice, StepTighteningConfig, TransitionConfig,
};
pub use cost::CostVector;
pub use driver::{generate, satisfy, satisfy_cancellable, Footing, RootIdx};
pub use error::{Error, Result};
pub use node::{NodeArena, NodeId};
