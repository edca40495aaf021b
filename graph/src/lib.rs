//! Static pad geometry and the step graph derived from it.
//!
//! This crate owns everything that is immutable for the lifetime of a
//! search: the physical pad (arrow positions and their pairwise relations),
//! the graph of reachable foot-positioning states built from that pad, and
//! the process-wide fallback-expansion cache used to turn an abstract
//! expressed-chart link into a ranked list of concrete candidates.
//!
//! Nothing in this crate knows about cost, search, or configuration beyond
//! its own shape; those live in the `engine` crate.

pub mod arrow;
pub mod fallback;
pub mod pad;
pub mod step_graph;

pub use arrow::{ArrowIdx, Foot, Portion};
pub use fallback::FallbackTable;
pub use pad::{Pad, PadError};
pub use step_graph::{FootAction, FootPortionState, GraphLink, GraphNode, LinkCell, StepGraph, StepType};
