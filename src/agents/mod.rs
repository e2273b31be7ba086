//! Provider-backed agents used by the refinement loop.
//!
//! Simulation lives in `market`; persona creation in `population`.

mod critic;
mod ideator;

pub use critic::Critic;
pub use ideator::Ideator;
