//! Behavioural step helpers for address resolution and connection scenarios.

mod assertions;
mod state;
mod steps;

pub use state::{ResolutionState, resolution_state};
