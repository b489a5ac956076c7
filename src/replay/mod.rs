//! Interaction replay
//!
//! Drives a [`FlowController`](crate::flow::FlowController) from a recorded
//! interaction_event.v1 stream, so a whole test attempt can be scored offline
//! and deterministically.

mod event;
mod runner;

pub use event::*;
pub use runner::*;
