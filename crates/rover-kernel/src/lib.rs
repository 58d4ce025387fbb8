//! `rover-kernel` – action supervision.
//!
//! Turns a stream of decoded [`Command`][rover_types::Command]s into at most
//! one running action at a time, and guarantees that an action, together
//! with every sub-task it spawned, has fully stopped before the next one
//! starts.
//!
//! # Modules
//!
//! - [`supervisor`] – [`ActionSupervisor`][supervisor::ActionSupervisor]:
//!   owns the current-action slot; `dispatch` cancels and joins the previous
//!   action before starting the next.
//! - [`action`] – the [`ActionState`][action::ActionState] machine and the
//!   bodies of the simple motion actions.
//! - [`navigate`] – the waypoint-by-waypoint navigate flow.
//! - [`watchers`] – the obstacle watcher and the position ticker that run
//!   alongside a motion action.
//! - [`stats`] – [`SupervisorStats`][stats::SupervisorStats]: shared counters
//!   used for logging and to verify the single-active-action rule.

pub mod action;
pub mod navigate;
pub mod stats;
pub mod supervisor;
pub mod watchers;

#[cfg(test)]
mod test_support;

pub use action::ActionState;
pub use stats::{StatsSnapshot, SupervisorStats};
pub use supervisor::{ActionSupervisor, Capabilities, DispatchOutcome, SupervisorConfig};
