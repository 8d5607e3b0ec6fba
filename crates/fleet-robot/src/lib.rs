//! `fleet-robot` — robots and how they move.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                     |
//! |--------------|--------------------------------------------------------------|
//! | [`state`]    | `RobotState`, `Robot`: per-robot state machine and route    |
//! | [`registry`] | `RobotRegistry`: live robots keyed by `RobotId`             |
//! | [`motion`]   | `MotionController`: arrivals, lane requests, departures     |
//! | [`error`]    | `RobotError`, `RobotResult<T>`                               |
//!
//! # Movement model
//!
//! Robots hop node to node.  A robot holding a granted reservation on
//! `u → v` departs `u` in the tick the grant starts, is `Moving` for the
//! reservation window, and appears on `v` when the window closes.
//! [`Robot::progress`] gives the fraction of the lane covered so a
//! presentation layer can interpolate between the two nodes.
//!
//! ```text
//!  Idle ─assign─▶ Planning ─route─▶ Routed ─grant─▶ Moving ─arrive─▶ Routed ─goal─▶ Idle
//!                                     │  ▲
//!                               queue ▼  │ promote
//!                                   Waiting ──deadlock abort──▶ Blocked ─▶ Idle
//! ```

pub mod error;
pub mod motion;
pub mod registry;
pub mod state;

#[cfg(test)]
mod tests;

pub use error::{RobotError, RobotResult};
pub use motion::{Arrival, MotionController, MoveIssue};
pub use registry::RobotRegistry;
pub use state::{Robot, RobotState};
