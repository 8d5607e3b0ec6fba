//! `fleet-core` — foundational types for the fleet coordination engine.
//!
//! Every other `fleet-*` crate depends on this one.  It has no `fleet-*`
//! dependencies and few external ones (`rand`, `thiserror`, `tracing`, plus
//! optional `serde`).
//!
//! # What lives here
//!
//! | Module       | Contents                                                |
//! |--------------|---------------------------------------------------------|
//! | [`ids`]      | `RobotId`, `NodeId`, `LaneId`, `TaskId`, `Priority`     |
//! | [`geo`]      | `Point`, straight-line distance                         |
//! | [`time`]     | `Tick`, `TickWindow`                                    |
//! | [`config`]   | `FleetConfig`                                           |
//! | [`event`]    | `FleetEvent`, `EventLog` (tracing-backed)               |
//! | [`rng`]      | `SimRng` (seeded workload randomness)                   |
//! | [`error`]    | `CoreError`, `CoreResult`                               |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to ids, ticks and config.   |

pub mod config;
pub mod error;
pub mod event;
pub mod geo;
pub mod ids;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::FleetConfig;
pub use error::{CoreError, CoreResult};
pub use event::{DenyReason, EventLog, FailureReason, FleetEvent, TimedEvent};
pub use geo::Point;
pub use ids::{LaneId, NodeId, Priority, RobotId, TaskId};
pub use rng::SimRng;
pub use time::{Tick, TickWindow};
