//! `fleet-sim` — the coordination context that ties the fleet engine
//! together.
//!
//! # Tick phases
//!
//! Each call to [`FleetSim::step`] runs one full, bounded coordination pass:
//!
//! ```text
//! ① Arrivals     robots whose lane window closed land on its end node;
//!                freed lanes and nodes go to queued robots (FIFO)
//! ② Assignment   idle robots, most important first, take the pending
//!                task with the cheapest pickup
//! ③ Planning     every Planning robot gets a route (Rayon with `parallel`)
//! ④ Requests     every Routed robot asks for its next lane:
//!                granted, queued, or denied
//! ⑤ Deadlocks    wait-for cycles are broken; the victim re-plans around
//!                the contested lane or is Blocked
//! ⑥ Departures   granted robots whose window has opened start moving
//! ```
//!
//! Nothing inside a tick waits: a request that cannot be met is queued and
//! retried on later ticks.
//!
//! # Feature flags
//!
//! | Flag       | Effect                                                  |
//! |------------|---------------------------------------------------------|
//! | `parallel` | Plans routes for all `Planning` robots on Rayon threads |
//! | `fx-hash`  | FxHash for the traffic manager's robot-keyed tables     |

pub mod audit;
pub mod builder;
pub mod error;
pub mod observer;
pub mod sim;
pub mod snapshot;
pub mod workload;


pub use audit::InvariantViolation;
pub use builder::FleetSimBuilder;
pub use error::{SimError, SimResult};
pub use observer::{FleetObserver, NoopObserver};
pub use sim::FleetSim;
pub use snapshot::{FleetSnapshot, LaneQueue, NodeView, RobotView, TaskView};
pub use workload::WorkloadGenerator;
