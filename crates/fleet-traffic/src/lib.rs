//! `fleet-traffic` — the traffic manager.
//!
//! # Crate layout
//!
//! | Module          | Contents                                                     |
//! |-----------------|--------------------------------------------------------------|
//! | [`reservation`] | `Reservation`, `ReservationOutcome`, `Promotion`, `ReplanRequest` |
//! | [`manager`]     | `TrafficManager`: reservation table, FIFO queues, occupancy |
//! | [`waitfor`]     | `WaitForGraph`: who waits on whom, cycle detection          |
//! | [`error`]       | `TrafficError`, `TrafficResult<T>`                           |
//!
//! # Reservation model
//!
//! A robot standing on node `u` asks for lane `u → v` at tick `t`.  The
//! request is granted for `[t, t + ticks(lane))` when
//!
//! - fewer than `capacity(lane)` reservations on the lane overlap that window,
//! - no reservation on the reverse lane overlaps it (no head-on traffic),
//! - `v` has a free slot (occupants plus inbound claims below capacity),
//! - nobody is already queued for the lane.
//!
//! Otherwise the robot joins the lane's FIFO queue.  A grant claims a slot on
//! `v` immediately; the robot leaves `u` when it departs.  Queued robots are
//! promoted in order on [`release`](TrafficManager::release) and by
//! [`promote_ready`](TrafficManager::promote_ready).
//!
//! All mutation goes through `&mut TrafficManager`, so the table is its own
//! single exclusion domain: a grant's lane, reverse-lane, and occupancy
//! checks can never interleave with another request.

pub mod error;
pub mod manager;
pub mod reservation;
pub mod waitfor;


pub use error::{TrafficError, TrafficResult};
pub use manager::TrafficManager;
pub use reservation::{Promotion, ReplanRequest, Reservation, ReservationOutcome};
pub use waitfor::WaitForGraph;
