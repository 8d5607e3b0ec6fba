//! Reservation records and request outcomes.

use fleet_core::{DenyReason, LaneId, RobotId, TickWindow};

/// A time-windowed hold on one lane by one robot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Reservation {
    pub lane:   LaneId,
    pub robot:  RobotId,
    pub window: TickWindow,
}

/// Result of [`TrafficManager::request_reservation`][crate::TrafficManager::request_reservation].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReservationOutcome {
    Granted(Reservation),
    /// Enqueued behind `position` other robots (0 = next in line).
    Queued { position: usize },
    Denied(DenyReason),
}

impl ReservationOutcome {
    pub fn is_granted(&self) -> bool {
        matches!(self, ReservationOutcome::Granted(_))
    }

    pub fn is_queued(&self) -> bool {
        matches!(self, ReservationOutcome::Queued { .. })
    }
}

/// A queued request that was granted after the fact.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Promotion {
    pub robot:       RobotId,
    pub reservation: Reservation,
}

/// Deadlock resolution revoked `robot`'s queued request on `lane`; the
/// robot must re-plan avoiding that lane.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplanRequest {
    pub robot: RobotId,
    pub lane:  LaneId,
    /// The wait cycle that was broken, starting anywhere.
    pub cycle: Vec<RobotId>,
}
