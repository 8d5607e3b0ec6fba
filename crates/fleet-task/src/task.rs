//! The task entity.

use std::fmt;

use fleet_core::{FailureReason, NodeId, RobotId, TaskId, Tick};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Pending,
    Assigned,
    InProgress,
    Completed,
    Failed,
}

impl TaskStatus {
    /// `Assigned` or `InProgress`: held by exactly one robot.
    pub fn is_active(self) -> bool {
        matches!(self, TaskStatus::Assigned | TaskStatus::InProgress)
    }

    pub fn is_finished(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Task {
    pub id:        TaskId,
    pub pickup:    NodeId,
    pub dropoff:   NodeId,
    pub status:    TaskStatus,
    /// Holder while `Assigned`/`InProgress`.
    pub robot:     Option<RobotId>,
    /// Submission order.  Survives requeueing.
    pub seq:       u64,
    /// Failed attempts so far.
    pub attempts:  u32,
    pub failure:   Option<FailureReason>,
    pub submitted: Tick,
}

impl Task {
    /// Node the holder is heading for: pickup while `Assigned`, dropoff
    /// while `InProgress`.
    pub fn goal(&self) -> Option<NodeId> {
        match self.status {
            TaskStatus::Assigned   => Some(self.pickup),
            TaskStatus::InProgress => Some(self.dropoff),
            _ => None,
        }
    }
}
