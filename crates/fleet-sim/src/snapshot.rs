//! Read-only views of the coordination state.

use fleet_core::{FailureReason, LaneId, NodeId, Point, Priority, RobotId, TaskId, Tick};
use fleet_robot::RobotState;
use fleet_task::TaskStatus;
use fleet_traffic::Reservation;

/// Everything a presentation or monitoring layer needs after a tick.
///
/// All collections are in ascending id order, so two snapshots of the same
/// state compare equal.
#[derive(Clone, Debug, PartialEq)]
pub struct FleetSnapshot {
    pub tick:         Tick,
    pub nodes:        Vec<NodeView>,
    pub robots:       Vec<RobotView>,
    pub reservations: Vec<Reservation>,
    /// Lanes with a non-empty request queue.
    pub queues:       Vec<LaneQueue>,
    pub tasks:        Vec<TaskView>,
}

impl FleetSnapshot {
    pub fn robot(&self, id: RobotId) -> Option<&RobotView> {
        self.robots.iter().find(|r| r.id == id)
    }

    pub fn task(&self, id: TaskId) -> Option<&TaskView> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn count_tasks(&self, status: TaskStatus) -> usize {
        self.tasks.iter().filter(|t| t.status == status).count()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeView {
    pub node:      NodeId,
    pub occupants: Vec<RobotId>,
    /// Robots standing here queued for an outgoing lane.
    pub waiting:   usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RobotView {
    pub id:       RobotId,
    pub node:     NodeId,
    pub state:    RobotState,
    pub priority: Priority,
    pub task:     Option<TaskId>,
    pub goal:     Option<NodeId>,
    /// Remaining route, starting at `node`.
    pub route:    Vec<NodeId>,
    pub progress: f32,
    pub position: Point,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LaneQueue {
    pub lane:   LaneId,
    pub robots: Vec<RobotId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskView {
    pub id:       TaskId,
    pub pickup:   NodeId,
    pub dropoff:  NodeId,
    pub status:   TaskStatus,
    pub robot:    Option<RobotId>,
    pub attempts: u32,
    pub failure:  Option<FailureReason>,
}
