//! Structured coordination events.
//!
//! Every state change worth recording is described by a [`FleetEvent`].
//! Components push events into an [`EventLog`], which mirrors each one to
//! `tracing` and buffers it until the owner drains the log.  Nothing drains
//! it automatically: a long-running owner that never drains keeps every
//! event.  The buffer never blocks and never fails, so progress does not
//! depend on whoever consumes the events.

use std::fmt;

use crate::{LaneId, NodeId, Priority, RobotId, TaskId, Tick, TickWindow};

/// Why a reservation request was refused outright.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DenyReason {
    /// The destination node can never hold a robot.
    ZeroCapacity(NodeId),
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::ZeroCapacity(n) => write!(f, "{n} has zero capacity"),
        }
    }
}

/// Why a task left a robot without being completed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// Cancelled by the operator.
    Cancelled,
    /// No route to the task's next goal.
    Unreachable,
    /// The holding robot yielded in deadlock resolution and had no detour.
    DeadlockAbort,
    /// The robot holding the task was removed.
    RobotRemoved,
    /// Too many failed attempts; the task will not be retried.
    AttemptsExhausted,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureReason::Cancelled         => "cancelled",
            FailureReason::Unreachable       => "unreachable",
            FailureReason::DeadlockAbort     => "deadlock abort",
            FailureReason::RobotRemoved      => "robot removed",
            FailureReason::AttemptsExhausted => "attempts exhausted",
        };
        f.write_str(s)
    }
}

/// One recorded coordination event.
#[derive(Clone, Debug, PartialEq)]
pub enum FleetEvent {
    RobotCreated { robot: RobotId, node: NodeId, priority: Priority },
    RobotRemoved { robot: RobotId, node: NodeId },
    RobotBlocked { robot: RobotId, node: NodeId },

    ReservationGranted  { robot: RobotId, lane: LaneId, window: TickWindow },
    ReservationQueued   { robot: RobotId, lane: LaneId, position: usize },
    ReservationDenied   { robot: RobotId, lane: LaneId, reason: DenyReason },
    ReservationReleased { robot: RobotId, lane: LaneId },
    ReservationRevoked  { robot: RobotId, lane: LaneId },

    DeadlockDetected { cycle: Vec<RobotId>, victim: RobotId, lane: LaneId },
    DeadlockResolved { victim: RobotId, replanned: bool },

    RoutePlanned  { robot: RobotId, goal: NodeId, hops: usize, cost: f32 },
    RouteNotFound { robot: RobotId, from: NodeId, to: NodeId },

    TaskSubmitted { task: TaskId, pickup: NodeId, dropoff: NodeId },
    TaskAssigned  { task: TaskId, robot: RobotId },
    TaskPickedUp  { task: TaskId, robot: RobotId },
    TaskCompleted { task: TaskId, robot: RobotId },
    TaskRequeued  { task: TaskId, reason: FailureReason, attempts: u32 },
    TaskFailed    { task: TaskId, reason: FailureReason },
}

/// A [`FleetEvent`] stamped with the tick it happened on.
#[derive(Clone, Debug, PartialEq)]
pub struct TimedEvent {
    pub tick:  Tick,
    pub event: FleetEvent,
}

/// Append-only event buffer that also forwards to `tracing`.
#[derive(Default, Debug)]
pub struct EventLog {
    events: Vec<TimedEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `event` at `tick` and emit it as a `tracing` event.
    pub fn emit(&mut self, tick: Tick, event: FleetEvent) {
        trace_event(tick, &event);
        self.events.push(TimedEvent { tick, event });
    }

    /// Events recorded since the last drain, oldest first.
    pub fn pending(&self) -> &[TimedEvent] {
        &self.events
    }

    /// Remove and return all buffered events.
    pub fn drain(&mut self) -> Vec<TimedEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

fn trace_event(tick: Tick, event: &FleetEvent) {
    let tick = tick.0;
    match event {
        FleetEvent::RobotCreated { robot, node, priority } => {
            tracing::info!(tick, robot = robot.0, node = node.0, priority = priority.0, "robot created")
        }
        FleetEvent::RobotRemoved { robot, node } => {
            tracing::info!(tick, robot = robot.0, node = node.0, "robot removed")
        }
        FleetEvent::RobotBlocked { robot, node } => {
            tracing::warn!(tick, robot = robot.0, node = node.0, "robot blocked")
        }
        FleetEvent::ReservationGranted { robot, lane, window } => {
            tracing::debug!(tick, robot = robot.0, lane = lane.0, window = %window, "reservation granted")
        }
        FleetEvent::ReservationQueued { robot, lane, position } => {
            tracing::debug!(tick, robot = robot.0, lane = lane.0, position, "reservation queued")
        }
        FleetEvent::ReservationDenied { robot, lane, reason } => {
            tracing::warn!(tick, robot = robot.0, lane = lane.0, reason = %reason, "reservation denied")
        }
        FleetEvent::ReservationReleased { robot, lane } => {
            tracing::debug!(tick, robot = robot.0, lane = lane.0, "reservation released")
        }
        FleetEvent::ReservationRevoked { robot, lane } => {
            tracing::debug!(tick, robot = robot.0, lane = lane.0, "queued request revoked")
        }
        FleetEvent::DeadlockDetected { cycle, victim, lane } => {
            tracing::warn!(tick, ?cycle, victim = victim.0, lane = lane.0, "deadlock detected")
        }
        FleetEvent::DeadlockResolved { victim, replanned } => {
            tracing::info!(tick, victim = victim.0, replanned, "deadlock resolved")
        }
        FleetEvent::RoutePlanned { robot, goal, hops, cost } => {
            tracing::debug!(tick, robot = robot.0, goal = goal.0, hops, cost, "route planned")
        }
        FleetEvent::RouteNotFound { robot, from, to } => {
            tracing::warn!(tick, robot = robot.0, from = from.0, to = to.0, "no route")
        }
        FleetEvent::TaskSubmitted { task, pickup, dropoff } => {
            tracing::info!(tick, task = task.0, pickup = pickup.0, dropoff = dropoff.0, "task submitted")
        }
        FleetEvent::TaskAssigned { task, robot } => {
            tracing::info!(tick, task = task.0, robot = robot.0, "task assigned")
        }
        FleetEvent::TaskPickedUp { task, robot } => {
            tracing::info!(tick, task = task.0, robot = robot.0, "task picked up")
        }
        FleetEvent::TaskCompleted { task, robot } => {
            tracing::info!(tick, task = task.0, robot = robot.0, "task completed")
        }
        FleetEvent::TaskRequeued { task, reason, attempts } => {
            tracing::warn!(tick, task = task.0, reason = %reason, attempts, "task requeued")
        }
        FleetEvent::TaskFailed { task, reason } => {
            tracing::warn!(tick, task = task.0, reason = %reason, "task failed")
        }
    }
}
