//! Per-robot state.

use std::collections::VecDeque;
use std::fmt;

use fleet_core::{NodeId, Point, Priority, RobotId, TaskId, Tick};
use fleet_graph::NavGraph;
use fleet_traffic::Reservation;

/// Where a robot is in its task cycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RobotState {
    /// No task.
    Idle,
    /// Task assigned, route not computed yet.
    Planning,
    /// Holding a route, about to ask for (or holding) the next lane.
    Routed,
    /// Travelling along a granted lane.
    Moving,
    /// Queued for the next lane.
    Waiting,
    /// Gave up its route after a denial or a deadlock abort.  Returns to
    /// `Idle` on the next tick.
    Blocked,
    /// Out of service.  Carried by robots handed back from removal.
    Failed,
}

impl fmt::Display for RobotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// One live robot.
#[derive(Clone, Debug, PartialEq)]
pub struct Robot {
    pub id:       RobotId,
    /// Last node reached.  While `Moving` this is the lane's source.
    pub node:     NodeId,
    pub state:    RobotState,
    pub priority: Priority,
    pub task:     Option<TaskId>,
    /// Goal of the current leg (task pickup or dropoff).
    pub goal:     Option<NodeId>,
    /// Nodes still to visit, excluding `node`.
    pub route:    VecDeque<NodeId>,
    /// Reservation for the next (or current) lane.
    pub reservation: Option<Reservation>,
    pub created:  Tick,
}

impl Robot {
    pub fn new(id: RobotId, node: NodeId, priority: Priority, created: Tick) -> Self {
        Self {
            id,
            node,
            state: RobotState::Idle,
            priority,
            task: None,
            goal: None,
            route: VecDeque::new(),
            reservation: None,
            created,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.state == RobotState::Idle
    }

    /// `true` while physically on a lane.
    pub fn in_transit(&self) -> bool {
        self.state == RobotState::Moving
    }

    /// Next node on the route.
    pub fn next_hop(&self) -> Option<NodeId> {
        self.route.front().copied()
    }

    /// Replace the route with `nodes`, which must start at `self.node`.
    pub fn set_route(&mut self, nodes: &[NodeId]) {
        self.route = nodes.iter().skip(1).copied().collect();
    }

    /// The full planned route including the current node.
    pub fn planned_route(&self) -> Vec<NodeId> {
        std::iter::once(self.node).chain(self.route.iter().copied()).collect()
    }

    /// Forget route, goal, and task.  A moving robot keeps the hop it is on.
    pub fn clear_plan(&mut self) {
        self.task = None;
        self.goal = None;
        if self.in_transit() {
            self.route.truncate(1);
        } else {
            self.route.clear();
        }
    }

    /// Fraction of the current lane covered at `now`, in `[0.0, 1.0]`.
    ///
    /// `1.0` for robots standing on a node.
    pub fn progress(&self, now: Tick) -> f32 {
        match (self.state, &self.reservation) {
            (RobotState::Moving, Some(r)) if !r.window.is_empty() => {
                let elapsed = now.since(r.window.enter) as f32;
                (elapsed / r.window.len() as f32).min(1.0)
            }
            _ => 1.0,
        }
    }

    /// Interpolated position at `now`.
    pub fn position(&self, graph: &NavGraph, now: Tick) -> Point {
        let here = graph.position(self.node);
        match (self.in_transit(), self.next_hop()) {
            (true, Some(next)) => here.lerp(graph.position(next), self.progress(now)),
            _ => here,
        }
    }
}
