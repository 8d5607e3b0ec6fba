//! Global invariant checks over the whole coordination state.

use fleet_core::{LaneId, NodeId, RobotId, TaskId};
use fleet_graph::NavGraph;
use fleet_robot::{RobotRegistry, RobotState};
use fleet_task::TaskAllocator;
use fleet_traffic::TrafficManager;

/// One broken invariant found by [`FleetSim::audit`][crate::FleetSim::audit].
#[derive(Clone, Debug, PartialEq)]
pub enum InvariantViolation {
    NodeOverCapacity { node: NodeId, occupants: usize, capacity: u32 },
    /// More overlapping reservations on a lane than its capacity allows.
    LaneOverCapacity { lane: LaneId, overlapping: usize, capacity: u32 },
    /// Overlapping reservations on a lane and its reverse.
    HeadOn { lane: LaneId, reverse: LaneId, robots: (RobotId, RobotId) },
    /// The wait-for graph still holds a cycle after deadlock resolution.
    WaitCycle(Vec<RobotId>),
    /// An active task whose holder does not point back at it.
    TaskHolderMismatch { task: TaskId, robot: Option<RobotId> },
    /// A robot pointing at a task that is not active under it.
    RobotTaskMismatch { robot: RobotId, task: TaskId },
    /// A robot missing from the occupancy of the node it stands on or is
    /// driving to.
    MisplacedRobot { robot: RobotId, node: NodeId },
    /// An occupancy entry for a robot that does not exist.
    GhostOccupant { node: NodeId, robot: RobotId },
}

pub(crate) fn check(
    graph:   &NavGraph,
    traffic: &TrafficManager,
    robots:  &RobotRegistry,
    tasks:   &TaskAllocator,
) -> Vec<InvariantViolation> {
    let mut out = Vec::new();
    check_nodes(graph, traffic, robots, &mut out);
    check_lanes(graph, traffic, &mut out);
    if let Some(cycle) = traffic.wait_for_graph().find_cycle() {
        out.push(InvariantViolation::WaitCycle(cycle));
    }
    check_tasks(robots, tasks, &mut out);
    out
}

fn check_nodes(
    graph:   &NavGraph,
    traffic: &TrafficManager,
    robots:  &RobotRegistry,
    out:     &mut Vec<InvariantViolation>,
) {
    for i in 0..graph.node_count() {
        let node = NodeId(i as u32);
        let occupants = traffic.occupants(node);
        let capacity = graph.capacity(node);
        if occupants.len() > capacity as usize {
            out.push(InvariantViolation::NodeOverCapacity { node, occupants: occupants.len(), capacity });
        }
        for &robot in occupants {
            if !robots.contains(robot) {
                out.push(InvariantViolation::GhostOccupant { node, robot });
            }
        }
    }

    for robot in robots.iter() {
        let node = match (robot.state, robot.reservation) {
            (RobotState::Moving, Some(r)) => graph.lane_to[r.lane.index()],
            _ => robot.node,
        };
        if !traffic.occupants(node).contains(&robot.id) {
            out.push(InvariantViolation::MisplacedRobot { robot: robot.id, node });
        }
    }
}

fn check_lanes(graph: &NavGraph, traffic: &TrafficManager, out: &mut Vec<InvariantViolation>) {
    for i in 0..graph.lane_count() {
        let lane = LaneId(i as u32);
        let held = traffic.reservations_on(lane);
        let capacity = graph.lane_capacity[i];

        let overlapping = held
            .iter()
            .map(|a| held.iter().filter(|b| a.window.overlaps(&b.window)).count())
            .max()
            .unwrap_or(0);
        if overlapping > capacity as usize {
            out.push(InvariantViolation::LaneOverCapacity { lane, overlapping, capacity });
        }

        // Each pair once, from its lower-numbered lane.
        let Some(reverse) = graph.reverse(lane).filter(|&r| r > lane) else {
            continue;
        };
        for a in held {
            if let Some(b) = traffic
                .reservations_on(reverse)
                .iter()
                .find(|b| a.window.overlaps(&b.window))
            {
                out.push(InvariantViolation::HeadOn { lane, reverse, robots: (a.robot, b.robot) });
            }
        }
    }
}

fn check_tasks(robots: &RobotRegistry, tasks: &TaskAllocator, out: &mut Vec<InvariantViolation>) {
    for task in tasks.iter().filter(|t| t.status.is_active()) {
        let held_back = task
            .robot
            .and_then(|r| robots.get(r))
            .is_some_and(|r| r.task == Some(task.id));
        if !held_back {
            out.push(InvariantViolation::TaskHolderMismatch { task: task.id, robot: task.robot });
        }
    }

    for robot in robots.iter() {
        let Some(id) = robot.task else {
            continue;
        };
        let owned = tasks
            .get(id)
            .is_some_and(|t| t.status.is_active() && t.robot == Some(robot.id));
        if !owned {
            out.push(InvariantViolation::RobotTaskMismatch { robot: robot.id, task: id });
        }
    }
}
