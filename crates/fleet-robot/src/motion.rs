//! The motion controller: turns routes into reservations and reservations
//! into movement.

use fleet_core::{DenyReason, EventLog, LaneId, NodeId, Priority, RobotId, Tick};
use fleet_traffic::{Promotion, ReservationOutcome, TrafficManager};

use crate::{Robot, RobotRegistry, RobotResult, RobotState};

/// A robot that reached the end of a lane this tick.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Arrival {
    pub robot:   RobotId,
    pub node:    NodeId,
    /// The route is used up: the robot stands on its leg goal.
    pub at_goal: bool,
}

/// A lane request that could not be queued.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MoveIssue {
    Denied { robot: RobotId, lane: LaneId, reason: DenyReason },
    /// Consecutive route nodes with no lane between them.
    BrokenRoute { robot: RobotId, from: NodeId, to: NodeId },
}

impl MoveIssue {
    pub fn robot(&self) -> RobotId {
        match self {
            MoveIssue::Denied { robot, .. } | MoveIssue::BrokenRoute { robot, .. } => *robot,
        }
    }
}

/// Owns the robot registry and drives every robot's movement through the
/// traffic manager.
///
/// Each phase scans robots in ascending id order, so a tick is
/// deterministic.
#[derive(Debug, Default)]
pub struct MotionController {
    pub robots: RobotRegistry,
}

impl MotionController {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────

    /// Create a robot on `node`.  Nothing is created if the node is full.
    pub fn spawn(
        &mut self,
        node:     NodeId,
        priority: Priority,
        traffic:  &mut TrafficManager,
        now:      Tick,
    ) -> RobotResult<RobotId> {
        traffic.place(self.robots.peek_next_id(), node)?;
        Ok(self.robots.create(node, priority, now))
    }

    /// Remove a robot and everything it holds in the traffic table.  The
    /// returned robot is marked [`RobotState::Failed`].
    pub fn despawn(
        &mut self,
        id:      RobotId,
        traffic: &mut TrafficManager,
        now:     Tick,
        log:     &mut EventLog,
    ) -> RobotResult<Robot> {
        let mut robot = self.robots.remove(id)?;
        let promoted = traffic.remove_robot(id, now, log);
        self.apply_promotions(&promoted);
        robot.reservation = None;
        robot.state = RobotState::Failed;
        tracing::debug!(robot = id.0, node = robot.node.0, "robot taken out of service");
        Ok(robot)
    }

    /// Drop the robot's plan.  A queued request or an undeparted grant is
    /// given back at once; a robot already on a lane finishes that lane and
    /// then goes idle.
    pub fn stand_down(
        &mut self,
        id:      RobotId,
        traffic: &mut TrafficManager,
        now:     Tick,
        log:     &mut EventLog,
    ) -> RobotResult<()> {
        let robot = self.robots.try_get_mut(id)?;
        robot.clear_plan();
        traffic.withdraw(id);
        let mut promoted = Vec::new();
        if robot.state != RobotState::Moving {
            if let Some(r) = robot.reservation.take() {
                promoted = traffic.release(id, r.lane, now, log)?;
            }
            robot.state = RobotState::Idle;
        }
        self.apply_promotions(&promoted);
        Ok(())
    }

    // ── Tick phases ───────────────────────────────────────────────────────

    /// Land every robot whose lane window has closed, then hand freed lanes
    /// to queued robots.  Robots left `Blocked` last tick return to `Idle`.
    pub fn advance_arrivals(
        &mut self,
        traffic: &mut TrafficManager,
        now:     Tick,
        log:     &mut EventLog,
    ) -> RobotResult<Vec<Arrival>> {
        let mut arrivals = Vec::new();
        let mut promoted = Vec::new();

        for robot in self.robots.iter_mut() {
            match robot.state {
                RobotState::Blocked => {
                    robot.state = RobotState::Idle;
                    continue;
                }
                RobotState::Moving => {}
                _ => continue,
            }
            let Some(res) = robot.reservation else {
                continue;
            };
            if res.window.exit > now {
                continue;
            }
            promoted.extend(traffic.release(robot.id, res.lane, now, log)?);
            robot.node = traffic.graph().lane_to[res.lane.index()];
            robot.route.pop_front();
            robot.reservation = None;
            let at_goal = robot.route.is_empty();
            robot.state = if at_goal { RobotState::Idle } else { RobotState::Routed };
            arrivals.push(Arrival { robot: robot.id, node: robot.node, at_goal });
        }

        promoted.extend(traffic.promote_ready(now, log));
        self.apply_promotions(&promoted);
        Ok(arrivals)
    }

    /// Ask for the next lane on behalf of every `Routed` robot without a
    /// reservation.
    pub fn request_moves(
        &mut self,
        traffic: &mut TrafficManager,
        now:     Tick,
        log:     &mut EventLog,
    ) -> RobotResult<Vec<MoveIssue>> {
        let mut issues = Vec::new();
        for robot in self.robots.iter_mut() {
            if robot.state != RobotState::Routed || robot.reservation.is_some() {
                continue;
            }
            let Some(next) = robot.next_hop() else {
                robot.state = RobotState::Idle;
                continue;
            };
            let Some(lane) = traffic.graph().lane_between(robot.node, next) else {
                tracing::warn!(robot = robot.id.0, from = robot.node.0, to = next.0, "route step has no lane");
                issues.push(MoveIssue::BrokenRoute { robot: robot.id, from: robot.node, to: next });
                robot.route.clear();
                robot.state = RobotState::Blocked;
                continue;
            };
            match traffic.request_reservation(robot.id, lane, now, log)? {
                ReservationOutcome::Granted(r) => robot.reservation = Some(r),
                ReservationOutcome::Queued { .. } => robot.state = RobotState::Waiting,
                ReservationOutcome::Denied(reason) => {
                    tracing::warn!(robot = robot.id.0, lane = lane.0, ?reason, "lane reservation denied");
                    issues.push(MoveIssue::Denied { robot: robot.id, lane, reason });
                    robot.route.clear();
                    robot.state = RobotState::Blocked;
                }
            }
        }
        Ok(issues)
    }

    /// Start every granted move whose window has opened.  Returns how many
    /// robots departed.
    pub fn commit_departures(&mut self, traffic: &mut TrafficManager, now: Tick) -> RobotResult<usize> {
        let mut departed = 0;
        for robot in self.robots.iter_mut() {
            if robot.state != RobotState::Routed {
                continue;
            }
            let Some(res) = robot.reservation else {
                continue;
            };
            if res.window.enter > now {
                continue;
            }
            traffic.depart(robot.id, res.lane)?;
            robot.state = RobotState::Moving;
            departed += 1;
        }
        Ok(departed)
    }

    /// Give promoted robots their reservation and wake them.
    pub fn apply_promotions(&mut self, promoted: &[Promotion]) {
        for p in promoted {
            if let Some(robot) = self.robots.get_mut(p.robot) {
                robot.reservation = Some(p.reservation);
                if robot.state == RobotState::Waiting {
                    robot.state = RobotState::Routed;
                }
            }
        }
    }
}
