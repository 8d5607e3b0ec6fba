//! Unit tests for fleet-robot.

#[cfg(test)]
mod helpers {
    use std::sync::Arc;

    use fleet_core::{FleetConfig, NodeId, Point};
    use fleet_graph::NavGraphBuilder;
    use fleet_traffic::TrafficManager;

    /// Two-way corridor of `n` capacity-1 nodes, unit weights.
    pub fn corridor(n: usize) -> (TrafficManager, Vec<NodeId>) {
        let mut b = NavGraphBuilder::new();
        let nodes: Vec<NodeId> = (0..n).map(|i| b.add_node(Point::new(i as f32, 0.0))).collect();
        for w in nodes.windows(2) {
            b.add_lane_pair(w[0], w[1], 1.0);
        }
        let graph = Arc::new(b.build().unwrap());
        (TrafficManager::new(graph, &FleetConfig::default()), nodes)
    }
}

// ── Robot ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod robot {
    use fleet_core::{LaneId, NodeId, Priority, RobotId, Tick, TickWindow};
    use fleet_traffic::Reservation;

    use crate::{Robot, RobotState};

    fn moving(enter: u64, exit: u64) -> Robot {
        let mut r = Robot::new(RobotId(0), NodeId(0), Priority(0), Tick(0));
        r.state = RobotState::Moving;
        r.route.push_back(NodeId(1));
        r.reservation = Some(Reservation {
            lane:   LaneId(0),
            robot:  RobotId(0),
            window: TickWindow { enter: Tick(enter), exit: Tick(exit) },
        });
        r
    }

    #[test]
    fn standing_robot_progress_is_one() {
        let r = Robot::new(RobotId(0), NodeId(3), Priority(0), Tick(0));
        assert_eq!(r.progress(Tick(7)), 1.0);
        assert!(r.is_idle());
    }

    #[test]
    fn moving_progress_interpolates() {
        let r = moving(10, 14);
        assert_eq!(r.progress(Tick(10)), 0.0);
        assert!((r.progress(Tick(11)) - 0.25).abs() < 1e-6);
        assert_eq!(r.progress(Tick(20)), 1.0);
    }

    #[test]
    fn route_excludes_current_node() {
        let mut r = Robot::new(RobotId(0), NodeId(0), Priority(0), Tick(0));
        r.set_route(&[NodeId(0), NodeId(1), NodeId(2)]);
        assert_eq!(r.next_hop(), Some(NodeId(1)));
        assert_eq!(r.planned_route(), vec![NodeId(0), NodeId(1), NodeId(2)]);
    }

    #[test]
    fn clear_plan_keeps_current_hop_when_moving() {
        let mut r = moving(0, 1);
        r.route.push_back(NodeId(2));
        r.task = Some(fleet_core::TaskId(4));
        r.clear_plan();
        assert_eq!(r.route.iter().copied().collect::<Vec<_>>(), vec![NodeId(1)]);
        assert_eq!(r.task, None);
    }
}

// ── RobotRegistry ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod registry {
    use fleet_core::{NodeId, Priority, RobotId, Tick};

    use crate::{RobotError, RobotRegistry};

    #[test]
    fn ids_are_never_reused() {
        let mut reg = RobotRegistry::new();
        let a = reg.create(NodeId(0), Priority(0), Tick(0));
        let b = reg.create(NodeId(1), Priority(0), Tick(0));
        assert_eq!((a, b), (RobotId(0), RobotId(1)));
        reg.remove(a).unwrap();
        let c = reg.create(NodeId(0), Priority(0), Tick(1));
        assert_eq!(c, RobotId(2));
        assert!(matches!(reg.remove(a), Err(RobotError::UnknownRobot(RobotId(0)))));
        assert_eq!(reg.ids(), vec![b, c]);
    }

    #[test]
    fn by_priority_orders_important_then_oldest() {
        let mut reg = RobotRegistry::new();
        let low = reg.create(NodeId(0), Priority(1), Tick(0));
        let high = reg.create(NodeId(1), Priority(9), Tick(0));
        let low2 = reg.create(NodeId(2), Priority(1), Tick(0));
        assert_eq!(reg.by_priority(), vec![high, low, low2]);
        assert_eq!(reg.priority_of(RobotId(77)), Priority(0));
    }

    #[test]
    fn clear_restarts_ids() {
        let mut reg = RobotRegistry::new();
        reg.create(NodeId(0), Priority(0), Tick(0));
        reg.clear();
        assert!(reg.is_empty());
        assert_eq!(reg.peek_next_id(), RobotId(0));
    }
}

// ── MotionController ──────────────────────────────────────────────────────────

#[cfg(test)]
mod motion {
    use std::sync::Arc;

    use fleet_core::{DenyReason, EventLog, FleetConfig, Point, Priority, Tick};
    use fleet_graph::{NavGraphBuilder, NodeSpec};
    use fleet_traffic::{TrafficError, TrafficManager};

    use super::helpers::corridor;
    use crate::{MotionController, MoveIssue, RobotError, RobotState};

    #[test]
    fn walks_a_route_one_hop_per_tick() {
        let (mut traffic, n) = corridor(3);
        let mut mc = MotionController::new();
        let mut log = EventLog::new();
        let id = mc.spawn(n[0], Priority(0), &mut traffic, Tick(0)).unwrap();
        {
            let r = mc.robots.get_mut(id).unwrap();
            r.set_route(&[n[0], n[1], n[2]]);
            r.state = RobotState::Routed;
        }

        // Tick 0: grant and depart n0 → n1.
        assert!(mc.advance_arrivals(&mut traffic, Tick(0), &mut log).unwrap().is_empty());
        assert!(mc.request_moves(&mut traffic, Tick(0), &mut log).unwrap().is_empty());
        assert_eq!(mc.commit_departures(&mut traffic, Tick(0)).unwrap(), 1);
        assert_eq!(mc.robots.get(id).unwrap().state, RobotState::Moving);
        assert!(traffic.occupants(n[0]).is_empty());

        // Tick 1: arrive at n1, continue to n2.
        let arrivals = mc.advance_arrivals(&mut traffic, Tick(1), &mut log).unwrap();
        assert_eq!(arrivals.len(), 1);
        assert_eq!(arrivals[0].node, n[1]);
        assert!(!arrivals[0].at_goal);
        mc.request_moves(&mut traffic, Tick(1), &mut log).unwrap();
        mc.commit_departures(&mut traffic, Tick(1)).unwrap();

        // Tick 2: arrive at goal.
        let arrivals = mc.advance_arrivals(&mut traffic, Tick(2), &mut log).unwrap();
        assert!(arrivals[0].at_goal);
        let r = mc.robots.get(id).unwrap();
        assert_eq!(r.node, n[2]);
        assert_eq!(r.state, RobotState::Idle);
        assert!(r.reservation.is_none());
        assert_eq!(traffic.occupants(n[2]), &[id]);
        assert_eq!(traffic.reservations().count(), 0);
    }

    #[test]
    fn follower_waits_then_is_promoted() {
        let (mut traffic, n) = corridor(3);
        let mut mc = MotionController::new();
        let mut log = EventLog::new();
        let lead = mc.spawn(n[1], Priority(0), &mut traffic, Tick(0)).unwrap();
        let tail = mc.spawn(n[0], Priority(0), &mut traffic, Tick(0)).unwrap();
        for (id, route) in [(lead, vec![n[1], n[2]]), (tail, vec![n[0], n[1]])] {
            let r = mc.robots.get_mut(id).unwrap();
            r.set_route(&route);
            r.state = RobotState::Routed;
        }

        mc.request_moves(&mut traffic, Tick(0), &mut log).unwrap();
        assert_eq!(mc.robots.get(tail).unwrap().state, RobotState::Waiting);
        mc.commit_departures(&mut traffic, Tick(0)).unwrap();

        // The leader's departure frees n1; the follower is promoted.
        mc.advance_arrivals(&mut traffic, Tick(1), &mut log).unwrap();
        let t = mc.robots.get(tail).unwrap();
        assert_eq!(t.state, RobotState::Routed);
        assert!(t.reservation.is_some());
        assert_eq!(mc.commit_departures(&mut traffic, Tick(1)).unwrap(), 1);
    }

    #[test]
    fn spawn_on_full_node_creates_nothing() {
        let (mut traffic, n) = corridor(2);
        let mut mc = MotionController::new();
        mc.spawn(n[0], Priority(0), &mut traffic, Tick(0)).unwrap();
        let err = mc.spawn(n[0], Priority(0), &mut traffic, Tick(0)).unwrap_err();
        assert!(matches!(err, RobotError::Traffic(TrafficError::NodeFull { .. })));
        assert_eq!(mc.robots.len(), 1);
    }

    #[test]
    fn stand_down_mid_lane_finishes_hop() {
        let (mut traffic, n) = corridor(3);
        let mut mc = MotionController::new();
        let mut log = EventLog::new();
        let id = mc.spawn(n[0], Priority(0), &mut traffic, Tick(0)).unwrap();
        {
            let r = mc.robots.get_mut(id).unwrap();
            r.set_route(&[n[0], n[1], n[2]]);
            r.state = RobotState::Routed;
        }
        mc.request_moves(&mut traffic, Tick(0), &mut log).unwrap();
        mc.commit_departures(&mut traffic, Tick(0)).unwrap();

        mc.stand_down(id, &mut traffic, Tick(0), &mut log).unwrap();
        assert_eq!(mc.robots.get(id).unwrap().state, RobotState::Moving);
        mc.advance_arrivals(&mut traffic, Tick(1), &mut log).unwrap();
        let r = mc.robots.get(id).unwrap();
        assert_eq!((r.node, r.state), (n[1], RobotState::Idle));
    }

    #[test]
    fn stand_down_before_departure_returns_grant() {
        let (mut traffic, n) = corridor(2);
        let mut mc = MotionController::new();
        let mut log = EventLog::new();
        let id = mc.spawn(n[0], Priority(0), &mut traffic, Tick(0)).unwrap();
        {
            let r = mc.robots.get_mut(id).unwrap();
            r.set_route(&[n[0], n[1]]);
            r.state = RobotState::Routed;
        }
        mc.request_moves(&mut traffic, Tick(0), &mut log).unwrap();
        assert!(traffic.reservation_of(id).is_some());
        mc.stand_down(id, &mut traffic, Tick(0), &mut log).unwrap();
        assert!(traffic.reservation_of(id).is_none());
        assert!(traffic.occupants(n[1]).is_empty());
        assert_eq!(mc.robots.get(id).unwrap().state, RobotState::Idle);
    }

    #[test]
    fn despawn_releases_and_promotes() {
        let (mut traffic, n) = corridor(2);
        let mut mc = MotionController::new();
        let mut log = EventLog::new();
        let a = mc.spawn(n[1], Priority(0), &mut traffic, Tick(0)).unwrap();
        let b = mc.spawn(n[0], Priority(0), &mut traffic, Tick(0)).unwrap();
        {
            let r = mc.robots.get_mut(b).unwrap();
            r.set_route(&[n[0], n[1]]);
            r.state = RobotState::Routed;
        }
        mc.request_moves(&mut traffic, Tick(0), &mut log).unwrap();
        assert_eq!(mc.robots.get(b).unwrap().state, RobotState::Waiting);

        let removed = mc.despawn(a, &mut traffic, Tick(0), &mut log).unwrap();
        assert_eq!(removed.id, a);
        assert_eq!(removed.state, RobotState::Failed);
        assert!(removed.reservation.is_none());
        assert!(!mc.robots.contains(a));
        assert_eq!(mc.robots.get(b).unwrap().state, RobotState::Routed);
        assert!(matches!(
            mc.despawn(a, &mut traffic, Tick(0), &mut log),
            Err(RobotError::UnknownRobot(_))
        ));
    }

    #[test]
    fn gap_in_route_is_reported_and_blocks() {
        let (mut traffic, n) = corridor(3);
        let mut mc = MotionController::new();
        let mut log = EventLog::new();
        let id = mc.spawn(n[0], Priority(0), &mut traffic, Tick(0)).unwrap();
        {
            let r = mc.robots.get_mut(id).unwrap();
            r.set_route(&[n[0], n[2]]);
            r.state = RobotState::Routed;
        }
        let issues = mc.request_moves(&mut traffic, Tick(0), &mut log).unwrap();
        assert_eq!(issues, vec![MoveIssue::BrokenRoute { robot: id, from: n[0], to: n[2] }]);
        let r = mc.robots.get(id).unwrap();
        assert_eq!(r.state, RobotState::Blocked);
        assert!(r.route.is_empty());
    }

    #[test]
    fn zero_capacity_hop_is_denied_and_blocks() {
        let mut b = NavGraphBuilder::new();
        let a = b.add_node(Point::new(0.0, 0.0));
        let c = b.add_node_with(NodeSpec::at(Point::new(1.0, 0.0)).capacity(0));
        b.add_lane_pair(a, c, 1.0);
        let mut traffic = TrafficManager::new(Arc::new(b.build().unwrap()), &FleetConfig::default());
        let mut mc = MotionController::new();
        let mut log = EventLog::new();
        let id = mc.spawn(a, Priority(0), &mut traffic, Tick(0)).unwrap();
        {
            let r = mc.robots.get_mut(id).unwrap();
            r.set_route(&[a, c]);
            r.state = RobotState::Routed;
        }
        let issues = mc.request_moves(&mut traffic, Tick(0), &mut log).unwrap();
        let lane = traffic.graph().lane_between(a, c).unwrap();
        assert_eq!(
            issues,
            vec![MoveIssue::Denied { robot: id, lane, reason: DenyReason::ZeroCapacity(c) }]
        );
        assert_eq!(mc.robots.get(id).unwrap().state, RobotState::Blocked);
    }

    #[test]
    fn blocked_recovers_to_idle() {
        let (mut traffic, n) = corridor(2);
        let mut mc = MotionController::new();
        let id = mc.spawn(n[0], Priority(0), &mut traffic, Tick(0)).unwrap();
        mc.robots.get_mut(id).unwrap().state = RobotState::Blocked;
        mc.advance_arrivals(&mut traffic, Tick(1), &mut EventLog::new()).unwrap();
        assert_eq!(mc.robots.get(id).unwrap().state, RobotState::Idle);
    }
}
