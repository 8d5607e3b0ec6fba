//! The coordination context and its tick loop.

use std::sync::Arc;

use fleet_core::{
    EventLog, FailureReason, FleetConfig, FleetEvent, LaneId, NodeId, Priority, RobotId, TaskId,
    Tick, TimedEvent,
};
use fleet_graph::{AStarPlanner, BlockedLanes, GraphResult, NavGraph, Path, Planner};
use fleet_robot::{MotionController, MoveIssue, Robot, RobotRegistry, RobotState};
use fleet_task::{Task, TaskAllocator};
use fleet_traffic::{ReplanRequest, TrafficManager};

use crate::{
    FleetObserver, FleetSnapshot, InvariantViolation, LaneQueue, NodeView, NoopObserver, RobotView,
    SimError, SimResult, TaskView, audit,
};

/// One fleet: the navigation graph, every robot and task, the reservation
/// table and the tick counter.
///
/// Instances are independent; nothing is process-global.  Build one with
/// [`FleetSimBuilder`][crate::FleetSimBuilder].
pub struct FleetSim<P: Planner = AStarPlanner> {
    config:   FleetConfig,
    graph:    Arc<NavGraph>,
    planner:  P,
    tick:     Tick,
    motion:   MotionController,
    traffic:  TrafficManager,
    tasks:    TaskAllocator,
    log:      EventLog,
    /// Log entries already handed to an observer.
    observed: usize,
}

impl<P: Planner> FleetSim<P> {
    pub(crate) fn new(graph: Arc<NavGraph>, planner: P, config: FleetConfig) -> Self {
        Self {
            traffic: TrafficManager::new(Arc::clone(&graph), &config),
            tasks: TaskAllocator::new(config.max_task_attempts),
            motion: MotionController::new(),
            log: EventLog::new(),
            tick: Tick::ZERO,
            observed: 0,
            config,
            graph,
            planner,
        }
    }

    /// Drop every robot, task, reservation and event and return to tick
    /// zero.  The graph and configuration are kept.
    pub fn reset(&mut self) {
        self.motion.robots.clear();
        self.traffic.clear();
        self.tasks.clear();
        self.log.clear();
        self.observed = 0;
        self.tick = Tick::ZERO;
    }

    // ── Commands ──────────────────────────────────────────────────────────

    /// Create an idle robot on `node`.
    pub fn create_robot(&mut self, node: NodeId, priority: Priority) -> SimResult<RobotId> {
        if !self.graph.contains_node(node) {
            return Err(SimError::UnknownNode(node));
        }
        if let Some(max) = self.config.max_robots {
            if self.motion.robots.len() >= max {
                return Err(SimError::RobotLimit(max));
            }
        }
        if self.config.spawn_points_only && !self.graph.is_spawn_point(node) {
            return Err(SimError::NotSpawnPoint(node));
        }
        let id = self.motion.spawn(node, priority, &mut self.traffic, self.tick)?;
        self.log.emit(self.tick, FleetEvent::RobotCreated { robot: id, node, priority });
        Ok(id)
    }

    /// Remove a robot.  Its reservations are released and any task it held
    /// goes back to the pending pool in its original place.
    pub fn remove_robot(&mut self, id: RobotId) -> SimResult<()> {
        let robot = self.motion.despawn(id, &mut self.traffic, self.tick, &mut self.log)?;
        self.log.emit(self.tick, FleetEvent::RobotRemoved { robot: id, node: robot.node });
        self.tasks.on_robot_removed(robot.task, self.tick, &mut self.log);
        Ok(())
    }

    pub fn submit_task(&mut self, pickup: NodeId, dropoff: NodeId) -> SimResult<TaskId> {
        Ok(self.tasks.submit(pickup, dropoff, &self.graph, self.tick, &mut self.log)?)
    }

    /// Cancel a task.  A robot carrying it stops where it can: a robot on a
    /// lane finishes that lane, anything else is released at once.
    pub fn cancel_task(&mut self, id: TaskId) -> SimResult<()> {
        if let Some(holder) = self.tasks.cancel(id, self.tick, &mut self.log)? {
            self.motion.stand_down(holder, &mut self.traffic, self.tick, &mut self.log)?;
        }
        Ok(())
    }

    /// Run one coordination pass and return the resulting state.
    pub fn step(&mut self) -> SimResult<FleetSnapshot> {
        self.step_with(&mut NoopObserver)
    }

    /// [`step`](Self::step), reporting to `observer`.
    ///
    /// The observer sees each event once, but the events stay buffered in
    /// [`events`](Self::events) until [`drain_events`](Self::drain_events)
    /// is called.  Long runs should drain between ticks.
    pub fn step_with<O: FleetObserver + ?Sized>(&mut self, observer: &mut O) -> SimResult<FleetSnapshot> {
        let now = self.tick;
        observer.on_tick_start(now);
        self.process_tick(now)?;

        for event in &self.log.pending()[self.observed..] {
            observer.on_event(event);
        }
        self.observed = self.log.len();

        let snapshot = self.snapshot();
        observer.on_tick_end(&snapshot);
        self.tick = now.next();
        Ok(snapshot)
    }

    /// Run `n` ticks, stopping at the first error.
    pub fn run_ticks<O: FleetObserver + ?Sized>(&mut self, n: u64, observer: &mut O) -> SimResult<()> {
        for _ in 0..n {
            self.step_with(observer)?;
        }
        Ok(())
    }

    /// Take every recorded event, oldest first, emptying the buffer.
    pub fn drain_events(&mut self) -> Vec<TimedEvent> {
        self.observed = 0;
        self.log.drain()
    }

    // ── Tick phases ───────────────────────────────────────────────────────

    fn process_tick(&mut self, now: Tick) -> SimResult<()> {
        // ── Phase 1: arrivals and promotions ──────────────────────────────
        let arrivals = self.motion.advance_arrivals(&mut self.traffic, now, &mut self.log)?;
        for arrival in arrivals.iter().filter(|a| a.at_goal) {
            if let Some(robot) = self.motion.robots.get_mut(arrival.robot) {
                self.tasks.on_goal_reached(robot, now, &mut self.log)?;
            }
        }

        // ── Phase 2: assignment ───────────────────────────────────────────
        for id in self.motion.robots.by_priority() {
            if self.tasks.pending_len() == 0 {
                break;
            }
            if let Some(robot) = self.motion.robots.get_mut(id) {
                self.tasks.on_robot_idle(robot, &self.graph, &self.planner, now, &mut self.log);
            }
        }

        // ── Phase 3: planning ─────────────────────────────────────────────
        self.plan_routes(now)?;

        // ── Phase 4: reservation requests ─────────────────────────────────
        let issues = self.motion.request_moves(&mut self.traffic, now, &mut self.log)?;
        for issue in issues {
            self.on_move_issue(issue, now)?;
        }

        // ── Phase 5: deadlock resolution ──────────────────────────────────
        let robots = &self.motion.robots;
        let replans = self
            .traffic
            .resolve_deadlocks(now, |r| robots.priority_of(r), &mut self.log);
        for request in replans {
            self.detour(request, now)?;
        }

        // ── Phase 6: departures ───────────────────────────────────────────
        let departed = self.motion.commit_departures(&mut self.traffic, now)?;

        tracing::debug!(
            tick     = now.0,
            robots   = self.motion.robots.len(),
            departed,
            pending  = self.tasks.pending_len(),
            "tick complete"
        );
        Ok(())
    }

    /// Route every `Planning` robot to its goal.  Legs that already end
    /// where the robot stands are applied without planning.
    fn plan_routes(&mut self, now: Tick) -> SimResult<()> {
        let mut queries: Vec<(RobotId, NodeId, NodeId)> = Vec::new();
        for robot in self.motion.robots.iter_mut() {
            // Pickup and dropoff can both be underfoot.
            for _ in 0..2 {
                if robot.state != RobotState::Planning || robot.goal != Some(robot.node) {
                    break;
                }
                self.tasks.on_goal_reached(robot, now, &mut self.log)?;
            }
            if robot.state != RobotState::Planning {
                continue;
            }
            match robot.goal {
                Some(goal) => queries.push((robot.id, robot.node, goal)),
                None => robot.state = RobotState::Idle,
            }
        }
        if queries.is_empty() {
            return Ok(());
        }

        let routes = self.compute_routes(&queries);
        for (&(id, from, to), route) in queries.iter().zip(routes) {
            let Some(robot) = self.motion.robots.get_mut(id) else {
                continue;
            };
            match route {
                Ok(path) => {
                    robot.set_route(&path.nodes);
                    robot.state = RobotState::Routed;
                    self.log.emit(now, FleetEvent::RoutePlanned {
                        robot: id,
                        goal:  to,
                        hops:  path.hops(),
                        cost:  path.cost,
                    });
                }
                Err(e) => {
                    tracing::debug!(robot = id.0, error = %e, "planning failed");
                    self.log.emit(now, FleetEvent::RouteNotFound { robot: id, from, to });
                    self.tasks.on_task_failed(robot, FailureReason::Unreachable, now, &mut self.log)?;
                    robot.state = RobotState::Idle;
                }
            }
        }
        Ok(())
    }

    /// Plan every query against the unobstructed graph.
    ///
    /// With the `parallel` feature the queries run on Rayon's thread pool;
    /// results come back in query order either way.
    fn compute_routes(&self, queries: &[(RobotId, NodeId, NodeId)]) -> Vec<GraphResult<Path>> {
        let graph = &*self.graph;
        let planner = &self.planner;
        let open = BlockedLanes::none();

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            queries
                .par_iter()
                .map(|&(_, from, to)| planner.plan(graph, from, to, &open))
                .collect()
        }

        #[cfg(not(feature = "parallel"))]
        {
            queries
                .iter()
                .map(|&(_, from, to)| planner.plan(graph, from, to, &open))
                .collect()
        }
    }

    fn on_move_issue(&mut self, issue: MoveIssue, now: Tick) -> SimResult<()> {
        let id = issue.robot();
        tracing::warn!(robot = id.0, ?issue, "move rejected");
        let Some(robot) = self.motion.robots.get_mut(id) else {
            return Ok(());
        };
        self.log.emit(now, FleetEvent::RobotBlocked { robot: id, node: robot.node });
        if robot.task.is_some() {
            self.tasks.on_task_failed(robot, FailureReason::Unreachable, now, &mut self.log)?;
        }
        Ok(())
    }

    /// Re-route a deadlock victim around the lane it was queued on.  If no
    /// detour exists the robot is `Blocked` and its task is handed back.
    fn detour(&mut self, request: ReplanRequest, now: Tick) -> SimResult<()> {
        let Some(robot) = self.motion.robots.get_mut(request.robot) else {
            return Ok(());
        };
        let avoid = match self.config.detour_penalty {
            Some(penalty) => BlockedLanes::penalize([request.lane], penalty),
            None => BlockedLanes::exclude([request.lane]),
        };
        let route = robot
            .goal
            .and_then(|goal| self.planner.plan(&self.graph, robot.node, goal, &avoid).ok().map(|p| (goal, p)));

        match route {
            Some((goal, path)) => {
                robot.set_route(&path.nodes);
                robot.state = RobotState::Routed;
                self.log.emit(now, FleetEvent::RoutePlanned {
                    robot: robot.id,
                    goal,
                    hops:  path.hops(),
                    cost:  path.cost,
                });
                self.log.emit(now, FleetEvent::DeadlockResolved { victim: robot.id, replanned: true });
            }
            None => {
                robot.route.clear();
                robot.state = RobotState::Blocked;
                self.log.emit(now, FleetEvent::DeadlockResolved { victim: robot.id, replanned: false });
                self.log.emit(now, FleetEvent::RobotBlocked { robot: robot.id, node: robot.node });
                if robot.task.is_some() {
                    self.tasks.on_task_failed(robot, FailureReason::DeadlockAbort, now, &mut self.log)?;
                }
            }
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────────────────

    /// The state as of the last completed tick.
    pub fn snapshot(&self) -> FleetSnapshot {
        let graph = &*self.graph;
        let now = self.tick;

        let nodes = (0..graph.node_count())
            .map(|i| {
                let node = NodeId(i as u32);
                NodeView {
                    node,
                    occupants: self.traffic.occupants(node).to_vec(),
                    waiting:   self.traffic.waiting_at(node),
                }
            })
            .collect();

        let robots = self
            .motion
            .robots
            .iter()
            .map(|r| RobotView {
                id:       r.id,
                node:     r.node,
                state:    r.state,
                priority: r.priority,
                task:     r.task,
                goal:     r.goal,
                route:    r.planned_route(),
                progress: r.progress(now),
                position: r.position(graph, now),
            })
            .collect();

        let mut reservations: Vec<_> = self.traffic.reservations().copied().collect();
        reservations.sort_by_key(|r| (r.lane, r.robot));

        let queues = (0..graph.lane_count())
            .map(|i| LaneId(i as u32))
            .filter(|&lane| self.traffic.queue_len(lane) > 0)
            .map(|lane| LaneQueue { lane, robots: self.traffic.queue(lane).collect() })
            .collect();

        let tasks = self
            .tasks
            .iter()
            .map(|t| TaskView {
                id:       t.id,
                pickup:   t.pickup,
                dropoff:  t.dropoff,
                status:   t.status,
                robot:    t.robot,
                attempts: t.attempts,
                failure:  t.failure,
            })
            .collect();

        FleetSnapshot { tick: now, nodes, robots, reservations, queues, tasks }
    }

    /// Every global invariant the current state violates.  Empty when
    /// healthy.
    pub fn audit(&self) -> Vec<InvariantViolation> {
        audit::check(&self.graph, &self.traffic, &self.motion.robots, &self.tasks)
    }

    /// The next tick to be processed.
    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn graph(&self) -> &Arc<NavGraph> {
        &self.graph
    }

    pub fn config(&self) -> &FleetConfig {
        &self.config
    }

    pub fn planner(&self) -> &P {
        &self.planner
    }

    pub fn robot(&self, id: RobotId) -> Option<&Robot> {
        self.motion.robots.get(id)
    }

    pub fn robots(&self) -> &RobotRegistry {
        &self.motion.robots
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn tasks(&self) -> &TaskAllocator {
        &self.tasks
    }

    pub fn traffic(&self) -> &TrafficManager {
        &self.traffic
    }

    /// Events recorded since the last [`drain_events`](Self::drain_events).
    pub fn events(&self) -> &[TimedEvent] {
        self.log.pending()
    }

    /// `true` once every submitted task has completed or failed.
    pub fn is_quiescent(&self) -> bool {
        self.tasks.iter().all(|t| t.status.is_finished())
    }
}
