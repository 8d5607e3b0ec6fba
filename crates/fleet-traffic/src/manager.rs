//! The reservation table.

use std::cmp::Reverse;
use std::collections::VecDeque;
use std::sync::Arc;

use fleet_core::{
    DenyReason, EventLog, FleetConfig, FleetEvent, LaneId, NodeId, Priority, RobotId, Tick,
    TickWindow,
};
use fleet_graph::NavGraph;

use crate::{
    Promotion, ReplanRequest, Reservation, ReservationOutcome, TrafficError, TrafficResult,
    WaitForGraph,
};

#[cfg(feature = "fx-hash")]
type IdMap<K, V> = rustc_hash::FxHashMap<K, V>;
#[cfg(not(feature = "fx-hash"))]
type IdMap<K, V> = std::collections::HashMap<K, V>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
struct QueuedRequest {
    robot: RobotId,
    since: Tick,
}

/// Owns every lane reservation, every per-lane FIFO queue, and per-node
/// occupancy.
///
/// Tables are plain vectors indexed by `LaneId` / `NodeId`; the graph itself
/// stays read-only and shared.
pub struct TrafficManager {
    graph:      Arc<NavGraph>,
    /// Reservation length per lane, from `FleetConfig::traversal_ticks`.
    lane_ticks: Vec<u64>,

    held:       Vec<Vec<Reservation>>,
    queues:     Vec<VecDeque<QueuedRequest>>,
    /// Robots standing on, or holding a grant into, each node.
    occupants:  Vec<Vec<RobotId>>,
    /// Lane each queued robot waits for.  A robot waits for at most one.
    waiting_on: IdMap<RobotId, LaneId>,
}

impl TrafficManager {
    pub fn new(graph: Arc<NavGraph>, config: &FleetConfig) -> Self {
        let lane_ticks = graph
            .lane_weight
            .iter()
            .map(|&w| config.traversal_ticks(w))
            .collect();
        let lanes = graph.lane_count();
        let nodes = graph.node_count();
        Self {
            lane_ticks,
            held:       vec![Vec::new(); lanes],
            queues:     vec![VecDeque::new(); lanes],
            occupants:  vec![Vec::new(); nodes],
            waiting_on: IdMap::default(),
            graph,
        }
    }

    pub fn graph(&self) -> &Arc<NavGraph> {
        &self.graph
    }

    /// Drop every reservation, queue entry, and occupant.
    pub fn clear(&mut self) {
        self.held.iter_mut().for_each(Vec::clear);
        self.queues.iter_mut().for_each(VecDeque::clear);
        self.occupants.iter_mut().for_each(Vec::clear);
        self.waiting_on.clear();
    }

    /// Ticks a reservation on `lane` lasts.
    #[inline]
    pub fn lane_ticks(&self, lane: LaneId) -> u64 {
        self.lane_ticks[lane.index()]
    }

    // ── Placement ─────────────────────────────────────────────────────────

    /// Put a newly created robot on `node`.
    pub fn place(&mut self, robot: RobotId, node: NodeId) -> TrafficResult<()> {
        if !self.graph.contains_node(node) {
            return Err(TrafficError::UnknownNode(node));
        }
        let capacity = self.graph.capacity(node);
        let occupants = &mut self.occupants[node.index()];
        if occupants.contains(&robot) {
            return Ok(());
        }
        if occupants.len() >= capacity as usize {
            return Err(TrafficError::NodeFull { node, capacity });
        }
        occupants.push(robot);
        Ok(())
    }

    // ── Requests ──────────────────────────────────────────────────────────

    /// Ask for `lane` starting at `from`.
    ///
    /// Repeating a request is harmless: a robot already holding the lane
    /// gets its reservation back, a robot already queued gets its current
    /// position.  Asking for a different lane while queued withdraws the
    /// earlier request.
    pub fn request_reservation(
        &mut self,
        robot: RobotId,
        lane:  LaneId,
        from:  Tick,
        log:   &mut EventLog,
    ) -> TrafficResult<ReservationOutcome> {
        self.check_lane(lane)?;
        let to = self.graph.lane_to[lane.index()];

        if self.graph.capacity(to) == 0 {
            let reason = DenyReason::ZeroCapacity(to);
            log.emit(from, FleetEvent::ReservationDenied { robot, lane, reason });
            return Ok(ReservationOutcome::Denied(reason));
        }
        if let Some(r) = self.held[lane.index()].iter().find(|r| r.robot == robot) {
            return Ok(ReservationOutcome::Granted(*r));
        }
        if let Some(position) = self.queue_position(robot, lane) {
            return Ok(ReservationOutcome::Queued { position });
        }
        self.withdraw(robot);

        let window = TickWindow::starting(from, self.lane_ticks(lane));
        if self.queues[lane.index()].is_empty() && self.can_grant(robot, lane, window) {
            let reservation = self.grant(robot, lane, window, from, log);
            return Ok(ReservationOutcome::Granted(reservation));
        }

        let queue = &mut self.queues[lane.index()];
        queue.push_back(QueuedRequest { robot, since: from });
        let position = queue.len() - 1;
        self.waiting_on.insert(robot, lane);
        log.emit(from, FleetEvent::ReservationQueued { robot, lane, position });
        Ok(ReservationOutcome::Queued { position })
    }

    /// Mark `robot` as having left the source node of its `lane` reservation.
    pub fn depart(&mut self, robot: RobotId, lane: LaneId) -> TrafficResult<()> {
        self.check_lane(lane)?;
        if !self.holds(robot, lane) {
            return Err(TrafficError::NotHeld { robot, lane });
        }
        let from = self.graph.lane_from[lane.index()];
        self.occupants[from.index()].retain(|&r| r != robot);
        Ok(())
    }

    /// Drop `robot`'s reservation on `lane` and promote queued robots.
    ///
    /// After departure the robot stays on the lane's destination (it has
    /// arrived).  Before departure the destination claim is dropped too, so
    /// reserve-then-release leaves the table as it was.
    pub fn release(
        &mut self,
        robot: RobotId,
        lane:  LaneId,
        now:   Tick,
        log:   &mut EventLog,
    ) -> TrafficResult<Vec<Promotion>> {
        self.check_lane(lane)?;
        let held = &mut self.held[lane.index()];
        let Some(idx) = held.iter().position(|r| r.robot == robot) else {
            return Err(TrafficError::NotHeld { robot, lane });
        };
        held.remove(idx);

        let (from, to) = self.graph.lane_endpoints(lane);
        if self.occupants[from.index()].contains(&robot) {
            self.occupants[to.index()].retain(|&r| r != robot);
        }
        log.emit(now, FleetEvent::ReservationReleased { robot, lane });

        let mut promoted = Vec::new();
        self.promote_lane(lane, now, log, &mut promoted);
        if let Some(rev) = self.graph.reverse(lane) {
            self.promote_lane(rev, now, log, &mut promoted);
        }
        Ok(promoted)
    }

    /// Remove `robot`'s queued request, if any, returning the lane.
    pub fn withdraw(&mut self, robot: RobotId) -> Option<LaneId> {
        let lane = self.waiting_on.remove(&robot)?;
        self.queues[lane.index()].retain(|q| q.robot != robot);
        tracing::trace!(robot = robot.0, lane = lane.0, "queued request withdrawn");
        Some(lane)
    }

    /// Erase every trace of `robot`: queued request, reservations, and node
    /// slots.  Returns robots promoted into the freed capacity.
    pub fn remove_robot(&mut self, robot: RobotId, now: Tick, log: &mut EventLog) -> Vec<Promotion> {
        self.withdraw(robot);
        for (i, held) in self.held.iter_mut().enumerate() {
            let before = held.len();
            held.retain(|r| r.robot != robot);
            if held.len() != before {
                log.emit(now, FleetEvent::ReservationReleased { robot, lane: LaneId(i as u32) });
            }
        }
        for occupants in &mut self.occupants {
            occupants.retain(|&r| r != robot);
        }
        self.promote_ready(now, log)
    }

    /// Grant every queue head that now fits, lanes in ascending id order.
    pub fn promote_ready(&mut self, now: Tick, log: &mut EventLog) -> Vec<Promotion> {
        let mut promoted = Vec::new();
        for i in 0..self.queues.len() {
            if !self.queues[i].is_empty() {
                self.promote_lane(LaneId(i as u32), now, log, &mut promoted);
            }
        }
        promoted
    }

    // ── Deadlocks ─────────────────────────────────────────────────────────

    /// Snapshot of who waits on whom.
    ///
    /// A robot queued on lane `L = u → v` waits on
    /// - the holders of `L` when `L` is full,
    /// - the holders of `reverse(L)`,
    /// - the occupants of `v` when `v` is full,
    /// - the robot directly ahead of it in `L`'s queue.
    pub fn wait_for_graph(&self) -> WaitForGraph {
        let mut wfg = WaitForGraph::new();
        for (i, queue) in self.queues.iter().enumerate() {
            if queue.is_empty() {
                continue;
            }
            let lane = LaneId(i as u32);
            let to = self.graph.lane_to[i];
            let held = &self.held[i];
            let lane_full = held.len() >= self.graph.lane_capacity[i] as usize;
            let reverse_held: &[Reservation] = match self.graph.reverse(lane) {
                Some(rev) => &self.held[rev.index()],
                None => &[],
            };
            let occupants = &self.occupants[to.index()];
            let dest_full = occupants.len() >= self.graph.capacity(to) as usize;

            for (pos, q) in queue.iter().enumerate() {
                if lane_full {
                    held.iter().for_each(|r| wfg.add_edge(q.robot, r.robot));
                }
                reverse_held.iter().for_each(|r| wfg.add_edge(q.robot, r.robot));
                if dest_full {
                    occupants.iter().for_each(|&o| wfg.add_edge(q.robot, o));
                }
                if pos > 0 {
                    wfg.add_edge(q.robot, queue[pos - 1].robot);
                }
            }
        }
        wfg
    }

    /// Break every wait cycle.
    ///
    /// For each cycle the least important robot (lowest priority, then
    /// newest id) loses its queued request.  The caller must re-plan each
    /// returned robot around the revoked lane.  Returns once the wait-for
    /// graph is acyclic.
    pub fn resolve_deadlocks(
        &mut self,
        now:      Tick,
        priority: impl Fn(RobotId) -> Priority,
        log:      &mut EventLog,
    ) -> Vec<ReplanRequest> {
        let mut replans = Vec::new();
        while let Some(cycle) = self.wait_for_graph().find_cycle() {
            let victim = cycle
                .iter()
                .copied()
                .filter(|r| self.waiting_on.contains_key(r))
                .min_by_key(|&r| (priority(r), Reverse(r)));
            let Some(victim) = victim else {
                break;
            };
            let Some(lane) = self.withdraw(victim) else {
                break;
            };
            log.emit(now, FleetEvent::DeadlockDetected { cycle: cycle.clone(), victim, lane });
            log.emit(now, FleetEvent::ReservationRevoked { robot: victim, lane });
            replans.push(ReplanRequest { robot: victim, lane, cycle });
        }
        replans
    }

    // ── Queries ───────────────────────────────────────────────────────────

    /// All live reservations, by lane.
    pub fn reservations(&self) -> impl Iterator<Item = &Reservation> + '_ {
        self.held.iter().flatten()
    }

    /// Reservations on `lane`; empty for unknown lanes.
    pub fn reservations_on(&self, lane: LaneId) -> &[Reservation] {
        self.held.get(lane.index()).map_or(&[], Vec::as_slice)
    }

    /// The reservation `robot` holds, if any.
    pub fn reservation_of(&self, robot: RobotId) -> Option<&Reservation> {
        self.reservations().find(|r| r.robot == robot)
    }

    pub fn holds(&self, robot: RobotId, lane: LaneId) -> bool {
        self.reservations_on(lane).iter().any(|r| r.robot == robot)
    }

    /// Robots queued on `lane`, head first.
    pub fn queue(&self, lane: LaneId) -> impl Iterator<Item = RobotId> + '_ {
        self.queues.get(lane.index()).into_iter().flatten().map(|q| q.robot)
    }

    pub fn queue_len(&self, lane: LaneId) -> usize {
        self.queues.get(lane.index()).map_or(0, VecDeque::len)
    }

    /// Tick at which `robot` joined its current queue.
    pub fn waiting_since(&self, robot: RobotId) -> Option<Tick> {
        let lane = self.waiting_on.get(&robot)?;
        self.queues[lane.index()]
            .iter()
            .find(|q| q.robot == robot)
            .map(|q| q.since)
    }

    pub fn waiting_lane(&self, robot: RobotId) -> Option<LaneId> {
        self.waiting_on.get(&robot).copied()
    }

    pub fn is_waiting(&self, robot: RobotId) -> bool {
        self.waiting_on.contains_key(&robot)
    }

    /// Robots standing on `node` or holding a grant into it.
    pub fn occupants(&self, node: NodeId) -> &[RobotId] {
        self.occupants.get(node.index()).map_or(&[], Vec::as_slice)
    }

    /// Robots queued on lanes leaving `node`.
    pub fn waiting_at(&self, node: NodeId) -> usize {
        self.graph.out_lanes(node).map(|l| self.queue_len(l)).sum()
    }

    // ── Internals ─────────────────────────────────────────────────────────

    fn check_lane(&self, lane: LaneId) -> TrafficResult<()> {
        if self.graph.contains_lane(lane) {
            Ok(())
        } else {
            Err(TrafficError::UnknownLane(lane))
        }
    }

    fn queue_position(&self, robot: RobotId, lane: LaneId) -> Option<usize> {
        self.queues[lane.index()].iter().position(|q| q.robot == robot)
    }

    fn can_grant(&self, robot: RobotId, lane: LaneId, window: TickWindow) -> bool {
        let i = lane.index();
        let overlapping = |held: &[Reservation]| {
            held.iter()
                .filter(|r| r.robot != robot && r.window.overlaps(&window))
                .count()
        };
        if overlapping(&self.held[i]) >= self.graph.lane_capacity[i] as usize {
            return false;
        }
        if let Some(rev) = self.graph.reverse(lane) {
            if overlapping(&self.held[rev.index()]) > 0 {
                return false;
            }
        }
        let to = self.graph.lane_to[i];
        let present = self.occupants[to.index()].iter().filter(|&&r| r != robot).count();
        present < self.graph.capacity(to) as usize
    }

    fn grant(
        &mut self,
        robot:  RobotId,
        lane:   LaneId,
        window: TickWindow,
        now:    Tick,
        log:    &mut EventLog,
    ) -> Reservation {
        let reservation = Reservation { lane, robot, window };
        self.held[lane.index()].push(reservation);
        let to = self.graph.lane_to[lane.index()];
        let occupants = &mut self.occupants[to.index()];
        if !occupants.contains(&robot) {
            occupants.push(robot);
        }
        log.emit(now, FleetEvent::ReservationGranted { robot, lane, window });
        reservation
    }

    fn promote_lane(&mut self, lane: LaneId, now: Tick, log: &mut EventLog, out: &mut Vec<Promotion>) {
        let window_len = self.lane_ticks(lane);
        while let Some(&head) = self.queues[lane.index()].front() {
            let window = TickWindow::starting(now, window_len);
            if !self.can_grant(head.robot, lane, window) {
                break;
            }
            self.queues[lane.index()].pop_front();
            self.waiting_on.remove(&head.robot);
            let reservation = self.grant(head.robot, lane, window, now, log);
            out.push(Promotion { robot: head.robot, reservation });
        }
    }
}
