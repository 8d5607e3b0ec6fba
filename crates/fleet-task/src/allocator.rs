//! The task allocator.

use std::collections::BTreeMap;

use fleet_core::{EventLog, FailureReason, FleetEvent, NodeId, RobotId, TaskId, Tick};
use fleet_graph::{NavGraph, Planner};
use fleet_robot::{Robot, RobotState};

use crate::{Task, TaskError, TaskResult, TaskStatus};

/// Pending pool plus every task ever submitted.
///
/// Assignment picks, for an idle robot, the pending task whose pickup is
/// cheapest to reach by planner estimate; ties go to the earliest
/// submission.  Status changes happen only here.
#[derive(Debug)]
pub struct TaskAllocator {
    tasks:        BTreeMap<TaskId, Task>,
    /// `seq → task`, iterated in submission order.
    pending:      BTreeMap<u64, TaskId>,
    next_id:      u32,
    next_seq:     u64,
    max_attempts: u32,
}

impl TaskAllocator {
    /// `max_attempts` failures mark a task permanently `Failed`.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            tasks:        BTreeMap::new(),
            pending:      BTreeMap::new(),
            next_id:      0,
            next_seq:     0,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Forget every task and restart ids.
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.pending.clear();
        self.next_id = 0;
        self.next_seq = 0;
    }

    // ── Submission ────────────────────────────────────────────────────────

    /// Queue a new task.  A rejected submission creates nothing.
    pub fn submit(
        &mut self,
        pickup:  NodeId,
        dropoff: NodeId,
        graph:   &NavGraph,
        now:     Tick,
        log:     &mut EventLog,
    ) -> TaskResult<TaskId> {
        for node in [pickup, dropoff] {
            if !graph.contains_node(node) {
                return Err(TaskError::UnknownNode(node));
            }
            if !graph.is_task_endpoint(node) {
                return Err(TaskError::NotTaskEndpoint(node));
            }
        }

        let id = TaskId(self.next_id);
        self.next_id += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.tasks.insert(id, Task {
            id,
            pickup,
            dropoff,
            status: TaskStatus::Pending,
            robot: None,
            seq,
            attempts: 0,
            failure: None,
            submitted: now,
        });
        self.pending.insert(seq, id);
        log.emit(now, FleetEvent::TaskSubmitted { task: id, pickup, dropoff });
        Ok(id)
    }

    /// Withdraw a task.  Returns the robot that was holding it, which the
    /// caller must stand down.
    pub fn cancel(&mut self, id: TaskId, now: Tick, log: &mut EventLog) -> TaskResult<Option<RobotId>> {
        let task = self.tasks.get_mut(&id).ok_or(TaskError::UnknownTask(id))?;
        if task.status.is_finished() {
            return Err(TaskError::Finished(id));
        }
        if task.status == TaskStatus::Pending {
            self.pending.remove(&task.seq);
        }
        let holder = task.robot.take();
        task.status = TaskStatus::Failed;
        task.failure = Some(FailureReason::Cancelled);
        log.emit(now, FleetEvent::TaskFailed { task: id, reason: FailureReason::Cancelled });
        Ok(holder)
    }

    // ── Assignment ────────────────────────────────────────────────────────

    /// Give `robot` the best pending task, if it is idle and one is
    /// reachable.  On success the task is `Assigned` and the robot is
    /// `Planning` towards the pickup.
    pub fn on_robot_idle<P: Planner + ?Sized>(
        &mut self,
        robot:   &mut Robot,
        graph:   &NavGraph,
        planner: &P,
        now:     Tick,
        log:     &mut EventLog,
    ) -> Option<TaskId> {
        if robot.state != RobotState::Idle || robot.task.is_some() {
            return None;
        }

        let mut best: Option<(f32, u64, TaskId)> = None;
        for (&seq, &id) in &self.pending {
            let Some(task) = self.tasks.get(&id) else {
                continue;
            };
            let cost = match planner.estimate(graph, robot.node, task.pickup) {
                Ok(c) => c,
                Err(e) => {
                    tracing::trace!(task = id.0, robot = robot.id.0, error = %e, "pickup unreachable");
                    continue;
                }
            };
            // Strict `<` keeps the earliest submission on ties.
            if best.is_none_or(|(c, _, _)| cost < c) {
                best = Some((cost, seq, id));
            }
        }

        let (_, seq, id) = best?;
        self.pending.remove(&seq);
        let task = self.tasks.get_mut(&id)?;
        task.status = TaskStatus::Assigned;
        task.robot = Some(robot.id);

        robot.task = Some(id);
        robot.goal = Some(task.pickup);
        robot.route.clear();
        robot.state = RobotState::Planning;
        log.emit(now, FleetEvent::TaskAssigned { task: id, robot: robot.id });
        Some(id)
    }

    // ── Progress ──────────────────────────────────────────────────────────

    /// `robot` stands on its task's pickup: the task is `InProgress` and
    /// the robot plans towards the dropoff.
    pub fn on_task_pickup_reached(&mut self, robot: &mut Robot, now: Tick, log: &mut EventLog) -> TaskResult<TaskId> {
        let task = self.held_mut(robot)?;
        if task.status != TaskStatus::Assigned {
            return Err(TaskError::NoTask(robot.id));
        }
        task.status = TaskStatus::InProgress;
        let id = task.id;
        robot.goal = Some(task.dropoff);
        robot.route.clear();
        robot.state = RobotState::Planning;
        log.emit(now, FleetEvent::TaskPickedUp { task: id, robot: robot.id });
        Ok(id)
    }

    /// `robot` stands on its task's dropoff: the task is `Completed` and
    /// the robot is free.
    pub fn on_task_dropoff_reached(&mut self, robot: &mut Robot, now: Tick, log: &mut EventLog) -> TaskResult<TaskId> {
        let task = self.held_mut(robot)?;
        if task.status != TaskStatus::InProgress {
            return Err(TaskError::NoTask(robot.id));
        }
        task.status = TaskStatus::Completed;
        task.robot = None;
        let id = task.id;
        robot.task = None;
        robot.goal = None;
        robot.route.clear();
        robot.state = RobotState::Idle;
        log.emit(now, FleetEvent::TaskCompleted { task: id, robot: robot.id });
        Ok(id)
    }

    /// Apply whichever of pickup/dropoff `robot` has reached.  Returns the
    /// new status, or `None` when the robot is not on its goal.
    pub fn on_goal_reached(&mut self, robot: &mut Robot, now: Tick, log: &mut EventLog) -> TaskResult<Option<TaskStatus>> {
        let Some(id) = robot.task else {
            return Ok(None);
        };
        let task = self.tasks.get(&id).ok_or(TaskError::UnknownTask(id))?;
        if task.goal() != Some(robot.node) {
            return Ok(None);
        }
        let status = task.status;
        match status {
            TaskStatus::Assigned => self.on_task_pickup_reached(robot, now, log)?,
            _ => self.on_task_dropoff_reached(robot, now, log)?,
        };
        Ok(self.tasks.get(&id).map(|t| t.status))
    }

    // ── Failure & reallocation ────────────────────────────────────────────

    /// `robot` could not carry its task further.  The task goes back to the
    /// pool in its original place, or fails for good once it has used up its
    /// attempts.  The robot is detached; its state is left to the caller.
    pub fn on_task_failed(
        &mut self,
        robot:  &mut Robot,
        reason: FailureReason,
        now:    Tick,
        log:    &mut EventLog,
    ) -> TaskResult<TaskId> {
        let max_attempts = self.max_attempts;
        let task = self.held_mut(robot)?;
        let id = task.id;
        task.robot = None;
        task.attempts += 1;
        let attempts = task.attempts;
        let seq = task.seq;
        if attempts >= max_attempts {
            task.status = TaskStatus::Failed;
            task.failure = Some(FailureReason::AttemptsExhausted);
            log.emit(now, FleetEvent::TaskFailed { task: id, reason: FailureReason::AttemptsExhausted });
        } else {
            task.status = TaskStatus::Pending;
            task.failure = Some(reason);
            self.pending.insert(seq, id);
            log.emit(now, FleetEvent::TaskRequeued { task: id, reason, attempts });
        }
        robot.task = None;
        robot.goal = None;
        robot.route.clear();
        Ok(id)
    }

    /// The robot holding `task` is gone.  The task returns to `Pending` with
    /// its submission order intact; this does not count as an attempt.
    pub fn on_robot_removed(&mut self, task: Option<TaskId>, now: Tick, log: &mut EventLog) -> Option<TaskId> {
        let id = task?;
        let task = self.tasks.get_mut(&id)?;
        if !task.status.is_active() {
            return None;
        }
        task.status = TaskStatus::Pending;
        task.robot = None;
        task.failure = Some(FailureReason::RobotRemoved);
        self.pending.insert(task.seq, id);
        log.emit(now, FleetEvent::TaskRequeued {
            task:     id,
            reason:   FailureReason::RobotRemoved,
            attempts: task.attempts,
        });
        Some(id)
    }

    // ── Queries ───────────────────────────────────────────────────────────

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    /// All tasks, ascending id.
    pub fn iter(&self) -> impl Iterator<Item = &Task> + '_ {
        self.tasks.values()
    }

    /// Pending task ids in submission order.
    pub fn pending(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.pending.values().copied()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn count(&self, status: TaskStatus) -> usize {
        self.tasks.values().filter(|t| t.status == status).count()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn held_mut(&mut self, robot: &Robot) -> TaskResult<&mut Task> {
        let id = robot.task.ok_or(TaskError::NoTask(robot.id))?;
        let task = self.tasks.get_mut(&id).ok_or(TaskError::UnknownTask(id))?;
        if task.robot != Some(robot.id) {
            return Err(TaskError::NoTask(robot.id));
        }
        Ok(task)
    }
}
