//! The set of live robots.

use std::collections::BTreeMap;

use fleet_core::{NodeId, Priority, RobotId, Tick};

use crate::{Robot, RobotError, RobotResult};

/// Live robots, iterated in ascending `RobotId` order.
///
/// Ids are handed out sequentially and never reused within a run, so a
/// removed robot's id can never alias a newer robot.
#[derive(Debug, Default)]
pub struct RobotRegistry {
    robots:  BTreeMap<RobotId, Robot>,
    next_id: u32,
}

impl RobotRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an `Idle` robot on `node` and return its id.
    pub fn create(&mut self, node: NodeId, priority: Priority, now: Tick) -> RobotId {
        let id = RobotId(self.next_id);
        self.next_id += 1;
        self.robots.insert(id, Robot::new(id, node, priority, now));
        id
    }

    /// Id the next `create` will return.
    pub fn peek_next_id(&self) -> RobotId {
        RobotId(self.next_id)
    }

    pub fn remove(&mut self, id: RobotId) -> RobotResult<Robot> {
        self.robots.remove(&id).ok_or(RobotError::UnknownRobot(id))
    }

    pub fn get(&self, id: RobotId) -> Option<&Robot> {
        self.robots.get(&id)
    }

    pub fn get_mut(&mut self, id: RobotId) -> Option<&mut Robot> {
        self.robots.get_mut(&id)
    }

    pub fn try_get_mut(&mut self, id: RobotId) -> RobotResult<&mut Robot> {
        self.robots.get_mut(&id).ok_or(RobotError::UnknownRobot(id))
    }

    pub fn contains(&self, id: RobotId) -> bool {
        self.robots.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Robot> + '_ {
        self.robots.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Robot> + '_ {
        self.robots.values_mut()
    }

    pub fn ids(&self) -> Vec<RobotId> {
        self.robots.keys().copied().collect()
    }

    /// Priority of `id`; unknown robots rank lowest.
    pub fn priority_of(&self, id: RobotId) -> Priority {
        self.robots.get(&id).map(|r| r.priority).unwrap_or_default()
    }

    /// Ids ordered most important first (priority descending, then oldest).
    pub fn by_priority(&self) -> Vec<RobotId> {
        let mut ids = self.ids();
        ids.sort_by_key(|&id| (std::cmp::Reverse(self.priority_of(id)), id));
        ids
    }

    pub fn len(&self) -> usize {
        self.robots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.robots.is_empty()
    }

    /// Remove all robots and restart id assignment.
    pub fn clear(&mut self) {
        self.robots.clear();
        self.next_id = 0;
    }
}
