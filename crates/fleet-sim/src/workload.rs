//! Seeded random workloads for headless runs and scenario tests.

use fleet_core::{NodeId, Priority, RobotId, SimRng, TaskId};
use fleet_graph::Planner;

use crate::{FleetSim, SimResult};

/// Draws robot placements and (pickup, dropoff) pairs from a seeded RNG.
///
/// The same seed against the same graph yields the same workload.
pub struct WorkloadGenerator {
    rng: SimRng,
}

impl WorkloadGenerator {
    pub fn new(seed: u64) -> Self {
        Self { rng: SimRng::new(seed) }
    }

    /// Two distinct task endpoints of `sim`'s graph, or `None` if the graph
    /// has fewer than two.
    pub fn task_pair<P: Planner>(&mut self, sim: &FleetSim<P>) -> Option<(NodeId, NodeId)> {
        let endpoints = sim.graph().task_endpoints();
        if endpoints.len() < 2 {
            return None;
        }
        let pickup = self.rng.gen_range(0..endpoints.len());
        // Skip over the pickup so the draw stays uniform.
        let mut dropoff = self.rng.gen_range(0..endpoints.len() - 1);
        if dropoff >= pickup {
            dropoff += 1;
        }
        Some((endpoints[pickup], endpoints[dropoff]))
    }

    /// Submit up to `n` random tasks.
    pub fn submit_tasks<P: Planner>(&mut self, sim: &mut FleetSim<P>, n: usize) -> SimResult<Vec<TaskId>> {
        let mut ids = Vec::with_capacity(n);
        for _ in 0..n {
            let Some((pickup, dropoff)) = self.task_pair(sim) else {
                break;
            };
            ids.push(sim.submit_task(pickup, dropoff)?);
        }
        Ok(ids)
    }

    /// Create up to `n` robots on randomly chosen spawn points with free
    /// capacity.  Stops early when the spawn points are full or the fleet
    /// limit is reached.
    pub fn spawn_robots<P: Planner>(&mut self, sim: &mut FleetSim<P>, n: usize) -> SimResult<Vec<RobotId>> {
        let mut ids = Vec::with_capacity(n);
        for _ in 0..n {
            if sim.config().max_robots.is_some_and(|max| sim.robots().len() >= max) {
                break;
            }
            let free: Vec<NodeId> = sim
                .graph()
                .spawn_points()
                .iter()
                .copied()
                .filter(|&node| sim.traffic().occupants(node).len() < sim.graph().capacity(node) as usize)
                .collect();
            let Some(&node) = self.rng.choose(&free) else {
                break;
            };
            ids.push(sim.create_robot(node, Priority::default())?);
        }
        Ok(ids)
    }
}
