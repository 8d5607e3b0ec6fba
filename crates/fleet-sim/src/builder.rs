//! Fluent builder for [`FleetSim`].

use std::sync::Arc;

use fleet_core::FleetConfig;
use fleet_graph::{AStarPlanner, NavGraph, Planner};

use crate::{FleetSim, SimResult};

/// Fluent builder for [`FleetSim`].
///
/// # Required inputs
///
/// | Method  | What it provides                              |
/// |---------|-----------------------------------------------|
/// | `new`   | The navigation graph (owned or `Arc`-shared)  |
///
/// # Optional inputs
///
/// | Method      | Default                     |
/// |-------------|-----------------------------|
/// | `.config()` | `FleetConfig::default()`    |
/// | `.planner()`| `AStarPlanner`              |
///
/// # Example
///
/// ```rust,ignore
/// let mut sim = FleetSimBuilder::new(graph)
///     .config(FleetConfig { max_robots: Some(5), ..Default::default() })
///     .build()?;
/// let robot = sim.create_robot(NodeId(0), Priority(0))?;
/// ```
pub struct FleetSimBuilder<P: Planner = AStarPlanner> {
    graph:   Arc<NavGraph>,
    planner: P,
    config:  FleetConfig,
}

impl FleetSimBuilder<AStarPlanner> {
    pub fn new(graph: impl Into<Arc<NavGraph>>) -> Self {
        Self {
            graph:   graph.into(),
            planner: AStarPlanner,
            config:  FleetConfig::default(),
        }
    }
}

impl<P: Planner> FleetSimBuilder<P> {
    pub fn config(mut self, config: FleetConfig) -> Self {
        self.config = config;
        self
    }

    /// Swap in a different route planner.
    pub fn planner<Q: Planner>(self, planner: Q) -> FleetSimBuilder<Q> {
        FleetSimBuilder {
            graph: self.graph,
            planner,
            config: self.config,
        }
    }

    /// Validate the configuration and assemble an empty coordination
    /// context at tick zero.
    pub fn build(self) -> SimResult<FleetSim<P>> {
        self.config.validate()?;
        Ok(FleetSim::new(self.graph, self.planner, self.config))
    }
}
