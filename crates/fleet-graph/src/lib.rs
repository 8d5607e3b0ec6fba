//! `fleet-graph` — navigation graph, description loaders, and path planning.
//!
//! # Crate layout
//!
//! | Module          | Contents                                                 |
//! |-----------------|----------------------------------------------------------|
//! | [`network`]     | `NavGraph` (CSR + R-tree), `NavGraphBuilder`, specs      |
//! | [`description`] | `GraphDescription` (serde) and the JSON `load_*` entry points |
//! | [`levels`]      | Loader for level documents (`levels/vertices/lanes`)     |
//! | [`planner`]     | `Planner` trait, `AStarPlanner`, `Path`, `BlockedLanes`  |
//! | [`error`]       | `GraphError`, `GraphResult<T>`                           |
//!
//! The graph is immutable once built.  Share it as `Arc<NavGraph>`; any
//! number of readers can query it concurrently without locking.

pub mod description;
pub mod error;
pub mod levels;
pub mod network;
pub mod planner;

#[cfg(test)]
mod tests;

pub use description::{GraphDescription, LaneDescription, NodeDescription, load, load_json_file, load_json_reader, load_json_str};
pub use error::{GraphError, GraphResult};
pub use levels::{DEFAULT_SPAWN_PREFIX, load_levels_file, load_levels_reader};
pub use network::{LaneSpec, NavGraph, NavGraphBuilder, NodeSpec};
pub use planner::{AStarPlanner, BlockedLanes, Path, Planner};
