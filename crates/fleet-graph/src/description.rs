//! Structured graph descriptions and the JSON loader.
//!
//! # JSON format
//!
//! ```json
//! {
//!   "nodes": [
//!     { "id": "dock",  "x": 0.0, "y": 0.0, "spawn": true },
//!     { "id": "shelf", "x": 4.0, "y": 0.0, "endpoint": true, "capacity": 2 }
//!   ],
//!   "lanes": [
//!     { "from": "dock",  "to": "shelf", "weight": 4.0 },
//!     { "from": "shelf", "to": "dock" }
//!   ]
//! }
//! ```
//!
//! Node ids are free-form strings and become node names.  Optional fields:
//!
//! | Field            | Default                                  |
//! |------------------|------------------------------------------|
//! | node `capacity`  | 1                                        |
//! | node flags       | `false` (no flags set = every node)      |
//! | lane `weight`    | straight-line length                     |
//! | lane `capacity`  | 1                                        |
//! | lane `reverse`   | opposite lane paired automatically       |
//!
//! `reverse` is an index into the `lanes` array.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use fleet_core::{NodeId, Point};

use crate::network::{LaneSpec, NavGraph, NavGraphBuilder, NodeSpec};
use crate::{GraphError, GraphResult};

fn one() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeDescription {
    pub id: String,
    pub x:  f32,
    pub y:  f32,
    #[serde(default = "one")]
    pub capacity: u32,
    #[serde(default)]
    pub spawn: bool,
    #[serde(default)]
    pub endpoint: bool,
    #[serde(default)]
    pub charger: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LaneDescription {
    pub from: String,
    pub to:   String,
    #[serde(default)]
    pub weight: Option<f32>,
    #[serde(default = "one")]
    pub capacity: u32,
    #[serde(default)]
    pub reverse: Option<usize>,
    #[serde(default)]
    pub speed_limit: Option<f32>,
}

/// A complete navigation-graph description.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphDescription {
    pub nodes: Vec<NodeDescription>,
    #[serde(default)]
    pub lanes: Vec<LaneDescription>,
}

/// Build a [`NavGraph`] from a parsed description.
///
/// Fails with [`GraphError::Malformed`] on duplicate node ids, lanes naming
/// unknown nodes, and everything [`NavGraphBuilder::build`] rejects.
pub fn load(description: &GraphDescription) -> GraphResult<NavGraph> {
    let mut b = NavGraphBuilder::with_capacity(description.nodes.len(), description.lanes.len());
    let mut ids: HashMap<&str, NodeId> = HashMap::with_capacity(description.nodes.len());

    for node in &description.nodes {
        if !(node.x.is_finite() && node.y.is_finite()) {
            return Err(GraphError::Malformed(format!("node {:?} has non-finite coordinates", node.id)));
        }
        let id = b.add_node_with(NodeSpec {
            pos:      Point::new(node.x, node.y),
            capacity: node.capacity,
            name:     Some(node.id.clone()),
            spawn:    node.spawn,
            endpoint: node.endpoint,
            charger:  node.charger,
        });
        if ids.insert(node.id.as_str(), id).is_some() {
            return Err(GraphError::Malformed(format!("duplicate node id {:?}", node.id)));
        }
    }

    for (i, lane) in description.lanes.iter().enumerate() {
        let resolve = |name: &str| {
            ids.get(name).copied().ok_or_else(|| {
                GraphError::Malformed(format!("lane {i} references unknown node {name:?}"))
            })
        };
        let from = resolve(&lane.from)?;
        let to   = resolve(&lane.to)?;
        b.add_lane(from, to, LaneSpec {
            weight:      lane.weight,
            capacity:    lane.capacity,
            reverse:     lane.reverse,
            speed_limit: lane.speed_limit,
        });
    }

    b.build()
}

/// Parse and load a JSON description held in memory.
pub fn load_json_str(json: &str) -> GraphResult<NavGraph> {
    let description: GraphDescription = serde_json::from_str(json)
        .map_err(|e| GraphError::Malformed(format!("invalid graph description: {e}")))?;
    load(&description)
}

/// Like [`load_json_str`] but accepts any `Read` source.
pub fn load_json_reader<R: Read>(reader: R) -> GraphResult<NavGraph> {
    let description: GraphDescription = serde_json::from_reader(reader)
        .map_err(|e| GraphError::Malformed(format!("invalid graph description: {e}")))?;
    load(&description)
}

pub fn load_json_file(path: &Path) -> GraphResult<NavGraph> {
    let file = std::fs::File::open(path)?;
    load_json_reader(std::io::BufReader::new(file))
}
