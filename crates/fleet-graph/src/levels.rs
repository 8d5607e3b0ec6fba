//! Loader for level documents.
//!
//! # Format
//!
//! ```json
//! {
//!   "levels": {
//!     "L1": {
//!       "vertices": [[0.0, 0.0, {"name": "m_dock"}], [3.0, 4.0, {"is_charger": true}]],
//!       "lanes":    [[0, 1, {"speed_limit": 0.5}], [1, 0, {"speed_limit": 0.5}]]
//!     }
//!   }
//! }
//! ```
//!
//! Only the first level, in document order, is loaded.  Vertex ids are
//! their array indices.  Lane weight is the straight-line distance between
//! its vertices and the speed limit is kept as lane metadata.  Named vertices are task endpoints
//! (every vertex when none is named); vertices whose name starts with the
//! spawn prefix are spawn points (every vertex when none matches).

use std::io::Read;
use std::path::Path;

use serde_json::{Map, Value};

use fleet_core::{NodeId, Point};

use crate::network::{LaneSpec, NavGraph, NavGraphBuilder, NodeSpec};
use crate::{GraphError, GraphResult};

/// Name prefix marking spawn vertices when the caller has no preference.
pub const DEFAULT_SPAWN_PREFIX: &str = "m";

pub fn load_levels_file(path: &Path, spawn_prefix: &str) -> GraphResult<NavGraph> {
    let file = std::fs::File::open(path)?;
    load_levels_reader(std::io::BufReader::new(file), spawn_prefix)
}

/// Parse a level document from any `Read` source.
pub fn load_levels_reader<R: Read>(reader: R, spawn_prefix: &str) -> GraphResult<NavGraph> {
    let doc: Value = serde_json::from_reader(reader)
        .map_err(|e| GraphError::Malformed(format!("invalid JSON: {e}")))?;

    let levels = doc
        .get("levels")
        .and_then(Value::as_object)
        .ok_or_else(|| GraphError::Malformed("document must contain a 'levels' object".into()))?;
    let (level_name, level) = levels
        .iter()
        .next()
        .ok_or_else(|| GraphError::Malformed("no levels found".into()))?;
    let vertices = level
        .get("vertices")
        .and_then(Value::as_array)
        .ok_or_else(|| GraphError::Malformed(format!("level {level_name:?} must contain 'vertices'")))?;
    let lanes = level
        .get("lanes")
        .and_then(Value::as_array)
        .ok_or_else(|| GraphError::Malformed(format!("level {level_name:?} must contain 'lanes'")))?;

    let mut b = NavGraphBuilder::with_capacity(vertices.len(), lanes.len());

    for (idx, vertex) in vertices.iter().enumerate() {
        let (pos, meta) = parse_vertex(idx, vertex)?;
        let name = meta
            .get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_owned);
        let spawn = name.as_deref().is_some_and(|n| n.starts_with(spawn_prefix));
        b.add_node_with(NodeSpec {
            pos,
            capacity: 1,
            endpoint: name.is_some(),
            spawn,
            charger: meta.get("is_charger").and_then(Value::as_bool).unwrap_or(false),
            name,
        });
    }

    for lane in lanes {
        let (from, to, speed_limit) = parse_lane(lane, vertices.len())?;
        b.add_lane(from, to, LaneSpec {
            weight:      None,
            capacity:    1,
            reverse:     None,
            speed_limit: Some(speed_limit),
        });
    }

    b.build()
}

fn parse_vertex(idx: usize, vertex: &Value) -> GraphResult<(Point, &Map<String, Value>)> {
    let parts = vertex
        .as_array()
        .filter(|a| a.len() >= 3)
        .ok_or_else(|| GraphError::Malformed(format!("vertex {idx} is malformed: expected [x, y, meta]")))?;
    let coord = |v: &Value| {
        v.as_f64()
            .map(|f| f as f32)
            .ok_or_else(|| GraphError::Malformed(format!("vertex {idx} coordinates must be numbers: {vertex}")))
    };
    let x = coord(&parts[0])?;
    let y = coord(&parts[1])?;
    let meta = parts[2]
        .as_object()
        .ok_or_else(|| GraphError::Malformed(format!("vertex {idx} meta must be an object: {vertex}")))?;
    Ok((Point::new(x, y), meta))
}

fn parse_lane(lane: &Value, vertex_count: usize) -> GraphResult<(NodeId, NodeId, f32)> {
    let parts = lane
        .as_array()
        .filter(|a| a.len() == 3)
        .ok_or_else(|| GraphError::Malformed(format!("lane is malformed: expected [from, to, {{\"speed_limit\": v}}], got {lane}")))?;
    let vertex = |v: &Value| -> GraphResult<NodeId> {
        let id = v
            .as_u64()
            .ok_or_else(|| GraphError::Malformed(format!("lane vertex ids must be integers: {lane}")))?;
        if id as usize >= vertex_count {
            return Err(GraphError::Malformed(format!("lane references invalid vertex: {lane}")));
        }
        Ok(NodeId(id as u32))
    };
    let from = vertex(&parts[0])?;
    let to   = vertex(&parts[1])?;
    let speed_limit = parts[2]
        .get("speed_limit")
        .and_then(Value::as_f64)
        .ok_or_else(|| GraphError::Malformed(format!("lane must have a 'speed_limit' in metadata: {lane}")))?;
    Ok((from, to, speed_limit as f32))
}
