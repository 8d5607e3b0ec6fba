//! Navigation graph representation and builder.
//!
//! # Data layout
//!
//! The graph uses **Compressed Sparse Row (CSR)** format for outgoing lanes.
//! Given a `NodeId n`, its outgoing lanes are the `LaneId`s
//!
//! ```text
//! node_out_start[n] .. node_out_start[n+1]
//! ```
//!
//! All lane arrays are sorted by source node and indexed by `LaneId`, so
//! iterating a node's neighbours is a contiguous scan.  Reservation state is
//! deliberately absent: the graph is static topology, and the traffic
//! manager keeps its own tables keyed by the same ids.
//!
//! # Spatial index
//!
//! An R-tree (via `rstar`) maps `(x, y)` to the nearest `NodeId`, used by
//! presentation layers to resolve a click or a free coordinate to a waypoint.

use std::collections::{HashMap, VecDeque};

use rstar::{PointDistance, RTree, RTreeObject, AABB};

use fleet_core::{LaneId, NodeId, Point};

use crate::{GraphError, GraphResult};

// ── R-tree node entry ─────────────────────────────────────────────────────────

#[derive(Clone)]
struct NodeEntry {
    point: [f32; 2],
    id:    NodeId,
}

impl RTreeObject for NodeEntry {
    type Envelope = AABB<[f32; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for NodeEntry {
    fn distance_2(&self, point: &[f32; 2]) -> f32 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

// ── Specs ─────────────────────────────────────────────────────────────────────

/// Static attributes of a node, supplied to [`NavGraphBuilder::add_node_with`].
#[derive(Clone, Debug, PartialEq)]
pub struct NodeSpec {
    pub pos:      Point,
    /// Robots that may stand on (or be entering) the node at once.  Default 1.
    pub capacity: u32,
    pub name:     Option<String>,
    pub spawn:    bool,
    pub endpoint: bool,
    pub charger:  bool,
}

impl NodeSpec {
    pub fn at(pos: Point) -> Self {
        Self {
            pos,
            capacity: 1,
            name:     None,
            spawn:    false,
            endpoint: false,
            charger:  false,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = capacity;
        self
    }
}

/// Static attributes of a directed lane.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct LaneSpec {
    /// Traversal cost.  `None` defaults to the straight-line length.
    pub weight:      Option<f32>,
    /// Concurrent occupants.  Default 1.
    pub capacity:    u32,
    /// Builder index (return value of `add_lane`) of the opposite lane.
    /// When `None` the opposite lane, if any, is paired automatically.
    pub reverse:     Option<usize>,
    pub speed_limit: Option<f32>,
}

impl LaneSpec {
    pub fn weighted(weight: f32) -> Self {
        Self { weight: Some(weight), capacity: 1, ..Self::default() }
    }
}

// ── NavGraph ──────────────────────────────────────────────────────────────────

/// Directed navigation graph in CSR format plus a spatial index.
///
/// All per-node and per-lane arrays are `pub` for direct indexed access on
/// hot paths.  Construct through [`NavGraphBuilder`] or the loaders.
pub struct NavGraph {
    // ── Node data (indexed by NodeId) ─────────────────────────────────────
    pub node_pos:      Vec<Point>,
    pub node_capacity: Vec<u32>,
    pub node_name:     Vec<Option<String>>,
    pub node_charger:  Vec<bool>,

    // ── CSR lane adjacency ────────────────────────────────────────────────
    /// Length = `node_count + 1`.
    pub node_out_start: Vec<u32>,

    // ── Lane data (indexed by LaneId) ─────────────────────────────────────
    pub lane_from:        Vec<NodeId>,
    pub lane_to:          Vec<NodeId>,
    pub lane_weight:      Vec<f32>,
    pub lane_capacity:    Vec<u32>,
    /// Opposite-direction lane, `LaneId::INVALID` when absent.
    pub lane_reverse:     Vec<LaneId>,
    pub lane_speed_limit: Vec<Option<f32>>,

    spawn_points:   Vec<NodeId>,
    task_endpoints: Vec<NodeId>,
    is_spawn:       Vec<bool>,
    is_endpoint:    Vec<bool>,
    name_index:     HashMap<String, NodeId>,
    spatial_idx:    RTree<NodeEntry>,
    /// Smallest `weight / length` over all lanes, capped at 1.
    heuristic_scale: f32,
}

impl NavGraph {
    /// A graph with no nodes or lanes.
    pub fn empty() -> Self {
        Self {
            node_pos:         Vec::new(),
            node_capacity:    Vec::new(),
            node_name:        Vec::new(),
            node_charger:     Vec::new(),
            node_out_start:   vec![0],
            lane_from:        Vec::new(),
            lane_to:          Vec::new(),
            lane_weight:      Vec::new(),
            lane_capacity:    Vec::new(),
            lane_reverse:     Vec::new(),
            lane_speed_limit: Vec::new(),
            spawn_points:     Vec::new(),
            task_endpoints:   Vec::new(),
            is_spawn:         Vec::new(),
            is_endpoint:      Vec::new(),
            name_index:       HashMap::new(),
            spatial_idx:      RTree::new(),
            heuristic_scale:  1.0,
        }
    }

    // ── Graph dimensions ──────────────────────────────────────────────────

    pub fn node_count(&self) -> usize {
        self.node_pos.len()
    }

    pub fn lane_count(&self) -> usize {
        self.lane_to.len()
    }

    pub fn is_empty(&self) -> bool {
        self.node_pos.is_empty()
    }

    #[inline]
    pub fn contains_node(&self, node: NodeId) -> bool {
        node.index() < self.node_count()
    }

    #[inline]
    pub fn contains_lane(&self, lane: LaneId) -> bool {
        lane.index() < self.lane_count()
    }

    /// `Ok(())` if `node` exists, [`GraphError::UnknownNode`] otherwise.
    pub fn check_node(&self, node: NodeId) -> GraphResult<()> {
        if self.contains_node(node) {
            Ok(())
        } else {
            Err(GraphError::UnknownNode(node))
        }
    }

    // ── Graph traversal ───────────────────────────────────────────────────

    /// `LaneId`s of all lanes leaving `node` (a contiguous index range).
    #[inline]
    pub fn out_lanes(&self, node: NodeId) -> impl Iterator<Item = LaneId> + '_ {
        let (start, end) = self.out_range(node);
        (start..end).map(|i| LaneId(i as u32))
    }

    /// CSR slice bounds for `node`; empty for unknown nodes.
    #[inline]
    fn out_range(&self, node: NodeId) -> (usize, usize) {
        if !self.contains_node(node) {
            return (0, 0);
        }
        let start = self.node_out_start[node.index()] as usize;
        let end   = self.node_out_start[node.index() + 1] as usize;
        (start, end)
    }

    /// `(lane, destination)` pairs for every lane leaving `node`.
    ///
    /// This is the only query the planner needs.
    #[inline]
    pub fn neighbors(&self, node: NodeId) -> impl Iterator<Item = (LaneId, NodeId)> + '_ {
        self.out_lanes(node).map(|l| (l, self.lane_to[l.index()]))
    }

    #[inline]
    pub fn out_degree(&self, node: NodeId) -> usize {
        let (start, end) = self.out_range(node);
        end - start
    }

    /// The lane running directly from `from` to `to`, if any.
    pub fn lane_between(&self, from: NodeId, to: NodeId) -> Option<LaneId> {
        if !self.contains_node(from) {
            return None;
        }
        self.neighbors(from).find(|&(_, dest)| dest == to).map(|(l, _)| l)
    }

    /// Opposite-direction lane of `lane`, if one exists.
    #[inline]
    pub fn reverse(&self, lane: LaneId) -> Option<LaneId> {
        let r = self.lane_reverse[lane.index()];
        (r != LaneId::INVALID).then_some(r)
    }

    #[inline]
    pub fn lane_endpoints(&self, lane: LaneId) -> (NodeId, NodeId) {
        (self.lane_from[lane.index()], self.lane_to[lane.index()])
    }

    // ── Node attributes ───────────────────────────────────────────────────

    #[inline]
    pub fn position(&self, node: NodeId) -> Point {
        self.node_pos[node.index()]
    }

    #[inline]
    pub fn capacity(&self, node: NodeId) -> u32 {
        self.node_capacity[node.index()]
    }

    /// Straight-line distance between two nodes.
    #[inline]
    pub fn distance(&self, a: NodeId, b: NodeId) -> f32 {
        self.node_pos[a.index()].distance(self.node_pos[b.index()])
    }

    /// Lower bound on the cost of travelling from `a` to `b`.
    ///
    /// Straight-line distance scaled by [`heuristic_scale`](Self::heuristic_scale),
    /// so it never overestimates even when a lane is weighted below its
    /// length.
    #[inline]
    pub fn heuristic(&self, a: NodeId, b: NodeId) -> f32 {
        self.distance(a, b) * self.heuristic_scale
    }

    /// Smallest ratio of lane weight to lane length, capped at 1.
    pub fn heuristic_scale(&self) -> f32 {
        self.heuristic_scale
    }

    pub fn name(&self, node: NodeId) -> Option<&str> {
        self.node_name.get(node.index()).and_then(|n| n.as_deref())
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.name_index.get(name).copied()
    }

    /// Nodes where robots may be created.  Every node when none is flagged.
    pub fn spawn_points(&self) -> &[NodeId] {
        &self.spawn_points
    }

    pub fn is_spawn_point(&self, node: NodeId) -> bool {
        self.is_spawn.get(node.index()).copied().unwrap_or(false)
    }

    /// Nodes usable as task pickup/dropoff.  Every node when none is flagged.
    pub fn task_endpoints(&self) -> &[NodeId] {
        &self.task_endpoints
    }

    pub fn is_task_endpoint(&self, node: NodeId) -> bool {
        self.is_endpoint.get(node.index()).copied().unwrap_or(false)
    }

    pub fn chargers(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.node_charger
            .iter()
            .enumerate()
            .filter(|(_, c)| **c)
            .map(|(i, _)| NodeId(i as u32))
    }

    /// Closest charger to `from` by straight-line distance (ties: lower id).
    pub fn nearest_charger(&self, from: NodeId) -> Option<NodeId> {
        if !self.contains_node(from) {
            return None;
        }
        self.chargers()
            .min_by(|&a, &b| {
                self.distance(from, a)
                    .total_cmp(&self.distance(from, b))
                    .then(a.cmp(&b))
            })
    }

    // ── Spatial queries ───────────────────────────────────────────────────

    /// The node nearest to `pos`.  `None` only for an empty graph.
    pub fn nearest_node(&self, pos: Point) -> Option<NodeId> {
        self.spatial_idx
            .nearest_neighbor(&[pos.x, pos.y])
            .map(|e| e.id)
    }

    /// Up to `k` nodes nearest to `pos`, sorted by ascending distance.
    pub fn k_nearest_nodes(&self, pos: Point, k: usize) -> Vec<NodeId> {
        self.spatial_idx
            .nearest_neighbor_iter(&[pos.x, pos.y])
            .take(k)
            .map(|e| e.id)
            .collect()
    }
}

// ── NavGraphBuilder ───────────────────────────────────────────────────────────

/// Construct a [`NavGraph`] incrementally, then call [`build`](Self::build).
///
/// Nodes and lanes may be added in any order.  `build()` validates the
/// whole description, sorts lanes by source node, pairs reverse lanes, and
/// bulk-loads the R-tree.  It never returns a partial graph.
///
/// # Example
///
/// ```
/// use fleet_core::Point;
/// use fleet_graph::NavGraphBuilder;
///
/// let mut b = NavGraphBuilder::new();
/// let a = b.add_node(Point::new(0.0, 0.0));
/// let c = b.add_node(Point::new(1.0, 0.0));
/// b.add_lane_pair(a, c, 1.0);
/// let graph = b.build().unwrap();
/// assert_eq!(graph.lane_count(), 2);
/// ```
#[derive(Default)]
pub struct NavGraphBuilder {
    nodes: Vec<NodeSpec>,
    lanes: Vec<RawLane>,
}

struct RawLane {
    from: NodeId,
    to:   NodeId,
    spec: LaneSpec,
}

impl NavGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(nodes: usize, lanes: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(nodes),
            lanes: Vec::with_capacity(lanes),
        }
    }

    /// Add a capacity-1 node and return its `NodeId` (sequential from 0).
    pub fn add_node(&mut self, pos: Point) -> NodeId {
        self.add_node_with(NodeSpec::at(pos))
    }

    pub fn add_node_with(&mut self, spec: NodeSpec) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(spec);
        id
    }

    /// Mutable access to a node added earlier (loaders set flags after
    /// the fact).
    pub fn node_mut(&mut self, node: NodeId) -> Option<&mut NodeSpec> {
        self.nodes.get_mut(node.index())
    }

    /// Add a **directed** lane and return its builder index.
    ///
    /// Builder indices are not `LaneId`s; they exist only to express
    /// explicit reverse references through [`LaneSpec::reverse`].
    pub fn add_lane(&mut self, from: NodeId, to: NodeId, spec: LaneSpec) -> usize {
        self.lanes.push(RawLane { from, to, spec });
        self.lanes.len() - 1
    }

    /// Directed capacity-1 lane of the given weight.
    pub fn add_directed_lane(&mut self, from: NodeId, to: NodeId, weight: f32) -> usize {
        self.add_lane(from, to, LaneSpec::weighted(weight))
    }

    /// Lanes in **both directions** between `a` and `b`.
    pub fn add_lane_pair(&mut self, a: NodeId, b: NodeId, weight: f32) {
        self.add_directed_lane(a, b, weight);
        self.add_directed_lane(b, a, weight);
    }

    pub fn node_pos(&self, id: NodeId) -> Option<Point> {
        self.nodes.get(id.index()).map(|n| n.pos)
    }

    pub fn node_count(&self) -> usize { self.nodes.len() }
    pub fn lane_count(&self) -> usize { self.lanes.len() }

    /// Validate and consume the builder.
    ///
    /// Fails with [`GraphError::Malformed`] when a lane references an unknown
    /// node, loops on itself, duplicates another lane, has a non-positive
    /// weight or zero capacity, names a reverse lane that does not run the
    /// opposite way, or when the task endpoints are not mutually reachable.
    pub fn build(self) -> GraphResult<NavGraph> {
        let node_count = self.nodes.len();
        let lane_count = self.lanes.len();

        // ── Per-lane validation ───────────────────────────────────────────
        let mut weights = Vec::with_capacity(lane_count);
        let mut seen: HashMap<(NodeId, NodeId), usize> = HashMap::with_capacity(lane_count);
        for (i, lane) in self.lanes.iter().enumerate() {
            if lane.from.index() >= node_count || lane.to.index() >= node_count {
                return Err(GraphError::malformed(format!(
                    "lane {i} references unknown node ({} -> {})",
                    lane.from, lane.to
                )));
            }
            if lane.from == lane.to {
                return Err(GraphError::malformed(format!("lane {i} loops on {}", lane.from)));
            }
            if let Some(prev) = seen.insert((lane.from, lane.to), i) {
                return Err(GraphError::malformed(format!(
                    "lanes {prev} and {i} both run {} -> {}",
                    lane.from, lane.to
                )));
            }
            let weight = lane.spec.weight.unwrap_or_else(|| {
                self.nodes[lane.from.index()].pos.distance(self.nodes[lane.to.index()].pos)
            });
            if !(weight.is_finite() && weight > 0.0) {
                return Err(GraphError::malformed(format!(
                    "lane {i} ({} -> {}) has non-positive weight {weight}",
                    lane.from, lane.to
                )));
            }
            if lane.spec.capacity == 0 {
                return Err(GraphError::malformed(format!("lane {i} has zero capacity")));
            }
            if let Some(r) = lane.spec.reverse {
                let Some(rev) = self.lanes.get(r) else {
                    return Err(GraphError::malformed(format!(
                        "lane {i} names unknown reverse lane {r}"
                    )));
                };
                if rev.from != lane.to || rev.to != lane.from {
                    return Err(GraphError::malformed(format!(
                        "lane {i} names lane {r} as reverse but it does not run {} -> {}",
                        lane.to, lane.from
                    )));
                }
            }
            weights.push(weight);
        }

        // ── CSR ordering ──────────────────────────────────────────────────
        // Stable sort keeps insertion order among a node's lanes.
        let mut order: Vec<usize> = (0..lane_count).collect();
        order.sort_by_key(|&i| self.lanes[i].from.0);
        let mut new_id = vec![LaneId::INVALID; lane_count];
        for (pos, &old) in order.iter().enumerate() {
            new_id[old] = LaneId(pos as u32);
        }

        let lane_from:     Vec<NodeId> = order.iter().map(|&i| self.lanes[i].from).collect();
        let lane_to:       Vec<NodeId> = order.iter().map(|&i| self.lanes[i].to).collect();
        let lane_weight:   Vec<f32>    = order.iter().map(|&i| weights[i]).collect();
        let lane_capacity: Vec<u32>    = order.iter().map(|&i| self.lanes[i].spec.capacity).collect();
        let lane_speed_limit: Vec<Option<f32>> =
            order.iter().map(|&i| self.lanes[i].spec.speed_limit).collect();

        let lane_reverse: Vec<LaneId> = order
            .iter()
            .map(|&i| {
                let lane = &self.lanes[i];
                match lane.spec.reverse {
                    Some(r) => new_id[r],
                    None => seen
                        .get(&(lane.to, lane.from))
                        .map(|&r| new_id[r])
                        .unwrap_or(LaneId::INVALID),
                }
            })
            .collect();

        let mut node_out_start = vec![0u32; node_count + 1];
        for lane in &self.lanes {
            node_out_start[lane.from.index() + 1] += 1;
        }
        for i in 1..=node_count {
            node_out_start[i] += node_out_start[i - 1];
        }
        debug_assert_eq!(node_out_start[node_count] as usize, lane_count);

        // ── Node roles ────────────────────────────────────────────────────
        let flagged = |f: fn(&NodeSpec) -> bool| -> Vec<bool> {
            let flags: Vec<bool> = self.nodes.iter().map(f).collect();
            if flags.iter().any(|&b| b) { flags } else { vec![true; node_count] }
        };
        let is_spawn    = flagged(|n| n.spawn);
        let is_endpoint = flagged(|n| n.endpoint);
        let collect_ids = |flags: &[bool]| -> Vec<NodeId> {
            flags
                .iter()
                .enumerate()
                .filter(|(_, f)| **f)
                .map(|(i, _)| NodeId(i as u32))
                .collect()
        };
        let spawn_points   = collect_ids(&is_spawn);
        let task_endpoints = collect_ids(&is_endpoint);

        let mut name_index = HashMap::new();
        for (i, n) in self.nodes.iter().enumerate() {
            if let Some(name) = &n.name {
                name_index.entry(name.clone()).or_insert(NodeId(i as u32));
            }
        }

        let entries: Vec<NodeEntry> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| NodeEntry { point: [n.pos.x, n.pos.y], id: NodeId(i as u32) })
            .collect();
        let spatial_idx = RTree::bulk_load(entries);

        // Lanes weighted below their straight-line length shrink the
        // heuristic so it stays a lower bound.
        let heuristic_scale = self
            .lanes
            .iter()
            .zip(&weights)
            .filter_map(|(lane, &w)| {
                let length = self.nodes[lane.from.index()].pos.distance(self.nodes[lane.to.index()].pos);
                (length > 0.0).then_some(w / length)
            })
            .fold(1.0_f32, f32::min);

        let mut node_pos      = Vec::with_capacity(node_count);
        let mut node_capacity = Vec::with_capacity(node_count);
        let mut node_name     = Vec::with_capacity(node_count);
        let mut node_charger  = Vec::with_capacity(node_count);
        for n in self.nodes {
            node_pos.push(n.pos);
            node_capacity.push(n.capacity);
            node_name.push(n.name);
            node_charger.push(n.charger);
        }

        let graph = NavGraph {
            node_pos,
            node_capacity,
            node_name,
            node_charger,
            node_out_start,
            lane_from,
            lane_to,
            lane_weight,
            lane_capacity,
            lane_reverse,
            lane_speed_limit,
            spawn_points,
            task_endpoints,
            is_spawn,
            is_endpoint,
            name_index,
            spatial_idx,
            heuristic_scale,
        };
        check_endpoint_connectivity(&graph)?;
        Ok(graph)
    }
}

// ── Connectivity ──────────────────────────────────────────────────────────────

/// Every task endpoint must be reachable from, and able to reach, the first
/// endpoint (and therefore every other endpoint).
fn check_endpoint_connectivity(graph: &NavGraph) -> GraphResult<()> {
    let Some(&root) = graph.task_endpoints.first() else {
        return Ok(());
    };

    let n = graph.node_count();
    let mut incoming: Vec<Vec<NodeId>> = vec![Vec::new(); n];
    for (from, to) in graph.lane_from.iter().zip(&graph.lane_to) {
        incoming[to.index()].push(*from);
    }

    let forward  = reachable(n, root, |v| graph.neighbors(v).map(|(_, d)| d).collect());
    let backward = reachable(n, root, |v| incoming[v.index()].clone());

    for &ep in &graph.task_endpoints {
        if !forward[ep.index()] || !backward[ep.index()] {
            let label = graph.name(ep).map(str::to_owned).unwrap_or_else(|| ep.to_string());
            return Err(GraphError::malformed(format!(
                "task endpoint {label} is not mutually reachable with the rest of the graph"
            )));
        }
    }
    Ok(())
}

fn reachable(n: usize, root: NodeId, next: impl Fn(NodeId) -> Vec<NodeId>) -> Vec<bool> {
    let mut seen = vec![false; n];
    let mut queue = VecDeque::from([root]);
    seen[root.index()] = true;
    while let Some(v) = queue.pop_front() {
        for w in next(v) {
            if !seen[w.index()] {
                seen[w.index()] = true;
                queue.push_back(w);
            }
        }
    }
    seen
}
