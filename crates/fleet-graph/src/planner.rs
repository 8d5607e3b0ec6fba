//! Path planning over the navigation graph.
//!
//! # Pluggability
//!
//! The traffic and task layers call routing through the [`Planner`] trait,
//! so applications can swap in a different search without touching them.
//! The default [`AStarPlanner`] is an informed best-first search ordered by
//! `f = g + h`, where `g` is accumulated lane weight and `h` the
//! straight-line distance to the goal (scaled by [`NavGraph::heuristic_scale`]).
//!
//! # Determinism
//!
//! Equal-`f` candidates are expanded lowest-`g` first, then lowest `NodeId`,
//! so the same query on the same graph always yields the same path.
//!
//! # Detours
//!
//! [`BlockedLanes`] is a transient per-query set of lanes to exclude or
//! penalize.  It lets callers route around congestion without mutating the
//! shared graph.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

use fleet_core::{LaneId, NodeId};

use crate::network::NavGraph;
use crate::{GraphError, GraphResult};

// ── Path ──────────────────────────────────────────────────────────────────────

/// The result of a planning query.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    /// Nodes in travel order, starting at the query's start node and ending
    /// at its goal.  A trivial path holds only the start node.
    pub nodes: Vec<NodeId>,
    /// Lanes between consecutive nodes (`nodes.len() - 1` entries).
    pub lanes: Vec<LaneId>,
    /// Sum of lane weights, including any detour penalties.
    pub cost:  f32,
}

impl Path {
    /// Zero-length path at `node`.
    pub fn trivial(node: NodeId) -> Self {
        Self { nodes: vec![node], lanes: Vec::new(), cost: 0.0 }
    }

    pub fn is_trivial(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Number of lanes to traverse.
    pub fn hops(&self) -> usize {
        self.lanes.len()
    }

    pub fn goal(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }
}

// ── BlockedLanes ──────────────────────────────────────────────────────────────

/// Lanes a single query should avoid.
///
/// With no penalty the lanes are excluded outright; with a penalty they stay
/// usable at `weight + penalty`.
#[derive(Debug, Clone, Default)]
pub struct BlockedLanes {
    lanes:   HashSet<LaneId>,
    penalty: Option<f32>,
}

impl BlockedLanes {
    /// Nothing blocked.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn exclude(lanes: impl IntoIterator<Item = LaneId>) -> Self {
        Self { lanes: lanes.into_iter().collect(), penalty: None }
    }

    pub fn penalize(lanes: impl IntoIterator<Item = LaneId>, penalty: f32) -> Self {
        Self { lanes: lanes.into_iter().collect(), penalty: Some(penalty) }
    }

    pub fn insert(&mut self, lane: LaneId) {
        self.lanes.insert(lane);
    }

    pub fn contains(&self, lane: LaneId) -> bool {
        self.lanes.contains(&lane)
    }

    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Extra cost of traversing `lane`: `Some(0.0)` for free lanes, the
    /// penalty for penalized ones, `None` for excluded ones.
    #[inline]
    pub fn surcharge(&self, lane: LaneId) -> Option<f32> {
        if !self.lanes.contains(&lane) {
            return Some(0.0);
        }
        self.penalty
    }
}

// ── Planner trait ─────────────────────────────────────────────────────────────

/// Pluggable path search.
///
/// Implementations must be `Send + Sync` so route computation can run on
/// worker threads during the planning phase.
pub trait Planner: Send + Sync {
    /// Lowest-cost node sequence from `start` to `goal` avoiding `blocked`.
    ///
    /// `start == goal` yields a trivial path.  Unreachable goals yield
    /// [`GraphError::NoPath`]; the caller decides whether to retry without
    /// exclusions, wait, or give up.
    fn plan(
        &self,
        graph:   &NavGraph,
        start:   NodeId,
        goal:    NodeId,
        blocked: &BlockedLanes,
    ) -> GraphResult<Path>;

    /// Estimated travel cost from `start` to `goal`, used to rank task
    /// assignments.
    fn estimate(&self, graph: &NavGraph, start: NodeId, goal: NodeId) -> GraphResult<f32> {
        self.plan(graph, start, goal, &BlockedLanes::none()).map(|p| p.cost)
    }
}

// ── AStarPlanner ──────────────────────────────────────────────────────────────

/// A* over the CSR lane graph with a straight-line heuristic.
///
/// The heuristic is [`NavGraph::heuristic`], which the graph scales down
/// when any lane is weighted below its length, so returned paths are always
/// lowest-cost.
#[derive(Debug, Clone, Copy, Default)]
pub struct AStarPlanner;

impl Planner for AStarPlanner {
    fn plan(
        &self,
        graph:   &NavGraph,
        start:   NodeId,
        goal:    NodeId,
        blocked: &BlockedLanes,
    ) -> GraphResult<Path> {
        astar(graph, start, goal, blocked)
    }
}

/// Open-set entry.  `BinaryHeap` is a max-heap, so `Ord` is reversed: the
/// greatest entry is the one with the lowest `f`, then `g`, then node id.
#[derive(Debug, Clone, Copy)]
struct OpenEntry {
    f:    f32,
    g:    f32,
    node: NodeId,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.f
            .total_cmp(&self.f)
            .then_with(|| other.g.total_cmp(&self.g))
            .then_with(|| other.node.cmp(&self.node))
    }
}

fn astar(
    graph:   &NavGraph,
    start:   NodeId,
    goal:    NodeId,
    blocked: &BlockedLanes,
) -> GraphResult<Path> {
    graph.check_node(start)?;
    graph.check_node(goal)?;
    if start == goal {
        return Ok(Path::trivial(start));
    }

    let n = graph.node_count();
    // g[v] = best known cost to reach v.
    let mut g        = vec![f32::INFINITY; n];
    // prev_lane[v] = lane that reached v; LaneId::INVALID for unreached nodes.
    let mut prev_lane = vec![LaneId::INVALID; n];
    let mut closed   = vec![false; n];

    g[start.index()] = 0.0;
    let mut open = BinaryHeap::new();
    open.push(OpenEntry { f: graph.heuristic(start, goal), g: 0.0, node: start });

    let mut expanded = 0usize;
    while let Some(OpenEntry { g: cost, node, .. }) = open.pop() {
        if node == goal {
            tracing::trace!(start = start.0, goal = goal.0, expanded, cost, "path found");
            return Ok(reconstruct(graph, &prev_lane, start, goal, cost));
        }
        if closed[node.index()] {
            continue;
        }
        closed[node.index()] = true;
        expanded += 1;

        for (lane, next) in graph.neighbors(node) {
            if closed[next.index()] {
                continue;
            }
            let Some(extra) = blocked.surcharge(lane) else {
                continue;
            };
            let tentative = cost + graph.lane_weight[lane.index()] + extra;
            if tentative < g[next.index()] {
                g[next.index()] = tentative;
                prev_lane[next.index()] = lane;
                open.push(OpenEntry {
                    f:    tentative + graph.heuristic(next, goal),
                    g:    tentative,
                    node: next,
                });
            }
        }
    }

    tracing::debug!(start = start.0, goal = goal.0, expanded, detour = !blocked.is_empty(), "no path");
    Err(GraphError::NoPath { from: start, to: goal })
}

fn reconstruct(
    graph:     &NavGraph,
    prev_lane: &[LaneId],
    start:     NodeId,
    goal:      NodeId,
    cost:      f32,
) -> Path {
    let mut lanes = Vec::new();
    let mut cur = goal;
    while cur != start {
        let lane = prev_lane[cur.index()];
        lanes.push(lane);
        cur = graph.lane_from[lane.index()];
    }
    lanes.reverse();

    let mut nodes = Vec::with_capacity(lanes.len() + 1);
    nodes.push(start);
    nodes.extend(lanes.iter().map(|l| graph.lane_to[l.index()]));
    Path { nodes, lanes, cost }
}
