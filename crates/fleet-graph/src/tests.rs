//! Unit tests for fleet-graph.
//!
//! All tests use hand-built graphs or inline documents; the file-loading
//! tests write to a temporary directory.

#[cfg(test)]
mod helpers {
    use fleet_core::{NodeId, Point};
    use crate::{NavGraph, NavGraphBuilder};

    /// Straight corridor N1 – N2 – N3 – N4, unit spacing and unit weights,
    /// lanes in both directions.
    pub fn corridor() -> (NavGraph, [NodeId; 4]) {
        let mut b = NavGraphBuilder::new();
        let n: Vec<NodeId> = (0..4).map(|i| b.add_node(Point::new(i as f32, 0.0))).collect();
        for w in n.windows(2) {
            b.add_lane_pair(w[0], w[1], 1.0);
        }
        (b.build().unwrap(), [n[0], n[1], n[2], n[3]])
    }

    /// Unit square with two equal-cost routes from corner 0 to corner 2:
    ///
    /// ```text
    ///   3 ── 2
    ///   │    │
    ///   0 ── 1
    /// ```
    pub fn square() -> (NavGraph, [NodeId; 4]) {
        let mut b = NavGraphBuilder::new();
        let n0 = b.add_node(Point::new(0.0, 0.0));
        let n1 = b.add_node(Point::new(1.0, 0.0));
        let n2 = b.add_node(Point::new(1.0, 1.0));
        let n3 = b.add_node(Point::new(0.0, 1.0));
        b.add_lane_pair(n0, n1, 1.0);
        b.add_lane_pair(n1, n2, 1.0);
        b.add_lane_pair(n2, n3, 1.0);
        b.add_lane_pair(n3, n0, 1.0);
        (b.build().unwrap(), [n0, n1, n2, n3])
    }
}

// ── Builder & structure ───────────────────────────────────────────────────────

#[cfg(test)]
mod builder {
    use fleet_core::{LaneId, Point};
    use crate::{GraphError, LaneSpec, NavGraph, NavGraphBuilder, NodeSpec};

    #[test]
    fn unknown_node_has_no_lanes() {
        let (graph, [n1, ..]) = super::helpers::corridor();
        let ghost = fleet_core::NodeId(42);
        assert_eq!(graph.out_lanes(ghost).count(), 0);
        assert_eq!(graph.neighbors(ghost).count(), 0);
        assert_eq!(graph.out_degree(ghost), 0);
        assert_eq!(graph.out_degree(n1), 1);
    }

    #[test]
    fn default_weights_keep_unit_heuristic_scale() {
        let (graph, [n1, _, _, n4]) = super::helpers::corridor();
        assert_eq!(graph.heuristic_scale(), 1.0);
        assert_eq!(graph.heuristic(n1, n4), 3.0);
        assert_eq!(NavGraph::empty().heuristic_scale(), 1.0);
    }

    #[test]
    fn empty_build() {
        let graph = NavGraphBuilder::new().build().unwrap();
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.lane_count(), 0);
        assert!(graph.is_empty());
        assert!(NavGraph::empty().nearest_node(Point::new(0.0, 0.0)).is_none());
    }

    #[test]
    fn neighbors_follow_csr() {
        let (graph, [n0, n1, n2, n3]) = super::helpers::corridor();
        assert_eq!(graph.out_degree(n0), 1);
        assert_eq!(graph.out_degree(n1), 2);
        assert_eq!(graph.out_degree(n3), 1);
        let dests: Vec<_> = graph.neighbors(n1).map(|(_, d)| d).collect();
        assert!(dests.contains(&n0) && dests.contains(&n2));
        for (lane, dest) in graph.neighbors(n2) {
            assert_eq!(graph.lane_endpoints(lane), (n2, dest));
        }
    }

    #[test]
    fn reverse_lanes_pair_automatically() {
        let (graph, [n0, n1, ..]) = super::helpers::corridor();
        let fwd = graph.lane_between(n0, n1).unwrap();
        let back = graph.lane_between(n1, n0).unwrap();
        assert_eq!(graph.reverse(fwd), Some(back));
        assert_eq!(graph.reverse(back), Some(fwd));
    }

    #[test]
    fn one_way_lane_has_no_reverse() {
        let mut b = NavGraphBuilder::new();
        let a = b.add_node_with(NodeSpec::at(Point::new(0.0, 0.0)).named("a"));
        let c = b.add_node_with(NodeSpec::at(Point::new(1.0, 0.0)).named("c"));
        b.add_directed_lane(a, c, 1.0);
        b.add_directed_lane(c, a, 1.0);
        let graph = b.build().unwrap();
        assert_eq!(graph.node_by_name("c"), Some(c));

        let mut b = NavGraphBuilder::new();
        let a = b.add_node(Point::new(0.0, 0.0));
        let c = b.add_node(Point::new(1.0, 0.0));
        b.node_mut(a).unwrap().endpoint = true;
        b.add_directed_lane(a, c, 1.0);
        let graph = b.build().unwrap();
        let lane = graph.lane_between(a, c).unwrap();
        assert_eq!(graph.reverse(lane), None);
        assert_eq!(graph.lane_between(c, a), None);
    }

    #[test]
    fn missing_weight_defaults_to_length() {
        let mut b = NavGraphBuilder::new();
        let a = b.add_node(Point::new(0.0, 0.0));
        let c = b.add_node(Point::new(3.0, 4.0));
        b.add_lane(a, c, LaneSpec { capacity: 1, ..LaneSpec::default() });
        b.add_lane(c, a, LaneSpec { capacity: 1, ..LaneSpec::default() });
        let graph = b.build().unwrap();
        let lane = graph.lane_between(a, c).unwrap();
        assert!((graph.lane_weight[lane.index()] - 5.0).abs() < 1e-6);
    }

    #[test]
    fn explicit_reverse_must_run_opposite() {
        let mut b = NavGraphBuilder::new();
        let a = b.add_node(Point::new(0.0, 0.0));
        let c = b.add_node(Point::new(1.0, 0.0));
        let d = b.add_node(Point::new(2.0, 0.0));
        let ac = b.add_directed_lane(a, c, 1.0);
        b.add_lane(c, d, LaneSpec { reverse: Some(ac), ..LaneSpec::weighted(1.0) });
        assert!(matches!(b.build(), Err(GraphError::Malformed(_))));
    }

    #[test]
    fn explicit_reverse_is_honoured() {
        let mut b = NavGraphBuilder::new();
        let a = b.add_node(Point::new(0.0, 0.0));
        let c = b.add_node(Point::new(1.0, 0.0));
        let ac = b.add_directed_lane(a, c, 1.0);
        b.add_lane(c, a, LaneSpec { reverse: Some(ac), ..LaneSpec::weighted(1.0) });
        let graph = b.build().unwrap();
        let ca = graph.lane_between(c, a).unwrap();
        assert_eq!(graph.reverse(ca), graph.lane_between(a, c));
        assert_ne!(graph.reverse(ca), Some(LaneId::INVALID));
    }

    #[test]
    fn rejects_unknown_node() {
        let mut b = NavGraphBuilder::new();
        let a = b.add_node(Point::new(0.0, 0.0));
        b.add_directed_lane(a, fleet_core::NodeId(9), 1.0);
        assert!(matches!(b.build(), Err(GraphError::Malformed(_))));
    }

    #[test]
    fn rejects_non_positive_weight() {
        let mut b = NavGraphBuilder::new();
        let a = b.add_node(Point::new(0.0, 0.0));
        let c = b.add_node(Point::new(1.0, 0.0));
        b.add_lane_pair(a, c, 0.0);
        assert!(matches!(b.build(), Err(GraphError::Malformed(_))));

        let mut b = NavGraphBuilder::new();
        let a = b.add_node(Point::new(0.0, 0.0));
        let c = b.add_node(Point::new(1.0, 0.0));
        b.add_lane_pair(a, c, -2.0);
        assert!(matches!(b.build(), Err(GraphError::Malformed(_))));
    }

    #[test]
    fn rejects_self_loop_and_duplicates() {
        let mut b = NavGraphBuilder::new();
        let a = b.add_node(Point::new(0.0, 0.0));
        b.add_directed_lane(a, a, 1.0);
        assert!(b.build().is_err());

        let mut b = NavGraphBuilder::new();
        let a = b.add_node(Point::new(0.0, 0.0));
        let c = b.add_node(Point::new(1.0, 0.0));
        b.add_lane_pair(a, c, 1.0);
        b.add_directed_lane(a, c, 2.0);
        assert!(b.build().is_err());
    }

    #[test]
    fn rejects_disconnected_endpoint() {
        // Two islands; with no endpoint flags every node is an endpoint.
        let mut b = NavGraphBuilder::new();
        let a = b.add_node(Point::new(0.0, 0.0));
        let c = b.add_node(Point::new(1.0, 0.0));
        let d = b.add_node(Point::new(5.0, 0.0));
        let e = b.add_node(Point::new(6.0, 0.0));
        b.add_lane_pair(a, c, 1.0);
        b.add_lane_pair(d, e, 1.0);
        assert!(matches!(b.build(), Err(GraphError::Malformed(_))));
    }

    #[test]
    fn isolated_non_endpoint_is_allowed() {
        let mut b = NavGraphBuilder::new();
        let ep = |b: &mut NavGraphBuilder, x: f32| {
            let mut spec = NodeSpec::at(Point::new(x, 0.0));
            spec.endpoint = true;
            b.add_node_with(spec)
        };
        let a = ep(&mut b, 0.0);
        let c = ep(&mut b, 1.0);
        let island = b.add_node(Point::new(9.0, 9.0));
        b.add_lane_pair(a, c, 1.0);
        let graph = b.build().unwrap();
        assert_eq!(graph.task_endpoints(), &[a, c]);
        assert!(!graph.is_task_endpoint(island));
    }

    #[test]
    fn one_way_ring_is_strongly_connected() {
        let mut b = NavGraphBuilder::new();
        let n: Vec<_> = [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]
            .iter()
            .map(|&(x, y)| b.add_node(Point::new(x, y)))
            .collect();
        for i in 0..4 {
            b.add_directed_lane(n[i], n[(i + 1) % 4], 1.0);
        }
        assert!(b.build().is_ok());
    }
}

// ── Node roles & spatial queries ──────────────────────────────────────────────

#[cfg(test)]
mod roles {
    use fleet_core::Point;
    use crate::{NavGraphBuilder, NodeSpec};

    #[test]
    fn unflagged_graph_spawns_everywhere() {
        let (graph, nodes) = super::helpers::corridor();
        assert_eq!(graph.spawn_points(), &nodes);
        assert!(nodes.iter().all(|&n| graph.is_spawn_point(n)));
    }

    #[test]
    fn nearest_node_and_charger() {
        let mut b = NavGraphBuilder::new();
        let a = b.add_node(Point::new(0.0, 0.0));
        let mut charger = NodeSpec::at(Point::new(5.0, 0.0));
        charger.charger = true;
        let far_charger = {
            let mut s = NodeSpec::at(Point::new(-9.0, 0.0));
            s.charger = true;
            s
        };
        let c = b.add_node_with(charger);
        let d = b.add_node_with(far_charger);
        b.add_lane_pair(a, c, 5.0);
        b.add_lane_pair(a, d, 9.0);
        let graph = b.build().unwrap();

        assert_eq!(graph.nearest_node(Point::new(4.2, 0.3)), Some(c));
        assert_eq!(graph.k_nearest_nodes(Point::new(0.1, 0.0), 2), vec![a, c]);
        assert_eq!(graph.chargers().collect::<Vec<_>>(), vec![c, d]);
        assert_eq!(graph.nearest_charger(a), Some(c));
    }
}

// ── Loaders ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod loaders {
    use std::io::{Cursor, Write};

    use crate::{DEFAULT_SPAWN_PREFIX, GraphError, load_json_file, load_json_str, load_levels_file, load_levels_reader};

    const WAREHOUSE: &str = r#"{
        "nodes": [
            { "id": "dock",  "x": 0.0, "y": 0.0, "spawn": true },
            { "id": "aisle", "x": 2.0, "y": 0.0, "capacity": 2 },
            { "id": "shelf", "x": 4.0, "y": 0.0, "endpoint": true },
            { "id": "out",   "x": 4.0, "y": 3.0, "endpoint": true, "charger": true }
        ],
        "lanes": [
            { "from": "dock",  "to": "aisle" },
            { "from": "aisle", "to": "dock" },
            { "from": "aisle", "to": "shelf", "weight": 2.5 },
            { "from": "shelf", "to": "aisle", "weight": 2.5 },
            { "from": "shelf", "to": "out" },
            { "from": "out",   "to": "shelf" }
        ]
    }"#;

    #[test]
    fn json_description_loads() {
        let graph = load_json_str(WAREHOUSE).unwrap();
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.lane_count(), 6);

        let dock  = graph.node_by_name("dock").unwrap();
        let aisle = graph.node_by_name("aisle").unwrap();
        let shelf = graph.node_by_name("shelf").unwrap();
        let out   = graph.node_by_name("out").unwrap();
        assert_eq!(graph.capacity(aisle), 2);
        assert_eq!(graph.spawn_points(), &[dock]);
        assert_eq!(graph.task_endpoints(), &[shelf, out]);
        assert_eq!(graph.nearest_charger(dock), Some(out));

        let lane = graph.lane_between(aisle, shelf).unwrap();
        assert_eq!(graph.lane_weight[lane.index()], 2.5);
        let lane = graph.lane_between(dock, aisle).unwrap();
        assert_eq!(graph.lane_weight[lane.index()], 2.0);
    }

    #[test]
    fn json_unknown_lane_node_is_malformed() {
        let doc = r#"{ "nodes": [ { "id": "a", "x": 0, "y": 0 } ],
                       "lanes": [ { "from": "a", "to": "ghost" } ] }"#;
        let err = load_json_str(doc).err().unwrap();
        assert!(matches!(err, GraphError::Malformed(ref m) if m.contains("ghost")), "{err}");
    }

    #[test]
    fn json_duplicate_ids_are_malformed() {
        let doc = r#"{ "nodes": [ { "id": "a", "x": 0, "y": 0 }, { "id": "a", "x": 1, "y": 0 } ] }"#;
        assert!(matches!(load_json_str(doc), Err(GraphError::Malformed(_))));
    }

    #[test]
    fn json_syntax_error_is_malformed() {
        assert!(matches!(load_json_str("{ nodes: "), Err(GraphError::Malformed(_))));
    }

    #[test]
    fn json_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graph.json");
        std::fs::File::create(&path).unwrap().write_all(WAREHOUSE.as_bytes()).unwrap();
        let graph = load_json_file(&path).unwrap();
        assert_eq!(graph.node_count(), 4);

        let missing = dir.path().join("missing.json");
        assert!(matches!(load_json_file(&missing), Err(GraphError::Io(_))));
    }

    const LEVELS: &str = r#"{
        "levels": {
            "L1": {
                "vertices": [
                    [0.0, 0.0, {"name": "m_home"}],
                    [3.0, 4.0, {"name": "pickup", "is_charger": true}],
                    [6.0, 0.0, {}]
                ],
                "lanes": [
                    [0, 1, {"speed_limit": 1.0}],
                    [1, 0, {"speed_limit": 1.0}],
                    [1, 2, {"speed_limit": 0.5}],
                    [2, 1, {"speed_limit": 0.5}]
                ]
            }
        }
    }"#;

    #[test]
    fn levels_document_loads() {
        let graph = load_levels_reader(Cursor::new(LEVELS), DEFAULT_SPAWN_PREFIX).unwrap();
        assert_eq!(graph.node_count(), 3);
        let home = graph.node_by_name("m_home").unwrap();
        let pickup = graph.node_by_name("pickup").unwrap();
        assert_eq!(graph.spawn_points(), &[home]);
        assert_eq!(graph.task_endpoints(), &[home, pickup]);
        assert_eq!(graph.nearest_charger(home), Some(pickup));

        let lane = graph.lane_between(home, pickup).unwrap();
        assert!((graph.lane_weight[lane.index()] - 5.0).abs() < 1e-6);
        assert_eq!(graph.lane_speed_limit[lane.index()], Some(1.0));
    }

    #[test]
    fn levels_prefix_without_match_spawns_everywhere() {
        let graph = load_levels_reader(Cursor::new(LEVELS), "p_").unwrap();
        assert_eq!(graph.spawn_points().len(), 3);
    }

    #[test]
    fn levels_malformed_documents() {
        let cases = [
            r#"{}"#,
            r#"{"levels": {}}"#,
            r#"{"levels": {"L1": {"lanes": []}}}"#,
            r#"{"levels": {"L1": {"vertices": [[0, 0]], "lanes": []}}}"#,
            r#"{"levels": {"L1": {"vertices": [["a", 0, {}]], "lanes": []}}}"#,
            r#"{"levels": {"L1": {"vertices": [[0, 0, {}], [1, 0, {}]], "lanes": [[0, 1, {}]]}}}"#,
            r#"{"levels": {"L1": {"vertices": [[0, 0, {}], [1, 0, {}]], "lanes": [[0, 7, {"speed_limit": 1}]]}}}"#,
        ];
        for doc in cases {
            assert!(
                matches!(load_levels_reader(Cursor::new(doc), "m"), Err(GraphError::Malformed(_))),
                "expected malformed: {doc}"
            );
        }
    }

    #[test]
    fn levels_first_level_in_document_order_is_used() {
        let doc = r#"{
            "levels": {
                "Z_ground": {
                    "vertices": [[0.0, 0.0, {}], [1.0, 0.0, {}], [2.0, 0.0, {}]],
                    "lanes": [
                        [0, 1, {"speed_limit": 1.0}], [1, 0, {"speed_limit": 1.0}],
                        [1, 2, {"speed_limit": 1.0}], [2, 1, {"speed_limit": 1.0}]
                    ]
                },
                "A_roof": {
                    "vertices": [[0.0, 0.0, {}], [5.0, 0.0, {}]],
                    "lanes": [[0, 1, {"speed_limit": 1.0}], [1, 0, {"speed_limit": 1.0}]]
                }
            }
        }"#;
        let graph = load_levels_reader(Cursor::new(doc), DEFAULT_SPAWN_PREFIX).unwrap();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.lane_count(), 4);
    }

    #[test]
    fn levels_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nav_graph.json");
        std::fs::write(&path, LEVELS).unwrap();
        assert_eq!(load_levels_file(&path, "m").unwrap().lane_count(), 4);
    }
}

// ── Planner ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod planner {
    use fleet_core::{NodeId, Point};
    use crate::{AStarPlanner, BlockedLanes, GraphError, NavGraphBuilder, Planner};

    #[test]
    fn straight_corridor() {
        let (graph, [n1, n2, n3, n4]) = super::helpers::corridor();
        let path = AStarPlanner.plan(&graph, n1, n4, &BlockedLanes::none()).unwrap();
        assert_eq!(path.nodes, vec![n1, n2, n3, n4]);
        assert_eq!(path.cost, 3.0);
        assert_eq!(path.hops(), 3);
        assert_eq!(path.goal(), Some(n4));
        for (i, lane) in path.lanes.iter().enumerate() {
            assert_eq!(graph.lane_endpoints(*lane), (path.nodes[i], path.nodes[i + 1]));
        }
    }

    #[test]
    fn same_start_and_goal_is_trivial() {
        let (graph, [n1, ..]) = super::helpers::corridor();
        let path = AStarPlanner.plan(&graph, n1, n1, &BlockedLanes::none()).unwrap();
        assert!(path.is_trivial());
        assert_eq!(path.nodes, vec![n1]);
        assert_eq!(path.cost, 0.0);
    }

    #[test]
    fn unknown_node_is_reported() {
        let (graph, [n1, ..]) = super::helpers::corridor();
        let err = AStarPlanner.plan(&graph, n1, NodeId(99), &BlockedLanes::none());
        assert!(matches!(err, Err(GraphError::UnknownNode(NodeId(99)))));
    }

    #[test]
    fn ties_break_towards_lower_node_id() {
        // 0→1→2 and 0→3→2 cost the same; node 1 is expanded first.
        let (graph, [n0, n1, n2, _]) = super::helpers::square();
        for _ in 0..5 {
            let path = AStarPlanner.plan(&graph, n0, n2, &BlockedLanes::none()).unwrap();
            assert_eq!(path.nodes, vec![n0, n1, n2]);
        }
    }

    #[test]
    fn excluded_lane_forces_detour() {
        let (graph, [n0, n1, n2, n3]) = super::helpers::square();
        let blocked = BlockedLanes::exclude([graph.lane_between(n0, n1).unwrap()]);
        let path = AStarPlanner.plan(&graph, n0, n2, &blocked).unwrap();
        assert_eq!(path.nodes, vec![n0, n3, n2]);
        assert_eq!(path.cost, 2.0);
    }

    #[test]
    fn penalized_lane_is_still_usable() {
        let (graph, [n0, n1, ..]) = super::helpers::corridor();
        let lane = graph.lane_between(n0, n1).unwrap();
        let path = AStarPlanner.plan(&graph, n0, n1, &BlockedLanes::penalize([lane], 10.0)).unwrap();
        assert_eq!(path.nodes, vec![n0, n1]);
        assert_eq!(path.cost, 11.0);
    }

    #[test]
    fn exclusion_can_disconnect() {
        let (graph, [n1, n2, _, n4]) = super::helpers::corridor();
        let blocked = BlockedLanes::exclude([graph.lane_between(n1, n2).unwrap()]);
        let err = AStarPlanner.plan(&graph, n1, n4, &blocked);
        assert!(matches!(err, Err(GraphError::NoPath { from, to }) if from == n1 && to == n4));
        // Without exclusions the same query succeeds.
        assert!(AStarPlanner.plan(&graph, n1, n4, &BlockedLanes::none()).is_ok());
    }

    #[test]
    fn lanes_lighter_than_their_length_still_yield_cheapest_path() {
        // The detour through `a` is about 20 units long but weighs 2; the
        // direct lane is 1 unit long but weighs 5.
        let mut b = NavGraphBuilder::new();
        let s  = b.add_node(Point::new(0.0, 0.0));
        let g  = b.add_node(Point::new(1.0, 0.0));
        let a  = b.add_node(Point::new(0.0, 10.0));
        b.add_lane_pair(s, g, 5.0);
        b.add_lane_pair(s, a, 1.0);
        b.add_lane_pair(a, g, 1.0);
        let graph = b.build().unwrap();
        assert!(graph.heuristic_scale() < 0.11);
        assert!(graph.heuristic(a, g) <= 1.0 + 1e-5);

        let path = AStarPlanner.plan(&graph, s, g, &BlockedLanes::none()).unwrap();
        assert_eq!(path.nodes, vec![s, a, g]);
        assert_eq!(path.cost, 2.0);
    }

    #[test]
    fn prefers_cheap_long_way_over_expensive_short_way() {
        // Direct lane 0→2 is heavy; 0→1→2 is cheaper despite the extra hop.
        let mut b = NavGraphBuilder::new();
        let n0 = b.add_node(Point::new(0.0, 0.0));
        let n1 = b.add_node(Point::new(1.0, 1.0));
        let n2 = b.add_node(Point::new(2.0, 0.0));
        b.add_lane_pair(n0, n2, 10.0);
        b.add_lane_pair(n0, n1, 1.5);
        b.add_lane_pair(n1, n2, 1.5);
        let graph = b.build().unwrap();
        let path = AStarPlanner.plan(&graph, n0, n2, &BlockedLanes::none()).unwrap();
        assert_eq!(path.nodes, vec![n0, n1, n2]);
        assert_eq!(AStarPlanner.estimate(&graph, n0, n2).unwrap(), 3.0);
    }
}
