//! The wait-for graph.
//!
//! An edge `a → b` means robot `a` is queued for a lane and cannot be
//! granted until `b` moves or releases something.  Only queued robots have
//! outgoing edges, so any cycle consists entirely of waiting robots.
//!
//! Edges are kept in ordered maps keyed by `RobotId`; cycle search visits
//! robots and successors in ascending id order and is therefore
//! deterministic.

use std::collections::{BTreeMap, BTreeSet};

use fleet_core::RobotId;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WaitForGraph {
    edges: BTreeMap<RobotId, BTreeSet<RobotId>>,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Mark {
    OnPath,
    Done,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `waiter` waits on `holder`.  Self-edges are ignored.
    pub fn add_edge(&mut self, waiter: RobotId, holder: RobotId) {
        if waiter != holder {
            self.edges.entry(waiter).or_default().insert(holder);
        }
    }

    pub fn contains_edge(&self, waiter: RobotId, holder: RobotId) -> bool {
        self.edges.get(&waiter).is_some_and(|s| s.contains(&holder))
    }

    /// Robots `waiter` waits on, ascending.
    pub fn waits_on(&self, waiter: RobotId) -> impl Iterator<Item = RobotId> + '_ {
        self.edges.get(&waiter).into_iter().flatten().copied()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// First cycle found, as the robots along it in wait order.
    pub fn find_cycle(&self) -> Option<Vec<RobotId>> {
        let mut marks: BTreeMap<RobotId, Mark> = BTreeMap::new();
        let mut path = Vec::new();
        for &root in self.edges.keys() {
            if marks.contains_key(&root) {
                continue;
            }
            if let Some(cycle) = self.visit(root, &mut marks, &mut path) {
                return Some(cycle);
            }
        }
        None
    }

    pub fn is_acyclic(&self) -> bool {
        self.find_cycle().is_none()
    }

    // Depth-first; recursion depth is bounded by the number of waiting robots.
    fn visit(
        &self,
        node:  RobotId,
        marks: &mut BTreeMap<RobotId, Mark>,
        path:  &mut Vec<RobotId>,
    ) -> Option<Vec<RobotId>> {
        marks.insert(node, Mark::OnPath);
        path.push(node);
        for next in self.waits_on(node) {
            match marks.get(&next) {
                Some(Mark::OnPath) => {
                    let start = path.iter().position(|&r| r == next)?;
                    return Some(path[start..].to_vec());
                }
                Some(Mark::Done) => {}
                None => {
                    if let Some(cycle) = self.visit(next, marks, path) {
                        return Some(cycle);
                    }
                }
            }
        }
        path.pop();
        marks.insert(node, Mark::Done);
        None
    }
}
