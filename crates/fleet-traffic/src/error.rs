use fleet_core::{LaneId, NodeId, RobotId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrafficError {
    #[error("node {0} not found in navigation graph")]
    UnknownNode(NodeId),

    #[error("lane {0} not found in navigation graph")]
    UnknownLane(LaneId),

    /// Placing a robot would exceed the node's capacity.
    #[error("node {node} is at capacity ({capacity})")]
    NodeFull { node: NodeId, capacity: u32 },

    #[error("{robot} holds no reservation on {lane}")]
    NotHeld { robot: RobotId, lane: LaneId },
}

pub type TrafficResult<T> = Result<T, TrafficError>;
