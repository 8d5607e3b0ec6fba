use fleet_core::{CoreError, NodeId, RobotId, TaskId};
use fleet_graph::GraphError;
use fleet_robot::RobotError;
use fleet_task::TaskError;
use fleet_traffic::TrafficError;
use thiserror::Error;

/// Errors returned by the command API.  A rejected command leaves the
/// coordination state unchanged.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Config(#[from] CoreError),

    #[error("node {0} not found in navigation graph")]
    UnknownNode(NodeId),

    #[error("robot {0} not found")]
    UnknownRobot(RobotId),

    #[error("task {0} not found")]
    UnknownTask(TaskId),

    #[error("node {0} is not a task endpoint")]
    NotTaskEndpoint(NodeId),

    #[error("node {0} is not a spawn point")]
    NotSpawnPoint(NodeId),

    #[error("node {0} has no free capacity")]
    NodeAtCapacity(NodeId),

    #[error("fleet is at its limit of {0} robots")]
    RobotLimit(usize),

    #[error("task {0} has already finished")]
    TaskFinished(TaskId),

    #[error("graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("traffic error: {0}")]
    Traffic(TrafficError),
}

impl From<TrafficError> for SimError {
    fn from(e: TrafficError) -> Self {
        match e {
            TrafficError::UnknownNode(n) => SimError::UnknownNode(n),
            TrafficError::NodeFull { node, .. } => SimError::NodeAtCapacity(node),
            other => SimError::Traffic(other),
        }
    }
}

impl From<RobotError> for SimError {
    fn from(e: RobotError) -> Self {
        match e {
            RobotError::UnknownRobot(r) => SimError::UnknownRobot(r),
            RobotError::Traffic(t) => t.into(),
        }
    }
}

impl From<TaskError> for SimError {
    fn from(e: TaskError) -> Self {
        match e {
            TaskError::UnknownNode(n) => SimError::UnknownNode(n),
            TaskError::NotTaskEndpoint(n) => SimError::NotTaskEndpoint(n),
            TaskError::UnknownTask(t) => SimError::UnknownTask(t),
            TaskError::Finished(t) => SimError::TaskFinished(t),
            TaskError::NoTask(r) => SimError::UnknownRobot(r),
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;
