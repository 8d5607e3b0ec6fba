use fleet_core::{NodeId, RobotId, TaskId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("node {0} not found in navigation graph")]
    UnknownNode(NodeId),

    #[error("node {0} is not a task endpoint")]
    NotTaskEndpoint(NodeId),

    #[error("task {0} not found")]
    UnknownTask(TaskId),

    #[error("task {0} has already finished")]
    Finished(TaskId),

    #[error("robot {0} holds no active task")]
    NoTask(RobotId),
}

pub type TaskResult<T> = Result<T, TaskError>;
