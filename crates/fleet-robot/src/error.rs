use fleet_core::RobotId;
use fleet_traffic::TrafficError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RobotError {
    #[error("robot {0} not found")]
    UnknownRobot(RobotId),

    #[error("traffic error: {0}")]
    Traffic(#[from] TrafficError),
}

pub type RobotResult<T> = Result<T, RobotError>;
