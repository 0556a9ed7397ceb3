use thiserror::Error;

use crate::core::TargetId;

pub type SchedResult<T> = Result<T, SchedulerError>;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("unknown target: {0}")]
    UnknownTarget(TargetId),

    #[error("pass `{pass}` failed on target {target}: {message}")]
    PassFailed {
        target: TargetId,
        pass: &'static str,
        message: String,
    },

    #[error("render failed: {0}")]
    Render(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("flush exceeded {limit} pass executions")]
    FlushLimitExceeded { limit: usize },

    #[error("serialization failed: {0}")]
    Serialization(String),
}
