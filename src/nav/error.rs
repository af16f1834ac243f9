use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NavError {
    /// Caller contract violation: out-of-range position, bad agent size, bad handle.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The portal graph no longer satisfies its own invariants.
    #[error("inconsistent graph state: {0}")]
    InconsistentGraph(String),
}

pub type NavResult<T> = Result<T, NavError>;

impl NavError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        NavError::InvalidArgument(msg.into())
    }

    pub fn inconsistent(msg: impl Into<String>) -> Self {
        NavError::InconsistentGraph(msg.into())
    }
}
