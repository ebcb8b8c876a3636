use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("no value within {0:?}")]
    Timeout(Duration),
    #[error("value was already published")]
    AlreadySet,
    #[error("bus closed")]
    Closed,
}
