// src/error.rs

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("unknown region id: {0}")]
    UnknownRegion(String),

    #[error("region id {0} is configured as both a parking slot and an illegal zone")]
    DuplicateRegion(String),
}
