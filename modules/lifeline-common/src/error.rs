use thiserror::Error;

use crate::types::{AlertStatus, ServiceKind};

#[derive(Error, Debug)]
pub enum LifelineError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("User already reported this incident")]
    DuplicateReporter,

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition { from: AlertStatus, to: AlertStatus },

    #[error("No active {0} facility available")]
    NoFacilityAvailable(ServiceKind),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Notify error: {0}")]
    Notify(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
