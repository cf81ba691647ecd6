use crate::gateway::GatewayError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum AppError {
    /// No workspace or endpoint selected yet; the shell should show its setup prompt.
    #[error("no data source configured; select a workspace or connect an endpoint")]
    ConfigurationMissing,

    #[error("failed to load data: {0}")]
    LoadFailure(#[source] GatewayError),

    /// Queue kept intact; the user retries the save.
    #[error("{failed} of {total} attendance writes failed; changes kept for retry")]
    FlushFailure {
        failed: usize,
        total: usize,
        #[source]
        first: GatewayError,
    },

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("{0}")]
    InvalidInput(String),

    /// The remote call failed after a local change; the local change was reverted
    /// and the two sides may disagree until the next reload.
    #[error("{action} failed, local change reverted; server may differ until reload: {source}")]
    Diverged {
        action: &'static str,
        #[source]
        source: GatewayError,
    },

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ConfigurationMissing => "configuration_missing",
            AppError::LoadFailure(_) => "load_failed",
            AppError::FlushFailure { .. } => "flush_failed",
            AppError::NotFound { .. } => "not_found",
            AppError::InvalidInput(_) => "bad_params",
            AppError::Diverged { .. } => "diverged",
            AppError::Gateway(_) => "gateway_failed",
        }
    }

    pub fn not_found(what: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound {
            what,
            id: id.into(),
        }
    }
}
