//! Failure taxonomy for analysis requests.

use alon_providers::OracleError;
use thiserror::Error;

/// Why an analysis request ended in `error`.
///
/// Partial omissions from the oracle are healed inline and never show up here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// Input cannot support the analysis (e.g. too few tokens to combine).
    #[error("{0}")]
    Validation(String),
    #[error("API request limit exceeded; please try again later")]
    RateLimited,
    #[error("failed to communicate with the oracle: {0}")]
    Communication(String),
}

impl AnalysisError {
    /// Cause string stored on `error` records.
    #[must_use]
    pub fn user_message(&self) -> String {
        self.to_string()
    }

    #[must_use]
    pub const fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited)
    }
}

impl From<OracleError> for AnalysisError {
    fn from(error: OracleError) -> Self {
        match error {
            OracleError::RateLimited { detail } => {
                tracing::warn!(%detail, "Oracle quota exhausted");
                Self::RateLimited
            }
            OracleError::Communication { detail } | OracleError::MalformedResponse { detail } => {
                Self::Communication(detail)
            }
        }
    }
}
