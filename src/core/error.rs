//! Failure kinds of the rate data layer and the event payload they collapse into.

use std::fmt::Display;
use thiserror::Error;

/// Code published for failures the upstream service did not number itself.
pub const GENERIC_ERROR_CODE: i64 = 0;

/// Everything that can stop a list or rate request from producing data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Connectivity, IO or HTTP status failure.
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Payload did not match the expected shape.
    #[error("Decode failure: {0}")]
    Decode(String),

    /// Upstream answered with `success: false`.
    #[error("API failure {code}: {}", .info.as_deref().unwrap_or("no details"))]
    Api { code: i64, info: Option<String> },

    /// Missing or unusable base-to-target quote.
    #[error("Derivation failure: {0}")]
    Derivation(String),
}

/// Payload of the `DataError` topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataError {
    pub code: i64,
    pub info: Option<String>,
}

impl DataError {
    pub fn new(code: i64, info: impl Into<String>) -> Self {
        Self {
            code,
            info: Some(info.into()),
        }
    }
}

impl Display for DataError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.info {
            Some(info) => write!(f, "[{}] {}", self.code, info),
            None => write!(f, "[{}] Unknown error", self.code),
        }
    }
}

impl std::error::Error for DataError {}

impl From<&FetchError> for DataError {
    fn from(err: &FetchError) -> Self {
        match err {
            FetchError::Api { code, info } => DataError {
                code: *code,
                info: info.clone(),
            },
            other => DataError::new(GENERIC_ERROR_CODE, other.to_string()),
        }
    }
}

impl From<FetchError> for DataError {
    fn from(err: FetchError) -> Self {
        DataError::from(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_failure_keeps_upstream_code() {
        let err = FetchError::Api {
            code: 101,
            info: Some("You have not supplied a valid API Access Key.".to_string()),
        };
        let data: DataError = err.into();
        assert_eq!(data.code, 101);
        assert_eq!(
            data.info.as_deref(),
            Some("You have not supplied a valid API Access Key.")
        );
    }

    #[test]
    fn test_other_failures_use_generic_code() {
        for err in [
            FetchError::Transport("connection refused".to_string()),
            FetchError::Decode("missing field `success`".to_string()),
            FetchError::Derivation("no USDXYZ quote".to_string()),
        ] {
            let data = DataError::from(&err);
            assert_eq!(data.code, GENERIC_ERROR_CODE);
            assert_eq!(data.info, Some(err.to_string()));
        }
    }
}
