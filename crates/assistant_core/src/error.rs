use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

/// Failures the controllers surface as state changes, never as panics or
/// errors crossing their public operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControllerError {
    #[error("{rejected} of {total} files rejected: only {accepted} files are supported")]
    ValidationRejected {
        rejected: usize,
        total: usize,
        accepted: String,
    },
    #[error("response production failed: {reason}")]
    ProductionFailed { code: ErrorCode, reason: String },
    #[error("ingestion of {file} failed: {reason}")]
    IngestionFailed { file: String, reason: String },
}

impl ControllerError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ControllerError::ValidationRejected { .. } => ErrorCode::Validation,
            ControllerError::ProductionFailed { code, .. } => *code,
            ControllerError::IngestionFailed { .. } => ErrorCode::Backend,
        }
    }
}

impl From<ControllerError> for ApiError {
    fn from(value: ControllerError) -> Self {
        ApiError::new(value.code(), value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_message_reports_counts() {
        let err = ControllerError::ValidationRejected {
            rejected: 1,
            total: 2,
            accepted: "application/pdf".into(),
        };
        assert_eq!(
            err.to_string(),
            "1 of 2 files rejected: only application/pdf files are supported"
        );
        assert_eq!(err.code(), ErrorCode::Validation);
    }

    #[test]
    fn production_failure_keeps_its_code() {
        let api: ApiError = ControllerError::ProductionFailed {
            code: ErrorCode::Timeout,
            reason: "no answer within 60s".into(),
        }
        .into();
        assert_eq!(api.code, ErrorCode::Timeout);
        assert!(api.message.contains("no answer within 60s"));
    }
}
