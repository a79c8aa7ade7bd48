use shared::{
    domain::StoryId,
    error::{ApiException, ErrorCode},
};
use thiserror::Error;

/// Failures surfaced to the presentation layer. None of these leave a
/// snapshot half-updated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("network failure: {0}")]
    Network(String),
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("a favorite change for story {0} is already in flight")]
    Busy(StoryId),
}

impl ClientError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Auth(_))
    }

    pub fn not_logged_in() -> Self {
        ClientError::Precondition("no user is logged in".into())
    }
}

impl From<ApiException> for ClientError {
    fn from(value: ApiException) -> Self {
        match value.code {
            ErrorCode::Unauthorized => ClientError::Auth(value.message),
            ErrorCode::Validation => ClientError::Validation(value.message),
            ErrorCode::Forbidden => ClientError::Precondition(value.message),
            ErrorCode::NotFound => ClientError::NotFound(value.message),
            ErrorCode::Network | ErrorCode::Internal => ClientError::Network(value.message),
        }
    }
}
