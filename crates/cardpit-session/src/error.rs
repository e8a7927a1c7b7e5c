//! Error types for the session layer.

use thiserror::Error;

use cardpit_protocol::ApiError;

use crate::SessionId;

/// Errors from session registration and state transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The session already logged in or attached as an observer.
    #[error("{0} has already identified itself")]
    AlreadyIdentified(SessionId),

    /// No session with this id is registered.
    #[error("{0} is not registered")]
    NotFound(SessionId),
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::AlreadyIdentified(_) => ApiError::AlreadyLoggedIn,
            SessionError::NotFound(_) => ApiError::NotLoggedIn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversion_to_api_error() {
        let err = SessionError::AlreadyIdentified(SessionId(2));
        assert_eq!(ApiError::from(err), ApiError::AlreadyLoggedIn);

        let err = SessionError::NotFound(SessionId(2));
        assert_eq!(ApiError::from(err), ApiError::NotLoggedIn);
    }
}
