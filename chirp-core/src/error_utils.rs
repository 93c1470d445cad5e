use crate::error::*;
use std::time::Duration;

pub trait ErrorExt {
    fn is_retryable(&self) -> bool;
    fn retry_after(&self) -> Option<Duration>;
}

impl ErrorExt for CoreError {
    fn is_retryable(&self) -> bool {
        match self {
            CoreError::PlatformApi(e) => e.is_retryable(),
            CoreError::Llm(e) => matches!(
                e,
                LlmError::RateLimitExceeded { .. }
                    | LlmError::ServiceUnavailable { .. }
                    | LlmError::RequestTimeout { .. }
            ),
            CoreError::Approval(e) => matches!(e, ApprovalError::RequestTimeout),
            CoreError::Network(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::PlatformApi(PlatformApiError::RateLimitExceeded { retry_after }) => {
                Some(Duration::from_secs(*retry_after))
            }
            CoreError::Llm(LlmError::RateLimitExceeded { retry_after, .. }) => {
                Some(Duration::from_secs(*retry_after))
            }
            _ => None,
        }
    }
}

impl PlatformApiError {
    pub fn is_retryable(&self) -> bool {
        match self {
            // Transient server-side conditions
            PlatformApiError::ServerError { .. }
            | PlatformApiError::RequestTimeout
            | PlatformApiError::InvalidResponse { .. } => true,
            // Rate limits are retryable only after the reset time elapses,
            // never within the same run
            PlatformApiError::RateLimitExceeded { .. } => false,
            // Credential and permission problems are permanent
            PlatformApiError::AuthenticationFailed { .. }
            | PlatformApiError::Forbidden { .. }
            | PlatformApiError::PostNotFound { .. }
            | PlatformApiError::PostRejected { .. } => false,
        }
    }
}
