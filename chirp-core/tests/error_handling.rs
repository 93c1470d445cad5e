use chirp_core::{ConfigError, CoreError, ErrorExt, LlmError, PlatformApiError};
use std::time::Duration;

#[test]
fn test_retryable_errors() {
    let server_error = CoreError::PlatformApi(PlatformApiError::ServerError { status_code: 502 });
    assert!(server_error.is_retryable());

    let timeout = CoreError::PlatformApi(PlatformApiError::RequestTimeout);
    assert!(timeout.is_retryable());

    let config_error = CoreError::Config(ConfigError::MissingEnvironmentVariable {
        var_name: "PLATFORM_BEARER_TOKEN".to_string(),
    });
    assert!(!config_error.is_retryable());
}

#[test]
fn test_auth_and_rate_limit_are_not_retryable_in_run() {
    let auth_error = CoreError::PlatformApi(PlatformApiError::AuthenticationFailed {
        reason: "401 Unauthorized".to_string(),
    });
    assert!(!auth_error.is_retryable());

    // A rate limit is only retryable after its reset time, so it is not
    // eligible for in-run retry.
    let rate_limited = CoreError::PlatformApi(PlatformApiError::RateLimitExceeded {
        retry_after: 900,
    });
    assert!(!rate_limited.is_retryable());
    assert_eq!(rate_limited.retry_after(), Some(Duration::from_secs(900)));
}

#[test]
fn test_llm_retry_after() {
    let llm_rate_limited = CoreError::Llm(LlmError::RateLimitExceeded {
        provider: "openai".to_string(),
        retry_after: 30,
    });
    assert!(llm_rate_limited.is_retryable());
    assert_eq!(
        llm_rate_limited.retry_after(),
        Some(Duration::from_secs(30))
    );
}

#[test]
fn test_auth_error_message_is_actionable() {
    let auth_error = PlatformApiError::AuthenticationFailed {
        reason: "401 Unauthorized".to_string(),
    };
    let message = auth_error.to_string();
    assert!(message.contains("credentials"));

    let forbidden = PlatformApiError::Forbidden {
        resource: "/2/tweets".to_string(),
    };
    assert!(forbidden.to_string().contains("access level"));
}
