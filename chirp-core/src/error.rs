use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Platform API error: {0}")]
    PlatformApi(#[from] PlatformApiError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Approval channel error: {0}")]
    Approval(#[from] ApprovalError),

    #[error("State store error: {0}")]
    State(#[from] StateError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

#[derive(Error, Debug, Clone)]
pub enum PlatformApiError {
    #[error("Authentication failed: {reason}. Check the platform API credentials")]
    AuthenticationFailed { reason: String },

    #[error("Forbidden access to resource: {resource}. Check API access level and scopes")]
    Forbidden { resource: String },

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Post not found: {post_id}")]
    PostNotFound { post_id: String },

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Server error: {status_code}")]
    ServerError { status_code: u16 },

    #[error("Post rejected by platform: {reason}")]
    PostRejected { reason: String },
}

#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("API key invalid or missing for {provider}")]
    InvalidApiKey { provider: String },

    #[error("Rate limit exceeded for {provider}. Retry after {retry_after} seconds")]
    RateLimitExceeded { provider: String, retry_after: u64 },

    #[error("Provider service unavailable: {provider}")]
    ServiceUnavailable { provider: String },

    #[error("Request timeout for {provider}")]
    RequestTimeout { provider: String },

    #[error("Empty completion from {provider}")]
    EmptyCompletion { provider: String },

    #[error("Invalid response format from {provider}")]
    InvalidResponseFormat { provider: String },
}

#[derive(Error, Debug, Clone)]
pub enum ApprovalError {
    #[error("Draft delivery failed: {reason}")]
    DeliveryFailed { reason: String },

    #[error("Invalid approval response: {details}")]
    InvalidResponse { details: String },

    #[error("Approval channel request timeout")]
    RequestTimeout,
}

#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to persist state to {path}: {source}")]
    PersistFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode state for {path}: {source}")]
    EncodeFailed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Error, Debug, Clone)]
pub enum ConfigError {
    #[error("Environment variable not set: {var_name}")]
    MissingEnvironmentVariable { var_name: String },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration validation failed: {reason}")]
    ValidationFailed { reason: String },
}
