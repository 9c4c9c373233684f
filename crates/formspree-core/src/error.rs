use thiserror::Error;

/// Errors returned by client operations.
///
/// Server-reported validation failures and payment failures are not errors at
/// this level: they come back inside a [`crate::SubmissionResponse`]. Only
/// transport failures and misuse of the API surface here.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("you must provide a form key")]
    MissingFormKey,

    #[error("session has been torn down")]
    SessionTornDown,

    #[error("no browser context configured for session tracking")]
    NoBrowserContext,

    #[error("invalid submission data: {0}")]
    InvalidData(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("http error: {0}")]
    Http(String),

    #[error("failed to decode response body: {0}")]
    Decode(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
