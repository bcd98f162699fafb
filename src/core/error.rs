use std::time::Duration;

use thiserror::Error;

/// Error type handlers return; any `Send + Sync` error converts into it with `?`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Why a request failed authentication.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerifyError {
    #[error("missing or invalid request timestamp")]
    InvalidTimestamp,

    #[error("stale request timestamp ({skew_secs}s outside the replay window)")]
    StaleTimestamp { skew_secs: u64 },

    #[error("signature mismatch")]
    SignatureMismatch,
}

/// Malformed request body.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("request body is not valid UTF-8")]
    NotUtf8,

    #[error("form body has no `payload` field")]
    MissingPayload,

    #[error("invalid action payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Registration-time failures. Never raised while serving.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("cannot add another entry (exceeded limit of {capacity})")]
    CapacityExceeded { capacity: usize },

    #[error("action endpoint suffix must not be empty")]
    EmptyEndpoint,

    #[error("endpoint `{0}` already has an action")]
    DuplicateEndpoint(String),
}

/// Failure to hand a response to the platform.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("response url request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("handler produced a response but the invocation has no response_url")]
    MissingResponseUrl,
}

/// Outcome of a background handler task that did not complete cleanly.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("handler failed: {0}")]
    Handler(BoxError),

    #[error("handler did not finish within {0:?}")]
    TimedOut(Duration),

    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}
