//! Delivery of handler output, either inline on the HTTP response or as a
//! deferred POST to the invocation's `response_url`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lambda_http::http::header::{HeaderValue, CONTENT_TYPE};
use lambda_http::http::StatusCode;
use lambda_http::{Body, Response};
use reqwest::Client;
use tracing::debug;

use crate::error::DeliveryError;
use crate::types::SlackResponse;

/// Transport timeout applied to response-URL POSTs by default.
pub const DEFAULT_POST_TIMEOUT: Duration = Duration::from_secs(10);

/// What happened to a deferred response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Posted,
    /// The handler had nothing to say; no request was made.
    Skipped,
}

/// Sends a serialized response to a response URL.
#[async_trait]
pub trait ResponsePoster: Send + Sync {
    async fn post_json(&self, url: &str, body: String) -> Result<(), DeliveryError>;
}

#[async_trait]
impl<T: ResponsePoster + ?Sized> ResponsePoster for Arc<T> {
    async fn post_json(&self, url: &str, body: String) -> Result<(), DeliveryError> {
        (**self).post_json(url, body).await
    }
}

/// [`ResponsePoster`] backed by a `reqwest` client. Failed POSTs are not retried.
#[derive(Debug, Clone)]
pub struct HttpPoster {
    client: Client,
    timeout: Option<Duration>,
}

impl HttpPoster {
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            timeout: Some(timeout),
        })
    }

    /// Uses a caller-built client; its own timeout settings apply.
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Request timeout this poster was built with, if it built its own client.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for HttpPoster {
    /// A client bounded by [`DEFAULT_POST_TIMEOUT`].
    fn default() -> Self {
        match Client::builder().timeout(DEFAULT_POST_TIMEOUT).build() {
            Ok(client) => Self {
                client,
                timeout: Some(DEFAULT_POST_TIMEOUT),
            },
            Err(err) => {
                tracing::warn!(error = %err, "falling back to an unconfigured http client");
                Self::with_client(Client::new())
            }
        }
    }
}

#[async_trait]
impl ResponsePoster for HttpPoster {
    async fn post_json(&self, url: &str, body: String) -> Result<(), DeliveryError> {
        self.client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}

/// Builds the HTTP reply for an inline response.
///
/// `None` yields a bare 200.
pub fn inline(response: Option<&SlackResponse>) -> Result<Response<Body>, DeliveryError> {
    let Some(response) = response else {
        return Ok(empty(StatusCode::OK));
    };

    let mut reply = Response::new(Body::from(serde_json::to_string(response)?));
    reply
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(reply)
}

/// POSTs `response` to `response_url`. `None` makes no network call at all.
pub async fn deliver(
    poster: &dyn ResponsePoster,
    response_url: &str,
    response: Option<&SlackResponse>,
) -> Result<Delivery, DeliveryError> {
    let Some(response) = response else {
        return Ok(Delivery::Skipped);
    };
    if response_url.is_empty() {
        return Err(DeliveryError::MissingResponseUrl);
    }

    let body = serde_json::to_string(response)?;
    poster.post_json(response_url, body).await?;
    debug!(response_url, "posted deferred response");

    Ok(Delivery::Posted)
}

/// A body-less reply with the given status.
pub(crate) fn empty(status: StatusCode) -> Response<Body> {
    let mut reply = Response::new(Body::Empty);
    *reply.status_mut() = status;
    reply
}
