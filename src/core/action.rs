use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{BoxError, RegistryError};
use crate::types::SlackAction;

/// Number of actions an app can serve.
pub const DEFAULT_ACTION_CAPACITY: usize = 5;

/// Handles an interactive action. Results travel out of band, typically to
/// the payload's own `response_url`.
#[async_trait]
pub trait ActionHandler: Send + Sync + 'static {
    async fn call(&self, action: SlackAction) -> Result<(), BoxError>;
}

#[async_trait]
impl<F, Fut> ActionHandler for F
where
    F: Fn(SlackAction) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn call(&self, action: SlackAction) -> Result<(), BoxError> {
        (self)(action).await
    }
}

/// A registered action, served at `<endpoint>/<suffix>`.
#[derive(Clone)]
pub struct Action {
    pub callback_id: String,
    pub endpoint_suffix: String,
    pub(crate) handler: Arc<dyn ActionHandler>,
}

impl Action {
    pub fn handler(&self) -> Arc<dyn ActionHandler> {
        Arc::clone(&self.handler)
    }

    /// Full request path of this action under `endpoint`.
    pub fn path(&self, endpoint: &str) -> String {
        join_path(endpoint, &self.endpoint_suffix)
    }
}

impl std::fmt::Debug for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Action")
            .field("callback_id", &self.callback_id)
            .field("endpoint_suffix", &self.endpoint_suffix)
            .finish_non_exhaustive()
    }
}

/// Fixed-capacity table of actions. Insertion past capacity is refused;
/// existing entries are never replaced.
#[derive(Debug, Clone)]
pub struct ActionRegistry {
    actions: Vec<Action>,
    capacity: usize,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_ACTION_CAPACITY)
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            actions: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn register(
        &mut self,
        callback_id: impl Into<String>,
        endpoint_suffix: impl Into<String>,
        handler: impl ActionHandler,
    ) -> Result<(), RegistryError> {
        if self.actions.len() >= self.capacity {
            return Err(RegistryError::CapacityExceeded {
                capacity: self.capacity,
            });
        }

        let endpoint_suffix = normalize_suffix(&endpoint_suffix.into());
        if endpoint_suffix.is_empty() {
            return Err(RegistryError::EmptyEndpoint);
        }
        if self
            .actions
            .iter()
            .any(|action| action.endpoint_suffix == endpoint_suffix)
        {
            return Err(RegistryError::DuplicateEndpoint(endpoint_suffix));
        }

        self.actions.push(Action {
            callback_id: callback_id.into(),
            endpoint_suffix,
            handler: Arc::new(handler),
        });
        Ok(())
    }

    /// The action served at `path`, given the command `endpoint`.
    pub fn find_by_path(&self, endpoint: &str, path: &str) -> Option<&Action> {
        self.actions
            .iter()
            .find(|action| action.path(endpoint) == path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.actions.iter()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

fn normalize_suffix(suffix: &str) -> String {
    suffix.trim_matches('/').to_string()
}

pub(crate) fn join_path(endpoint: &str, suffix: &str) -> String {
    format!("{}/{}", endpoint.trim_end_matches('/'), suffix.trim_start_matches('/'))
}
