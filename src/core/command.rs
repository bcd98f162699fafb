use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{BoxError, RegistryError};
use crate::types::{SlackCommand, SlackResponse};

/// What a command handler produces: an optional reply, or an error.
pub type HandlerResult = Result<Option<SlackResponse>, BoxError>;

/// Business logic behind one slash command.
///
/// Implemented for any `Fn(SlackCommand) -> impl Future<Output = HandlerResult>`,
/// so plain async closures can be registered directly.
#[async_trait]
pub trait CommandHandler: Send + Sync + 'static {
    async fn call(&self, command: SlackCommand) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> CommandHandler for F
where
    F: Fn(SlackCommand) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn call(&self, command: SlackCommand) -> HandlerResult {
        (self)(command).await
    }
}

/// Maps command names, as sent on the wire (leading `/` included), to handlers.
#[derive(Default, Clone)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn CommandHandler>>,
    limit: Option<usize>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding at most `limit` distinct command names.
    pub fn bounded(limit: usize) -> Self {
        Self {
            commands: HashMap::new(),
            limit: Some(limit),
        }
    }

    /// Registers `handler` under `name`.
    ///
    /// Registering a name twice replaces the earlier handler, which is
    /// returned. Replacing never counts against the limit.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: impl CommandHandler,
    ) -> Result<Option<Arc<dyn CommandHandler>>, RegistryError> {
        let name = name.into();

        if let Some(capacity) = self.limit {
            if self.commands.len() >= capacity && !self.commands.contains_key(&name) {
                return Err(RegistryError::CapacityExceeded { capacity });
            }
        }

        let previous = self.commands.insert(name.clone(), Arc::new(handler));
        if previous.is_some() {
            debug!(command = %name, "replaced existing command handler");
        }
        Ok(previous)
    }

    /// Exact-match lookup.
    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.commands.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl std::fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("limit", &self.limit)
            .finish()
    }
}
