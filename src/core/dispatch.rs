use std::sync::Arc;
use std::time::Duration;

use lambda_http::http::{Method, StatusCode};
use lambda_http::{Body, Request, Response};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::action::{ActionHandler, ActionRegistry};
use crate::command::{CommandHandler, CommandRegistry};
use crate::error::{RegistryError, TaskError};
use crate::form;
use crate::response::{self, empty, HttpPoster, ResponsePoster};
use crate::signature::SignatureVerifier;
use crate::types::{SlackAction, SlackCommand, SlackResponse};

pub const SIGNATURE_HEADER: &str = "x-slack-signature";
pub const TIMESTAMP_HEADER: &str = "x-slack-request-timestamp";

/// How command handlers are run relative to the HTTP request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Run the handler before answering and return its reply in the body.
    Inline,
    /// Answer 200 right away and run the handler on a detached task; its
    /// reply goes to the invocation's `response_url`.
    #[default]
    Deferred,
}

impl std::str::FromStr for DispatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inline" | "sync" => Ok(Self::Inline),
            "deferred" | "async" => Ok(Self::Deferred),
            _ => Err(format!("Unknown dispatch mode: {}. Use: inline or deferred", s)),
        }
    }
}

/// Result of dispatching one request.
#[derive(Debug)]
pub struct Dispatched {
    pub response: Response<Body>,
    /// Background handler task, if one was started. Dropping it detaches the task.
    pub task: Option<JoinHandle<Result<(), TaskError>>>,
}

impl Dispatched {
    fn reply(response: Response<Body>) -> Self {
        Self {
            response,
            task: None,
        }
    }

    fn status(status: StatusCode) -> Self {
        Self::reply(empty(status))
    }
}

/// Webhook endpoint for one app: verifies requests, decodes them and runs the
/// matching handler.
///
/// Commands and actions are registered through `&mut App` before serving.
/// Serving only needs `&App`, so share it behind an `Arc` once registration
/// is done.
pub struct App {
    verifier: SignatureVerifier,
    endpoint: String,
    mode: DispatchMode,
    handler_timeout: Option<Duration>,
    commands: CommandRegistry,
    actions: ActionRegistry,
    poster: Arc<dyn ResponsePoster>,
}

impl App {
    pub fn new(signing_secret: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            verifier: SignatureVerifier::new(signing_secret),
            endpoint: endpoint.into(),
            mode: DispatchMode::default(),
            handler_timeout: None,
            commands: CommandRegistry::new(),
            actions: ActionRegistry::new(),
            poster: Arc::new(HttpPoster::default()),
        }
    }

    pub fn with_mode(mut self, mode: DispatchMode) -> Self {
        self.mode = mode;
        self
    }

    /// Upper bound on a single handler run.
    pub fn with_handler_timeout(mut self, timeout: Duration) -> Self {
        self.handler_timeout = Some(timeout);
        self
    }

    pub fn with_poster(mut self, poster: impl ResponsePoster + 'static) -> Self {
        self.poster = Arc::new(poster);
        self
    }

    pub fn with_commands(mut self, commands: CommandRegistry) -> Self {
        self.commands = commands;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    /// Registers a slash command; a later registration of the same name wins.
    pub fn register_command(
        &mut self,
        name: impl Into<String>,
        handler: impl CommandHandler,
    ) -> Result<(), RegistryError> {
        self.commands.register(name, handler).map(|_| ())
    }

    pub fn register_action(
        &mut self,
        callback_id: impl Into<String>,
        endpoint_suffix: impl Into<String>,
        handler: impl ActionHandler,
    ) -> Result<(), RegistryError> {
        self.actions.register(callback_id, endpoint_suffix, handler)
    }

    /// Serves one request. Background work is detached.
    pub async fn handle(&self, request: Request) -> Response<Body> {
        self.dispatch(request).await.response
    }

    /// Serves one request and hands back any background task it started.
    pub async fn dispatch(&self, request: Request) -> Dispatched {
        let path = request.uri().path().to_string();

        let is_command = path == self.endpoint;
        let action = if is_command {
            None
        } else {
            match self.actions.find_by_path(&self.endpoint, &path) {
                Some(action) => Some(action),
                None => {
                    debug!(path = %path, "no endpoint at path");
                    return Dispatched::status(StatusCode::NOT_FOUND);
                }
            }
        };

        if *request.method() != Method::POST {
            return Dispatched::status(StatusCode::METHOD_NOT_ALLOWED);
        }

        let body = request.body().to_vec();
        let timestamp = header(&request, TIMESTAMP_HEADER);
        let signature = header(&request, SIGNATURE_HEADER);

        if let Err(err) = self.verifier.verify(timestamp, signature, &body) {
            warn!(path = %path, reason = %err, "rejected request");
            return Dispatched::status(StatusCode::BAD_REQUEST);
        }

        match action {
            None => self.dispatch_command(&body).await,
            Some(action) => {
                self.dispatch_action(&action.callback_id, action.handler(), &body)
            }
        }
    }

    async fn dispatch_command(&self, body: &[u8]) -> Dispatched {
        let command = match form::decode_command(body) {
            Ok(command) => command,
            Err(err) => {
                error!(error = %err, "failed to decode command body");
                return match self.mode {
                    DispatchMode::Inline => Dispatched::status(StatusCode::INTERNAL_SERVER_ERROR),
                    DispatchMode::Deferred => Dispatched::status(StatusCode::OK),
                };
            }
        };

        let Some(handler) = self.commands.get(&command.command) else {
            info!(command = %command.command, "no handler registered for command");
            return Dispatched::status(StatusCode::OK);
        };

        match self.mode {
            DispatchMode::Inline => Dispatched::reply(self.run_inline(handler, command).await),
            DispatchMode::Deferred => {
                let poster = Arc::clone(&self.poster);
                let timeout = self.handler_timeout;
                let task = tokio::spawn(run_deferred(handler, command, poster, timeout));
                Dispatched {
                    response: empty(StatusCode::OK),
                    task: Some(task),
                }
            }
        }
    }

    async fn run_inline(
        &self,
        handler: Arc<dyn CommandHandler>,
        command: SlackCommand,
    ) -> Response<Body> {
        let name = command.command.clone();
        let reply = match run_command(handler, command, self.handler_timeout).await {
            Ok(reply) => reply,
            Err(err) => {
                error!(command = %name, error = %err, "command handler failed");
                return empty(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        match response::inline(reply.as_ref()) {
            Ok(response) => response,
            Err(err) => {
                error!(command = %name, error = %err, "failed to encode response");
                empty(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }

    fn dispatch_action(
        &self,
        callback_id: &str,
        handler: Arc<dyn ActionHandler>,
        body: &[u8],
    ) -> Dispatched {
        let action = match form::decode_action(body) {
            Ok(action) => action,
            Err(err) => {
                error!(callback_id, error = %err, "failed to decode action payload");
                return Dispatched::status(StatusCode::INTERNAL_SERVER_ERROR);
            }
        };

        if action.callback_id != callback_id {
            info!(
                expected = callback_id,
                received = %action.callback_id,
                "action callback_id does not match endpoint"
            );
            return Dispatched::status(StatusCode::OK);
        }

        let task = tokio::spawn(run_action(handler, action, self.handler_timeout));
        Dispatched {
            response: empty(StatusCode::OK),
            task: Some(task),
        }
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("endpoint", &self.endpoint)
            .field("mode", &self.mode)
            .field("handler_timeout", &self.handler_timeout)
            .field("commands", &self.commands)
            .field("actions", &self.actions)
            .finish_non_exhaustive()
    }
}

fn header<'a>(request: &'a Request, name: &str) -> &'a str {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

async fn run_command(
    handler: Arc<dyn CommandHandler>,
    command: SlackCommand,
    timeout: Option<Duration>,
) -> Result<Option<SlackResponse>, TaskError> {
    let call = handler.call(command);
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| TaskError::TimedOut(limit))?,
        None => call.await,
    };
    result.map_err(TaskError::Handler)
}

async fn run_deferred(
    handler: Arc<dyn CommandHandler>,
    command: SlackCommand,
    poster: Arc<dyn ResponsePoster>,
    timeout: Option<Duration>,
) -> Result<(), TaskError> {
    let name = command.command.clone();
    let response_url = command.response_url.clone();

    let outcome = async {
        let reply = run_command(handler, command, timeout).await?;
        response::deliver(poster.as_ref(), &response_url, reply.as_ref()).await?;
        Ok::<(), TaskError>(())
    }
    .await;

    if let Err(err) = &outcome {
        error!(command = %name, error = %err, "deferred command failed");
    }
    outcome
}

async fn run_action(
    handler: Arc<dyn ActionHandler>,
    action: SlackAction,
    timeout: Option<Duration>,
) -> Result<(), TaskError> {
    let callback_id = action.callback_id.clone();
    let call = handler.call(action);
    let result = match timeout {
        Some(limit) => tokio::time::timeout(limit, call)
            .await
            .map_err(|_| TaskError::TimedOut(limit))
            .and_then(|r| r.map_err(TaskError::Handler)),
        None => call.await.map_err(TaskError::Handler),
    };

    if let Err(err) = &result {
        error!(callback_id = %callback_id, error = %err, "action handler failed");
    }
    result
}
