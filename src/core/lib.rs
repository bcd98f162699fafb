//! Verification and dispatch of inbound slash-command and interactive-action
//! webhooks.
//!
//! ```ignore
//! use std::sync::Arc;
//! use slack_command_core::{App, HandlerResult, SlackCommand, SlackResponse};
//!
//! let mut app = App::new(signing_secret, "/slack");
//! app.register_command("/ping", |_command: SlackCommand| async {
//!     HandlerResult::Ok(Some(SlackResponse::text("pong")))
//! })?;
//!
//! let app = Arc::new(app);
//! lambda_http::run(lambda_http::service_fn(move |request| {
//!     let app = Arc::clone(&app);
//!     async move { Ok::<_, lambda_http::Error>(app.handle(request).await) }
//! }))
//! .await
//! ```
//!
//! All registration happens before the app is shared for serving; the
//! registries are read-only afterwards.

pub mod action;
pub mod command;
pub mod dispatch;
pub mod error;
pub mod form;
pub mod response;
pub mod signature;
pub mod types;

pub use action::{ActionHandler, ActionRegistry, DEFAULT_ACTION_CAPACITY};
pub use command::{CommandHandler, CommandRegistry, HandlerResult};
pub use dispatch::{App, DispatchMode, Dispatched, SIGNATURE_HEADER, TIMESTAMP_HEADER};
pub use error::{BoxError, DecodeError, DeliveryError, RegistryError, TaskError, VerifyError};
pub use response::{Delivery, HttpPoster, ResponsePoster, DEFAULT_POST_TIMEOUT};
pub use signature::{sign, SignatureVerifier, REPLAY_WINDOW_SECS};
pub use types::{
    ActionChannel, ActionItem, ActionTeam, ActionUser, Attachment, Field, ResponseType,
    SelectedOption, SlackAction, SlackCommand, SlackResponse,
};
