//! Slack webhook surface for switchboard.
//!
//! - **Payloads** (`payload`, `topics`) - typed view over inbound callbacks and
//!   the ordered topic keys each one matches
//! - **Dispatch** (`registry`, `events`) - handler registration and concurrent
//!   fan-out with per-handler outcomes
//! - **Slack API** (`client`, `api_error`, `bot`) - OAuth exchange, Web API calls
//!   and the per-dispatch `BotContext`
//! - **Routing** (`install`, `app`) - OAuth install flow and the request router
//!
//! ```text
//! WebhookRequest → SlackApp ─ GET ──→ InstallFlow → SlackApi + AuthorizationStore
//!                     └───── POST ─→ verify → challenge → lookup → EventDispatcher
//!                                                                      ↓
//!                                                     HandlerRegistry → handlers
//! ```

pub mod api_error;
pub mod app;
pub mod bot;
pub mod client;
pub mod events;
pub mod install;
pub mod payload;
pub mod registry;
pub mod topics;

pub use app::{AppSettings, RequestMethod, SlackApp, WebhookError, WebhookRequest, WebhookResponse};
pub use bot::BotContext;
pub use client::{OAuthQuery, SlackApi, SlackWebClient};
pub use events::{default_registry, DispatchReport, EventDispatcher, HandlerError, Notification};
pub use registry::{EventHandler, HandlerRegistry};
