//! Push notification backends for dispatch. Best-effort by contract: the
//! Dispatcher catches backend errors and reports `notification_sent: false`
//! instead of failing the request.

pub mod backend;
pub mod noop;
pub mod webhook;

pub use backend::{DispatchNote, PushBackend};
pub use noop::NoopPush;
pub use webhook::WebhookPush;
