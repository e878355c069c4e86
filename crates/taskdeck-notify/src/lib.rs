//! Notification creation and delivery.
//!
//! The dispatcher persists an in-app notification first and only then
//! hands the optional email to a background task, so callers never block
//! on (or fail because of) the mail path.

mod background;
mod dispatcher;
mod templates;

pub use background::BackgroundTasks;
pub use dispatcher::{CreateNotification, Dispatcher};
pub use templates::{email_content, EmailContent};
