pub mod mailer;
pub mod queue;
pub mod transport;

pub use mailer::{Mailer, MailerConfig, SendOutcome, SweepStats};
pub use queue::{EmailQueue, QueuedEmail};
pub use transport::{Email, HttpMailTransport, MailTransport, SendError};
