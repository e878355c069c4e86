pub mod migrations;
pub mod store;

pub use store::{reminder_window, ChatSummary, Store};
