use taskdeck_chat::ChatService;
use taskdeck_notify::Dispatcher;
use taskdeck_store::Store;

/// Shared application state accessible from all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub chat: ChatService,
    pub dispatcher: Dispatcher,
}
