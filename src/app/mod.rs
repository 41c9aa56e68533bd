//! The chat application: session lifecycle and the streaming send flow.
//!
//! `ChatApp` is shared between the input loop and whatever renders the
//! conversation. Every method takes `&self`. Conversation snapshots are
//! published on a `watch` channel after each merge step.
//!
//! # Module structure
//! - `session` - app selection, connect, new session, trace
//! - `stream` - `send()`: run request, decode, classify, merge
//! - `cancel` - cancellation of the in-flight send

mod cancel;
mod session;
mod stream;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::client::AdkClient;
use crate::config::ChatConfig;
use crate::models::new_session_id;
use crate::state::{ConversationState, MergeEvent};

pub use stream::SendOutcome;

/// System notices shown during connect.
pub const CONNECTING_MESSAGE: &str = "Connecting...";
pub const CONNECTED_MESSAGE: &str = "Connected. Session ready.";
pub const CONNECTION_FAILED_MESSAGE: &str = "Connection failed.";

/// Which app and session the conversation belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionInfo {
    /// Apps offered by the backend after filtering
    pub apps: Vec<String>,
    pub selected_app: Option<String>,
    pub session_id: String,
    pub connected: bool,
}

pub struct ChatApp {
    client: AdkClient,
    user: String,
    allowed_apps: Vec<String>,
    session: Mutex<SessionInfo>,
    state_tx: watch::Sender<ConversationState>,
    /// Re-entrancy guard: at most one send in flight
    sending: AtomicBool,
    /// Token of the in-flight send
    active: Mutex<Option<CancellationToken>>,
    /// Parent of every send token; cancelled on drop
    root: CancellationToken,
}

impl std::fmt::Debug for ChatApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatApp")
            .field("client", &self.client)
            .field("user", &self.user)
            .field("session", &self.session_info())
            .field("sending", &self.is_sending())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ChatApp {
    pub fn new(client: AdkClient, config: &ChatConfig) -> Self {
        let (state_tx, _) = watch::channel(ConversationState::new());
        Self {
            client,
            user: config.user.clone(),
            allowed_apps: config.allowed_apps.clone(),
            session: Mutex::new(SessionInfo {
                session_id: new_session_id(),
                ..SessionInfo::default()
            }),
            state_tx,
            sending: AtomicBool::new(false),
            active: Mutex::new(None),
            root: CancellationToken::new(),
        }
    }

    pub fn client(&self) -> &AdkClient {
        &self.client
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Receive a snapshot after every conversation change.
    pub fn subscribe(&self) -> watch::Receiver<ConversationState> {
        self.state_tx.subscribe()
    }

    /// Current conversation.
    pub fn snapshot(&self) -> ConversationState {
        self.state_tx.borrow().clone()
    }

    pub fn session_info(&self) -> SessionInfo {
        lock(&self.session).clone()
    }

    pub fn is_sending(&self) -> bool {
        self.sending.load(Ordering::SeqCst)
    }

    /// Run one step of the fold and publish the result.
    fn apply(&self, event: MergeEvent) {
        self.state_tx
            .send_modify(|state| *state = std::mem::take(state).apply(event));
    }
}

impl Drop for ChatApp {
    fn drop(&mut self) {
        self.root.cancel();
    }
}
