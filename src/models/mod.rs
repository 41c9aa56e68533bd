//! Wire and display models for the ADK server API.

mod apps;
mod message;
mod request;
mod session;
pub mod trace;

pub use apps::{filter_apps, format_agent_name, DEFAULT_ALLOWED_APPS};
pub use message::{DisplayMessage, MessageRole};
pub use request::{CreateSessionRequest, NewMessage, RunRequest, TextPart};
pub use session::{new_session_id, Session, SessionKey};
pub use trace::{build_invocation_tree, format_duration, InvocationNode, Span, TraceResponse};
