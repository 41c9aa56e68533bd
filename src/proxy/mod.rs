//! Streaming proxy in front of an ADK server.
//!
//! Every route forwards to the same path on the backend and passes status
//! and body through. Transport failures become a 500 with `{"error": ...}`,
//! except on `/run_sse`, which always answers 200 with an event stream and
//! reports failures as a single `data: {"error": true, ...}` event.
//!
//! # Module structure
//! - `server` - router, shared state and listener
//! - `routes` - the route handlers

mod routes;
mod server;

pub use routes::sse_error_event;
pub use server::{router, start_proxy_server_on, ProxyState};
