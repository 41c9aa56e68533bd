//! Client, streaming proxy and terminal chat for ADK agent servers.
//!
//! The core is the `/run_sse` pipeline: [`sse::SseDecoder`] turns response
//! bytes into payloads, [`sse::classify`] decides what each payload means,
//! and [`state::ConversationState`] folds the result into the displayed
//! conversation. [`app::ChatApp`] drives that pipeline for one session.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod media;
pub mod models;
pub mod proxy;
pub mod sse;
pub mod state;
pub mod traits;

pub use app::{ChatApp, SendOutcome};
pub use client::AdkClient;
pub use config::ChatConfig;
pub use error::{AdkError, AdkResult};
