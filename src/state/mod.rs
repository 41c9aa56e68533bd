//! Conversation state.
//!
//! The message list is rebuilt by folding [`MergeEvent`]s into a
//! [`ConversationState`]. Each step consumes the previous state and returns
//! the next one; the list and the per-author bubble index are never mutated
//! from outside the fold.

mod conversation;

pub use conversation::{reduce, ConversationState, MergeEvent, CANCELLED_MESSAGE};
