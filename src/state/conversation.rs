use std::collections::HashMap;

use tracing::trace;

use crate::models::{DisplayMessage, MessageRole};
use crate::sse::{ContentChunk, StreamEvent};

/// System message appended when the user cancels a streaming send.
pub const CANCELLED_MESSAGE: &str = "Request cancelled.";

/// Input to one step of the fold.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeEvent {
    /// Clear the conversation, optionally leaving one system notice
    Reset(Option<String>),
    /// A send began: echo the user's text and show the loading placeholder
    RequestStarted { user_text: Option<String> },
    /// A classified event from the response stream
    Stream(StreamEvent),
    /// The response stream ended normally
    StreamEnded,
    /// The request failed at the transport level
    ConnectionFailed(String),
    /// The user cancelled the send
    Cancelled,
    /// Append a system notice
    Notice(String),
}

/// Ordered message list plus the bubble index of the current request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationState {
    messages: Vec<DisplayMessage>,
    /// Author -> position of that author's open bubble in this request
    author_index: HashMap<String, usize>,
    next_id: u64,
    /// Stream events are merged only while a request is open and no error
    /// has ended it
    accepting: bool,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[DisplayMessage] {
        &self.messages
    }

    pub fn is_accepting(&self) -> bool {
        self.accepting
    }

    pub fn has_loading(&self) -> bool {
        self.messages.iter().any(|m| m.loading)
    }

    /// Position of `author`'s open bubble in the current request.
    pub fn bubble_position(&self, author: &str) -> Option<usize> {
        self.author_index.get(author).copied()
    }

    /// Apply one event and return the next state.
    pub fn apply(mut self, event: MergeEvent) -> Self {
        trace!(?event, "Applying merge event");
        match event {
            MergeEvent::Reset(notice) => {
                self.messages.clear();
                self.author_index.clear();
                self.accepting = false;
                if let Some(text) = notice {
                    self.push_system(text);
                }
            }
            MergeEvent::RequestStarted { user_text } => {
                self.author_index.clear();
                self.remove_loading();
                if let Some(text) = user_text {
                    let id = self.take_id();
                    self.messages.push(DisplayMessage::user(id, text));
                }
                let id = self.take_id();
                self.messages.push(DisplayMessage::loading(id));
                self.accepting = true;
            }
            MergeEvent::Stream(stream_event) => self.apply_stream_event(stream_event),
            MergeEvent::StreamEnded => {
                self.remove_loading();
                self.accepting = false;
            }
            MergeEvent::ConnectionFailed(text) => {
                self.remove_loading();
                if self.accepting {
                    self.push_system(text);
                }
                self.accepting = false;
            }
            MergeEvent::Cancelled => {
                self.remove_loading();
                if self.accepting {
                    self.push_system(CANCELLED_MESSAGE);
                }
                self.accepting = false;
            }
            MergeEvent::Notice(text) => self.push_system(text),
        }
        self
    }

    fn apply_stream_event(&mut self, event: StreamEvent) {
        if !self.accepting {
            return;
        }
        match event {
            StreamEvent::Chunk(chunk) | StreamEvent::RawMedia(chunk) => self.merge_chunk(chunk),
            StreamEvent::Error(error) => {
                self.remove_loading();
                self.push_system(error.display_text());
                self.accepting = false;
            }
            StreamEvent::Ignore => {}
        }
    }

    fn merge_chunk(&mut self, chunk: ContentChunk) {
        self.remove_loading();

        let open = self
            .author_index
            .get(&chunk.author)
            .copied()
            .filter(|&p| self.messages.get(p).is_some_and(|m| m.is_from(&chunk.author)));

        match open {
            Some(position) => {
                let message = &mut self.messages[position];
                message.text.push_str(&chunk.text);
                if chunk.grounding.is_some() {
                    message.grounding = chunk.grounding;
                }
            }
            None => {
                let id = self.take_id();
                let mut message = DisplayMessage::agent(id, chunk.author.clone(), chunk.text);
                message.grounding = chunk.grounding;
                self.author_index.insert(chunk.author, self.messages.len());
                self.messages.push(message);
            }
        }
    }

    fn push_system(&mut self, text: impl Into<String>) {
        let id = self.take_id();
        self.messages.push(DisplayMessage::system(id, text));
    }

    /// Remove every loading placeholder, keeping bubble positions valid.
    fn remove_loading(&mut self) {
        while let Some(position) = self.messages.iter().position(|m| m.loading) {
            self.remove_at(position);
        }
    }

    fn remove_at(&mut self, position: usize) {
        self.messages.remove(position);
        self.author_index.retain(|_, p| *p != position);
        for p in self.author_index.values_mut() {
            if *p > position {
                *p -= 1;
            }
        }
    }

    fn take_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Messages with the given role, in order.
    pub fn messages_with_role(&self, role: MessageRole) -> impl Iterator<Item = &DisplayMessage> {
        self.messages.iter().filter(move |m| m.role == role)
    }
}

/// Fold a sequence of events into `initial`.
pub fn reduce<I>(events: I, initial: ConversationState) -> ConversationState
where
    I: IntoIterator<Item = MergeEvent>,
{
    events.into_iter().fold(initial, ConversationState::apply)
}
