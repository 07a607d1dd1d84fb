use chrono::{ DateTime, Utc };
use crate::models::chat::{ ChatMessage, ConversationId };

/// Per-caller conversation state: which conversation is current and the messages
/// exchanged in it since it was started or resumed.
#[derive(Debug, Clone, Default)]
pub struct Session {
    conversation_id: Option<ConversationId>,
    messages: Vec<ChatMessage>,
    last_timestamp: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Picks up a stored conversation. `messages` must be oldest first.
    pub(crate) fn resume(conversation_id: ConversationId, messages: Vec<ChatMessage>) -> Self {
        Self {
            conversation_id: Some(conversation_id),
            last_timestamp: messages.last().map(|msg| msg.timestamp),
            messages,
        }
    }

    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    /// Messages exchanged through this session in the current conversation.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub(crate) fn reset(&mut self, conversation_id: ConversationId) {
        self.conversation_id = Some(conversation_id);
        self.messages.clear();
    }

    pub(crate) fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Wall-clock time, never earlier than the previous stamp issued by this session.
    pub(crate) fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }
}
