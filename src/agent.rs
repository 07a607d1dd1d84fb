use crate::cli::Args;
use crate::history::{
    conversation_history,
    format_history_for_prompt,
    search_history,
    HistoryStore,
    InMemoryHistoryStore,
};
use crate::llm::{ LlmConfig, LlmType };
use crate::llm::chat::{ new_client as new_chat_client, validate_prompt, ChatClient, CompletionError };
use crate::models::chat::{
    ChatMessage,
    ConversationId,
    Reply,
    ReplyOutcome,
    Role,
    SearchHit,
    StoredRecord,
};
use crate::session::Session;

use log::{ info, error, debug };
use std::collections::HashSet;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Session manager: ties a completion client to a history store.
///
/// Shared across adapters behind an `Arc`; per-caller state lives in [`Session`].
pub struct ChatAgent {
    chat_client: Arc<dyn ChatClient>,
    history_store: Arc<dyn HistoryStore>,
    conversations: RwLock<HashSet<ConversationId>>,
    history_context_len: usize,
}

impl ChatAgent {
    pub fn new(chat_client: Arc<dyn ChatClient>, history_store: Arc<dyn HistoryStore>) -> Self {
        Self {
            chat_client,
            history_store,
            conversations: RwLock::new(HashSet::new()),
            history_context_len: 0,
        }
    }

    /// Prefix prompts with up to `len` earlier messages of the session. 0 sends the bare text.
    pub fn with_history_context(mut self, len: usize) -> Self {
        self.history_context_len = len;
        self
    }

    pub fn from_args(args: &Args) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let chat_config = LlmConfig {
            llm_type: args.chat_llm_type.parse::<LlmType>()?,
            api_key: Some(args.chat_api_key.clone()).filter(|k| !k.is_empty()),
            completion_model: args.chat_model.clone(),
            base_url: args.chat_base_url.clone(),
            max_tokens: args.chat_max_tokens,
            timeout: Duration::from_secs(args.chat_timeout_secs),
        };
        let chat_client = new_chat_client(&chat_config)?;
        info!(
            "Chat client configured: Type={}, Model={}, BaseURL={}",
            chat_client.get_llm_type(),
            chat_client.get_model(),
            chat_client.get_base_url().as_deref().unwrap_or("adapter default")
        );

        let history_store: Arc<dyn HistoryStore> = Arc::new(InMemoryHistoryStore::new());
        info!("Chat history will be kept in process memory");

        Ok(Self::new(chat_client, history_store).with_history_context(args.history_context_len))
    }

    pub async fn start_new_conversation(&self, session: &mut Session) -> ConversationId {
        let conversation_id = ConversationId::generate();
        self.conversations.write().await.insert(conversation_id.clone());
        session.reset(conversation_id.clone());
        info!("Started conversation {}", conversation_id);
        conversation_id
    }

    /// A session bound to a conversation started earlier, or `None` if the id was never issued.
    /// The session starts with the stored messages so prompt context carries over.
    pub async fn resume_conversation(&self, conversation_id: &ConversationId) -> Option<Session> {
        if !self.conversations.read().await.contains(conversation_id) {
            return None;
        }
        let messages = conversation_history(self.history_store.as_ref(), conversation_id).await;
        debug!("Resuming conversation {} with {} stored message(s)", conversation_id, messages.len());
        Some(Session::resume(conversation_id.clone(), messages))
    }

    pub async fn send(&self, session: &mut Session, text: &str) -> Reply {
        let conversation_id = match session.conversation_id().cloned() {
            Some(id) => id,
            None => self.start_new_conversation(session).await,
        };

        let prompt = self.build_prompt(session, text);
        self.store_message(session, &conversation_id, Role::User, text).await;

        let result = match validate_prompt(text) {
            Ok(()) => self.chat_client.complete(&prompt).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(resp) => {
                let message = self.store_message(
                    session,
                    &conversation_id,
                    Role::Assistant,
                    &resp.response
                ).await;
                Reply {
                    conversation_id,
                    content: message.content,
                    timestamp: message.timestamp,
                    outcome: ReplyOutcome::Completed,
                }
            }
            Err(e) => self.degraded_reply(session, conversation_id, e),
        }
    }

    pub async fn history(
        &self,
        session: &Session,
        conversation_id: Option<&ConversationId>
    ) -> Vec<ChatMessage> {
        match conversation_id.or(session.conversation_id()) {
            Some(id) => conversation_history(self.history_store.as_ref(), id).await,
            None => Vec::new(),
        }
    }

    pub async fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        let hits = search_history(self.history_store.as_ref(), query, limit).await;
        debug!("Search '{}' (limit {}) matched {} message(s)", query, limit, hits.len());
        hits
    }

    fn build_prompt(&self, session: &Session, text: &str) -> String {
        if self.history_context_len == 0 || session.messages().is_empty() {
            return text.to_string();
        }
        let earlier = session.messages();
        let start = earlier.len().saturating_sub(self.history_context_len);
        format!("{}\nUser: {}", format_history_for_prompt(&earlier[start..]), text)
    }

    async fn store_message(
        &self,
        session: &mut Session,
        conversation_id: &ConversationId,
        role: Role,
        content: &str
    ) -> ChatMessage {
        let message = ChatMessage::new(role, content, session.next_timestamp());
        self.history_store.append(StoredRecord {
            conversation_id: conversation_id.clone(),
            message: message.clone(),
        }).await;
        session.push(message.clone());
        message
    }

    fn degraded_reply(
        &self,
        session: &mut Session,
        conversation_id: ConversationId,
        err: CompletionError
    ) -> Reply {
        error!("Error communicating with completion service ({}): {}", conversation_id, err);
        Reply {
            conversation_id,
            content: format!("Error: {}", err),
            timestamp: session.next_timestamp(),
            outcome: ReplyOutcome::Degraded {
                kind: err.kind(),
                retryable: err.is_retryable(),
            },
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use super::test_support::agent_with;
    use crate::models::chat::FailureKind;

    #[tokio::test]
    async fn send_stores_user_and_assistant_messages() {
        let (agent, _) = agent_with(vec![Ok("Hi there".into())]);
        let mut session = Session::new();
        agent.start_new_conversation(&mut session).await;

        let reply = agent.send(&mut session, "Hello").await;
        assert_eq!(reply.content, "Hi there");
        assert_eq!(reply.outcome, ReplyOutcome::Completed);

        let history = agent.history(&session, None).await;
        assert_eq!(history.len(), 2);
        assert_eq!((history[0].role, history[0].content.as_str()), (Role::User, "Hello"));
        assert_eq!((history[1].role, history[1].content.as_str()), (Role::Assistant, "Hi there"));
        assert!(history[0].timestamp <= history[1].timestamp);
        assert_eq!(history[1].timestamp, reply.timestamp);
    }

    #[tokio::test]
    async fn send_without_conversation_starts_one() {
        let (agent, _) = agent_with(vec![Ok("ok".into())]);
        let mut session = Session::new();
        assert!(agent.history(&session, None).await.is_empty());

        let reply = agent.send(&mut session, "first").await;
        assert_eq!(session.conversation_id(), Some(&reply.conversation_id));
        assert!(agent.resume_conversation(&reply.conversation_id).await.is_some());
        assert_eq!(agent.history(&session, None).await.len(), 2);
    }

    #[tokio::test]
    async fn failed_completion_returns_degraded_reply_and_keeps_only_user_message() {
        let (agent, _) = agent_with(vec![Err(CompletionError::Transport("connection refused".into()))]);
        let mut session = Session::new();
        agent.start_new_conversation(&mut session).await;

        let reply = agent.send(&mut session, "x").await;
        assert!(reply.content.starts_with("Error: "));
        assert!(reply.is_degraded());
        assert_eq!(reply.outcome, ReplyOutcome::Degraded {
            kind: FailureKind::Transport,
            retryable: true,
        });

        let history = agent.history(&session, None).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "x");
    }

    #[tokio::test]
    async fn blank_prompt_is_rejected_without_calling_provider() {
        let (agent, client) = agent_with(vec![]);
        let mut session = Session::new();

        let reply = agent.send(&mut session, "   ").await;
        assert_eq!(reply.outcome, ReplyOutcome::Degraded {
            kind: FailureKind::Validation,
            retryable: false,
        });
        assert!(client.prompts.lock().await.is_empty());
        assert_eq!(agent.history(&session, None).await.len(), 1);
    }

    #[tokio::test]
    async fn starting_a_conversation_clears_the_active_history() {
        let (agent, _) = agent_with(vec![]);
        let mut session = Session::new();
        let first = agent.start_new_conversation(&mut session).await;
        agent.send(&mut session, "one").await;

        let second = agent.start_new_conversation(&mut session).await;
        assert_ne!(first, second);
        assert!(session.messages().is_empty());
        assert!(agent.history(&session, None).await.is_empty());
        assert_eq!(agent.history(&session, Some(&first)).await.len(), 2);
    }

    #[tokio::test]
    async fn unknown_conversations_cannot_be_resumed() {
        let (agent, _) = agent_with(vec![]);
        assert!(agent.resume_conversation(&"nope".into()).await.is_none());
    }

    #[tokio::test]
    async fn bare_prompt_by_default_and_context_when_enabled() {
        let (agent, client) = agent_with(vec![Ok("Hi".into()), Ok("Fine".into())]);
        let mut session = Session::new();
        agent.send(&mut session, "Hello").await;
        agent.send(&mut session, "How are you?").await;
        assert_eq!(*client.prompts.lock().await, vec!["Hello", "How are you?"]);

        let (agent, client) = agent_with(vec![Ok("Hi".into()), Ok("Fine".into())]);
        let agent = agent.with_history_context(2);
        let mut session = Session::new();
        agent.send(&mut session, "Hello").await;
        agent.send(&mut session, "How are you?").await;
        let prompts = client.prompts.lock().await;
        assert_eq!(prompts[0], "Hello");
        assert_eq!(
            prompts[1],
            "Previous conversation:\nUser: Hello\nAssistant: Hi\n\nUser: How are you?"
        );
    }

    #[tokio::test]
    async fn resumed_conversation_keeps_prompt_context() {
        let (agent, client) = agent_with(vec![Ok("Hi".into()), Ok("Fine".into())]);
        let agent = agent.with_history_context(6);
        let mut first = Session::new();
        let id = agent.start_new_conversation(&mut first).await;
        let greeting = agent.send(&mut first, "Hello").await;

        let mut resumed = agent.resume_conversation(&id).await.unwrap();
        assert_eq!(resumed.messages().len(), 2);
        let reply = agent.send(&mut resumed, "How are you?").await;
        assert!(reply.timestamp >= greeting.timestamp);

        let prompts = client.prompts.lock().await;
        assert_eq!(
            prompts[1],
            "Previous conversation:\nUser: Hello\nAssistant: Hi\n\nUser: How are you?"
        );
    }

    #[tokio::test]
    async fn mixed_outcomes_keep_pairs_only_for_successes() {
        let (agent, client) = agent_with(
            vec![
                Ok("a1".into()),
                Err(CompletionError::Transport("reset".into())),
                Ok("a3".into()),
                Err(CompletionError::Validation("HTTP 400 Bad Request".into())),
                Ok("a6".into())
            ]
        );
        let mut session = Session::new();
        let outcomes: Vec<bool> = {
            let mut out = Vec::new();
            for text in ["q1", "q2", "q3", "q4", "   ", "q6"] {
                out.push(agent.send(&mut session, text).await.is_degraded());
            }
            out
        };
        assert_eq!(outcomes, vec![false, true, false, true, true, false]);
        assert_eq!(client.prompts.lock().await.len(), 5);

        let history = agent.history(&session, None).await;
        let turns: Vec<(Role, &str)> = history
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect();
        assert_eq!(
            turns,
            vec![
                (Role::User, "q1"),
                (Role::Assistant, "a1"),
                (Role::User, "q2"),
                (Role::User, "q3"),
                (Role::Assistant, "a3"),
                (Role::User, "q4"),
                (Role::User, "   "),
                (Role::User, "q6"),
                (Role::Assistant, "a6")
            ]
        );
        assert!(history.windows(2).all(|pair| pair[0].timestamp <= pair[1].timestamp));
    }

    #[tokio::test]
    async fn search_finds_messages_across_conversations() {
        let (agent, _) = agent_with(vec![Ok("sure".into()), Ok("ok".into())]);
        let mut session = Session::new();
        agent.send(&mut session, "explain quantum computing").await;
        agent.start_new_conversation(&mut session).await;
        agent.send(&mut session, "explain gravity").await;

        let hits = agent.search("quantum", 5).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].message.content, "explain quantum computing");
        assert!(agent.search("explain", 0).await.is_empty());
        assert_eq!(agent.search("EXPLAIN", 1).await.len(), 1);
    }
}
