mod memory;

pub use memory::InMemoryHistoryStore;

use async_trait::async_trait;
use std::cmp::Ordering;
use crate::models::chat::{ ChatMessage, ConversationId, SearchHit, StoredRecord };

pub const DEFAULT_SEARCH_LIMIT: usize = 5;

/// Append-only record storage. Records come back in insertion order.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, record: StoredRecord);

    async fn records_for(&self, conversation_id: &ConversationId) -> Vec<StoredRecord>;

    async fn all_records(&self) -> Vec<StoredRecord>;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Messages of one conversation, oldest first. Equal timestamps keep insertion order.
pub async fn conversation_history(
    store: &dyn HistoryStore,
    conversation_id: &ConversationId
) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = store
        .records_for(conversation_id).await
        .into_iter()
        .map(|record| record.message)
        .collect();
    messages.sort_by_key(|msg| msg.timestamp);
    messages
}

/// Case-insensitive substring search over every stored message.
pub async fn search_history(store: &dyn HistoryStore, query: &str, limit: usize) -> Vec<SearchHit> {
    if limit == 0 {
        return Vec::new();
    }

    let needle = query.to_lowercase();
    let mut results: Vec<SearchHit> = store
        .all_records().await
        .into_iter()
        .filter(|record| record.message.content.to_lowercase().contains(&needle))
        .map(|record| SearchHit {
            conversation_id: record.conversation_id,
            message: record.message,
            score: 1.0,
        })
        .collect();

    results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    results.truncate(limit);
    results
}

/// Adapters take signed limits from clients; anything below one means no results.
pub fn clamp_limit(limit: Option<i64>, default: usize) -> usize {
    match limit {
        Some(n) if n <= 0 => 0,
        Some(n) => usize::try_from(n).unwrap_or(usize::MAX),
        None => default,
    }
}

pub fn format_history_for_prompt(messages: &[ChatMessage]) -> String {
    if messages.is_empty() {
        return String::new();
    }
    let mut result = String::from("Previous conversation:\n");
    for msg in messages {
        result.push_str(&format!("{}: {}\n", msg.role.display_name(), msg.content));
    }

    result
}
