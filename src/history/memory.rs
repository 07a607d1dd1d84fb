use async_trait::async_trait;
use log::debug;
use tokio::sync::RwLock;
use crate::history::HistoryStore;
use crate::models::chat::{ ConversationId, StoredRecord };

/// Process-local store. Unbounded, nothing is evicted or written to disk.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    records: RwLock<Vec<StoredRecord>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, record: StoredRecord) {
        debug!(
            "Storing {} message for conversation {}",
            record.message.role,
            record.conversation_id
        );
        self.records.write().await.push(record);
    }

    async fn records_for(&self, conversation_id: &ConversationId) -> Vec<StoredRecord> {
        self.records
            .read().await
            .iter()
            .filter(|record| &record.conversation_id == conversation_id)
            .cloned()
            .collect()
    }

    async fn all_records(&self) -> Vec<StoredRecord> {
        self.records.read().await.clone()
    }

    async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::{ ChatMessage, Role };
    use chrono::Utc;

    #[tokio::test]
    async fn append_does_not_dedup() {
        let store = InMemoryHistoryStore::new();
        let record = StoredRecord {
            conversation_id: "c1".into(),
            message: ChatMessage::new(Role::User, "same", Utc::now()),
        };
        store.append(record.clone()).await;
        store.append(record.clone()).await;

        assert_eq!(store.len().await, 2);
        assert_eq!(store.records_for(&"c1".into()).await, vec![record.clone(), record]);
    }

    #[tokio::test]
    async fn filters_by_conversation() {
        let store = InMemoryHistoryStore::new();
        assert!(store.is_empty().await);
        for (id, content) in [("a", "one"), ("b", "two"), ("a", "three")] {
            store.append(StoredRecord {
                conversation_id: id.into(),
                message: ChatMessage::new(Role::User, content, Utc::now()),
            }).await;
        }

        let a: Vec<String> = store
            .records_for(&"a".into()).await
            .into_iter()
            .map(|r| r.message.content)
            .collect();
        assert_eq!(a, vec!["one", "three"]);
        assert_eq!(store.all_records().await.len(), 3);
    }
}
