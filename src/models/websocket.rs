use chrono::{ DateTime, Utc };
use serde::{ Serialize, Deserialize };
use super::chat::{ ChatMessage, ConversationId, SearchHit };

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "start")]
    Start,
    #[serde(rename = "chat")] Chat {
        content: String,
    },
    #[serde(rename = "history")] History {
        #[serde(default)]
        conversation_id: Option<ConversationId>,
    },
    #[serde(rename = "search")] Search {
        query: String,
        #[serde(default)]
        limit: Option<i64>,
    },
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "started")] Started {
        conversation_id: ConversationId,
    },
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "response")] Response {
        conversation_id: ConversationId,
        content: String,
        timestamp: DateTime<Utc>,
        degraded: bool,
    },
    #[serde(rename = "history")] History {
        conversation_id: Option<ConversationId>,
        messages: Vec<ChatMessage>,
    },
    #[serde(rename = "search_results")] SearchResults {
        results: Vec<SearchHit>,
    },
    #[serde(rename = "error")] Error {
        message: String,
    },
}
