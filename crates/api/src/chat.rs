use std::fmt::{self, Display};
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier of a conversation persisted by the backend.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ConversationId(pub u64);

impl Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a message.
///
/// Messages persisted by the backend carry the backend's identifier.
/// Messages synthesized locally carry a provisional one that never
/// collides with another message in the same conversation.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MessageId(pub u64);

/// Who wrote a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person chatting.
    User,
    /// The generated reply.
    Assistant,
}

/// A citation attached to an assistant message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// The cited text.
    pub content: String,
    /// Extra information the retrieval pipeline attached, if any.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// A single chat message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Identifier, unique within the conversation.
    pub id: MessageId,
    /// The author of the message.
    pub role: Role,
    /// Markdown-formatted text.
    pub content: String,
    /// Citations, for assistant messages.
    #[serde(default)]
    pub sources: Vec<Source>,
    /// Creation time (UTC).
    pub created_at: NaiveDateTime,
}

/// A full conversation as stored by the backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Identifier of the conversation.
    pub id: ConversationId,
    /// Title, usually derived from the first message.
    pub title: String,
    /// Messages in chronological order.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Creation time (UTC).
    pub created_at: NaiveDateTime,
    /// Last update time (UTC).
    pub updated_at: NaiveDateTime,
}

/// A conversation entry of the sidebar list, without message bodies.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Identifier of the conversation.
    pub id: ConversationId,
    /// Title of the conversation.
    pub title: String,
    /// Creation time (UTC).
    pub created_at: NaiveDateTime,
    /// Last update time (UTC).
    pub updated_at: NaiveDateTime,
}

impl From<&Conversation> for ConversationSummary {
    #[inline]
    fn from(conversation: &Conversation) -> Self {
        Self {
            id: conversation.id,
            title: conversation.title.clone(),
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
        }
    }
}

/// Retrieval strategy the backend uses to answer a message.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RagMode {
    /// Single retrieval pass.
    #[default]
    Fast,
    /// Query expansion and reranking, slower.
    Accurate,
}

impl Display for RagMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RagMode::Fast => write!(f, "fast"),
            RagMode::Accurate => write!(f, "accurate"),
        }
    }
}

/// Error returned when parsing an unknown [`RagMode`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParseRagModeError(String);

impl Display for ParseRagModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown retrieval mode `{}`", self.0)
    }
}

impl std::error::Error for ParseRagModeError {}

impl FromStr for RagMode {
    type Err = ParseRagModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(RagMode::Fast),
            "accurate" => Ok(RagMode::Accurate),
            _ => Err(ParseRagModeError(s.to_owned())),
        }
    }
}

/// Body of the send-message call.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SendMessageRequest {
    /// The user text.
    pub content: String,
    /// Target conversation, `None` to start a new one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
    /// Retrieval strategy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rag_mode: Option<RagMode>,
}

/// Acknowledgement of the send-message call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SendMessageAck {
    /// The conversation the message was stored in.
    pub conversation_id: ConversationId,
    /// The assistant reply, when the backend echoes it.
    #[serde(default)]
    pub message: Option<Message>,
}
