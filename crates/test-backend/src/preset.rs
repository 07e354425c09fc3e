use docchat_api::{ConversationId, DocumentId, RagMode, Source};
use serde::{Deserialize, Serialize};

/// A canned assistant reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PresetReply {
    /// Markdown text of the reply.
    pub content: String,
    /// Citations attached to the reply.
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl PresetReply {
    /// Creates a `PresetReply` without citations.
    #[inline]
    pub fn text<S: Into<String>>(content: S) -> Self {
        Self {
            content: content.into(),
            sources: vec![],
        }
    }

    /// Attaches a citation.
    #[inline]
    pub fn with_source<S: Into<String>>(mut self, content: S) -> Self {
        self.sources.push(Source {
            content: content.into(),
            metadata: Default::default(),
        });
        self
    }
}

/// The backend operations, used to target delays and injected failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Register,
    Login,
    Me,
    SendMessage,
    ListConversations,
    GetConversation,
    DeleteConversation,
    UploadDocument,
    ListDocuments,
    GetDocument,
    DeleteDocument,
    AnalyticsOverview,
    AnalyticsUsage,
}

/// A recorded call, in arrival order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    Register { username: String },
    Login { username: String },
    Me,
    SendMessage {
        content: String,
        conversation_id: Option<ConversationId>,
        rag_mode: Option<RagMode>,
    },
    ListConversations,
    GetConversation(ConversationId),
    DeleteConversation(ConversationId),
    UploadDocument { filename: String },
    ListDocuments,
    GetDocument(DocumentId),
    DeleteDocument(DocumentId),
    AnalyticsOverview,
    AnalyticsUsage { days: u32 },
}

impl Call {
    /// Returns the operation this call invoked.
    pub fn operation(&self) -> Operation {
        match self {
            Call::Register { .. } => Operation::Register,
            Call::Login { .. } => Operation::Login,
            Call::Me => Operation::Me,
            Call::SendMessage { .. } => Operation::SendMessage,
            Call::ListConversations => Operation::ListConversations,
            Call::GetConversation(_) => Operation::GetConversation,
            Call::DeleteConversation(_) => Operation::DeleteConversation,
            Call::UploadDocument { .. } => Operation::UploadDocument,
            Call::ListDocuments => Operation::ListDocuments,
            Call::GetDocument(_) => Operation::GetDocument,
            Call::DeleteDocument(_) => Operation::DeleteDocument,
            Call::AnalyticsOverview => Operation::AnalyticsOverview,
            Call::AnalyticsUsage { .. } => Operation::AnalyticsUsage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_deserialize() {
        let reply = PresetReply::text("Revenue grew 12%.")
            .with_source("Annual report, page 4...");

        let serialized = serde_json::to_string(&reply).unwrap();
        let deserialized: PresetReply =
            serde_json::from_str(&serialized).unwrap();

        assert_eq!(reply, deserialized);
        assert_eq!(deserialized.sources.len(), 1);
    }
}
