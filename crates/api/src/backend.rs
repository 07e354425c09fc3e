use std::error::Error;

use crate::analytics::{AnalyticsOverview, UsageStats};
use crate::chat::{
    Conversation, ConversationId, ConversationSummary, SendMessageAck,
    SendMessageRequest,
};
use crate::document::{DocumentId, DocumentSummary, DocumentUpload};
use crate::error::ErrorKind;
use crate::identity::{Credential, Identity, Registration};

/// The error type for a backend.
pub trait BackendError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// A type that represents the document-chat backend service.
///
/// Once the backend is created, it should behave like a stateless object.
/// Authentication is not part of the backend state: every operation takes
/// the bearer credential explicitly, and `None` means an anonymous call.
pub trait Backend: Send + Sync {
    /// The error type that may be returned by the backend.
    type Error: BackendError;

    /// Creates a new account.
    fn register(
        &self,
        registration: &Registration,
    ) -> impl Future<Output = Result<Identity, Self::Error>> + Send + 'static;

    /// Exchanges a username and password for a bearer credential.
    fn login(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<Credential, Self::Error>> + Send + 'static;

    /// Fetches the identity that owns the credential.
    fn me(
        &self,
        credential: Option<&Credential>,
    ) -> impl Future<Output = Result<Identity, Self::Error>> + Send + 'static;

    /// Sends a user message.
    ///
    /// The backend generates and stores the assistant reply before
    /// acknowledging, but the acknowledgement is not guaranteed to carry
    /// it. Callers fetch the conversation to get the final reply.
    fn send_message(
        &self,
        credential: Option<&Credential>,
        request: &SendMessageRequest,
    ) -> impl Future<Output = Result<SendMessageAck, Self::Error>> + Send + 'static;

    /// Lists the conversation summaries, in the backend's order.
    fn list_conversations(
        &self,
        credential: Option<&Credential>,
    ) -> impl Future<Output = Result<Vec<ConversationSummary>, Self::Error>> + Send + 'static;

    /// Fetches a full conversation, including its messages.
    fn get_conversation(
        &self,
        credential: Option<&Credential>,
        id: ConversationId,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + 'static;

    /// Deletes a conversation.
    fn delete_conversation(
        &self,
        credential: Option<&Credential>,
        id: ConversationId,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static;

    /// Uploads a document for ingestion.
    fn upload_document(
        &self,
        credential: Option<&Credential>,
        upload: DocumentUpload,
    ) -> impl Future<Output = Result<DocumentSummary, Self::Error>> + Send + 'static;

    /// Lists the uploaded documents.
    fn list_documents(
        &self,
        credential: Option<&Credential>,
    ) -> impl Future<Output = Result<Vec<DocumentSummary>, Self::Error>> + Send + 'static;

    /// Fetches a single document summary.
    fn get_document(
        &self,
        credential: Option<&Credential>,
        id: DocumentId,
    ) -> impl Future<Output = Result<DocumentSummary, Self::Error>> + Send + 'static;

    /// Deletes a document.
    fn delete_document(
        &self,
        credential: Option<&Credential>,
        id: DocumentId,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static;

    /// Fetches the aggregate usage counters.
    fn analytics_overview(
        &self,
        credential: Option<&Credential>,
    ) -> impl Future<Output = Result<AnalyticsOverview, Self::Error>> + Send + 'static;

    /// Fetches per-day usage for the last `days` days.
    fn analytics_usage(
        &self,
        credential: Option<&Credential>,
        days: u32,
    ) -> impl Future<Output = Result<Vec<UsageStats>, Self::Error>> + Send + 'static;
}
