use std::fmt::{self, Debug};
use std::pin::Pin;
use std::sync::Arc;

use docchat_api::{
    AnalyticsOverview, Backend, BackendError, Conversation, ConversationId,
    ConversationSummary, Credential, DocumentId, DocumentSummary,
    DocumentUpload, Identity, Registration, SendMessageAck,
    SendMessageRequest, UsageStats,
};
use tracing::Instrument;

use crate::Error;

pub type BackendFuture<T> =
    Pin<Box<dyn Future<Output = Result<T, Error>> + Send + 'static>>;

/// Object-safe mirror of [`Backend`], with errors already converted.
trait ErasedBackend: Send + Sync {
    fn register(&self, registration: &Registration) -> BackendFuture<Identity>;
    fn login(&self, username: &str, password: &str) -> BackendFuture<Credential>;
    fn me(&self, credential: Option<&Credential>) -> BackendFuture<Identity>;
    fn send_message(
        &self,
        credential: Option<&Credential>,
        request: &SendMessageRequest,
    ) -> BackendFuture<SendMessageAck>;
    fn list_conversations(
        &self,
        credential: Option<&Credential>,
    ) -> BackendFuture<Vec<ConversationSummary>>;
    fn get_conversation(
        &self,
        credential: Option<&Credential>,
        id: ConversationId,
    ) -> BackendFuture<Conversation>;
    fn delete_conversation(
        &self,
        credential: Option<&Credential>,
        id: ConversationId,
    ) -> BackendFuture<()>;
    fn upload_document(
        &self,
        credential: Option<&Credential>,
        upload: DocumentUpload,
    ) -> BackendFuture<DocumentSummary>;
    fn list_documents(
        &self,
        credential: Option<&Credential>,
    ) -> BackendFuture<Vec<DocumentSummary>>;
    fn get_document(
        &self,
        credential: Option<&Credential>,
        id: DocumentId,
    ) -> BackendFuture<DocumentSummary>;
    fn delete_document(
        &self,
        credential: Option<&Credential>,
        id: DocumentId,
    ) -> BackendFuture<()>;
    fn analytics_overview(
        &self,
        credential: Option<&Credential>,
    ) -> BackendFuture<AnalyticsOverview>;
    fn analytics_usage(
        &self,
        credential: Option<&Credential>,
        days: u32,
    ) -> BackendFuture<Vec<UsageStats>>;
}

fn erase<T, E, F>(op: &'static str, fut: F) -> BackendFuture<T>
where
    T: 'static,
    E: BackendError,
    F: Future<Output = Result<T, E>> + Send + 'static,
{
    Box::pin(
        async move {
            trace!("started");
            fut.await.map_err(|err| {
                debug!("failed: {err}");
                Error::from_backend(err)
            })
        }
        .instrument(trace_span!("backend call", op)),
    )
}

impl<B: Backend + 'static> ErasedBackend for B {
    fn register(&self, registration: &Registration) -> BackendFuture<Identity> {
        erase("register", Backend::register(self, registration))
    }

    fn login(&self, username: &str, password: &str) -> BackendFuture<Credential> {
        erase("login", Backend::login(self, username, password))
    }

    fn me(&self, credential: Option<&Credential>) -> BackendFuture<Identity> {
        erase("me", Backend::me(self, credential))
    }

    fn send_message(
        &self,
        credential: Option<&Credential>,
        request: &SendMessageRequest,
    ) -> BackendFuture<SendMessageAck> {
        erase("send message", Backend::send_message(self, credential, request))
    }

    fn list_conversations(
        &self,
        credential: Option<&Credential>,
    ) -> BackendFuture<Vec<ConversationSummary>> {
        erase(
            "list conversations",
            Backend::list_conversations(self, credential),
        )
    }

    fn get_conversation(
        &self,
        credential: Option<&Credential>,
        id: ConversationId,
    ) -> BackendFuture<Conversation> {
        erase(
            "get conversation",
            Backend::get_conversation(self, credential, id),
        )
    }

    fn delete_conversation(
        &self,
        credential: Option<&Credential>,
        id: ConversationId,
    ) -> BackendFuture<()> {
        erase(
            "delete conversation",
            Backend::delete_conversation(self, credential, id),
        )
    }

    fn upload_document(
        &self,
        credential: Option<&Credential>,
        upload: DocumentUpload,
    ) -> BackendFuture<DocumentSummary> {
        erase(
            "upload document",
            Backend::upload_document(self, credential, upload),
        )
    }

    fn list_documents(
        &self,
        credential: Option<&Credential>,
    ) -> BackendFuture<Vec<DocumentSummary>> {
        erase("list documents", Backend::list_documents(self, credential))
    }

    fn get_document(
        &self,
        credential: Option<&Credential>,
        id: DocumentId,
    ) -> BackendFuture<DocumentSummary> {
        erase("get document", Backend::get_document(self, credential, id))
    }

    fn delete_document(
        &self,
        credential: Option<&Credential>,
        id: DocumentId,
    ) -> BackendFuture<()> {
        erase(
            "delete document",
            Backend::delete_document(self, credential, id),
        )
    }

    fn analytics_overview(
        &self,
        credential: Option<&Credential>,
    ) -> BackendFuture<AnalyticsOverview> {
        erase(
            "analytics overview",
            Backend::analytics_overview(self, credential),
        )
    }

    fn analytics_usage(
        &self,
        credential: Option<&Credential>,
        days: u32,
    ) -> BackendFuture<Vec<UsageStats>> {
        erase(
            "analytics usage",
            Backend::analytics_usage(self, credential, days),
        )
    }
}

/// A type-erased handle to a backend.
///
/// The controller doesn't carry the backend type as a generic parameter,
/// so the backend is boxed behind [`ErasedBackend`] here. Returned futures
/// own everything they need and can be moved into spawned tasks.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<dyn ErasedBackend>,
}

impl BackendClient {
    #[inline]
    pub fn new<B: Backend + 'static>(backend: B) -> Self {
        Self {
            inner: Arc::new(backend),
        }
    }

    #[inline]
    pub fn register(&self, registration: &Registration) -> BackendFuture<Identity> {
        self.inner.register(registration)
    }

    #[inline]
    pub fn login(&self, username: &str, password: &str) -> BackendFuture<Credential> {
        self.inner.login(username, password)
    }

    #[inline]
    pub fn me(&self, credential: Option<&Credential>) -> BackendFuture<Identity> {
        self.inner.me(credential)
    }

    #[inline]
    pub fn send_message(
        &self,
        credential: Option<&Credential>,
        request: &SendMessageRequest,
    ) -> BackendFuture<SendMessageAck> {
        self.inner.send_message(credential, request)
    }

    #[inline]
    pub fn list_conversations(
        &self,
        credential: Option<&Credential>,
    ) -> BackendFuture<Vec<ConversationSummary>> {
        self.inner.list_conversations(credential)
    }

    #[inline]
    pub fn get_conversation(
        &self,
        credential: Option<&Credential>,
        id: ConversationId,
    ) -> BackendFuture<Conversation> {
        self.inner.get_conversation(credential, id)
    }

    #[inline]
    pub fn delete_conversation(
        &self,
        credential: Option<&Credential>,
        id: ConversationId,
    ) -> BackendFuture<()> {
        self.inner.delete_conversation(credential, id)
    }

    #[inline]
    pub fn upload_document(
        &self,
        credential: Option<&Credential>,
        upload: DocumentUpload,
    ) -> BackendFuture<DocumentSummary> {
        self.inner.upload_document(credential, upload)
    }

    #[inline]
    pub fn list_documents(
        &self,
        credential: Option<&Credential>,
    ) -> BackendFuture<Vec<DocumentSummary>> {
        self.inner.list_documents(credential)
    }

    #[inline]
    pub fn get_document(
        &self,
        credential: Option<&Credential>,
        id: DocumentId,
    ) -> BackendFuture<DocumentSummary> {
        self.inner.get_document(credential, id)
    }

    #[inline]
    pub fn delete_document(
        &self,
        credential: Option<&Credential>,
        id: DocumentId,
    ) -> BackendFuture<()> {
        self.inner.delete_document(credential, id)
    }

    #[inline]
    pub fn analytics_overview(
        &self,
        credential: Option<&Credential>,
    ) -> BackendFuture<AnalyticsOverview> {
        self.inner.analytics_overview(credential)
    }

    #[inline]
    pub fn analytics_usage(
        &self,
        credential: Option<&Credential>,
        days: u32,
    ) -> BackendFuture<Vec<UsageStats>> {
        self.inner.analytics_usage(credential, days)
    }
}

impl Debug for BackendClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendClient").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use docchat_api::ErrorKind as BackendErrorKind;
    use docchat_test_backend::{Operation, TestBackend};

    use super::*;
    use crate::ErrorKind;

    #[tokio::test]
    async fn test_errors_are_converted() {
        let backend = TestBackend::default();
        let credential = backend.add_account("ada", "pw");
        let client = BackendClient::new(backend.clone());

        let identity = client.me(Some(&credential)).await.unwrap();
        assert_eq!(identity.username, "ada");

        let err = client.me(None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        backend.fail_next(Operation::ListConversations, BackendErrorKind::Transport);
        let err = client.list_conversations(Some(&credential)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(err.reason().contains("injected"));
    }

    #[tokio::test]
    async fn test_futures_are_detached() {
        let backend = TestBackend::default();
        let credential = backend.add_account("ada", "pw");
        let client = BackendClient::new(backend);

        // The future doesn't borrow the client or the credential.
        let fut = client.list_conversations(Some(&credential));
        drop(client);
        drop(credential);
        assert!(fut.await.unwrap().is_empty());
    }
}
