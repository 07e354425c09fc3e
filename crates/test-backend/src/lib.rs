//! A local fake backend for testing purpose.

mod preset;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};
use docchat_api::{
    AnalyticsOverview, Backend, BackendError, Conversation, ConversationId,
    ConversationSummary, Credential, DocumentId, DocumentStatus,
    DocumentSummary, DocumentUpload, ErrorKind, Identity, Message, MessageId,
    Registration, Role, SendMessageAck, SendMessageRequest, UsageStats, UserId,
};
use tokio::time::sleep;

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    fn unauthorized() -> Self {
        Self::new("Could not validate credentials", ErrorKind::Unauthorized)
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.message, self.kind)
    }
}

impl StdError for Error {}

impl BackendError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

struct Account {
    identity: Identity,
    password: String,
}

struct StoredConversation {
    owner: UserId,
    conversation: Conversation,
}

struct StoredDocument {
    owner: UserId,
    summary: DocumentSummary,
}

#[derive(Default)]
struct World {
    accounts: Vec<Account>,
    tokens: HashMap<String, UserId>,
    conversations: BTreeMap<ConversationId, StoredConversation>,
    documents: BTreeMap<DocumentId, StoredDocument>,
    replies: VecDeque<PresetReply>,
    delays: HashMap<Operation, Duration>,
    failures: HashMap<Operation, VecDeque<ErrorKind>>,
    calls: Vec<Call>,
    next_id: u64,
    clock: i64,
}

impl World {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn now(&mut self) -> NaiveDateTime {
        self.clock += 1;
        NaiveDateTime::default() + TimeDelta::seconds(self.clock)
    }

    fn record(&mut self, call: Call) -> Result<(), Error> {
        let operation = call.operation();
        self.calls.push(call);
        match self.failures.get_mut(&operation).and_then(VecDeque::pop_front) {
            Some(kind) => Err(Error::new(format!("injected {operation:?} failure"), kind)),
            None => Ok(()),
        }
    }

    fn authenticate(&self, credential: Option<&Credential>) -> Result<UserId, Error> {
        credential
            .and_then(|c| self.tokens.get(c.as_str()))
            .copied()
            .ok_or_else(Error::unauthorized)
    }

    fn owned_conversation(
        &mut self,
        owner: UserId,
        id: ConversationId,
    ) -> Result<&mut Conversation, Error> {
        match self.conversations.get_mut(&id) {
            Some(stored) if stored.owner == owner => Ok(&mut stored.conversation),
            _ => Err(Error::new("Conversation not found", ErrorKind::NotFound)),
        }
    }

    fn issue_token(&mut self, user: UserId) -> Credential {
        let token = format!("token-{}-{}", user.0, self.next_id());
        self.tokens.insert(token.clone(), user);
        Credential::new(token)
    }

    fn send_message(
        &mut self,
        owner: UserId,
        request: &SendMessageRequest,
    ) -> Result<SendMessageAck, Error> {
        let id = match request.conversation_id {
            Some(id) => {
                self.owned_conversation(owner, id)?;
                id
            }
            None => {
                let id = ConversationId(self.next_id());
                let now = self.now();
                let title = if request.content.chars().count() > 50 {
                    let head: String = request.content.chars().take(50).collect();
                    format!("{head}...")
                } else {
                    request.content.clone()
                };
                self.conversations.insert(
                    id,
                    StoredConversation {
                        owner,
                        conversation: Conversation {
                            id,
                            title,
                            messages: vec![],
                            created_at: now,
                            updated_at: now,
                        },
                    },
                );
                id
            }
        };

        let reply = self
            .replies
            .pop_front()
            .unwrap_or_else(|| PresetReply::text(format!("Echo: {}", request.content)));
        let user_msg = Message {
            id: MessageId(self.next_id()),
            role: Role::User,
            content: request.content.clone(),
            sources: vec![],
            created_at: self.now(),
        };
        let assistant_msg = Message {
            id: MessageId(self.next_id()),
            role: Role::Assistant,
            content: reply.content,
            sources: reply.sources,
            created_at: self.now(),
        };
        let now = self.now();
        let conversation = self.owned_conversation(owner, id)?;
        conversation.messages.push(user_msg);
        conversation.messages.push(assistant_msg.clone());
        conversation.updated_at = now;

        Ok(SendMessageAck {
            conversation_id: id,
            message: Some(assistant_msg),
        })
    }
}

/// A local fake backend for testing purpose.
///
/// The backend keeps accounts, conversations and documents in memory and
/// answers messages with preset replies (or an echo when none is left).
/// Clones share the same state, so a test can keep one clone to inspect and
/// steer the backend while the controller owns another.
///
/// # Note
///
/// This type is not optimized for production use. You should only use it
/// for testing.
#[derive(Clone, Default)]
pub struct TestBackend {
    world: Arc<Mutex<World>>,
}

impl TestBackend {
    fn world(&self) -> MutexGuard<'_, World> {
        self.world.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Creates an account and returns a valid credential for it.
    pub fn add_account(&self, username: &str, password: &str) -> Credential {
        let mut world = self.world();
        let id = UserId(world.next_id());
        world.accounts.push(Account {
            identity: Identity {
                id,
                email: format!("{username}@example.com"),
                username: username.to_owned(),
                full_name: None,
            },
            password: password.to_owned(),
        });
        world.issue_token(id)
    }

    /// Invalidates every issued credential, like an expired session.
    pub fn revoke_all_tokens(&self) {
        self.world().tokens.clear();
    }

    /// Queues an assistant reply for the next message.
    pub fn add_reply(&self, reply: PresetReply) {
        self.world().replies.push_back(reply);
    }

    /// Delays every response of `operation`.
    pub fn set_delay(&self, operation: Operation, delay: Duration) {
        self.world().delays.insert(operation, delay);
    }

    /// Makes the next call of `operation` fail with `kind`.
    ///
    /// Failures stack up: calling this twice fails the next two calls.
    pub fn fail_next(&self, operation: Operation, kind: ErrorKind) {
        self.world()
            .failures
            .entry(operation)
            .or_default()
            .push_back(kind);
    }

    /// Returns the calls received so far.
    pub fn calls(&self) -> Vec<Call> {
        self.world().calls.clone()
    }

    /// Returns how many times `operation` was called.
    pub fn call_count(&self, operation: Operation) -> usize {
        self.world()
            .calls
            .iter()
            .filter(|call| call.operation() == operation)
            .count()
    }

    /// Returns a stored conversation, bypassing authentication.
    pub fn conversation(&self, id: ConversationId) -> Option<Conversation> {
        self.world()
            .conversations
            .get(&id)
            .map(|stored| stored.conversation.clone())
    }

    fn respond<T: Send + 'static>(
        &self,
        operation: Operation,
        result: Result<T, Error>,
    ) -> impl Future<Output = Result<T, Error>> + Send + 'static {
        let delay = self.world().delays.get(&operation).copied();
        async move {
            if let Some(delay) = delay {
                sleep(delay).await;
            }
            result
        }
    }
}

impl Debug for TestBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let world = self.world();
        f.debug_struct("TestBackend")
            .field("accounts", &world.accounts.len())
            .field("conversations", &world.conversations.len())
            .field("calls", &world.calls.len())
            .finish_non_exhaustive()
    }
}

impl Backend for TestBackend {
    type Error = crate::Error;

    fn register(
        &self,
        registration: &Registration,
    ) -> impl Future<Output = Result<Identity, Self::Error>> + Send + 'static
    {
        let result = {
            let mut world = self.world();
            world
                .record(Call::Register {
                    username: registration.username.clone(),
                })
                .and_then(|_| {
                    let taken = world.accounts.iter().any(|a| {
                        a.identity.username == registration.username
                            || a.identity.email == registration.email
                    });
                    if taken {
                        return Err(Error::new(
                            "Username or email already registered",
                            ErrorKind::Server,
                        ));
                    }
                    let identity = Identity {
                        id: UserId(world.next_id()),
                        email: registration.email.clone(),
                        username: registration.username.clone(),
                        full_name: registration.full_name.clone(),
                    };
                    world.accounts.push(Account {
                        identity: identity.clone(),
                        password: registration.password.clone(),
                    });
                    Ok(identity)
                })
        };
        self.respond(Operation::Register, result)
    }

    fn login(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<Credential, Self::Error>> + Send + 'static
    {
        let result = {
            let mut world = self.world();
            world
                .record(Call::Login {
                    username: username.to_owned(),
                })
                .and_then(|_| {
                    let user = world
                        .accounts
                        .iter()
                        .find(|a| {
                            a.identity.username == username && a.password == password
                        })
                        .map(|a| a.identity.id)
                        .ok_or_else(|| {
                            Error::new(
                                "Incorrect username or password",
                                ErrorKind::Unauthorized,
                            )
                        })?;
                    Ok(world.issue_token(user))
                })
        };
        self.respond(Operation::Login, result)
    }

    fn me(
        &self,
        credential: Option<&Credential>,
    ) -> impl Future<Output = Result<Identity, Self::Error>> + Send + 'static
    {
        let result = {
            let mut world = self.world();
            world.record(Call::Me).and_then(|_| {
                let user = world.authenticate(credential)?;
                world
                    .accounts
                    .iter()
                    .find(|a| a.identity.id == user)
                    .map(|a| a.identity.clone())
                    .ok_or_else(Error::unauthorized)
            })
        };
        self.respond(Operation::Me, result)
    }

    fn send_message(
        &self,
        credential: Option<&Credential>,
        request: &SendMessageRequest,
    ) -> impl Future<Output = Result<SendMessageAck, Self::Error>> + Send + 'static
    {
        let result = {
            let mut world = self.world();
            world
                .record(Call::SendMessage {
                    content: request.content.clone(),
                    conversation_id: request.conversation_id,
                    rag_mode: request.rag_mode,
                })
                .and_then(|_| {
                    let user = world.authenticate(credential)?;
                    world.send_message(user, request)
                })
        };
        self.respond(Operation::SendMessage, result)
    }

    fn list_conversations(
        &self,
        credential: Option<&Credential>,
    ) -> impl Future<Output = Result<Vec<ConversationSummary>, Self::Error>>
    + Send
    + 'static {
        let result = {
            let mut world = self.world();
            world.record(Call::ListConversations).and_then(|_| {
                let user = world.authenticate(credential)?;
                let mut list: Vec<_> = world
                    .conversations
                    .values()
                    .filter(|stored| stored.owner == user)
                    .map(|stored| ConversationSummary::from(&stored.conversation))
                    .collect();
                list.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
                Ok(list)
            })
        };
        self.respond(Operation::ListConversations, result)
    }

    fn get_conversation(
        &self,
        credential: Option<&Credential>,
        id: ConversationId,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + 'static
    {
        let result = {
            let mut world = self.world();
            world.record(Call::GetConversation(id)).and_then(|_| {
                let user = world.authenticate(credential)?;
                world.owned_conversation(user, id).map(|c| c.clone())
            })
        };
        self.respond(Operation::GetConversation, result)
    }

    fn delete_conversation(
        &self,
        credential: Option<&Credential>,
        id: ConversationId,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let result = {
            let mut world = self.world();
            world.record(Call::DeleteConversation(id)).and_then(|_| {
                let user = world.authenticate(credential)?;
                world.owned_conversation(user, id)?;
                world.conversations.remove(&id);
                Ok(())
            })
        };
        self.respond(Operation::DeleteConversation, result)
    }

    fn upload_document(
        &self,
        credential: Option<&Credential>,
        upload: DocumentUpload,
    ) -> impl Future<Output = Result<DocumentSummary, Self::Error>> + Send + 'static
    {
        let result = {
            let mut world = self.world();
            world
                .record(Call::UploadDocument {
                    filename: upload.filename.clone(),
                })
                .and_then(|_| {
                    let user = world.authenticate(credential)?;
                    let id = DocumentId(world.next_id());
                    let file_type = upload
                        .filename
                        .rsplit_once('.')
                        .map(|(_, ext)| ext.to_ascii_lowercase())
                        .unwrap_or_default();
                    let summary = DocumentSummary {
                        id,
                        filename: upload.filename,
                        file_type,
                        file_size: upload.data.len() as u64,
                        status: DocumentStatus::Completed,
                        chunk_count: upload.data.len().div_ceil(512) as u64,
                        created_at: world.now(),
                    };
                    world.documents.insert(
                        id,
                        StoredDocument {
                            owner: user,
                            summary: summary.clone(),
                        },
                    );
                    Ok(summary)
                })
        };
        self.respond(Operation::UploadDocument, result)
    }

    fn list_documents(
        &self,
        credential: Option<&Credential>,
    ) -> impl Future<Output = Result<Vec<DocumentSummary>, Self::Error>>
    + Send
    + 'static {
        let result = {
            let mut world = self.world();
            world.record(Call::ListDocuments).and_then(|_| {
                let user = world.authenticate(credential)?;
                let mut list: Vec<_> = world
                    .documents
                    .values()
                    .filter(|stored| stored.owner == user)
                    .map(|stored| stored.summary.clone())
                    .collect();
                list.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                Ok(list)
            })
        };
        self.respond(Operation::ListDocuments, result)
    }

    fn get_document(
        &self,
        credential: Option<&Credential>,
        id: DocumentId,
    ) -> impl Future<Output = Result<DocumentSummary, Self::Error>> + Send + 'static
    {
        let result = {
            let mut world = self.world();
            world.record(Call::GetDocument(id)).and_then(|_| {
                let user = world.authenticate(credential)?;
                world
                    .documents
                    .get(&id)
                    .filter(|stored| stored.owner == user)
                    .map(|stored| stored.summary.clone())
                    .ok_or_else(|| Error::new("Document not found", ErrorKind::NotFound))
            })
        };
        self.respond(Operation::GetDocument, result)
    }

    fn delete_document(
        &self,
        credential: Option<&Credential>,
        id: DocumentId,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let result = {
            let mut world = self.world();
            world.record(Call::DeleteDocument(id)).and_then(|_| {
                let user = world.authenticate(credential)?;
                let owned = matches!(
                    world.documents.get(&id),
                    Some(stored) if stored.owner == user
                );
                if !owned {
                    return Err(Error::new("Document not found", ErrorKind::NotFound));
                }
                world.documents.remove(&id);
                Ok(())
            })
        };
        self.respond(Operation::DeleteDocument, result)
    }

    fn analytics_overview(
        &self,
        credential: Option<&Credential>,
    ) -> impl Future<Output = Result<AnalyticsOverview, Self::Error>> + Send + 'static
    {
        let result = {
            let mut world = self.world();
            world.record(Call::AnalyticsOverview).and_then(|_| {
                let user = world.authenticate(credential)?;
                let total_queries = world
                    .conversations
                    .values()
                    .filter(|stored| stored.owner == user)
                    .flat_map(|stored| stored.conversation.messages.iter())
                    .filter(|msg| msg.role == Role::User)
                    .count() as u64;
                let total_documents = world
                    .documents
                    .values()
                    .filter(|stored| stored.owner == user)
                    .count() as u64;
                Ok(AnalyticsOverview {
                    total_queries,
                    total_documents,
                    ..Default::default()
                })
            })
        };
        self.respond(Operation::AnalyticsOverview, result)
    }

    fn analytics_usage(
        &self,
        credential: Option<&Credential>,
        days: u32,
    ) -> impl Future<Output = Result<Vec<UsageStats>, Self::Error>> + Send + 'static
    {
        let result = {
            let mut world = self.world();
            world
                .record(Call::AnalyticsUsage { days })
                .and_then(|_| world.authenticate(credential).map(|_| vec![]))
        };
        self.respond(Operation::AnalyticsUsage, result)
    }
}

#[cfg(test)]
mod tests {
    use docchat_api::RagMode;
    use tokio::time::Instant;

    use super::*;

    fn request(content: &str, conversation_id: Option<ConversationId>) -> SendMessageRequest {
        SendMessageRequest {
            content: content.to_owned(),
            conversation_id,
            rag_mode: Some(RagMode::Fast),
        }
    }

    #[tokio::test]
    async fn test_send_and_fetch() {
        let backend = TestBackend::default();
        let credential = backend.add_account("ada", "pw");
        backend.add_reply(
            PresetReply::text("Hello, world!").with_source("greetings.txt"),
        );

        let ack = backend
            .send_message(Some(&credential), &request("Hi", None))
            .await
            .unwrap();
        let conversation = backend
            .get_conversation(Some(&credential), ack.conversation_id)
            .await
            .unwrap();
        assert_eq!(conversation.title, "Hi");
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.messages[1].content, "Hello, world!");
        assert_eq!(conversation.messages[1].sources.len(), 1);

        // Without presets left, the backend echoes.
        backend
            .send_message(
                Some(&credential),
                &request("Again", Some(ack.conversation_id)),
            )
            .await
            .unwrap();
        let conversation = backend.conversation(ack.conversation_id).unwrap();
        assert_eq!(conversation.messages[3].content, "Echo: Again");
    }

    #[tokio::test]
    async fn test_long_titles_are_truncated() {
        let backend = TestBackend::default();
        let credential = backend.add_account("ada", "pw");
        let text = "x".repeat(60);
        let ack = backend
            .send_message(Some(&credential), &request(&text, None))
            .await
            .unwrap();
        let conversation = backend.conversation(ack.conversation_id).unwrap();
        assert_eq!(conversation.title, format!("{}...", "x".repeat(50)));
    }

    #[tokio::test]
    async fn test_list_is_most_recent_first() {
        let backend = TestBackend::default();
        let credential = backend.add_account("ada", "pw");
        let first = backend
            .send_message(Some(&credential), &request("first", None))
            .await
            .unwrap();
        let second = backend
            .send_message(Some(&credential), &request("second", None))
            .await
            .unwrap();

        let list = backend.list_conversations(Some(&credential)).await.unwrap();
        let ids: Vec<_> = list.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![second.conversation_id, first.conversation_id]);
    }

    #[tokio::test]
    async fn test_authentication() {
        let backend = TestBackend::default();
        let credential = backend.add_account("ada", "pw");

        let err = backend.list_conversations(None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let identity = backend.me(Some(&credential)).await.unwrap();
        assert_eq!(identity.username, "ada");

        backend.revoke_all_tokens();
        let err = backend.me(Some(&credential)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);

        let credential = backend.login("ada", "pw").await.unwrap();
        assert!(backend.me(Some(&credential)).await.is_ok());
        assert!(backend.login("ada", "nope").await.is_err());
    }

    #[tokio::test]
    async fn test_injected_failures_and_calls() {
        let backend = TestBackend::default();
        let credential = backend.add_account("ada", "pw");
        backend.fail_next(Operation::ListConversations, ErrorKind::Transport);

        let err = backend.list_conversations(Some(&credential)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert!(backend.list_conversations(Some(&credential)).await.is_ok());

        assert_eq!(backend.call_count(Operation::ListConversations), 2);
        assert_eq!(
            backend.calls(),
            vec![Call::ListConversations, Call::ListConversations]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay() {
        let backend = TestBackend::default();
        backend.set_delay(Operation::Me, Duration::from_millis(300));

        let started = Instant::now();
        let _ = backend.me(None).await;
        assert!(started.elapsed() >= Duration::from_millis(300));
    }

    #[tokio::test]
    async fn test_documents() {
        let backend = TestBackend::default();
        let credential = backend.add_account("ada", "pw");
        let doc = backend
            .upload_document(
                Some(&credential),
                DocumentUpload {
                    filename: "Report.PDF".to_owned(),
                    content_type: "application/pdf".to_owned(),
                    data: vec![0; 1000],
                },
            )
            .await
            .unwrap();
        assert_eq!(doc.file_type, "pdf");
        assert_eq!(doc.chunk_count, 2);

        let overview = backend.analytics_overview(Some(&credential)).await.unwrap();
        assert_eq!(overview.total_documents, 1);

        backend.delete_document(Some(&credential), doc.id).await.unwrap();
        assert!(backend.list_documents(Some(&credential)).await.unwrap().is_empty());
    }
}
