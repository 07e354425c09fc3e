use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::ready;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::NaiveDateTime;
use docchat_api::{
    AnalyticsOverview, Backend, BackendError, Conversation, ConversationId,
    ConversationSummary, Credential, DocumentId, DocumentSummary,
    DocumentUpload, ErrorKind, Identity, Message, MessageId, Registration,
    Role, SendMessageAck, SendMessageRequest, UsageStats, UserId,
};
use tokio::time::sleep;

#[derive(Debug)]
struct EchoError(ErrorKind);

impl Display for EchoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

impl Error for EchoError {}

impl BackendError for EchoError {
    fn kind(&self) -> ErrorKind {
        self.0
    }
}

fn epoch() -> NaiveDateTime {
    NaiveDateTime::default()
}

/// A backend that stores a single conversation and answers every message
/// with "You said ...".
#[derive(Default)]
struct EchoBackend {
    conversation: Arc<Mutex<Option<Conversation>>>,
}

impl EchoBackend {
    fn check(credential: Option<&Credential>) -> Result<(), EchoError> {
        match credential {
            Some(credential) if credential.as_str() == "echo" => Ok(()),
            _ => Err(EchoError(ErrorKind::Unauthorized)),
        }
    }
}

impl Backend for EchoBackend {
    type Error = EchoError;

    fn register(
        &self,
        _registration: &Registration,
    ) -> impl Future<Output = Result<Identity, Self::Error>> + Send + 'static
    {
        ready(Err(EchoError(ErrorKind::Server)))
    }

    fn login(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<Credential, Self::Error>> + Send + 'static
    {
        let ok = username == "echo" && password == "echo";
        async move {
            sleep(Duration::from_millis(1)).await;
            if ok {
                Ok(Credential::new("echo"))
            } else {
                Err(EchoError(ErrorKind::Unauthorized))
            }
        }
    }

    fn me(
        &self,
        credential: Option<&Credential>,
    ) -> impl Future<Output = Result<Identity, Self::Error>> + Send + 'static
    {
        ready(Self::check(credential).map(|_| Identity {
            id: UserId(1),
            email: "echo@example.com".to_owned(),
            username: "echo".to_owned(),
            full_name: None,
        }))
    }

    fn send_message(
        &self,
        credential: Option<&Credential>,
        request: &SendMessageRequest,
    ) -> impl Future<Output = Result<SendMessageAck, Self::Error>> + Send + 'static
    {
        let result = Self::check(credential).map(|_| {
            let mut slot = self.conversation.lock().unwrap();
            let conversation = slot.get_or_insert_with(|| Conversation {
                id: ConversationId(1),
                title: request.content.clone(),
                messages: vec![],
                created_at: epoch(),
                updated_at: epoch(),
            });
            let next_id = conversation.messages.len() as u64 + 1;
            conversation.messages.push(Message {
                id: MessageId(next_id),
                role: Role::User,
                content: request.content.clone(),
                sources: vec![],
                created_at: epoch(),
            });
            conversation.messages.push(Message {
                id: MessageId(next_id + 1),
                role: Role::Assistant,
                content: format!("You said {}", request.content),
                sources: vec![],
                created_at: epoch(),
            });
            SendMessageAck {
                conversation_id: conversation.id,
                message: None,
            }
        });
        ready(result)
    }

    fn list_conversations(
        &self,
        credential: Option<&Credential>,
    ) -> impl Future<Output = Result<Vec<ConversationSummary>, Self::Error>>
    + Send
    + 'static {
        let result = Self::check(credential).map(|_| {
            let slot = self.conversation.lock().unwrap();
            slot.iter().map(ConversationSummary::from).collect()
        });
        ready(result)
    }

    fn get_conversation(
        &self,
        credential: Option<&Credential>,
        id: ConversationId,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + 'static
    {
        let result = Self::check(credential).and_then(|_| {
            let slot = self.conversation.lock().unwrap();
            slot.clone()
                .filter(|c| c.id == id)
                .ok_or(EchoError(ErrorKind::NotFound))
        });
        ready(result)
    }

    fn delete_conversation(
        &self,
        credential: Option<&Credential>,
        _id: ConversationId,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        let result = Self::check(credential).map(|_| {
            self.conversation.lock().unwrap().take();
        });
        ready(result)
    }

    fn upload_document(
        &self,
        _credential: Option<&Credential>,
        _upload: DocumentUpload,
    ) -> impl Future<Output = Result<DocumentSummary, Self::Error>> + Send + 'static
    {
        ready(Err(EchoError(ErrorKind::Server)))
    }

    fn list_documents(
        &self,
        _credential: Option<&Credential>,
    ) -> impl Future<Output = Result<Vec<DocumentSummary>, Self::Error>>
    + Send
    + 'static {
        ready(Ok(vec![]))
    }

    fn get_document(
        &self,
        _credential: Option<&Credential>,
        _id: DocumentId,
    ) -> impl Future<Output = Result<DocumentSummary, Self::Error>> + Send + 'static
    {
        ready(Err(EchoError(ErrorKind::NotFound)))
    }

    fn delete_document(
        &self,
        _credential: Option<&Credential>,
        _id: DocumentId,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        ready(Err(EchoError(ErrorKind::NotFound)))
    }

    fn analytics_overview(
        &self,
        _credential: Option<&Credential>,
    ) -> impl Future<Output = Result<AnalyticsOverview, Self::Error>> + Send + 'static
    {
        ready(Ok(AnalyticsOverview::default()))
    }

    fn analytics_usage(
        &self,
        _credential: Option<&Credential>,
        _days: u32,
    ) -> impl Future<Output = Result<Vec<UsageStats>, Self::Error>> + Send + 'static
    {
        ready(Ok(vec![]))
    }
}

mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let backend = EchoBackend::default();
        let credential = backend.login("echo", "echo").await.unwrap();

        let ack = backend
            .send_message(
                Some(&credential),
                &SendMessageRequest {
                    content: "Good morning".to_owned(),
                    conversation_id: None,
                    rag_mode: None,
                },
            )
            .await
            .unwrap();

        let conversation = backend
            .get_conversation(Some(&credential), ack.conversation_id)
            .await
            .unwrap();
        let last = conversation.messages.last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "You said Good morning");

        let list = backend.list_conversations(Some(&credential)).await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, ack.conversation_id);
    }

    #[tokio::test]
    async fn test_anonymous_is_rejected() {
        let backend = EchoBackend::default();
        let err = backend.list_conversations(None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(err.kind().is_auth_rejection());

        let err = backend.login("echo", "wrong").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }
}
