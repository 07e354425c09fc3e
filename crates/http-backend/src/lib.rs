//! A backend that talks to the document-chat REST service over HTTP.

#[macro_use]
extern crate tracing;

mod config;
mod proto;
mod response;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use bytes::Bytes;
use docchat_api::{
    AnalyticsOverview, Backend, BackendError, Conversation, ConversationId,
    ConversationSummary, Credential, DocumentId, DocumentSummary,
    DocumentUpload, ErrorKind, Identity, Registration, SendMessageAck,
    SendMessageRequest, UsageStats,
};
use mime::Mime;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::Instrument;

pub use config::{HttpBackendConfig, HttpBackendConfigBuilder};
use proto::TokenResponse;
use response::{decode_json, discard_body};

/// Error type for [`HttpBackend`].
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

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::new("request timed out", ErrorKind::Transport);
        }
        Self::new(format!("{err}"), ErrorKind::Transport)
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl BackendError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Backend speaking the `/api/v1` REST contracts.
#[derive(Clone, Debug)]
pub struct HttpBackend {
    client: Client,
    config: Arc<HttpBackendConfig>,
}

impl HttpBackend {
    /// Creates a new `HttpBackend` with the given configuration.
    #[inline]
    pub fn new(config: HttpBackendConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    /// Returns the configuration in use.
    #[inline]
    pub fn config(&self) -> &HttpBackendConfig {
        &self.config
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        credential: Option<&Credential>,
    ) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, self.config.url(path))
            .timeout(self.config.timeout);
        // An absent credential is anonymous mode, not an error.
        if let Some(credential) = credential.filter(|c| !c.is_empty()) {
            builder = builder.bearer_auth(credential.as_str());
        }
        builder
    }
}

fn call_json<T: DeserializeOwned + Send + 'static>(
    builder: RequestBuilder,
) -> impl Future<Output = Result<T, Error>> + Send + 'static {
    async move {
        let resp = builder.send().await.map_err(Error::from_reqwest)?;
        decode_json(resp).await
    }
    .instrument(trace_span!("http call"))
}

fn call_empty(
    builder: RequestBuilder,
) -> impl Future<Output = Result<(), Error>> + Send + 'static {
    async move {
        let resp = builder.send().await.map_err(Error::from_reqwest)?;
        discard_body(resp).await
    }
    .instrument(trace_span!("http call"))
}

impl Backend for HttpBackend {
    type Error = Error;

    fn register(
        &self,
        registration: &Registration,
    ) -> impl Future<Output = Result<Identity, Self::Error>> + Send + 'static
    {
        call_json(self.request(Method::POST, proto::REGISTER, None).json(registration))
    }

    fn login(
        &self,
        username: &str,
        password: &str,
    ) -> impl Future<Output = Result<Credential, Self::Error>> + Send + 'static
    {
        let builder = self
            .request(Method::POST, proto::LOGIN, None)
            .form(&[("username", username), ("password", password)]);
        async move {
            let token: TokenResponse = call_json(builder).await?;
            if token.access_token.trim().is_empty() {
                return Err(Error::new(
                    "login returned an empty token",
                    ErrorKind::Transport,
                ));
            }
            Ok(Credential::new(token.access_token))
        }
    }

    fn me(
        &self,
        credential: Option<&Credential>,
    ) -> impl Future<Output = Result<Identity, Self::Error>> + Send + 'static
    {
        call_json(self.request(Method::GET, proto::ME, credential))
    }

    fn send_message(
        &self,
        credential: Option<&Credential>,
        request: &SendMessageRequest,
    ) -> impl Future<Output = Result<SendMessageAck, Self::Error>> + Send + 'static
    {
        trace!("sending message: {request:?}");
        call_json(
            self.request(Method::POST, proto::SEND_MESSAGE, credential)
                .json(request),
        )
    }

    fn list_conversations(
        &self,
        credential: Option<&Credential>,
    ) -> impl Future<Output = Result<Vec<ConversationSummary>, Self::Error>>
    + Send
    + 'static {
        call_json(self.request(Method::GET, proto::CONVERSATIONS, credential))
    }

    fn get_conversation(
        &self,
        credential: Option<&Credential>,
        id: ConversationId,
    ) -> impl Future<Output = Result<Conversation, Self::Error>> + Send + 'static
    {
        call_json(self.request(
            Method::GET,
            &proto::conversation(id),
            credential,
        ))
    }

    fn delete_conversation(
        &self,
        credential: Option<&Credential>,
        id: ConversationId,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        call_empty(self.request(
            Method::DELETE,
            &proto::conversation(id),
            credential,
        ))
    }

    fn upload_document(
        &self,
        credential: Option<&Credential>,
        upload: DocumentUpload,
    ) -> impl Future<Output = Result<DocumentSummary, Self::Error>> + Send + 'static
    {
        let mime = upload
            .content_type
            .parse::<Mime>()
            .unwrap_or(mime::APPLICATION_OCTET_STREAM);
        let part = Part::stream(Bytes::from(upload.data))
            .file_name(upload.filename)
            .mime_str(mime.as_ref());
        let builder = self.request(Method::POST, proto::UPLOAD_DOCUMENT, credential);
        async move {
            let part = part.map_err(Error::from_reqwest)?;
            call_json(builder.multipart(Form::new().part("file", part))).await
        }
    }

    fn list_documents(
        &self,
        credential: Option<&Credential>,
    ) -> impl Future<Output = Result<Vec<DocumentSummary>, Self::Error>>
    + Send
    + 'static {
        call_json(self.request(Method::GET, proto::DOCUMENTS, credential))
    }

    fn get_document(
        &self,
        credential: Option<&Credential>,
        id: DocumentId,
    ) -> impl Future<Output = Result<DocumentSummary, Self::Error>> + Send + 'static
    {
        call_json(self.request(Method::GET, &proto::document(id), credential))
    }

    fn delete_document(
        &self,
        credential: Option<&Credential>,
        id: DocumentId,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'static {
        call_empty(self.request(
            Method::DELETE,
            &proto::document(id),
            credential,
        ))
    }

    fn analytics_overview(
        &self,
        credential: Option<&Credential>,
    ) -> impl Future<Output = Result<AnalyticsOverview, Self::Error>> + Send + 'static
    {
        call_json(self.request(
            Method::GET,
            proto::ANALYTICS_OVERVIEW,
            credential,
        ))
    }

    fn analytics_usage(
        &self,
        credential: Option<&Credential>,
        days: u32,
    ) -> impl Future<Output = Result<Vec<UsageStats>, Self::Error>> + Send + 'static
    {
        call_json(self.request(
            Method::GET,
            &proto::analytics_usage(days),
            credential,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_backend_is_a_transport_error() {
        // Port 9 (discard) is not expected to accept HTTP connections.
        let config = HttpBackendConfigBuilder::new()
            .with_base_url("http://127.0.0.1:9")
            .build();
        let backend = HttpBackend::new(config);
        let err = backend.list_conversations(None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[test]
    fn test_bearer_header() {
        let backend = HttpBackend::new(HttpBackendConfigBuilder::new().build());
        let credential = Credential::new("abc");
        let req = backend
            .request(Method::GET, proto::ME, Some(&credential))
            .build()
            .unwrap();
        assert_eq!(
            req.headers()[reqwest::header::AUTHORIZATION],
            "Bearer abc"
        );
        assert_eq!(req.url().as_str(), "http://localhost:8000/api/v1/auth/me");

        let req = backend
            .request(Method::GET, proto::ME, Some(&Credential::new("")))
            .build()
            .unwrap();
        assert!(!req.headers().contains_key(reqwest::header::AUTHORIZATION));
    }
}
