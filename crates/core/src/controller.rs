mod builder;
mod dispatch;
mod reconcile;
mod state;

use std::collections::HashMap;

use docchat_api::{
    AnalyticsOverview, ConversationId, ConversationSummary, Credential,
    DocumentId, DocumentSummary, DocumentUpload, Identity, RagMode,
    Registration, UsageStats,
};
use docchat_event_loop::Event;

use crate::backend_client::{BackendClient, BackendFuture};
use crate::conversation::{Conversation, ConversationKey, Phase};
use crate::documents::{DEFAULT_USAGE_DAYS, validate_upload};
use crate::events::ControllerEvent;
use crate::session::avatar_data_url;
use crate::Error;
pub use builder::ControllerBuilder;
use dispatch::SendMessage;
use reconcile::{
    CancelDelete, ConfirmDelete, DeleteConversation, NewChat, Press, Release,
    SelectConversation,
};
use state::{ControllerState, Handle, Logout, RejectCredential, SetRagMode};

/// The conversation interaction controller.
///
/// The controller owns the session, the open conversations and the
/// conversation list, and mutates them on a single task. Methods without a
/// return value only enqueue a request; the outcome is reported through
/// [`ControllerEvent`]s and can be observed with [`Controller::snapshot`].
///
/// Results of async work are always applied to the conversation they were
/// started for, even if another conversation has been selected since. If
/// that conversation was deleted in the meantime, the results are dropped.
#[derive(Clone)]
pub struct Controller {
    handle: Handle,
    backend: BackendClient,
}

impl Controller {
    fn post<E: Event<ControllerState>>(&self, event: E) {
        if self.handle.send(event).is_err() {
            warn!("controller has been shut down");
        }
    }

    /// Sends a message in the active conversation, or in a new one when
    /// none is active.
    ///
    /// Blank input and input for a conversation that is still waiting for
    /// or revealing a reply are ignored.
    #[inline]
    pub fn send_message<S: Into<String>>(&self, text: S) {
        self.post(SendMessage(text.into()));
    }

    /// Loads a conversation and makes it active.
    ///
    /// Only the latest selection is applied.
    #[inline]
    pub fn select_conversation(&self, id: ConversationId) {
        self.post(SelectConversation(id));
    }

    /// Leaves the active conversation; the next message starts a new one.
    #[inline]
    pub fn new_chat(&self) {
        self.post(NewChat);
    }

    /// Starts pressing a list item. Holding it long enough arms the
    /// delete controls.
    #[inline]
    pub fn press_conversation(&self, id: ConversationId) {
        self.post(Press(id));
    }

    /// Stops pressing a list item.
    #[inline]
    pub fn release_conversation(&self, id: ConversationId) {
        self.post(Release(id));
    }

    /// Deletes an armed conversation.
    #[inline]
    pub fn confirm_delete(&self, id: ConversationId) {
        self.post(ConfirmDelete(id));
    }

    /// Hides the delete controls of an armed conversation.
    #[inline]
    pub fn cancel_delete(&self, id: ConversationId) {
        self.post(CancelDelete(id));
    }

    /// Deletes a conversation without going through the hold gesture.
    #[inline]
    pub fn delete_conversation(&self, id: ConversationId) {
        self.post(DeleteConversation(id));
    }

    /// Changes the retrieval mode used by subsequent messages.
    #[inline]
    pub fn set_rag_mode(&self, rag_mode: RagMode) {
        self.post(SetRagMode(rag_mode));
    }

    /// Clears the credential, the identity, the active conversation and
    /// the conversation list at once.
    #[inline]
    pub fn logout(&self) {
        self.post(Logout);
    }

    /// Logs in and loads the conversation list.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Identity, Error> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(Error::validation()
                .with_reason("username and password are required"));
        }
        let credential = self.backend.login(username, password).await?;
        let identity = self.backend.me(Some(&credential)).await?;
        let installed = identity.clone();
        self.handle
            .query(move |state, handle| {
                state.install_session(credential, installed, handle)
            })
            .await?;
        Ok(identity)
    }

    /// Creates an account, then logs into it.
    pub async fn register(
        &self,
        registration: Registration,
    ) -> Result<Identity, Error> {
        if registration.email.trim().is_empty()
            || registration.username.trim().is_empty()
            || registration.password.is_empty()
        {
            return Err(Error::validation()
                .with_reason("email, username and password are required"));
        }
        self.backend.register(&registration).await?;
        self.login(&registration.username, &registration.password)
            .await
    }

    /// Sets the avatar from raw image bytes.
    ///
    /// Only images up to 5 MB are accepted.
    pub async fn set_avatar(&self, data: &[u8], mime: &str) -> Result<(), Error> {
        let url = avatar_data_url(data, mime)?;
        self.handle
            .query(move |state, _| {
                state.session.set_avatar(Some(url.clone()));
                state.emit(ControllerEvent::AvatarChanged(Some(url)));
            })
            .await?;
        Ok(())
    }

    /// Removes the avatar.
    pub async fn clear_avatar(&self) -> Result<(), Error> {
        self.handle
            .query(|state, _| {
                state.session.set_avatar(None);
                state.emit(ControllerEvent::AvatarChanged(None));
            })
            .await?;
        Ok(())
    }

    /// Returns a consistent copy of the controller state.
    pub async fn snapshot(&self) -> Result<Snapshot, Error> {
        Ok(self.handle.query(|state, _| state.snapshot()).await?)
    }

    /// Lists the uploaded documents.
    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>, Error> {
        let (credential, epoch) = self.authorized().await?;
        let fut = self.backend.list_documents(Some(&credential));
        self.checked(epoch, fut).await
    }

    /// Fetches a single document.
    pub async fn get_document(
        &self,
        id: DocumentId,
    ) -> Result<DocumentSummary, Error> {
        let (credential, epoch) = self.authorized().await?;
        let fut = self.backend.get_document(Some(&credential), id);
        self.checked(epoch, fut).await
    }

    /// Deletes a document.
    pub async fn delete_document(&self, id: DocumentId) -> Result<(), Error> {
        let (credential, epoch) = self.authorized().await?;
        let fut = self.backend.delete_document(Some(&credential), id);
        self.checked(epoch, fut).await
    }

    /// Uploads a document after checking its type and size.
    pub async fn upload_document(
        &self,
        upload: DocumentUpload,
    ) -> Result<DocumentSummary, Error> {
        validate_upload(&upload)?;
        let (credential, epoch) = self.authorized().await?;
        info!("uploading {} ({} bytes)", upload.filename, upload.data.len());
        let fut = self.backend.upload_document(Some(&credential), upload);
        self.checked(epoch, fut).await
    }

    /// Fetches the aggregate usage counters.
    pub async fn analytics_overview(&self) -> Result<AnalyticsOverview, Error> {
        let (credential, epoch) = self.authorized().await?;
        let fut = self.backend.analytics_overview(Some(&credential));
        self.checked(epoch, fut).await
    }

    /// Fetches per-day usage, for the last week unless `days` is given.
    pub async fn analytics_usage(
        &self,
        days: Option<u32>,
    ) -> Result<Vec<UsageStats>, Error> {
        let days = days.unwrap_or(DEFAULT_USAGE_DAYS);
        let (credential, epoch) = self.authorized().await?;
        let fut = self.backend.analytics_usage(Some(&credential), days);
        self.checked(epoch, fut).await
    }

    /// Stops the controller. Pending work is abandoned.
    #[inline]
    pub fn shutdown(&self) {
        self.handle.shutdown();
    }

    async fn authorized(&self) -> Result<(Credential, u64), Error> {
        let (credential, epoch) = self
            .handle
            .query(|state, _| {
                (state.session.credential().cloned(), state.session.epoch())
            })
            .await?;
        let credential = credential
            .ok_or_else(|| Error::validation().with_reason("login required"))?;
        Ok((credential, epoch))
    }

    async fn checked<T>(
        &self,
        epoch: u64,
        fut: BackendFuture<T>,
    ) -> Result<T, Error> {
        let result = fut.await;
        if let Err(err) = &result {
            if err.is_unauthorized() {
                self.post(RejectCredential(epoch));
            }
        }
        result
    }
}

/// A copy of the controller state at one point in time.
#[derive(Clone, Debug)]
pub struct Snapshot {
    /// The logged-in user, once known.
    pub identity: Option<Identity>,
    /// Whether a credential is held, even if the identity isn't loaded.
    pub authenticated: bool,
    /// The conversation list, in the backend's order.
    pub conversation_list: Vec<ConversationSummary>,
    /// The active conversation.
    pub active: Option<ConversationKey>,
    /// Conversations held locally: the active one, the busy ones and
    /// previously loaded ones.
    pub conversations: HashMap<ConversationKey, Conversation>,
    /// Phases of the busy conversations.
    pub phases: HashMap<ConversationKey, Phase>,
    /// List items showing delete controls.
    pub armed: Vec<ConversationId>,
    /// Retrieval mode for the next message.
    pub rag_mode: RagMode,
    /// Avatar as a data URL.
    pub avatar: Option<String>,
}

impl Snapshot {
    /// Returns the active conversation.
    pub fn active_conversation(&self) -> Option<&Conversation> {
        self.active.and_then(|key| self.conversations.get(&key))
    }

    /// Returns the phase of a conversation.
    pub fn phase(&self, key: ConversationKey) -> &Phase {
        self.phases.get(&key).unwrap_or(&Phase::Idle)
    }
}
