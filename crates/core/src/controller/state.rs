use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use docchat_api::{ConversationId, Credential, Identity};
use docchat_event_loop::{Event, EventLoop};
use tokio::time::timeout;
use tracing::Instrument;

use super::Snapshot;
use crate::backend_client::BackendClient;
use crate::config::ControllerConfig;
use crate::conversation::{
    Conversation, ConversationKey, MessageIds, Phase, RemoteId,
};
use crate::events::ControllerEvent;
use crate::session::Session;
use crate::stream::Reveal;
use crate::{Error, ErrorKind};

pub type Handle = EventLoop<ControllerState>;
pub type EventCallback = Box<dyn Fn(ControllerEvent) + Send + Sync>;

/// Delete gesture state of a list item. Items without an entry are idle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Hold {
    /// Pressed, waiting for the timer tagged with this sequence number.
    Pressing(u64),
    /// Showing the delete controls.
    Armed,
    /// A delete request is in flight; `armed` tells whether it came from
    /// the gesture.
    Deleting { armed: bool },
}

/// The state owned by the controller's loop.
///
/// Every field is only touched while handling an event, so a handler
/// always sees a consistent state. Async work is spawned and reports back
/// with an event, whose handler checks that its target still exists.
pub struct ControllerState {
    pub(super) backend: BackendClient,
    pub(super) config: ControllerConfig,
    pub(super) reveal: Arc<dyn Reveal>,
    pub(super) on_event: Option<EventCallback>,
    pub(super) session: Session,
    pub(super) conversations: HashMap<ConversationKey, Conversation>,
    pub(super) active: Option<ConversationKey>,
    pub(super) phases: HashMap<ConversationKey, Phase>,
    pub(super) holds: HashMap<ConversationId, Hold>,
    pub(super) message_ids: MessageIds,
    pub(super) next_key: u64,
    pub(super) next_seq: u64,
    pub(super) selection: u64,
}

impl ControllerState {
    pub(super) fn new(
        backend: BackendClient,
        config: ControllerConfig,
        reveal: Arc<dyn Reveal>,
        on_event: Option<EventCallback>,
        session: Session,
    ) -> Self {
        Self {
            backend,
            config,
            reveal,
            on_event,
            session,
            conversations: Default::default(),
            active: None,
            phases: Default::default(),
            holds: Default::default(),
            message_ids: MessageIds::new(),
            next_key: 1,
            next_seq: 1,
            selection: 0,
        }
    }

    pub(super) fn emit(&self, event: ControllerEvent) {
        trace!("emit: {event:?}");
        if let Some(on_event) = &self.on_event {
            on_event(event);
        }
    }

    pub(super) fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    pub(super) fn allocate_key(&mut self) -> ConversationKey {
        let key = ConversationKey(self.next_key);
        self.next_key += 1;
        key
    }

    pub(super) fn key_for(&self, id: ConversationId) -> Option<ConversationKey> {
        self.conversations
            .values()
            .find(|c| c.remote() == RemoteId::Persisted(id))
            .map(Conversation::key)
    }

    pub(super) fn set_active(&mut self, key: Option<ConversationKey>) {
        if self.active == key {
            return;
        }
        self.active = key;
        self.forget_unreachable();
        self.emit(ControllerEvent::ActiveConversationChanged(key));
    }

    pub(super) fn set_phase(&mut self, key: ConversationKey, phase: Phase) {
        let changed = match &phase {
            Phase::Idle => self.phases.remove(&key).is_some(),
            _ => self.phases.insert(key, phase.clone()).as_ref() != Some(&phase),
        };
        if !changed {
            return;
        }
        if !phase.is_busy() {
            self.forget_unreachable();
        }
        self.emit(ControllerEvent::PhaseChanged {
            conversation: key,
            phase,
        });
    }

    pub(super) fn emit_conversation(&self, key: ConversationKey) {
        if let Some(conversation) = self.conversations.get(&key) {
            self.emit(ControllerEvent::ConversationUpdated(conversation.clone()));
        }
    }

    /// Drops unpersisted conversations nobody can reach anymore.
    ///
    /// Persisted ones are kept as a cache, since they can be selected
    /// again from the list.
    fn forget_unreachable(&mut self) {
        let active = self.active;
        let phases = &self.phases;
        self.conversations.retain(|key, conversation| {
            Some(*key) == active
                || phases.contains_key(key)
                || conversation.remote() != RemoteId::Unpersisted
        });
    }

    /// Stores a fresh session and loads its conversation list.
    ///
    /// A session already held is cleared first, so nothing of the previous
    /// account survives the switch.
    pub(super) fn install_session(
        &mut self,
        credential: Credential,
        identity: Identity,
        handle: &Handle,
    ) {
        if self.session.credential().is_some() {
            self.logout();
        }
        info!("logged in as {}", identity.username);
        self.session.set_credential(Some(credential));
        self.session.set_identity(Some(identity.clone()));
        self.emit(ControllerEvent::SessionChanged(Some(identity)));
        self.refresh_list(handle);
    }

    /// Clears the session and everything derived from it in one step.
    pub(super) fn logout(&mut self) {
        info!("logging out");
        self.session.clear();
        self.conversations.clear();
        self.phases.clear();
        self.holds.clear();
        self.active = None;
        self.selection = self.next_seq();

        self.emit(ControllerEvent::SessionChanged(None));
        self.emit(ControllerEvent::ConversationListChanged(vec![]));
        self.emit(ControllerEvent::ActiveConversationChanged(None));
    }

    /// Handles an authentication rejection for a call made in `epoch`.
    ///
    /// Returns `true` if the session was cleared.
    pub(super) fn reject_credential(&mut self, epoch: u64) -> bool {
        if epoch != self.session.epoch() || self.session.credential().is_none()
        {
            debug!("ignore a rejection from an older session");
            return false;
        }
        warn!("the credential was rejected, continue anonymously");
        self.logout();
        true
    }

    /// Reports a failed background call.
    pub(super) fn report(&mut self, epoch: u64, err: Error) {
        if err.is_unauthorized() && self.reject_credential(epoch) {
            return;
        }
        warn!("{err}");
        self.emit(ControllerEvent::Notice(err));
    }

    pub(super) fn refresh_list(&mut self, handle: &Handle) {
        let Some(credential) = self.session.credential() else {
            return;
        };
        let epoch = self.session.epoch();
        let fut = with_deadline(
            self.config.request_timeout,
            self.backend.list_conversations(Some(credential)),
        );
        spawn_then(handle, async move {
            ListLoaded {
                epoch,
                result: fut.await,
            }
        });
    }

    pub(super) fn snapshot(&self) -> Snapshot {
        Snapshot {
            identity: self.session.identity().cloned(),
            authenticated: self.session.credential().is_some(),
            conversation_list: self.session.conversation_list().to_vec(),
            active: self.active,
            conversations: self.conversations.clone(),
            phases: self.phases.clone(),
            armed: self
                .holds
                .iter()
                .filter(|(_, hold)| **hold == Hold::Armed)
                .map(|(id, _)| *id)
                .collect(),
            rag_mode: self.session.rag_mode(),
            avatar: self.session.avatar().map(str::to_owned),
        }
    }
}

/// Runs `fut` on its own task and posts the event it resolves to.
pub fn spawn_then<E, F>(handle: &Handle, fut: F)
where
    E: Event<ControllerState>,
    F: Future<Output = E> + Send + 'static,
{
    let handle = handle.clone();
    tokio::spawn(
        async move {
            let event = fut.await;
            if handle.send(event).is_err() {
                debug!("controller has stopped, drop the result");
            }
        }
        .in_current_span(),
    );
}

/// Fails with a transport error if `fut` doesn't finish in time.
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, Error>>,
{
    match timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::transport().with_reason("request timed out")),
    }
}

#[derive(Debug)]
pub struct ListLoaded {
    epoch: u64,
    result: Result<Vec<docchat_api::ConversationSummary>, Error>,
}

impl Event<ControllerState> for ListLoaded {
    fn handle(self, state: &mut ControllerState, _handle: &Handle) {
        if self.epoch != state.session.epoch() {
            debug!("discard a list from an older session");
            return;
        }
        match self.result {
            Ok(list) => {
                debug!("loaded {} conversations", list.len());
                state.session.set_conversation_list(list.clone());
                state.emit(ControllerEvent::ConversationListChanged(list));
            }
            Err(err) => state.report(self.epoch, err),
        }
    }
}

#[derive(Debug)]
pub struct IdentityLoaded {
    pub(super) epoch: u64,
    pub(super) result: Result<Identity, Error>,
}

impl Event<ControllerState> for IdentityLoaded {
    fn handle(self, state: &mut ControllerState, handle: &Handle) {
        if self.epoch != state.session.epoch() {
            debug!("discard an identity from an older session");
            return;
        }
        match self.result {
            Ok(identity) => {
                info!("restored session of {}", identity.username);
                state.session.set_identity(Some(identity.clone()));
                state.emit(ControllerEvent::SessionChanged(Some(identity)));
                state.refresh_list(handle);
            }
            // A session that can't be restored degrades to anonymous mode
            // without telling the user.
            Err(err) if err.kind() == ErrorKind::Unauthorized => {
                state.reject_credential(self.epoch);
            }
            Err(err) => state.report(self.epoch, err),
        }
    }
}

#[derive(Debug)]
pub struct RestoreSession;

impl Event<ControllerState> for RestoreSession {
    fn handle(self, state: &mut ControllerState, handle: &Handle) {
        let Some(credential) = state.session.credential() else {
            debug!("no stored session");
            return;
        };
        let epoch = state.session.epoch();
        let fut = with_deadline(
            state.config.request_timeout,
            state.backend.me(Some(credential)),
        );
        spawn_then(handle, async move {
            IdentityLoaded {
                epoch,
                result: fut.await,
            }
        });
    }
}

#[derive(Debug)]
pub struct Logout;

impl Event<ControllerState> for Logout {
    #[inline]
    fn handle(self, state: &mut ControllerState, _handle: &Handle) {
        state.logout();
    }
}

#[derive(Debug)]
pub struct RejectCredential(pub(super) u64);

impl Event<ControllerState> for RejectCredential {
    #[inline]
    fn handle(self, state: &mut ControllerState, _handle: &Handle) {
        state.reject_credential(self.0);
    }
}

#[derive(Debug)]
pub struct SetRagMode(pub(super) docchat_api::RagMode);

impl Event<ControllerState> for SetRagMode {
    #[inline]
    fn handle(self, state: &mut ControllerState, _handle: &Handle) {
        debug!("retrieval mode is now {}", self.0);
        state.session.set_rag_mode(self.0);
    }
}
