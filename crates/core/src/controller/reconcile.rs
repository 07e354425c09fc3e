use docchat_api::{Conversation as RemoteConversation, ConversationId};
use docchat_event_loop::Event;
use tokio::time::sleep;

use super::state::{ControllerState, Handle, Hold, spawn_then, with_deadline};
use crate::Error;
use crate::conversation::Conversation;
use crate::events::ControllerEvent;

impl ControllerState {
    fn select_conversation(&mut self, id: ConversationId, handle: &Handle) {
        if matches!(self.holds.get(&id), Some(Hold::Armed | Hold::Deleting { .. }))
        {
            debug!("conversation {id} shows delete controls, ignore selection");
            return;
        }
        let seq = self.next_seq();
        self.selection = seq;

        let epoch = self.session.epoch();
        let fut = with_deadline(
            self.config.request_timeout,
            self.backend.get_conversation(self.session.credential(), id),
        );
        spawn_then(handle, async move {
            SelectionLoaded {
                seq,
                epoch,
                result: fut.await,
            }
        });
    }

    fn new_chat(&mut self) {
        self.selection = self.next_seq();
        self.set_active(None);
    }

    fn press(&mut self, id: ConversationId, handle: &Handle) {
        if matches!(self.holds.get(&id), Some(Hold::Armed | Hold::Deleting { .. }))
        {
            return;
        }
        let seq = self.next_seq();
        self.holds.insert(id, Hold::Pressing(seq));

        let duration = self.config.hold_duration;
        spawn_then(handle, async move {
            sleep(duration).await;
            HoldElapsed { id, seq }
        });
    }

    fn release(&mut self, id: ConversationId) {
        // Releasing an armed item keeps the controls visible.
        if matches!(self.holds.get(&id), Some(Hold::Pressing(_))) {
            self.holds.remove(&id);
        }
    }

    fn cancel_delete(&mut self, id: ConversationId) {
        if self.holds.get(&id) == Some(&Hold::Armed) {
            self.holds.remove(&id);
            self.emit(ControllerEvent::DeleteDisarmed(id));
        }
    }

    fn confirm_delete(&mut self, id: ConversationId, handle: &Handle) {
        if self.holds.get(&id) != Some(&Hold::Armed) {
            debug!("conversation {id} isn't armed, ignore confirmation");
            return;
        }
        self.delete_conversation(id, handle);
    }

    fn delete_conversation(&mut self, id: ConversationId, handle: &Handle) {
        let armed = match self.holds.get(&id) {
            Some(Hold::Deleting { .. }) => {
                debug!("conversation {id} is already being deleted");
                return;
            }
            Some(Hold::Armed) => true,
            _ => false,
        };
        self.holds.insert(id, Hold::Deleting { armed });

        let epoch = self.session.epoch();
        let fut = with_deadline(
            self.config.request_timeout,
            self.backend.delete_conversation(self.session.credential(), id),
        );
        spawn_then(handle, async move {
            DeleteFinished {
                id,
                epoch,
                result: fut.await,
            }
        });
    }
}

#[derive(Debug)]
pub struct SelectConversation(pub(super) ConversationId);

impl Event<ControllerState> for SelectConversation {
    #[inline]
    fn handle(self, state: &mut ControllerState, handle: &Handle) {
        state.select_conversation(self.0, handle);
    }
}

#[derive(Debug)]
struct SelectionLoaded {
    seq: u64,
    epoch: u64,
    result: Result<RemoteConversation, Error>,
}

impl Event<ControllerState> for SelectionLoaded {
    fn handle(self, state: &mut ControllerState, _handle: &Handle) {
        if self.seq != state.selection {
            debug!("selection {} was superseded", self.seq);
            return;
        }
        let remote = match self.result {
            Ok(remote) => remote,
            Err(err) => {
                state.report(self.epoch, err);
                return;
            }
        };

        let key = match state.key_for(remote.id) {
            Some(key) => {
                // A busy conversation keeps its local copy; the pending
                // reply replaces it when done.
                if !state.phases.contains_key(&key) {
                    if let Some(local) = state.conversations.get_mut(&key) {
                        local.replace_with(remote);
                    }
                }
                key
            }
            None => {
                let key = state.allocate_key();
                state
                    .conversations
                    .insert(key, Conversation::from_remote(key, remote));
                key
            }
        };
        state.emit_conversation(key);
        state.set_active(Some(key));
    }
}

#[derive(Debug)]
pub struct NewChat;

impl Event<ControllerState> for NewChat {
    #[inline]
    fn handle(self, state: &mut ControllerState, _handle: &Handle) {
        state.new_chat();
    }
}

#[derive(Debug)]
pub struct Press(pub(super) ConversationId);

impl Event<ControllerState> for Press {
    #[inline]
    fn handle(self, state: &mut ControllerState, handle: &Handle) {
        state.press(self.0, handle);
    }
}

#[derive(Debug)]
pub struct Release(pub(super) ConversationId);

impl Event<ControllerState> for Release {
    #[inline]
    fn handle(self, state: &mut ControllerState, _handle: &Handle) {
        state.release(self.0);
    }
}

#[derive(Debug)]
struct HoldElapsed {
    id: ConversationId,
    seq: u64,
}

impl Event<ControllerState> for HoldElapsed {
    fn handle(self, state: &mut ControllerState, _handle: &Handle) {
        if state.holds.get(&self.id) != Some(&Hold::Pressing(self.seq)) {
            return;
        }
        state.holds.insert(self.id, Hold::Armed);
        state.emit(ControllerEvent::DeleteArmed(self.id));
    }
}

#[derive(Debug)]
pub struct CancelDelete(pub(super) ConversationId);

impl Event<ControllerState> for CancelDelete {
    #[inline]
    fn handle(self, state: &mut ControllerState, _handle: &Handle) {
        state.cancel_delete(self.0);
    }
}

#[derive(Debug)]
pub struct ConfirmDelete(pub(super) ConversationId);

impl Event<ControllerState> for ConfirmDelete {
    #[inline]
    fn handle(self, state: &mut ControllerState, handle: &Handle) {
        state.confirm_delete(self.0, handle);
    }
}

#[derive(Debug)]
pub struct DeleteConversation(pub(super) ConversationId);

impl Event<ControllerState> for DeleteConversation {
    #[inline]
    fn handle(self, state: &mut ControllerState, handle: &Handle) {
        state.delete_conversation(self.0, handle);
    }
}

#[derive(Debug)]
struct DeleteFinished {
    id: ConversationId,
    epoch: u64,
    result: Result<(), Error>,
}

impl Event<ControllerState> for DeleteFinished {
    fn handle(self, state: &mut ControllerState, handle: &Handle) {
        let id = self.id;
        let armed = matches!(
            state.holds.remove(&id),
            Some(Hold::Deleting { armed: true })
        );
        if armed {
            state.emit(ControllerEvent::DeleteDisarmed(id));
        }

        if let Err(err) = self.result {
            state.report(self.epoch, err);
            return;
        }

        info!("deleted conversation {id}");
        if let Some(key) = state.key_for(id) {
            state.conversations.remove(&key);
            state.phases.remove(&key);
            if state.active == Some(key) {
                state.set_active(None);
            }
        }
        // The backend decides the order, so the list is always reloaded.
        state.refresh_list(handle);
    }
}
