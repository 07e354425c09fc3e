use docchat_api::{
    Conversation as RemoteConversation, ConversationSummary, Message, Role,
    SendMessageRequest,
};
use docchat_event_loop::Event;
use tokio::time::sleep;
use tracing::Instrument;

use super::state::{ControllerState, Handle, spawn_then, with_deadline};
use crate::Error;
use crate::conversation::{self, Conversation, ConversationKey, Phase, RemoteId};
use crate::events::ControllerEvent;
use crate::stream::next_increment;

/// Number of characters of the first message used as a title.
const TITLE_LEN: usize = 50;

/// Derives the title of a new conversation from its first message.
pub(crate) fn provisional_title(text: &str) -> String {
    text.chars().take(TITLE_LEN).collect()
}

/// The reply shown to users who are not logged in.
pub(crate) fn anonymous_reply(text: &str) -> String {
    format!(
        "I received your message: \"{text}\"\n\n\
         To use the full AI-powered chat with document search, please login \
         or create an account using the button in the sidebar.\n\n\
         With an account, you can:\n\
         - Upload documents\n\
         - Get AI-powered answers from your documents\n\
         - Save conversation history\n\
         - Access analytics"
    )
}

#[derive(Debug)]
pub enum Reply {
    /// Made up locally, appended once revealed.
    Synthesized(Message),
    /// The conversation as stored by the backend, including the reply.
    Authoritative {
        conversation: RemoteConversation,
        list: Option<Vec<ConversationSummary>>,
    },
}

/// What to apply to the conversation once a reply is fully revealed.
#[derive(Debug)]
pub enum Commit {
    Append(Message),
    Replace(RemoteConversation),
}

impl ControllerState {
    fn send_message(&mut self, text: String, handle: &Handle) {
        // Only the emptiness check and the title see the trimmed text, the
        // message is sent as typed.
        if text.trim().is_empty() {
            debug!("ignore empty input");
            return;
        }
        if let Some(key) = self.active {
            if self.phases.contains_key(&key) {
                debug!("{key} is busy, ignore input");
                return;
            }
        }

        let key = match self.active {
            Some(key) => key,
            None => {
                let key = self.allocate_key();
                let title = provisional_title(text.trim());
                let conversation = Conversation::provisional(key, title);
                self.conversations.insert(key, conversation);
                self.set_active(Some(key));
                key
            }
        };
        let message = Message {
            id: self.message_ids.next(),
            role: Role::User,
            content: text.clone(),
            sources: vec![],
            created_at: conversation::now(),
        };
        let Some(conversation) = self.conversations.get_mut(&key) else {
            error!("active conversation {key} is missing");
            return;
        };
        conversation.push(message);
        let conversation_id = conversation.id();
        self.emit_conversation(key);
        self.set_phase(key, Phase::Pending);

        let epoch = self.session.epoch();
        let Some(credential) = self.session.credential().cloned() else {
            let reply = Message {
                id: self.message_ids.next(),
                role: Role::Assistant,
                content: anonymous_reply(&text),
                sources: vec![],
                created_at: conversation::now(),
            };
            let delay = self.config.anonymous_delay;
            spawn_then(handle, async move {
                sleep(delay).await;
                ReplyReady {
                    conversation: key,
                    epoch,
                    result: Ok(Reply::Synthesized(reply)),
                }
            });
            return;
        };

        let request = SendMessageRequest {
            content: text,
            conversation_id,
            rag_mode: Some(self.session.rag_mode()),
        };
        let backend = self.backend.clone();
        let deadline = self.config.request_timeout;
        let span = debug_span!("dispatch", conversation = %key);
        spawn_then(handle, async move {
            let work = async {
                let ack =
                    backend.send_message(Some(&credential), &request).await?;
                let conversation = backend
                    .get_conversation(Some(&credential), ack.conversation_id)
                    .await?;
                let list = if conversation_id.is_none() {
                    match backend.list_conversations(Some(&credential)).await {
                        Ok(list) => Some(list),
                        Err(err) => {
                            warn!("failed to refresh the list: {err}");
                            None
                        }
                    }
                } else {
                    None
                };
                Ok::<_, Error>(Reply::Authoritative { conversation, list })
            };
            ReplyReady {
                conversation: key,
                epoch,
                result: with_deadline(deadline, work).await,
            }
        }
        .instrument(span));
    }

    fn start_reveal(
        &mut self,
        key: ConversationKey,
        text: String,
        commit: Commit,
        handle: &Handle,
    ) {
        self.set_phase(key, Phase::Streaming(String::new()));

        let mut stream = self.reveal.reveal(text);
        let handle = handle.clone();
        tokio::spawn(
            async move {
                while let Some(increment) = next_increment(&mut stream).await {
                    let progress = RevealProgress {
                        conversation: key,
                        increment,
                    };
                    if handle.send(progress).is_err() {
                        return;
                    }
                }
                handle
                    .send(RevealFinished {
                        conversation: key,
                        commit,
                    })
                    .ok();
            }
            .instrument(trace_span!("reveal", conversation = %key)),
        );
    }

    /// Applies a finished reply. Returns `false` if the target is gone.
    fn commit(&mut self, key: ConversationKey, commit: Commit) -> bool {
        let Some(conversation) = self.conversations.get_mut(&key) else {
            return false;
        };
        match commit {
            Commit::Append(message) => {
                if !conversation.push(message) {
                    debug!("reply already in {key}");
                }
            }
            Commit::Replace(remote) => conversation.replace_with(remote),
        }
        self.emit_conversation(key);
        true
    }
}

#[derive(Debug)]
pub struct SendMessage(pub(super) String);

impl Event<ControllerState> for SendMessage {
    #[inline]
    fn handle(self, state: &mut ControllerState, handle: &Handle) {
        state.send_message(self.0, handle);
    }
}

#[derive(Debug)]
pub struct ReplyReady {
    conversation: ConversationKey,
    epoch: u64,
    result: Result<Reply, Error>,
}

impl Event<ControllerState> for ReplyReady {
    fn handle(self, state: &mut ControllerState, handle: &Handle) {
        let key = self.conversation;
        let pending = state.conversations.contains_key(&key)
            && state.phases.get(&key) == Some(&Phase::Pending);
        if !pending {
            debug!("{key} is gone, discard the reply");
            return;
        }

        let reply = match self.result {
            Ok(reply) => reply,
            Err(err) => {
                // The optimistic user message stays, so the input isn't lost.
                state.set_phase(key, Phase::Idle);
                state.report(self.epoch, err);
                return;
            }
        };

        match reply {
            Reply::Synthesized(message) => {
                let text = message.content.clone();
                state.start_reveal(key, text, Commit::Append(message), handle);
            }
            Reply::Authoritative { conversation, list } => {
                if let Some(local) = state.conversations.get_mut(&key) {
                    local.set_remote(RemoteId::Persisted(conversation.id));
                }
                state.emit_conversation(key);
                if let Some(list) = list {
                    if self.epoch == state.session.epoch() {
                        state.session.set_conversation_list(list.clone());
                        state.emit(ControllerEvent::ConversationListChanged(list));
                    }
                }

                let reply = conversation
                    .messages
                    .last()
                    .filter(|m| m.role == Role::Assistant)
                    .map(|m| m.content.clone());
                match reply {
                    Some(text) => {
                        let commit = Commit::Replace(conversation);
                        state.start_reveal(key, text, commit, handle);
                    }
                    None => {
                        state.commit(key, Commit::Replace(conversation));
                        state.set_phase(key, Phase::Idle);
                    }
                }
            }
        }
    }
}

#[derive(Debug)]
struct RevealProgress {
    conversation: ConversationKey,
    increment: String,
}

impl Event<ControllerState> for RevealProgress {
    fn handle(self, state: &mut ControllerState, _handle: &Handle) {
        let key = self.conversation;
        let Some(Phase::Streaming(text)) = state.phases.get_mut(&key) else {
            return;
        };
        text.push_str(&self.increment);
        let text = text.clone();
        state.emit(ControllerEvent::StreamProgress {
            conversation: key,
            text,
        });
    }
}

#[derive(Debug)]
struct RevealFinished {
    conversation: ConversationKey,
    commit: Commit,
}

impl Event<ControllerState> for RevealFinished {
    fn handle(self, state: &mut ControllerState, _handle: &Handle) {
        let key = self.conversation;
        if !matches!(state.phases.get(&key), Some(Phase::Streaming(_))) {
            debug!("{key} is gone, discard the revealed reply");
            return;
        }
        state.commit(key, self.commit);
        state.set_phase(key, Phase::Idle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provisional_title() {
        assert_eq!(provisional_title("Explain X"), "Explain X");
        let long = "é".repeat(80);
        assert_eq!(provisional_title(&long).chars().count(), 50);
    }

    #[test]
    fn test_anonymous_reply() {
        let reply = anonymous_reply("hello");
        assert!(reply.starts_with("I received your message: \"hello\"\n\n"));
        assert!(reply.ends_with("- Access analytics"));
        assert_eq!(reply.lines().filter(|l| l.starts_with("- ")).count(), 4);
    }
}
