//! Conversation-related types.

use std::fmt::{self, Display};

use chrono::{NaiveDateTime, Utc};
use docchat_api::{
    Conversation as RemoteConversation, ConversationId, Message, MessageId,
    Role,
};

/// Local identity of a conversation.
///
/// Keys are assigned by the controller and stay the same when a new
/// conversation gets persisted by the backend, so in-flight work can keep
/// targeting it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationKey(pub(crate) u64);

impl Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Whether the backend knows about a conversation yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemoteId {
    /// Created locally, not stored by the backend.
    Unpersisted,
    /// Stored by the backend under this identifier.
    Persisted(ConversationId),
}

/// Represents a conversation.
#[derive(Clone, Debug, PartialEq)]
pub struct Conversation {
    key: ConversationKey,
    remote: RemoteId,
    title: String,
    messages: Vec<Message>,
    created_at: NaiveDateTime,
    updated_at: NaiveDateTime,
}

impl Conversation {
    pub(crate) fn provisional(key: ConversationKey, title: String) -> Self {
        let now = now();
        Self {
            key,
            remote: RemoteId::Unpersisted,
            title,
            messages: vec![],
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn from_remote(
        key: ConversationKey,
        conversation: RemoteConversation,
    ) -> Self {
        let mut this = Self::provisional(key, String::new());
        this.replace_with(conversation);
        this
    }

    /// Replaces everything with the authoritative copy.
    pub(crate) fn replace_with(&mut self, conversation: RemoteConversation) {
        self.remote = RemoteId::Persisted(conversation.id);
        self.title = conversation.title;
        self.messages = conversation.messages;
        self.created_at = conversation.created_at;
        self.updated_at = conversation.updated_at;
    }

    #[inline]
    pub(crate) fn set_remote(&mut self, remote: RemoteId) {
        self.remote = remote;
    }

    /// Appends a message. Returns `false` if a message with the same
    /// identifier is already present.
    pub(crate) fn push(&mut self, message: Message) -> bool {
        if self.messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        self.updated_at = message.created_at;
        self.messages.push(message);
        true
    }

    /// Returns the local key.
    #[inline]
    pub fn key(&self) -> ConversationKey {
        self.key
    }

    /// Returns whether the backend knows about this conversation.
    #[inline]
    pub fn remote(&self) -> RemoteId {
        self.remote
    }

    /// Returns the backend identifier, if persisted.
    #[inline]
    pub fn id(&self) -> Option<ConversationId> {
        match self.remote {
            RemoteId::Persisted(id) => Some(id),
            RemoteId::Unpersisted => None,
        }
    }

    /// Returns the title.
    #[inline]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the messages, oldest first.
    #[inline]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the last message if it was written by the assistant.
    pub fn last_reply(&self) -> Option<&Message> {
        self.messages.last().filter(|m| m.role == Role::Assistant)
    }

    /// Returns the creation time (UTC).
    #[inline]
    pub fn created_at(&self) -> NaiveDateTime {
        self.created_at
    }

    /// Returns the last update time (UTC).
    #[inline]
    pub fn updated_at(&self) -> NaiveDateTime {
        self.updated_at
    }
}

/// What is going on with a conversation.
///
/// A single value per conversation, so a conversation can never be
/// pending and streaming at once.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Nothing in flight.
    #[default]
    Idle,
    /// A message was sent, no reply content yet.
    Pending,
    /// The reply is being revealed; holds the text revealed so far.
    Streaming(String),
}

impl Phase {
    /// Returns `true` unless the phase is [`Phase::Idle`].
    #[inline]
    pub fn is_busy(&self) -> bool {
        !matches!(self, Phase::Idle)
    }
}

/// Hands out message identifiers for locally created messages.
///
/// Identifiers are seeded by the wall clock in milliseconds and strictly
/// increase, even when several are requested within one millisecond.
#[derive(Debug)]
pub(crate) struct MessageIds {
    last: u64,
}

impl MessageIds {
    pub(crate) fn new() -> Self {
        Self {
            last: wall_clock_millis().saturating_sub(1),
        }
    }

    pub(crate) fn next(&mut self) -> MessageId {
        self.last = wall_clock_millis().max(self.last + 1);
        MessageId(self.last)
    }
}

fn wall_clock_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

#[inline]
pub(crate) fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn message(id: u64, role: Role) -> Message {
        Message {
            id: MessageId(id),
            role,
            content: format!("message {id}"),
            sources: vec![],
            created_at: now(),
        }
    }

    #[test]
    fn test_message_ids_never_repeat() {
        let mut ids = MessageIds::new();
        let generated: HashSet<_> = (0..1000).map(|_| ids.next()).collect();
        assert_eq!(generated.len(), 1000);
    }

    #[test]
    fn test_push_ignores_duplicates() {
        let mut conversation =
            Conversation::provisional(ConversationKey(1), "Hi".to_owned());
        assert!(conversation.push(message(1, Role::User)));
        assert!(!conversation.push(message(1, Role::User)));
        assert_eq!(conversation.messages().len(), 1);
        assert!(conversation.last_reply().is_none());

        assert!(conversation.push(message(2, Role::Assistant)));
        assert_eq!(conversation.last_reply().map(|m| m.id), Some(MessageId(2)));
    }

    #[test]
    fn test_replace_with_persists() {
        let mut conversation =
            Conversation::provisional(ConversationKey(1), "Hi".to_owned());
        conversation.push(message(1, Role::User));
        assert_eq!(conversation.id(), None);

        conversation.replace_with(RemoteConversation {
            id: ConversationId(7),
            title: "Hi there".to_owned(),
            messages: vec![message(10, Role::User), message(11, Role::Assistant)],
            created_at: NaiveDateTime::default(),
            updated_at: NaiveDateTime::default(),
        });
        assert_eq!(conversation.key(), ConversationKey(1));
        assert_eq!(conversation.remote(), RemoteId::Persisted(ConversationId(7)));
        assert_eq!(conversation.title(), "Hi there");
        assert_eq!(conversation.messages().len(), 2);
    }
}
