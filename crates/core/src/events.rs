use docchat_api::{ConversationId, ConversationSummary, Identity};

use crate::Error;
use crate::conversation::{Conversation, ConversationKey, Phase};

/// Something observable changed in the controller.
///
/// Events are delivered in the order the changes happened, from within the
/// controller's loop. Callbacks should return quickly.
#[derive(Clone, Debug, PartialEq)]
pub enum ControllerEvent {
    /// The user logged in or out, or the identity was restored.
    SessionChanged(Option<Identity>),
    /// The avatar was set or cleared.
    AvatarChanged(Option<String>),
    /// The conversation list was replaced.
    ConversationListChanged(Vec<ConversationSummary>),
    /// Another conversation (or none) became active.
    ActiveConversationChanged(Option<ConversationKey>),
    /// Messages or metadata of a conversation changed.
    ConversationUpdated(Conversation),
    /// A conversation moved between idle, pending and streaming.
    PhaseChanged {
        /// The affected conversation.
        conversation: ConversationKey,
        /// The new phase.
        phase: Phase,
    },
    /// More of a reply has been revealed.
    StreamProgress {
        /// The conversation the reply belongs to.
        conversation: ConversationKey,
        /// Everything revealed so far.
        text: String,
    },
    /// A press was held long enough; the item shows delete controls.
    DeleteArmed(ConversationId),
    /// The delete controls of an item went away.
    DeleteDisarmed(ConversationId),
    /// A failure to show to the user.
    Notice(Error),
}
