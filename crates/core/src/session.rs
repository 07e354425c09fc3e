use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use docchat_api::{ConversationSummary, Credential, Identity, RagMode};

use crate::Error;
use crate::store::{AVATAR_KEY, CREDENTIAL_KEY, DurableStore};

/// Largest accepted avatar image, in bytes.
pub(crate) const MAX_AVATAR_SIZE: usize = 5 * 1024 * 1024;

/// Session-wide state: who is logged in and what they can see.
///
/// The credential and the avatar are mirrored to the durable store on
/// every change. Every credential change starts a new epoch, which lets
/// late results of calls made with an older credential be told apart.
pub(crate) struct Session {
    store: Box<dyn DurableStore>,
    credential: Option<Credential>,
    epoch: u64,
    identity: Option<Identity>,
    conversation_list: Vec<ConversationSummary>,
    avatar: Option<String>,
    rag_mode: RagMode,
}

impl Session {
    /// Creates the session from whatever the store holds.
    pub(crate) fn restore(store: Box<dyn DurableStore>) -> Self {
        let credential = store
            .get(CREDENTIAL_KEY)
            .filter(|token| !token.is_empty())
            .map(Credential::new);
        let avatar = store.get(AVATAR_KEY);
        Self {
            store,
            credential,
            epoch: 0,
            identity: None,
            conversation_list: vec![],
            avatar,
            rag_mode: RagMode::default(),
        }
    }

    #[inline]
    pub(crate) fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    #[inline]
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }

    pub(crate) fn set_credential(&mut self, credential: Option<Credential>) {
        let credential = credential.filter(|c| !c.is_empty());
        let result = match &credential {
            Some(credential) => {
                self.store.set(CREDENTIAL_KEY, credential.as_str())
            }
            None => self.store.remove(CREDENTIAL_KEY),
        };
        if let Err(err) = result {
            warn!("failed to persist the credential: {err}");
        }
        self.credential = credential;
        self.epoch += 1;
    }

    #[inline]
    pub(crate) fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    #[inline]
    pub(crate) fn set_identity(&mut self, identity: Option<Identity>) {
        self.identity = identity;
    }

    #[inline]
    pub(crate) fn conversation_list(&self) -> &[ConversationSummary] {
        &self.conversation_list
    }

    #[inline]
    pub(crate) fn set_conversation_list(
        &mut self,
        list: Vec<ConversationSummary>,
    ) {
        self.conversation_list = list;
    }

    #[inline]
    pub(crate) fn avatar(&self) -> Option<&str> {
        self.avatar.as_deref()
    }

    pub(crate) fn set_avatar(&mut self, avatar: Option<String>) {
        let result = match &avatar {
            Some(avatar) => self.store.set(AVATAR_KEY, avatar),
            None => self.store.remove(AVATAR_KEY),
        };
        if let Err(err) = result {
            warn!("failed to persist the avatar: {err}");
        }
        self.avatar = avatar;
    }

    #[inline]
    pub(crate) fn rag_mode(&self) -> RagMode {
        self.rag_mode
    }

    #[inline]
    pub(crate) fn set_rag_mode(&mut self, rag_mode: RagMode) {
        self.rag_mode = rag_mode;
    }

    /// Drops the credential, the identity and the conversation list.
    ///
    /// The avatar is a device preference and survives.
    pub(crate) fn clear(&mut self) {
        self.set_credential(None);
        self.identity = None;
        self.conversation_list.clear();
    }
}

/// Encodes an avatar image as a data URL after checking it.
pub(crate) fn avatar_data_url(data: &[u8], mime: &str) -> Result<String, Error> {
    let parsed: mime::Mime = mime.parse().map_err(|_| {
        Error::validation().with_reason(format!("`{mime}` is not a MIME type"))
    })?;
    if parsed.type_() != mime::IMAGE {
        return Err(Error::validation()
            .with_reason("please select an image file"));
    }
    if data.is_empty() {
        return Err(Error::validation().with_reason("the image is empty"));
    }
    if data.len() > MAX_AVATAR_SIZE {
        return Err(Error::validation()
            .with_reason("image size must be less than 5MB"));
    }
    Ok(format!(
        "data:{};base64,{}",
        parsed.essence_str(),
        STANDARD.encode(data)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use crate::store::MemoryStore;

    #[test]
    fn test_restore_and_clear() {
        let store = MemoryStore::with_values([
            (CREDENTIAL_KEY, "abc"),
            (AVATAR_KEY, "data:image/png;base64,AA=="),
        ]);
        let mut session = Session::restore(Box::new(store.clone()));
        assert_eq!(session.credential().map(Credential::as_str), Some("abc"));
        assert_eq!(session.epoch(), 0);

        session.clear();
        assert!(session.credential().is_none());
        assert_eq!(session.epoch(), 1);
        assert_eq!(store.get(CREDENTIAL_KEY), None);
        assert!(session.avatar().is_some());
    }

    #[test]
    fn test_empty_credential_is_absent() {
        let store = MemoryStore::default();
        let mut session = Session::restore(Box::new(store.clone()));
        session.set_credential(Some(Credential::new("")));
        assert!(session.credential().is_none());
        assert_eq!(store.get(CREDENTIAL_KEY), None);

        session.set_credential(Some(Credential::new("xyz")));
        assert_eq!(store.get(CREDENTIAL_KEY).as_deref(), Some("xyz"));
    }

    #[test]
    fn test_avatar_data_url() {
        let url = avatar_data_url(&[1, 2, 3], "image/png").unwrap();
        assert_eq!(url, "data:image/png;base64,AQID");

        for (data, mime) in [
            (&[1u8][..], "text/plain"),
            (&[1u8][..], "not a mime"),
            (&[][..], "image/png"),
        ] {
            let err = avatar_data_url(data, mime).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }

        let huge = vec![0; MAX_AVATAR_SIZE + 1];
        assert!(avatar_data_url(&huge, "image/jpeg").is_err());
    }
}
