use std::fmt::{self, Debug, Formatter};

use serde::{Deserialize, Serialize};

/// Identifier of a user account.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct UserId(pub u64);

/// The authenticated user.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identity {
    /// Stable identifier of the account.
    pub id: UserId,
    /// Email address.
    pub email: String,
    /// Login name.
    pub username: String,
    /// Optional human-readable name.
    #[serde(default)]
    pub full_name: Option<String>,
}

impl Identity {
    /// Returns the name to show for this user.
    ///
    /// This is the full name when one is set, otherwise the username.
    #[inline]
    pub fn display_name(&self) -> &str {
        match self.full_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.username,
        }
    }
}

/// A bearer credential issued by the backend at login.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wraps a raw token.
    #[inline]
    pub fn new<S: Into<String>>(token: S) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the token is empty, which never authenticates.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&"<deducted>").finish()
    }
}

/// Fields for creating a new account.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Registration {
    /// Email address.
    pub email: String,
    /// Login name.
    pub username: String,
    /// Plain-text password, only ever sent to the backend.
    pub password: String,
    /// Optional human-readable name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl Debug for Registration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password", &"<deducted>")
            .field("full_name", &self.full_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name() {
        let mut identity = Identity {
            id: UserId(1),
            email: "ada@example.com".to_owned(),
            username: "ada".to_owned(),
            full_name: None,
        };
        assert_eq!(identity.display_name(), "ada");

        identity.full_name = Some("Ada Lovelace".to_owned());
        assert_eq!(identity.display_name(), "Ada Lovelace");

        identity.full_name = Some("  ".to_owned());
        assert_eq!(identity.display_name(), "ada");
    }

    #[test]
    fn test_secrets_are_not_printed() {
        let credential = Credential::new("secret-token");
        assert!(!format!("{credential:?}").contains("secret-token"));

        let registration = Registration {
            email: "ada@example.com".to_owned(),
            username: "ada".to_owned(),
            password: "hunter2".to_owned(),
            full_name: None,
        };
        assert!(!format!("{registration:?}").contains("hunter2"));
    }
}
