use docchat_api::{ConversationId, DocumentId};
use serde::Deserialize;

// ------
// Routes
// ------

pub const REGISTER: &str = "/api/v1/auth/register";
pub const LOGIN: &str = "/api/v1/auth/login";
pub const ME: &str = "/api/v1/auth/me";
pub const SEND_MESSAGE: &str = "/api/v1/chat/message";
pub const CONVERSATIONS: &str = "/api/v1/chat/conversations";
pub const UPLOAD_DOCUMENT: &str = "/api/v1/documents/upload";
pub const DOCUMENTS: &str = "/api/v1/documents/";
pub const ANALYTICS_OVERVIEW: &str = "/api/v1/analytics/overview";

#[inline]
pub fn conversation(id: ConversationId) -> String {
    format!("{CONVERSATIONS}/{id}")
}

#[inline]
pub fn document(id: DocumentId) -> String {
    format!("{DOCUMENTS}{id}")
}

#[inline]
pub fn analytics_usage(days: u32) -> String {
    format!("/api/v1/analytics/usage?days={days}")
}

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[allow(dead_code)]
    #[serde(default)]
    pub token_type: Option<String>,
}

/// FastAPI error body. `detail` is a string for handled errors and a list
/// of validation issues for rejected payloads.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct ErrorBody {
    pub detail: serde_json::Value,
}

impl ErrorBody {
    pub fn message(&self) -> String {
        match &self.detail {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Array(issues) => issues
                .iter()
                .filter_map(|issue| issue.get("msg").and_then(|m| m.as_str()))
                .collect::<Vec<_>>()
                .join("; "),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes() {
        assert_eq!(
            conversation(ConversationId(12)),
            "/api/v1/chat/conversations/12"
        );
        assert_eq!(document(DocumentId(3)), "/api/v1/documents/3");
        assert_eq!(analytics_usage(30), "/api/v1/analytics/usage?days=30");
    }

    #[test]
    fn test_error_body_message() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"detail":"Conversation not found"}"#)
                .unwrap();
        assert_eq!(body.message(), "Conversation not found");

        let body: ErrorBody = serde_json::from_str(
            r#"{"detail":[{"loc":["body","content"],"msg":"field required"}]}"#,
        )
        .unwrap();
        assert_eq!(body.message(), "field required");
    }
}
