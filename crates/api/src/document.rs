use std::fmt::{self, Debug, Display};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Identifier of an uploaded document.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DocumentId(pub u64);

impl Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ingestion state of a document.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    /// Still being chunked and indexed.
    Processing,
    /// Ready to be retrieved from.
    Completed,
    /// Ingestion failed.
    Failed,
    /// A state this client doesn't know about.
    #[serde(other)]
    Unknown,
}

/// An uploaded document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentSummary {
    /// Identifier of the document.
    pub id: DocumentId,
    /// Original file name.
    pub filename: String,
    /// Lower-case extension without the dot.
    pub file_type: String,
    /// Size in bytes.
    pub file_size: u64,
    /// Ingestion state.
    pub status: DocumentStatus,
    /// Number of indexed chunks.
    #[serde(default)]
    pub chunk_count: u64,
    /// Upload time (UTC).
    pub created_at: NaiveDateTime,
}

/// A file to upload.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DocumentUpload {
    /// File name sent with the multipart part.
    pub filename: String,
    /// MIME type of the content.
    pub content_type: String,
    /// Raw file content.
    pub data: Vec<u8>,
}

impl Debug for DocumentUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentUpload")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("len", &self.data.len())
            .finish()
    }
}
