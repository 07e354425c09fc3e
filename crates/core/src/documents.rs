//! Client-side checks for document uploads.

use std::path::Path;

use docchat_api::DocumentUpload;

use crate::Error;

/// File extensions the backend can ingest.
pub const ALLOWED_EXTENSIONS: &[&str] =
    &["pdf", "docx", "doc", "pptx", "ppt", "xlsx", "xls", "html", "txt"];

/// Largest accepted upload, in bytes.
pub const MAX_UPLOAD_SIZE: usize = 50 * 1024 * 1024;

/// Number of days covered by usage statistics when unspecified.
pub const DEFAULT_USAGE_DAYS: u32 = 7;

/// Checks an upload before it is sent.
pub fn validate_upload(upload: &DocumentUpload) -> Result<(), Error> {
    let extension = Path::new(&upload.filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(Error::validation().with_reason(format!(
            "unsupported file type of `{}`, expected one of: {}",
            upload.filename,
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }
    if upload.data.is_empty() {
        return Err(Error::validation()
            .with_reason(format!("`{}` is empty", upload.filename)));
    }
    if upload.data.len() > MAX_UPLOAD_SIZE {
        return Err(Error::validation().with_reason(format!(
            "`{}` exceeds the 50 MB limit",
            upload.filename
        )));
    }
    Ok(())
}

/// Guesses the MIME type of an allowed document from its file name.
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match extension.as_str() {
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "doc" => "application/msword",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "ppt" => "application/vnd.ms-powerpoint",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        "html" => "text/html",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn upload(filename: &str, len: usize) -> DocumentUpload {
        DocumentUpload {
            filename: filename.to_owned(),
            content_type: content_type_for(filename).to_owned(),
            data: vec![b'a'; len],
        }
    }

    #[test]
    fn test_validate_upload() {
        assert!(validate_upload(&upload("Report.PDF", 10)).is_ok());
        assert!(validate_upload(&upload("notes.txt", MAX_UPLOAD_SIZE)).is_ok());

        for bad in [
            upload("image.png", 10),
            upload("no_extension", 10),
            upload("empty.txt", 0),
            upload("huge.pdf", MAX_UPLOAD_SIZE + 1),
        ] {
            let err = validate_upload(&bad).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{bad:?}");
        }
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type_for("a.html"), "text/html");
        assert_eq!(content_type_for("a.XLS"), "application/vnd.ms-excel");
    }
}
