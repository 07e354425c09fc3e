//! Helpers for turning local files into uploads and avatars.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use docchat_api::DocumentUpload;
use docchat_core::documents::content_type_for;

/// Reads a file into a [`DocumentUpload`] named after its file name.
pub fn read_upload(path: &Path) -> io::Result<DocumentUpload> {
    let filename = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no usable file name", path.display()),
            )
        })?
        .to_owned();
    let data = fs::read(path)?;
    Ok(DocumentUpload {
        content_type: content_type_for(&filename).to_owned(),
        filename,
        data,
    })
}

/// Expands a glob pattern into the regular files it matches.
///
/// Entries that can't be inspected are skipped.
pub fn uploads_matching(pattern: &str) -> Result<Vec<PathBuf>, glob::PatternError> {
    let mut paths = Vec::new();
    for entry in glob::glob(pattern)? {
        match entry {
            Ok(path) if path.is_file() => paths.push(path),
            Ok(path) => debug!("skipping non-file {path:?}"),
            Err(err) => warn!("skipping unreadable entry: {err}"),
        }
    }
    Ok(paths)
}

/// Reads an image file for use as an avatar, guessing its media type from
/// the extension.
pub fn read_avatar(path: &Path) -> io::Result<(Vec<u8>, mime::Mime)> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let mime = match extension.as_deref() {
        Some("png") => mime::IMAGE_PNG,
        Some("jpg" | "jpeg") => mime::IMAGE_JPEG,
        Some("gif") => mime::IMAGE_GIF,
        Some("bmp") => mime::IMAGE_BMP,
        Some("svg") => mime::IMAGE_SVG,
        Some("webp") => "image/webp"
            .parse()
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))?,
        _ => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a known image type", path.display()),
            ));
        }
    };
    Ok((fs::read(path)?, mime))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_upload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        fs::write(&path, "# Notes").unwrap();

        let upload = read_upload(&path).unwrap();
        assert_eq!(upload.filename, "notes.md");
        assert_eq!(upload.content_type, content_type_for("notes.md"));
        assert_eq!(upload.data, b"# Notes");
    }

    #[test]
    fn test_uploads_matching() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "a").unwrap();
        fs::write(dir.path().join("b.txt"), "b").unwrap();
        fs::write(dir.path().join("c.pdf"), "c").unwrap();
        fs::create_dir(dir.path().join("d.txt")).unwrap();

        let pattern = format!("{}/*.txt", dir.path().display());
        let mut names: Vec<_> = uploads_matching(&pattern)
            .unwrap()
            .into_iter()
            .filter_map(|path| Some(path.file_name()?.to_str()?.to_owned()))
            .collect();
        names.sort();
        assert_eq!(names, ["a.txt", "b.txt"]);

        assert!(uploads_matching("[").is_err());
    }

    #[test]
    fn test_read_avatar() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("me.PNG");
        fs::write(&png, [0x89, b'P', b'N', b'G']).unwrap();
        let (data, mime) = read_avatar(&png).unwrap();
        assert_eq!(mime, mime::IMAGE_PNG);
        assert_eq!(data.len(), 4);

        let webp = dir.path().join("me.webp");
        fs::write(&webp, [0]).unwrap();
        assert_eq!(read_avatar(&webp).unwrap().1.essence_str(), "image/webp");

        let text = dir.path().join("me.txt");
        fs::write(&text, "hi").unwrap();
        let err = read_avatar(&text).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }
}
