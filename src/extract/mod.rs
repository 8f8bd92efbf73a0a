//! Text extraction for uploaded files.
//!
//! Plain text is decoded as UTF-8, PDF pages go through `pdf-extract`, and
//! DOCX paragraphs are read straight out of `word/document.xml`.

mod docx;
mod pdf;

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ExtractError;
use crate::models::DocumentMetadata;
use crate::utils::file::{calculate_checksum, file_extension, file_name, read_file_bytes};

/// Extensions accepted for upload, in the order shown to users.
pub const SUPPORTED_EXTENSIONS: [&str; 3] = [".pdf", ".docx", ".txt"];

/// File formats the extractor can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Text,
    Pdf,
    Docx,
}

impl FileKind {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().trim_start_matches('.') {
            "txt" => Some(FileKind::Text),
            "pdf" => Some(FileKind::Pdf),
            "docx" => Some(FileKind::Docx),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ExtractError> {
        let extension = file_extension(path);
        Self::from_extension(&extension).ok_or_else(|| ExtractError::UnsupportedFormat {
            extension: if extension.is_empty() {
                "(none)".to_string()
            } else {
                extension
            },
            supported: SUPPORTED_EXTENSIONS.join(", "),
        })
    }

    /// Whether `path` has an extension the extractor accepts.
    pub fn is_supported(path: &Path) -> bool {
        Self::from_path(path).is_ok()
    }

    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Text => ".txt",
            FileKind::Pdf => ".pdf",
            FileKind::Docx => ".docx",
        }
    }
}

/// Text pulled out of one file plus what the ingest path records about it.
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub filename: String,
    pub kind: FileKind,
    pub size_bytes: u64,
    pub checksum: String,
    pub text: String,
}

impl ExtractedDocument {
    pub fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata::new(&self.filename, self.kind.extension(), self.size_bytes)
            .with_checksum(&self.checksum)
    }
}

/// Decode raw file bytes of the given kind into text.
pub fn extract_bytes(kind: FileKind, bytes: &[u8]) -> Result<String, ExtractError> {
    match kind {
        FileKind::Text => Ok(String::from_utf8_lossy(bytes).into_owned()),
        FileKind::Pdf => pdf::extract(bytes),
        FileKind::Docx => docx::extract(bytes),
    }
}

/// Read and decode `path`, rejecting unsupported types and files over `max_size` bytes.
pub fn extract_path(path: &Path, max_size: u64) -> Result<ExtractedDocument, ExtractError> {
    let kind = FileKind::from_path(path)?;

    let size = fs::metadata(path)?.len();
    if size > max_size {
        return Err(ExtractError::TooLarge {
            size,
            max: max_size,
        });
    }

    let bytes = read_file_bytes(path, max_size)?;
    let text = extract_bytes(kind, &bytes)?;

    tracing::debug!(path = %path.display(), ?kind, chars = text.len(), "extracted text");

    Ok(ExtractedDocument {
        filename: file_name(path),
        kind,
        size_bytes: bytes.len() as u64,
        checksum: calculate_checksum(&bytes),
        text,
    })
}

/// [`extract_path`] on the blocking pool.
pub async fn extract_file(path: &Path, max_size: u64) -> Result<ExtractedDocument, ExtractError> {
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || extract_path(&path, max_size))
        .await
        .map_err(|e| ExtractError::Io(std::io::Error::other(e.to_string())))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_kind_from_path() {
        assert_eq!(
            FileKind::from_path(Path::new("a/Notes.TXT")).unwrap(),
            FileKind::Text
        );
        assert_eq!(
            FileKind::from_path(Path::new("paper.pdf")).unwrap(),
            FileKind::Pdf
        );
        assert_eq!(
            FileKind::from_path(Path::new("memo.docx")).unwrap(),
            FileKind::Docx
        );
    }

    #[test]
    fn test_unsupported_format_names_supported_list() {
        let err = FileKind::from_path(Path::new("image.png")).unwrap_err();
        match &err {
            ExtractError::UnsupportedFormat {
                extension,
                supported,
            } => {
                assert_eq!(extension, ".png");
                assert_eq!(supported, ".pdf, .docx, .txt");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("Supported: .pdf, .docx, .txt"));
        assert!(!FileKind::is_supported(Path::new("Makefile")));
    }

    #[test]
    fn test_extract_plain_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ai.txt");
        let text = "Artificial intelligence is a field of computer science.";
        fs::write(&path, text).unwrap();

        let doc = extract_path(&path, 1024).unwrap();
        assert_eq!(doc.filename, "ai.txt");
        assert_eq!(doc.kind, FileKind::Text);
        assert_eq!(doc.size_bytes, text.len() as u64);
        assert_eq!(doc.checksum.len(), 64);
        assert!(doc.text.starts_with("Artificial intelligence"));

        let metadata = doc.metadata();
        assert_eq!(metadata.source, "ai.txt");
        assert_eq!(metadata.file_type, ".txt");
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let text = extract_bytes(FileKind::Text, &[b'o', b'k', 0xff]).unwrap();
        assert!(text.starts_with("ok"));
    }

    #[test]
    fn test_too_large_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.txt");
        fs::write(&path, "x".repeat(100)).unwrap();

        assert!(matches!(
            extract_path(&path, 10),
            Err(ExtractError::TooLarge { size: 100, max: 10 })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            extract_path(&dir.path().join("gone.txt"), 10),
            Err(ExtractError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_extract_file_async() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        fs::write(&path, "hello").unwrap();

        let doc = extract_file(&path, 1024).await.unwrap();
        assert_eq!(doc.text, "hello");
    }

    #[test]
    fn test_malformed_pdf_is_parse_error() {
        assert!(matches!(
            extract_bytes(FileKind::Pdf, b"not a pdf"),
            Err(ExtractError::Parse { .. })
        ));
    }
}
