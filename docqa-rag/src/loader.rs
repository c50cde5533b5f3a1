//! Turning files into [`Document`]s.
//!
//! PDF text is extracted with `pdf-extract` when the `pdf` feature is on
//! (the default). Plain text and Markdown are read as UTF-8. Extraction
//! never fails just because a document turned out to be empty; the pipeline
//! decides what to do with those.

use std::path::{Path, PathBuf};

use docqa_core::{DocqaError, Result};
use tracing::debug;

use crate::document::Document;

/// Extensions read as UTF-8 text.
pub const TEXT_EXTENSIONS: [&str; 4] = ["txt", "text", "md", "markdown"];

const PDF_MAGIC: &[u8] = b"%PDF-";

enum Format {
    Pdf,
    Text,
}

fn format_of(path: &Path) -> Result<Format> {
    let Some(ext) = path.extension() else {
        return Ok(Format::Text);
    };
    let ext = ext.to_string_lossy().to_ascii_lowercase();
    if ext == "pdf" {
        Ok(Format::Pdf)
    } else if TEXT_EXTENSIONS.contains(&ext.as_str()) {
        Ok(Format::Text)
    } else {
        Err(DocqaError::Extraction {
            source_id: path.display().to_string(),
            message: format!("unsupported file type '.{ext}'"),
        })
    }
}

/// Load one file.
///
/// The document id, `source` metadata and source URI are all the path as
/// given.
///
/// # Errors
///
/// - [`DocqaError::NotFound`] if the file does not exist
/// - [`DocqaError::Storage`] if it cannot be read
/// - [`DocqaError::Extraction`] for unsupported types, invalid UTF-8 or
///   unreadable PDFs
pub async fn load_document(path: impl AsRef<Path>) -> Result<Document> {
    let path = path.as_ref();
    let source_id = path.display().to_string();
    let format = format_of(path)?;

    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => DocqaError::NotFound(format!("no such file: {source_id}")),
        _ => DocqaError::Storage(format!("failed to read {source_id}: {e}")),
    })?;

    let text = match format {
        Format::Pdf => extract_pdf(&source_id, bytes).await?,
        Format::Text => decode_text(&source_id, bytes)?,
    };
    debug!(source = %source_id, chars = text.chars().count(), "loaded document");

    Ok(Document::new(source_id.clone(), text)
        .with_metadata("source", source_id.clone())
        .with_source_uri(source_id))
}

/// Build a document from raw bytes, detecting PDFs by their magic number.
pub async fn load_bytes(source_id: &str, bytes: Vec<u8>) -> Result<Document> {
    let text = if bytes.starts_with(PDF_MAGIC) {
        extract_pdf(source_id, bytes).await?
    } else {
        decode_text(source_id, bytes)?
    };
    Ok(Document::new(source_id, text).with_metadata("source", source_id))
}

/// Load every path, expanding directories one level deep.
///
/// Files inside a directory are taken in name order, and only if they are
/// not hidden and carry a supported extension. Paths named explicitly are
/// always attempted, and one without an extension is read as text.
pub async fn load_documents(paths: &[PathBuf]) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for path in paths {
        if tokio::fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false) {
            for file in list_directory(path).await? {
                documents.push(load_document(&file).await?);
            }
        } else {
            documents.push(load_document(path).await?);
        }
    }
    Ok(documents)
}

async fn list_directory(dir: &Path) -> Result<Vec<PathBuf>> {
    let storage = |e: std::io::Error| {
        DocqaError::Storage(format!("failed to list {}: {e}", dir.display()))
    };
    let mut entries = tokio::fs::read_dir(dir).await.map_err(storage)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(storage)? {
        let path = entry.path();
        if path.is_file() && listable(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn listable(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'));
    !hidden && path.extension().is_some() && format_of(path).is_ok()
}

fn decode_text(source_id: &str, bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| DocqaError::Extraction {
        source_id: source_id.to_string(),
        message: format!("not valid UTF-8: {e}"),
    })
}

#[cfg(feature = "pdf")]
async fn extract_pdf(source_id: &str, bytes: Vec<u8>) -> Result<String> {
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| DocqaError::Extraction {
            source_id: source_id.to_string(),
            message: format!("extraction task failed: {e}"),
        })?
        .map_err(|e| DocqaError::Extraction {
            source_id: source_id.to_string(),
            message: format!("PDF extraction error: {e}"),
        })
}

#[cfg(not(feature = "pdf"))]
async fn extract_pdf(source_id: &str, _bytes: Vec<u8>) -> Result<String> {
    Err(DocqaError::Extraction {
        source_id: source_id.to_string(),
        message: "built without the `pdf` feature".into(),
    })
}

#[cfg(test)]
mod tests {
    use docqa_core::ErrorKind;

    use super::*;

    #[tokio::test]
    async fn reads_text_and_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# Title\n\nBody").unwrap();

        let doc = load_document(&path).await.unwrap();
        assert_eq!(doc.text, "# Title\n\nBody");
        assert_eq!(doc.id, path.display().to_string());
        assert_eq!(doc.metadata.get("source"), Some(&doc.id));
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_document(dir.path().join("absent.txt")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn rejects_unsupported_and_binary_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.xlsx");
        std::fs::write(&path, b"PK").unwrap();
        assert_eq!(load_document(&path).await.unwrap_err().kind(), ErrorKind::Extraction);

        let err = load_bytes("blob", vec![0xff, 0xfe, 0x00]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Extraction);
    }

    #[tokio::test]
    async fn directories_expand_to_supported_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "second").unwrap();
        std::fs::write(dir.path().join("a.txt"), "first").unwrap();
        std::fs::write(dir.path().join("image.png"), b"\x89PNG").unwrap();

        let docs = load_documents(&[dir.path().to_path_buf()]).await.unwrap();
        let texts: Vec<&str> = docs.iter().map(|d| d.text.as_str()).collect();
        assert_eq!(texts, ["first", "second"]);
    }

    #[tokio::test]
    async fn directories_skip_hidden_and_extensionless_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "kept").unwrap();
        std::fs::write(dir.path().join(".DS_Store"), [0x00, 0x00, 0x00, 0x01, 0xff, 0xfe]).unwrap();
        std::fs::write(dir.path().join(".notes.txt"), "hidden").unwrap();
        std::fs::write(dir.path().join("LICENSE"), [0xc3, 0x28]).unwrap();

        let docs = load_documents(&[dir.path().to_path_buf()]).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "kept");
    }

    #[tokio::test]
    async fn explicit_extensionless_path_is_read_as_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("README");
        std::fs::write(&path, "plain words").unwrap();

        let docs = load_documents(&[path]).await.unwrap();
        assert_eq!(docs[0].text, "plain words");
    }
}
