//! Reads source files from a directory into raw text documents.
//!
//! Plain text and Markdown are read verbatim; HTML files are reduced to
//! their visible text. A file that cannot be read is logged and skipped so
//! one bad upload never blocks the rest of a rebuild.

use std::path::Path;

use scraper::Html;
use tokio::fs;
use tracing::{debug, warn};

use crate::types::{Document, RagError};

/// Loads every readable file in `dir`, sorted by file name so rebuilds
/// are deterministic. A missing directory yields no documents.
pub async fn load_documents(dir: &Path) -> Result<Vec<Document>, RagError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut entries = fs::read_dir(dir).await?;
    let mut documents = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let path = entry.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            warn!(path = %path.display(), "skipping file with a non-UTF-8 name");
            continue;
        };
        match read_text(&path).await {
            Ok(Some(text)) => documents.push(Document::new(name, text)),
            Ok(None) => debug!(file = name, "skipping empty document"),
            Err(err) => warn!(file = name, error = %err, "skipping unreadable document"),
        }
    }
    documents.sort_by(|a, b| a.source_id.cmp(&b.source_id));
    Ok(documents)
}

async fn read_text(path: &Path) -> Result<Option<String>, RagError> {
    let raw = fs::read(path).await?;
    let text = String::from_utf8(raw).map_err(|err| RagError::InvalidDocument {
        source_id: path.display().to_string(),
        reason: format!("not valid UTF-8: {err}"),
    })?;

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    let text = match extension.as_str() {
        "html" | "htm" => html_to_text(&text),
        _ => text,
    };

    if text.trim().is_empty() {
        Ok(None)
    } else {
        Ok(Some(text))
    }
}

/// Collapses an HTML document to its text content, one line per text node.
fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();
    for piece in document.root_element().text() {
        let trimmed = piece.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(trimmed);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn loads_plain_text_sorted_by_name() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "second file").unwrap();
        std::fs::write(dir.path().join("a.md"), "first file").unwrap();

        let documents = load_documents(dir.path()).await.unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].source_id, "a.md");
        assert_eq!(documents[0].text, "first file");
        assert_eq!(documents[1].source_id, "b.txt");
    }

    #[tokio::test]
    async fn html_is_reduced_to_text() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("page.html"),
            "<html><body><h1>Refund policy</h1><p>Refunds take 5 days.</p></body></html>",
        )
        .unwrap();

        let documents = load_documents(dir.path()).await.unwrap();
        assert_eq!(documents.len(), 1);
        assert!(documents[0].text.contains("Refund policy"));
        assert!(documents[0].text.contains("Refunds take 5 days."));
        assert!(!documents[0].text.contains("<p>"));
    }

    #[tokio::test]
    async fn missing_directory_yields_no_documents() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let documents = load_documents(&missing).await.unwrap();
        assert!(documents.is_empty());
    }

    #[tokio::test]
    async fn unreadable_and_empty_files_are_skipped() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("binary.bin"), [0xff, 0xfe, 0x00, 0x80]).unwrap();
        std::fs::write(dir.path().join("empty.txt"), "   \n").unwrap();
        std::fs::write(dir.path().join("good.txt"), "usable content").unwrap();

        let documents = load_documents(dir.path()).await.unwrap();
        assert_eq!(documents.len(), 1);
        assert_eq!(documents[0].source_id, "good.txt");
    }
}
