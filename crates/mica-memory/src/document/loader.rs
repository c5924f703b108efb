use std::path::Path;

use super::error::DocumentError;
use super::types::Document;

/// Reads UTF-8 text files (`.md`, `.markdown`, `.txt`) into [`Document`]s.
#[derive(Debug, Clone)]
pub struct TextLoader {
    max_file_size: u64,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            max_file_size: super::DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl TextLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    #[must_use]
    pub fn supported_extensions() -> &'static [&'static str] {
        &["md", "markdown", "txt"]
    }

    /// # Errors
    ///
    /// Returns [`DocumentError::UnsupportedFormat`] for unknown extensions,
    /// [`DocumentError::FileTooLarge`] past the size cap, or an IO error.
    pub async fn load(&self, path: &Path) -> Result<Document, DocumentError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let content_type = match extension.as_str() {
            "md" | "markdown" => "text/markdown",
            "txt" => "text/plain",
            other => return Err(DocumentError::UnsupportedFormat(other.to_owned())),
        };

        let metadata = tokio::fs::metadata(path).await?;
        if metadata.len() > self.max_file_size {
            return Err(DocumentError::FileTooLarge(metadata.len()));
        }

        let content = tokio::fs::read_to_string(path).await?;
        let source = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_owned();

        tracing::debug!(source, bytes = content.len(), "loaded document");

        Ok(Document {
            content,
            source,
            content_type: content_type.to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn loads_markdown() {
        let mut file = tempfile::Builder::new().suffix(".md").tempfile().unwrap();
        write!(file, "# Title\n\nBody text.").unwrap();

        let doc = TextLoader::new().load(file.path()).await.unwrap();
        assert_eq!(doc.content, "# Title\n\nBody text.");
        assert_eq!(doc.content_type, "text/markdown");
        assert!(doc.source.ends_with(".md"));
    }

    #[tokio::test]
    async fn loads_plain_text() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        write!(file, "plain contents").unwrap();

        let doc = TextLoader::new().load(file.path()).await.unwrap();
        assert_eq!(doc.content_type, "text/plain");
    }

    #[tokio::test]
    async fn rejects_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".pdf").tempfile().unwrap();
        let result = TextLoader::new().load(file.path()).await;
        assert!(matches!(result, Err(DocumentError::UnsupportedFormat(_))));
    }

    #[tokio::test]
    async fn rejects_oversize_file() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        write!(file, "0123456789").unwrap();

        let loader = TextLoader::new().with_max_file_size(5);
        let result = loader.load(file.path()).await;
        assert!(matches!(result, Err(DocumentError::FileTooLarge(10))));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let result = TextLoader::new().load(Path::new("/nonexistent/x.md")).await;
        assert!(matches!(result, Err(DocumentError::Io(_))));
    }
}
