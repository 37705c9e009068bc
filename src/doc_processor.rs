/// Upload formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    PlainText,
    Markdown,
    Pdf,
}

impl ContentKind {
    /// Resolve from the declared MIME type, falling back to the file extension
    /// when the client sent none or a generic binary type.
    pub fn detect(content_type: Option<&str>, filename: &str) -> Result<Self, ExtractError> {
        let mime = content_type
            .map(|ct| ct.split(';').next().unwrap_or("").trim().to_lowercase())
            .filter(|ct| !ct.is_empty() && ct != "application/octet-stream");

        match mime.as_deref() {
            Some("text/plain") => Ok(ContentKind::PlainText),
            Some("text/markdown") | Some("text/x-markdown") => Ok(ContentKind::Markdown),
            Some("application/pdf") => Ok(ContentKind::Pdf),
            Some(other) => Err(ExtractError::Unsupported(other.to_string())),
            None => Self::from_extension(filename),
        }
    }

    fn from_extension(filename: &str) -> Result<Self, ExtractError> {
        let ext = std::path::Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "txt" => Ok(ContentKind::PlainText),
            "md" | "markdown" => Ok(ContentKind::Markdown),
            "pdf" => Ok(ContentKind::Pdf),
            _ => Err(ExtractError::Unsupported(format!(".{}", ext))),
        }
    }

    pub fn file_type(&self) -> &'static str {
        match self {
            ContentKind::PlainText => "txt",
            ContentKind::Markdown => "md",
            ContentKind::Pdf => "pdf",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0} (allowed: txt, md, pdf)")]
    Unsupported(String),
    #[error("text upload is not valid UTF-8")]
    InvalidUtf8,
    #[error("PDF parse error: {0}")]
    Pdf(String),
}

/// Turn uploaded bytes into plain text.
pub fn extract_text(bytes: &[u8], kind: ContentKind) -> Result<String, ExtractError> {
    match kind {
        ContentKind::PlainText | ContentKind::Markdown => std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ExtractError::InvalidUtf8),
        ContentKind::Pdf => {
            pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))
        }
    }
}
