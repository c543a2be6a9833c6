//! Input resolution: turn a user-supplied path or URL into a [`Document`].
//!
//! This is the caller-side step in front of the pipeline. It reads the bytes,
//! decides the declared MIME type, and enforces the size ceiling from
//! [`GenerationConfig::max_document_bytes`], so oversized uploads are
//! rejected before any extraction work starts.
//!
//! The MIME type comes from, in order: the caller's explicit declaration,
//! the HTTP `Content-Type` header (URLs only), then the file extension.
//! Content is never sniffed here; a mislabelled file fails later in its
//! format's extraction strategy.

use crate::config::GenerationConfig;
use crate::document::Document;
use crate::error::PipelineError;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// MIME reported when neither header nor extension identifies the input.
pub const UNKNOWN_MIME: &str = "application/octet-stream";

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve a local path or URL to a [`Document`].
///
/// `declared_mime` overrides any detected type.
pub async fn resolve_input(
    input: &str,
    declared_mime: Option<&str>,
    config: &GenerationConfig,
) -> Result<Document, PipelineError> {
    let document = if is_url(input) {
        download_url(input, declared_mime, config).await?
    } else {
        resolve_local(input, declared_mime, config.max_document_bytes).await?
    };
    debug!("Resolved '{}' as {:?}", input, document);
    Ok(document)
}

/// Read a local file, checking existence and size before loading it.
async fn resolve_local(
    path_str: &str,
    declared_mime: Option<&str>,
    limit: u64,
) -> Result<Document, PipelineError> {
    let path = Path::new(path_str);
    let invalid = |reason: String| PipelineError::InvalidInput {
        input: path_str.to_string(),
        reason,
    };

    let metadata = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => invalid("file not found".to_string()),
        std::io::ErrorKind::PermissionDenied => invalid("permission denied".to_string()),
        _ => invalid(e.to_string()),
    })?;

    if !metadata.is_file() {
        return Err(invalid("not a regular file".to_string()));
    }
    check_size(path_str, metadata.len(), limit)?;

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| invalid(format!("read failed: {e}")))?;

    let mime = declared_mime
        .map(str::to_string)
        .unwrap_or_else(|| guess_mime(path));

    Ok(Document::new(bytes, mime))
}

/// Download a URL into memory.
async fn download_url(
    url: &str,
    declared_mime: Option<&str>,
    config: &GenerationConfig,
) -> Result<Document, PipelineError> {
    info!("Downloading document from: {}", url);

    let failed = |reason: String| PipelineError::InvalidInput {
        input: url.to_string(),
        reason,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.download_timeout_secs))
        .build()
        .map_err(|e| failed(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            failed(format!(
                "download timed out after {}s",
                config.download_timeout_secs
            ))
        } else {
            failed(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(failed(format!("HTTP {}", response.status())));
    }

    // Reject early when the server announces the size.
    if let Some(len) = response.content_length() {
        check_size(url, len, config.max_document_bytes)?;
    }

    let header_mime = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(essence)
        .filter(|m| !m.is_empty() && m != UNKNOWN_MIME);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| failed(e.to_string()))?;
    check_size(url, bytes.len() as u64, config.max_document_bytes)?;

    let mime = declared_mime
        .map(str::to_string)
        .or(header_mime)
        .unwrap_or_else(|| guess_mime_from_url(url));

    info!("Downloaded {} bytes ({})", bytes.len(), mime);
    Ok(Document::new(bytes.to_vec(), mime))
}

fn check_size(input: &str, size: u64, limit: u64) -> Result<(), PipelineError> {
    if size > limit {
        return Err(PipelineError::DocumentTooLarge {
            input: input.to_string(),
            size,
            limit,
        });
    }
    Ok(())
}

/// `type/subtype` part of a Content-Type value, lowercased.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(UNKNOWN_MIME)
        .to_string()
}

/// Guess from the last URL path segment, ignoring query and fragment.
fn guess_mime_from_url(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|last| last.contains('.'))
        .map(|last| guess_mime(Path::new(&last)))
        .unwrap_or_else(|| UNKNOWN_MIME.to_string())
}
