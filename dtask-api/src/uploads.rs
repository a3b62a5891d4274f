/// Attachment storage
///
/// Uploaded task attachments are written to the configured upload directory
/// as `<unix-millis>-<random tag>-<sanitized original name>` and served
/// back under `/uploads/<stored name>`. Files are created exclusively, so
/// an upload never replaces an earlier one.

use chrono::Utc;
use std::io;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

const MAX_NAME_LEN: usize = 100;
const TAG_LEN: usize = 8;
const MAX_ATTEMPTS: usize = 3;

/// Reduces a client-supplied filename to a safe single path component
///
/// Directory parts are dropped, characters outside `[A-Za-z0-9._-]` become
/// `_`, and leading dots are removed so the result is never hidden or
/// relative.
pub fn sanitize_filename(original: &str) -> String {
    let base = original
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    let cleaned: String = cleaned.chars().take(MAX_NAME_LEN).collect();

    if cleaned.is_empty() {
        "attachment".to_string()
    } else {
        cleaned
    }
}

/// Name an upload is stored under
pub fn stored_name(original: &str) -> String {
    let tag = Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        Utc::now().timestamp_millis(),
        &tag[..TAG_LEN],
        sanitize_filename(original)
    )
}

/// Writes an attachment and returns its stored filename
///
/// A name that already exists on disk is retried with a fresh tag.
pub async fn store_attachment(dir: &Path, original_name: &str, bytes: &[u8]) -> io::Result<String> {
    tokio::fs::create_dir_all(dir).await?;

    let mut attempts = 0;
    loop {
        attempts += 1;
        let name = stored_name(original_name);

        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dir.join(&name))
            .await;

        let mut file = match opened {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && attempts < MAX_ATTEMPTS => {
                debug!(file = %name, "Stored name taken, retrying");
                continue;
            }
            Err(e) => return Err(e),
        };

        file.write_all(bytes).await?;
        file.flush().await?;

        debug!(file = %name, size = bytes.len(), "Stored attachment");
        return Ok(name);
    }
}
