use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::ApiError;

/// A file written under the uploads directory.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub original_name: String,
    /// Path relative to the uploads directory.
    pub storage_key: String,
    pub path: PathBuf,
}

/// Keeps ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
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
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned.to_string()
    }
}

pub async fn store(
    root: &Path,
    scope: &str,
    original_name: &str,
    bytes: &[u8],
) -> Result<StoredFile, ApiError> {
    let storage_key = format!(
        "{}/{}-{}",
        scope,
        uuid::Uuid::new_v4(),
        sanitize_file_name(original_name)
    );
    let path = root.join(&storage_key);

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ApiError::Internal(format!("Failed to create upload dir: {}", e)))?;
    }

    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to write file: {}", e)))?;

    Ok(StoredFile {
        original_name: original_name.to_string(),
        storage_key,
        path,
    })
}

/// Removes files written for a request that failed afterwards.
pub async fn discard(files: &[StoredFile]) {
    for file in files {
        if let Err(e) = tokio::fs::remove_file(&file.path).await {
            warn!(key = %file.storage_key, error = %e, "Failed to remove orphaned upload");
        }
    }
}
