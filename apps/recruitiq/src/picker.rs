use std::path::Path;

use anyhow::{Context, Result};
use client_core::FileCandidate;

/// Builds a candidate from a file on disk; the media type is guessed from
/// the extension.
pub async fn load_candidate(path: &Path) -> Result<FileCandidate> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(candidate_from(path, bytes))
}

fn candidate_from(path: &Path, bytes: Vec<u8>) -> FileCandidate {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let media_type = mime_guess::from_path(path)
        .first_raw()
        .map(str::to_string);
    FileCandidate {
        name,
        media_type,
        bytes,
    }
}
