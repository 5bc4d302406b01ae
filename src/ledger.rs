//! The dedup ledger: the set of AT-URIs already acted upon in any past run.
//!
//! Loaded fully at process start, insert-only during the run, and written
//! back as a whole at the end. The save is atomic (temp file + rename) so a
//! concurrent reader sees either the old or the new content, never a
//! partial write.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

/// Load the ledger from disk. A missing file is the first-run condition and
/// yields an empty set, not an error.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub async fn load(path: &Path) -> Result<HashSet<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => {
            let uris: HashSet<String> = content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(ToString::to_string)
                .collect();
            debug!(count = uris.len(), path = %path.display(), "Loaded ledger");
            Ok(uris)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "No ledger file, starting empty");
            Ok(HashSet::new())
        }
        Err(e) => {
            Err(e).with_context(|| format!("Failed to read ledger: {}", path.display()))
        }
    }
}

/// Persist the ledger: sorted, newline-delimited, atomically replacing the
/// previous file. Saving the same set twice yields byte-identical content.
///
/// # Errors
///
/// Returns an error if the temp file cannot be written or the atomic
/// replace fails.
pub async fn save(path: &Path, uris: &HashSet<String>) -> Result<()> {
    let mut sorted: Vec<&str> = uris.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    let mut content = sorted.join("\n");
    if !content.is_empty() {
        content.push('\n');
    }

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tokio::fs::write(tmp.path(), &content)
        .await
        .context("Failed to write ledger temp file")?;
    tmp.persist(path)
        .with_context(|| format!("Failed to replace ledger: {}", path.display()))?;

    debug!(count = uris.len(), path = %path.display(), "Saved ledger");
    Ok(())
}
