//! Cover acquisition with a configured fallback

use crate::book::Book;
use crate::crawler::images::decode_data_uri;
use crate::crawler::retry::RetryError;
use crate::crawler::RunContext;
use crate::storage::{encode_png, write_atomic, StorageResult};
use crate::url::{is_data_uri, resolve_resource_url};
use crate::HarvestError;
use std::path::{Path, PathBuf};

/// File name of the cover under the output root
pub const COVER_FILE: &str = "cover.png";

enum CoverAttempt {
    Stored,
    Failed(String),
    Cancelled,
}

/// Makes sure `<output>/cover.png` exists
///
/// An existing cover is reused. Otherwise the book's cover URL is tried, then
/// `fallback_url`. Failed attempts are only logged and never count as run
/// failures; without any cover the run goes on.
///
/// # Returns
///
/// * `Ok(Some(PathBuf))` - Path of the cover
/// * `Ok(None)` - No cover could be obtained
/// * `Err(HarvestError::Cancelled)` - The run was cancelled during a download
pub async fn acquire_cover(
    ctx: &RunContext,
    book: &Book,
    fallback_url: Option<&str>,
) -> Result<Option<PathBuf>, HarvestError> {
    let path = ctx.chapters.root().join(COVER_FILE);
    if path.is_file() {
        tracing::debug!("Reusing cover {}", path.display());
        return Ok(Some(path));
    }

    let candidates = [
        book.cover_url
            .as_deref()
            .and_then(|url| resolve_resource_url(url, &book.novel_url)),
        fallback_url.map(str::to_string),
    ];

    for url in candidates.iter().flatten() {
        match download_cover(ctx, url, &path).await {
            CoverAttempt::Stored => {
                tracing::info!("Saved cover to {}", path.display());
                return Ok(Some(path));
            }
            CoverAttempt::Cancelled => return Err(HarvestError::Cancelled),
            CoverAttempt::Failed(reason) => {
                tracing::warn!("Cover {} failed: {}", url, reason);
            }
        }
    }

    tracing::warn!("No cover image");
    Ok(None)
}

async fn download_cover(ctx: &RunContext, url: &str, path: &Path) -> CoverAttempt {
    let bytes = if is_data_uri(url) {
        match decode_data_uri(url) {
            Ok(bytes) => bytes,
            Err(reason) => return CoverAttempt::Failed(reason),
        }
    } else {
        let source = &ctx.source;
        let result = ctx
            .retry
            .execute(&ctx.cancel, "Cover", move || source.fetch_bytes(url))
            .await;
        match result {
            Ok(bytes) => bytes,
            Err(RetryError::Cancelled) => return CoverAttempt::Cancelled,
            Err(RetryError::Exhausted { source, .. }) => {
                return CoverAttempt::Failed(source.to_string())
            }
        }
    };

    let target = path.to_path_buf();
    let stored = tokio::task::spawn_blocking(move || -> StorageResult<bool> {
        let png = encode_png(&bytes)?;
        write_atomic(&target, &png, true)
    })
    .await;

    match stored {
        Ok(Ok(_)) => CoverAttempt::Stored,
        Ok(Err(e)) => CoverAttempt::Failed(e.to_string()),
        Err(e) => CoverAttempt::Failed(format!("Encoder task failed: {}", e)),
    }
}
