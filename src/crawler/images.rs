//! Image phase: localize every image referenced by a chapter body
//!
//! Images are collected across all chapters first so that an image shared by
//! several chapters is fetched by exactly one task. Bodies are then rewritten
//! to point at the local copies; images that could not be obtained are
//! dropped from the body.

use crate::book::Chapter;
use crate::crawler::parser::{image_sources, rewrite_fragment, Rewrite};
use crate::crawler::pool::{TaskError, WorkerPool};
use crate::crawler::retry::RetryError;
use crate::crawler::RunContext;
use crate::output::{phase_bar, ResourceKind};
use crate::storage::{encode_jpeg, ImageStore, StorageResult, IMAGE_DIR};
use crate::url::{content_key, is_data_uri, resolve_resource_url};
use crate::HarvestError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use indicatif::ProgressBar;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;

/// Raw `src` value to content key; `None` marks a reference that cannot be resolved
type ImageRefs = HashMap<String, Option<String>>;

/// Downloads the images of all chapters and rewrites their bodies
///
/// Chapters whose body changes are saved again. A failed image only removes
/// its own `<img>` elements.
///
/// # Returns
///
/// * `Ok(())` - Phase finished; individual failures are in the run stats
/// * `Err(HarvestError::Cancelled)` - The run was cancelled
pub async fn localize_images(
    ctx: &RunContext,
    pool: &WorkerPool,
    chapters: &mut [Chapter],
) -> Result<(), HarvestError> {
    let mut refs_by_chapter: Vec<(usize, ImageRefs)> = Vec::new();
    let mut wanted: BTreeMap<String, String> = BTreeMap::new();

    for (index, chapter) in chapters.iter().enumerate() {
        if !chapter.has_body() {
            continue;
        }

        let mut refs = ImageRefs::new();
        for src in image_sources(&chapter.body) {
            if local_key(&src).is_some() {
                continue;
            }

            let key = resolve_resource_url(&src, &chapter.url).map(|resolved| {
                let key = content_key(&resolved);
                wanted.entry(key.clone()).or_insert(resolved);
                key
            });
            if key.is_none() {
                tracing::debug!("Chapter {}: cannot resolve image '{}'", chapter.id, src);
            }
            refs.insert(src, key);
        }

        if !refs.is_empty() {
            refs_by_chapter.push((index, refs));
        }
    }

    ctx.stats.set_image_total(wanted.len());
    tracing::info!(
        "Found {} distinct images in {} chapters",
        wanted.len(),
        refs_by_chapter.len()
    );

    let bar = phase_bar("Images", wanted.len(), ctx.quiet);
    let handles: Vec<_> = wanted
        .into_iter()
        .map(|(key, resolved)| {
            let label = display_url(&resolved);
            let task_ctx = ctx.clone();
            let task_bar = bar.clone();
            let task_key = key.clone();
            let handle = pool.submit(async move {
                fetch_image(&task_ctx, &task_key, &resolved, &task_bar).await
            });
            (key, label, handle)
        })
        .collect();

    let mut available: HashSet<String> = HashSet::new();
    let mut cancelled = false;

    for (key, label, handle) in handles {
        match handle.join().await {
            Ok(Some(true)) => {
                available.insert(key);
            }
            Ok(Some(false)) => {}
            Ok(None) | Err(TaskError::Cancelled) => cancelled = true,
            Err(TaskError::Panicked(message)) => {
                ctx.stats.record_failure(
                    ResourceKind::Image,
                    None,
                    label,
                    format!("Task panicked: {}", message),
                );
                ctx.stats.image_done(false);
                bar.inc(1);
            }
        }
    }
    bar.finish_and_clear();

    if cancelled || ctx.cancel.is_cancelled() {
        return Err(HarvestError::Cancelled);
    }

    for (index, refs) in refs_by_chapter {
        let chapter = &mut chapters[index];
        let rewritten = rewrite_images(&chapter.body, &refs, &available);
        if rewritten == chapter.body {
            continue;
        }

        chapter.body = rewritten;
        if let Err(e) = ctx.chapters.save(chapter) {
            ctx.stats.record_failure(
                ResourceKind::Chapter,
                Some(chapter.id),
                &chapter.url,
                format!("Failed to save after image rewrite: {}", e),
            );
        }
    }

    Ok(())
}

/// Obtains one image and stores it under its key
///
/// Returns `Some(true)` when the image is on disk afterwards, `Some(false)`
/// when it failed and `None` when the run was cancelled.
async fn fetch_image(
    ctx: &RunContext,
    key: &str,
    resolved: &str,
    bar: &ProgressBar,
) -> Option<bool> {
    if ctx.images.contains(key) {
        ctx.stats.image_done(false);
        bar.inc(1);
        return Some(true);
    }

    let label = display_url(resolved);
    let (bytes, fetched) = if is_data_uri(resolved) {
        match decode_data_uri(resolved) {
            Ok(bytes) => (bytes, false),
            Err(reason) => return Some(image_failed(ctx, bar, label, reason)),
        }
    } else {
        let source = &ctx.source;
        let result = ctx
            .retry
            .execute(&ctx.cancel, &label, move || source.fetch_bytes(resolved))
            .await;
        match result {
            Ok(bytes) => (bytes, true),
            Err(RetryError::Cancelled) => return None,
            Err(RetryError::Exhausted { source, .. }) => {
                return Some(image_failed(ctx, bar, label, source.to_string()))
            }
        }
    };

    let store = ctx.images.clone();
    let store_key = key.to_string();
    let stored = tokio::task::spawn_blocking(move || -> StorageResult<PathBuf> {
        let jpeg = encode_jpeg(&bytes)?;
        store.store(&store_key, &jpeg)
    })
    .await;

    match stored {
        Ok(Ok(_)) => {
            ctx.stats.image_done(fetched);
            bar.inc(1);
            Some(true)
        }
        Ok(Err(e)) => Some(image_failed(ctx, bar, label, e.to_string())),
        Err(e) => Some(image_failed(ctx, bar, label, format!("Encoder task failed: {}", e))),
    }
}

fn image_failed(ctx: &RunContext, bar: &ProgressBar, label: String, reason: String) -> bool {
    ctx.stats.record_failure(ResourceKind::Image, None, label, reason);
    ctx.stats.image_done(false);
    bar.inc(1);
    false
}

/// Renders a body with localized images
///
/// `<img>` elements whose key is available point at the local file; those
/// that failed or could not be resolved are removed. Images not listed in
/// `refs` are left alone.
fn rewrite_images(body: &str, refs: &ImageRefs, available: &HashSet<String>) -> String {
    rewrite_fragment(body, |element| {
        if element.value().name() != "img" {
            return Rewrite::Keep;
        }
        let Some(src) = element.value().attr("src") else {
            return Rewrite::Keep;
        };

        match refs.get(src) {
            None => Rewrite::Keep,
            Some(Some(key)) if available.contains(key) => Rewrite::ReplaceAttrs(vec![
                ("src".to_string(), ImageStore::relative_path(key)),
                ("alt".to_string(), key.clone()),
            ]),
            Some(_) => Rewrite::Remove,
        }
    })
}

/// Recognizes a reference that already points at a stored image
fn local_key(src: &str) -> Option<&str> {
    let key = src
        .strip_prefix(IMAGE_DIR)?
        .strip_prefix('/')?
        .strip_suffix(".jpg")?;
    let is_key = key.len() == 64 && key.bytes().all(|b| b.is_ascii_hexdigit());
    is_key.then_some(key)
}

/// Decodes the payload of a base64 `data:` URI
///
/// # Example
///
/// ```
/// use novel_harvest::crawler::decode_data_uri;
///
/// assert_eq!(decode_data_uri("data:text/plain;base64,aGk=").unwrap(), b"hi");
/// assert!(decode_data_uri("data:text/plain,hi").is_err());
/// ```
pub fn decode_data_uri(uri: &str) -> Result<Vec<u8>, String> {
    let (_, payload) = uri
        .split_once("base64,")
        .ok_or_else(|| "data URI is not base64 encoded".to_string())?;

    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| format!("Invalid base64 in data URI: {}", e))
}

/// Shortens data URIs for log lines and reports
fn display_url(resolved: &str) -> String {
    if is_data_uri(resolved) && resolved.len() > 48 {
        let end = resolved
            .char_indices()
            .nth(40)
            .map(|(i, _)| i)
            .unwrap_or(resolved.len());
        format!("{}...", &resolved[..end])
    } else {
        resolved.to_string()
    }
}
