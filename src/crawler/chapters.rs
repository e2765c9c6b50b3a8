//! Chapter phase: restore or fetch every chapter body

use crate::book::Chapter;
use crate::crawler::pool::{TaskError, WorkerPool};
use crate::crawler::retry::RetryError;
use crate::crawler::RunContext;
use crate::output::{phase_bar, ResourceKind};
use crate::HarvestError;
use indicatif::ProgressBar;

/// Fetches every chapter that is not already in the store
///
/// One pool task per chapter. Chapters that cannot be fetched keep an empty
/// body and are recorded as failures; the phase still succeeds. Running the
/// phase again only fetches what is still missing.
///
/// # Returns
///
/// * `Ok(Vec<Chapter>)` - All chapters, sorted by id
/// * `Err(HarvestError::Cancelled)` - The run was cancelled
pub async fn fetch_chapters(
    ctx: &RunContext,
    pool: &WorkerPool,
    chapters: Vec<Chapter>,
) -> Result<Vec<Chapter>, HarvestError> {
    ctx.stats.set_chapter_total(chapters.len());
    let failures_before = ctx.stats.failure_count();
    let bar = phase_bar("Chapters", chapters.len(), ctx.quiet);

    let handles: Vec<_> = chapters
        .into_iter()
        .map(|chapter| {
            let descriptor = chapter.clone();
            let task_ctx = ctx.clone();
            let task_bar = bar.clone();
            let handle =
                pool.submit(async move { process_chapter(&task_ctx, chapter, &task_bar).await });
            (descriptor, handle)
        })
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    let mut cancelled = false;

    for (descriptor, handle) in handles {
        match handle.join().await {
            Ok(Some(chapter)) => results.push(chapter),
            Ok(None) | Err(TaskError::Cancelled) => cancelled = true,
            Err(TaskError::Panicked(message)) => {
                ctx.stats.record_failure(
                    ResourceKind::Chapter,
                    Some(descriptor.id),
                    &descriptor.url,
                    format!("Task panicked: {}", message),
                );
                ctx.stats.chapter_done(false);
                bar.inc(1);
                results.push(descriptor);
            }
        }
    }
    bar.finish_and_clear();

    if cancelled || ctx.cancel.is_cancelled() {
        return Err(HarvestError::Cancelled);
    }

    results.sort_by_key(|chapter| chapter.id);

    let failed = ctx.stats.failure_count() - failures_before;
    if failed > 0 {
        tracing::warn!("{} of {} chapters could not be fetched", failed, results.len());
    }
    tracing::info!("Processed {} chapters", results.len());

    Ok(results)
}

/// Restores or fetches one chapter
///
/// Returns `None` only when the run was cancelled; the chapter is then left
/// out of the store so a later run fetches it.
async fn process_chapter(
    ctx: &RunContext,
    mut chapter: Chapter,
    bar: &ProgressBar,
) -> Option<Chapter> {
    if !ctx.chapters.load(&mut chapter).is_empty() {
        ctx.stats.chapter_done(false);
        bar.inc(1);
        return Some(chapter);
    }

    let label = format!("Chapter {}", chapter.id);
    let fetched = {
        let source = &ctx.source;
        let descriptor = &chapter;
        ctx.retry
            .execute(&ctx.cancel, &label, move || {
                source.fetch_chapter_body(descriptor)
            })
            .await
    };

    let body = match fetched {
        Ok(body) => body,
        Err(RetryError::Cancelled) => return None,
        Err(RetryError::Exhausted { .. }) => String::new(),
    };

    if body.trim().is_empty() {
        ctx.stats.record_failure(
            ResourceKind::Chapter,
            Some(chapter.id),
            &chapter.url,
            format!("Body is empty: {}", chapter.url),
        );
        ctx.stats.chapter_done(false);
        bar.inc(1);
        return Some(chapter);
    }

    chapter.body = body;
    match ctx.chapters.save(&mut chapter) {
        Ok(_) => ctx.stats.chapter_done(true),
        Err(e) => {
            ctx.stats.record_failure(
                ResourceKind::Chapter,
                Some(chapter.id),
                &chapter.url,
                format!("Failed to save: {}", e),
            );
            chapter.body.clear();
            ctx.stats.chapter_done(false);
        }
    }
    bar.inc(1);

    Some(chapter)
}
