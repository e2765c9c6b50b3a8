//! Integration tests for the acquisition pipeline
//!
//! These tests drive full runs against an in-memory content source that
//! counts every call, and check what ends up on disk.

use async_trait::async_trait;
use base64::Engine as _;
use novel_harvest::config::{Config, CrawlerConfig, OutputConfig, UserAgentConfig};
use novel_harvest::output::ResourceKind;
use novel_harvest::source::SourceResult;
use novel_harvest::storage::ChapterStore;
use novel_harvest::url::content_key;
use novel_harvest::{Book, Chapter, ContentSource, HarvestError, Pipeline, SourceError};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const SITE: &str = "https://novel.test";

/// In-memory source with per-URL call counters
#[derive(Default)]
struct MockSource {
    bodies: HashMap<String, String>,
    bytes: HashMap<String, Vec<u8>>,
    transient: Vec<String>,
    panics: Vec<String>,
    delays: HashMap<String, Duration>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockSource {
    fn with_body(mut self, url: &str, body: &str) -> Self {
        self.bodies.insert(url.to_string(), body.to_string());
        self
    }

    fn with_bytes(mut self, url: &str, bytes: Vec<u8>) -> Self {
        self.bytes.insert(url.to_string(), bytes);
        self
    }

    fn with_delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.to_string(), delay);
        self
    }

    fn always_transient(mut self, url: &str) -> Self {
        self.transient.push(url.to_string());
        self
    }

    fn panicking(mut self, url: &str) -> Self {
        self.panics.push(url.to_string());
        self
    }

    fn calls(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    async fn hit(&self, url: &str) {
        *self.calls.lock().unwrap().entry(url.to_string()).or_insert(0) += 1;
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
    }
}

#[async_trait]
impl ContentSource for MockSource {
    async fn fetch_chapter_body(&self, chapter: &Chapter) -> SourceResult<String> {
        self.hit(&chapter.url).await;
        if self.panics.contains(&chapter.url) {
            panic!("adapter bug on {}", chapter.url);
        }
        if self.transient.contains(&chapter.url) {
            return Err(SourceError::Fetch("connection reset".to_string()));
        }
        self.bodies
            .get(&chapter.url)
            .cloned()
            .ok_or_else(|| SourceError::Adapter(format!("no page at {}", chapter.url)))
    }

    async fn fetch_bytes(&self, url: &str) -> SourceResult<Vec<u8>> {
        self.hit(url).await;
        self.bytes
            .get(url)
            .cloned()
            .ok_or_else(|| SourceError::Adapter(format!("{} returned HTTP 404", url)))
    }
}

fn chapter_url(id: u32) -> String {
    format!("{}/c/{}", SITE, id)
}

fn png_bytes() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(2, 2, image::Rgb([10, 200, 30]));
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Creates a test configuration writing into `output`
fn create_test_config(output: &Path) -> Config {
    Config {
        crawler: CrawlerConfig {
            workers: 4,
            max_attempts: 3,
            backoff_base_ms: 1,
            backoff_step_ms: 1,
            request_timeout_secs: 5,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            output_path: output.to_path_buf(),
            pack_by_volume: false,
            add_source_url: false,
            debug_mode: true,
            fallback_cover_url: None,
        },
        sources: vec![],
    }
}

fn create_test_book(chapter_count: u32) -> Book {
    Book {
        title: "Test Novel".to_string(),
        author: None,
        novel_url: format!("{}/novel", SITE),
        cover_url: None,
        volumes: vec![],
        chapters: (1..=chapter_count)
            .map(|id| Chapter::new(id, 1, format!("Chapter {}", id), chapter_url(id)))
            .collect(),
    }
}

async fn run(config: &Config, source: &Arc<MockSource>, book: &Book) -> novel_harvest::RunOutcome {
    let source: Arc<dyn ContentSource> = source.clone();
    Pipeline::new(config, source, CancellationToken::new())
        .run(book)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_three_chapters_one_empty() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let book = create_test_book(3);
    let source = Arc::new(
        MockSource::default()
            .with_body(&chapter_url(1), "<p>One</p>")
            .with_body(&chapter_url(2), "")
            .with_body(&chapter_url(3), "<p>Three</p>"),
    );

    let outcome = run(&config, &source, &book).await;

    assert_eq!(outcome.report.failed_chapter_ids(), vec![2]);
    assert_eq!(outcome.report.failure_count(), 1);
    assert_eq!(
        outcome.report.failures[0].reason,
        format!("Body is empty: {}", chapter_url(2))
    );

    let store = ChapterStore::from_config(&config.output);
    for (id, text) in [(1, "One"), (3, "Three")] {
        let mut chapter = book.chapters[id - 1].clone();
        assert_eq!(
            store.load(&mut chapter),
            format!("<h1>Chapter {}</h1>\n<p>{}</p>", id, text)
        );
    }
    assert!(!store.chapter_path(&book.chapters[1]).exists());
    assert!(dir.path().join("report.md").exists());

    // Rerun only goes back to the network for the missing chapter
    let rerun = run(&config, &source, &book).await;
    assert_eq!(source.calls(&chapter_url(1)), 1);
    assert_eq!(source.calls(&chapter_url(2)), 2);
    assert_eq!(source.calls(&chapter_url(3)), 1);
    assert_eq!(rerun.report.chapters_fetched, 0);
    assert_eq!(rerun.report.failed_chapter_ids(), vec![2]);
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(dir.path());
    config.output.add_source_url = true;
    let book = create_test_book(2);
    let image_url = format!("{}/img/a.png", SITE);
    let source = Arc::new(
        MockSource::default()
            .with_body(&chapter_url(1), r#"<p>One</p><img src="/img/a.png">"#)
            .with_body(&chapter_url(2), "<p>Two</p>")
            .with_bytes(&image_url, png_bytes()),
    );

    let first = run(&config, &source, &book).await;
    let calls_after_first = source.total_calls();
    assert_eq!(calls_after_first, 3);

    let second = run(&config, &source, &book).await;
    assert_eq!(source.total_calls(), calls_after_first);
    assert_eq!(second.report.chapters_fetched, 0);
    assert_eq!(second.report.images_fetched, 0);

    let first_bodies: Vec<&str> = first.chapters.iter().map(|c| c.body.as_str()).collect();
    let second_bodies: Vec<&str> = second.chapters.iter().map(|c| c.body.as_str()).collect();
    assert_eq!(first_bodies, second_bodies);
    assert_eq!(second.chapters[0].body.matches("<h1>").count(), 1);
    assert_eq!(second.chapters[0].body.matches("Source:").count(), 1);
}

#[tokio::test]
async fn test_shared_image_fetched_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let book = create_test_book(3);
    let image_url = format!("{}/img/a.png", SITE);
    let source = Arc::new(
        MockSource::default()
            .with_body(&chapter_url(1), &format!(r#"<p><img src="{}"></p>"#, image_url))
            .with_body(&chapter_url(2), r#"<p><img src="/img/a.png"></p>"#)
            .with_body(&chapter_url(3), r#"<p><img src="../img/a.png"></p>"#)
            .with_bytes(&image_url, png_bytes())
            .with_delay(&image_url, Duration::from_millis(30)),
    );

    let outcome = run(&config, &source, &book).await;

    assert_eq!(source.calls(&image_url), 1);
    assert_eq!(outcome.report.images_total, 1);

    let key = content_key(&image_url);
    let local = format!(r#"<img src="images/{}.jpg" alt="{}">"#, key, key);
    for chapter in &outcome.chapters {
        assert!(chapter.body.contains(&local), "chapter {}: {}", chapter.id, chapter.body);
    }

    let stored = std::fs::read(dir.path().join("images").join(format!("{}.jpg", key))).unwrap();
    assert_eq!(image::guess_format(&stored).unwrap(), image::ImageFormat::Jpeg);
}

#[tokio::test]
async fn test_chapters_ordered_regardless_of_completion() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let book = create_test_book(6);
    let mut mock = MockSource::default();
    for id in 1..=6u32 {
        mock = mock
            .with_body(&chapter_url(id), &format!("<p>Body {}</p>", id))
            .with_delay(&chapter_url(id), Duration::from_millis(10 * (7 - id) as u64));
    }
    let source = Arc::new(mock);

    let outcome = run(&config, &source, &book).await;

    let ids: Vec<u32> = outcome.chapters.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    for chapter in &outcome.chapters {
        assert!(chapter.body.ends_with(&format!("<p>Body {}</p>", chapter.id)));
    }
}

#[tokio::test]
async fn test_cancel_during_backoff() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(dir.path());
    config.crawler.workers = 1;
    config.crawler.backoff_base_ms = 60_000;
    config.crawler.backoff_step_ms = 60_000;
    let book = create_test_book(1);
    let mock = Arc::new(MockSource::default().always_transient(&chapter_url(1)));

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let source: Arc<dyn ContentSource> = mock.clone();
    let started = Instant::now();
    let result = Pipeline::new(&config, source, cancel).run(&book).await;

    assert!(matches!(result, Err(HarvestError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(mock.calls(&chapter_url(1)), 1);

    let store = ChapterStore::from_config(&config.output);
    assert!(!store.chapter_path(&book.chapters[0]).exists());
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let book = create_test_book(1);
    let source = Arc::new(MockSource::default().always_transient(&chapter_url(1)));

    let outcome = run(&config, &source, &book).await;

    assert_eq!(source.calls(&chapter_url(1)), 3);
    assert_eq!(outcome.report.failed_chapter_ids(), vec![1]);
}

#[tokio::test]
async fn test_dead_image_is_pruned() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let book = create_test_book(1);
    let ok_url = format!("{}/img/ok.png", SITE);
    let dead_url = format!("{}/img/dead.png", SITE);
    let source = Arc::new(
        MockSource::default()
            .with_body(
                &chapter_url(1),
                &format!(
                    r#"<p>Text</p><p><img src="{}"></p><p><img src="{}"></p>"#,
                    ok_url, dead_url
                ),
            )
            .with_bytes(&ok_url, png_bytes()),
    );

    let outcome = run(&config, &source, &book).await;
    let body = &outcome.chapters[0].body;

    let key = content_key(&ok_url);
    assert!(body.contains(&format!("images/{}.jpg", key)));
    assert!(!body.contains("dead.png"));
    assert_eq!(body.matches("<img").count(), 1);
    assert!(body.contains("<p>Text</p>"));

    let image_failures: Vec<_> = outcome
        .report
        .failures
        .iter()
        .filter(|f| f.kind == ResourceKind::Image)
        .collect();
    assert_eq!(image_failures.len(), 1);
    assert_eq!(image_failures[0].url, dead_url);

    // The saved record carries the rewritten body
    let store = ChapterStore::from_config(&config.output);
    let mut restored = book.chapters[0].clone();
    assert_eq!(store.load(&mut restored), *body);
}

#[tokio::test]
async fn test_data_uri_image_needs_no_network() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let book = create_test_book(1);
    let data_uri = format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png_bytes())
    );
    let source = Arc::new(
        MockSource::default().with_body(&chapter_url(1), &format!(r#"<img src="{}">"#, data_uri)),
    );

    let outcome = run(&config, &source, &book).await;

    assert_eq!(source.total_calls(), 1);
    let key = content_key(&data_uri);
    assert!(outcome.chapters[0].body.contains(&format!("images/{}.jpg", key)));
    assert!(dir.path().join("images").join(format!("{}.jpg", key)).exists());
}

#[tokio::test]
async fn test_pack_by_volume_layout() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(dir.path());
    config.output.pack_by_volume = true;
    let mut book = create_test_book(2);
    book.chapters[1].volume = 2;
    let source = Arc::new(
        MockSource::default()
            .with_body(&chapter_url(1), "<p>One</p>")
            .with_body(&chapter_url(2), "<p>Two</p>"),
    );

    run(&config, &source, &book).await;

    assert!(dir.path().join("json/Volume 01/00001.json").exists());
    assert!(dir.path().join("json/Volume 02/00002.json").exists());
}

#[tokio::test]
async fn test_panicking_chapter_is_counted_once() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let book = create_test_book(3);
    let source = Arc::new(
        MockSource::default()
            .with_body(&chapter_url(1), "<p>One</p>")
            .panicking(&chapter_url(2))
            .with_body(&chapter_url(3), "<p>Three</p>"),
    );

    let outcome = run(&config, &source, &book).await;

    assert_eq!(outcome.report.chapters_done, 3);
    assert_eq!(outcome.report.chapters_fetched, 2);
    assert_eq!(outcome.report.failed_chapter_ids(), vec![2]);
    assert_eq!(outcome.chapters.len(), 3);
}

#[tokio::test]
async fn test_save_error_only_fails_that_chapter() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(dir.path());
    config.output.pack_by_volume = true;
    std::fs::create_dir_all(dir.path().join("json")).unwrap();
    std::fs::write(dir.path().join("json/Volume 02"), b"not a directory").unwrap();

    let mut book = create_test_book(3);
    book.chapters[1].volume = 2;
    let source = Arc::new(
        MockSource::default()
            .with_body(&chapter_url(1), "<p>One</p>")
            .with_body(&chapter_url(2), "<p>Two</p>")
            .with_body(&chapter_url(3), "<p>Three</p>"),
    );

    let outcome = run(&config, &source, &book).await;

    assert_eq!(outcome.report.failed_chapter_ids(), vec![2]);
    assert_eq!(outcome.report.chapters_done, 3);
    assert!(outcome.chapters[0].has_body());
    assert!(outcome.chapters[1].body.is_empty());
    assert!(outcome.chapters[2].has_body());
    assert!(dir.path().join("json/Volume 01/00001.json").exists());
    assert!(dir.path().join("json/Volume 01/00003.json").exists());
}

#[tokio::test]
async fn test_cover_from_book() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let mut book = create_test_book(1);
    book.cover_url = Some("/cover.jpg".to_string());
    let cover_url = format!("{}/cover.jpg", SITE);
    let source = Arc::new(
        MockSource::default()
            .with_body(&chapter_url(1), "<p>One</p>")
            .with_bytes(&cover_url, png_bytes()),
    );

    let outcome = run(&config, &source, &book).await;

    let cover = outcome.cover.unwrap();
    assert_eq!(cover, dir.path().join("cover.png"));
    let bytes = std::fs::read(&cover).unwrap();
    assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Png);
    assert_eq!(source.calls(&cover_url), 1);
}

#[tokio::test]
async fn test_cover_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = create_test_config(dir.path());
    let fallback = format!("{}/fallback.png", SITE);
    config.output.fallback_cover_url = Some(fallback.clone());
    let mut book = create_test_book(1);
    book.cover_url = Some(format!("{}/missing.jpg", SITE));
    let source = Arc::new(
        MockSource::default()
            .with_body(&chapter_url(1), "<p>One</p>")
            .with_bytes(&fallback, png_bytes()),
    );

    let outcome = run(&config, &source, &book).await;

    assert!(outcome.cover.is_some());
    assert_eq!(source.calls(&fallback), 1);
    assert_eq!(source.calls(&format!("{}/missing.jpg", SITE)), 1);
    assert_eq!(outcome.report.failure_count(), 0);
}

#[tokio::test]
async fn test_existing_cover_is_reused() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    std::fs::write(dir.path().join("cover.png"), png_bytes()).unwrap();
    let mut book = create_test_book(1);
    book.cover_url = Some(format!("{}/cover.jpg", SITE));
    let source = Arc::new(MockSource::default().with_body(&chapter_url(1), "<p>One</p>"));

    let outcome = run(&config, &source, &book).await;

    assert_eq!(outcome.cover, Some(dir.path().join("cover.png")));
    assert_eq!(source.total_calls(), 1);
}

#[tokio::test]
async fn test_no_cover_available() {
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(dir.path());
    let book = create_test_book(1);
    let source = Arc::new(MockSource::default().with_body(&chapter_url(1), "<p>One</p>"));

    let outcome = run(&config, &source, &book).await;

    assert!(outcome.cover.is_none());
    assert_eq!(outcome.report.failure_count(), 0);
}
