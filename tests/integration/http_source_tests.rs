//! Integration tests for the HTTP content source
//!
//! These tests use wiremock to serve chapter pages and images and check the
//! extraction and error classification of `HttpSource`.

use novel_harvest::config::{SourceEntry, UserAgentConfig};
use novel_harvest::source::build_http_client;
use novel_harvest::{Chapter, ContentSource, HttpSource, SourceError};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_source(base_url: &str, remove_selectors: Vec<String>) -> HttpSource {
    let user_agent = UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    };
    let client = build_http_client(&user_agent, Duration::from_secs(5)).unwrap();
    let entry = SourceEntry {
        base_url: base_url.to_string(),
        content_selector: "div.chapter-content".to_string(),
        remove_selectors,
    };
    HttpSource::new(client, &entry).unwrap()
}

fn chapter_at(base_url: &str, page: &str) -> Chapter {
    Chapter::new(1, 1, "Chapter 1", format!("{}{}", base_url, page))
}

#[tokio::test]
async fn test_fetch_chapter_body_extracts_content() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/novel/1"))
        .and(header("user-agent", "TestBot/1.0.0 (+https://example.com/contact; test@example.com)"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(
                    r#"<html><head><title>Ch 1</title><script>x()</script></head><body>
                    <nav>Menu</nav>
                    <div class="chapter-content"><p>First line.</p><script>track()</script><p>Second line.</p></div>
                    <footer>Footer</footer>
                    </body></html>"#,
                )
                .insert_header("content-type", "text/html"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let source = create_source(&base_url, vec![]);
    let body = source
        .fetch_chapter_body(&chapter_at(&base_url, "/novel/1"))
        .await
        .unwrap();

    assert_eq!(body, "<p>First line.</p><p>Second line.</p>");
}

#[tokio::test]
async fn test_remove_selectors() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/novel/2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<div class="chapter-content"><p>Story</p><div class="ads"><p>Buy now</p></div><p>More</p></div>"#,
        ))
        .mount(&mock_server)
        .await;

    let source = create_source(&base_url, vec!["div.ads".to_string()]);
    let body = source
        .fetch_chapter_body(&chapter_at(&base_url, "/novel/2"))
        .await
        .unwrap();

    assert_eq!(body, "<p>Story</p><p>More</p>");
}

#[tokio::test]
async fn test_missing_content_is_adapter_error() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/novel/3"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>Login required</p>"))
        .mount(&mock_server)
        .await;

    let source = create_source(&base_url, vec![]);
    let result = source
        .fetch_chapter_body(&chapter_at(&base_url, "/novel/3"))
        .await;

    assert!(matches!(result, Err(SourceError::Adapter(_))));
}

#[tokio::test]
async fn test_not_found_is_adapter_error() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/novel/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    let source = create_source(&base_url, vec![]);
    let result = source
        .fetch_chapter_body(&chapter_at(&base_url, "/novel/404"))
        .await;

    match result {
        Err(SourceError::Adapter(message)) => assert!(message.contains("404")),
        other => panic!("expected adapter error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/novel/503"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let source = create_source(&base_url, vec![]);
    let result = source
        .fetch_chapter_body(&chapter_at(&base_url, "/novel/503"))
        .await;

    let error = result.unwrap_err();
    assert!(error.is_transient());
}

#[tokio::test]
async fn test_rate_limited_is_transient() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/img/busy.png"))
        .respond_with(ResponseTemplate::new(429))
        .mount(&mock_server)
        .await;

    let source = create_source(&base_url, vec![]);
    let result = source
        .fetch_bytes(&format!("{}/img/busy.png", base_url))
        .await;

    assert!(matches!(result, Err(SourceError::Fetch(_))));
}

#[tokio::test]
async fn test_fetch_bytes() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let payload: Vec<u8> = vec![0x89, b'P', b'N', b'G', 1, 2, 3];

    Mock::given(method("GET"))
        .and(path("/img/a.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(payload.clone())
                .insert_header("content-type", "image/png"),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let source = create_source(&base_url, vec![]);
    let bytes = source
        .fetch_bytes(&format!("{}/img/a.png", base_url))
        .await
        .unwrap();

    assert_eq!(bytes, payload);
}
