/// GenerationClient against a mock backend
mod common;

use common::TOKEN;
use creditgate_core::{AccessGrant, GenerationClient, GenerationConfig, RetryPolicy};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(base_uri: String) -> GenerationClient {
    GenerationClient::new(
        AccessGrant {
            base_uri,
            token: TOKEN.to_string(),
            expires_at: None,
        },
        GenerationConfig::default(),
    )
    .unwrap()
}

#[tokio::test]
async fn text2image_returns_image_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/text2image"))
        .and(header("authorization", "Bearer grant-token"))
        .and(body_json(json!({"prompt": "a cat"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"imageUrl": "https://cdn.example/cat.jpg"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(server.uri()).text2image("a cat").await;

    assert!(result.success);
    assert_eq!(result.primary_uri.as_deref(), Some("https://cdn.example/cat.jpg"));
    assert!(result.message.is_none());
}

#[tokio::test]
async fn image2image_posts_input_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/image2image"))
        .and(body_json(json!({
            "inputImageUrl": "https://cdn.example/in.jpg",
            "prompt": "watercolor"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"imageUrl": "https://cdn.example/out.jpg"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(server.uri())
        .image2image("https://cdn.example/in.jpg", "watercolor")
        .await;

    assert!(result.success);
    assert_eq!(result.primary_uri.as_deref(), Some("https://cdn.example/out.jpg"));
}

#[tokio::test]
async fn text2video_reads_url_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/text2video"))
        .and(body_json(json!({"prompt": "surf", "duration": 4})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"url": "https://cdn.example/surf.mp4"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = client_for(server.uri())
        .text2video("surf", None, Some(4.0))
        .await;

    assert!(result.success);
    assert_eq!(result.primary_uri.as_deref(), Some("https://cdn.example/surf.mp4"));
}

#[tokio::test]
async fn non_2xx_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/text2image"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let result = client_for(server.uri()).text2image("a cat").await;

    assert!(!result.success);
    assert_eq!(result.message.as_deref(), Some("HTTP error! status: 500"));
    assert_eq!(result.status, Some(500));
}

#[tokio::test]
async fn missing_result_field_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/text2video"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"imageUrl": "https://cdn.example/x.jpg"})),
        )
        .mount(&server)
        .await;

    let result = client_for(server.uri())
        .text2video("surf", None, None)
        .await;

    assert!(!result.success);
    assert!(result.message.unwrap().contains("'url'"));
}

#[tokio::test]
async fn malformed_body_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/text2image"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = client_for(server.uri()).text2image("a cat").await;

    assert!(!result.success);
    assert!(result.message.is_some());
}

#[tokio::test]
async fn transport_failure_is_a_failure_not_a_panic() {
    let server = MockServer::start().await;
    let uri = server.uri();
    drop(server);

    let result = client_for(uri).text2image("a cat").await;

    assert!(!result.success);
    assert!(result.status.is_none());
    assert!(!result.message.unwrap().is_empty());
}

#[tokio::test]
async fn timed_out_generation_is_not_resent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/text2video"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"url": "https://cdn.example/late.mp4"}))
                .set_delay(Duration::from_secs(2)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = GenerationClient::new(
        AccessGrant {
            base_uri: server.uri(),
            token: TOKEN.to_string(),
            expires_at: None,
        },
        GenerationConfig {
            request_timeout_ms: 200,
            retry: RetryPolicy {
                max_retries: 3,
                base_delay_ms: 10,
                max_delay_ms: 20,
            },
            ..GenerationConfig::default()
        },
    )
    .unwrap();

    let result = client.text2video("surf", None, None).await;

    assert!(!result.success);
    assert!(result.primary_uri.is_none());
}
