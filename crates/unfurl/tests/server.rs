// ABOUTME: Integration tests for the HTTP service: the axum router on an ephemeral port.
// ABOUTME: Exercises auth, input validation, fetch errors, cleanUrl and the success envelope.

use digests_unfurl::server::{router, AppState};
use digests_unfurl::Unfurler;
use httpmock::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio::net::TcpListener;

const PAGE: &str = r#"<html><head>
<meta property="og:title" content="Hello">
<meta property="og:image" content="/hero.jpg">
</head><body></body></html>"#;

/// Starts the service and returns its base URL.
async fn spawn_app(token: Option<&str>) -> String {
    let state = AppState::new(
        Unfurler::builder().allow_private_networks(true).build(),
        token.map(String::from),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(state)).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn get(url: &str, auth: Option<&str>) -> (u16, Value) {
    let mut req = reqwest::Client::new().get(url);
    if let Some(auth) = auth {
        req = req.header("Authorization", auth);
    }
    let resp = req.send().await.unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

fn target(server: &MockServer, path: &str) -> String {
    url::form_urlencoded::byte_serialize(server.url(path).as_bytes()).collect()
}

#[tokio::test]
async fn healthz_ok() {
    let base = spawn_app(None).await;
    let body = reqwest::get(format!("{}/healthz", base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn success_envelope() {
    let upstream = MockServer::start();
    let mock = upstream.mock(|when, then| {
        when.method(GET).path("/page");
        then.status(200)
            .header("content-type", "text/html")
            .body(PAGE);
    });
    let base = spawn_app(None).await;

    let (status, body) = get(&format!("{}/?url={}", base, target(&upstream, "/page")), None).await;
    mock.assert();

    assert_eq!(status, 200);
    assert_eq!(body["code"], 200);
    assert_eq!(body["message"], "OK");
    assert_eq!(body["data"]["title"], "Hello");
    assert_eq!(body["data"]["image"], json!(upstream.url("/hero.jpg")));
    assert_eq!(body["data"]["link"], json!(upstream.url("/page")));
    assert_eq!(body["data"]["domain"], json!(upstream.base_url()));
    assert_eq!(body["data"]["type"], "website");
    assert!(body["data"].get("cleaned_url").is_none());
}

#[tokio::test]
async fn clean_url_param() {
    let upstream = MockServer::start();
    upstream.mock(|when, then| {
        when.method(GET).path("/page");
        then.status(200).body(PAGE);
    });
    let base = spawn_app(None).await;
    let tracked = format!("{}?utm_medium=social&fbclid=1", upstream.url("/page"));
    let encoded: String = url::form_urlencoded::byte_serialize(tracked.as_bytes()).collect();

    let (_, body) = get(&format!("{}/?url={}&cleanUrl=true", base, encoded), None).await;
    assert_eq!(body["data"]["cleaned_url"], json!(upstream.url("/page")));
    assert_eq!(body["data"]["link"], json!(tracked));
}

#[tokio::test]
async fn missing_url_is_400_without_fetch() {
    let base = spawn_app(None).await;
    let (status, body) = get(&format!("{}/", base), None).await;
    assert_eq!(status, 400);
    assert_eq!(
        body,
        json!({
            "code": 400,
            "message": "Bad Request",
            "data": "Please provide a `url` query parameter, e.g. ?url=https://example.com"
        })
    );
}

#[tokio::test]
async fn token_mismatch_is_401_without_fetch() {
    let upstream = MockServer::start();
    let mock = upstream.mock(|when, then| {
        when.method(GET).path("/page");
        then.status(200).body(PAGE);
    });
    let base = spawn_app(Some("topsecret")).await;
    let url = format!("{}/?url={}", base, target(&upstream, "/page"));

    for auth in [None, Some("Bearer wrong"), Some("topsecret")] {
        let (status, body) = get(&url, auth).await;
        assert_eq!(status, 401);
        assert_eq!(body, json!({"code": 401, "message": "Unauthorized"}));
    }
    mock.assert_hits(0);

    let (status, _) = get(&url, Some("Bearer topsecret")).await;
    assert_eq!(status, 200);
    mock.assert_hits(1);
}

#[tokio::test]
async fn upstream_failure_is_structured() {
    let upstream = MockServer::start();
    upstream.mock(|when, then| {
        when.method(GET).path("/boom");
        then.status(502);
    });
    let base = spawn_app(None).await;

    let (status, body) = get(&format!("{}/?url={}", base, target(&upstream, "/boom")), None).await;
    assert_eq!(status, 500);
    assert_eq!(body["code"], 500);
    assert_eq!(body["message"], "Failed to fetch URL");
    assert_eq!(body["data"]["url"], json!(upstream.url("/boom")));
    assert!(body["data"]["reason"].as_str().unwrap().contains("502"));
}

#[tokio::test]
async fn non_http_scheme_is_400() {
    let base = spawn_app(None).await;
    let (status, body) = get(&format!("{}/?url=ftp%3A%2F%2Fexample.com%2Ffile", base), None).await;
    assert_eq!(status, 400);
    assert_eq!(body["message"], "Bad Request");
}

#[tokio::test]
async fn unparseable_query_gets_envelope() {
    let base = spawn_app(None).await;
    let (status, body) = get(&format!("{}/?url=a.com&url=b.com", base), None).await;
    assert_eq!(status, 400);
    assert_eq!(
        body,
        json!({
            "code": 400,
            "message": "Bad Request",
            "data": "Please provide a `url` query parameter, e.g. ?url=https://example.com"
        })
    );
}

#[tokio::test]
async fn unparseable_query_still_requires_token() {
    let base = spawn_app(Some("topsecret")).await;
    let (status, body) = get(&format!("{}/?url=a.com&url=b.com", base), None).await;
    assert_eq!(status, 401);
    assert_eq!(body, json!({"code": 401, "message": "Unauthorized"}));
}
