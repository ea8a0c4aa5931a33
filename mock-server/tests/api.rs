use axum::http::{self, Request, StatusCode};
use http_body_util::BodyExt;
use mock_server::{app, ENCODED_PAYLOAD, PNG_BYTES};
use serde_json::Value;
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

fn post(body: &str, content_type: Option<&str>) -> Request<String> {
    let mut builder = Request::builder().method("POST").uri("/post");
    if let Some(ct) = content_type {
        builder = builder.header(http::header::CONTENT_TYPE, ct);
    }
    builder.body(body.to_string()).unwrap()
}

fn get(uri: &str) -> Request<String> {
    Request::builder().uri(uri).body(String::new()).unwrap()
}

// --- status ---

#[tokio::test]
async fn status_route_echoes_code() {
    for code in [200u16, 400, 403, 404, 500, 502] {
        let resp = app().oneshot(get(&format!("/status/{code}"))).await.unwrap();
        assert_eq!(resp.status().as_u16(), code);
    }
}

#[tokio::test]
async fn status_route_rejects_invalid_code() {
    let resp = app().oneshot(get("/status/1000")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// --- headers ---

#[tokio::test]
async fn headers_route_title_cases_names() {
    let req = Request::builder()
        .uri("/headers")
        .header("x-custom-header", "c4e19e69")
        .body(String::new())
        .unwrap();
    let resp = app().oneshot(req).await.unwrap();
    assert_eq!(
        resp.headers().get(http::header::CONTENT_TYPE).unwrap(),
        "application/json"
    );
    let data = body_json(resp).await;
    assert_eq!(data["headers"]["X-Custom-Header"], "c4e19e69");
}

// --- post ---

#[tokio::test]
async fn post_raw_text_lands_in_data() {
    let resp = app()
        .oneshot(post("id;name\n123;John Smith", None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let data = body_json(resp).await;
    assert_eq!(data["data"], "id;name\n123;John Smith");
    assert_eq!(data["form"], serde_json::json!({}));
    assert_eq!(data["json"], Value::Null);
    assert!(data["headers"].get("Content-Type").is_none());
}

#[tokio::test]
async fn post_form_is_decoded() {
    let resp = app()
        .oneshot(post(
            "id=123&name=John+Smith",
            Some("application/x-www-form-urlencoded"),
        ))
        .await
        .unwrap();
    let data = body_json(resp).await;
    assert_eq!(data["form"]["id"], "123");
    assert_eq!(data["form"]["name"], "John Smith");
    assert_eq!(data["json"], Value::Null);
}

#[tokio::test]
async fn post_json_is_parsed() {
    let resp = app()
        .oneshot(post(
            r#"{"id":123,"name":"John Smith"}"#,
            Some("application/json"),
        ))
        .await
        .unwrap();
    let data = body_json(resp).await;
    assert_eq!(data["json"]["id"], 123);
    assert_eq!(data["json"]["name"], "John Smith");
    assert_eq!(data["form"], serde_json::json!({}));
    assert_eq!(data["headers"]["Content-Type"], "application/json");
}

// --- content ---

#[tokio::test]
async fn png_has_exact_length() {
    let resp = app().oneshot(get("/image/png")).await.unwrap();
    assert_eq!(resp.headers().get(http::header::CONTENT_TYPE).unwrap(), "image/png");
    let bytes = body_bytes(resp).await;
    assert_eq!(&bytes[..], PNG_BYTES);
}

#[tokio::test]
async fn deny_is_plain_text() {
    let resp = app().oneshot(get("/deny")).await.unwrap();
    assert_eq!(resp.headers().get(http::header::CONTENT_TYPE).unwrap(), "text/plain");
    let bytes = body_bytes(resp).await;
    assert!(String::from_utf8_lossy(&bytes).contains("YOU SHOULDN'T BE HERE"));
}

#[tokio::test]
async fn encoded_route_labels_payload() {
    let resp = app().oneshot(get("/encoded/gzip")).await.unwrap();
    assert_eq!(resp.headers().get(http::header::CONTENT_ENCODING).unwrap(), "gzip");
    assert_eq!(&body_bytes(resp).await[..], ENCODED_PAYLOAD);
}

#[tokio::test]
async fn redirect_to_sets_location() {
    let resp = app()
        .oneshot(get("/redirect-to?url=%2Fget&status_code=307"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(resp.headers().get(http::header::LOCATION).unwrap(), "/get");
}

#[tokio::test]
async fn redirect_to_defaults_to_302() {
    let resp = app().oneshot(get("/redirect-to?url=%2Fget")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn get_echoes_query_args() {
    let resp = app().oneshot(get("/get?a=1&b=two")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let data = body_json(resp).await;
    assert_eq!(data["args"]["a"], "1");
    assert_eq!(data["args"]["b"], "two");
}
