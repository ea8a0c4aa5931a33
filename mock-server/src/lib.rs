//! An httpbin-style echo server used to exercise the fetch client end to end.
//!
//! Routes mirror the httpbin.org endpoints the client is checked against, so
//! tests can run without network access.

use std::collections::BTreeMap;

use axum::{
    body::Bytes,
    extract::{Path, Query},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;

/// A tiny PNG: signature plus an IHDR chunk for a 1x1 image.
pub const PNG_BYTES: &[u8] = &[
    0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, // signature
    0x00, 0x00, 0x00, 0x0d, b'I', b'H', b'D', b'R', // IHDR length + type
    0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // width, height
    0x08, 0x06, 0x00, 0x00, 0x00, 0x1f, 0x15, 0xc4, 0x89, // depth.., crc
];

pub const DENY_TEXT: &str = "
          .-''''''-.
        .'          '.
       /   O      O   \\
      :                :
      |                |
      :       __       :
       \\  .-\"`  `\"-.  /
        '.          .'
          '-......-'
     YOU SHOULDN'T BE HERE
";

/// Opaque payload served by `/encoded/{coding}`; the client must hand it
/// back untouched.
pub const ENCODED_PAYLOAD: &[u8] = b"\x1f\x8b\x08\x00opaque-encoded-payload";

pub fn app() -> Router {
    Router::new()
        .route("/get", get(echo_get))
        .route("/status/{code}", any(status))
        .route("/headers", get(echo_headers))
        .route("/post", post(echo_post))
        .route("/image/png", get(image_png))
        .route("/deny", get(deny))
        .route("/json", get(sample_json))
        .route("/encoded/{coding}", get(encoded))
        .route("/redirect-to", any(redirect_to))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Header map in httpbin's shape: title-cased names, repeated values joined.
fn header_object(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        out.entry(title_case(name.as_str()))
            .and_modify(|v| {
                v.push(',');
                v.push_str(&value);
            })
            .or_insert(value);
    }
    out
}

fn title_case(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

async fn echo_get(
    Query(args): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
) -> Json<Value> {
    Json(json!({ "args": args, "headers": header_object(&headers) }))
}

async fn status(Path(code): Path<u16>) -> Result<StatusCode, StatusCode> {
    log::debug!("status {code} requested");
    StatusCode::from_u16(code).map_err(|_| StatusCode::BAD_REQUEST)
}

async fn echo_headers(headers: HeaderMap) -> Json<Value> {
    Json(json!({ "headers": header_object(&headers) }))
}

async fn echo_post(headers: HeaderMap, body: Bytes) -> Json<Value> {
    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

    let (data, form) = if is_form {
        let form: BTreeMap<String, String> =
            url::form_urlencoded::parse(&body).into_owned().collect();
        (String::new(), form)
    } else {
        (String::from_utf8_lossy(&body).into_owned(), BTreeMap::new())
    };
    let parsed: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    Json(json!({
        "data": data,
        "form": form,
        "json": parsed,
        "headers": header_object(&headers),
    }))
}

async fn image_png() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], PNG_BYTES)
}

async fn deny() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/plain")], DENY_TEXT)
}

async fn sample_json() -> Json<Value> {
    Json(json!({
        "slideshow": {
            "author": "Yours Truly",
            "date": "date of publication",
            "title": "Sample Slide Show",
            "slides": [
                { "title": "Wake up to WonderWidgets!", "type": "all" },
                {
                    "items": ["Why <em>WonderWidgets</em> are great", "Who <em>buys</em> WonderWidgets"],
                    "title": "Overview",
                    "type": "all"
                }
            ]
        }
    }))
}

async fn encoded(Path(coding): Path<String>) -> Response {
    (
        [
            (header::CONTENT_ENCODING, coding),
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        ],
        ENCODED_PAYLOAD,
    )
        .into_response()
}

#[derive(Deserialize)]
struct RedirectParams {
    url: String,
    status_code: Option<u16>,
}

async fn redirect_to(Query(params): Query<RedirectParams>) -> Response {
    let code = params
        .status_code
        .and_then(|c| StatusCode::from_u16(c).ok())
        .filter(StatusCode::is_redirection)
        .unwrap_or(StatusCode::FOUND);
    (code, [(header::LOCATION, params.url)]).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_case_matches_httpbin() {
        assert_eq!(title_case("x-custom-header"), "X-Custom-Header");
        assert_eq!(title_case("user-agent"), "User-Agent");
        assert_eq!(title_case("host"), "Host");
    }

    #[test]
    fn repeated_headers_are_joined() {
        let mut headers = HeaderMap::new();
        headers.append("x-multi", "a".parse().unwrap());
        headers.append("x-multi", "b".parse().unwrap());
        let obj = header_object(&headers);
        assert_eq!(obj["X-Multi"], "a,b");
    }

    #[test]
    fn png_starts_with_signature() {
        assert_eq!(&PNG_BYTES[1..4], b"PNG");
    }
}
