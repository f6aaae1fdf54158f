//! Body and cookie decoding.
//!
//! JSON bodies are read up to the configured limit and checked for
//! well-formedness before any handler sees them. The parsed value and the
//! request's cookies are placed in request extensions.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use http_body_util::LengthLimitError;
use thiserror::Error;

/// Decoded JSON request body.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonBody(pub serde_json::Value);

#[derive(Clone)]
pub struct DecodeState {
    pub max_bytes: usize,
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Request body could not be read")]
    Unreadable,

    #[error("Malformed JSON body: {0}")]
    MalformedJson(String),
}

impl DecodeError {
    /// Only the length limit is a 413; any other read failure is the client's.
    fn from_read(error: &axum::Error, limit: usize) -> Self {
        let mut source = Some(error as &(dyn std::error::Error + 'static));
        while let Some(e) = source {
            if e.is::<LengthLimitError>() {
                return DecodeError::PayloadTooLarge { limit };
            }
            source = e.source();
        }
        DecodeError::Unreadable
    }
}

impl IntoResponse for DecodeError {
    fn into_response(self) -> Response {
        let status = match self {
            DecodeError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            DecodeError::Unreadable | DecodeError::MalformedJson(_) => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

pub async fn decode_middleware(
    State(state): State<DecodeState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let (mut parts, body) = req.into_parts();
    let jar = CookieJar::from_headers(&parts.headers);
    parts.extensions.insert(jar);

    if !is_json(&parts.headers) {
        return next.run(Request::from_parts(parts, body)).await;
    }

    let bytes = match axum::body::to_bytes(body, state.max_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, limit = state.max_bytes, "Request body rejected");
            return DecodeError::from_read(&e, state.max_bytes).into_response();
        }
    };

    if !bytes.is_empty() {
        match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(value) => {
                parts.extensions.insert(JsonBody(value));
            }
            Err(e) => return DecodeError::MalformedJson(e.to_string()).into_response(),
        }
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| {
            let mime = mime.trim().to_ascii_lowercase();
            mime == "application/json" || mime.ends_with("+json")
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::post, Router};
    use tower::ServiceExt;

    fn app(max_bytes: usize) -> Router {
        Router::new()
            .route(
                "/echo",
                post(|req: Request<Body>| async move {
                    let token = req
                        .extensions()
                        .get::<CookieJar>()
                        .and_then(|jar| jar.get("token").map(|c| c.value().to_string()))
                        .unwrap_or_default();
                    let name = req
                        .extensions()
                        .get::<JsonBody>()
                        .and_then(|JsonBody(v)| v.get("name").and_then(|n| n.as_str()).map(str::to_string))
                        .unwrap_or_default();
                    format!("{token}|{name}")
                }),
            )
            .layer(axum::middleware::from_fn_with_state(
                DecodeState { max_bytes },
                decode_middleware,
            ))
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn json_detection() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json; charset=utf-8".parse().unwrap());
        assert!(is_json(&headers));
        headers.insert(header::CONTENT_TYPE, "application/merge-patch+json".parse().unwrap());
        assert!(is_json(&headers));
        headers.insert(header::CONTENT_TYPE, "text/plain".parse().unwrap());
        assert!(!is_json(&headers));
    }

    #[tokio::test]
    async fn decodes_cookies_and_json() {
        let response = app(1024)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/echo")
                    .header("Cookie", "token=abc; theme=dark")
                    .header("Content-Type", "application/json")
                    .body(Body::from(r#"{"name":"ada"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "abc|ada");
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let response = app(1024)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/echo")
                    .header("Content-Type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn read_errors_are_classified() {
        let too_long = axum::body::to_bytes(Body::from("0123456789"), 4)
            .await
            .unwrap_err();
        assert!(matches!(
            DecodeError::from_read(&too_long, 4),
            DecodeError::PayloadTooLarge { limit: 4 }
        ));

        let aborted = axum::Error::new(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "connection reset",
        ));
        let error = DecodeError::from_read(&aborted, 4);
        assert!(matches!(error, DecodeError::Unreadable));
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_json_is_rejected() {
        let response = app(8)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/echo")
                    .header("Content-Type", "application/json")
                    .body(Body::from(r#"{"name":"a much longer value"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
