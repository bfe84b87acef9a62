//! Plain-text/HTML status pages for non-upgrade requests and upgrade
//! failures, mirroring `internal/statuspage/write.go`'s content negotiation
//! and `X-Status-Message` header.

use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

pub fn write(headers: &HeaderMap, code: StatusCode, message: &str) -> Response {
    let text = code.canonical_reason().unwrap_or("");
    let body = if prefers_html(headers) {
        format!(
            "<!DOCTYPE html><html><head><title>{code} {text}</title></head>\
             <body><h1>{code} {text}</h1><p>{message}</p></body></html>",
            code = code.as_u16(),
        )
    } else {
        format!("{} {text}\n\n{message}\n", code.as_u16())
    };
    let content_type = if prefers_html(headers) {
        "text/html; charset=utf-8"
    } else {
        "text/plain; charset=utf-8"
    };

    let mut response = (code, body).into_response();
    response
        .headers_mut()
        .insert("content-type", HeaderValue::from_static(content_type));
    if let Ok(value) = HeaderValue::from_str(message) {
        response.headers_mut().insert("x-status-message", value);
    }
    response
}

/// Parses `Accept`'s comma-separated media ranges and their `q` parameters
/// well enough to decide between `text/html` and `text/plain`, the same
/// comparison `useHTML` makes.
fn prefers_html(headers: &HeaderMap) -> bool {
    let Some(accept) = headers.get("accept").and_then(|v| v.to_str().ok()) else {
        return false;
    };

    let mut html_q = -1.0f32;
    let mut text_q = 0.0f32;

    for range in accept.split(',') {
        let mut parts = range.split(';');
        let media = parts.next().unwrap_or("").trim();
        let q = parts
            .filter_map(|p| p.trim().strip_prefix("q="))
            .find_map(|v| v.parse::<f32>().ok())
            .unwrap_or(1.0);

        match media {
            "text/html" | "application/xhtml+xml" => html_q = html_q.max(q),
            "text/plain" | "text/*" | "*/*" => text_q = text_q.max(q),
            _ => {}
        }
    }

    html_q > text_q
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn defaults_to_text_plain() {
        assert!(!prefers_html(&HeaderMap::new()));
    }

    #[test]
    fn html_preferred_when_its_q_is_higher() {
        let mut headers = HeaderMap::new();
        headers.insert("accept", HeaderValue::from_static("text/html;q=0.9,*/*;q=0.8"));
        assert!(prefers_html(&headers));
    }

    #[test]
    fn text_preferred_when_its_q_is_higher() {
        let mut headers = HeaderMap::new();
        headers.insert("accept", HeaderValue::from_static("text/html;q=0.8,text/plain;q=0.9"));
        assert!(!prefers_html(&headers));
    }

    #[test]
    fn response_carries_the_status_message_header() {
        let response = write(&HeaderMap::new(), StatusCode::SERVICE_UNAVAILABLE, "bus unavailable");
        assert_eq!(
            response.headers().get("x-status-message").unwrap(),
            "bus unavailable"
        );
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
