//! # HTTP Response
//!
//! Response envelope produced by every dispatch.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::StatusCode;
use serde::Serialize;
use std::collections::HashMap;

/// Status, body and headers of one response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response body
    pub body: String,
    /// Content type
    pub content_type: String,
    /// Response headers
    pub headers: HashMap<String, String>,
}

impl Default for Response {
    fn default() -> Self {
        Self::html(String::new())
    }
}

impl Response {
    fn with_type(body: impl Into<String>, content_type: &str) -> Self {
        Self {
            status: 200,
            body: body.into(),
            content_type: content_type.to_string(),
            headers: HashMap::new(),
        }
    }

    /// JSON response from an already-encoded body
    #[must_use]
    pub fn json(body: impl Into<String>) -> Self {
        Self::with_type(body, "application/json")
    }

    /// JSON response from a serializable value
    #[must_use]
    pub fn json_value<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self::json(body),
            Err(_) => Self::json(r#"{"statusCode":500,"error":"Internal Server Error"}"#)
                .with_status(500),
        }
    }

    /// Plain text response
    #[must_use]
    pub fn text(body: impl Into<String>) -> Self {
        Self::with_type(body, "text/plain; charset=utf-8")
    }

    /// HTML response
    #[must_use]
    pub fn html(body: impl Into<String>) -> Self {
        Self::with_type(body, "text/html; charset=utf-8")
    }

    /// 302 redirect
    #[must_use]
    pub fn redirect(location: &str) -> Self {
        Self::html(String::new())
            .with_status(302)
            .with_header("Location", location)
    }

    /// Set status code
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Set a header; `Content-Type` replaces the content type
    #[must_use]
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.set_header(key, value);
        self
    }

    /// Set or override a header
    pub fn set_header(&mut self, key: &str, value: &str) {
        if key.eq_ignore_ascii_case("content-type") {
            self.content_type = value.to_string();
        } else {
            self.headers.insert(key.to_string(), value.to_string());
        }
    }

    /// Header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, key: &str) -> Option<&str> {
        if key.eq_ignore_ascii_case("content-type") {
            return Some(&self.content_type);
        }
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Convert to a hyper response
    pub(crate) fn into_hyper(self) -> hyper::Response<Full<Bytes>> {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut builder = hyper::Response::builder()
            .status(status)
            .header("Content-Type", &self.content_type);
        for (k, v) in &self.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }

        builder
            .body(Full::new(Bytes::from(self.body)))
            .unwrap_or_else(|_| {
                let mut fallback = hyper::Response::new(Full::new(Bytes::from("Internal Server Error")));
                *fallback.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
                fallback
            })
    }
}
