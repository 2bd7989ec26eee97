//! # HTTP Request
//!
//! Request wrapper handed to middleware and handlers.
//!
//! Body, headers and query string are captured once; the form body is
//! decoded on first access.

use crate::database::Database;
use crate::error::{Error, Result};
use crate::render::Renderer;
use crate::response::Response;
use crate::router::Method;
use crate::session::Session;
use crate::state::AppState;
use http_body_util::BodyExt;
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue, ACCEPT, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::HeaderMap;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Inbound request as seen by the framework
#[derive(Debug, Clone)]
pub struct Request {
    /// HTTP method as sent by the client
    pub method: Method,
    /// Request path, without query string
    pub path: String,
    query_string: Option<String>,
    query_params: HashMap<String, String>,
    headers: HeaderMap,
    body: Option<Bytes>,
    form: OnceLock<HashMap<String, String>>,
    session: Session,
    state: AppState,
}

impl Request {
    /// Build a request from a method and a URI such as `/users?page=2`
    #[must_use]
    pub fn new(method: Method, uri: &str) -> Self {
        let (path, query_string) = match uri.split_once('?') {
            Some((p, q)) => (p.to_string(), Some(q.to_string())),
            None => (uri.to_string(), None),
        };
        let query_params = parse_pairs(query_string.as_deref().unwrap_or_default().as_bytes());

        Self {
            method,
            path,
            query_string,
            query_params,
            headers: HeaderMap::new(),
            body: None,
            form: OnceLock::new(),
            session: Session::default(),
            state: AppState::default(),
        }
    }

    /// Create from a hyper request, rejecting bodies over `max_body_size`
    ///
    /// # Errors
    ///
    /// Returns `Error::PayloadTooLarge` when the declared or actual body
    /// length exceeds the limit, `Error::BadRequest` for unsupported
    /// methods or unreadable bodies.
    pub async fn from_hyper_with_limit(
        req: hyper::Request<hyper::body::Incoming>,
        max_body_size: usize,
    ) -> Result<Self> {
        let method = Method::from_hyper(req.method()).ok_or_else(|| Error::BadRequest {
            reason: format!("Unsupported method {}", req.method()),
        })?;

        let declared = req
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<usize>().ok());
        if let Some(actual) = declared.filter(|len| *len > max_body_size) {
            return Err(Error::PayloadTooLarge {
                limit: max_body_size,
                actual,
            });
        }

        let uri = req.uri().path_and_query().map_or("/", |pq| pq.as_str());
        let mut request = Self::new(method, uri);
        request.headers = req.headers().clone();

        let bytes = req
            .into_body()
            .collect()
            .await
            .map_err(|e| Error::BadRequest {
                reason: format!("Failed to read body: {e}"),
            })?
            .to_bytes();
        if bytes.len() > max_body_size {
            return Err(Error::PayloadTooLarge {
                limit: max_body_size,
                actual: bytes.len(),
            });
        }
        if !bytes.is_empty() {
            request.body = Some(bytes);
        }

        Ok(request)
    }

    /// Set a header
    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.set_header(name, value);
        self
    }

    /// Set the raw body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self.form = OnceLock::new();
        self
    }

    /// Set an urlencoded form body and its content type
    #[must_use]
    pub fn with_form<'a>(self, fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        self.with_header(CONTENT_TYPE.as_str(), "application/x-www-form-urlencoded")
            .with_body(body)
    }

    /// Attach the client's session
    #[must_use]
    pub fn with_session(mut self, session: Session) -> Self {
        self.session = session;
        self
    }

    /// Attach application state
    #[must_use]
    pub fn with_state(mut self, state: AppState) -> Self {
        self.state = state;
        self
    }

    /// Get a header value by name (case-insensitive)
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Set or override a header
    pub fn set_header(&mut self, name: &str, value: &str) {
        if let (Ok(n), Ok(v)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            if n == CONTENT_TYPE {
                self.form = OnceLock::new();
            }
            self.headers.insert(n, v);
        }
    }

    /// Query parameters (last value wins for duplicate keys)
    #[must_use]
    pub const fn query_map(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    /// Raw query string
    #[must_use]
    pub fn query_string(&self) -> Option<&str> {
        self.query_string.as_deref()
    }

    /// Decoded `application/x-www-form-urlencoded` body; empty otherwise
    #[must_use]
    pub fn form(&self) -> &HashMap<String, String> {
        self.form.get_or_init(|| {
            let is_form = self
                .header(CONTENT_TYPE.as_str())
                .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));
            match (&self.body, is_form) {
                (Some(body), true) => parse_pairs(body),
                _ => HashMap::new(),
            }
        })
    }

    /// Input value: form body first, then query string
    #[must_use]
    pub fn input(&self, key: &str) -> Option<&str> {
        self.form()
            .get(key)
            .or_else(|| self.query_params.get(key))
            .map(String::as_str)
    }

    /// Requested page number, at least 1
    #[must_use]
    pub fn page(&self) -> u64 {
        self.query_params
            .get("page")
            .and_then(|p| p.trim().parse::<u64>().ok())
            .unwrap_or(1)
            .max(1)
    }

    /// Whether the request was sent by `XMLHttpRequest`
    #[must_use]
    pub fn is_ajax(&self) -> bool {
        self.header("x-requested-with")
            .is_some_and(|v| v.eq_ignore_ascii_case("xmlhttprequest"))
    }

    /// Whether the client accepts JSON
    #[must_use]
    pub fn wants_json(&self) -> bool {
        self.header(ACCEPT.as_str())
            .is_some_and(|v| v.contains("application/json"))
    }

    /// Get the request body as bytes
    #[must_use]
    pub fn body_bytes(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }

    /// Get the request body as string (UTF-8)
    #[must_use]
    pub fn body_str(&self) -> Option<&str> {
        self.body_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    /// Parse the body as JSON
    ///
    /// # Errors
    ///
    /// Returns `Error::BadRequest` for a missing or malformed body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let mut bytes = self
            .body_bytes()
            .ok_or_else(|| Error::BadRequest {
                reason: "Missing JSON body".to_string(),
            })?
            .to_vec();
        crate::json::parse_json_bytes(&mut bytes)
    }

    /// Client session
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Application state
    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// Shared database handle from the application state
    #[must_use]
    pub fn db(&self) -> Option<Database> {
        self.state.get::<Database>()
    }

    /// Render a view through the configured renderer
    ///
    /// # Errors
    ///
    /// Returns `Error::Render` when no renderer is configured or the view
    /// cannot be rendered.
    pub fn render(
        &self,
        view: &str,
        data: &serde_json::Value,
        layout: Option<&str>,
    ) -> Result<Response> {
        let renderer = self
            .state
            .get::<Arc<dyn Renderer>>()
            .ok_or_else(|| Error::Render {
                view: view.to_string(),
                reason: "no renderer configured".to_string(),
            })?;
        Ok(Response::html(renderer.render(view, data, layout)?))
    }
}

fn parse_pairs(input: &[u8]) -> HashMap<String, String> {
    form_urlencoded::parse(input).into_owned().collect()
}
