//! # Middleware System
//!
//! Request/response interception run by the dispatcher around a handler.
//!
//! Middlewares run in registration order before the handler and may stop
//! the request by answering it themselves; `after_response` hooks run in
//! reverse order on whatever response was produced.

use crate::error::Result;
use crate::request::Request;
use crate::response::Response;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::info;

/// Boxed future returned by async middleware hooks
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Middleware trait for request/response interception
///
/// Sync closures `Fn(&Request) -> MiddlewareResult` implement it too.
pub trait Middleware: Send + Sync {
    /// Called before the request handler
    ///
    /// May answer the request itself. Errors end the request at the
    /// dispatch error boundary.
    fn before_request<'a>(&'a self, _req: &'a Request) -> BoxFuture<'a, Result<MiddlewareResult>> {
        Box::pin(async { Ok(MiddlewareResult::Continue) })
    }

    /// Called after the request handler
    fn after_response(&self, _req: &Request, _res: &mut Response) {}

    /// Middleware name for logging
    fn name(&self) -> &'static str {
        "Unknown"
    }
}

impl<F> Middleware for F
where
    F: Fn(&Request) -> MiddlewareResult + Send + Sync,
{
    fn before_request<'a>(&'a self, req: &'a Request) -> BoxFuture<'a, Result<MiddlewareResult>> {
        let result = self(req);
        Box::pin(async move { Ok(result) })
    }

    fn name(&self) -> &'static str {
        "Closure"
    }
}

/// Result of middleware execution
#[derive(Debug)]
pub enum MiddlewareResult {
    /// Continue to next middleware/handler
    Continue,
    /// Short-circuit with this response (skip handler)
    Respond(Response),
}

/// Ordered list of middlewares
#[derive(Default, Clone)]
pub struct MiddlewareChain {
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareChain {
    /// Create a new empty middleware chain
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a middleware to the chain
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) {
        self.middlewares.push(Arc::new(middleware));
    }

    /// Builder form of [`add`](Self::add)
    #[must_use]
    pub fn with<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.add(middleware);
        self
    }

    /// Append every middleware of `other`
    pub fn extend(&mut self, other: &Self) {
        self.middlewares.extend(other.middlewares.iter().cloned());
    }

    /// Run `before_request` in order, stopping at the first short-circuit
    ///
    /// # Errors
    ///
    /// Propagates the first middleware error.
    pub async fn run_before(&self, req: &Request) -> Result<MiddlewareResult> {
        for mw in &self.middlewares {
            match mw.before_request(req).await? {
                MiddlewareResult::Continue => continue,
                result @ MiddlewareResult::Respond(_) => {
                    tracing::debug!(middleware = mw.name(), "Middleware answered request");
                    return Ok(result);
                }
            }
        }
        Ok(MiddlewareResult::Continue)
    }

    /// Execute `after_response` for all middlewares (in reverse order)
    pub fn run_after(&self, req: &Request, res: &mut Response) {
        for mw in self.middlewares.iter().rev() {
            mw.after_response(req, res);
        }
    }

    /// Middleware names in order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.middlewares.iter().map(|mw| mw.name())
    }

    /// Get the number of middlewares
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Check if chain is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }
}

impl fmt::Debug for MiddlewareChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Logging middleware - logs requests in structured form
#[derive(Debug, Default)]
pub struct LoggingMiddleware;

impl LoggingMiddleware {
    /// Create a new logging middleware
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Middleware for LoggingMiddleware {
    fn before_request<'a>(&'a self, req: &'a Request) -> BoxFuture<'a, Result<MiddlewareResult>> {
        let request_id = req.header("x-request-id").unwrap_or("-");
        info!(
            method = %req.method,
            path = %req.path,
            request_id = %request_id,
            "Request received"
        );
        Box::pin(async { Ok(MiddlewareResult::Continue) })
    }

    fn after_response(&self, req: &Request, res: &mut Response) {
        let request_id = req.header("x-request-id").unwrap_or("-");
        info!(
            method = %req.method,
            path = %req.path,
            status = res.status,
            request_id = %request_id,
            "Response sent"
        );
    }

    fn name(&self) -> &'static str {
        "LoggingMiddleware"
    }
}

/// Rejects requests whose session has no logged-in user
///
/// `XMLHttpRequest` clients get a bare 401, htmx clients an
/// `HX-Redirect` header, everything else a redirect to the login page.
#[derive(Debug, Clone)]
pub struct SessionAuthMiddleware {
    session_key: String,
    login_path: String,
}

impl Default for SessionAuthMiddleware {
    fn default() -> Self {
        Self::new("user", "/login")
    }
}

impl SessionAuthMiddleware {
    /// Require `session_key` in the session, sending others to `login_path`
    #[must_use]
    pub fn new(session_key: &str, login_path: &str) -> Self {
        Self {
            session_key: session_key.to_string(),
            login_path: login_path.to_string(),
        }
    }

    fn unauthorized(&self, req: &Request) -> Response {
        if req.is_ajax() {
            Response::text("").with_status(401)
        } else if req.header("hx-request") == Some("true") {
            Response::text("").with_header("HX-Redirect", &self.login_path)
        } else {
            Response::redirect(&self.login_path)
        }
    }
}

impl Middleware for SessionAuthMiddleware {
    fn before_request<'a>(&'a self, req: &'a Request) -> BoxFuture<'a, Result<MiddlewareResult>> {
        let result = if req.session().has(&self.session_key) {
            MiddlewareResult::Continue
        } else {
            MiddlewareResult::Respond(self.unauthorized(req))
        };
        Box::pin(async move { Ok(result) })
    }

    fn name(&self) -> &'static str {
        "SessionAuthMiddleware"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Method;
    use crate::session::Session;

    #[test]
    fn test_middleware_chain_empty() {
        let chain = MiddlewareChain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.len(), 0);
    }

    #[test]
    fn test_middleware_chain_names() {
        let chain = MiddlewareChain::new()
            .with(LoggingMiddleware::new())
            .with(|_: &Request| MiddlewareResult::Continue);
        assert_eq!(chain.names().collect::<Vec<_>>(), ["LoggingMiddleware", "Closure"]);
    }

    #[tokio::test]
    async fn test_chain_stops_at_first_response() {
        let chain = MiddlewareChain::new()
            .with(|_: &Request| MiddlewareResult::Respond(Response::text("blocked").with_status(403)))
            .with(|_: &Request| -> MiddlewareResult { panic!("must not run") });

        let req = Request::new(Method::Get, "/");
        match chain.run_before(&req).await.unwrap() {
            MiddlewareResult::Respond(res) => assert_eq!(res.status, 403),
            MiddlewareResult::Continue => panic!("expected a response"),
        }
    }

    #[tokio::test]
    async fn test_session_auth() {
        let mw = SessionAuthMiddleware::default();
        let session = Session::new();
        let req = Request::new(Method::Get, "/dashboard").with_session(session.clone());

        match mw.before_request(&req).await.unwrap() {
            MiddlewareResult::Respond(res) => {
                assert_eq!(res.status, 302);
                assert_eq!(res.header("Location"), Some("/login"));
            }
            MiddlewareResult::Continue => panic!("anonymous request passed"),
        }

        let ajax = req.clone().with_header("X-Requested-With", "XMLHttpRequest");
        match mw.before_request(&ajax).await.unwrap() {
            MiddlewareResult::Respond(res) => assert_eq!(res.status, 401),
            MiddlewareResult::Continue => panic!("anonymous request passed"),
        }

        let htmx = req.clone().with_header("HX-Request", "true");
        match mw.before_request(&htmx).await.unwrap() {
            MiddlewareResult::Respond(res) => {
                assert_eq!(res.status, 200);
                assert_eq!(res.header("HX-Redirect"), Some("/login"));
            }
            MiddlewareResult::Continue => panic!("anonymous request passed"),
        }

        session.set("user", "42");
        assert!(matches!(
            mw.before_request(&req).await.unwrap(),
            MiddlewareResult::Continue
        ));
    }

    #[test]
    fn test_run_after_reverse_order() {
        struct Tag(&'static str);
        impl Middleware for Tag {
            fn after_response(&self, _req: &Request, res: &mut Response) {
                res.body.push_str(self.0);
            }
        }

        let chain = MiddlewareChain::new().with(Tag("a")).with(Tag("b"));
        let mut res = Response::text("");
        chain.run_after(&Request::new(Method::Get, "/"), &mut res);
        assert_eq!(res.body, "ba");
    }
}
