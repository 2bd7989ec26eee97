//! # Handlers
//!
//! Any async function or closure taking the captured path parameters, and
//! optionally the request before them, can serve a route:
//!
//! ```ignore
//! async fn index() -> &'static str { "home" }
//! async fn show(params: Params) -> Result<Response> { ... }
//! async fn update(req: Arc<Request>, params: Params) -> Result<Response> { ... }
//!
//! struct PostController;
//! impl PostController {
//!     async fn store(req: Arc<Request>, _: Params) -> Result<Response> { ... }
//! }
//!
//! router.get("/", index)?;
//! router.get("/posts/{id}", show)?;
//! router.put("/posts/{id}", update)?;
//! router.post("/posts", PostController::store)?;
//! ```

use crate::error::{Error, Result};
use crate::middleware::BoxFuture;
use crate::request::Request;
use crate::response::Response;
use serde::Serialize;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;

/// Path parameters captured by a route, in pattern order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<String>);

impl Params {
    /// Wrap captured values
    #[must_use]
    pub const fn new(values: Vec<String>) -> Self {
        Self(values)
    }

    /// Value at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    /// Value at `index` parsed as `T`
    ///
    /// # Errors
    ///
    /// Returns `Error::BadRequest` when the parameter is missing or does not
    /// parse.
    pub fn parse<T: FromStr>(&self, index: usize) -> Result<T> {
        let raw = self.get(index).ok_or_else(|| Error::BadRequest {
            reason: format!("Missing path parameter {index}"),
        })?;
        raw.parse().map_err(|_| Error::BadRequest {
            reason: format!("Invalid path parameter {raw:?}"),
        })
    }

    /// Number of parameters
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the route captured nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Values in order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Conversion of a handler's return value into a response
pub trait IntoResponse {
    /// Convert, or fail into the dispatch error boundary
    ///
    /// # Errors
    ///
    /// Returns the handler's own error, or a serialization error.
    fn into_response(self) -> Result<Response>;
}

impl IntoResponse for Response {
    fn into_response(self) -> Result<Response> {
        Ok(self)
    }
}

impl IntoResponse for String {
    fn into_response(self) -> Result<Response> {
        Ok(Response::html(self))
    }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Result<Response> {
        Ok(Response::html(self))
    }
}

impl IntoResponse for serde_json::Value {
    fn into_response(self) -> Result<Response> {
        Ok(Response::json(serde_json::to_string(&self)?))
    }
}

impl<T: IntoResponse> IntoResponse for Result<T> {
    fn into_response(self) -> Result<Response> {
        self?.into_response()
    }
}

/// Serialize a value as a JSON response
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Result<Response> {
        Ok(Response::json(serde_json::to_string(&self.0)?))
    }
}

/// Type-erased route handler
pub(crate) type BoxedHandler =
    Arc<dyn Fn(Arc<Request>, Params) -> BoxFuture<'static, Result<Response>> + Send + Sync>;

/// Functions usable as route handlers
///
/// `Args` only disambiguates the supported signatures.
pub trait IntoHandler<Args>: Send + Sync + 'static {
    /// Erase the handler's type
    fn into_handler(self) -> BoxedHandler;
}

impl<F, Fut, R> IntoHandler<()> for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    fn into_handler(self) -> BoxedHandler {
        Arc::new(move |_req: Arc<Request>, _params: Params| -> BoxFuture<'static, Result<Response>> {
            let fut = self();
            Box::pin(async move { fut.await.into_response() })
        })
    }
}

impl<F, Fut, R> IntoHandler<(Params,)> for F
where
    F: Fn(Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    fn into_handler(self) -> BoxedHandler {
        Arc::new(move |_req: Arc<Request>, params: Params| -> BoxFuture<'static, Result<Response>> {
            let fut = self(params);
            Box::pin(async move { fut.await.into_response() })
        })
    }
}

impl<F, Fut, R> IntoHandler<(Arc<Request>, Params)> for F
where
    F: Fn(Arc<Request>, Params) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: IntoResponse,
{
    fn into_handler(self) -> BoxedHandler {
        Arc::new(move |req: Arc<Request>, params: Params| -> BoxFuture<'static, Result<Response>> {
            let fut = self(req, params);
            Box::pin(async move { fut.await.into_response() })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Method;

    struct Greeter;

    impl Greeter {
        async fn hello(req: Arc<Request>, params: Params) -> Result<String> {
            let name = params.get(0).unwrap_or("stranger");
            Ok(format!("{} {name}", req.input("greeting").unwrap_or("hello")))
        }
    }

    fn call<Args>(
        handler: impl IntoHandler<Args>,
        uri: &str,
        params: &[&str],
    ) -> BoxFuture<'static, Result<Response>> {
        let params = Params::new(params.iter().map(ToString::to_string).collect());
        handler.into_handler()(Arc::new(Request::new(Method::Get, uri)), params)
    }

    #[test]
    fn test_params_access() {
        let params = Params::new(vec!["42".to_string(), "draft".to_string()]);
        assert_eq!(params.len(), 2);
        assert_eq!(params.get(1), Some("draft"));
        assert_eq!(params.parse::<i64>(0).unwrap(), 42);
        assert!(matches!(params.parse::<i64>(1), Err(Error::BadRequest { .. })));
        assert!(matches!(params.parse::<i64>(5), Err(Error::BadRequest { .. })));
        assert_eq!(params.iter().collect::<Vec<_>>(), ["42", "draft"]);
    }

    #[tokio::test]
    async fn test_handler_signatures() {
        let res = call(|| async { "home" }, "/", &[]).await.unwrap();
        assert_eq!(res.body, "home");
        assert_eq!(res.content_type, "text/html; charset=utf-8");

        let res = call(
            |p: Params| async move { Json(serde_json::json!({ "id": p.get(0) })) },
            "/users/7",
            &["7"],
        )
        .await
        .unwrap();
        assert_eq!(res.body, r#"{"id":"7"}"#);
        assert_eq!(res.content_type, "application/json");
    }

    #[tokio::test]
    async fn test_controller_action_receives_request() {
        let res = call(Greeter::hello, "/greet/ada?greeting=hi", &["ada"])
            .await
            .unwrap();
        assert_eq!(res.body, "hi ada");
    }

    #[tokio::test]
    async fn test_handler_errors_propagate() {
        let err = call(
            |_: Params| async { Err::<Response, _>(Error::InvalidCsrfToken) },
            "/",
            &[],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::InvalidCsrfToken));
    }
}
