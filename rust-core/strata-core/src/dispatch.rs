//! # Dispatch
//!
//! One request in, one response out. Middleware, the CSRF check and the
//! handler run on a spawned task; whatever fails there, panics included,
//! is reported and rendered here instead of escaping to the server.

use crate::csrf;
use crate::error::Error;
use crate::middleware::{MiddlewareChain, MiddlewareResult};
use crate::render::escape_html;
use crate::request::Request;
use crate::response::Response;
use crate::router::{Method, Router};
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use tracing::{debug, warn};

/// Form field overriding the method of a POST request
pub const METHOD_FIELD: &str = "_method";

impl Router {
    /// Dispatch a request to its route and produce the response
    ///
    /// An unmatched path yields the renderer's 404 page. Every other
    /// failure goes through the error boundary, so this never fails.
    pub async fn dispatch(&self, req: Request) -> Response {
        let mut req = req.with_state(self.state.clone());
        let path = self.normalize(&req.path);
        let Some(method) = effective_method(&req) else {
            debug!(path = %path, "Unknown method override");
            return Response::html(self.renderer.error_page(404)).with_status(404);
        };

        let (handler, params, chain) = match self.match_route(method, &path) {
            Ok(matched) => {
                debug!(%method, path = %path, route = matched.pattern(), "Route matched");
                let mut chain = self.middleware.clone();
                chain.extend(matched.middleware());
                (matched.entry.handler.clone(), matched.params, chain)
            }
            Err(_) => {
                debug!(%method, path = %path, "No route matched");
                return Response::html(self.renderer.error_page(404)).with_status(404);
            }
        };

        req.method = method;
        let req = Arc::new(req);
        let task_req = req.clone();
        let task_chain = chain.clone();

        let outcome = tokio::spawn(async move {
            if let MiddlewareResult::Respond(res) = task_chain.run_before(&task_req).await? {
                return Ok(res);
            }
            if method == Method::Post {
                csrf::verify(&task_req).map_err(|e| {
                    warn!(path = %task_req.path, "CSRF token rejected");
                    e
                })?;
            }
            handler(task_req, params).await
        })
        .await
        .unwrap_or_else(|e| {
            Err(Error::HandlerPanicked {
                message: if e.is_panic() {
                    panic_message(e.into_panic())
                } else {
                    "handler task cancelled".to_string()
                },
            })
        });

        let mut res = outcome.unwrap_or_else(|err| self.handle_error(&req, &err));
        chain.run_after(&req, &mut res);
        res
    }

    /// Report `err` and turn it into a response for this client
    #[must_use]
    pub fn handle_error(&self, req: &Request, err: &Error) -> Response {
        self.reporter.report(err);

        let status = err.status_code();
        let negotiated_json = req.is_ajax() || req.wants_json();
        let res = match (self.debug, negotiated_json) {
            (true, true) => Response::json_value(&json!({
                "statusCode": status,
                "error": err.to_string(),
                "kind": err.kind(),
            })),
            (true, false) => Response::html(diagnostic_page(req, err)),
            (false, true) => Response::json_value(&json!({
                "statusCode": status,
                "error": err.reason(),
            })),
            (false, false) => Response::html(self.renderer.error_page(status)),
        };
        res.with_status(status)
    }

    fn normalize(&self, path: &str) -> String {
        let path = path.split('?').next().unwrap_or_default();
        let path = if self.prefix.is_empty() {
            path
        } else {
            path.strip_prefix(self.prefix.as_str())
                .filter(|rest| rest.is_empty() || rest.starts_with('/'))
                .unwrap_or(path)
        };
        format!("/{}", path.trim_start_matches('/'))
    }
}

/// Request method, or the `_method` form field of a POST
///
/// `None` when the override names an unknown method.
fn effective_method(req: &Request) -> Option<Method> {
    if req.method != Method::Post {
        return Some(req.method);
    }
    match req.form().get(METHOD_FIELD) {
        Some(raw) => raw.parse().ok(),
        None => Some(Method::Post),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

fn diagnostic_page(req: &Request, err: &Error) -> String {
    let status = err.status_code();
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{status} | {kind}</title></head>\n\
         <body>\n<h1>{kind}</h1>\n<p>{message}</p>\n<dl>\n\
         <dt>Status</dt><dd>{status}</dd>\n<dt>Request</dt><dd>{method} {path}</dd>\n\
         </dl>\n</body>\n</html>\n",
        kind = err.kind(),
        message = escape_html(&err.to_string()),
        method = req.method,
        path = escape_html(&req.path),
    )
}
