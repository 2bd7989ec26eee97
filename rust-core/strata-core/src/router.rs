//! # Router
//!
//! Routes are registered per HTTP method during startup and matched in
//! registration order: the first pattern matching the whole path wins,
//! even when a later one would be more specific.
//!
//! ```ignore
//! let mut router = Router::new().with_prefix("/app");
//! router.get("/posts/{id}", PostController::show)?.name("posts.show")?;
//! router.group(MiddlewareChain::new().with(SessionAuthMiddleware::default()), |r| {
//!     r.post("/posts", PostController::store)?;
//!     Ok(())
//! })?;
//! assert_eq!(router.route("posts.show", &["7"])?, "/app/posts/7");
//! ```

use crate::error::{Error, Result};
use crate::handler::{BoxedHandler, IntoHandler, Params};
use crate::middleware::{Middleware, MiddlewareChain};
use crate::render::{DefaultRenderer, Renderer};
use crate::report::{ErrorReporter, TracingReporter};
use crate::route::RoutePattern;
use crate::state::AppState;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// HTTP methods supported by the router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    /// HTTP GET
    Get,
    /// HTTP POST
    Post,
    /// HTTP PUT
    Put,
    /// HTTP DELETE
    Delete,
    /// HTTP PATCH
    Patch,
    /// HTTP HEAD
    Head,
    /// HTTP OPTIONS
    Options,
}

impl Method {
    /// Map a hyper method; extension methods are unsupported
    #[must_use]
    pub fn from_hyper(method: &hyper::Method) -> Option<Self> {
        match *method {
            hyper::Method::GET => Some(Self::Get),
            hyper::Method::POST => Some(Self::Post),
            hyper::Method::PUT => Some(Self::Put),
            hyper::Method::DELETE => Some(Self::Delete),
            hyper::Method::PATCH => Some(Self::Patch),
            hyper::Method::HEAD => Some(Self::Head),
            hyper::Method::OPTIONS => Some(Self::Options),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
            Self::Patch => write!(f, "PATCH"),
            Self::Head => write!(f, "HEAD"),
            Self::Options => write!(f, "OPTIONS"),
        }
    }
}

impl FromStr for Method {
    type Err = Error;

    /// Case-insensitive, as sent in a `_method` form field
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "DELETE" => Ok(Self::Delete),
            "PATCH" => Ok(Self::Patch),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            _ => Err(Error::BadRequest {
                reason: format!("Unknown method {s:?}"),
            }),
        }
    }
}

/// A registered route
pub(crate) struct RouteEntry {
    pub(crate) pattern: RoutePattern,
    pub(crate) handler: BoxedHandler,
    pub(crate) middleware: MiddlewareChain,
}

/// Matched route with its captured parameters
pub struct Match<'a> {
    pub(crate) entry: &'a RouteEntry,
    /// Captured path segments, in pattern order
    pub params: Params,
}

impl Match<'_> {
    /// Pattern of the matched route
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.entry.pattern.pattern
    }

    /// Route-level middleware, group middleware first
    #[must_use]
    pub fn middleware(&self) -> &MiddlewareChain {
        &self.entry.middleware
    }
}

impl fmt::Debug for Match<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Match")
            .field("pattern", &self.pattern())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Route table plus the collaborators dispatch needs
pub struct Router {
    routes: HashMap<Method, Vec<RouteEntry>>,
    names: HashMap<String, RoutePattern>,
    last_registered: Option<RoutePattern>,
    group: MiddlewareChain,
    pub(crate) middleware: MiddlewareChain,
    pub(crate) prefix: String,
    pub(crate) debug: bool,
    pub(crate) renderer: Arc<dyn Renderer>,
    pub(crate) reporter: Arc<dyn ErrorReporter>,
    pub(crate) state: AppState,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Create a new empty router
    #[must_use]
    pub fn new() -> Self {
        let renderer: Arc<dyn Renderer> = Arc::new(DefaultRenderer);
        let state = AppState::new();
        state.insert(renderer.clone());
        Self {
            routes: HashMap::new(),
            names: HashMap::new(),
            last_registered: None,
            group: MiddlewareChain::new(),
            middleware: MiddlewareChain::new(),
            prefix: String::new(),
            debug: false,
            renderer,
            reporter: Arc::new(TracingReporter),
            state,
        }
    }

    /// Path prefix stripped before matching and prepended by [`route`](Self::route)
    #[must_use]
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.trim_end_matches('/').to_string();
        self
    }

    /// Show diagnostics instead of generic error pages
    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// View renderer, also reachable from handlers through the request
    #[must_use]
    pub fn renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderer = Arc::new(renderer);
        self.state.insert(self.renderer.clone());
        self
    }

    /// Sink for errors caught at the dispatch boundary
    #[must_use]
    pub fn reporter(mut self, reporter: impl ErrorReporter + 'static) -> Self {
        self.reporter = Arc::new(reporter);
        self
    }

    /// Application state attached to every request
    #[must_use]
    pub fn state(mut self, state: AppState) -> Self {
        state.insert(self.renderer.clone());
        self.state = state;
        self
    }

    /// Application state attached to every request
    #[must_use]
    pub const fn app_state(&self) -> &AppState {
        &self.state
    }

    /// Middleware run for every matched route, before route middleware
    pub fn middleware<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.middleware.add(middleware);
        self
    }

    /// Register a route
    ///
    /// Group middleware, if any, runs before `middleware`. Registering the
    /// same pattern again for the same method replaces the earlier route
    /// in place.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidRoutePattern` if the pattern fails to compile.
    pub fn add_route<H, Args>(
        &mut self,
        method: Method,
        pattern: &str,
        handler: H,
        middleware: MiddlewareChain,
    ) -> Result<&mut Self>
    where
        H: IntoHandler<Args>,
    {
        let pattern = RoutePattern::new(pattern)?;
        let mut chain = self.group.clone();
        chain.extend(&middleware);

        let entry = RouteEntry {
            pattern: pattern.clone(),
            handler: handler.into_handler(),
            middleware: chain,
        };

        let routes = self.routes.entry(method).or_default();
        match routes
            .iter_mut()
            .find(|r| r.pattern.pattern == pattern.pattern)
        {
            Some(existing) => *existing = entry,
            None => routes.push(entry),
        }

        self.last_registered = Some(pattern);
        Ok(self)
    }

    /// Convenience method to add a GET route
    ///
    /// # Errors
    ///
    /// See [`add_route`](Self::add_route).
    pub fn get<H: IntoHandler<Args>, Args>(&mut self, pattern: &str, handler: H) -> Result<&mut Self> {
        self.add_route(Method::Get, pattern, handler, MiddlewareChain::new())
    }

    /// Convenience method to add a POST route
    ///
    /// # Errors
    ///
    /// See [`add_route`](Self::add_route).
    pub fn post<H: IntoHandler<Args>, Args>(&mut self, pattern: &str, handler: H) -> Result<&mut Self> {
        self.add_route(Method::Post, pattern, handler, MiddlewareChain::new())
    }

    /// Convenience method to add a PUT route
    ///
    /// # Errors
    ///
    /// See [`add_route`](Self::add_route).
    pub fn put<H: IntoHandler<Args>, Args>(&mut self, pattern: &str, handler: H) -> Result<&mut Self> {
        self.add_route(Method::Put, pattern, handler, MiddlewareChain::new())
    }

    /// Convenience method to add a DELETE route
    ///
    /// # Errors
    ///
    /// See [`add_route`](Self::add_route).
    pub fn delete<H: IntoHandler<Args>, Args>(&mut self, pattern: &str, handler: H) -> Result<&mut Self> {
        self.add_route(Method::Delete, pattern, handler, MiddlewareChain::new())
    }

    /// Convenience method to add a PATCH route
    ///
    /// # Errors
    ///
    /// See [`add_route`](Self::add_route).
    pub fn patch<H: IntoHandler<Args>, Args>(&mut self, pattern: &str, handler: H) -> Result<&mut Self> {
        self.add_route(Method::Patch, pattern, handler, MiddlewareChain::new())
    }

    /// GET route with its own middleware
    ///
    /// # Errors
    ///
    /// See [`add_route`](Self::add_route).
    pub fn get_with<H: IntoHandler<Args>, Args>(
        &mut self,
        pattern: &str,
        handler: H,
        middleware: MiddlewareChain,
    ) -> Result<&mut Self> {
        self.add_route(Method::Get, pattern, handler, middleware)
    }

    /// POST route with its own middleware
    ///
    /// # Errors
    ///
    /// See [`add_route`](Self::add_route).
    pub fn post_with<H: IntoHandler<Args>, Args>(
        &mut self,
        pattern: &str,
        handler: H,
        middleware: MiddlewareChain,
    ) -> Result<&mut Self> {
        self.add_route(Method::Post, pattern, handler, middleware)
    }

    /// PUT route with its own middleware
    ///
    /// # Errors
    ///
    /// See [`add_route`](Self::add_route).
    pub fn put_with<H: IntoHandler<Args>, Args>(
        &mut self,
        pattern: &str,
        handler: H,
        middleware: MiddlewareChain,
    ) -> Result<&mut Self> {
        self.add_route(Method::Put, pattern, handler, middleware)
    }

    /// DELETE route with its own middleware
    ///
    /// # Errors
    ///
    /// See [`add_route`](Self::add_route).
    pub fn delete_with<H: IntoHandler<Args>, Args>(
        &mut self,
        pattern: &str,
        handler: H,
        middleware: MiddlewareChain,
    ) -> Result<&mut Self> {
        self.add_route(Method::Delete, pattern, handler, middleware)
    }

    /// Apply `middleware` to every route registered inside `routes`
    ///
    /// Groups do not nest: an inner group replaces the outer group's
    /// middleware, and leaving any group clears it.
    ///
    /// # Errors
    ///
    /// Propagates the first registration error from `routes`.
    pub fn group<F>(&mut self, middleware: MiddlewareChain, routes: F) -> Result<()>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        self.group = middleware;
        let result = routes(self);
        self.group = MiddlewareChain::new();
        result
    }

    /// Name the most recently registered route
    ///
    /// # Errors
    ///
    /// Returns `Error::NoRouteToName` if no route has been registered.
    pub fn name(&mut self, name: &str) -> Result<&mut Self> {
        let pattern = self
            .last_registered
            .clone()
            .ok_or_else(|| Error::NoRouteToName {
                name: name.to_string(),
            })?;
        self.names.insert(name.to_string(), pattern);
        Ok(self)
    }

    /// Path of a named route with `params` substituted in order
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteNameNotFound` for an unknown name.
    pub fn route<S: AsRef<str>>(&self, name: &str, params: &[S]) -> Result<String> {
        let pattern = self
            .names
            .get(name)
            .ok_or_else(|| Error::RouteNameNotFound {
                name: name.to_string(),
            })?;
        let path = pattern.fill(params);
        Ok(format!("{}/{}", self.prefix, path.trim_matches('/')))
    }

    /// Match a normalized path against the routes of `method`
    ///
    /// # Errors
    ///
    /// Returns `Error::RouteNotFound` if no pattern matches.
    pub fn match_route(&self, method: Method, path: &str) -> Result<Match<'_>> {
        self.routes
            .get(&method)
            .into_iter()
            .flatten()
            .find_map(|entry| {
                entry.pattern.captures(path).map(|values| Match {
                    entry,
                    params: Params::new(values),
                })
            })
            .ok_or_else(|| Error::RouteNotFound {
                method: method.to_string(),
                path: path.to_string(),
            })
    }

    /// Registered patterns for `method`, in match order
    pub fn patterns(&self, method: Method) -> impl Iterator<Item = &str> {
        self.routes
            .get(&method)
            .into_iter()
            .flatten()
            .map(|entry| entry.pattern.pattern.as_str())
    }

    /// Total number of registered routes
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.values().map(Vec::len).sum()
    }

    /// Whether no route is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.len())
            .field("names", &self.names.keys().collect::<Vec<_>>())
            .field("prefix", &self.prefix)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}
