//! The router contract.
//!
//! The server hands every parsed [`Request`] to a [`Router`], which either
//! produces a [`Response`], reports that no endpoint matched (`Ok(None)`), or
//! fails with a [`RouteError`]. How a router matches requests is its own
//! business; [`Routes`] is a minimal exact-path table for small services and
//! tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::RouteError;
use crate::{Method, Request, Response};

/// Outcome of dispatching one request.
pub type RouteResult = Result<Option<Response>, RouteError>;

/// Boxed future returned by [`Router::run`].
pub type RouteFuture<'a> = Pin<Box<dyn Future<Output = RouteResult> + Send + 'a>>;

/// Dispatches requests to endpoints.
///
/// Any `Fn(Arc<Request>) -> impl Future<Output = RouteResult>` closure is a
/// router:
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use verso::{Request, RouterServer, ServerConfig};
/// use verso::router::RouteResult;
///
/// let server = RouterServer::new(
///     |_req: Arc<Request>| async { RouteResult::Ok(None) },
///     ServerConfig::default(),
/// );
/// ```
pub trait Router: Send + Sync + 'static {
    /// Runs the endpoint matching `request`, if any.
    fn run(&self, request: Arc<Request>) -> RouteFuture<'_>;
}

impl<T, F> Router for T
where
    T: Fn(Arc<Request>) -> F + Send + Sync + 'static,
    F: Future<Output = RouteResult> + Send + 'static,
{
    fn run(&self, request: Arc<Request>) -> RouteFuture<'_> {
        Box::pin((self)(request))
    }
}

/// Boxed future of a matched endpoint.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Response, RouteError>> + Send>>;

/// Type-erased endpoint handler stored in a [`Routes`] table.
pub type Handler = Arc<dyn Fn(Arc<Request>) -> HandlerFuture + Send + Sync + 'static>;

// A single registered endpoint.
struct Route {
    method: Method,
    path: String,
    handler: Handler,
}

/// Exact `(method, path)` dispatch table.
///
/// Routes are tested in registration order and the first match wins. Paths
/// are compared after the version segment has been stripped from the request,
/// with a trailing slash ignored on both sides.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use serde_json::json;
/// use verso::{Request, Response};
/// use verso::router::Routes;
///
/// let mut routes = Routes::new();
/// routes.get("/status", |_req: Arc<Request>| async {
///     Ok(Response::ok(json!({ "up": true })))
/// });
/// ```
#[derive(Default)]
pub struct Routes {
    routes: Vec<Route>,
}

impl Routes {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    pub fn get<H, F>(&mut self, path: &str, handler: H)
    where
        H: Fn(Arc<Request>) -> F + Send + Sync + 'static,
        F: Future<Output = Result<Response, RouteError>> + Send + 'static,
    {
        self.add_route(Method::Get, path, handler);
    }

    pub fn post<H, F>(&mut self, path: &str, handler: H)
    where
        H: Fn(Arc<Request>) -> F + Send + Sync + 'static,
        F: Future<Output = Result<Response, RouteError>> + Send + 'static,
    {
        self.add_route(Method::Post, path, handler);
    }

    pub fn patch<H, F>(&mut self, path: &str, handler: H)
    where
        H: Fn(Arc<Request>) -> F + Send + Sync + 'static,
        F: Future<Output = Result<Response, RouteError>> + Send + 'static,
    {
        self.add_route(Method::Patch, path, handler);
    }

    pub fn delete<H, F>(&mut self, path: &str, handler: H)
    where
        H: Fn(Arc<Request>) -> F + Send + Sync + 'static,
        F: Future<Output = Result<Response, RouteError>> + Send + 'static,
    {
        self.add_route(Method::Delete, path, handler);
    }

    pub fn options<H, F>(&mut self, path: &str, handler: H)
    where
        H: Fn(Arc<Request>) -> F + Send + Sync + 'static,
        F: Future<Output = Result<Response, RouteError>> + Send + 'static,
    {
        self.add_route(Method::Options, path, handler);
    }

    // Erase the concrete handler type and store it as a `Handler` trait object.
    fn add_route<H, F>(&mut self, method: Method, path: &str, handler: H)
    where
        H: Fn(Arc<Request>) -> F + Send + Sync + 'static,
        F: Future<Output = Result<Response, RouteError>> + Send + 'static,
    {
        let handler: Handler =
            Arc::new(move |req: Arc<Request>| -> HandlerFuture { Box::pin(handler(req)) });
        self.routes.push(Route {
            method,
            path: normalize(path).to_owned(),
            handler,
        });
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl Router for Routes {
    fn run(&self, request: Arc<Request>) -> RouteFuture<'_> {
        let path = normalize(request.path());
        let handler = self
            .routes
            .iter()
            .find(|route| route.method == request.method() && route.path == path)
            .map(|route| Arc::clone(&route.handler));

        Box::pin(async move {
            match handler {
                Some(handler) => handler(request).await.map(Some),
                None => Ok(None),
            }
        })
    }
}

fn normalize(path: &str) -> &str {
    if path.len() > 1 {
        path.strip_suffix('/').unwrap_or(path)
    } else {
        path
    }
}
