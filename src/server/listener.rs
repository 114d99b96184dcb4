//! The error funnel.
//!
//! [`RequestListener::handle`] is the single place where a router outcome
//! becomes a wire response. Success, no match, client errors, and internal
//! failures each produce exactly one [`EncodedResponse`]; every failure
//! shares the `{"errors": [...]}` body shape.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::task::JoinError;
use tracing::{error, warn};

use crate::config::ServerConfig;
use crate::error::{EndpointError, EndpointErrors, RouteError};
use crate::http::{EncodedResponse, Request, StatusCode};
use crate::router::{RouteResult, Router};
use crate::Response;

/// Body of the plain-text reply when no endpoint matches.
pub const NOT_FOUND_BODY: &str = "Endpoint not found.";

/// Message sent instead of internal error details when they are not exposed.
pub const REDACTED_INTERNAL_MESSAGE: &str = "An internal error occurred.";

/// Dispatches requests to a [`Router`] and converts every outcome into a
/// response.
pub struct RequestListener<R> {
    router: Arc<R>,
    config: Arc<ServerConfig>,
}

impl<R: Router> RequestListener<R> {
    pub fn new(router: R, config: ServerConfig) -> Self {
        Self {
            router: Arc::new(router),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Runs the router for `request` and returns the one response to write.
    ///
    /// | Router outcome                | Response                                  |
    /// |-------------------------------|-------------------------------------------|
    /// | `Ok(Some(response))`          | encoded body, `Cache-Control: no-cache` default |
    /// | `Ok(None)`                    | `404`, `Endpoint not found.`              |
    /// | `Err(Client)` / `Err(Clients)`| error status, `{"errors": [...]}`         |
    /// | `Err(Internal)`, panic        | `500`, `internal_error`                   |
    /// | timeout                       | `503`, `request_timeout`                  |
    pub async fn handle(&self, request: Arc<Request>) -> EncodedResponse {
        match self.dispatch(Arc::clone(&request)).await {
            Ok(Some(response)) => self.succeed(response, &request),
            Ok(None) => {
                warn!(method = %request.method(), path = request.path(), "no endpoint matched");
                EncodedResponse::new(StatusCode::NotFound)
                    .header("Content-Type", "text/plain; charset=utf-8")
                    .body(NOT_FOUND_BODY)
            }
            Err(err) => self.fail(err),
        }
    }

    // The router runs on its own task so a panicking endpoint still gets a
    // response.
    async fn dispatch(&self, request: Arc<Request>) -> RouteResult {
        let router = Arc::clone(&self.router);
        let mut task = tokio::spawn(async move { router.run(request).await });

        let joined = match self.config.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    return Err(timeout_error(limit).into());
                }
            },
            None => task.await,
        };
        joined.unwrap_or_else(|e| Err(join_failure(e)))
    }

    fn succeed(&self, mut response: Response, request: &Request) -> EncodedResponse {
        response
            .headers_mut()
            .insert_default("Cache-Control", "no-cache");
        match EncodedResponse::for_request(response, request) {
            Ok(encoded) => encoded,
            Err(err) => self.fail(err.into()),
        }
    }

    /// Converts a router failure into its wire response.
    pub fn fail(&self, error: RouteError) -> EncodedResponse {
        match error {
            RouteError::Client(err) => self.client_failure(EndpointErrors::from(err)),
            RouteError::Clients(errs) => self.client_failure(errs),
            RouteError::Internal(err) => self.internal_failure(&*err),
        }
    }

    fn client_failure(&self, errors: EndpointErrors) -> EncodedResponse {
        let status = errors.status_code();
        for err in errors.iter() {
            warn!(status = status.as_u16(), error = %err, "client error");
        }
        match serde_json::to_string(&errors) {
            Ok(body) => json_error(status, body),
            Err(e) => self.internal_failure(&e),
        }
    }

    fn internal_failure(&self, err: &(dyn std::error::Error + 'static)) -> EncodedResponse {
        error!(error = %err, "internal error");
        let message = if self.config.expose_internal_errors {
            err.to_string()
        } else {
            REDACTED_INTERNAL_MESSAGE.to_owned()
        };
        let body = json!({
            "errors": [{ "code": "internal_error", "message": message }],
        });
        json_error(StatusCode::InternalServerError, body.to_string())
    }
}

fn json_error(status: StatusCode, body: String) -> EncodedResponse {
    EncodedResponse::new(status)
        .header("Content-Type", "application/json")
        .header("Cache-Control", "no-cache")
        .body(body)
}

fn timeout_error(limit: Duration) -> EndpointError {
    EndpointError::new(
        "request_timeout",
        format!("The request did not complete within {} ms", limit.as_millis()),
    )
    .human("The server took too long to respond. Please try again.")
    .status(StatusCode::ServiceUnavailable)
}

fn join_failure(err: JoinError) -> RouteError {
    if !err.is_panic() {
        return RouteError::internal(err);
    }
    let payload = err.into_panic();
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "endpoint panicked".to_owned());
    RouteError::internal(message)
}
