//! A small versioned API.
//!
//! ```text
//! RUST_LOG=verso=debug cargo run --example versioned_echo
//! curl -s localhost:8080/v1/user
//! curl -s -H 'X-Version: 2' localhost:8080/user
//! curl -s -X POST localhost:8080/v2/echo -d '{"message":"hi"}'
//! ```

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;
use verso::router::Routes;
use verso::{
    Encodeable, EndpointError, Request, Response, RouteError, RouterServer, ServerConfig,
    StatusCode,
};

struct User {
    first: &'static str,
    last: &'static str,
}

impl Encodeable for User {
    fn encode(&self, version: u32) -> Value {
        match version {
            0 | 1 => json!({ "name": format!("{} {}", self.first, self.last) }),
            _ => json!({ "firstName": self.first, "lastName": self.last }),
        }
    }
}

#[derive(Deserialize)]
struct Echo {
    message: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let mut routes = Routes::new();
    routes.get("/user", |_req: Arc<Request>| async {
        Ok(Response::ok(User {
            first: "Ada",
            last: "Lovelace",
        }))
    });
    routes.post("/echo", |req: Arc<Request>| async move {
        let echo: Echo = req.json().await?;
        if echo.message.is_empty() {
            return Err(RouteError::from(
                EndpointError::new("empty_message", "message must not be empty")
                    .field("message")
                    .human("Say something.")
                    .status(StatusCode::UnprocessableEntity),
            ));
        }
        Ok::<_, RouteError>(Response::ok(json!({ "echo": echo.message })))
    });

    let server = RouterServer::new(routes, ServerConfig::from_env()?);
    let addr = server.listen(8080).await?;
    tracing::info!(%addr, "try GET /v1/user or GET /v2/user");

    tokio::signal::ctrl_c().await?;
    server.close().await?;
    Ok(())
}
