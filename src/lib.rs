//! # verso
//!
//! The core of a versioned JSON API server: request parsing with protocol
//! version resolution, version-scoped response encoding, a structured client
//! error envelope, and a listener that funnels every router outcome into
//! exactly one HTTP response.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::{Value, json};
//! use verso::router::Routes;
//! use verso::{Encodeable, Request, Response, RouterServer, ServerConfig};
//!
//! struct Greeting(String);
//!
//! impl Encodeable for Greeting {
//!     fn encode(&self, version: u32) -> Value {
//!         match version {
//!             0 | 1 => json!({ "message": self.0 }),
//!             _ => json!({ "greeting": { "text": self.0 } }),
//!         }
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut routes = Routes::new();
//!     routes.get("/hello", |_req: Arc<Request>| async {
//!         Ok(Response::ok(Greeting("Hello, World!".into())))
//!     });
//!
//!     let server = RouterServer::new(routes, ServerConfig::from_env()?);
//!     let addr = server.listen(8080).await?;
//!     println!("Listening on http://{addr} (try GET /v2/hello)");
//!     tokio::signal::ctrl_c().await?;
//!     server.close().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod encoding;
pub mod error;
pub mod http;
pub mod router;
pub mod server;

pub use config::{ConfigError, ServerConfig};
pub use encoding::{Encodeable, Response};
pub use error::{EndpointError, EndpointErrors, RouteError};
pub use http::{EncodedResponse, Headers, Method, Request, StatusCode};
pub use router::Router;
pub use server::{RouterServer, ServerError};
