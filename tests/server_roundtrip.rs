//! End-to-end tests: a real `RouterServer` on an ephemeral port, driven by raw
//! HTTP/1.1 over a `TcpStream`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use verso::router::Routes;
use verso::{
    Encodeable, EndpointError, Request, Response, RouteError, RouterServer, ServerConfig,
    StatusCode,
};

struct Account {
    id: u32,
    name: &'static str,
}

impl Encodeable for Account {
    fn encode(&self, version: u32) -> Value {
        match version {
            0..=1 => json!({ "id": self.id, "name": self.name }),
            _ => json!({ "id": self.id, "profile": { "displayName": self.name } }),
        }
    }
}

#[derive(Deserialize)]
struct NewAccount {
    name: String,
}

fn routes() -> Routes {
    let mut routes = Routes::new();
    routes.get("/account", |_req: Arc<Request>| async {
        Ok(Response::ok(Account { id: 7, name: "Ada" }))
    });
    routes.get("/accounts", |_req: Arc<Request>| async {
        Ok(Response::list([
            Account { id: 1, name: "Ada" },
            Account { id: 2, name: "Grace" },
        ]))
    });
    routes.post("/accounts", |req: Arc<Request>| async move {
        let new: NewAccount = req.json().await?;
        Ok::<_, RouteError>(
            Response::ok(json!({ "name": new.name })).with_status(StatusCode::Created),
        )
    });
    routes.delete("/accounts/7", |_req: Arc<Request>| async {
        Ok(Response::new(StatusCode::NoContent))
    });
    routes.patch("/accounts/7", |_req: Arc<Request>| async {
        Err(RouteError::from(
            EndpointError::new("invalid_name", "Name must not be empty")
                .field("name")
                .status(StatusCode::UnprocessableEntity),
        ))
    });
    routes.get("/broken", |_req: Arc<Request>| async {
        Err(RouteError::internal("boom"))
    });
    routes.get("/slow", |_req: Arc<Request>| async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(Response::new(StatusCode::NoContent))
    });
    routes
}

async fn start(config: ServerConfig) -> (RouterServer<Routes>, SocketAddr) {
    let server = RouterServer::new(routes(), config);
    let bound = server.listen(0).await.unwrap();
    (server, SocketAddr::from(([127, 0, 0, 1], bound.port())))
}

struct Reply {
    status: u16,
    headers: Vec<(String, String)>,
    body: String,
}

impl Reply {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn json(&self) -> Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

/// Reads one response off `stream`, honouring `Content-Length`.
async fn read_reply(stream: &mut TcpStream) -> Reply {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    let head_end = loop {
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before response head");
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = std::str::from_utf8(&buf[..head_end]).unwrap().to_owned();
    let mut lines = head.split("\r\n");
    let status = lines.next().unwrap().split(' ').nth(1).unwrap().parse().unwrap();
    let headers: Vec<(String, String)> = lines
        .filter(|l| !l.is_empty())
        .map(|l| {
            let (name, value) = l.split_once(':').unwrap();
            (name.trim().to_owned(), value.trim().to_owned())
        })
        .collect();

    let length: usize = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .map(|(_, v)| v.parse().unwrap())
        .unwrap();
    while buf.len() < head_end + length {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before response body");
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8(buf[head_end..head_end + length].to_vec()).unwrap();

    Reply {
        status,
        headers,
        body,
    }
}

async fn roundtrip(addr: SocketAddr, raw: &str) -> Reply {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    read_reply(&mut stream).await
}

#[tokio::test]
async fn version_from_url_segment() {
    let (server, addr) = start(ServerConfig::default()).await;

    let reply = roundtrip(
        addr,
        "GET /v2/account HTTP/1.1\r\nHost: api.local\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("content-type"), Some("application/json"));
    assert_eq!(reply.header("cache-control"), Some("no-cache"));
    assert_eq!(
        reply.json(),
        json!({ "id": 7, "profile": { "displayName": "Ada" } })
    );

    server.close().await.unwrap();
}

#[tokio::test]
async fn version_from_header() {
    let (server, addr) = start(ServerConfig::default()).await;

    let reply = roundtrip(
        addr,
        "GET /accounts HTTP/1.1\r\nHost: api.local\r\nX-Version: 1\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 200);
    assert_eq!(
        reply.json(),
        json!([{ "id": 1, "name": "Ada" }, { "id": 2, "name": "Grace" }])
    );

    server.close().await.unwrap();
}

#[tokio::test]
async fn default_version_applies_when_none_given() {
    let (server, addr) = start(ServerConfig::default().default_version(1)).await;

    let reply = roundtrip(
        addr,
        "GET /account HTTP/1.1\r\nHost: api.local\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(reply.json(), json!({ "id": 7, "name": "Ada" }));

    server.close().await.unwrap();
}

#[tokio::test]
async fn missing_version_is_a_client_error() {
    let (server, addr) = start(ServerConfig::default()).await;

    let reply = roundtrip(
        addr,
        "GET /account HTTP/1.1\r\nHost: api.local\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.json()["errors"][0]["code"], "missing_version");

    server.close().await.unwrap();
}

#[tokio::test]
async fn post_body_is_read_by_endpoint() {
    let (server, addr) = start(ServerConfig::default()).await;

    let body = r#"{"name":"Linus"}"#;
    let raw = format!(
        "POST /v1/accounts HTTP/1.1\r\nHost: api.local\r\nContent-Type: application/json\r\n\
         Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    );
    let reply = roundtrip(addr, &raw).await;
    assert_eq!(reply.status, 201);
    assert_eq!(reply.json(), json!({ "name": "Linus" }));

    server.close().await.unwrap();
}

#[tokio::test]
async fn invalid_json_body_is_rejected() {
    let (server, addr) = start(ServerConfig::default()).await;

    let raw = "POST /v1/accounts HTTP/1.1\r\nHost: api.local\r\nContent-Length: 5\r\n\
               Connection: close\r\n\r\n{nope";
    let reply = roundtrip(addr, raw).await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.json()["errors"][0]["code"], "invalid_body");

    server.close().await.unwrap();
}

#[tokio::test]
async fn empty_response_has_no_content_type() {
    let (server, addr) = start(ServerConfig::default()).await;

    let reply = roundtrip(
        addr,
        "DELETE /accounts/7 HTTP/1.1\r\nHost: api.local\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 204);
    assert_eq!(reply.body, "");
    assert_eq!(reply.header("content-type"), None);

    server.close().await.unwrap();
}

#[tokio::test]
async fn unmatched_request_is_404() {
    let (server, addr) = start(ServerConfig::default()).await;

    let reply = roundtrip(
        addr,
        "GET /v1/nowhere HTTP/1.1\r\nHost: api.local\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 404);
    assert_eq!(reply.body, "Endpoint not found.");

    server.close().await.unwrap();
}

#[tokio::test]
async fn client_error_envelope() {
    let (server, addr) = start(ServerConfig::default()).await;

    let reply = roundtrip(
        addr,
        "PATCH /v1/accounts/7 HTTP/1.1\r\nHost: api.local\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 422);
    let body = reply.json();
    let err = &body["errors"][0];
    assert_eq!(err["code"], "invalid_name");
    assert_eq!(err["field"], "name");
    assert!(err["id"].as_str().is_some_and(|id| !id.is_empty()));

    server.close().await.unwrap();
}

#[tokio::test]
async fn internal_error_is_500() {
    let (server, addr) = start(ServerConfig::default()).await;

    let reply = roundtrip(
        addr,
        "GET /v1/broken HTTP/1.1\r\nHost: api.local\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 500);
    assert_eq!(
        reply.json(),
        json!({ "errors": [{ "code": "internal_error", "message": "boom" }] })
    );

    server.close().await.unwrap();
}

#[tokio::test]
async fn internal_error_redacted() {
    let (server, addr) = start(ServerConfig::default().expose_internal_errors(false)).await;

    let reply = roundtrip(
        addr,
        "GET /v1/broken HTTP/1.1\r\nHost: api.local\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 500);
    assert!(!reply.body.contains("boom"));

    server.close().await.unwrap();
}

#[tokio::test]
async fn slow_endpoint_times_out() {
    let config = ServerConfig::default().request_timeout(Some(Duration::from_millis(20)));
    let (server, addr) = start(config).await;

    let reply = roundtrip(
        addr,
        "GET /v1/slow HTTP/1.1\r\nHost: api.local\r\nConnection: close\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 503);
    assert_eq!(reply.json()["errors"][0]["code"], "request_timeout");

    server.close().await.unwrap();
}

#[tokio::test]
async fn malformed_request_is_rejected() {
    let (server, addr) = start(ServerConfig::default()).await;

    let reply = roundtrip(addr, "NOT A REQUEST\r\n\r\n").await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.body, "");
    assert_eq!(reply.header("connection"), Some("close"));

    server.close().await.unwrap();
}

#[tokio::test]
async fn unsupported_method_is_rejected() {
    let (server, addr) = start(ServerConfig::default()).await;

    let reply = roundtrip(
        addr,
        "PUT /v1/account HTTP/1.1\r\nHost: api.local\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 400);
    assert_eq!(reply.header("connection"), Some("close"));

    server.close().await.unwrap();
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let config = ServerConfig {
        max_body_bytes: 8,
        ..ServerConfig::default()
    };
    let (server, addr) = start(config).await;

    let reply = roundtrip(
        addr,
        "POST /v1/accounts HTTP/1.1\r\nHost: api.local\r\nContent-Length: 64\r\n\r\n",
    )
    .await;
    assert_eq!(reply.status, 413);

    server.close().await.unwrap();
}

#[tokio::test]
async fn keep_alive_serves_several_requests() {
    let (server, addr) = start(ServerConfig::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"GET /v1/account HTTP/1.1\r\nHost: api.local\r\n\r\n")
        .await
        .unwrap();
    let first = read_reply(&mut stream).await;
    assert_eq!(first.status, 200);
    assert_eq!(first.header("connection"), Some("keep-alive"));

    stream
        .write_all(b"GET /v2/account HTTP/1.1\r\nHost: api.local\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let second = read_reply(&mut stream).await;
    assert_eq!(second.status, 200);
    assert_eq!(second.header("connection"), Some("close"));
    assert_eq!(second.json()["profile"]["displayName"], "Ada");

    let mut rest = Vec::new();
    assert_eq!(stream.read_to_end(&mut rest).await.unwrap(), 0);

    server.close().await.unwrap();
}

#[tokio::test]
async fn close_waits_for_in_flight_request() {
    let (server, addr) = start(ServerConfig::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /v1/slow HTTP/1.1\r\nHost: api.local\r\n\r\n")
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    server.close().await.unwrap();

    let reply = read_reply(&mut stream).await;
    assert_eq!(reply.status, 204);
    assert_eq!(reply.header("connection"), Some("close"));
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn close_drops_connection_with_partial_head() {
    let (server, addr) = start(ServerConfig::default()).await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(b"GET /v1/account HTTP/1.1\r\nHost: a").await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;
    tokio::time::timeout(Duration::from_secs(3), server.close())
        .await
        .expect("close should not wait on an unfinished request head")
        .unwrap();

    let mut rest = Vec::new();
    assert_eq!(stream.read_to_end(&mut rest).await.unwrap(), 0);
}
