//! Versioned request model.
//!
//! [`Request::parse`] reads a request head off the wire with [`httparse`];
//! [`Request::from_transport`] turns that head into the [`Request`] handed to
//! the router, detecting the protocol version on the way.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::OnceLock;

use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::info;

use super::{Body, BodyError, Headers, Method, StatusCode};
use crate::encoding::Encodeable;
use crate::error::{EndpointError, RouteError};

/// Errors produced while reading a request head off the wire.
///
/// Any of these means the input cannot be trusted; the connection is answered
/// without a body and closed.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete — more data needed")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("invalid Content-Length header")]
    InvalidContentLength,
}

/// The request line and headers of one HTTP/1.x request.
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    /// Request target as sent: path plus optional `?query`.
    pub target: String,
    /// HTTP minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    pub minor_version: u8,
    pub headers: Headers,
}

impl RequestHead {
    /// Declared body length; `0` when the header is absent.
    ///
    /// # Errors
    ///
    /// [`RequestError::InvalidContentLength`] when the header is repeated or
    /// not a non-negative integer.
    pub fn content_length(&self) -> Result<usize, RequestError> {
        if !self.headers.contains("content-length") {
            return Ok(0);
        }
        self.headers
            .get_single("content-length")
            .and_then(|v| v.trim().parse().ok())
            .ok_or(RequestError::InvalidContentLength)
    }

    /// Returns `true` if the connection should be kept alive after this request.
    ///
    /// HTTP/1.1 defaults to keep-alive. HTTP/1.0 defaults to close unless
    /// `Connection: keep-alive` is explicitly set.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.minor_version == 1,
        }
    }
}

/// One inbound API call.
///
/// Read-only after construction apart from two compute-once caches: the
/// resolved protocol version and the materialized body.
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    host: String,
    headers: Headers,
    query: HashMap<String, String>,
    remote_addr: Option<IpAddr>,
    version: OnceLock<u32>,
    default_version: Option<u32>,
    body: Body,
}

impl Request {
    /// Maximum number of headers we support per request.
    const MAX_HEADERS: usize = 64;

    /// Parse a request head from a byte slice.
    ///
    /// Returns the head and the offset at which the body begins in `buf`.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`] — more data is needed.
    /// - [`RequestError::Parse`] — the data is malformed.
    /// - [`RequestError::MissingField`] — method, path or version is absent.
    /// - [`RequestError::UnsupportedMethod`] — not one of the API methods.
    pub fn parse(buf: &[u8]) -> Result<(RequestHead, usize), RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw_req = httparse::Request::new(&mut headers);

        let body_offset = match raw_req.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let method: Method = raw_req
            .method
            .ok_or(RequestError::MissingField { field: "method" })?
            .parse()?;

        let target = raw_req
            .path
            .ok_or(RequestError::MissingField { field: "path" })?
            .to_owned();

        let minor_version = raw_req
            .version
            .ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw_req.headers.len());
        for header in raw_req.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        Ok((
            RequestHead {
                method,
                target,
                minor_version,
                headers: header_map,
            },
            body_offset,
        ))
    }

    /// Builds the request the router sees from a parsed head.
    ///
    /// Strips the port from `Host`, moves a leading `/v<digits>` path segment
    /// into the version, and resolves the caller address. `X-Real-IP` is only
    /// trusted when the direct peer is a loopback or unspecified address.
    pub fn from_transport(
        head: RequestHead,
        peer: SocketAddr,
        body: Body,
        default_version: Option<u32>,
    ) -> Self {
        let (raw_path, query) = split_target(&head.target);
        let host = strip_port(head.headers.get("host").unwrap_or_default()).to_owned();

        let mut remote_addr = peer.ip();
        if remote_addr.is_loopback() || remote_addr.is_unspecified() {
            if let Some(forwarded) = head
                .headers
                .get_single("x-real-ip")
                .and_then(|ip| ip.trim().parse().ok())
            {
                remote_addr = forwarded;
            }
        }

        info!(peer = %remote_addr, method = %head.method, path = raw_path, "request");

        let version = OnceLock::new();
        let path = match split_version_segment(raw_path) {
            Some((v, rest)) => {
                let _ = version.set(v);
                if rest.is_empty() { "/" } else { rest }
            }
            None => raw_path,
        };

        Self {
            method: head.method,
            path: path.to_owned(),
            host,
            headers: head.headers,
            query: query.map(parse_query_string).unwrap_or_default(),
            remote_addr: Some(remote_addr),
            version,
            default_version,
            body,
        }
    }

    /// Creates a request for `url` (path plus optional query) with an empty
    /// body and no headers.
    pub fn new(method: Method, url: &str) -> Self {
        let (path, query) = split_target(url);
        Self {
            method,
            path: path.to_owned(),
            host: String::new(),
            headers: Headers::new(),
            query: query.map(parse_query_string).unwrap_or_default(),
            remote_addr: None,
            version: OnceLock::new(),
            default_version: None,
            body: Body::empty(),
        }
    }

    /// Builds a JSON request with an already resolved body.
    ///
    /// A present `body` is encoded at `default_version`; without a default it
    /// is encoded at version 0. An absent body becomes the empty string.
    pub fn build_json(
        method: Method,
        url: &str,
        host: Option<&str>,
        body: Option<&dyn Encodeable>,
        default_version: Option<u32>,
    ) -> Self {
        let text = body
            .map(|b| b.encode(default_version.unwrap_or_default()).to_string())
            .unwrap_or_default();
        Self::new(method, url)
            .with_host(host.unwrap_or_default())
            .with_default_version(default_version)
            .with_body(Body::ready(text))
    }

    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Fixes the protocol version programmatically. Takes precedence over
    /// headers and defaults.
    #[must_use]
    pub fn with_version(self, version: u32) -> Self {
        let _ = self.version.set(version);
        self
    }

    /// Sets the version used when neither URL nor header carries one.
    #[must_use]
    pub fn with_default_version(mut self, version: Option<u32>) -> Self {
        self.default_version = version;
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Request path without the query string and without a version segment.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Host name from the `Host` header, port removed.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    /// Returns a decoded query parameter value by key.
    pub fn query_param(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Caller address; `None` for requests not built from a connection.
    pub fn remote_addr(&self) -> Option<IpAddr> {
        self.remote_addr
    }

    /// The version if it has been resolved already.
    pub fn version(&self) -> Option<u32> {
        self.version.get().copied()
    }

    /// Resolves the protocol version the client expects.
    ///
    /// Order: programmatic or URL version, a single `X-Version` header, the
    /// default version. The result is cached.
    ///
    /// # Errors
    ///
    /// - `invalid_header` (400) — `X-Version` is not an unsigned integer.
    /// - `missing_version` (400) — no source provides a version.
    pub fn get_version(&self) -> Result<u32, EndpointError> {
        if let Some(version) = self.version.get() {
            return Ok(*version);
        }

        let header = self
            .headers
            .get_single("x-version")
            .map(str::trim)
            .filter(|v| !v.is_empty());

        let version = match header {
            Some(raw) => raw.parse::<u32>().map_err(|_| {
                EndpointError::new(
                    "invalid_header",
                    "The X-Version header should contain a valid integer",
                )
                .status(StatusCode::BadRequest)
            })?,
            None => self.default_version.ok_or_else(|| {
                EndpointError::new(
                    "missing_version",
                    "Providing a version is required. Use the URL or the X-Version header.",
                )
                .status(StatusCode::BadRequest)
            })?,
        };

        Ok(*self.version.get_or_init(|| version))
    }

    /// The request body as text, read from the transport on first use.
    ///
    /// # Errors
    ///
    /// Returns the (cached) [`BodyError`] if the stream failed.
    pub async fn body(&self) -> Result<&str, BodyError> {
        self.body.text().await
    }

    /// Reads the body and deserializes it as JSON.
    ///
    /// # Errors
    ///
    /// - An internal [`RouteError`] if the body stream failed.
    /// - An `invalid_body` client error (400) if the body is not valid JSON
    ///   for `T`.
    pub async fn json<T: DeserializeOwned>(&self) -> Result<T, RouteError> {
        let text = self.body().await?;
        serde_json::from_str(text).map_err(|e| {
            RouteError::from(
                EndpointError::new("invalid_body", format!("Invalid JSON body: {e}"))
                    .human("The request body could not be read.")
                    .status(StatusCode::BadRequest),
            )
        })
    }
}

/// Splits a request target into path and query. Absolute-form targets
/// (`http://host/path`) are reduced to their path.
fn split_target(target: &str) -> (&str, Option<&str>) {
    let target = strip_origin(target);
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    };
    (if path.is_empty() { "/" } else { path }, query)
}

fn strip_origin(target: &str) -> &str {
    let Some((scheme, rest)) = target.split_once("://") else {
        return target;
    };
    let is_scheme = scheme.starts_with(|c: char| c.is_ascii_alphabetic())
        && scheme
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'));
    if !is_scheme {
        return target;
    }
    match rest.find(['/', '?']) {
        Some(start) => &rest[start..],
        None => "",
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // IPv6 literal: keep the brackets, drop `:port` after them.
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    host.split(':').next().unwrap_or_default()
}

/// Splits `/v<digits>/rest` into the version and `/rest`.
fn split_version_segment(path: &str) -> Option<(u32, &str)> {
    let rest = path.strip_prefix('/')?;
    let end = rest.find('/').unwrap_or(rest.len());
    let digits = rest[..end].strip_prefix('v')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let version = digits.parse().ok()?;
    Some((version, &rest[end..]))
}

fn parse_query_string(query: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}
