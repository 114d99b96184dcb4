//! Wire-ready responses.
//!
//! [`EncodedResponse`] is what the server writes: a status, headers, and a
//! text body. It is produced either by encoding a typed
//! [`Response`](crate::Response) at the request's version, or directly by the
//! server funnel for error and not-found replies.

use bytes::{BufMut, BytesMut};

use super::{Headers, Request, StatusCode};
use crate::encoding::Response;
use crate::error::EndpointError;

/// A response whose body is already serialized.
///
/// # Examples
///
/// ```
/// use verso::http::{EncodedResponse, StatusCode};
///
/// let response = EncodedResponse::new(StatusCode::NotFound).body("Endpoint not found.");
/// let bytes = response.into_bytes();
/// let text = std::str::from_utf8(&bytes).unwrap();
/// assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
/// assert!(text.ends_with("\r\n\r\nEndpoint not found."));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedResponse {
    status: StatusCode,
    headers: Headers,
    body: String,
    keep_alive: bool,
}

impl EncodedResponse {
    /// Creates a response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: String::new(),
            keep_alive: true,
        }
    }

    /// Encodes a typed response at `version`.
    ///
    /// Status and headers are copied. A present body is serialized (an object,
    /// or an array for list bodies) and gets `Content-Type: application/json`
    /// unless the handler set a content type. An absent body stays empty and
    /// forces no content type.
    pub fn encode(response: Response, version: u32) -> Self {
        let (status, mut headers, payload) = response.into_parts();
        let body = match payload {
            Some(payload) => {
                headers.insert_default("Content-Type", "application/json");
                payload.encode(version).to_string()
            }
            None => String::new(),
        };
        Self {
            status,
            headers,
            body,
            keep_alive: true,
        }
    }

    /// Encodes a typed response at the version resolved on `request`.
    ///
    /// The version is only resolved when there is a body to encode.
    ///
    /// # Errors
    ///
    /// The `missing_version` / `invalid_header` error of
    /// [`Request::get_version`].
    pub fn for_request(response: Response, request: &Request) -> Result<Self, EndpointError> {
        let version = match response.has_body() {
            true => request.get_version()?,
            false => request.version().unwrap_or_default(),
        };
        Ok(Self::encode(response, version))
    }

    /// Appends a response header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the response body.
    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Controls whether `Connection: keep-alive` or `Connection: close` is written.
    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body_text(&self) -> &str {
        &self.body
    }

    pub fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }

    /// Serializes the response using HTTP/1.1 wire format.
    ///
    /// Adds `Content-Length` and `Connection`; any handler-supplied values of
    /// those two headers are replaced.
    pub fn into_bytes(mut self) -> BytesMut {
        let content_length = self.body.len();

        let connection = if self.keep_alive {
            "keep-alive"
        } else {
            "close"
        };
        self.headers.remove("content-length");
        self.headers.set("Connection", connection);

        let estimated_size = 128 + self.headers.len() * 64 + content_length;
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );

        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        // Content-Length is always the last header before the blank line
        buf.put(format!("Content-Length: {content_length}\r\n").as_bytes());
        buf.put(&b"\r\n"[..]);
        buf.put(self.body.as_bytes());

        buf
    }
}
