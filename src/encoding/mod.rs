//! Typed responses and version-scoped encoding.
//!
//! Endpoints return a [`Response`] whose body is one or more [`Encodeable`]
//! values. The body is turned into JSON only at the edge, by
//! [`EncodedResponse::for_request`](crate::http::EncodedResponse::for_request),
//! using the version resolved on the originating request.

use serde_json::Value;

use crate::http::{Headers, StatusCode};

/// A domain value with a version-dependent JSON representation.
///
/// # Examples
///
/// ```
/// use serde_json::{Value, json};
/// use verso::Encodeable;
///
/// struct Member {
///     first: String,
///     last: String,
/// }
///
/// impl Encodeable for Member {
///     fn encode(&self, version: u32) -> Value {
///         if version < 2 {
///             json!({ "name": format!("{} {}", self.first, self.last) })
///         } else {
///             json!({ "firstName": self.first, "lastName": self.last })
///         }
///     }
/// }
///
/// let m = Member { first: "Ada".into(), last: "Lovelace".into() };
/// assert_eq!(m.encode(1), json!({ "name": "Ada Lovelace" }));
/// ```
pub trait Encodeable: Send + Sync {
    /// Returns the JSON shape of `self` for protocol `version`.
    fn encode(&self, version: u32) -> Value;
}

impl Encodeable for Value {
    fn encode(&self, _version: u32) -> Value {
        self.clone()
    }
}

impl<T: Encodeable + ?Sized> Encodeable for Box<T> {
    fn encode(&self, version: u32) -> Value {
        (**self).encode(version)
    }
}

/// The body of a typed [`Response`].
pub enum Payload {
    One(Box<dyn Encodeable>),
    Many(Vec<Box<dyn Encodeable>>),
}

impl Payload {
    /// Encodes the payload at `version`: an object for [`Payload::One`], an
    /// array of independently encoded elements for [`Payload::Many`].
    pub fn encode(&self, version: u32) -> Value {
        match self {
            Self::One(item) => item.encode(version),
            Self::Many(items) => Value::Array(items.iter().map(|i| i.encode(version)).collect()),
        }
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::One(_) => f.write_str("Payload::One"),
            Self::Many(items) => write!(f, "Payload::Many({})", items.len()),
        }
    }
}

/// What a router produces for a matched request.
///
/// ```
/// use serde_json::json;
/// use verso::{Response, StatusCode};
///
/// let response = Response::ok(json!({ "id": 1 })).header("X-Trace", "abc");
/// assert_eq!(response.status(), StatusCode::Ok);
/// assert!(response.has_body());
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Option<Payload>,
}

impl Response {
    /// A response with `status` and no body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: None,
        }
    }

    /// `200 OK` with a single object.
    pub fn ok(body: impl Encodeable + 'static) -> Self {
        Self::new(StatusCode::Ok).body(body)
    }

    /// `200 OK` with an array of objects.
    pub fn list<T: Encodeable + 'static>(items: impl IntoIterator<Item = T>) -> Self {
        Self::new(StatusCode::Ok).body_list(items)
    }

    /// Sets a single-object body.
    #[must_use]
    pub fn body(mut self, body: impl Encodeable + 'static) -> Self {
        self.body = Some(Payload::One(Box::new(body)));
        self
    }

    /// Sets an array body.
    #[must_use]
    pub fn body_list<T: Encodeable + 'static>(mut self, items: impl IntoIterator<Item = T>) -> Self {
        let items = items
            .into_iter()
            .map(|item| Box::new(item) as Box<dyn Encodeable>)
            .collect();
        self.body = Some(Payload::Many(items));
        self
    }

    /// Appends a response header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
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

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Splits the response into status, headers, and body.
    pub fn into_parts(self) -> (StatusCode, Headers, Option<Payload>) {
        (self.status, self.headers, self.body)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct Tag(&'static str);

    impl Encodeable for Tag {
        fn encode(&self, version: u32) -> Value {
            json!({ "tag": self.0, "v": version })
        }
    }

    #[test]
    fn single_payload_encodes_object() {
        let payload = Payload::One(Box::new(Tag("a")));
        assert_eq!(payload.encode(3), json!({ "tag": "a", "v": 3 }));
    }

    #[test]
    fn many_payload_encodes_each_element() {
        let response = Response::list([Tag("a"), Tag("b")]);
        let (_, _, body) = response.into_parts();
        assert_eq!(
            body.unwrap().encode(3),
            json!([{ "tag": "a", "v": 3 }, { "tag": "b", "v": 3 }])
        );
    }

    #[test]
    fn empty_list_is_still_a_body() {
        let response = Response::list(Vec::<Tag>::new());
        assert!(response.has_body());
        let (_, _, body) = response.into_parts();
        assert_eq!(body.unwrap().encode(1), json!([]));
    }

    #[test]
    fn raw_json_ignores_version() {
        let value = json!({ "fixed": true });
        assert_eq!(value.encode(1), value.encode(9));
    }
}
