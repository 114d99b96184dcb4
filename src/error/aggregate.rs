//! All client-facing failures of one request.

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Serialize};

use super::endpoint::{DEFAULT_CLIENT_STATUS, EndpointError};
use crate::http::StatusCode;

/// An ordered, non-empty collection of [`EndpointError`]s.
///
/// Serializes as `{"errors": [...]}`, the body of every failed API call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointErrors {
    errors: Vec<EndpointError>,
}

#[derive(Deserialize)]
struct WireErrors {
    errors: Vec<EndpointError>,
}

impl EndpointErrors {
    /// Wraps an explicit, ordered list of errors.
    ///
    /// # Panics
    ///
    /// Panics if `errors` is empty. An aggregate without members has no
    /// status and no meaning on the wire.
    pub fn new(errors: Vec<EndpointError>) -> Self {
        assert!(
            !errors.is_empty(),
            "EndpointErrors requires at least one error"
        );
        Self { errors }
    }

    /// Appends an error.
    pub fn push(&mut self, error: EndpointError) {
        self.errors.push(error);
    }

    /// Appends every member of `other`, preserving order.
    pub fn extend(&mut self, other: EndpointErrors) {
        self.errors.extend(other.errors);
    }

    /// Prefixes the field path of every member with `namespace`.
    pub fn add_namespace(&mut self, namespace: &str) {
        for error in &mut self.errors {
            error.add_namespace(namespace);
        }
    }

    /// Members whose field is `field` or lies below it.
    pub fn errors_for_field<'a>(
        &'a self,
        field: &'a str,
    ) -> impl Iterator<Item = &'a EndpointError> + 'a {
        self.errors.iter().filter(move |e| e.does_match_field(field))
    }

    /// The status the aggregate is reported with: the first member hint that
    /// differs from 400, or 400.
    pub fn status_code(&self) -> StatusCode {
        self.errors
            .iter()
            .filter_map(EndpointError::status_hint)
            .find(|status| *status != DEFAULT_CLIENT_STATUS)
            .unwrap_or(DEFAULT_CLIENT_STATUS)
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndpointError> {
        self.errors.iter()
    }

    pub fn into_vec(self) -> Vec<EndpointError> {
        self.errors
    }

    /// Parses an `{"errors": [...]}` response body of another service.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] for malformed input, malformed
    /// members, or an empty `errors` array.
    pub fn decode(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let wire: WireErrors = serde_json::from_value(value)?;
        if wire.errors.is_empty() {
            return Err(serde_json::Error::custom("`errors` must not be empty"));
        }
        Ok(Self {
            errors: wire.errors,
        })
    }
}

impl From<EndpointError> for EndpointErrors {
    fn from(error: EndpointError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl IntoIterator for EndpointErrors {
    type Item = EndpointError;
    type IntoIter = std::vec::IntoIter<EndpointError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl fmt::Display for EndpointErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for EndpointErrors {}
