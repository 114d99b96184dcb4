//! A single client-attributable failure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http::StatusCode;

/// Status used when an error carries no explicit hint.
pub const DEFAULT_CLIENT_STATUS: StatusCode = StatusCode::BadRequest;

static PROCESS_IDS: ErrorIds = ErrorIds::new();

/// Generator for error ids of the form `<unix millis>-<counter>`.
///
/// The counter is atomic, so one generator may be shared by any number of
/// tasks and threads.
#[derive(Debug, Default)]
pub struct ErrorIds {
    counter: AtomicU64,
}

impl ErrorIds {
    /// Creates a generator whose counter starts at zero.
    pub const fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// The generator used by [`EndpointError::new`].
    pub fn process() -> &'static ErrorIds {
        &PROCESS_IDS
    }

    /// Returns the next id.
    pub fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        format!("{millis}-{n}")
    }
}

/// An error caused by the client that is reported back to it verbatim.
///
/// The `status` hint decides the HTTP status when the error reaches the
/// server funnel; it is a transport concern and never serialized.
///
/// # Examples
///
/// ```
/// use verso::error::EndpointError;
///
/// let mut err = EndpointError::new("invalid_field", "Must be five digits").field("zip");
/// err.add_namespace("address");
///
/// assert_eq!(err.field_path(), Some("address.zip"));
/// assert!(err.does_match_field("address"));
/// assert_eq!(err.get_human(), "Must be five digits");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error(
    "{code}: {message}{} ({id})",
    .field.as_ref().map(|f| format!(" at {f}")).unwrap_or_default()
)]
pub struct EndpointError {
    id: String,
    code: String,
    message: String,
    human: Option<String>,
    field: Option<String>,
    #[serde(skip)]
    status: Option<StatusCode>,
}

impl EndpointError {
    /// Creates an error with a freshly generated id.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_ids(ErrorIds::process(), code, message)
    }

    /// Creates an error numbered by `ids` instead of the process generator.
    pub fn with_ids(ids: &ErrorIds, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: ids.next_id(),
            code: code.into(),
            message: message.into(),
            human: None,
            field: None,
            status: None,
        }
    }

    /// Sets the user-facing description.
    #[must_use]
    pub fn human(mut self, human: impl Into<String>) -> Self {
        self.human = Some(human.into());
        self
    }

    /// Sets the dotted path of the input field that caused the error.
    #[must_use]
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Sets the HTTP status hint.
    #[must_use]
    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn field_path(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// The explicit status hint, if any.
    pub fn status_hint(&self) -> Option<StatusCode> {
        self.status
    }

    /// The status this error is reported with: the hint, or 400.
    pub fn status_code(&self) -> StatusCode {
        self.status.unwrap_or(DEFAULT_CLIENT_STATUS)
    }

    /// The user-facing text, falling back to the message.
    pub fn get_human(&self) -> &str {
        self.human.as_deref().unwrap_or(&self.message)
    }

    /// Prefixes the field path with `namespace`, e.g. `zip` → `address.zip`.
    ///
    /// An error without a field gets `namespace` as its field.
    pub fn add_namespace(&mut self, namespace: &str) {
        self.field = Some(match self.field.take() {
            Some(field) => format!("{namespace}.{field}"),
            None => namespace.to_owned(),
        });
    }

    /// Returns `true` if the field path is `field` or lies below it.
    pub fn does_match_field(&self, field: &str) -> bool {
        let Some(own) = self.field.as_deref() else {
            return false;
        };
        match own.strip_prefix(field) {
            Some(rest) => rest.is_empty() || rest.starts_with('.'),
            None => false,
        }
    }

    /// Returns `true` if [`does_match_field`](Self::does_match_field) holds for
    /// any of `fields`.
    pub fn does_match_fields<S: AsRef<str>>(&self, fields: &[S]) -> bool {
        fields.iter().any(|f| self.does_match_field(f.as_ref()))
    }

    /// Reconstructs an error from its wire JSON.
    ///
    /// `id`, `code`, and `message` are required; `human` and `field` may be
    /// missing or `null`. The status hint is never part of the wire shape.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] for malformed input or missing fields.
    pub fn decode(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }
}
