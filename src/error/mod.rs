//! Error taxonomy.
//!
//! Client-attributable failures are [`EndpointError`] (one) and
//! [`EndpointErrors`] (several). A router fails with a [`RouteError`], which
//! also carries unclassified internal failures; the server funnel turns each
//! variant into the same `{"errors": [...]}` wire shape.

mod aggregate;
mod endpoint;

pub use aggregate::EndpointErrors;
pub use endpoint::{DEFAULT_CLIENT_STATUS, EndpointError, ErrorIds};

use thiserror::Error;

use crate::http::BodyError;
use crate::http::StatusCode;

/// Boxed error type for failures the framework does not classify.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The ways a router can fail.
#[derive(Debug, Error)]
pub enum RouteError {
    /// One client-attributable error.
    #[error(transparent)]
    Client(#[from] EndpointError),

    /// Several client-attributable errors.
    #[error(transparent)]
    Clients(#[from] EndpointErrors),

    /// Anything else. Reported as a generic 500.
    #[error("{0}")]
    Internal(#[source] BoxError),
}

impl RouteError {
    /// Wraps an unclassified failure.
    ///
    /// ```
    /// use verso::error::RouteError;
    ///
    /// let err = RouteError::internal("boom");
    /// assert_eq!(err.to_string(), "boom");
    /// ```
    pub fn internal(error: impl Into<BoxError>) -> Self {
        Self::Internal(error.into())
    }

    /// Returns `true` for the client-attributable variants.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Internal(_))
    }

    /// The HTTP status this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Client(e) => e.status_code(),
            Self::Clients(e) => e.status_code(),
            Self::Internal(_) => StatusCode::InternalServerError,
        }
    }
}

impl From<BodyError> for RouteError {
    fn from(error: BodyError) -> Self {
        Self::internal(error)
    }
}
