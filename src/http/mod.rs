//! HTTP protocol primitives used by the API core.
//!
//! [`Method`], [`StatusCode`], [`Headers`], the versioned [`Request`] and its
//! deferred [`Body`], and the wire-ready [`EncodedResponse`].

use std::fmt;

pub mod body;
pub mod headers;
pub mod request;
pub mod response;

pub use body::{Body, BodyError};
pub use headers::Headers;
pub use request::{Request, RequestError, RequestHead};
pub use response::EncodedResponse;

macro_rules! status_codes {
    ($($(#[$group:meta])* $name:ident = $code:literal, $reason:literal;)+) => {
        /// An HTTP response status code.
        ///
        /// Codes without a named variant are carried by [`StatusCode::Other`];
        /// build statuses from numbers with [`StatusCode::from_u16`] so named
        /// codes always come out as their variant.
        ///
        /// # Examples
        ///
        /// ```
        /// use verso::http::StatusCode;
        ///
        /// let status = StatusCode::BadRequest;
        /// assert_eq!(status.as_u16(), 400);
        /// assert_eq!(status.canonical_reason(), "Bad Request");
        /// assert!(status.is_client_error());
        ///
        /// assert_eq!(StatusCode::from_u16(404), Some(StatusCode::NotFound));
        /// assert_eq!(StatusCode::from_u16(418), Some(StatusCode::Other(418)));
        /// assert_eq!(StatusCode::from_u16(42), None);
        /// ```
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode {
            $($(#[$group])* $name,)+
            /// Any other code in `100..=599`.
            Other(u16),
        }

        impl StatusCode {
            /// Returns the numeric status code as a `u16`.
            pub fn as_u16(self) -> u16 {
                match self {
                    $(Self::$name => $code,)+
                    Self::Other(code) => code,
                }
            }

            /// Maps a number to its status. `None` outside `100..=599`.
            pub fn from_u16(code: u16) -> Option<Self> {
                match code {
                    $($code => Some(Self::$name),)+
                    100..=599 => Some(Self::Other(code)),
                    _ => None,
                }
            }

            /// Returns the canonical reason phrase for this status code.
            ///
            /// Codes without a variant get the name of their class.
            pub fn canonical_reason(self) -> &'static str {
                match self {
                    $(Self::$name => $reason,)+
                    Self::Other(code) => match code / 100 {
                        1 => "Informational",
                        2 => "Success",
                        3 => "Redirection",
                        4 => "Client Error",
                        _ => "Server Error",
                    },
                }
            }
        }
    };
}

status_codes! {
    /// 2xx Success
    Ok = 200, "OK";
    Created = 201, "Created";
    Accepted = 202, "Accepted";
    NoContent = 204, "No Content";

    /// 3xx Redirection
    MovedPermanently = 301, "Moved Permanently";
    Found = 302, "Found";
    NotModified = 304, "Not Modified";

    /// 4xx Client Error
    BadRequest = 400, "Bad Request";
    Unauthorized = 401, "Unauthorized";
    PaymentRequired = 402, "Payment Required";
    Forbidden = 403, "Forbidden";
    NotFound = 404, "Not Found";
    MethodNotAllowed = 405, "Method Not Allowed";
    Conflict = 409, "Conflict";
    Gone = 410, "Gone";
    PayloadTooLarge = 413, "Payload Too Large";
    UnsupportedMediaType = 415, "Unsupported Media Type";
    UnprocessableEntity = 422, "Unprocessable Entity";
    TooManyRequests = 429, "Too Many Requests";

    /// 5xx Server Error
    InternalServerError = 500, "Internal Server Error";
    NotImplemented = 501, "Not Implemented";
    BadGateway = 502, "Bad Gateway";
    ServiceUnavailable = 503, "Service Unavailable";
    GatewayTimeout = 504, "Gateway Timeout";
}

impl StatusCode {
    /// Returns `true` for 4xx codes.
    pub fn is_client_error(self) -> bool {
        (400..500).contains(&self.as_u16())
    }

    /// Returns `true` for 5xx codes.
    pub fn is_server_error(self) -> bool {
        self.as_u16() >= 500
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.canonical_reason())
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> u16 {
        code.as_u16()
    }
}

/// The request methods an API endpoint can be called with.
///
/// The set is closed: anything else on the request line is treated as a
/// malformed request and never reaches the router.
///
/// # Examples
///
/// ```
/// use verso::http::Method;
///
/// let method: Method = "PATCH".parse().unwrap();
/// assert_eq!(method, Method::Patch);
/// assert!("PUT".parse::<Method>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
    Options,
}

impl Method {
    /// Returns the method as a string slice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Method {
    type Err = RequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "OPTIONS" => Ok(Self::Options),
            other => Err(RequestError::UnsupportedMethod(other.to_owned())),
        }
    }
}

impl AsRef<str> for Method {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
