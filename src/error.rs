use std::fmt;
use std::sync::Arc;

#[derive(Debug)]
pub enum Error {
    /// Connection, TLS or timeout failure below the HTTP layer.
    Http(reqwest::Error),
    /// Well-formed HTTP exchange with an unexpected or failing body.
    Protocol(String),
    /// Login rejected by the cloud service.
    Authentication(String),
    /// A previously accepted token is no longer valid.
    SessionExpired,
    /// A coordinator refresh failed. Shared by every caller that was
    /// coalesced onto the same refresh.
    UpdateFailed(Arc<Error>),
    NotReady,
    NoDevices,
    AmbiguousDevice(Vec<String>),
    InvalidValue { field: &'static str, value: f64, min: f64, max: f64 },
    InvalidConfig(String),
    UnknownSetup(String),
    Json(serde_json::Error),
    Io(std::io::Error),
}

impl Error {
    /// Unwraps refresh failures down to the error that caused them.
    pub fn root(&self) -> &Error {
        match self {
            Error::UpdateFailed(inner) => inner.root(),
            other => other,
        }
    }

    pub fn is_session_expired(&self) -> bool {
        matches!(self.root(), Error::SessionExpired)
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self.root(), Error::Authentication(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::Authentication(msg) => write!(f, "authentication failed: {msg}"),
            Error::SessionExpired => write!(f, "session expired"),
            Error::UpdateFailed(e) => write!(f, "update failed: {e}"),
            Error::NotReady => write!(f, "no device data yet"),
            Error::NoDevices => write!(f, "no thermostats registered on this account"),
            Error::AmbiguousDevice(ids) => {
                write!(f, "several thermostats found, pick one of: {}", ids.join(", "))
            }
            Error::InvalidValue { field, value, min, max } => {
                write!(f, "invalid {field}: {value} not in {min}..{max}")
            }
            Error::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Error::UnknownSetup(id) => write!(f, "unknown setup: {id}"),
            Error::Json(e) => write!(f, "JSON error: {e}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::UpdateFailed(e) => Some(e.as_ref()),
            Error::Json(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Json(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
