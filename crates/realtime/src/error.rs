//! Rideshare service errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the workspace.
pub type Result<T> = anyhow::Result<T, Error>;

/// Domain level error type returned by the matching and location services.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Error {
    /// An encoded polyline is truncated or decodes to an unusable route.
    #[error("code: malformed_polyline, description: {0}")]
    MalformedPolyline(String),

    /// The rider request or inbound message parameters are invalid.
    #[error("code: invalid_request, description: {0}")]
    InvalidRequest(String),

    /// The trip is not currently open for location traffic.
    #[error("code: unknown_trip, description: {0}")]
    UnknownTrip(String),

    /// The message broker failed to accept or deliver a message.
    #[error("code: bad_gateway, description: {0}")]
    BadGateway(String),

    /// A payload could not be (de)serialized.
    #[error("code: invalid_format, description: {0}")]
    InvalidFormat(String),

    /// A non recoverable internal error occurred.
    #[error("code: internal, description: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the stable error code associated with the variant.
    #[must_use]
    pub const fn code(&self) -> &str {
        match self {
            Self::MalformedPolyline(_) => "malformed_polyline",
            Self::InvalidRequest(_) => "invalid_request",
            Self::UnknownTrip(_) => "unknown_trip",
            Self::BadGateway(_) => "bad_gateway",
            Self::InvalidFormat(_) => "invalid_format",
            Self::Internal(_) => "internal",
        }
    }

    /// Returns the error description.
    #[must_use]
    pub fn description(&self) -> String {
        self.to_string()
    }

    /// Transient errors may succeed if the operation is attempted again.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::BadGateway(_))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        let chain = err.chain().map(ToString::to_string).collect::<Vec<_>>().join(" -> ");

        // if type is Error, return it with the newly added context
        if let Some(inner) = err.downcast_ref::<Self>() {
            tracing::debug!("Error: {err}, caused by: {inner}");

            return match inner {
                Self::MalformedPolyline(e) => Self::MalformedPolyline(format!("{err}: {e}")),
                Self::InvalidRequest(e) => Self::InvalidRequest(format!("{err}: {e}")),
                Self::UnknownTrip(e) => Self::UnknownTrip(format!("{err}: {e}")),
                Self::BadGateway(e) => Self::BadGateway(format!("{err}: {e}")),
                Self::InvalidFormat(e) => Self::InvalidFormat(format!("{err}: {e}")),
                Self::Internal(_) => Self::Internal(chain),
            };
        }

        // otherwise, return an Internal error
        Self::Internal(chain)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidFormat(err.to_string())
    }
}

#[macro_export]
macro_rules! invalid_request {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::InvalidRequest(format!($fmt, $($arg)*))
    };
     ($err:expr $(,)?) => {
        $crate::Error::InvalidRequest(format!($err))
    };
}

#[macro_export]
macro_rules! unknown_trip {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::UnknownTrip(format!($fmt, $($arg)*))
    };
     ($err:expr $(,)?) => {
        $crate::Error::UnknownTrip(format!($err))
    };
}

#[macro_export]
macro_rules! malformed_polyline {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::MalformedPolyline(format!($fmt, $($arg)*))
    };
     ($err:expr $(,)?) => {
        $crate::Error::MalformedPolyline(format!($err))
    };
}

#[macro_export]
macro_rules! bad_gateway {
    ($fmt:expr, $($arg:tt)*) => {
        $crate::Error::BadGateway(format!($fmt, $($arg)*))
    };
     ($err:expr $(,)?) => {
        $crate::Error::BadGateway(format!($err))
    };
}

#[cfg(test)]
mod tests {
    use anyhow::{Context, Result, anyhow};
    use serde_json::Value;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, Registry, fmt};

    use super::Error;

    #[test]
    fn error_display() {
        let err = Error::InvalidRequest("radius must be positive".to_string());
        assert_eq!(
            format!("{err}"),
            "code: invalid_request, description: radius must be positive"
        );
        assert_eq!(err.code(), "invalid_request");
    }

    #[test]
    fn with_context() {
        let _ = Registry::default().with(EnvFilter::new("debug")).with(fmt::layer()).try_init();

        let context_error = || -> Result<(), Error> {
            Err(Error::UnknownTrip("trip 7".to_string()))
                .context("publishing location")
                .context("handling message")?;
            Ok(())
        };

        let result = context_error();
        assert_eq!(
            result.unwrap_err(),
            Error::UnknownTrip("handling message: trip 7".to_string())
        );
    }

    #[test]
    fn anyhow_context() {
        let result = Err::<(), anyhow::Error>(anyhow!("one-off error")).context("error context");
        let err: Error = result.unwrap_err().into();

        assert_eq!(err.to_string(), "code: internal, description: error context -> one-off error");
    }

    #[test]
    fn serde_context() {
        let result: Result<Value, anyhow::Error> =
            serde_json::from_str(r#"{"foo": "bar""#).context("error context");
        let err: Error = result.unwrap_err().into();

        assert_eq!(
            err.to_string(),
            "code: internal, description: error context -> EOF while parsing an object at line 1 column 13"
        );
    }

    #[test]
    fn macros_format() {
        let trip = 42;
        assert_eq!(
            crate::unknown_trip!("trip {trip} is not open"),
            Error::UnknownTrip("trip 42 is not open".to_string())
        );
        assert!(crate::bad_gateway!("broker closed").is_transient());
        assert!(!crate::malformed_polyline!("truncated").is_transient());
    }
}
