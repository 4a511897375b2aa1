//! SDI error types.
//!
//! Every fallible operation in the framework returns [`SdiResult`]. The
//! variants are ordinary, recoverable outcomes; callers decide whether to
//! retry. [`SdiError::errno`] maps each variant onto the errno value the
//! platform layer historically reported.

use crate::types::ResourceType;
use thiserror::Error;

/// Error type for SDI operations.
#[derive(Debug, Error)]
pub enum SdiError {
    /// A bus transaction failed.
    #[error("Transport failure on {bus} at address 0x{address:02x}: errno {errno}")]
    Transport {
        /// Bus the transaction was issued on
        bus: String,
        /// Slave address (or I/O port) of the failed transaction
        address: u16,
        /// Underlying errno reported by the transport
        errno: i32,
    },

    /// A framed message failed validation (checksum, size, encoding).
    #[error("Invalid message: {reason}")]
    InvalidMessage { reason: String },

    /// The resource does not implement the requested operation.
    #[error("Operation {operation} not supported by resource '{resource}'")]
    Unsupported {
        resource: String,
        operation: &'static str,
    },

    /// An operation of one resource family was invoked on another.
    #[error("Resource '{resource}' is of type {actual}, expected {expected}")]
    WrongResourceType {
        resource: String,
        expected: ResourceType,
        actual: ResourceType,
    },

    /// Value does not fit the register it is destined for.
    #[error("Value out of range: {message}")]
    OutOfRange { message: String },

    /// The device has not latched valid data yet.
    #[error("Data not ready: {message}")]
    NotReady { message: String },

    /// A named resource, entity, driver or bus does not exist.
    #[error("Not found: {item}")]
    NotFound { item: String },

    /// A handle was issued by another registry or points past its end.
    #[error("Stale handle: {handle}")]
    StaleHandle { handle: String },

    /// Platform description is malformed.
    #[error("Invalid configuration for {field}: {message}")]
    InvalidConfig { field: String, message: String },

    /// Error while reading a platform description.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SdiError {
    /// Creates a transport error.
    pub fn transport(bus: impl Into<String>, address: u16, errno: i32) -> Self {
        SdiError::Transport {
            bus: bus.into(),
            address,
            errno,
        }
    }

    /// Creates an invalid message error.
    pub fn invalid_message(reason: impl Into<String>) -> Self {
        SdiError::InvalidMessage {
            reason: reason.into(),
        }
    }

    /// Creates an unsupported operation error.
    ///
    /// Capability trait defaults do not know which resource they belong to,
    /// so the resource name starts empty and is filled in by
    /// [`SdiError::with_resource`] at the dispatch layer.
    pub fn unsupported(operation: &'static str) -> Self {
        SdiError::Unsupported {
            resource: String::new(),
            operation,
        }
    }

    /// Creates a wrong resource type error.
    pub fn wrong_type(
        resource: impl Into<String>,
        expected: ResourceType,
        actual: ResourceType,
    ) -> Self {
        SdiError::WrongResourceType {
            resource: resource.into(),
            expected,
            actual,
        }
    }

    /// Creates an out of range error.
    pub fn out_of_range(message: impl Into<String>) -> Self {
        SdiError::OutOfRange {
            message: message.into(),
        }
    }

    /// Creates a data not ready error.
    pub fn not_ready(message: impl Into<String>) -> Self {
        SdiError::NotReady {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(item: impl Into<String>) -> Self {
        SdiError::NotFound { item: item.into() }
    }

    /// Creates a stale handle error.
    pub fn stale_handle(handle: impl Into<String>) -> Self {
        SdiError::StaleHandle {
            handle: handle.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(field: impl Into<String>, message: impl Into<String>) -> Self {
        SdiError::InvalidConfig {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        SdiError::Internal {
            message: message.into(),
        }
    }

    /// Attaches a resource name to an anonymous `Unsupported` error.
    pub fn with_resource(self, name: &str) -> Self {
        match self {
            SdiError::Unsupported {
                resource,
                operation,
            } if resource.is_empty() => SdiError::Unsupported {
                resource: name.to_string(),
                operation,
            },
            other => other,
        }
    }

    /// Returns true for `Unsupported` errors.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, SdiError::Unsupported { .. })
    }

    /// Returns the errno equivalent of this error.
    pub fn errno(&self) -> i32 {
        match self {
            SdiError::Transport { errno, .. } => *errno,
            SdiError::InvalidMessage { .. } => libc::EINVAL,
            SdiError::Unsupported { .. } => libc::EOPNOTSUPP,
            SdiError::WrongResourceType { .. } => libc::EPERM,
            SdiError::OutOfRange { .. } => libc::ERANGE,
            SdiError::NotReady { .. } => libc::EINVAL,
            SdiError::NotFound { .. } => libc::ENOENT,
            SdiError::StaleHandle { .. } => libc::ESTALE,
            SdiError::InvalidConfig { .. } => libc::EINVAL,
            SdiError::Io(e) => e.raw_os_error().unwrap_or(libc::EIO),
            SdiError::Internal { .. } => libc::EFAULT,
        }
    }

    /// Returns true if restarting the whole operation may succeed.
    ///
    /// Bus failures, corrupted frames and unlatched data are transient.
    /// Everything else is a property of the request or of the platform
    /// description.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SdiError::Transport { .. }
                | SdiError::InvalidMessage { .. }
                | SdiError::NotReady { .. }
        )
    }
}

/// Result type for SDI operations.
pub type SdiResult<T> = Result<T, SdiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_errno_mapping() {
        assert_eq!(SdiError::unsupported("speed").errno(), libc::EOPNOTSUPP);
        assert_eq!(
            SdiError::wrong_type("t1", ResourceType::Fan, ResourceType::Temperature).errno(),
            libc::EPERM
        );
        assert_eq!(SdiError::out_of_range("200").errno(), libc::ERANGE);
        assert_eq!(SdiError::transport("i2c-0", 0x32, libc::ENXIO).errno(), libc::ENXIO);
        assert_eq!(SdiError::invalid_message("checksum").errno(), libc::EINVAL);
    }

    #[test]
    fn test_with_resource_fills_anonymous_unsupported() {
        let err = SdiError::unsupported("threshold").with_resource("tmp75-1");
        match err {
            SdiError::Unsupported {
                resource,
                operation,
            } => {
                assert_eq!(resource, "tmp75-1");
                assert_eq!(operation, "threshold");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_with_resource_keeps_other_errors() {
        let err = SdiError::out_of_range("x").with_resource("fan1");
        assert!(matches!(err, SdiError::OutOfRange { .. }));

        let err = SdiError::Unsupported {
            resource: "inner".to_string(),
            operation: "get",
        }
        .with_resource("outer");
        assert!(err.to_string().contains("inner"));
    }

    #[test]
    fn test_retryable() {
        assert!(SdiError::transport("i2c-1", 0x4c, libc::EIO).is_retryable());
        assert!(SdiError::invalid_message("size").is_retryable());
        assert!(SdiError::not_ready("0x40 reads 0xff").is_retryable());
        assert!(!SdiError::unsupported("set").is_retryable());
        assert!(!SdiError::not_found("fan9").is_retryable());
    }

    #[test]
    fn test_display() {
        let err = SdiError::wrong_type("fan1", ResourceType::Temperature, ResourceType::Fan);
        assert_eq!(
            err.to_string(),
            "Resource 'fan1' is of type fan, expected temperature"
        );
    }
}
