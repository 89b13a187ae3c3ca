//! Host-side error types

use descriptor::DescriptorError;
use thiserror::Error;

/// Failure reported by a [`HostController`](crate::usb::HostController)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("Operation timed out")]
    Timeout,

    #[error("Operation interrupted")]
    Interrupted,

    #[error("Device not found")]
    NotFound,

    #[error("Device disconnected")]
    NoDevice,

    #[error("Access denied")]
    Access,

    #[error("Resource busy")]
    Busy,

    #[error("I/O error")]
    Io,

    #[error("Invalid parameter")]
    InvalidParam,

    #[error("Operation not supported on this platform")]
    NotSupported,

    #[error("Host stack not installed")]
    NotInstalled,

    #[error("Unknown client handle")]
    UnknownClient,

    #[error("Unknown device handle")]
    UnknownDevice,

    #[error("{0}")]
    Other(String),
}

impl HostError {
    /// An empty bounded wait, not a failure
    pub fn is_timeout(&self) -> bool {
        matches!(self, HostError::Timeout | HostError::Interrupted)
    }
}

impl From<rusb::Error> for HostError {
    fn from(err: rusb::Error) -> Self {
        match err {
            rusb::Error::Timeout => HostError::Timeout,
            rusb::Error::Interrupted => HostError::Interrupted,
            rusb::Error::NotFound => HostError::NotFound,
            rusb::Error::NoDevice => HostError::NoDevice,
            rusb::Error::Access => HostError::Access,
            rusb::Error::Busy => HostError::Busy,
            rusb::Error::Io => HostError::Io,
            rusb::Error::InvalidParam => HostError::InvalidParam,
            rusb::Error::NotSupported => HostError::NotSupported,
            _ => HostError::Other(err.to_string()),
        }
    }
}

/// Why enumeration of one device stopped
#[derive(Debug, Error)]
pub enum EnumerationError {
    #[error("{operation} failed: {source}")]
    Collaborator {
        operation: &'static str,
        #[source]
        source: HostError,
    },

    #[error("Invalid descriptor: {0}")]
    Descriptor(#[from] DescriptorError),
}

impl EnumerationError {
    /// Adapter for `map_err` naming the failed collaborator call
    pub fn collaborator(operation: &'static str) -> impl FnOnce(HostError) -> Self {
        move |source| EnumerationError::Collaborator { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rusb_error_mapping() {
        assert_eq!(HostError::from(rusb::Error::Timeout), HostError::Timeout);
        assert_eq!(HostError::from(rusb::Error::NoDevice), HostError::NoDevice);
        assert_eq!(HostError::from(rusb::Error::NotFound), HostError::NotFound);
        assert_eq!(HostError::from(rusb::Error::Access), HostError::Access);
        assert!(matches!(
            HostError::from(rusb::Error::Pipe),
            HostError::Other(_)
        ));
    }

    #[test]
    fn test_is_timeout() {
        assert!(HostError::Timeout.is_timeout());
        assert!(HostError::Interrupted.is_timeout());
        assert!(!HostError::Io.is_timeout());
        assert!(!HostError::NoDevice.is_timeout());
    }

    #[test]
    fn test_collaborator_error_display() {
        let err = Err::<(), _>(HostError::Busy)
            .map_err(EnumerationError::collaborator("open_device"))
            .unwrap_err();
        assert_eq!(err.to_string(), "open_device failed: Resource busy");
    }

    #[test]
    fn test_descriptor_error_conversion() {
        let err: EnumerationError = DescriptorError::TruncatedStream {
            offset: 0,
            length: 34,
            remaining: 9,
        }
        .into();
        assert!(matches!(err, EnumerationError::Descriptor(_)));
    }
}
