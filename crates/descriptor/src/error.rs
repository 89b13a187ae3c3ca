//! Descriptor error types

use crate::types::DescriptorType;
use thiserror::Error;

/// Errors raised while decoding or walking USB descriptors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    /// A header or record claims more bytes than remain in the buffer
    #[error(
        "Truncated descriptor stream at offset {offset}: record needs {length} bytes, {remaining} remain"
    )]
    TruncatedStream {
        offset: usize,
        length: usize,
        remaining: usize,
    },

    /// A record is too short for its type or its fields contradict each other
    #[error("Malformed {kind} descriptor: {reason}")]
    MalformedDescriptor { kind: DescriptorType, reason: String },

    /// A decoder was handed a record carrying a different type tag
    #[error("Unexpected descriptor type {found:#04x} (expected {expected})")]
    UnexpectedType { expected: DescriptorType, found: u8 },

    /// An interface is followed by a different number of endpoints than it declares
    #[error("Interface {interface} declares {expected} endpoints, found {found}")]
    EndpointCountMismatch {
        interface: u8,
        expected: u8,
        found: usize,
    },
}

impl DescriptorError {
    /// Record (or window) shorter than the type's minimum size
    pub(crate) fn too_short(kind: DescriptorType, length: usize, minimum: usize) -> Self {
        DescriptorError::MalformedDescriptor {
            kind,
            reason: format!("{} bytes, minimum {}", length, minimum),
        }
    }

    pub(crate) fn malformed(kind: DescriptorType, reason: impl Into<String>) -> Self {
        DescriptorError::MalformedDescriptor {
            kind,
            reason: reason.into(),
        }
    }
}

/// Type alias for descriptor results
pub type Result<T> = std::result::Result<T, DescriptorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_display() {
        let err = DescriptorError::TruncatedStream {
            offset: 18,
            length: 9,
            remaining: 4,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("offset 18"));
        assert!(msg.contains("9 bytes"));
        assert!(msg.contains("4 remain"));
    }

    #[test]
    fn test_too_short_display() {
        let err = DescriptorError::too_short(DescriptorType::Endpoint, 5, 7);
        assert_eq!(
            format!("{}", err),
            "Malformed endpoint descriptor: 5 bytes, minimum 7"
        );
    }

    #[test]
    fn test_unexpected_type_display() {
        let err = DescriptorError::UnexpectedType {
            expected: DescriptorType::Interface,
            found: 0x05,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("0x05"));
        assert!(msg.contains("interface"));
    }
}
