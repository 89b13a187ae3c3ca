//! Common error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Descriptor error: {0}")]
    Descriptor(#[from] descriptor::DescriptorError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use descriptor::DescriptorError;

    #[test]
    fn test_descriptor_error_conversion() {
        let err: Error = DescriptorError::TruncatedStream {
            offset: 9,
            length: 9,
            remaining: 2,
        }
        .into();
        assert!(matches!(err, Error::Descriptor(_)));
        assert!(err.to_string().starts_with("Descriptor error: Truncated"));
    }
}
