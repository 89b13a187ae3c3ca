//! Common utilities for usbh-enum
//!
//! This crate provides shared functionality for the host crate and its
//! tests: logging setup, the shared error type, and descriptor fixtures.

pub mod error;
pub mod logging;
pub mod test_utils;

pub use error::{Error, Result};
pub use logging::setup_logging;
