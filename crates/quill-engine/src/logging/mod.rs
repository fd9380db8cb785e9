//! Logging utilities.
//!
//! This module centralizes logger initialization. Library code only talks to
//! the `log` facade; `env_logger` is installed here for binaries and tests.

mod init;

pub use init::{init_logging, LoggingConfig, DEFAULT_FILTER};
