//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - Pretty or JSON console output on stderr
//! - Optional daily-rolled JSON log file

pub mod logger;

pub use logger::{parse_log_format, parse_log_level, LogFormat, LoggerImpl};
