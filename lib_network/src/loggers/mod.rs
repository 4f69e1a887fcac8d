//! # Loggers Module
//!
//! The leveled, category-tagged logger handed to the network and imaging
//! layers. It forwards every line to `tracing` and can additionally echo to
//! the TTY and append to a log file.

/// Category-tagged logger with truncation, filtering, TTY and file output.
pub mod loggerlocal;

pub use loggerlocal::{LogLevel, LoggerLocal, LoggerLocalOptions};
