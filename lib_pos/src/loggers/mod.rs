//! Logging setup shared by the terminal binaries.

pub mod logger;
