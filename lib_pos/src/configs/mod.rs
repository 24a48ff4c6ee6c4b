//! # Configuration
//!
//! Terminal settings resolved from built-in defaults, a JSON config file,
//! environment variables and command line flags.

pub mod config_pos;
