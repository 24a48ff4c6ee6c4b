//! # Utilities Module
//!
//! Small helpers shared by the rest of the crate: clock access, secret
//! masking for logs and identification of the device the terminal runs on.

/// Miscellaneous utility functions, including system information and general helpers.
pub mod misc;
