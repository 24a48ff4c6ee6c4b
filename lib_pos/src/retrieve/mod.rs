//! # Data Retrieval Module
//!
//! This module provides a centralized location for the HTTP client used by
//! every remote collaborator of the terminal: the custom menu endpoint, the
//! order events endpoint and the hosted database (tables and RPC).
//!
//! ## Contained Modules:
//!
//! - **`ky_http`**: A generic HTTP `ApiClient` built on `reqwest` and
//!   `reqwest-middleware`, featuring optional transient retries with
//!   exponential backoff, a hard deadline per call and cache-defeating GETs.
//!
//! Callers focus on decoding and state handling and delegate timeouts,
//! header injection and error normalization to this layer.

/// Generic HTTP API client with deadline and retry middleware.
pub mod ky_http;
