//! # lib_pos
//!
//! Client-side engine for the Yurica POS terminal: menu retrieval, catalog
//! state with scheduled refreshes, the order cart, order submission and the
//! staff PIN login flow. Rendering is left to the front end; everything here
//! is plain state plus async I/O.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod auth;
pub mod cart;
pub mod configs;
pub mod loggers;
pub mod menu;
pub mod orders;
pub mod retrieve;
pub mod utils;

// Re-export the types most callers need
pub use auth::{LoginFlow, LoginOutcome, PinInput, PinVerifier, SupabasePinVerifier};
pub use cart::{Cart, Money};
pub use configs::config_pos::{resolve_config, resolve_config_with_notes, ConfigError, ConfigNote, MenuSourceKind, PosConfig};
pub use menu::{
    AppLifecycle, CatalogSnapshot, Category, LoadOutcome, MenuBrowser, MenuCatalog, MenuFilter,
    MenuItem, MenuSource, RefreshScheduler, RefreshTrigger, SchedulerHandle,
};
pub use orders::{OrderEvent, OrderReceipt, OrderSubmitter, StaffMeta, SubmitError, SubmitPolicy};
pub use retrieve::ky_http::{ApiClient, ClientOptions, FetchError};
