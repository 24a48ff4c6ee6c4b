//! # Menu Module
//!
//! Everything between the remote menu and what the terminal shows.
//!
//! ## Contained Modules:
//! - **`model`**: `MenuItem` and `Category`, decoded from either backend shape.
//! - **`source`**: the `MenuSource` trait and its HTTP and hosted-table backends.
//! - **`catalog`**: `MenuCatalog`, the sequence-guarded state holder observed
//!   through a `watch` channel.
//! - **`filter`**: search/category filtering and the reactive `MenuBrowser`.
//! - **`scheduler`**: `RefreshScheduler`, which fires loads on mount, on
//!   demand, on foreground and on a timer.

/// Menu item data model.
pub mod model;
/// Remote menu backends.
pub mod source;
/// Catalog state holder.
pub mod catalog;
/// Filtered views over the catalog.
pub mod filter;
/// Load triggers and teardown.
pub mod scheduler;

pub use catalog::{CatalogSnapshot, LoadOutcome, LoadTicket, MenuCatalog, RefreshTrigger};
pub use filter::{MenuBrowser, MenuFilter};
pub use model::{Category, MenuItem, DEFAULT_CURRENCY};
pub use scheduler::{AppLifecycle, RefreshScheduler, SchedulerHandle, DEFAULT_REFRESH_INTERVAL};
pub use source::{HttpMenuSource, MenuSource, SupabaseMenuSource};
