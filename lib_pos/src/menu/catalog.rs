//! # Menu Catalog State
//!
//! The single holder of what the terminal currently knows about the menu:
//! the last applied item list, the `loading`/`refreshing` flags and the last
//! error message. Observers subscribe to a `watch` channel and see every
//! change as a fresh [`CatalogSnapshot`].
//!
//! ## Ordering
//! Loads may overlap. Each load takes a ticket carrying a sequence number
//! when it starts; its outcome is applied only if that number is higher than
//! the last one applied. A slow early load can therefore never overwrite the
//! result of a later one. Flags are driven by counters of outstanding loads,
//! so they stay correct whichever order loads finish in.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::watch;

use crate::menu::model::MenuItem;
use crate::retrieve::ky_http::FetchError;
use crate::utils::misc::utils::now_utc;

/// What started a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefreshTrigger {
    /// First load when the menu screen opens.
    Mount,
    /// Staff pulled to refresh.
    Manual,
    /// App came back to the foreground.
    Foreground,
    /// Periodic timer.
    Interval,
}

impl RefreshTrigger {
    /// Manual loads drive `refreshing`; all others drive `loading`.
    pub fn is_manual(self) -> bool {
        matches!(self, RefreshTrigger::Manual)
    }
}

/// Observable state of the catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogSnapshot {
    /// Last successfully applied items, in server order.
    pub items: Vec<MenuItem>,
    /// A non-manual load is outstanding.
    pub loading: bool,
    /// A manual load is outstanding.
    pub refreshing: bool,
    /// Message of the last failed load, cleared when a new load starts.
    pub error: Option<String>,
    /// When `items` was last replaced.
    pub last_updated: Option<DateTime<Utc>>,
}

impl CatalogSnapshot {
    /// True while the very first load is still running: nothing to show yet.
    pub fn is_initial_load(&self) -> bool {
        self.loading && self.last_updated.is_none()
    }

    pub fn find(&self, item_id: &str) -> Option<&MenuItem> {
        self.items.iter().find(|item| item.id == item_id)
    }
}

/// Proof that a load was started; hand it back to [`MenuCatalog::complete`].
///
/// A ticket dropped without being completed (its load future was cancelled)
/// releases the flag it raised, so `loading`/`refreshing` never stay stuck.
pub struct LoadTicket {
    seq: u64,
    trigger: RefreshTrigger,
    shared: Arc<Shared>,
    settled: bool,
}

impl LoadTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn trigger(&self) -> RefreshTrigger {
        self.trigger
    }
}

impl fmt::Debug for LoadTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadTicket")
            .field("seq", &self.seq)
            .field("trigger", &self.trigger)
            .field("settled", &self.settled)
            .finish()
    }
}

impl Drop for LoadTicket {
    fn drop(&mut self) {
        if !self.settled {
            self.shared.release(self.seq, self.trigger);
        }
    }
}

/// What happened to a load's result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The result (items or error) is now the catalog state.
    Applied,
    /// A newer load had already been applied; the result was dropped.
    Stale,
    /// The catalog was closed; nothing was changed.
    Closed,
}

#[derive(Debug, Default)]
struct Tracker {
    next_seq: u64,
    applied_seq: u64,
    pending_auto: usize,
    pending_manual: usize,
    closed: bool,
}

impl Tracker {
    fn settle(&mut self, trigger: RefreshTrigger) {
        if trigger.is_manual() {
            self.pending_manual = self.pending_manual.saturating_sub(1);
        } else {
            self.pending_auto = self.pending_auto.saturating_sub(1);
        }
    }

    /// `(loading, refreshing)`
    fn flags(&self) -> (bool, bool) {
        (self.pending_auto > 0, self.pending_manual > 0)
    }
}

/// State shared by the catalog and its outstanding tickets.
struct Shared {
    state: watch::Sender<CatalogSnapshot>,
    tracker: Mutex<Tracker>,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, Tracker> {
        // the tracker holds plain counters; a panic mid-update cannot leave it unusable
        self.tracker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Undoes the flag of a load that ended without a result.
    fn release(&self, seq: u64, trigger: RefreshTrigger) {
        let mut tracker = self.lock();
        if tracker.closed {
            return;
        }
        tracker.settle(trigger);
        let (loading, refreshing) = tracker.flags();
        self.state.send_modify(|snap| {
            snap.loading = loading;
            snap.refreshing = refreshing;
        });
        log::debug!("Menu load #{} abandoned ({:?})", seq, trigger);
    }
}

/// # Menu Catalog
///
/// Shared (`Arc`) holder for the catalog state. All mutations take a short
/// synchronous lock and publish the new snapshot before returning.
pub struct MenuCatalog {
    shared: Arc<Shared>,
}

impl Default for MenuCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl MenuCatalog {
    pub fn new() -> Self {
        let (state, _) = watch::channel(CatalogSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                state,
                tracker: Mutex::new(Tracker::default()),
            }),
        }
    }

    /// Observe every change.
    pub fn subscribe(&self) -> watch::Receiver<CatalogSnapshot> {
        self.shared.state.subscribe()
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> CatalogSnapshot {
        self.shared.state.borrow().clone()
    }

    /// The highest sequence number whose outcome has been applied.
    pub fn applied_seq(&self) -> u64 {
        self.shared.lock().applied_seq
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Marks a load as started: clears the error and raises the flag that
    /// matches the trigger. Returns `None` once the catalog is closed.
    pub fn begin(&self, trigger: RefreshTrigger) -> Option<LoadTicket> {
        let mut tracker = self.shared.lock();
        if tracker.closed {
            return None;
        }
        tracker.next_seq += 1;
        if trigger.is_manual() {
            tracker.pending_manual += 1;
        } else {
            tracker.pending_auto += 1;
        }
        let seq = tracker.next_seq;
        let (loading, refreshing) = tracker.flags();
        self.shared.state.send_modify(|snap| {
            snap.error = None;
            snap.loading = loading;
            snap.refreshing = refreshing;
        });
        log::debug!("Menu load #{} started ({:?})", seq, trigger);
        Some(LoadTicket {
            seq,
            trigger,
            shared: Arc::clone(&self.shared),
            settled: false,
        })
    }

    /// Applies the outcome of a load started with `ticket`.
    ///
    /// Success replaces the items wholesale; failure records a message and
    /// keeps the previous items.
    pub fn complete(&self, mut ticket: LoadTicket, result: Result<Vec<MenuItem>, FetchError>) -> LoadOutcome {
        ticket.settled = true;
        let mut tracker = self.shared.lock();
        if tracker.closed {
            log::debug!("Menu load #{} finished after close; ignored", ticket.seq);
            return LoadOutcome::Closed;
        }

        tracker.settle(ticket.trigger);
        let (loading, refreshing) = tracker.flags();

        let fresh = ticket.seq > tracker.applied_seq;
        if fresh {
            tracker.applied_seq = ticket.seq;
        }

        self.shared.state.send_modify(|snap| {
            snap.loading = loading;
            snap.refreshing = refreshing;
            if !fresh {
                return;
            }
            match result {
                Ok(items) => {
                    log::info!("Menu load #{} applied: {} items", ticket.seq, items.len());
                    snap.items = items;
                    snap.error = None;
                    snap.last_updated = Some(now_utc());
                }
                Err(e) => {
                    log::warn!("Menu load #{} failed: {}", ticket.seq, e);
                    snap.error = Some(e.describe());
                }
            }
        });

        if fresh {
            LoadOutcome::Applied
        } else {
            log::debug!(
                "Menu load #{} is older than applied #{}; result dropped",
                ticket.seq,
                tracker.applied_seq
            );
            LoadOutcome::Stale
        }
    }

    /// Stops all further mutation. Outstanding tickets complete as `Closed`.
    pub fn close(&self) {
        let mut tracker = self.shared.lock();
        if !tracker.closed {
            tracker.closed = true;
            log::debug!("Menu catalog closed at load #{}", tracker.applied_seq);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::Money;

    fn items(names: &[&str]) -> Vec<MenuItem> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| MenuItem::new(i.to_string(), *n, Money::from_cents(100)))
            .collect()
    }

    fn timeout() -> FetchError {
        FetchError::Timeout {
            timeout_ms: 7000,
            url: "http://pos/api/menu".into(),
        }
    }

    #[test]
    fn success_replaces_items_and_clears_flags() {
        let catalog = MenuCatalog::new();
        let t = catalog.begin(RefreshTrigger::Mount).unwrap();
        assert!(catalog.snapshot().loading);
        assert!(catalog.snapshot().is_initial_load());
        assert_eq!(catalog.complete(t, Ok(items(&["Udon"]))), LoadOutcome::Applied);
        let snap = catalog.snapshot();
        assert!(!snap.loading && !snap.refreshing);
        assert_eq!(snap.items.len(), 1);
        assert!(snap.last_updated.is_some());
    }

    #[test]
    fn failure_keeps_items_and_sets_message() {
        let catalog = MenuCatalog::new();
        let t = catalog.begin(RefreshTrigger::Mount).unwrap();
        catalog.complete(t, Ok(items(&["Udon", "Ramen"])));
        let t = catalog.begin(RefreshTrigger::Interval).unwrap();
        catalog.complete(t, Err(timeout()));
        let snap = catalog.snapshot();
        assert_eq!(snap.items.len(), 2);
        assert_eq!(snap.error.as_deref(), Some("The server did not answer within 7.0s."));
    }

    #[test]
    fn new_attempt_clears_previous_error() {
        let catalog = MenuCatalog::new();
        let t = catalog.begin(RefreshTrigger::Mount).unwrap();
        catalog.complete(t, Err(timeout()));
        assert!(catalog.snapshot().error.is_some());
        let _t = catalog.begin(RefreshTrigger::Manual).unwrap();
        let snap = catalog.snapshot();
        assert!(snap.error.is_none());
        assert!(snap.refreshing);
        assert!(!snap.loading);
    }

    #[test]
    fn later_started_load_wins_even_if_it_finishes_first() {
        let catalog = MenuCatalog::new();
        let slow = catalog.begin(RefreshTrigger::Interval).unwrap();
        let fast = catalog.begin(RefreshTrigger::Manual).unwrap();
        assert_eq!(catalog.complete(fast, Ok(items(&["New"]))), LoadOutcome::Applied);
        // the interval load is still outstanding
        assert!(catalog.snapshot().loading);
        assert_eq!(catalog.complete(slow, Ok(items(&["Old"]))), LoadOutcome::Stale);
        let snap = catalog.snapshot();
        assert_eq!(snap.items[0].name, "New");
        assert!(!snap.loading && !snap.refreshing);
    }

    #[test]
    fn stale_error_does_not_mask_newer_success() {
        let catalog = MenuCatalog::new();
        let first = catalog.begin(RefreshTrigger::Foreground).unwrap();
        let second = catalog.begin(RefreshTrigger::Interval).unwrap();
        catalog.complete(second, Ok(items(&["Fresh"])));
        catalog.complete(first, Err(timeout()));
        assert!(catalog.snapshot().error.is_none());
        assert_eq!(catalog.applied_seq(), 2);
    }

    #[test]
    fn closed_catalog_ignores_everything() {
        let catalog = MenuCatalog::new();
        let t = catalog.begin(RefreshTrigger::Mount).unwrap();
        catalog.close();
        assert_eq!(catalog.complete(t, Ok(items(&["Late"]))), LoadOutcome::Closed);
        assert!(catalog.snapshot().items.is_empty());
        assert!(catalog.begin(RefreshTrigger::Manual).is_none());
    }

    #[test]
    fn dropped_ticket_releases_its_flag() {
        let catalog = MenuCatalog::new();
        let auto = catalog.begin(RefreshTrigger::Interval).unwrap();
        let manual = catalog.begin(RefreshTrigger::Manual).unwrap();
        drop(manual);
        let snap = catalog.snapshot();
        assert!(!snap.refreshing);
        assert!(snap.loading);
        drop(auto);
        assert!(!catalog.snapshot().loading);

        // a completed ticket is not released twice
        let a = catalog.begin(RefreshTrigger::Mount).unwrap();
        let b = catalog.begin(RefreshTrigger::Interval).unwrap();
        catalog.complete(a, Ok(items(&["Udon"])));
        assert!(catalog.snapshot().loading);
        catalog.complete(b, Ok(items(&["Udon"])));
        assert!(!catalog.snapshot().loading);
    }

    #[test]
    fn dropped_ticket_after_close_changes_nothing() {
        let catalog = MenuCatalog::new();
        let t = catalog.begin(RefreshTrigger::Mount).unwrap();
        catalog.close();
        let before = catalog.snapshot();
        drop(t);
        assert_eq!(catalog.snapshot(), before);
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let catalog = MenuCatalog::new();
        let mut rx = catalog.subscribe();
        let t = catalog.begin(RefreshTrigger::Mount).unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().loading);
        catalog.complete(t, Ok(items(&["Udon"])));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().items.len(), 1);
    }
}
