//! # Refresh Scheduler
//!
//! Decides when the menu is fetched. Four triggers funnel into one
//! [`RefreshScheduler::load`]:
//!
//! 1. the initial mount,
//! 2. a manual refresh from staff,
//! 3. the app returning to the foreground (lifecycle changes arrive on a
//!    queue, so a quick background/foreground pair is never coalesced),
//! 4. a fixed-period timer, independent of 3.
//!
//! Background triggers spawn their loads so a slow request never delays the
//! next tick; overlapping loads are resolved by the catalog's sequence guard.
//!
//! ## Teardown
//! [`SchedulerHandle::shutdown`] (or dropping the handle) cancels the timer
//! and the foreground watcher, abandons in-flight requests and closes the
//! catalog, so nothing mutates state afterwards.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::menu::catalog::{LoadOutcome, MenuCatalog, RefreshTrigger};
use crate::menu::source::MenuSource;

/// Default period of the refresh timer.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(15);

/// Foreground state reported by the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppLifecycle {
    #[default]
    Active,
    Inactive,
    Background,
}

/// # Refresh Scheduler
///
/// Owns the menu source and the catalog it feeds. Build it once per menu
/// screen and share it through an `Arc`.
pub struct RefreshScheduler {
    source: Arc<dyn MenuSource>,
    catalog: Arc<MenuCatalog>,
    period: Duration,
    token: CancellationToken,
    tracker: TaskTracker,
}

impl RefreshScheduler {
    pub fn new(source: Arc<dyn MenuSource>, catalog: Arc<MenuCatalog>, period: Duration) -> Arc<Self> {
        Arc::new(Self {
            source,
            catalog,
            period,
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
        })
    }

    pub fn catalog(&self) -> &Arc<MenuCatalog> {
        &self.catalog
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Runs one fetch and applies its outcome to the catalog.
    ///
    /// Safe to call while other loads are in flight. Returns `Closed`
    /// without touching the network once the scheduler is torn down.
    pub async fn load(&self, trigger: RefreshTrigger) -> LoadOutcome {
        let Some(ticket) = self.catalog.begin(trigger) else {
            return LoadOutcome::Closed;
        };

        let result = tokio::select! {
            _ = self.token.cancelled() => {
                log::debug!("Menu load #{} abandoned by teardown", ticket.seq());
                return LoadOutcome::Closed;
            }
            res = self.source.fetch_menu() => res,
        };

        self.catalog.complete(ticket, result)
    }

    /// Starts a load on the runtime without waiting for it.
    pub fn spawn_load(self: &Arc<Self>, trigger: RefreshTrigger) {
        if self.token.is_cancelled() {
            return;
        }
        let this = Arc::clone(self);
        self.tracker.spawn(async move {
            this.load(trigger).await;
        });
    }

    /// Starts the mount load, the interval timer and the foreground watcher.
    ///
    /// The host reports every lifecycle change on `lifecycle`; the app is
    /// assumed `Active` at start.
    pub fn start(self: &Arc<Self>, lifecycle: mpsc::UnboundedReceiver<AppLifecycle>) -> SchedulerHandle {
        log::info!(
            "Menu refresh started: {} every {}s",
            self.source.describe(),
            self.period.as_secs()
        );

        self.spawn_load(RefreshTrigger::Mount);

        let this = Arc::clone(self);
        self.tracker.spawn(async move { this.run_interval().await });

        let this = Arc::clone(self);
        self.tracker.spawn(async move { this.watch_foreground(lifecycle).await });

        SchedulerHandle {
            scheduler: Arc::clone(self),
        }
    }

    async fn run_interval(self: Arc<Self>) {
        // first tick one full period after start; the mount load covers t=0
        let mut ticker = interval_at(Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = ticker.tick() => {
                    log::debug!("Refresh timer fired");
                    self.spawn_load(RefreshTrigger::Interval);
                }
            }
        }
    }

    async fn watch_foreground(self: Arc<Self>, mut lifecycle: mpsc::UnboundedReceiver<AppLifecycle>) {
        let mut previous = AppLifecycle::Active;

        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                next = lifecycle.recv() => {
                    let Some(current) = next else {
                        log::debug!("Lifecycle source dropped; foreground refresh stopped");
                        break;
                    };
                    if previous != AppLifecycle::Active && current == AppLifecycle::Active {
                        log::info!("App returned to foreground; refreshing menu");
                        self.spawn_load(RefreshTrigger::Foreground);
                    }
                    previous = current;
                }
            }
        }
    }

    /// Cancels everything and closes the catalog. Idempotent.
    fn stop(&self) {
        if !self.token.is_cancelled() {
            log::info!("Menu refresh stopped");
        }
        // close first so loads abandoned by the cancel find nothing to release
        self.catalog.close();
        self.token.cancel();
        self.tracker.close();
    }
}

/// # Scheduler Handle
///
/// Returned by [`RefreshScheduler::start`]. Teardown happens on
/// [`shutdown`](Self::shutdown) or when the handle is dropped.
pub struct SchedulerHandle {
    scheduler: Arc<RefreshScheduler>,
}

impl SchedulerHandle {
    /// Manual (pull-to-refresh) load; `refreshing` is set while it runs.
    pub async fn refresh(&self) -> LoadOutcome {
        self.scheduler.load(RefreshTrigger::Manual).await
    }

    pub fn scheduler(&self) -> &Arc<RefreshScheduler> {
        &self.scheduler
    }

    pub fn is_running(&self) -> bool {
        !self.scheduler.token.is_cancelled()
    }

    /// Stops all triggers and waits until every spawned task has finished.
    pub async fn shutdown(self) {
        self.scheduler.stop();
        self.scheduler.tracker.wait().await;
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.scheduler.stop();
    }
}
