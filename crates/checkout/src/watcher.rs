//! Payment confirmation watcher.
//!
//! After a gateway order returns inline payment instructions (a PIX code),
//! the order is polled on a fixed interval until its payment settles, the
//! attempt budget runs out, or the owner cancels.
//!
//! - Each tick replaces the order snapshot, observable through
//!   [`PaymentWatch::subscribe`].
//! - A failed tick is logged and the loop carries on.
//! - Running out of attempts ends the watch silently; payment may still
//!   settle later and the order page shows it.
//! - On settlement the shopper is notified, and after a short delay taken
//!   to the order's detail page.
//! - [`PaymentWatch::cancel`] (or dropping the handle) stops the task at the
//!   next await point; no poll is issued after cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use marketplace_core::OrderId;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{Instrument, debug, info, info_span, warn};
use url::Url;

use crate::error::add_breadcrumb;
use crate::order::Order;
use crate::ports::{Navigator, Notice, OrderService};

/// Shortest polling interval a watch will run with.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Polling parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    /// Time between polls; the first poll happens one interval after start.
    pub interval: Duration,
    /// Polls before giving up.
    pub max_attempts: u32,
    /// Pause between the success notice and leaving for the order page.
    pub success_delay: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 60,
            success_delay: Duration::from_secs(2),
        }
    }
}

/// How a watch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Payment settled; carries the settled order.
    Settled(Order),
    /// Attempt budget used up without settlement.
    Exhausted { attempts: u32 },
    /// Stopped by its owner.
    Cancelled,
}

struct Shutdown {
    cancelled: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Handle to a running watch. Dropping it cancels the watch.
pub struct PaymentWatch {
    order_id: OrderId,
    shutdown: Arc<Shutdown>,
    snapshot: watch::Receiver<Order>,
    handle: Option<JoinHandle<WatchOutcome>>,
}

impl PaymentWatch {
    /// Start watching `order` on the current tokio runtime.
    ///
    /// An interval shorter than [`MIN_INTERVAL`] is raised to it.
    #[must_use]
    pub fn spawn(
        orders: Arc<dyn OrderService>,
        navigator: Arc<dyn Navigator>,
        order: Order,
        detail_url: Url,
        mut config: WatchConfig,
    ) -> Self {
        let order_id = order.id;
        if config.interval < MIN_INTERVAL {
            warn!(
                interval_ms = config.interval.as_millis(),
                "Polling interval too short, using the minimum"
            );
            config.interval = MIN_INTERVAL;
        }
        let shutdown = Arc::new(Shutdown {
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
        });
        let (tx, rx) = watch::channel(order);

        let task = WatchTask {
            order_id,
            orders,
            navigator,
            detail_url,
            config,
            shutdown: Arc::clone(&shutdown),
            snapshot: tx,
        };
        let span = info_span!("payment_watch", order_id = %order_id);
        let handle = tokio::spawn(task.run().instrument(span));

        add_breadcrumb(
            "checkout",
            "Payment watch started",
            &[("order_id", order_id.to_string())],
        );

        Self {
            order_id,
            shutdown,
            snapshot: rx,
            handle: Some(handle),
        }
    }

    #[must_use]
    pub const fn order_id(&self) -> OrderId {
        self.order_id
    }

    /// The latest polled order.
    #[must_use]
    pub fn snapshot(&self) -> Order {
        self.snapshot.borrow().clone()
    }

    /// Receive every snapshot update.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Order> {
        self.snapshot.clone()
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Whether the watch task has ended, for any reason.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop polling. Idempotent.
    pub fn cancel(&self) {
        if self.shutdown.cancelled.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown.notify.notify_one();
        if let Some(handle) = &self.handle {
            handle.abort();
        }
        debug!(order_id = %self.order_id, "Payment watch cancelled");
    }

    /// Wait for the watch to end.
    pub async fn join(mut self) -> WatchOutcome {
        let Some(handle) = self.handle.take() else {
            return WatchOutcome::Cancelled;
        };
        handle.await.unwrap_or(WatchOutcome::Cancelled)
    }
}

impl Drop for PaymentWatch {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for PaymentWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentWatch")
            .field("order_id", &self.order_id)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

struct WatchTask {
    order_id: OrderId,
    orders: Arc<dyn OrderService>,
    navigator: Arc<dyn Navigator>,
    detail_url: Url,
    config: WatchConfig,
    shutdown: Arc<Shutdown>,
    snapshot: watch::Sender<Order>,
}

impl WatchTask {
    async fn run(self) -> WatchOutcome {
        let period = self.config.interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        for attempt in 1..=self.config.max_attempts {
            tokio::select! {
                () = self.shutdown.notify.notified() => return WatchOutcome::Cancelled,
                _ = ticker.tick() => {}
            }
            if self.shutdown.is_cancelled() {
                return WatchOutcome::Cancelled;
            }

            let polled = tokio::select! {
                () = self.shutdown.notify.notified() => return WatchOutcome::Cancelled,
                polled = self.orders.get_order(self.order_id) => polled,
            };

            match polled {
                Ok(order) => {
                    let settled = order.payment_status.is_settled();
                    debug!(attempt, status = %order.payment_status, "Payment polled");
                    self.snapshot.send_replace(order.clone());
                    if settled {
                        return self.settle(order, attempt).await;
                    }
                }
                Err(e) => {
                    debug!(attempt, error = %e, "Payment poll failed, will retry");
                }
            }
        }

        info!(
            attempts = self.config.max_attempts,
            "Payment not confirmed within the polling window"
        );
        WatchOutcome::Exhausted {
            attempts: self.config.max_attempts,
        }
    }

    async fn settle(self, order: Order, attempt: u32) -> WatchOutcome {
        info!(attempt, "Payment confirmed");
        add_breadcrumb(
            "checkout",
            "Payment confirmed",
            &[("order_id", self.order_id.to_string())],
        );
        self.navigator.notify(Notice::PaymentConfirmed {
            order_id: self.order_id,
        });

        tokio::select! {
            () = self.shutdown.notify.notified() => return WatchOutcome::Cancelled,
            () = tokio::time::sleep(self.config.success_delay) => {}
        }
        if self.shutdown.is_cancelled() {
            return WatchOutcome::Cancelled;
        }

        self.navigator.navigate(&self.detail_url);
        WatchOutcome::Settled(order)
    }
}
