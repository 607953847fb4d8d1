//! Async driver for a [`StabilityDetector`].
//!
//! The runner owns the page view and reacts to three sources:
//!
//! - DOM signals (added nodes, visibility changes, shutdown)
//! - the poll timer, 200ms visible / 1000ms hidden
//! - the safety scan, every 5s while visible
//!
//! Confirmed events are forwarded to the usage sink.

use ecotokens_core::UsageMessage;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep};
use tracing::{debug, info, instrument};

use super::detector::StabilityDetector;
use super::document::{Document, NodeId};
use crate::site::SiteConfig;

/// Safety scan cadence while visible.
pub const SAFETY_SCAN_INTERVAL: Duration = Duration::from_secs(5);

/// A change observed on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomSignal {
    /// Elements were inserted.
    Added(Vec<NodeId>),
    /// The page became visible (`true`) or hidden (`false`).
    Visibility(bool),
    /// Stop observing.
    Shutdown,
}

/// Runs a detector against a page until shutdown.
pub struct ObserverRunner<D> {
    doc: D,
    detector: StabilityDetector,
    signals: mpsc::Receiver<DomSignal>,
    sink: mpsc::UnboundedSender<UsageMessage>,
}

impl<D: Document + Send + 'static> ObserverRunner<D> {
    /// Creates a runner for `site`.
    pub fn new(
        doc: D,
        site: &'static SiteConfig,
        visible: bool,
        signals: mpsc::Receiver<DomSignal>,
        sink: mpsc::UnboundedSender<UsageMessage>,
    ) -> Self {
        Self {
            doc,
            detector: StabilityDetector::new(site, visible),
            signals,
            sink,
        }
    }

    /// Spawns the runner onto the current runtime.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Observes until [`DomSignal::Shutdown`] or the signal channel closes.
    #[instrument(skip(self), fields(provider = %self.detector.site().provider))]
    pub async fn run(mut self) {
        let delay = self.detector.site().observe_delay;
        if !delay.is_zero() {
            sleep(delay).await;
        }
        info!("Observing page");

        let mut poll = timer(self.detector.poll_interval());
        let mut safety = timer(SAFETY_SCAN_INTERVAL);

        loop {
            tokio::select! {
                _ = poll.tick() => {
                    for event in self.detector.tick(&self.doc, Instant::now()) {
                        if self.sink.send(UsageMessage::new(event)).is_err() {
                            debug!("Usage sink closed");
                        }
                    }
                }
                _ = safety.tick(), if self.detector.is_visible() => {
                    self.detector.safety_scan(&self.doc, Instant::now());
                }
                signal = self.signals.recv() => match signal {
                    Some(DomSignal::Added(nodes)) => {
                        self.detector.on_added(&self.doc, &nodes, Instant::now());
                    }
                    Some(DomSignal::Visibility(visible)) => {
                        self.detector.set_visible(&self.doc, visible, Instant::now());
                        poll = timer(self.detector.poll_interval());
                        if visible {
                            safety = timer(SAFETY_SCAN_INTERVAL);
                        }
                    }
                    Some(DomSignal::Shutdown) | None => break,
                },
            }
        }
        debug!("Observer stopped");
    }
}

fn timer(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
