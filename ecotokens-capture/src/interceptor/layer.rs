//! Hook installation and supervision.
//!
//! Page scripts may replace the request primitives a hook wraps. The layer
//! installs every hook once, then re-checks them on a short interval and
//! re-installs any that were clobbered. Last write wins.

use ecotokens_core::ProviderKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, trace};

use super::tap::ResponseTap;

/// Default supervision cadence.
pub const SUPERVISE_INTERVAL: Duration = Duration::from_millis(200);

/// A wrapped request primitive that feeds responses to a tap.
pub trait RequestHook: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Returns true if the primitive still routes responses to `tap`.
    fn is_installed(&self, tap: &Arc<ResponseTap>) -> bool;

    /// (Re)wraps the primitive so responses reach `tap`.
    fn install(&self, tap: Arc<ResponseTap>);
}

/// Platform services the layer may need on install.
pub trait HostCapabilities: Send + Sync {
    /// Removes background workers that would fetch outside the hooks.
    /// Returns how many were removed.
    fn unregister_background_sync(&self) -> usize;
}

/// Installs hooks and keeps them installed.
pub struct InterceptionLayer {
    tap: Arc<ResponseTap>,
    hooks: Vec<Arc<dyn RequestHook>>,
    host: Option<Arc<dyn HostCapabilities>>,
    interval: Duration,
}

impl InterceptionLayer {
    /// Creates a layer with no hooks.
    pub fn new(tap: Arc<ResponseTap>) -> Self {
        Self {
            tap,
            hooks: Vec::new(),
            host: None,
            interval: SUPERVISE_INTERVAL,
        }
    }

    /// Adds a hook.
    #[must_use]
    pub fn with_hook(mut self, hook: Arc<dyn RequestHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Sets the host capabilities.
    #[must_use]
    pub fn with_host(mut self, host: Arc<dyn HostCapabilities>) -> Self {
        self.host = Some(host);
        self
    }

    /// Sets the supervision cadence.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Installs every hook and starts supervising.
    ///
    /// Supervision stops when the returned handle is dropped.
    pub fn install(self) -> InterceptionHandle {
        if self.tap.page() == Some(ProviderKind::ChatGpt) {
            if let Some(host) = &self.host {
                let removed = host.unregister_background_sync();
                debug!(removed, "Unregistered background sync workers");
            }
        }

        for hook in &self.hooks {
            hook.install(Arc::clone(&self.tap));
            debug!(hook = hook.name(), "Hook installed");
        }

        let task = tokio::spawn(supervise(self.tap, self.hooks, self.interval));
        InterceptionHandle { task }
    }
}

async fn supervise(tap: Arc<ResponseTap>, hooks: Vec<Arc<dyn RequestHook>>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        for hook in &hooks {
            if !hook.is_installed(&tap) {
                trace!(hook = hook.name(), "Hook clobbered, re-installing");
                hook.install(Arc::clone(&tap));
            }
        }
    }
}

/// Keeps supervision alive.
#[derive(Debug)]
pub struct InterceptionHandle {
    task: JoinHandle<()>,
}

impl InterceptionHandle {
    /// Returns true once supervision has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for InterceptionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Hook whose installation a page script can "clobber".
    #[derive(Default)]
    struct FakeHook {
        current: Mutex<Option<Arc<ResponseTap>>>,
        installs: AtomicUsize,
    }

    impl FakeHook {
        fn clobber(&self) {
            *self.current.lock().unwrap() = None;
        }

        fn installs(&self) -> usize {
            self.installs.load(Ordering::SeqCst)
        }
    }

    impl RequestHook for FakeHook {
        fn name(&self) -> &str {
            "fake"
        }

        fn is_installed(&self, tap: &Arc<ResponseTap>) -> bool {
            self.current
                .lock()
                .unwrap()
                .as_ref()
                .is_some_and(|t| Arc::ptr_eq(t, tap))
        }

        fn install(&self, tap: Arc<ResponseTap>) {
            *self.current.lock().unwrap() = Some(tap);
            self.installs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct FakeHost {
        calls: AtomicUsize,
    }

    impl HostCapabilities for FakeHost {
        fn unregister_background_sync(&self) -> usize {
            self.calls.fetch_add(1, Ordering::SeqCst);
            2
        }
    }

    fn tap(page: Option<ProviderKind>) -> Arc<ResponseTap> {
        Arc::new(ResponseTap::channel(page).0)
    }

    #[tokio::test(start_paused = true)]
    async fn test_reinstalls_clobbered_hook() {
        let hook = Arc::new(FakeHook::default());
        let handle = InterceptionLayer::new(tap(None))
            .with_hook(hook.clone())
            .install();
        assert_eq!(hook.installs(), 1);

        tokio::time::sleep(Duration::from_millis(450)).await;
        assert_eq!(hook.installs(), 1);

        hook.clobber();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(hook.installs(), 2);

        drop(handle);
        hook.clobber();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(hook.installs(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sync_only_on_chatgpt() {
        let host = Arc::new(FakeHost::default());
        let _chatgpt = InterceptionLayer::new(tap(Some(ProviderKind::ChatGpt)))
            .with_host(host.clone())
            .install();
        let _claude = InterceptionLayer::new(tap(Some(ProviderKind::Claude)))
            .with_host(host.clone())
            .install();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(host.calls.load(Ordering::SeqCst), 1);
    }
}
