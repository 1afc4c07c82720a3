// ── Update coordinator ──
//
// Owns the single serialization point for all network operations
// against one device. Runs the periodic refresh loop, debounces
// on-demand refresh requests, pushes staged writes, and tracks
// reference-counted feature toggles.

use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use airlink_device::DeviceHandle;

use crate::config::CoordinatorConfig;
use crate::debounce::Debouncer;
use crate::error::CoreError;
use crate::proxy::StagingProxy;

/// Per-device coordinator.
///
/// Cheaply cloneable via `Arc`. The internal gate guarantees that at
/// most one network operation (refresh or commit) is ever in flight
/// against the handle; proxy reads and staged writes never wait on it.
pub struct Coordinator<D: DeviceHandle> {
    inner: Arc<Inner<D>>,
}

impl<D: DeviceHandle> Clone for Coordinator<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<D: DeviceHandle> {
    config: CoordinatorConfig,
    proxy: StagingProxy<D>,

    /// The one serialization primitive for network I/O on this device.
    gate: Mutex<()>,

    available: watch::Sender<bool>,
    last_refresh: watch::Sender<Option<DateTime<Utc>>>,

    energy_sensors: StdMutex<u32>,

    debounce: Debouncer,
    refresh_rx: Mutex<Option<mpsc::UnboundedReceiver<()>>>,

    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<D: DeviceHandle> Inner<D> {
    fn energy_sensors_lock(&self) -> MutexGuard<'_, u32> {
        self.energy_sensors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<D: DeviceHandle> Coordinator<D> {
    /// Create a coordinator owning the staging proxy for `device`.
    /// Does not poll until [`start()`](Self::start) is called.
    pub fn new(device: Arc<D>, config: CoordinatorConfig) -> Self {
        let (available, _) = watch::channel(false);
        let (last_refresh, _) = watch::channel(None);
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        // Debounced requests land on the channel; the polling loop
        // turns each one into an actual refresh.
        let debounce = Debouncer::new(config.debounce_cooldown, cancel.child_token(), move || {
            let _ = refresh_tx.send(());
        });

        Self {
            inner: Arc::new(Inner {
                config,
                proxy: StagingProxy::new(device),
                gate: Mutex::new(()),
                available,
                last_refresh,
                energy_sensors: StdMutex::new(0),
                debounce,
                refresh_rx: Mutex::new(Some(refresh_rx)),
                cancel,
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// The staging proxy for this device. All property reads and staged
    /// writes go through here.
    pub fn proxy(&self) -> &StagingProxy<D> {
        &self.inner.proxy
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the polling loop. Subsequent calls are no-ops.
    pub async fn start(&self) {
        let Some(rx) = self.inner.refresh_rx.lock().await.take() else {
            return;
        };

        let coordinator = self.clone();
        let cancel = self.inner.cancel.clone();
        let interval = self.inner.config.refresh_interval;
        let handle = tokio::spawn(poll_task(coordinator, rx, interval, cancel));
        self.inner.tasks.lock().await.push(handle);

        info!(device = %self.inner.proxy.device().id(), "coordinator started");
    }

    /// Stop polling. Cancels any pending debounce timer and joins the
    /// polling loop; an in-flight network operation is allowed to
    /// finish.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        self.inner.debounce.cancel();

        let mut tasks = self.inner.tasks.lock().await;
        for handle in tasks.drain(..) {
            let _ = handle.await;
        }

        debug!(device = %self.inner.proxy.device().id(), "coordinator stopped");
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Refresh live state now, serialized through the gate and bounded
    /// by the network timeout. Updates availability either way.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        let result = {
            let _gate = self.inner.gate.lock().await;
            bounded(self.inner.config.network_timeout, self.inner.proxy.refresh()).await
        };

        match &result {
            Ok(()) => {
                // send_replace: the value must stick even when nobody
                // subscribed, since is_available()/last_refresh() read
                // it back through borrow().
                self.inner.available.send_replace(true);
                self.inner.last_refresh.send_replace(Some(Utc::now()));
                debug!(device = %self.inner.proxy.device().id(), "refresh complete");
            }
            Err(err) => {
                self.inner.available.send_replace(false);
                debug!(device = %self.inner.proxy.device().id(), error = %err, "refresh failed");
            }
        }
        result
    }

    /// Request a refresh soon. Rapid repeated calls within the cooldown
    /// window collapse into a single refresh. Requires
    /// [`start()`](Self::start) to have been called; failures surface
    /// as unavailability, not as an error to the requester.
    pub fn request_refresh(&self) {
        self.inner.debounce.request();
    }

    // ── Apply ────────────────────────────────────────────────────────

    /// Push staged writes to the device, then schedule a refresh so
    /// observers re-synchronize with the just-written state. Errors
    /// propagate to the caller; staged writes survive a failed commit.
    pub async fn apply(&self) -> Result<(), CoreError> {
        {
            let _gate = self.inner.gate.lock().await;
            bounded(self.inner.config.network_timeout, self.inner.proxy.apply()).await?;
        }

        self.request_refresh();
        Ok(())
    }

    // ── Availability ─────────────────────────────────────────────────

    /// `true` if the last refresh cycle succeeded and the handle still
    /// reports the device online.
    pub fn is_available(&self) -> bool {
        *self.inner.available.borrow() && self.inner.proxy.device().is_online()
    }

    /// Watch availability transitions driven by refresh outcomes.
    pub fn subscribe_availability(&self) -> watch::Receiver<bool> {
        self.inner.available.subscribe()
    }

    /// When the last successful refresh completed.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_refresh.borrow()
    }

    /// Age of the live state, or `None` if never refreshed.
    pub fn data_age(&self) -> Option<chrono::Duration> {
        self.last_refresh().map(|t| Utc::now() - t)
    }

    // ── Energy telemetry reference counting ──────────────────────────

    /// Record that a consumer wants energy telemetry. The first
    /// registration enables the expensive request on the handle.
    pub fn register_energy_sensor(&self) -> Result<(), CoreError> {
        if !self.inner.proxy.device().supports_energy_telemetry() {
            return Err(CoreError::UnsupportedFeature {
                feature: "energy telemetry".into(),
            });
        }

        let mut count = self.inner.energy_sensors_lock();
        *count += 1;
        if *count == 1 {
            self.inner.proxy.device().set_energy_telemetry(true);
            debug!(device = %self.inner.proxy.device().id(), "energy telemetry enabled");
        }
        Ok(())
    }

    /// Record that a consumer no longer wants energy telemetry. The
    /// last unregistration disables the expensive request.
    ///
    /// # Panics
    ///
    /// Panics if called with no registrations outstanding -- that is an
    /// unbalanced register/unregister pair in the caller, and clamping
    /// would only mask it.
    pub fn unregister_energy_sensor(&self) {
        let mut count = self.inner.energy_sensors_lock();
        assert!(
            *count > 0,
            "unregister_energy_sensor called with no registered sensors"
        );
        *count -= 1;
        if *count == 0 {
            self.inner.proxy.device().set_energy_telemetry(false);
            debug!(device = %self.inner.proxy.device().id(), "energy telemetry disabled");
        }
    }
}

/// Run a network operation under the configured time bound. The gate
/// guard held by the caller drops normally on the timeout path, so the
/// gate can never stay held by a hung connection.
async fn bounded<F>(timeout: Duration, op: F) -> Result<(), CoreError>
where
    F: Future<Output = Result<(), CoreError>>,
{
    match tokio::time::timeout(timeout, op).await {
        Ok(result) => result,
        Err(_) => Err(CoreError::Timeout {
            timeout_secs: timeout.as_secs(),
        }),
    }
}

/// The polling loop: a periodic tick plus debounced on-demand requests,
/// both funneled through `Coordinator::refresh`. Scheduled failures are
/// logged and reflected in availability; the loop itself survives.
async fn poll_task<D: DeviceHandle>(
    coordinator: Coordinator<D>,
    mut on_demand: mpsc::UnboundedReceiver<()>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let periodic = !interval.is_zero();
    let mut ticker = tokio::time::interval(if periodic {
        interval
    } else {
        Duration::from_secs(3600)
    });
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick(), if periodic => {
                if let Err(err) = coordinator.refresh().await {
                    warn!(
                        device = %coordinator.inner.proxy.device().id(),
                        error = %err,
                        "periodic refresh failed"
                    );
                }
            }
            request = on_demand.recv() => {
                let Some(()) = request else { break };
                if let Err(err) = coordinator.refresh().await {
                    warn!(
                        device = %coordinator.inner.proxy.device().id(),
                        error = %err,
                        "requested refresh failed"
                    );
                }
            }
        }
    }
}
