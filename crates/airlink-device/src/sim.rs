// ── Simulated device ──
//
// An in-memory `DeviceHandle` with scripted refresh results, fault
// injection, and adjustable latency. Stands in for a real protocol
// stack in tests and demos. The in-flight counter exists so tests can
// prove that callers never overlap network operations on one handle.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use tracing::debug;

use crate::error::DeviceError;
use crate::handle::DeviceHandle;
use crate::property::{PropertyTable, PropertyValue};

/// In-memory appliance simulator.
///
/// Live state lives in a `DashMap`; `refresh` applies the next scripted
/// observation (if any) after the configured latency, `commit` just
/// burns latency. Both honor one-shot injected failures.
pub struct SimulatedDevice {
    id: String,
    table: PropertyTable,
    live: DashMap<String, PropertyValue>,
    online: AtomicBool,
    telemetry_supported: bool,
    telemetry_enabled: AtomicBool,

    refresh_latency: Mutex<Duration>,
    commit_latency: Mutex<Duration>,
    scripted_refreshes: Mutex<VecDeque<Vec<(String, PropertyValue)>>>,
    next_refresh_error: Mutex<Option<DeviceError>>,
    next_commit_error: Mutex<Option<DeviceError>>,

    refresh_count: AtomicU64,
    commit_count: AtomicU64,
    in_flight: AtomicU64,
    max_in_flight: AtomicU64,
}

impl SimulatedDevice {
    pub fn new(id: impl Into<String>, table: PropertyTable) -> Self {
        Self {
            id: id.into(),
            table,
            live: DashMap::new(),
            online: AtomicBool::new(true),
            telemetry_supported: true,
            telemetry_enabled: AtomicBool::new(false),
            refresh_latency: Mutex::new(Duration::ZERO),
            commit_latency: Mutex::new(Duration::ZERO),
            scripted_refreshes: Mutex::new(VecDeque::new()),
            next_refresh_error: Mutex::new(None),
            next_commit_error: Mutex::new(None),
            refresh_count: AtomicU64::new(0),
            commit_count: AtomicU64::new(0),
            in_flight: AtomicU64::new(0),
            max_in_flight: AtomicU64::new(0),
        }
    }

    /// A device whose model lacks energy telemetry entirely.
    pub fn without_telemetry(id: impl Into<String>, table: PropertyTable) -> Self {
        Self {
            telemetry_supported: false,
            ..Self::new(id, table)
        }
    }

    // ── Test scripting ──────────────────────────────────────────────

    /// Seed a live value directly, bypassing writability checks. Models
    /// state the appliance reported before we ever connected.
    pub fn seed(&self, name: impl Into<String>, value: impl Into<PropertyValue>) {
        self.live.insert(name.into(), value.into());
    }

    /// Queue the property values observed by the next `refresh`.
    pub fn push_refresh_state(&self, observed: Vec<(String, PropertyValue)>) {
        lock(&self.scripted_refreshes).push_back(observed);
    }

    pub fn fail_next_refresh(&self, err: DeviceError) {
        *lock(&self.next_refresh_error) = Some(err);
    }

    pub fn fail_next_commit(&self, err: DeviceError) {
        *lock(&self.next_commit_error) = Some(err);
    }

    pub fn set_refresh_latency(&self, latency: Duration) {
        *lock(&self.refresh_latency) = latency;
    }

    pub fn set_commit_latency(&self, latency: Duration) {
        *lock(&self.commit_latency) = latency;
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    // ── Probes ──────────────────────────────────────────────────────

    /// Completed refresh operations.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::SeqCst)
    }

    /// Completed commit operations.
    pub fn commit_count(&self) -> u64 {
        self.commit_count.load(Ordering::SeqCst)
    }

    /// Highest number of network operations ever observed in flight at
    /// once. Anything above 1 means the caller broke serialization.
    pub fn max_in_flight(&self) -> u64 {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn telemetry_enabled(&self) -> bool {
        self.telemetry_enabled.load(Ordering::SeqCst)
    }

    // ── Internals ───────────────────────────────────────────────────

    fn begin_op(&self) -> OpGuard<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        OpGuard(self)
    }
}

/// Decrements the in-flight counter even when an operation future is
/// dropped mid-await (e.g. the caller timed out).
struct OpGuard<'a>(&'a SimulatedDevice);

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

impl DeviceHandle for SimulatedDevice {
    fn id(&self) -> &str {
        &self.id
    }

    fn properties(&self) -> &PropertyTable {
        &self.table
    }

    fn get_property(&self, name: &str) -> Option<PropertyValue> {
        self.live.get(name).map(|entry| entry.value().clone())
    }

    fn set_property(&self, name: &str, value: PropertyValue) -> Result<(), DeviceError> {
        let Some(desc) = self.table.descriptor(name) else {
            return Err(DeviceError::UnknownProperty { name: name.into() });
        };
        if !desc.is_writable() {
            return Err(DeviceError::ReadOnlyProperty { name: name.into() });
        }
        if desc.kind != value.kind() {
            return Err(DeviceError::TypeMismatch {
                name: name.into(),
                expected: desc.kind,
                got: value.kind(),
            });
        }
        self.live.insert(name.into(), value);
        Ok(())
    }

    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn supports_energy_telemetry(&self) -> bool {
        self.telemetry_supported
    }

    fn set_energy_telemetry(&self, enabled: bool) {
        self.telemetry_enabled.store(enabled, Ordering::SeqCst);
    }

    async fn refresh(&self) -> Result<(), DeviceError> {
        let _guard = self.begin_op();

        let latency = *lock(&self.refresh_latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if let Some(err) = lock(&self.next_refresh_error).take() {
            debug!(device = %self.id, error = %err, "simulated refresh failure");
            return Err(err);
        }

        if let Some(observed) = lock(&self.scripted_refreshes).pop_front() {
            for (name, value) in observed {
                self.live.insert(name, value);
            }
        }

        self.refresh_count.fetch_add(1, Ordering::SeqCst);
        debug!(device = %self.id, "simulated refresh complete");
        Ok(())
    }

    async fn commit(&self) -> Result<(), DeviceError> {
        let _guard = self.begin_op();

        let latency = *lock(&self.commit_latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if let Some(err) = lock(&self.next_commit_error).take() {
            debug!(device = %self.id, error = %err, "simulated commit failure");
            return Err(err);
        }

        self.commit_count.fetch_add(1, Ordering::SeqCst);
        debug!(device = %self.id, "simulated commit complete");
        Ok(())
    }
}

/// Poisoning only matters if a holder panicked; state here is plain
/// data, so recover the guard.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
