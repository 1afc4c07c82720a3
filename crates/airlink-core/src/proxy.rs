// ── Staging proxy ──
//
// Buffers uncommitted property writes separately from the device's
// live state. Reads prefer staged values, so a caller that writes and
// immediately reads back observes its own pending edit -- and a refresh
// that lands mid-edit can never clobber it, because refresh only ever
// replaces the live state.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use airlink_device::{DeviceHandle, PropertyValue};

use crate::error::CoreError;

/// Write-staging wrapper around one device handle.
///
/// `get` / `set` are synchronous and never block on the network; they
/// touch only the staged map and the handle's live state. `refresh` and
/// `apply` delegate to the handle's network operations and are expected
/// to be serialized by the owning coordinator -- the proxy itself does
/// not hold the gate.
pub struct StagingProxy<D> {
    device: Arc<D>,
    staged: Mutex<HashMap<String, PropertyValue>>,
}

impl<D: DeviceHandle> StagingProxy<D> {
    pub fn new(device: Arc<D>) -> Self {
        Self {
            device,
            staged: Mutex::new(HashMap::new()),
        }
    }

    /// The wrapped device handle.
    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    /// Read a property: staged value if present, else the live value.
    ///
    /// `Ok(None)` means the property exists but the device has not
    /// reported a value for it yet.
    pub fn get(&self, name: &str) -> Result<Option<PropertyValue>, CoreError> {
        if let Some(value) = self.staged_lock().get(name) {
            return Ok(Some(value.clone()));
        }
        if !self.device.properties().contains(name) {
            return Err(CoreError::UnknownProperty { name: name.into() });
        }
        Ok(self.device.get_property(name))
    }

    /// Stage a property write. Validates fail-fast against the declared
    /// table; nothing is queued for unknown or read-only names.
    pub fn set(&self, name: &str, value: impl Into<PropertyValue>) -> Result<(), CoreError> {
        let value = value.into();
        self.validate_write(name, &value)?;
        self.staged_lock().insert(name.into(), value);
        Ok(())
    }

    /// Write straight onto the live state, bypassing the staging map.
    ///
    /// Values written this way are *not* protected from a concurrent
    /// refresh replacing them -- last network response wins. Exists for
    /// host actions that deliberately want that behavior.
    pub fn set_direct(&self, name: &str, value: impl Into<PropertyValue>) -> Result<(), CoreError> {
        let value = value.into();
        self.validate_write(name, &value)?;
        self.device.set_property(name, value)?;
        Ok(())
    }

    /// Pull live state from the appliance. The staged map is untouched,
    /// so pending edits survive the refresh.
    pub async fn refresh(&self) -> Result<(), CoreError> {
        self.device.refresh().await?;
        Ok(())
    }

    /// Flatten staged values onto the live state and commit.
    ///
    /// The staged map is snapshotted under a short lock; a `set` racing
    /// in after the snapshot keeps its entry and is deferred to the
    /// next apply. On commit failure the staged map is left intact so
    /// the caller can retry without redoing input.
    pub async fn apply(&self) -> Result<(), CoreError> {
        let snapshot: HashMap<String, PropertyValue> = self.staged_lock().clone();

        for (name, value) in &snapshot {
            self.device.set_property(name, value.clone())?;
        }

        self.device.commit().await?;

        // Clear exactly what was committed. An entry whose value changed
        // since the snapshot belongs to the next apply cycle.
        self.staged_lock()
            .retain(|name, value| snapshot.get(name) != Some(value));
        Ok(())
    }

    /// Number of pending, uncommitted writes.
    pub fn staged_len(&self) -> usize {
        self.staged_lock().len()
    }

    /// `true` if any write is pending.
    pub fn is_dirty(&self) -> bool {
        !self.staged_lock().is_empty()
    }

    fn validate_write(&self, name: &str, value: &PropertyValue) -> Result<(), CoreError> {
        let Some(desc) = self.device.properties().descriptor(name) else {
            return Err(CoreError::UnknownProperty { name: name.into() });
        };
        if !desc.is_writable() {
            return Err(CoreError::ReadOnlyProperty { name: name.into() });
        }
        if desc.kind != value.kind() {
            return Err(CoreError::InvalidValue {
                name: name.into(),
                expected: desc.kind,
                got: value.kind(),
            });
        }
        Ok(())
    }

    /// Short-lived lock on the staged map. Poisoning is recoverable:
    /// the map is plain data.
    fn staged_lock(&self) -> MutexGuard<'_, HashMap<String, PropertyValue>> {
        self.staged.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
