// ── Device handle contract ──
//
// The boundary between the coordination core and whatever protocol
// stack actually talks to the appliance. Implementations own the live
// property state and the network connection; the core only ever drives
// them through this trait.

use std::future::Future;

use crate::error::DeviceError;
use crate::property::{PropertyTable, PropertyValue};

/// A long-lived network-attached appliance.
///
/// Property reads and writes operate on the handle's *live* state and
/// are synchronous. `refresh` and `commit` are the only operations that
/// touch the network; both may block for a long time and may fail. The
/// caller is responsible for never running two network operations
/// concurrently against the same handle -- implementations are not
/// required to tolerate that.
pub trait DeviceHandle: Send + Sync + 'static {
    /// Stable identifier of the device, used for logging.
    fn id(&self) -> &str;

    /// The declared property set, resolved at setup time.
    fn properties(&self) -> &PropertyTable;

    /// Read a property from the live state.
    ///
    /// Returns `None` for names outside the table, and for known
    /// properties the device has not reported a value for yet.
    fn get_property(&self, name: &str) -> Option<PropertyValue>;

    /// Write a property onto the live state. No network I/O; the value
    /// reaches the appliance on the next `commit`.
    fn set_property(&self, name: &str, value: PropertyValue) -> Result<(), DeviceError>;

    /// Whether the device responded to its most recent network operation.
    fn is_online(&self) -> bool;

    /// Whether this model can report energy telemetry at all.
    fn supports_energy_telemetry(&self) -> bool;

    /// Toggle the expensive energy-telemetry request on future refreshes.
    fn set_energy_telemetry(&self, enabled: bool);

    /// Pull live state from the appliance over the network.
    fn refresh(&self) -> impl Future<Output = Result<(), DeviceError>> + Send;

    /// Push the full live state to the appliance over the network.
    fn commit(&self) -> impl Future<Output = Result<(), DeviceError>> + Send;
}
