// airlink-device: Typed property surface and handle contract for LAN appliances.

pub mod error;
pub mod handle;
pub mod property;
pub mod sim;

// ── Primary re-exports ──────────────────────────────────────────────
pub use error::DeviceError;
pub use handle::DeviceHandle;
pub use property::{Access, PropertyDescriptor, PropertyKind, PropertyTable, PropertyValue};
pub use sim::SimulatedDevice;
