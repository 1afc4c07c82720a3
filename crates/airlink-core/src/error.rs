// ── Core error types ──
//
// User-facing errors from airlink-core. Consumers never see the device
// crate's transport errors directly; the `From<DeviceError>` impl
// translates them into domain-appropriate variants.

use airlink_device::{DeviceError, PropertyKind};
use thiserror::Error;

/// Unified error type for the coordination core.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Property errors (never retried) ─────────────────────────────
    #[error("Unknown property: {name}")]
    UnknownProperty { name: String },

    #[error("Property is read-only: {name}")]
    ReadOnlyProperty { name: String },

    #[error("Invalid value for {name}: expected {expected}, got {got}")]
    InvalidValue {
        name: String,
        expected: PropertyKind,
        got: PropertyKind,
    },

    // ── Feature errors (never retried) ──────────────────────────────
    #[error("Device does not support {feature}")]
    UnsupportedFeature { feature: String },

    // ── Network errors (recoverable) ────────────────────────────────
    #[error("Network failure: {reason}")]
    Network { reason: String },

    #[error("Device operation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Authentication (setup-time fatal) ───────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },
}

impl CoreError {
    /// Returns `true` if a later polling cycle may succeed without any
    /// caller intervention.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }
}

// ── Conversion from device-layer errors ─────────────────────────────

impl From<DeviceError> for CoreError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::UnknownProperty { name } => Self::UnknownProperty { name },
            DeviceError::ReadOnlyProperty { name } => Self::ReadOnlyProperty { name },
            DeviceError::TypeMismatch {
                name,
                expected,
                got,
            } => Self::InvalidValue {
                name,
                expected,
                got,
            },
            DeviceError::Network { reason } => Self::Network { reason },
            DeviceError::Protocol { message } => Self::Network {
                reason: format!("protocol error: {message}"),
            },
            DeviceError::Timeout { timeout_secs } => Self::Timeout { timeout_secs },
            DeviceError::Authentication { message } => Self::AuthenticationFailed { message },
        }
    }
}
