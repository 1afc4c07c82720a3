use thiserror::Error;

use crate::property::PropertyKind;

/// Failure modes at the device boundary.
///
/// Covers both local validation (unknown names, read-only writes, kind
/// mismatches) and network I/O (refresh / commit). `airlink-core` maps
/// these into its own taxonomy -- consumers of the core never handle a
/// `DeviceError` directly.
#[derive(Debug, Error)]
pub enum DeviceError {
    // ── Property validation ─────────────────────────────────────────
    /// The device declares no property with this name.
    #[error("Unknown property: {name}")]
    UnknownProperty { name: String },

    /// The property exists but does not accept writes.
    #[error("Property is read-only: {name}")]
    ReadOnlyProperty { name: String },

    /// The written value does not match the declared kind.
    #[error("Type mismatch for {name}: expected {expected}, got {got}")]
    TypeMismatch {
        name: String,
        expected: PropertyKind,
        got: PropertyKind,
    },

    // ── Network I/O ─────────────────────────────────────────────────
    /// Transport failure (connection refused, reset, unreachable).
    #[error("Network error: {reason}")]
    Network { reason: String },

    /// The appliance answered with something the protocol layer could
    /// not make sense of.
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// A protocol stack's own deadline expired mid-operation. Distinct
    /// from the coordinator's outer bound, which covers handles that
    /// never report one.
    #[error("Operation timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Authentication ──────────────────────────────────────────────
    /// Credential handshake rejected. Fatal until credentials change.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },
}

impl DeviceError {
    /// Returns `true` if this is a transient failure worth retrying on
    /// a later polling cycle.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Protocol { .. } | Self::Timeout { .. }
        )
    }

    /// Returns `true` if this failure means credentials must be fixed
    /// before the device can be used at all.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }
}
