// ── Typed property surface ──
//
// Every device exposes a flat set of named properties. The set of names
// that exist, their value kinds, and whether each is writable vary by
// model and are resolved once at setup time by a capability query. The
// result is captured in a `PropertyTable` so that all later lookups are
// plain map lookups — no reflection, no dynamic attribute dispatch.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A property value as read from or written to a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
}

impl PropertyValue {
    /// The kind this value belongs to, for validation against a
    /// [`PropertyDescriptor`].
    pub fn kind(&self) -> PropertyKind {
        match self {
            Self::Bool(_) => PropertyKind::Bool,
            Self::Integer(_) => PropertyKind::Integer,
            Self::Decimal(_) => PropertyKind::Decimal,
            Self::Text(_) => PropertyKind::Text,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Decimal(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Decimal(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// The value kind a property is declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Bool,
    Integer,
    Decimal,
    Text,
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Text => "text",
        };
        f.write_str(name)
    }
}

/// Whether a property accepts writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    ReadOnly,
    ReadWrite,
}

/// Declared shape of a single property: its kind and access mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDescriptor {
    pub kind: PropertyKind,
    pub access: Access,
}

impl PropertyDescriptor {
    pub fn is_writable(&self) -> bool {
        self.access == Access::ReadWrite
    }
}

/// The full declared property set of one device instance.
///
/// Built once at setup from the device's resolved capabilities and then
/// treated as immutable. All existence and writability checks made by
/// higher layers go through this table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PropertyTable {
    entries: HashMap<String, PropertyDescriptor>,
}

impl PropertyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion, used while translating a capability set.
    pub fn with(mut self, name: impl Into<String>, kind: PropertyKind, access: Access) -> Self {
        self.entries
            .insert(name.into(), PropertyDescriptor { kind, access });
        self
    }

    pub fn descriptor(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// `false` for read-only properties *and* for unknown names.
    pub fn is_writable(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(PropertyDescriptor::is_writable)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn table() -> PropertyTable {
        PropertyTable::new()
            .with("target_temperature", PropertyKind::Decimal, Access::ReadWrite)
            .with("indoor_temperature", PropertyKind::Decimal, Access::ReadOnly)
            .with("power_state", PropertyKind::Bool, Access::ReadWrite)
    }

    #[test]
    fn value_kind_mapping() {
        assert_eq!(PropertyValue::from(true).kind(), PropertyKind::Bool);
        assert_eq!(PropertyValue::from(21_i64).kind(), PropertyKind::Integer);
        assert_eq!(PropertyValue::from(21.5).kind(), PropertyKind::Decimal);
        assert_eq!(PropertyValue::from("auto").kind(), PropertyKind::Text);
    }

    #[test]
    fn table_lookups() {
        let table = table();
        assert!(table.contains("target_temperature"));
        assert!(!table.contains("nonexistent"));

        assert!(table.is_writable("target_temperature"));
        assert!(!table.is_writable("indoor_temperature"));
        assert!(!table.is_writable("nonexistent"));

        let desc = table.descriptor("power_state").unwrap();
        assert_eq!(desc.kind, PropertyKind::Bool);
        assert_eq!(desc.access, Access::ReadWrite);
    }

    #[test]
    fn value_serializes_untagged() {
        let json = serde_json::to_string(&PropertyValue::from(21.5)).unwrap();
        assert_eq!(json, "21.5");

        let json = serde_json::to_string(&PropertyValue::from("cool")).unwrap();
        assert_eq!(json, "\"cool\"");
    }
}
