// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core data types for tapline.
//!
//! This module provides the transport-agnostic data model shared by the
//! session, subscription, and historian layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// NodeRef
// =============================================================================

/// A reference to an addressable data point in the server's address space.
///
/// The `id` is the server-scoped identifier (an opaque string such as
/// `ns=2;s=Plant.Line1.Temperature`); the optional `browse_name` is the
/// human-readable name returned by browse operations. A `NodeRef` is
/// immutable once obtained.
///
/// # Examples
///
/// ```
/// use tapline_core::types::NodeRef;
///
/// let node = NodeRef::new("ns=2;s=Temperature");
/// assert_eq!(node.id(), "ns=2;s=Temperature");
/// assert!(node.browse_name().is_none());
///
/// let named = NodeRef::with_browse_name("ns=2;s=Temperature", "Temperature");
/// assert_eq!(named.browse_name(), Some("Temperature"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    /// Server-scoped node identifier.
    id: String,

    /// Human-readable browse name, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    browse_name: Option<String>,
}

impl NodeRef {
    /// Creates a node reference from an identifier.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            browse_name: None,
        }
    }

    /// Creates a node reference with a browse name.
    pub fn with_browse_name(id: impl Into<String>, browse_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            browse_name: Some(browse_name.into()),
        }
    }

    /// Returns the node identifier.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the browse name, if known.
    #[inline]
    pub fn browse_name(&self) -> Option<&str> {
        self.browse_name.as_deref()
    }

    /// Consumes the reference and returns the identifier.
    #[inline]
    pub fn into_id(self) -> String {
        self.id
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.browse_name {
            Some(name) => write!(f, "{} ({})", self.id, name),
            None => write!(f, "{}", self.id),
        }
    }
}

impl From<String> for NodeRef {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl From<&str> for NodeRef {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

// =============================================================================
// TagValue
// =============================================================================

/// A dynamically typed node value.
///
/// The variant set is intentionally small: the server-side type zoo is
/// collapsed at the transport boundary so that everything downstream
/// (buffering, persistence, queries) deals with five shapes only.
///
/// # Examples
///
/// ```
/// use tapline_core::types::TagValue;
///
/// let temp = TagValue::Float(25.5);
/// assert_eq!(temp.as_f64(), Some(25.5));
/// assert_eq!(temp.type_name(), "float");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum TagValue {
    /// Signed 64-bit integer.
    Int(i64),

    /// 64-bit floating point.
    Float(f64),

    /// UTF-8 string.
    #[serde(rename = "string")]
    Str(String),

    /// Boolean value.
    Bool(bool),

    /// Null/undefined value.
    Null,
}

impl TagValue {
    /// Returns the type name of this value.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        match self {
            TagValue::Int(_) => "int",
            TagValue::Float(_) => "float",
            TagValue::Str(_) => "string",
            TagValue::Bool(_) => "bool",
            TagValue::Null => "null",
        }
    }

    /// Returns `true` if this is a null value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, TagValue::Null)
    }

    /// Returns `true` if this is a numeric value (integer or float).
    #[inline]
    pub fn is_numeric(&self) -> bool {
        matches!(self, TagValue::Int(_) | TagValue::Float(_))
    }

    /// Attempts to convert this value to an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            TagValue::Int(v) => Some(*v),
            TagValue::Float(v) => Some(*v as i64),
            TagValue::Bool(v) => Some(if *v { 1 } else { 0 }),
            _ => None,
        }
    }

    /// Attempts to convert this value to an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Int(v) => Some(*v as f64),
            TagValue::Float(v) => Some(*v),
            TagValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Attempts to get this value as a string reference.
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            TagValue::Str(v) => Some(v),
            _ => None,
        }
    }

    /// Attempts to convert this value to a boolean.
    #[inline]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            TagValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Converts this value to a plain JSON scalar.
    ///
    /// This is the untagged shape (`42`, `1.5`, `"text"`, `true`,
    /// `null`) used at the transport boundary; persistence uses the
    /// tagged serde form instead.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            TagValue::Int(v) => serde_json::json!(*v),
            TagValue::Float(v) => serde_json::json!(*v),
            TagValue::Str(v) => serde_json::Value::String(v.clone()),
            TagValue::Bool(v) => serde_json::Value::Bool(*v),
            TagValue::Null => serde_json::Value::Null,
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Int(v) => write!(f, "{}", v),
            TagValue::Float(v) => write!(f, "{}", v),
            TagValue::Str(v) => write!(f, "{}", v),
            TagValue::Bool(v) => write!(f, "{}", v),
            TagValue::Null => write!(f, "null"),
        }
    }
}

impl Default for TagValue {
    fn default() -> Self {
        TagValue::Null
    }
}

macro_rules! impl_from_int_for_tag_value {
    ($type:ty) => {
        impl From<$type> for TagValue {
            fn from(v: $type) -> Self {
                TagValue::Int(v as i64)
            }
        }
    };
}

impl_from_int_for_tag_value!(i8);
impl_from_int_for_tag_value!(i16);
impl_from_int_for_tag_value!(i32);
impl_from_int_for_tag_value!(i64);
impl_from_int_for_tag_value!(u8);
impl_from_int_for_tag_value!(u16);
impl_from_int_for_tag_value!(u32);

impl From<f32> for TagValue {
    fn from(v: f32) -> Self {
        TagValue::Float(v as f64)
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        TagValue::Float(v)
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        TagValue::Bool(v)
    }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self {
        TagValue::Str(v)
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        TagValue::Str(v.to_string())
    }
}

// =============================================================================
// ChangeRecord
// =============================================================================

/// A single normalized change notification.
///
/// This is the canonical record flowing from the subscription dispatcher
/// into the historian pipeline and out to storage sinks.
///
/// `observed_time` is assigned locally at normalization and is always
/// present. `source_time` and `server_time` come from the server and may
/// be absent; consumers that need a single timestamp should use
/// [`ChangeRecord::best_time`].
///
/// # Examples
///
/// ```
/// use tapline_core::types::{ChangeRecord, TagValue};
///
/// let record = ChangeRecord::new("ns=2;s=Temperature", TagValue::Float(25.5));
/// assert_eq!(record.node_id, "ns=2;s=Temperature");
/// assert!(record.source_time.is_none());
/// assert_eq!(record.best_time(), record.observed_time);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Identifier of the node that changed.
    pub node_id: String,

    /// The new value.
    pub value: TagValue,

    /// Timestamp assigned by the data source, if provided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_time: Option<DateTime<Utc>>,

    /// Timestamp assigned by the server, if provided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_time: Option<DateTime<Utc>>,

    /// Timestamp assigned locally when the notification was normalized.
    pub observed_time: DateTime<Utc>,
}

impl ChangeRecord {
    /// Creates a record with the current observation timestamp.
    pub fn new(node_id: impl Into<String>, value: TagValue) -> Self {
        Self {
            node_id: node_id.into(),
            value,
            source_time: None,
            server_time: None,
            observed_time: Utc::now(),
        }
    }

    /// Sets the source timestamp.
    pub fn with_source_time(mut self, ts: DateTime<Utc>) -> Self {
        self.source_time = Some(ts);
        self
    }

    /// Sets the server timestamp.
    pub fn with_server_time(mut self, ts: DateTime<Utc>) -> Self {
        self.server_time = Some(ts);
        self
    }

    /// Sets the observation timestamp explicitly.
    pub fn with_observed_time(mut self, ts: DateTime<Utc>) -> Self {
        self.observed_time = ts;
        self
    }

    /// Returns the most authoritative available timestamp.
    ///
    /// Preference order: source, then server, then local observation.
    pub fn best_time(&self) -> DateTime<Utc> {
        self.source_time
            .or(self.server_time)
            .unwrap_or(self.observed_time)
    }

    /// Returns the age of this record relative to its observation time.
    #[inline]
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.observed_time
    }
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {} @ {}",
            self.node_id,
            self.value,
            self.best_time().format("%Y-%m-%d %H:%M:%S%.3f")
        )
    }
}

// =============================================================================
// SessionState
// =============================================================================

/// The lifecycle state of a server session.
///
/// Exactly one transport handle is live per session at a time; replacing
/// it (any transition through `Connecting`/`Reconnecting` back to
/// `Connected`) invalidates all subscription handles issued before the
/// replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No transport handle is held.
    #[default]
    Disconnected,

    /// A first connection attempt is in progress.
    Connecting,

    /// A transport handle is live and usable.
    Connected,

    /// The liveness monitor is replacing a dead handle.
    Reconnecting,
}

impl SessionState {
    /// Returns `true` if a usable transport handle is held.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, SessionState::Connected)
    }

    /// Returns `true` if a connection attempt is in progress.
    #[inline]
    pub fn is_transitioning(&self) -> bool {
        matches!(self, SessionState::Connecting | SessionState::Reconnecting)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Disconnected => write!(f, "Disconnected"),
            SessionState::Connecting => write!(f, "Connecting"),
            SessionState::Connected => write!(f, "Connected"),
            SessionState::Reconnecting => write!(f, "Reconnecting"),
        }
    }
}

// =============================================================================
// SecuritySettings
// =============================================================================

/// Transport security configuration.
///
/// All three fields must be present for the settings to be applied; an
/// incomplete triple is ignored by the session layer (with a warning)
/// rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecuritySettings {
    /// Security policy name (e.g. `Basic256Sha256`).
    pub policy: String,

    /// Path to the client certificate.
    pub certificate_path: String,

    /// Path to the client private key.
    pub private_key_path: String,
}

impl SecuritySettings {
    /// Creates security settings from a full triple.
    pub fn new(
        policy: impl Into<String>,
        certificate_path: impl Into<String>,
        private_key_path: impl Into<String>,
    ) -> Self {
        Self {
            policy: policy.into(),
            certificate_path: certificate_path.into(),
            private_key_path: private_key_path.into(),
        }
    }
}

impl fmt::Display for SecuritySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Paths are omitted; they may embed usernames or deploy layout.
        write!(f, "policy={}", self.policy)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_ref() {
        let node = NodeRef::new("ns=2;s=Pressure");
        assert_eq!(node.id(), "ns=2;s=Pressure");
        assert!(node.browse_name().is_none());
        assert_eq!(format!("{}", node), "ns=2;s=Pressure");

        let named = NodeRef::with_browse_name("ns=2;i=1001", "Pressure");
        assert_eq!(named.browse_name(), Some("Pressure"));
        assert_eq!(format!("{}", named), "ns=2;i=1001 (Pressure)");
    }

    #[test]
    fn test_node_ref_from_str() {
        let node: NodeRef = "ns=0;i=85".into();
        assert_eq!(node.id(), "ns=0;i=85");
    }

    #[test]
    fn test_tag_value_type_names() {
        assert_eq!(TagValue::Int(42).type_name(), "int");
        assert_eq!(TagValue::Float(3.5).type_name(), "float");
        assert_eq!(TagValue::Str("x".into()).type_name(), "string");
        assert_eq!(TagValue::Bool(true).type_name(), "bool");
        assert_eq!(TagValue::Null.type_name(), "null");
    }

    #[test]
    fn test_tag_value_conversions() {
        assert_eq!(TagValue::Int(42).as_i64(), Some(42));
        assert_eq!(TagValue::Int(42).as_f64(), Some(42.0));
        assert_eq!(TagValue::Float(2.5).as_f64(), Some(2.5));
        assert_eq!(TagValue::Bool(true).as_i64(), Some(1));
        assert_eq!(TagValue::Str("x".into()).as_str(), Some("x"));
        assert_eq!(TagValue::Null.as_i64(), None);
        assert!(TagValue::Int(1).is_numeric());
        assert!(!TagValue::Str("1".into()).is_numeric());
    }

    #[test]
    fn test_tag_value_from() {
        let v: TagValue = 42i32.into();
        assert!(matches!(v, TagValue::Int(42)));

        let v: TagValue = 3.5f64.into();
        assert!(matches!(v, TagValue::Float(_)));

        let v: TagValue = "hello".into();
        assert!(matches!(v, TagValue::Str(_)));

        let v: TagValue = true.into();
        assert!(matches!(v, TagValue::Bool(true)));
    }

    #[test]
    fn test_tag_value_serde_tagged() {
        let json = serde_json::to_string(&TagValue::Int(7)).unwrap();
        assert_eq!(json, r#"{"type":"int","value":7}"#);

        let back: TagValue = serde_json::from_str(r#"{"type":"float","value":1.5}"#).unwrap();
        assert_eq!(back, TagValue::Float(1.5));
    }

    #[test]
    fn test_tag_value_to_json_is_plain_scalar() {
        assert_eq!(TagValue::Int(-3).to_json(), serde_json::json!(-3));
        assert_eq!(TagValue::Float(0.25).to_json(), serde_json::json!(0.25));
        assert_eq!(TagValue::Str("abc".into()).to_json(), serde_json::json!("abc"));
        assert_eq!(TagValue::Bool(false).to_json(), serde_json::json!(false));
        assert_eq!(TagValue::Null.to_json(), serde_json::Value::Null);
    }

    #[test]
    fn test_change_record_timestamps() {
        let record = ChangeRecord::new("n1", TagValue::Int(1));
        assert!(record.source_time.is_none());
        assert!(record.server_time.is_none());
        assert_eq!(record.best_time(), record.observed_time);

        let source = Utc::now() - chrono::Duration::seconds(10);
        let server = Utc::now() - chrono::Duration::seconds(5);

        let record = ChangeRecord::new("n1", TagValue::Int(1)).with_server_time(server);
        assert_eq!(record.best_time(), server);

        let record = ChangeRecord::new("n1", TagValue::Int(1))
            .with_source_time(source)
            .with_server_time(server);
        assert_eq!(record.best_time(), source);
    }

    #[test]
    fn test_change_record_display() {
        let record = ChangeRecord::new("ns=2;s=Temp", TagValue::Float(21.5));
        let text = format!("{}", record);
        assert!(text.starts_with("ns=2;s=Temp = 21.5 @ "));
    }

    #[test]
    fn test_session_state() {
        assert!(SessionState::Connected.is_connected());
        assert!(!SessionState::Disconnected.is_connected());
        assert!(SessionState::Connecting.is_transitioning());
        assert!(SessionState::Reconnecting.is_transitioning());
        assert!(!SessionState::Connected.is_transitioning());
        assert_eq!(SessionState::default(), SessionState::Disconnected);
    }

    #[test]
    fn test_security_settings_display_hides_paths() {
        let settings = SecuritySettings::new("Basic256Sha256", "/etc/pki/cert.der", "/etc/pki/key.pem");
        let text = format!("{}", settings);
        assert!(text.contains("Basic256Sha256"));
        assert!(!text.contains("/etc/pki"));
    }
}
