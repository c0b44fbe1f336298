// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built test data for consistent and reproducible testing.
//!
//! ## Design Principles
//!
//! - Fixtures are immutable and thread-safe
//! - Each fixture represents a realistic scenario
//! - Fixtures can be composed for complex test scenarios

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use tapline_client::SimTransport;
use tapline_core::types::{ChangeRecord, TagValue};
use tapline_store::HistoryPoint;

/// Converts a slice of string literals into owned node ids.
pub fn node_ids(ids: &[&str]) -> Vec<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

// =============================================================================
// Node Fixtures
// =============================================================================

/// Fixture providing standard node identifiers.
pub struct NodeFixtures;

impl NodeFixtures {
    /// A temperature measurement node.
    pub fn temperature() -> String {
        "ns=2;s=Line1.Temperature".to_string()
    }

    /// A pressure measurement node.
    pub fn pressure() -> String {
        "ns=2;s=Line1.Pressure".to_string()
    }

    /// A pump state node (boolean).
    pub fn pump_running() -> String {
        "ns=2;s=Line1.PumpRunning".to_string()
    }

    /// A production counter node (integer).
    pub fn counter() -> String {
        "ns=2;s=Line1.UnitsProduced".to_string()
    }

    /// Multiple node ids for batch testing.
    pub fn node_batch(count: usize) -> Vec<String> {
        (0..count)
            .map(|i| format!("ns=2;s=Batch.Tag{:04}", i))
            .collect()
    }

    /// Standard production-line node set.
    pub fn line_nodes() -> Vec<String> {
        vec![
            Self::temperature(),
            Self::pressure(),
            Self::pump_running(),
            Self::counter(),
        ]
    }
}

// =============================================================================
// Value Fixtures
// =============================================================================

/// Fixture providing various tag values.
pub struct ValueFixtures;

impl ValueFixtures {
    /// A typical temperature value (°C).
    pub fn temperature_celsius(value: f64) -> TagValue {
        TagValue::Float(value)
    }

    /// A boolean running/stopped state.
    pub fn running(active: bool) -> TagValue {
        TagValue::Bool(active)
    }

    /// An integer counter value.
    pub fn counter_value(count: i64) -> TagValue {
        TagValue::Int(count)
    }

    /// A text label value.
    pub fn label(text: &str) -> TagValue {
        TagValue::Str(text.to_string())
    }

    /// One value of every variant for comprehensive testing.
    pub fn value_variety() -> Vec<TagValue> {
        vec![
            TagValue::Int(-9876543210),
            TagValue::Float(2.718281828459045),
            TagValue::Str("test_string".to_string()),
            TagValue::Bool(true),
            TagValue::Null,
        ]
    }

    /// Edge case values for boundary testing.
    pub fn edge_case_values() -> Vec<TagValue> {
        vec![
            TagValue::Int(i64::MIN),
            TagValue::Int(i64::MAX),
            TagValue::Float(f64::MIN),
            TagValue::Float(f64::MAX),
            TagValue::Float(f64::EPSILON),
            TagValue::Float(f64::NAN),
            TagValue::Float(f64::INFINITY),
            TagValue::Float(f64::NEG_INFINITY),
            TagValue::Str(String::new()),
            TagValue::Str("a".repeat(10000)),
            TagValue::Null,
        ]
    }
}

// =============================================================================
// Record Fixtures
// =============================================================================

/// Fixture providing change records and history points.
pub struct RecordFixtures;

impl RecordFixtures {
    /// A record stamped only with its observation time.
    pub fn observed(node_id: &str, value: TagValue) -> ChangeRecord {
        ChangeRecord::new(node_id, value)
    }

    /// A record whose source, server, and observed times all match.
    pub fn timestamped(node_id: &str, value: TagValue, ts: DateTime<Utc>) -> ChangeRecord {
        ChangeRecord::new(node_id, value)
            .with_source_time(ts)
            .with_server_time(ts)
            .with_observed_time(ts)
    }

    /// A batch of records for one node, spaced one second apart.
    pub fn record_batch(node_id: &str, count: usize) -> Vec<ChangeRecord> {
        let start = Utc::now();
        (0..count)
            .map(|i| {
                let ts = start + chrono::Duration::seconds(i as i64);
                Self::timestamped(node_id, TagValue::Float(i as f64 * 1.5), ts)
            })
            .collect()
    }

    /// A history point at a whole-second UTC timestamp.
    pub fn point_at(node_id: &str, epoch_secs: i64, value: TagValue) -> HistoryPoint {
        let ts = Utc
            .timestamp_opt(epoch_secs, 0)
            .single()
            .expect("valid epoch seconds");
        HistoryPoint::new(node_id, ts, value)
    }

    /// A series of points for one node, `step_secs` apart, with the
    /// point index as the value.
    pub fn point_series(
        node_id: &str,
        start_secs: i64,
        count: usize,
        step_secs: i64,
    ) -> Vec<HistoryPoint> {
        (0..count)
            .map(|i| {
                Self::point_at(
                    node_id,
                    start_secs + i as i64 * step_secs,
                    TagValue::Int(i as i64),
                )
            })
            .collect()
    }
}

// =============================================================================
// Scenario Fixtures
// =============================================================================

/// Complete test scenarios combining multiple fixtures.
pub struct ScenarioFixtures;

impl ScenarioFixtures {
    /// A boiler monitoring scenario with four instrumented nodes.
    pub fn boiler_room() -> BoilerScenario {
        BoilerScenario {
            endpoint: "sim://boiler".to_string(),
            folder: "ns=2;s=Boiler".to_string(),
            temperature: "ns=2;s=Boiler.Temperature".to_string(),
            pressure: "ns=2;s=Boiler.Pressure".to_string(),
            setpoint: "ns=2;s=Boiler.Setpoint".to_string(),
            pump_running: "ns=2;s=Boiler.PumpRunning".to_string(),
        }
    }

    /// A substation metering scenario.
    pub fn substation() -> SubstationScenario {
        SubstationScenario {
            endpoint: "sim://substation".to_string(),
            folder: "ns=2;s=Feeder1".to_string(),
            voltage: "ns=2;s=Feeder1.Voltage".to_string(),
            current: "ns=2;s=Feeder1.Current".to_string(),
            active_power: "ns=2;s=Feeder1.ActivePower".to_string(),
            total_energy: "ns=2;s=Feeder1.TotalEnergy".to_string(),
        }
    }

    /// A flat farm of generated tags for volume testing.
    pub fn tag_farm(count: usize) -> TagFarmScenario {
        TagFarmScenario {
            endpoint: "sim://farm".to_string(),
            nodes: NodeFixtures::node_batch(count)
                .into_iter()
                .enumerate()
                .map(|(i, id)| (id, TagValue::Float(i as f64)))
                .collect(),
        }
    }
}

/// Boiler monitoring test scenario.
pub struct BoilerScenario {
    /// Simulated server endpoint.
    pub endpoint: String,
    /// Folder node grouping the instruments.
    pub folder: String,
    /// Boiler temperature node.
    pub temperature: String,
    /// Boiler pressure node.
    pub pressure: String,
    /// Temperature setpoint node.
    pub setpoint: String,
    /// Circulation pump state node.
    pub pump_running: String,
}

impl BoilerScenario {
    /// Seeds the scenario's address space onto a transport.
    pub fn seed(&self, transport: &SimTransport) {
        transport.add_node(None, &self.folder, "Boiler", TagValue::Null);
        transport.add_node(
            Some(&self.folder),
            &self.temperature,
            "Temperature",
            TagValue::Float(72.5),
        );
        transport.add_node(
            Some(&self.folder),
            &self.pressure,
            "Pressure",
            TagValue::Float(1.8),
        );
        transport.add_node(
            Some(&self.folder),
            &self.setpoint,
            "Setpoint",
            TagValue::Float(75.0),
        );
        transport.add_node(
            Some(&self.folder),
            &self.pump_running,
            "PumpRunning",
            TagValue::Bool(true),
        );
    }

    /// Builds a transport pre-seeded with this scenario.
    pub fn build_transport(&self) -> Arc<SimTransport> {
        let transport = Arc::new(SimTransport::new(self.endpoint.clone()));
        self.seed(&transport);
        transport
    }

    /// Returns the instrumented node ids (folder excluded).
    pub fn node_ids(&self) -> Vec<String> {
        vec![
            self.temperature.clone(),
            self.pressure.clone(),
            self.setpoint.clone(),
            self.pump_running.clone(),
        ]
    }
}

/// Substation metering test scenario.
pub struct SubstationScenario {
    /// Simulated server endpoint.
    pub endpoint: String,
    /// Folder node grouping the meters.
    pub folder: String,
    /// L1 voltage node.
    pub voltage: String,
    /// L1 current node.
    pub current: String,
    /// Active power node.
    pub active_power: String,
    /// Energy totalizer node.
    pub total_energy: String,
}

impl SubstationScenario {
    /// Seeds the scenario's address space onto a transport.
    pub fn seed(&self, transport: &SimTransport) {
        transport.add_node(None, &self.folder, "Feeder 1", TagValue::Null);
        transport.add_node(
            Some(&self.folder),
            &self.voltage,
            "Voltage",
            TagValue::Float(230.5),
        );
        transport.add_node(
            Some(&self.folder),
            &self.current,
            "Current",
            TagValue::Float(12.3),
        );
        transport.add_node(
            Some(&self.folder),
            &self.active_power,
            "ActivePower",
            TagValue::Float(2835.15),
        );
        transport.add_node(
            Some(&self.folder),
            &self.total_energy,
            "TotalEnergy",
            TagValue::Float(15678.9),
        );
    }

    /// Builds a transport pre-seeded with this scenario.
    pub fn build_transport(&self) -> Arc<SimTransport> {
        let transport = Arc::new(SimTransport::new(self.endpoint.clone()));
        self.seed(&transport);
        transport
    }

    /// Returns the metered node ids (folder excluded).
    pub fn node_ids(&self) -> Vec<String> {
        vec![
            self.voltage.clone(),
            self.current.clone(),
            self.active_power.clone(),
            self.total_energy.clone(),
        ]
    }
}

/// Generated tag-farm test scenario.
pub struct TagFarmScenario {
    /// Simulated server endpoint.
    pub endpoint: String,
    /// Node ids with their seed values.
    pub nodes: Vec<(String, TagValue)>,
}

impl TagFarmScenario {
    /// Seeds every generated tag under the root.
    pub fn seed(&self, transport: &SimTransport) {
        for (id, value) in &self.nodes {
            transport.add_node(None, id, id, value.clone());
        }
    }

    /// Builds a transport pre-seeded with this scenario.
    pub fn build_transport(&self) -> Arc<SimTransport> {
        let transport = Arc::new(SimTransport::new(self.endpoint.clone()));
        self.seed(&transport);
        transport
    }

    /// Returns the generated node ids.
    pub fn node_ids(&self) -> Vec<String> {
        self.nodes.iter().map(|(id, _)| id.clone()).collect()
    }
}

// =============================================================================
// Config Fixtures
// =============================================================================

/// Fixture providing configuration snippets.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// Minimal valid YAML configuration.
    pub fn minimal_yaml() -> &'static str {
        r#"
client:
  endpoint: sim://minimal

store:
  backend: memory
"#
    }

    /// Complete YAML configuration with all sections.
    pub fn complete_yaml() -> &'static str {
        r#"
client:
  endpoint: opc.tcp://plant.example:4840
  security:
    policy: Basic256Sha256
    certificate_path: certs/client.der
    private_key_path: certs/client.key
  auto_reconnect: true
  liveness_interval_secs: 10

historian:
  nodes:
    - "ns=2;s=Line1.Temperature"
    - "ns=2;s=Line1.Pressure"
  interval_ms: 500
  flush_interval_ms: 2000
  write_attempts: 5
  autostart: false

store:
  backend: sqlite
  url: sqlite://var/history.db

api:
  enabled: true
  bind_address: 127.0.0.1
  port: 9090
  cors:
    allowed_origins:
      - "https://ops.example"
  request_timeout_secs: 15

logging:
  level: debug
  format: json
  with_target: false
"#
    }

    /// Complete TOML configuration matching [`Self::complete_yaml`].
    pub fn complete_toml() -> &'static str {
        r#"
[client]
endpoint = "opc.tcp://plant.example:4840"
auto_reconnect = true
liveness_interval_secs = 10

[client.security]
policy = "Basic256Sha256"
certificate_path = "certs/client.der"
private_key_path = "certs/client.key"

[historian]
nodes = ["ns=2;s=Line1.Temperature", "ns=2;s=Line1.Pressure"]
interval_ms = 500
flush_interval_ms = 2000
write_attempts = 5
autostart = false

[store]
backend = "sqlite"
url = "sqlite://var/history.db"

[api]
enabled = true
bind_address = "127.0.0.1"
port = 9090
request_timeout_secs = 15

[api.cors]
allowed_origins = ["https://ops.example"]

[logging]
level = "debug"
format = "json"
with_target = false
"#
    }

    /// Invalid YAML configuration for error testing.
    pub fn invalid_yaml() -> &'static str {
        r#"
client:
  endpoint: [invalid yaml
  auto_reconnect: missing bracket
"#
    }

    /// Configuration that parses but fails validation.
    pub fn empty_endpoint_yaml() -> &'static str {
        r#"
client:
  endpoint: ""

store:
  backend: memory
"#
    }

    /// Configuration with a duplicate historian node.
    pub fn duplicate_nodes_yaml() -> &'static str {
        r#"
client:
  endpoint: sim://dupes

historian:
  nodes:
    - "ns=2;s=Line1.Temperature"
    - "ns=2;s=Line1.Temperature"

store:
  backend: memory
"#
    }
}
