// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Saved-server registry.
//!
//! A small JSON document store of known servers and the node ids
//! watched on each, keyed by server name:
//!
//! ```json
//! {
//!   "servers": [
//!     { "name": "line1", "endpoint": "opc.tcp://plc:4840", "tags": ["t1"] }
//!   ]
//! }
//! ```
//!
//! Every mutation rewrites the whole document: the new content goes to
//! a temp file in the same directory and is renamed into place, so a
//! crash mid-write never leaves a truncated registry. A missing file
//! reads as an empty registry.

use crate::error::{ConfigError, ConfigResult};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tapline_core::types::SecuritySettings;
use tracing::debug;

// =============================================================================
// SavedServer
// =============================================================================

/// A saved server entry: endpoint identity plus its watched tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedServer {
    /// Unique server name, the registry key.
    pub name: String,

    /// Server endpoint URL.
    pub endpoint: String,

    /// Security triple to apply when connecting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecuritySettings>,

    /// Node ids watched on this server.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SavedServer {
    /// Creates an entry with no security settings and no tags.
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint: endpoint.into(),
            security: None,
            tags: Vec::new(),
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.name.is_empty() {
            return Err(ConfigError::validation("server.name", "cannot be empty"));
        }
        if self.endpoint.is_empty() {
            return Err(ConfigError::validation(
                "server.endpoint",
                "cannot be empty",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    servers: Vec<SavedServer>,
}

// =============================================================================
// ServerRegistry
// =============================================================================

/// File-backed registry of saved servers.
///
/// Each operation reads the current document, applies the change, and
/// writes the result back atomically. An in-process lock serializes
/// mutations so concurrent callers cannot lose each other's updates;
/// the registry is not meant to be shared between processes.
#[derive(Debug)]
pub struct ServerRegistry {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ServerRegistry {
    /// Creates a registry over the given JSON file.
    ///
    /// The file is created on the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lists all saved servers.
    pub fn list_servers(&self) -> ConfigResult<Vec<SavedServer>> {
        Ok(self.read_document()?.servers)
    }

    /// Returns a saved server by name.
    pub fn get_server(&self, name: &str) -> ConfigResult<Option<SavedServer>> {
        Ok(self
            .read_document()?
            .servers
            .into_iter()
            .find(|s| s.name == name))
    }

    /// Inserts or replaces a server entry, keyed by name.
    pub fn upsert_server(&self, server: SavedServer) -> ConfigResult<()> {
        server.validate()?;
        let _guard = self.write_lock.lock();

        let mut doc = self.read_document()?;
        match doc.servers.iter_mut().find(|s| s.name == server.name) {
            Some(existing) => *existing = server,
            None => doc.servers.push(server),
        }
        self.write_document(&doc)
    }

    /// Removes a server entry. Returns `false` when no entry existed.
    pub fn remove_server(&self, name: &str) -> ConfigResult<bool> {
        let _guard = self.write_lock.lock();

        let mut doc = self.read_document()?;
        let before = doc.servers.len();
        doc.servers.retain(|s| s.name != name);
        if doc.servers.len() == before {
            return Ok(false);
        }
        self.write_document(&doc)?;
        Ok(true)
    }

    /// Lists the tags saved for a server.
    pub fn list_tags(&self, server: &str) -> ConfigResult<Vec<String>> {
        self.get_server(server)?
            .map(|s| s.tags)
            .ok_or_else(|| ConfigError::server_not_found(server))
    }

    /// Adds a tag to a server.
    pub fn add_tag(&self, server: &str, node_id: &str) -> ConfigResult<()> {
        if node_id.is_empty() {
            return Err(ConfigError::validation("tag.node_id", "cannot be empty"));
        }
        let _guard = self.write_lock.lock();

        let mut doc = self.read_document()?;
        let entry = doc
            .servers
            .iter_mut()
            .find(|s| s.name == server)
            .ok_or_else(|| ConfigError::server_not_found(server))?;

        if entry.tags.iter().any(|t| t == node_id) {
            return Err(ConfigError::duplicate_tag(server, node_id));
        }
        entry.tags.push(node_id.to_string());
        self.write_document(&doc)
    }

    /// Removes a tag from a server. Returns `false` when the tag was
    /// not saved.
    pub fn remove_tag(&self, server: &str, node_id: &str) -> ConfigResult<bool> {
        let _guard = self.write_lock.lock();

        let mut doc = self.read_document()?;
        let entry = doc
            .servers
            .iter_mut()
            .find(|s| s.name == server)
            .ok_or_else(|| ConfigError::server_not_found(server))?;

        let before = entry.tags.len();
        entry.tags.retain(|t| t != node_id);
        if entry.tags.len() == before {
            return Ok(false);
        }
        self.write_document(&doc)?;
        Ok(true)
    }

    fn read_document(&self) -> ConfigResult<RegistryDocument> {
        if !self.path.exists() {
            return Ok(RegistryDocument::default());
        }

        let file = fs::File::open(&self.path).map_err(|e| ConfigError::io(&self.path, e))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader).map_err(|e| ConfigError::serialization(e.to_string()))
    }

    fn write_document(&self, doc: &RegistryDocument) -> ConfigResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
            }
        }

        // Temp file in the same directory so the rename is atomic.
        let tmp_path = self.path.with_extension("tmp");
        let file = fs::File::create(&tmp_path).map_err(|e| ConfigError::io(&tmp_path, e))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, doc)
            .map_err(|e| ConfigError::serialization(e.to_string()))?;
        fs::rename(&tmp_path, &self.path).map_err(|e| ConfigError::io(&self.path, e))?;

        debug!(
            path = %self.path.display(),
            servers = doc.servers.len(),
            "registry written"
        );
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry() -> (TempDir, ServerRegistry) {
        let dir = TempDir::new().unwrap();
        let registry = ServerRegistry::new(dir.path().join("servers.json"));
        (dir, registry)
    }

    #[test]
    fn test_empty_registry_lists_nothing() {
        let (_dir, registry) = registry();
        assert!(registry.list_servers().unwrap().is_empty());
        assert!(registry.get_server("line1").unwrap().is_none());
    }

    #[test]
    fn test_upsert_and_get() {
        let (_dir, registry) = registry();
        registry
            .upsert_server(SavedServer::new("line1", "opc.tcp://plc:4840"))
            .unwrap();

        let server = registry.get_server("line1").unwrap().unwrap();
        assert_eq!(server.endpoint, "opc.tcp://plc:4840");
        assert!(server.tags.is_empty());
        assert_eq!(registry.list_servers().unwrap().len(), 1);
    }

    #[test]
    fn test_upsert_replaces_by_name() {
        let (_dir, registry) = registry();
        registry
            .upsert_server(SavedServer::new("line1", "opc.tcp://old:4840"))
            .unwrap();
        registry
            .upsert_server(SavedServer::new("line1", "opc.tcp://new:4840"))
            .unwrap();

        let servers = registry.list_servers().unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].endpoint, "opc.tcp://new:4840");
    }

    #[test]
    fn test_upsert_rejects_empty_name() {
        let (_dir, registry) = registry();
        let err = registry
            .upsert_server(SavedServer::new("", "opc.tcp://plc:4840"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn test_remove_server() {
        let (_dir, registry) = registry();
        registry
            .upsert_server(SavedServer::new("line1", "sim://x"))
            .unwrap();

        assert!(registry.remove_server("line1").unwrap());
        assert!(!registry.remove_server("line1").unwrap());
        assert!(registry.list_servers().unwrap().is_empty());
    }

    #[test]
    fn test_add_and_list_tags() {
        let (_dir, registry) = registry();
        registry
            .upsert_server(SavedServer::new("line1", "sim://x"))
            .unwrap();

        registry.add_tag("line1", "temp").unwrap();
        registry.add_tag("line1", "pressure").unwrap();

        assert_eq!(registry.list_tags("line1").unwrap(), vec!["temp", "pressure"]);
    }

    #[test]
    fn test_add_tag_duplicate_rejected() {
        let (_dir, registry) = registry();
        registry
            .upsert_server(SavedServer::new("line1", "sim://x"))
            .unwrap();
        registry.add_tag("line1", "temp").unwrap();

        let err = registry.add_tag("line1", "temp").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateTag { .. }));
    }

    #[test]
    fn test_tag_operations_require_server() {
        let (_dir, registry) = registry();
        assert!(matches!(
            registry.add_tag("ghost", "temp").unwrap_err(),
            ConfigError::ServerNotFound { .. }
        ));
        assert!(matches!(
            registry.list_tags("ghost").unwrap_err(),
            ConfigError::ServerNotFound { .. }
        ));
        assert!(matches!(
            registry.remove_tag("ghost", "temp").unwrap_err(),
            ConfigError::ServerNotFound { .. }
        ));
    }

    #[test]
    fn test_remove_tag() {
        let (_dir, registry) = registry();
        registry
            .upsert_server(SavedServer::new("line1", "sim://x"))
            .unwrap();
        registry.add_tag("line1", "temp").unwrap();

        assert!(registry.remove_tag("line1", "temp").unwrap());
        assert!(!registry.remove_tag("line1", "temp").unwrap());
        assert!(registry.list_tags("line1").unwrap().is_empty());
    }

    #[test]
    fn test_persists_across_instances() {
        let (dir, registry) = registry();
        let mut server = SavedServer::new("line1", "opc.tcp://plc:4840");
        server.security = Some(SecuritySettings::new(
            "Basic256Sha256",
            "/pki/cert.der",
            "/pki/key.pem",
        ));
        registry.upsert_server(server).unwrap();
        registry.add_tag("line1", "temp").unwrap();

        let reopened = ServerRegistry::new(dir.path().join("servers.json"));
        let server = reopened.get_server("line1").unwrap().unwrap();
        assert_eq!(server.tags, vec!["temp"]);
        assert_eq!(server.security.unwrap().policy, "Basic256Sha256");
    }

    #[test]
    fn test_corrupt_file_surfaces_error() {
        let (dir, registry) = registry();
        fs::write(dir.path().join("servers.json"), b"{ not json").unwrap();

        let err = registry.list_servers().unwrap_err();
        assert!(matches!(err, ConfigError::Serialization { .. }));
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        let (dir, registry) = registry();
        registry
            .upsert_server(SavedServer::new("line1", "sim://x"))
            .unwrap();

        assert!(dir.path().join("servers.json").exists());
        assert!(!dir.path().join("servers.tmp").exists());
    }
}
