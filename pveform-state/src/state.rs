//! State file structures for persisting data source snapshots

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use pveform_core::resource::StateSnapshot;
use serde::{Deserialize, Serialize};

/// The main state file structure that persists to the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateFile {
    /// State file format version
    pub version: u32,
    /// Monotonically increasing number for each state modification
    pub serial: u64,
    /// Unique identifier for this state lineage (prevents accidental overwrites)
    pub lineage: String,
    /// Version of pveform that last modified this state
    pub pveform_version: String,
    /// Snapshots of every data source read so far
    pub data_sources: Vec<DataSourceState>,
}

impl StateFile {
    /// Current state file format version
    pub const CURRENT_VERSION: u32 = 1;

    /// Create a new empty state file
    pub fn new() -> Self {
        Self::with_lineage(uuid::Uuid::new_v4().to_string())
    }

    /// Create a new state file with a specific lineage
    pub fn with_lineage(lineage: String) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            serial: 0,
            lineage,
            pveform_version: env!("CARGO_PKG_VERSION").to_string(),
            data_sources: Vec::new(),
        }
    }

    /// Increment serial and update the pveform version for a new state write
    pub fn increment_serial(&mut self) {
        self.serial += 1;
        self.pveform_version = env!("CARGO_PKG_VERSION").to_string();
    }

    /// Find a data source snapshot by type and name
    pub fn find(&self, type_name: &str, name: &str) -> Option<&DataSourceState> {
        self.data_sources
            .iter()
            .find(|d| d.type_name == type_name && d.name == name)
    }

    /// All snapshots of one data source type
    pub fn find_all<'a>(&'a self, type_name: &'a str) -> impl Iterator<Item = &'a DataSourceState> {
        self.data_sources
            .iter()
            .filter(move |d| d.type_name == type_name)
    }

    /// Add or replace a data source snapshot
    ///
    /// A snapshot replaces the previous one wholesale; nothing from earlier
    /// reads is merged in.
    pub fn upsert(&mut self, snapshot: DataSourceState) {
        if let Some(existing) = self
            .data_sources
            .iter_mut()
            .find(|d| d.type_name == snapshot.type_name && d.name == snapshot.name)
        {
            *existing = snapshot;
        } else {
            self.data_sources.push(snapshot);
        }
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self::new()
    }
}

/// Persisted snapshot of a single data source read
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceState {
    /// Full data source type name (e.g., "proxmox_virtual_environment_hagroups")
    pub type_name: String,
    /// Label distinguishing several reads of the same type
    pub name: String,
    /// Provider type name (e.g., "proxmox_virtual_environment")
    pub provider: String,
    /// When the read completed
    pub read_at: DateTime<Utc>,
    /// Attributes of the snapshot as JSON values
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl DataSourceState {
    pub fn new(
        type_name: impl Into<String>,
        name: impl Into<String>,
        provider: impl Into<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
            provider: provider.into(),
            read_at: Utc::now(),
            attributes: BTreeMap::new(),
        }
    }

    /// Set an attribute value
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Capture a snapshot written by a read, `None` when nothing was written
    pub fn from_snapshot(
        type_name: impl Into<String>,
        name: impl Into<String>,
        provider: impl Into<String>,
        snapshot: &StateSnapshot,
    ) -> Option<Self> {
        let attributes = snapshot
            .attributes()?
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect();

        Some(Self {
            attributes,
            ..Self::new(type_name, name, provider)
        })
    }
}
