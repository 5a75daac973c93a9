//! HA groups endpoints (`/cluster/ha/groups`)

use std::collections::BTreeMap;

use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use crate::client::types::IntBool;
use crate::client::{Client, ClientResult};

/// Entry of the HA groups listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupRecord {
    #[serde(rename = "group")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub digest: Option<String>,
}

/// Full description of a single HA group
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GroupDetails {
    #[serde(rename = "group")]
    pub id: String,
    #[serde(default)]
    pub comment: Option<String>,
    /// Member nodes with optional priority (e.g., "pve1:2,pve2")
    pub nodes: String,
    #[serde(default)]
    pub restricted: IntBool,
    #[serde(rename = "nofailback", default)]
    pub no_failback: IntBool,
    #[serde(default)]
    pub digest: Option<String>,
}

/// A group member entry that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid priority '{priority}' for node '{node}'")]
pub struct InvalidNodePriority {
    pub node: String,
    pub priority: String,
}

impl GroupDetails {
    /// Member nodes mapped to their priority, `None` when no priority is set
    pub fn node_priorities(&self) -> Result<BTreeMap<String, Option<i64>>, InvalidNodePriority> {
        let mut nodes = BTreeMap::new();
        for entry in self.nodes.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match entry.split_once(':') {
                Some((node, priority)) => {
                    let parsed = priority.trim().parse::<i64>().map_err(|_| InvalidNodePriority {
                        node: node.to_string(),
                        priority: priority.to_string(),
                    })?;
                    nodes.insert(node.to_string(), Some(parsed));
                }
                None => {
                    nodes.insert(entry.to_string(), None);
                }
            }
        }
        Ok(nodes)
    }
}

/// Client for HA groups
#[derive(Debug, Clone)]
pub struct GroupsClient {
    client: Client,
}

impl GroupsClient {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    /// List every HA group known to the cluster
    pub async fn list(&self, ctx: &CancellationToken) -> ClientResult<Vec<GroupRecord>> {
        self.client
            .get_data(ctx, &["cluster", "ha", "groups"])
            .await
    }

    /// Fetch a single HA group by identifier
    pub async fn get(&self, ctx: &CancellationToken, id: &str) -> ClientResult<GroupDetails> {
        self.client
            .get_data(ctx, &["cluster", "ha", "groups", id])
            .await
    }
}
