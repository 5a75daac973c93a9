//! Cluster API subtree (`/cluster`)

use super::Client;
use super::ha::HaClient;

/// Client for the `cluster` endpoints
#[derive(Debug, Clone)]
pub struct ClusterClient {
    client: Client,
}

impl ClusterClient {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    /// Client for the High Availability endpoints (`/cluster/ha`)
    pub fn ha(&self) -> HaClient {
        HaClient::new(self.client.clone())
    }
}
