//! High Availability API subtree (`/cluster/ha`)

pub mod groups;

use super::Client;
use groups::GroupsClient;

#[derive(Debug, Clone)]
pub struct HaClient {
    client: Client,
}

impl HaClient {
    pub(crate) fn new(client: Client) -> Self {
        Self { client }
    }

    /// Client for HA groups (`/cluster/ha/groups`)
    pub fn groups(&self) -> GroupsClient {
        GroupsClient::new(self.client.clone())
    }
}
