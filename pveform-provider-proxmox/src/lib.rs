//! pveform Proxmox VE Provider
//!
//! Proxmox VE Provider implementation.
//!
//! ## Module Structure
//!
//! - `client` - Proxmox VE API client (`/api2/json`)
//! - `cluster` - Cluster data sources (High Availability groups)
//! - `config` - Provider configuration and the data handed to data sources

pub mod client;
pub mod cluster;
pub mod config;

use std::collections::BTreeMap;

use log::debug;
use pveform_core::diagnostics::Diagnostics;
use pveform_core::provider::{DataSource, Provider, ProviderData, ProviderError, ProviderResult};
use pveform_core::resource::Value;
use pveform_core::schema::Schema;

use client::Client;
use cluster::ha::{HaGroupDataSource, HaGroupsDataSource};
use config::{DataSourceConfig, ProviderSettings};

/// Type name prefix of every data source in this provider
pub const TYPE_NAME: &str = "proxmox_virtual_environment";

/// Proxmox VE Provider
#[derive(Debug, Default)]
pub struct ProxmoxProvider;

impl ProxmoxProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Provider for ProxmoxProvider {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn schema(&self) -> Schema {
        config::provider_schema()
    }

    fn configure(
        &self,
        config: &BTreeMap<String, Value>,
        diagnostics: &mut Diagnostics,
    ) -> Option<ProviderData> {
        let settings = match ProviderSettings::from_attributes(config) {
            Ok(settings) => settings,
            Err(e) => {
                diagnostics.add_error("Invalid Proxmox VE provider configuration", e.to_string());
                return None;
            }
        };

        let client = match connect(&settings) {
            Ok(client) => client,
            Err(e) => {
                diagnostics.add_error("Unable to create Proxmox VE API client", e.to_string());
                return None;
            }
        };
        debug!("configured Proxmox VE client for {}", client.base_url());

        Some(ProviderData::new(DataSourceConfig { client }))
    }

    fn data_sources(&self) -> Vec<Box<dyn DataSource>> {
        vec![
            Box::new(HaGroupDataSource::new()),
            Box::new(HaGroupsDataSource::new()),
        ]
    }
}

/// Build the API client for resolved settings
fn connect(settings: &ProviderSettings) -> ProviderResult<Client> {
    Client::new(settings.client_config())
        .map_err(|e| ProviderError::new(e.to_string()).with_cause(e))
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use httpmock::MockServer;
    use pveform_core::host::Host;
    use pveform_core::provider::ReadRequest;
    use serde_json::json;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::client::{ClientError, TEST_TOKEN};

    fn provider_config(endpoint: &str, token: &str) -> BTreeMap<String, Value> {
        BTreeMap::from([
            ("endpoint".to_string(), Value::string(endpoint)),
            ("api_token".to_string(), Value::string(token)),
        ])
    }

    #[test]
    fn lists_data_sources() {
        let host = Host::new(ProxmoxProvider::new());
        assert_eq!(
            host.data_source_types(),
            vec![
                "proxmox_virtual_environment_hagroup".to_string(),
                "proxmox_virtual_environment_hagroups".to_string(),
            ]
        );
    }

    #[test]
    fn invalid_token_fails_configuration() {
        let mut host = Host::new(ProxmoxProvider::new());
        let diags = host.configure(provider_config("https://pve:8006", "not-a-token"));
        assert_eq!(diags.error_count(), 1);
        assert_eq!(
            diags.iter().next().unwrap().summary,
            "Unable to create Proxmox VE API client"
        );
        assert!(!host.is_configured());
    }

    #[test]
    fn connect_error_keeps_client_error_as_cause() {
        let settings =
            ProviderSettings::resolve(&provider_config("https://pve:8006", "root@pam"), |_| None)
                .unwrap();
        let err = connect(&settings).unwrap_err();
        let cause = err.source().unwrap().downcast_ref::<ClientError>();
        assert!(matches!(cause, Some(ClientError::InvalidToken)));
    }

    #[tokio::test]
    async fn host_reads_hagroups() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("GET")
                    .path("/api2/json/cluster/ha/groups")
                    .header("authorization", format!("PVEAPIToken={}", TEST_TOKEN));
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({"data": [{"group": "grpA"}, {"group": "grpB"}]}));
            })
            .await;

        let mut host = Host::new(ProxmoxProvider::new());
        let diags = host.configure(provider_config(&server.base_url(), TEST_TOKEN));
        assert!(diags.is_empty());

        let resp = host
            .read_data_source(
                "proxmox_virtual_environment_hagroups",
                &CancellationToken::new(),
                ReadRequest::new(),
            )
            .await;
        assert!(resp.diagnostics.is_empty());
        assert_eq!(
            resp.state.to_json(),
            Some(json!({"id": "hagroups", "group_ids": ["grpA", "grpB"]}))
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unconfigured_host_read_fails_gracefully() {
        let host = Host::new(ProxmoxProvider::new());
        let resp = host
            .read_data_source(
                "proxmox_virtual_environment_hagroups",
                &CancellationToken::new(),
                ReadRequest::new(),
            )
            .await;
        assert_eq!(resp.diagnostics.error_count(), 1);
        assert!(!resp.state.is_set());
    }
}
