//! `hagroups` data source: identifiers of every HA group in the cluster

use std::collections::BTreeMap;

use log::debug;
use pveform_core::diagnostics::Diagnostics;
use pveform_core::provider::{BoxFuture, DataSource, ProviderData, ReadRequest, ReadResponse};
use pveform_core::resource::Value;
use pveform_core::schema::{AttributeSchema, AttributeType, Schema};
use tokio_util::sync::CancellationToken;

use crate::client::ha::groups::GroupsClient;

/// Constant value of the `id` attribute
pub const HAGROUPS_ID: &str = "hagroups";

/// Data source listing the High Availability groups
#[derive(Debug, Default)]
pub struct HaGroupsDataSource {
    client: Option<GroupsClient>,
}

impl HaGroupsDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }
}

impl DataSource for HaGroupsDataSource {
    fn metadata(&self, provider_type_name: &str) -> String {
        format!("{}_hagroups", provider_type_name)
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .with_description("Retrieves the list of High Availability groups.")
            .attribute(
                AttributeSchema::new("id", AttributeType::String)
                    .computed()
                    .with_description("The unique identifier of this resource."),
            )
            .attribute(
                AttributeSchema::new("group_ids", AttributeType::set_of(AttributeType::String))
                    .computed()
                    .with_description("The identifiers of the High Availability groups."),
            )
    }

    fn configure(&mut self, provider_data: Option<&ProviderData>, diagnostics: &mut Diagnostics) {
        if let Some(client) = super::groups_client(provider_data, diagnostics) {
            self.client = Some(client);
        }
    }

    fn read<'a>(
        &'a self,
        ctx: &'a CancellationToken,
        _req: &'a ReadRequest,
        resp: &'a mut ReadResponse,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let Some(ref client) = self.client else {
                resp.diagnostics.add_error(
                    "Unable to read High Availability groups",
                    "The data source has not been configured with a Proxmox VE client",
                );
                return;
            };

            let list = match client.list(ctx).await {
                Ok(list) => list,
                Err(e) => {
                    resp.diagnostics
                        .add_error("Unable to read High Availability groups", e.to_string());
                    return;
                }
            };
            debug!("read {} High Availability groups", list.len());

            let (group_ids, diags) = Value::set(
                &AttributeType::String,
                list.into_iter().map(|group| Value::String(group.id)),
            );
            resp.diagnostics.append(diags);

            let diags = resp.state.set(BTreeMap::from([
                ("id".to_string(), Value::string(HAGROUPS_ID)),
                ("group_ids".to_string(), group_ids),
            ]));
            resp.diagnostics.append(diags);
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::time::Duration;

    use httpmock::{Mock, MockServer};
    use serde_json::json;

    use super::*;
    use crate::client::{Client, ClientConfig, TEST_TOKEN};
    use crate::config::DataSourceConfig;

    const GROUPS_PATH: &str = "/api2/json/cluster/ha/groups";

    async fn mock_listing<'a>(
        server: &'a MockServer,
        status: u16,
        body: serde_json::Value,
    ) -> Mock<'a> {
        server
            .mock_async(|when, then| {
                when.method("GET")
                    .path(GROUPS_PATH)
                    .header("authorization", format!("PVEAPIToken={}", TEST_TOKEN));
                then.status(status)
                    .header("content-type", "application/json")
                    .json_body(body);
            })
            .await
    }

    fn configured(server: &MockServer) -> HaGroupsDataSource {
        let client = Client::new(ClientConfig::new(server.base_url(), TEST_TOKEN)).unwrap();
        let mut ds = HaGroupsDataSource::new();
        let mut diags = Diagnostics::new();
        ds.configure(
            Some(&ProviderData::new(DataSourceConfig { client })),
            &mut diags,
        );
        assert!(diags.is_empty());
        assert!(ds.is_configured());
        ds
    }

    async fn read(ds: &HaGroupsDataSource) -> ReadResponse {
        let mut resp = ReadResponse::new(ds.schema());
        ds.read(&CancellationToken::new(), &ReadRequest::new(), &mut resp)
            .await;
        resp
    }

    fn ids(items: &[&str]) -> Value {
        Value::Set(items.iter().map(|s| Value::string(*s)).collect::<BTreeSet<_>>())
    }

    #[test]
    fn type_name_uses_provider_prefix() {
        let ds = HaGroupsDataSource::new();
        assert_eq!(
            ds.metadata("proxmox_virtual_environment"),
            "proxmox_virtual_environment_hagroups"
        );
    }

    #[test]
    fn schema_is_constant() {
        let ds = HaGroupsDataSource::new();
        let schema = ds.schema();
        assert_eq!(schema, ds.schema());
        assert_eq!(schema.attributes.len(), 2);

        let id = &schema.attributes["id"];
        assert_eq!(id.attr_type, AttributeType::String);
        assert!(id.is_read_only());

        let group_ids = &schema.attributes["group_ids"];
        assert_eq!(
            group_ids.attr_type,
            AttributeType::set_of(AttributeType::String)
        );
        assert!(group_ids.is_read_only());
    }

    #[test]
    fn configure_without_provider_data_is_a_no_op() {
        let mut ds = HaGroupsDataSource::new();
        let mut diags = Diagnostics::new();
        ds.configure(None, &mut diags);
        assert!(diags.is_empty());
        assert!(!ds.is_configured());
    }

    #[tokio::test]
    async fn configure_with_wrong_type_reports_error() {
        let mut ds = HaGroupsDataSource::new();
        let mut diags = Diagnostics::new();
        ds.configure(Some(&ProviderData::new("not a config")), &mut diags);

        assert_eq!(diags.len(), 1);
        let diag = diags.iter().next().unwrap();
        assert_eq!(diag.summary, "Unexpected DataSource Configure Type");
        assert!(diag.detail.contains("DataSourceConfig"));
        assert!(diag.detail.contains("&str"));
        assert!(!ds.is_configured());

        // Reading afterwards fails gracefully
        let resp = read(&ds).await;
        assert_eq!(resp.diagnostics.error_count(), 1);
        assert!(!resp.state.is_set());
    }

    #[tokio::test]
    async fn read_publishes_group_ids() {
        let server = MockServer::start_async().await;
        let mock = mock_listing(
            &server,
            200,
            json!({"data": [
                {"group": "grpA", "type": "group"},
                {"group": "grpB", "type": "group"},
                {"group": "grpC", "type": "group"},
            ]}),
        )
        .await;
        let ds = configured(&server);

        let resp = read(&ds).await;
        assert!(resp.diagnostics.is_empty());
        assert_eq!(resp.state.get("id"), Some(&Value::string("hagroups")));
        assert_eq!(
            resp.state.get("group_ids"),
            Some(&ids(&["grpA", "grpB", "grpC"]))
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn read_with_no_groups_publishes_empty_set() {
        let server = MockServer::start_async().await;
        mock_listing(&server, 200, json!({"data": []})).await;
        let ds = configured(&server);

        let resp = read(&ds).await;
        assert!(resp.diagnostics.is_empty());
        assert_eq!(resp.state.get("group_ids"), Some(&ids(&[])));
    }

    #[tokio::test]
    async fn remote_error_leaves_state_unset() {
        let server = MockServer::start_async().await;
        mock_listing(
            &server,
            500,
            json!({"data": null, "errors": "ha manager unavailable"}),
        )
        .await;
        let ds = configured(&server);

        let resp = read(&ds).await;
        assert!(!resp.state.is_set());
        assert_eq!(resp.diagnostics.len(), 1);
        let diag = resp.diagnostics.iter().next().unwrap();
        assert_eq!(diag.summary, "Unable to read High Availability groups");
        assert!(diag.detail.contains("ha manager unavailable"));
    }

    #[tokio::test]
    async fn successive_reads_reflect_latest_listing() {
        let server = MockServer::start_async().await;
        let ds = configured(&server);

        let first_listing = mock_listing(&server, 200, json!({"data": [{"group": "grpA"}]})).await;
        let first = read(&ds).await;
        assert_eq!(first.state.get("group_ids"), Some(&ids(&["grpA"])));
        first_listing.assert_async().await;
        first_listing.delete_async().await;

        mock_listing(
            &server,
            200,
            json!({"data": [{"group": "grpA"}, {"group": "grpB"}]}),
        )
        .await;
        let second = read(&ds).await;
        assert!(second.diagnostics.is_empty());
        assert_eq!(second.state.get("group_ids"), Some(&ids(&["grpA", "grpB"])));
    }

    #[tokio::test]
    async fn duplicate_ids_are_reported_but_state_is_written() {
        let server = MockServer::start_async().await;
        mock_listing(
            &server,
            200,
            json!({"data": [{"group": "grpA"}, {"group": "grpA"}, {"group": "grpB"}]}),
        )
        .await;
        let ds = configured(&server);

        let resp = read(&ds).await;
        assert_eq!(resp.diagnostics.error_count(), 1);
        assert_eq!(
            resp.diagnostics.iter().next().unwrap().summary,
            "Duplicate set element"
        );
        assert_eq!(resp.state.get("group_ids"), Some(&ids(&["grpA", "grpB"])));
    }

    #[tokio::test]
    async fn cancellation_is_reported_as_diagnostic() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path(GROUPS_PATH);
                then.status(200)
                    .delay(Duration::from_secs(10))
                    .json_body(json!({"data": []}));
            })
            .await;
        let ds = configured(&server);

        let ctx = CancellationToken::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let mut resp = ReadResponse::new(ds.schema());
        ds.read(&ctx, &ReadRequest::new(), &mut resp).await;

        assert!(!resp.state.is_set());
        assert_eq!(resp.diagnostics.error_count(), 1);
        assert!(
            resp.diagnostics
                .iter()
                .next()
                .unwrap()
                .detail
                .contains("cancelled")
        );
    }
}
