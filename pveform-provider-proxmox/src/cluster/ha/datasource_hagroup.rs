//! `hagroup` data source: details of a single HA group

use std::collections::BTreeMap;

use pveform_core::diagnostics::Diagnostics;
use pveform_core::provider::{BoxFuture, DataSource, ProviderData, ReadRequest, ReadResponse};
use pveform_core::resource::Value;
use pveform_core::schema::{AttributeSchema, AttributeType, Schema};
use tokio_util::sync::CancellationToken;

use crate::client::ha::groups::{GroupDetails, GroupsClient};

/// Priority reported for member nodes without an explicit priority
pub const UNSET_PRIORITY: i64 = -1;

/// Data source reading one High Availability group
#[derive(Debug, Default)]
pub struct HaGroupDataSource {
    client: Option<GroupsClient>,
}

impl HaGroupDataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }
}

impl DataSource for HaGroupDataSource {
    fn metadata(&self, provider_type_name: &str) -> String {
        format!("{}_hagroup", provider_type_name)
    }

    fn schema(&self) -> Schema {
        Schema::new()
            .with_description("Retrieves information about a specific High Availability group.")
            .attribute(
                AttributeSchema::new("group", AttributeType::String)
                    .required()
                    .with_description("The identifier of the High Availability group to read."),
            )
            .attribute(
                AttributeSchema::new("id", AttributeType::String)
                    .computed()
                    .with_description("The unique identifier of this resource."),
            )
            .attribute(
                AttributeSchema::new("comment", AttributeType::String)
                    .computed()
                    .with_description("The comment associated with this group"),
            )
            .attribute(
                AttributeSchema::new("nodes", AttributeType::map_of(AttributeType::Int))
                    .computed()
                    .with_description(
                        "The member nodes for this group. They are provided as a map, where the keys are the node names and the values represent their priority: integers for known priorities or -1 for unset priorities.",
                    ),
            )
            .attribute(
                AttributeSchema::new("restricted", AttributeType::Bool)
                    .computed()
                    .with_description(
                        "A flag that indicates that other nodes may not be used to run resources associated to this HA group.",
                    ),
            )
            .attribute(
                AttributeSchema::new("no_failback", AttributeType::Bool)
                    .computed()
                    .with_description(
                        "A flag that indicates that failing back to a higher priority node is disabled for this HA group.",
                    ),
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
        req: &'a ReadRequest,
        resp: &'a mut ReadResponse,
    ) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let Some(ref client) = self.client else {
                resp.diagnostics.add_error(
                    "Unable to read High Availability group",
                    "The data source has not been configured with a Proxmox VE client",
                );
                return;
            };

            let Some(group_id) = req.get_string("group") else {
                resp.diagnostics.add_attribute_error(
                    "group",
                    "Missing High Availability group identifier",
                    "The 'group' attribute must be set",
                );
                return;
            };

            let group = match client.get(ctx, group_id).await {
                Ok(group) => group,
                Err(e) => {
                    resp.diagnostics.add_error(
                        format!("Unable to read High Availability group {}", group_id),
                        e.to_string(),
                    );
                    return;
                }
            };

            let Some(attributes) = group_attributes(&group, &mut resp.diagnostics) else {
                return;
            };
            let diags = resp.state.set(attributes);
            resp.diagnostics.append(diags);
        })
    }
}

fn group_attributes(
    group: &GroupDetails,
    diagnostics: &mut Diagnostics,
) -> Option<BTreeMap<String, Value>> {
    let nodes = match group.node_priorities() {
        Ok(nodes) => nodes,
        Err(e) => {
            diagnostics.add_attribute_error(
                "nodes",
                "Unable to parse High Availability group nodes",
                e.to_string(),
            );
            return None;
        }
    };

    let nodes = nodes
        .into_iter()
        .map(|(node, priority)| (node, Value::Int(priority.unwrap_or(UNSET_PRIORITY))))
        .collect();

    let comment = match group.comment {
        Some(ref comment) if !comment.is_empty() => Value::string(comment),
        _ => Value::Null,
    };

    Some(BTreeMap::from([
        ("group".to_string(), Value::string(&group.id)),
        ("id".to_string(), Value::string(&group.id)),
        ("comment".to_string(), comment),
        ("nodes".to_string(), Value::Map(nodes)),
        ("restricted".to_string(), Value::Bool(group.restricted.into())),
        ("no_failback".to_string(), Value::Bool(group.no_failback.into())),
    ]))
}
