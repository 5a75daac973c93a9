//! High Availability data sources

mod datasource_hagroup;
mod datasource_hagroups;

pub use datasource_hagroup::HaGroupDataSource;
pub use datasource_hagroups::HaGroupsDataSource;

use pveform_core::diagnostics::Diagnostics;
use pveform_core::provider::ProviderData;

use crate::client::ha::groups::GroupsClient;
use crate::config::DataSourceConfig;

/// Narrow the provider data to the HA groups client
///
/// Absent provider data yields `None` without a diagnostic.
fn groups_client(
    provider_data: Option<&ProviderData>,
    diagnostics: &mut Diagnostics,
) -> Option<GroupsClient> {
    let data = provider_data?;

    match data.downcast::<DataSourceConfig>() {
        Ok(cfg) => Some(cfg.client.cluster().ha().groups()),
        Err(e) => {
            diagnostics.add_error("Unexpected DataSource Configure Type", e.to_string());
            None
        }
    }
}
