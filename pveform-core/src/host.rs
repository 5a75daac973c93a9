//! Host - Drives the provider and data source lifecycle
//!
//! The host owns a single provider. It configures the provider once and,
//! for every read, instantiates the requested data source and walks it
//! through configure and read.

use std::collections::BTreeMap;

use log::debug;
use tokio_util::sync::CancellationToken;

use crate::diagnostics::Diagnostics;
use crate::provider::{DataSource, Provider, ProviderData, ReadRequest, ReadResponse};
use crate::resource::Value;
use crate::schema::Schema;

pub struct Host<P: Provider> {
    provider: P,
    provider_data: Option<ProviderData>,
}

impl<P: Provider> Host<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            provider_data: None,
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Whether `configure` has produced provider data
    pub fn is_configured(&self) -> bool {
        self.provider_data.is_some()
    }

    /// Validate the provider configuration and configure the provider
    pub fn configure(&mut self, config: BTreeMap<String, Value>) -> Diagnostics {
        let mut diags = Diagnostics::new();

        if let Err(errors) = self.provider.schema().validate_config(&config) {
            for (attribute, error) in errors {
                diags.add_attribute_error(
                    attribute,
                    "Invalid provider configuration",
                    error.to_string(),
                );
            }
            return diags;
        }

        debug!("configuring provider {}", self.provider.type_name());
        self.provider_data = self.provider.configure(&config, &mut diags);
        diags
    }

    /// Full type names of every data source, sorted
    pub fn data_source_types(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .provider
            .data_sources()
            .iter()
            .map(|ds| ds.metadata(self.provider.type_name()))
            .collect();
        names.sort();
        names
    }

    pub fn data_source_schema(&self, type_name: &str) -> Option<Schema> {
        self.find_data_source(type_name).map(|ds| ds.schema())
    }

    fn find_data_source(&self, type_name: &str) -> Option<Box<dyn DataSource>> {
        self.provider
            .data_sources()
            .into_iter()
            .find(|ds| ds.metadata(self.provider.type_name()) == type_name)
    }

    /// Read a data source by its full type name
    ///
    /// The data source is configured with the current provider data first.
    /// A configure error stops the read before any remote call is made.
    pub async fn read_data_source(
        &self,
        type_name: &str,
        ctx: &CancellationToken,
        req: ReadRequest,
    ) -> ReadResponse {
        let Some(mut data_source) = self.find_data_source(type_name) else {
            let mut resp = ReadResponse::new(Schema::new());
            resp.diagnostics.add_error(
                "Unknown data source",
                format!(
                    "Data source '{}' is not provided by {} (available: {})",
                    type_name,
                    self.provider.type_name(),
                    self.data_source_types().join(", ")
                ),
            );
            return resp;
        };

        let schema = data_source.schema();
        let mut resp = ReadResponse::new(schema.clone());

        if let Err(errors) = schema.validate_config(&req.config) {
            for (attribute, error) in errors {
                resp.diagnostics.add_attribute_error(
                    attribute,
                    "Invalid data source configuration",
                    error.to_string(),
                );
            }
            return resp;
        }

        data_source.configure(self.provider_data.as_ref(), &mut resp.diagnostics);
        if resp.diagnostics.has_error() {
            return resp;
        }

        debug!("reading data source {}", type_name);
        data_source.read(ctx, &req, &mut resp).await;
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::BoxFuture;
    use crate::schema::{AttributeSchema, AttributeType};

    struct Greeting(String);

    struct MockProvider;

    impl Provider for MockProvider {
        fn type_name(&self) -> &'static str {
            "mock"
        }

        fn schema(&self) -> Schema {
            Schema::new().attribute(AttributeSchema::new("greeting", AttributeType::String).optional())
        }

        fn configure(
            &self,
            config: &BTreeMap<String, Value>,
            diagnostics: &mut Diagnostics,
        ) -> Option<ProviderData> {
            match config.get("greeting").and_then(Value::as_str) {
                Some("") => {
                    diagnostics.add_attribute_error("greeting", "Empty greeting", "");
                    None
                }
                Some(greeting) => Some(ProviderData::new(Greeting(greeting.to_string()))),
                None => Some(ProviderData::new(Greeting("hello".to_string()))),
            }
        }

        fn data_sources(&self) -> Vec<Box<dyn DataSource>> {
            vec![Box::new(GreetDataSource { greeting: None })]
        }
    }

    struct GreetDataSource {
        greeting: Option<String>,
    }

    impl DataSource for GreetDataSource {
        fn metadata(&self, provider_type_name: &str) -> String {
            format!("{}_greet", provider_type_name)
        }

        fn schema(&self) -> Schema {
            Schema::new()
                .attribute(AttributeSchema::new("name", AttributeType::String).required())
                .attribute(AttributeSchema::new("message", AttributeType::String).computed())
        }

        fn configure(
            &mut self,
            provider_data: Option<&ProviderData>,
            diagnostics: &mut Diagnostics,
        ) {
            let Some(data) = provider_data else {
                return;
            };
            match data.downcast::<Greeting>() {
                Ok(g) => self.greeting = Some(g.0.clone()),
                Err(e) => diagnostics.add_error("Unexpected DataSource Configure Type", e.to_string()),
            }
        }

        fn read<'a>(
            &'a self,
            _ctx: &'a CancellationToken,
            req: &'a ReadRequest,
            resp: &'a mut ReadResponse,
        ) -> BoxFuture<'a, ()> {
            Box::pin(async move {
                let Some(ref greeting) = self.greeting else {
                    resp.diagnostics.add_error("Unconfigured", "no greeting");
                    return;
                };
                let name = req.get_string("name").unwrap_or_default();
                let diags = resp.state.set(BTreeMap::from([
                    ("name".to_string(), Value::string(name)),
                    (
                        "message".to_string(),
                        Value::String(format!("{}, {}", greeting, name)),
                    ),
                ]));
                resp.diagnostics.append(diags);
            })
        }
    }

    #[tokio::test]
    async fn read_after_configure() {
        let mut host = Host::new(MockProvider);
        let diags = host.configure(BTreeMap::from([(
            "greeting".to_string(),
            Value::string("hi"),
        )]));
        assert!(diags.is_empty());
        assert!(host.is_configured());

        let req = ReadRequest::new().with_attribute("name", Value::string("pve"));
        let resp = host
            .read_data_source("mock_greet", &CancellationToken::new(), req)
            .await;
        assert!(resp.diagnostics.is_empty());
        assert_eq!(resp.state.get("message"), Some(&Value::string("hi, pve")));
    }

    #[tokio::test]
    async fn read_without_configure_reports_error() {
        let host = Host::new(MockProvider);
        let req = ReadRequest::new().with_attribute("name", Value::string("pve"));
        let resp = host
            .read_data_source("mock_greet", &CancellationToken::new(), req)
            .await;
        assert_eq!(resp.diagnostics.error_count(), 1);
        assert!(!resp.state.is_set());
    }

    #[tokio::test]
    async fn unknown_data_source() {
        let host = Host::new(MockProvider);
        let resp = host
            .read_data_source("mock_nope", &CancellationToken::new(), ReadRequest::new())
            .await;
        assert_eq!(resp.diagnostics.error_count(), 1);
        assert!(resp.diagnostics.iter().next().unwrap().detail.contains("mock_greet"));
    }

    #[tokio::test]
    async fn invalid_request_config_skips_read() {
        let mut host = Host::new(MockProvider);
        assert!(host.configure(BTreeMap::new()).is_empty());

        let req = ReadRequest::new().with_attribute("message", Value::string("x"));
        let resp = host
            .read_data_source("mock_greet", &CancellationToken::new(), req)
            .await;
        // missing "name" and computed "message"
        assert_eq!(resp.diagnostics.error_count(), 2);
        assert!(!resp.state.is_set());
    }

    #[test]
    fn configure_validates_against_provider_schema() {
        let mut host = Host::new(MockProvider);
        let diags = host.configure(BTreeMap::from([("greeting".to_string(), Value::Int(1))]));
        assert_eq!(diags.error_count(), 1);
        assert!(!host.is_configured());

        let diags = host.configure(BTreeMap::from([(
            "greeting".to_string(),
            Value::string(""),
        )]));
        assert_eq!(diags.error_count(), 1);
        assert!(!host.is_configured());
    }

    #[test]
    fn lists_data_source_types() {
        let host = Host::new(MockProvider);
        assert_eq!(host.data_source_types(), vec!["mock_greet".to_string()]);
        assert!(host.data_source_schema("mock_greet").is_some());
        assert!(host.data_source_schema("mock_other").is_none());
    }
}
