//! Provider configuration
//!
//! Settings come from the provider configuration block and fall back to the
//! `PROXMOX_VE_*` environment variables.

use std::collections::BTreeMap;
use std::time::Duration;

use pveform_core::provider::{ProviderError, ProviderResult};
use pveform_core::resource::Value;
use pveform_core::schema::{AttributeSchema, AttributeType, Schema};

use crate::client::{Client, ClientConfig};

pub const ENV_ENDPOINT: &str = "PROXMOX_VE_ENDPOINT";
pub const ENV_API_TOKEN: &str = "PROXMOX_VE_API_TOKEN";
pub const ENV_INSECURE: &str = "PROXMOX_VE_INSECURE";

/// Data handed to every data source once the provider is configured
#[derive(Debug, Clone)]
pub struct DataSourceConfig {
    pub client: Client,
}

/// Schema of the provider configuration block
pub fn provider_schema() -> Schema {
    Schema::new()
        .with_description("Proxmox VE provider configuration.")
        .attribute(
            AttributeSchema::new("endpoint", AttributeType::String)
                .optional()
                .with_description(format!(
                    "The endpoint for the Proxmox VE API (e.g., https://pve.example.com:8006). Defaults to ${}.",
                    ENV_ENDPOINT
                )),
        )
        .attribute(
            AttributeSchema::new("api_token", AttributeType::String)
                .optional()
                .sensitive()
                .with_description(format!(
                    "The API token in the form USER@REALM!TOKENID=SECRET. Defaults to ${}.",
                    ENV_API_TOKEN
                )),
        )
        .attribute(
            AttributeSchema::new("insecure", AttributeType::Bool)
                .optional()
                .with_description(format!(
                    "Whether to skip the TLS verification step. Defaults to ${} or false.",
                    ENV_INSECURE
                )),
        )
        .attribute(
            AttributeSchema::new("timeout", AttributeType::Int)
                .optional()
                .with_description("Request timeout in seconds. Defaults to 30."),
        )
}

/// Provider settings resolved from configuration and environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub endpoint: String,
    pub api_token: String,
    pub insecure: bool,
    pub timeout: Duration,
}

impl ProviderSettings {
    /// Resolve settings using the process environment as fallback
    pub fn from_attributes(attributes: &BTreeMap<String, Value>) -> ProviderResult<Self> {
        Self::resolve(attributes, |key| std::env::var(key).ok())
    }

    /// Resolve settings with an explicit environment lookup
    pub fn resolve(
        attributes: &BTreeMap<String, Value>,
        env: impl Fn(&str) -> Option<String>,
    ) -> ProviderResult<Self> {
        let endpoint = get_string(attributes, "endpoint")
            .map(str::to_string)
            .or_else(|| env(ENV_ENDPOINT))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ProviderError::new(format!(
                    "Missing API endpoint: set 'endpoint' or ${}",
                    ENV_ENDPOINT
                ))
            })?;

        let api_token = get_string(attributes, "api_token")
            .map(str::to_string)
            .or_else(|| env(ENV_API_TOKEN))
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ProviderError::new(format!(
                    "Missing API token: set 'api_token' or ${}",
                    ENV_API_TOKEN
                ))
            })?;

        let insecure = match get_bool(attributes, "insecure") {
            Some(b) => b,
            None => match env(ENV_INSECURE) {
                Some(raw) => parse_bool(&raw).ok_or_else(|| {
                    ProviderError::new(format!(
                        "Invalid value '{}' for ${}: expected true or false",
                        raw, ENV_INSECURE
                    ))
                })?,
                None => false,
            },
        };

        let timeout = match attributes.get("timeout").and_then(Value::as_int) {
            Some(secs) if secs > 0 => Duration::from_secs(secs as u64),
            Some(secs) => {
                return Err(ProviderError::new(format!(
                    "Invalid timeout {}: must be a positive number of seconds",
                    secs
                )));
            }
            None => ClientConfig::DEFAULT_TIMEOUT,
        };

        Ok(Self {
            endpoint,
            api_token,
            insecure,
            timeout,
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.endpoint, &self.api_token)
            .with_insecure(self.insecure)
            .with_timeout(self.timeout)
    }
}

fn get_string<'a>(attributes: &'a BTreeMap<String, Value>, key: &str) -> Option<&'a str> {
    attributes.get(key).and_then(Value::as_str)
}

fn get_bool(attributes: &BTreeMap<String, Value>, key: &str) -> Option<bool> {
    attributes.get(key).and_then(Value::as_bool)
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}
