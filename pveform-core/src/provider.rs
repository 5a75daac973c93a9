//! Provider - Traits abstracting providers and their data sources
//!
//! A Provider is configured once by the host and hands out data sources.
//! Each data source follows a fixed lifecycle driven by the host:
//! metadata, schema, configure, then read.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::diagnostics::Diagnostics;
use crate::resource::{StateSnapshot, Value};
use crate::schema::Schema;

/// Error type for Provider operations
#[derive(Debug)]
pub struct ProviderError {
    pub message: String,
    /// Data source type name the error relates to, if any
    pub data_source: Option<String>,
    pub cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ref data_source) = self.data_source {
            write!(f, "[{}] {}", data_source, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ProviderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_ref()
            .map(|e| e.as_ref() as &dyn std::error::Error)
    }
}

impl ProviderError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data_source: None,
            cause: None,
        }
    }

    pub fn for_data_source(mut self, type_name: impl Into<String>) -> Self {
        self.data_source = Some(type_name.into());
        self
    }

    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Return type for async operations
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Opaque value a provider hands to its data sources after configuration
///
/// Data sources narrow it back to the concrete type they expect with
/// [`ProviderData::downcast`].
#[derive(Clone)]
pub struct ProviderData {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl ProviderData {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Name of the concrete type held
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Result<&T, ProviderDataMismatch> {
        self.value
            .downcast_ref::<T>()
            .ok_or_else(|| ProviderDataMismatch {
                expected: std::any::type_name::<T>(),
                actual: self.type_name,
            })
    }
}

impl fmt::Debug for ProviderData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderData")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Provider data held a different type than the data source expected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Expected {expected}, got: {actual}")]
pub struct ProviderDataMismatch {
    pub expected: &'static str,
    pub actual: &'static str,
}

/// Request envelope for a data source read
#[derive(Debug, Clone, Default)]
pub struct ReadRequest {
    /// Configuration attributes set by the user
    pub config: BTreeMap<String, Value>,
}

impl ReadRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }
}

/// Response envelope for a data source read
#[derive(Debug, Clone)]
pub struct ReadResponse {
    pub state: StateSnapshot,
    pub diagnostics: Diagnostics,
}

impl ReadResponse {
    pub fn new(schema: Schema) -> Self {
        Self {
            state: StateSnapshot::new(schema),
            diagnostics: Diagnostics::new(),
        }
    }
}

/// A read-only data source
pub trait DataSource: Send + Sync {
    /// Full type name, derived from the provider's type name
    fn metadata(&self, provider_type_name: &str) -> String;

    /// Attribute schema of this data source
    fn schema(&self) -> Schema;

    /// Receive the provider data
    ///
    /// `None` means the provider has not been configured yet and must not be
    /// treated as an error.
    fn configure(&mut self, provider_data: Option<&ProviderData>, diagnostics: &mut Diagnostics);

    /// Read the current state into `resp`
    ///
    /// Failures are reported through `resp.diagnostics`; `resp.state` is left
    /// untouched when nothing could be read.
    fn read<'a>(
        &'a self,
        ctx: &'a CancellationToken,
        req: &'a ReadRequest,
        resp: &'a mut ReadResponse,
    ) -> BoxFuture<'a, ()>;
}

/// Main Provider trait
pub trait Provider: Send + Sync {
    /// Type name prefix shared by all data sources (e.g., "proxmox_virtual_environment")
    fn type_name(&self) -> &'static str;

    /// Schema of the provider configuration block
    fn schema(&self) -> Schema;

    /// Build the data handed to data sources
    ///
    /// Returns `None` when configuration failed; the reason is in `diagnostics`.
    fn configure(
        &self,
        config: &BTreeMap<String, Value>,
        diagnostics: &mut Diagnostics,
    ) -> Option<ProviderData>;

    /// Fresh instances of every data source this Provider offers
    fn data_sources(&self) -> Vec<Box<dyn DataSource>>;
}

/// Provider implementation for Box<dyn Provider>
/// This enables dynamic dispatch for Providers
impl Provider for Box<dyn Provider> {
    fn type_name(&self) -> &'static str {
        (**self).type_name()
    }

    fn schema(&self) -> Schema {
        (**self).schema()
    }

    fn configure(
        &self,
        config: &BTreeMap<String, Value>,
        diagnostics: &mut Diagnostics,
    ) -> Option<ProviderData> {
        (**self).configure(config, diagnostics)
    }

    fn data_sources(&self) -> Vec<Box<dyn DataSource>> {
        (**self).data_sources()
    }
}
