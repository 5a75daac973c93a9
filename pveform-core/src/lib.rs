//! pveform Core
//!
//! Provider host framework: attribute values, schemas, diagnostics and the
//! data source lifecycle a provider plugs into.

pub mod diagnostics;
pub mod host;
pub mod provider;
pub mod resource;
pub mod schema;
