//! pveform State Management
//!
//! Persists the snapshots written by data source reads so that later
//! invocations can show them without contacting the remote API.
//!
//! # Overview
//!
//! - **StateFile**: all persisted data source snapshots
//! - **StateBackend**: a trait for state storage backends
//!
//! # Example
//!
//! ```ignore
//! use pveform_state::{create_backend, BackendConfig, DataSourceState};
//!
//! let backend = create_backend(&BackendConfig::new("local"))?;
//!
//! let mut state = backend.read_state().await?.unwrap_or_default();
//! if let Some(snapshot) = DataSourceState::from_snapshot(type_name, "main", provider, &resp.state) {
//!     state.upsert(snapshot);
//! }
//! state.increment_serial();
//! backend.write_state(&state).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod state;

// Re-export main types for convenience
pub use backend::{BackendConfig, BackendError, BackendResult, StateBackend};
pub use backends::create_backend;
pub use state::{DataSourceState, StateFile};
