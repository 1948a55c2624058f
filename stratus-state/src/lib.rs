//! Stratus State Management
//!
//! Persists the states the engine knows about between runs, with locking so
//! two runs never write the same state concurrently.
//!
//! # Overview
//!
//! - **StateFile**: every managed resource with its identifier and attributes
//! - **StateBackend**: a trait for state storage backends
//! - **LockInfo**: who holds the state lock and until when
//!
//! # Example
//!
//! ```ignore
//! use stratus_state::{LocalBackend, StateBackend, StateFile};
//!
//! let backend = LocalBackend::with_path("stratus.state.json".into());
//! let lock = backend.acquire_lock("apply").await?;
//!
//! let mut file = backend.read_state().await?.unwrap_or_default();
//! let mut states = file.to_state_map()?;
//! // ... apply a plan to `states` ...
//! file.replace_resources(&states);
//! backend.write_state(&file).await?;
//!
//! backend.release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod state;

// Re-export main types for convenience
pub use backend::{BackendConfig, BackendError, BackendResult, StateBackend};
pub use backends::{LocalBackend, create_backend};
pub use lock::LockInfo;
pub use state::{ResourceState, StateFile};
