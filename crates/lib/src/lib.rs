//! shelf-lib: ownership-aware object management
//!
//! This crate manages files that several products share inside one object
//! store bucket:
//! - `protocol`: pure upload, metadata-upload and release decisions
//! - `manager`: batch driver that probes the store and applies those decisions
//!   under optimistic concurrency
//! - `store`: the `ObjectStore` seam with memory, directory and S3 bindings
//! - `owners` / `metadata`: the `rh-products` and `checksum` metadata fields

pub mod config;
pub mod consts;
pub mod digest;
pub mod error;
pub mod key;
pub mod manager;
pub mod metadata;
pub mod owners;
pub mod platform;
pub mod protocol;
pub mod report;
pub mod store;

pub use config::{ConfigError, ManagerConfig, ShelfConfig, StoreConfig};
pub use error::{FailureKind, ItemError};
pub use manager::ObjectManager;
pub use owners::{OwnerSet, ProductError, ProductId};
pub use report::{BatchReport, ItemFailure, ItemReport, Outcome};
pub use store::{Backend, ObjectBody, ObjectStore, StoreError};
