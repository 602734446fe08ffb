//! Object store providers for image blobs, built on Apache OpenDAL.
//!
//! A provider is a named capability over "put/get/delete/stat a blob by key".
//! Multiple providers can be registered under distinct names in a
//! [`ProviderRegistry`], which is constructed once at startup and injected
//! into the services that need it. Blobs are only ever deleted through the
//! image catalog, never by callers holding a raw key.

mod error;
mod provider;
mod registry;

pub use error::StorageError;
pub use provider::{ObjectMetadata, ObjectStore, OpendalStore, StoredObject};
pub use registry::ProviderRegistry;
