//! Cloud storage replication: one adapter per vendor behind
//! [`provider::StorageProvider`], plus the fan-out uploader.

pub mod aws;
pub mod azure;
pub mod chunks;
pub mod factory;
pub mod gcp;
pub mod provider;
pub mod replicator;

#[cfg(test)]
pub(crate) mod testing;

pub use factory::create_provider_handles;
pub use provider::ProviderSet;
pub use replicator::{FolderReplication, Replicator};
