//! Keycloak realm settings and metadata.

pub mod descriptor;
pub mod settings;

pub use descriptor::{DescriptorCache, DescriptorSource, RealmDescriptor, RealmDescriptorFetcher};
pub use settings::{MASKED_SECRET, RealmConfig};
