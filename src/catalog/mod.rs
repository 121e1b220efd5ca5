//! Metadata catalog client and entity resolution
//!
//! [`CatalogClient`] is the transport seam: [`AtlasClient`] talks to an
//! Apache Atlas v2 REST API, [`InMemoryCatalog`] keeps entities in process.
//! [`EntityResolver`] layers get-or-create with a second-chance read on top,
//! so repeated or concurrent runs converge on one entity per qualified name.

mod client;
mod entity;
mod error;
mod memory;
mod resolver;
mod retry;

#[cfg(feature = "atlas-client")]
mod atlas;

pub use client::CatalogClient;
pub use entity::{CatalogEntity, ClassificationDef, EntityRef, QUALIFIED_NAME, Relationship};
pub use error::CatalogError;
pub use memory::InMemoryCatalog;
pub use resolver::{EntityResolver, Resolved};
pub use retry::RetryPolicy;

#[cfg(feature = "atlas-client")]
pub use atlas::{AtlasClient, CatalogCredentials};
