//! Lineage registration
//!
//! After a load, [`LineageRegistrar`] resolves the source artifact, the
//! target database and table, and one process entity per logical pipeline
//! whose `inputs`/`outputs` reference the two artifacts. Registration
//! failures are reported in a [`LineageReport`] and never undo the load.

mod names;
mod registrar;
mod report;

pub use names::{CatalogTypes, LineageNames};
pub use registrar::{LineageRegistrar, RunMetadata, SourceArtifact, TargetTable};
pub use report::{EntityOutcome, EntityRole, EntityStatus, LineageReport};
