//! stixforge - Convert ATT&CK STIX taxonomy data into class-hierarchy descriptors.
//!
//! The crate takes a STIX bundle of ATT&CK records (tactics, techniques,
//! sub-techniques, relationships), resolves the taxonomy graph, and projects
//! every record into a flat descriptor ready for code generation: class and
//! package names, `extends`/`implements` references, optional per-domain
//! attributes, and shared enumeration constants deduplicated across the
//! whole technique set. Rendering descriptors to source text is the caller's
//! concern.
//!
//! # Example
//!
//! ```no_run
//! use stixforge::{project_bundle, ProjectOptions};
//!
//! let bundle = std::fs::read_to_string("enterprise-attack.json").unwrap();
//! let output = project_bundle(&bundle, &ProjectOptions::default()).unwrap();
//!
//! for technique in &output.techniques {
//!     println!("{} extends {}", technique.class_name, technique.extends);
//! }
//! ```

pub mod error;
pub mod graph;
pub mod naming;
pub mod project;
pub mod stix;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{ForgeError, Result};
pub use graph::{ParentInfo, TacticMembership, TaxonomyGraph};
pub use project::{project_store, ConstantKeySet, ProjectOptions, DEFAULT_PACKAGE, ROOT_CLASS};
pub use stix::{RecordStore, StixObject};
pub use types::{
    Domain, DomainFields, DomainOutput, EnumConstant, EnumDescriptor, SkippedTechnique,
    TacticDescriptor, TechniqueDescriptor,
};

/// Parse a STIX bundle and project it in one call.
///
/// This is the main entry point for embedding. For repeated projections over
/// the same data (e.g. several domains from one bundle), build a
/// [`RecordStore`] once and call [`project_store`] directly.
pub fn project_bundle(bundle_json: &str, options: &ProjectOptions) -> Result<DomainOutput> {
    let store = RecordStore::from_bundle_json(bundle_json)?;
    project::project_store(&store, options)
}
