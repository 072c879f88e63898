//! Record projection: tactics and techniques to class-tree descriptors.
//!
//! One synchronous pass over the store. Per-record data-quality problems are
//! logged and skipped; only structural problems propagate.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::{error, warn};

use crate::error::{ForgeError, Result};
use crate::graph::TaxonomyGraph;
use crate::naming;
use crate::stix::{RecordStore, StixObject, TACTIC_TYPE, TECHNIQUE_TYPE};
use crate::types::{
    BaseDescriptor, Domain, DomainFields, DomainOutput, EnterpriseFields, EnumConstant,
    EnumDescriptor, MobileFields, SkippedTechnique, TacticDescriptor, TechniqueDescriptor,
};

/// Default base package of the generated class tree.
pub const DEFAULT_PACKAGE: &str = "org.mitre.attack";

/// Simple name of the root class every top-level technique extends.
pub const ROOT_CLASS: &str = "AttackMatrix";

/// Projection parameters for one domain run.
#[derive(Debug, Clone)]
pub struct ProjectOptions {
    pub domain: Domain,
    /// Base package of the generated tree
    pub package_name: String,
}

impl Default for ProjectOptions {
    fn default() -> Self {
        Self {
            domain: Domain::Enterprise,
            package_name: DEFAULT_PACKAGE.to_string(),
        }
    }
}

impl ProjectOptions {
    pub fn new<S: Into<String>>(domain: Domain, package_name: S) -> Self {
        Self { domain, package_name: package_name.into() }
    }
}

/// Deduplicating map from normalized constant key to the display string it
/// was first derived from. Iteration order is the key order, so enumeration
/// output is deterministic across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConstantKeySet {
    entries: BTreeMap<String, String>,
}

impl ConstantKeySet {
    /// Derive and register the constant key for a display value, returning
    /// the key. The first writer of a key keeps its display string.
    pub fn register(&mut self, display: &str) -> String {
        let key = naming::constant_key(display);
        self.entries
            .entry(key.clone())
            .or_insert_with(|| display.to_string());
        key
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    fn into_descriptor(self, class_name: &str, package_name: &str) -> EnumDescriptor {
        EnumDescriptor {
            class_name: class_name.to_string(),
            package_name: package_name.to_string(),
            constants: self
                .entries
                .into_iter()
                .map(|(key, display)| EnumConstant { key, display })
                .collect(),
        }
    }
}

/// Accumulators for every categorical field that becomes a shared
/// enumeration, threaded explicitly through the technique pass.
#[derive(Debug, Default)]
struct EnumAccumulators {
    data_sources: ConstantKeySet,
    defenses_bypassed: ConstantKeySet,
}

impl EnumAccumulators {
    fn into_descriptors(self, base_package: &str) -> Vec<EnumDescriptor> {
        let package = format!("{base_package}.enums");
        let mut enums = Vec::new();
        if !self.data_sources.is_empty() {
            enums.push(self.data_sources.into_descriptor("DataSource", &package));
        }
        if !self.defenses_bypassed.is_empty() {
            enums.push(self.defenses_bypassed.into_descriptor("DefenseBypassed", &package));
        }
        enums
    }
}

/// Project every active tactic and technique of the store into descriptors
/// for one domain.
pub fn project_store(store: &RecordStore, options: &ProjectOptions) -> Result<DomainOutput> {
    let graph = TaxonomyGraph::new(store);

    let mut tactics = Vec::new();
    for record in store.active_of_type(TACTIC_TYPE) {
        match project_tactic(record, options) {
            Ok(descriptor) => tactics.push(descriptor),
            Err(err) if err.is_recoverable() => warn!("skipping tactic: {err}"),
            Err(err) => return Err(err),
        }
    }

    let mut accumulators = EnumAccumulators::default();
    let mut techniques = Vec::new();
    let mut skipped = Vec::new();
    for record in store.active_of_type(TECHNIQUE_TYPE) {
        match project_technique(record, &graph, options, &mut accumulators) {
            Ok(descriptor) => techniques.push(descriptor),
            Err(err) if err.is_recoverable() => {
                error!("skipping technique: {err}");
                skipped.push(SkippedTechnique {
                    attack_id: record.attack_id().map(str::to_string),
                    stix_id: record.id.clone(),
                    reason: err.to_string(),
                });
            }
            Err(err) => return Err(err),
        }
    }

    Ok(DomainOutput {
        domain: options.domain,
        root_class: format!("{}.{ROOT_CLASS}", options.package_name),
        enums: accumulators.into_descriptors(&options.package_name),
        package_name: options.package_name.clone(),
        tactics,
        techniques,
        skipped,
    })
}

fn project_tactic(record: &StixObject, options: &ProjectOptions) -> Result<TacticDescriptor> {
    let name = record
        .name
        .clone()
        .ok_or_else(|| ForgeError::missing_attribute("name", &record.id))?;
    let shortname = record
        .x_mitre_shortname
        .clone()
        .ok_or_else(|| ForgeError::missing_attribute("x_mitre_shortname", &record.id))?;

    let class_name = naming::class_name(&name);

    Ok(TacticDescriptor {
        base: base_descriptor(record, name),
        shortname,
        abstract_class_name: format!("Abstract{class_name}"),
        class_name,
        package_name: format!("{}.tactic", options.package_name),
        domain: options.domain,
    })
}

fn project_technique(
    record: &StixObject,
    graph: &TaxonomyGraph<'_>,
    options: &ProjectOptions,
    accumulators: &mut EnumAccumulators,
) -> Result<TechniqueDescriptor> {
    let name = record
        .name
        .clone()
        .ok_or_else(|| ForgeError::missing_attribute("name", &record.id))?;

    // Resolve everything fallible before touching the accumulators, so a
    // skipped technique contributes nothing to the shared enumerations.
    let memberships = graph.resolve_tactic_memberships(record)?;
    let parent = if record.x_mitre_is_subtechnique {
        Some(graph.resolve_parent(record)?)
    } else {
        None
    };

    let base = &options.package_name;
    let shortnames: Vec<&str> = memberships.iter().map(|m| m.shortname.as_str()).collect();

    let mut tactic_names: Vec<&str> = memberships.iter().map(|m| m.display_name.as_str()).collect();
    tactic_names.sort();
    let tactics = tactic_names.join(", ");

    let mut implements: Vec<String> = memberships
        .iter()
        .map(|m| format!("{base}.tactic.{}", naming::class_name(&m.display_name)))
        .collect();
    implements.sort();

    // Sub-techniques extend their parent class and live in a package segment
    // named after it; everything else extends the shared root class.
    let (package_name, extends) = match &parent {
        Some(parent) => (
            format!("{base}.technique.{}", parent.class_name.to_lowercase()),
            format!("{base}.technique.{}", parent.class_name),
        ),
        None => (format!("{base}.technique"), format!("{base}.{ROOT_CLASS}")),
    };

    let data_sources = if options.domain.has_data_sources() {
        record.x_mitre_data_sources.as_ref().map(|values| {
            for value in values {
                accumulators.data_sources.register(value);
            }
            sorted_join(values)
        })
    } else {
        None
    };

    let domain_fields = match options.domain {
        Domain::Enterprise => DomainFields::Enterprise(EnterpriseFields {
            system_requirements: record.x_mitre_system_requirements.as_deref().map(sorted_join),
            permissions_required: record
                .x_mitre_permissions_required
                .as_deref()
                .map(sorted_join_case_insensitive),
            effective_permissions: record
                .x_mitre_effective_permissions
                .as_deref()
                .map(sorted_join_case_insensitive),
            defenses_bypassed: if shortnames.contains(&"defense-evasion") {
                record.x_mitre_defense_bypassed.as_ref().map(|values| {
                    for value in values {
                        accumulators.defenses_bypassed.register(value);
                    }
                    sorted_join(values)
                })
            } else {
                None
            },
            supports_remote: if shortnames.contains(&"execution") {
                record.x_mitre_remote_support
            } else {
                None
            },
            impact_type: if shortnames.contains(&"impact") {
                record.x_mitre_impact_type.as_deref().map(sorted_join)
            } else {
                None
            },
            capec_ids: {
                let ids = record.reference_ids("capec");
                if ids.is_empty() {
                    None
                } else {
                    Some(ids.join(", "))
                }
            },
        }),
        Domain::Mobile => DomainFields::Mobile(MobileFields {
            tactic_type: record.x_mitre_tactic_type.as_deref().map(sorted_join),
            mtc_id: record
                .external_references
                .iter()
                .find(|r| r.source_name == "NIST Mobile Threat Catalogue")
                .and_then(|r| r.external_id.clone()),
        }),
        Domain::Ics => DomainFields::Ics,
    };

    Ok(TechniqueDescriptor {
        class_name: naming::class_name(&name),
        base: base_descriptor(record, name),
        package_name,
        domain: options.domain,
        is_subtechnique: parent.is_some(),
        parent_class_name: parent.as_ref().map(|p| p.class_name.clone()),
        parent_attack_id: parent.and_then(|p| p.attack_id),
        tactics,
        implements,
        extends,
        detection: record.x_mitre_detection.as_deref().map(naming::escape_literal),
        platforms: record.x_mitre_platforms.as_deref().map(sorted_join),
        data_sources,
        domain_fields,
    })
}

fn base_descriptor(record: &StixObject, name: String) -> BaseDescriptor {
    BaseDescriptor {
        attack_id: record.attack_id().map(str::to_string),
        url: record.mitre_url().map(str::to_string),
        name,
        description: record.description.as_deref().map(naming::escape_literal),
        created: record.created.map(format_date),
        modified: record.modified.map(format_date),
        version: record.x_mitre_version.clone(),
        contributors: record.x_mitre_contributors.as_ref().map(|contributors| {
            let mut sorted: Vec<&str> = contributors.iter().map(String::as_str).collect();
            sorted.sort();
            sorted.join("; ")
        }),
    }
}

fn format_date(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%d %B %Y").to_string()
}

/// Case-sensitive sort, ", "-joined. The generated files are diffed across
/// runs, so join order is part of the contract.
fn sorted_join(values: &[String]) -> String {
    let mut sorted: Vec<&str> = values.iter().map(String::as_str).collect();
    sorted.sort();
    sorted.join(", ")
}

/// Case-insensitive sort for the permission fields.
fn sorted_join_case_insensitive(values: &[String]) -> String {
    let mut sorted: Vec<&str> = values.iter().map(String::as_str).collect();
    sorted.sort_by_key(|s| s.to_lowercase());
    sorted.join(", ")
}
