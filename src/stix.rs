//! Raw STIX record model and the indexed in-memory record store.
//!
//! The store is built once per run from an already-parsed ATT&CK bundle and
//! never mutated. It answers the three queries the rest of the crate needs:
//! all records of a type (in source order), a record by id, and
//! relationships filtered by type and source reference.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// STIX object type carrying a tactic.
pub const TACTIC_TYPE: &str = "x-mitre-tactic";
/// STIX object type carrying a technique or sub-technique.
pub const TECHNIQUE_TYPE: &str = "attack-pattern";
/// STIX object type carrying a relationship record.
pub const RELATIONSHIP_TYPE: &str = "relationship";
/// The only relationship type consumed by the resolver.
pub const SUBTECHNIQUE_OF: &str = "subtechnique-of";

/// External reference source names that identify the ATT&CK id and url of a record.
const MITRE_SOURCE_NAMES: [&str; 3] = ["mitre-attack", "mitre-mobile-attack", "mitre-ics-attack"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalReference {
    pub source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A kill-chain phase entry tagging a technique with a tactic shortname.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KillChainPhase {
    pub kill_chain_name: String,
    pub phase_name: String,
}

/// A raw STIX domain object. Only the attributes consumed by the projection
/// are modeled; everything else in the source JSON is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StixObject {
    pub id: String,
    #[serde(rename = "type")]
    pub object_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<DateTime<Utc>>,

    #[serde(default)]
    pub revoked: bool,
    #[serde(default)]
    pub x_mitre_deprecated: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub external_references: Vec<ExternalReference>,

    // Tactic attributes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_mitre_shortname: Option<String>,

    // Technique attributes
    #[serde(default)]
    pub x_mitre_is_subtechnique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kill_chain_phases: Option<Vec<KillChainPhase>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_mitre_detection: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_mitre_platforms: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_mitre_data_sources: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_mitre_system_requirements: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_mitre_permissions_required: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_mitre_effective_permissions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_mitre_defense_bypassed: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_mitre_remote_support: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_mitre_impact_type: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_mitre_tactic_type: Option<Vec<String>>,

    // Shared metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_mitre_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_mitre_contributors: Option<Vec<String>>,

    // Relationship attributes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_ref: Option<String>,
}

impl StixObject {
    /// Revoked and deprecated records are excluded from all processing
    pub fn is_active(&self) -> bool {
        !self.revoked && !self.x_mitre_deprecated
    }

    /// The ATT&CK external id (e.g. "T1189"), taken from the first external
    /// reference when it comes from a MITRE source.
    pub fn attack_id(&self) -> Option<&str> {
        self.mitre_reference().and_then(|r| r.external_id.as_deref())
    }

    /// The ATT&CK site url of the record, if present on the MITRE reference.
    pub fn mitre_url(&self) -> Option<&str> {
        self.mitre_reference().and_then(|r| r.url.as_deref())
    }

    fn mitre_reference(&self) -> Option<&ExternalReference> {
        self.external_references
            .first()
            .filter(|r| MITRE_SOURCE_NAMES.contains(&r.source_name.as_str()))
    }

    /// All external ids attached by the given non-MITRE source (e.g. "capec").
    pub fn reference_ids(&self, source_name: &str) -> Vec<&str> {
        self.external_references
            .iter()
            .filter(|r| r.source_name == source_name)
            .filter_map(|r| r.external_id.as_deref())
            .collect()
    }
}

/// Top-level STIX bundle wrapper, as downloaded from MITRE/CTI.
#[derive(Debug, Deserialize)]
pub struct StixBundle {
    #[serde(default)]
    pub objects: Vec<StixObject>,
}

/// Immutable, indexed collection of STIX records.
#[derive(Debug)]
pub struct RecordStore {
    objects: Vec<StixObject>,
    by_id: FxHashMap<String, usize>,
    by_type: FxHashMap<String, Vec<usize>>,
}

impl RecordStore {
    /// Build a store from raw records. Source order is preserved for every
    /// per-type query.
    pub fn new(objects: Vec<StixObject>) -> Self {
        let mut by_id = FxHashMap::default();
        let mut by_type: FxHashMap<String, Vec<usize>> = FxHashMap::default();

        for (idx, object) in objects.iter().enumerate() {
            by_id.entry(object.id.clone()).or_insert(idx);
            by_type.entry(object.object_type.clone()).or_default().push(idx);
        }

        Self { objects, by_id, by_type }
    }

    /// Parse a STIX bundle (`{"objects": [...]}`) and index its records.
    /// Malformed JSON is fatal.
    pub fn from_bundle_json(json: &str) -> Result<Self> {
        let bundle: StixBundle = serde_json::from_str(json)?;
        Ok(Self::new(bundle.objects))
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Fetch a record by its STIX id.
    pub fn get(&self, id: &str) -> Option<&StixObject> {
        self.by_id.get(id).map(|&idx| &self.objects[idx])
    }

    /// All records of the given type, in source order.
    pub fn all_of_type(&self, object_type: &str) -> Vec<&StixObject> {
        self.by_type
            .get(object_type)
            .map(|indices| indices.iter().map(|&idx| &self.objects[idx]).collect())
            .unwrap_or_default()
    }

    /// All non-revoked, non-deprecated records of the given type, in source order.
    pub fn active_of_type(&self, object_type: &str) -> Vec<&StixObject> {
        self.all_of_type(object_type)
            .into_iter()
            .filter(|o| o.is_active())
            .collect()
    }

    /// Relationship records of the given relationship type outgoing from
    /// `source_ref`, in source order.
    pub fn relationships(&self, relationship_type: &str, source_ref: &str) -> Vec<&StixObject> {
        self.all_of_type(RELATIONSHIP_TYPE)
            .into_iter()
            .filter(|o| o.relationship_type.as_deref() == Some(relationship_type))
            .filter(|o| o.source_ref.as_deref() == Some(source_ref))
            .collect()
    }
}
