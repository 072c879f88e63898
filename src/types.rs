//! Descriptor model for the generated class tree.
//!
//! Descriptors are flat field mappings ready for a rendering step. Field
//! presence is itself meaningful: an optional attribute absent from the
//! source record is absent here, never defaulted.

use serde::{Deserialize, Serialize};

/// ATT&CK domain being projected.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Domain {
    #[serde(rename = "enterprise-attack")]
    Enterprise,
    #[serde(rename = "mobile-attack")]
    Mobile,
    #[serde(rename = "ics-attack")]
    Ics,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Enterprise => "enterprise-attack",
            Domain::Mobile => "mobile-attack",
            Domain::Ics => "ics-attack",
        }
    }

    /// Domain name without the "-attack" suffix, used in package naming.
    pub fn bare_name(&self) -> &'static str {
        match self {
            Domain::Enterprise => "enterprise",
            Domain::Mobile => "mobile",
            Domain::Ics => "ics",
        }
    }

    /// Whether techniques in this domain carry the data sources attribute.
    pub fn has_data_sources(&self) -> bool {
        matches!(self, Domain::Enterprise | Domain::Ics)
    }
}

impl std::str::FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "enterprise-attack" => Ok(Domain::Enterprise),
            "mobile-attack" => Ok(Domain::Mobile),
            "ics-attack" => Ok(Domain::Ics),
            other => Err(format!("unknown ATT&CK domain: {other}")),
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fields shared by every projected record, extracted from the base STIX
/// properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct BaseDescriptor {
    /// ATT&CK external id, e.g. "TA0001" or "T1189"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attack_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub name: String,
    /// Escaped for single-line literal embedding
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contributors: Option<String>,
}

/// One tactic of the domain. A tactic is rendered twice: as an interface
/// (techniques implement every tactic they belong to) and as an abstract
/// default implementation; both artifacts share these fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TacticDescriptor {
    #[serde(flatten)]
    pub base: BaseDescriptor,
    /// Stable key techniques use for tactic membership, e.g. "initial-access"
    pub shortname: String,
    pub class_name: String,
    pub abstract_class_name: String,
    pub package_name: String,
    pub domain: Domain,
}

/// Enterprise-only optional technique attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnterpriseFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_requirements: Option<String>,
    /// Sorted case-insensitively
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions_required: Option<String>,
    /// Sorted case-insensitively
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effective_permissions: Option<String>,
    /// Only for techniques with a defense-evasion phase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defenses_bypassed: Option<String>,
    /// Only for techniques with an execution phase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supports_remote: Option<bool>,
    /// Only for techniques with an impact phase
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capec_ids: Option<String>,
}

/// Mobile-only optional technique attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MobileFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tactic_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mtc_id: Option<String>,
}

/// Domain-specific attribute bag carried by a technique descriptor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DomainFields {
    Enterprise(EnterpriseFields),
    Mobile(MobileFields),
    Ics,
}

/// One technique or sub-technique of the domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TechniqueDescriptor {
    #[serde(flatten)]
    pub base: BaseDescriptor,
    pub class_name: String,
    /// Package the class is placed in; sub-techniques live in a package
    /// segment named after their lower-cased parent class
    pub package_name: String,
    pub domain: Domain,
    pub is_subtechnique: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_class_name: Option<String>,
    /// ATT&CK id of the parent technique, present iff sub-technique
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_attack_id: Option<String>,
    /// Sorted display names of the tactics this technique belongs to
    pub tactics: String,
    /// Sorted fully-qualified tactic interface references
    pub implements: Vec<String>,
    /// Root class reference, or the parent technique's class for sub-techniques
    pub extends: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platforms: Option<String>,
    /// Enterprise and ICS domains only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_sources: Option<String>,
    pub domain_fields: DomainFields,
}

/// One constant of a generated enumeration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnumConstant {
    /// Normalized identifier, e.g. "WINDOWS_REGISTRY_KEY_CREATION"
    pub key: String,
    /// Original display string the key was derived from
    pub display: String,
}

/// A generated enumeration over a categorical field, deduplicated across the
/// whole technique set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnumDescriptor {
    pub class_name: String,
    pub package_name: String,
    /// Ordered by key
    pub constants: Vec<EnumConstant>,
}

/// A technique excluded from output, with enough context to locate the
/// offending source record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedTechnique {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attack_id: Option<String>,
    pub stix_id: String,
    pub reason: String,
}

/// Full projection result for one domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DomainOutput {
    pub domain: Domain,
    /// Base package of the generated tree, e.g. "org.mitre.attack"
    pub package_name: String,
    /// Fully-qualified root class every top-level technique extends
    pub root_class: String,
    pub tactics: Vec<TacticDescriptor>,
    pub techniques: Vec<TechniqueDescriptor>,
    pub enums: Vec<EnumDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedTechnique>,
}

impl DomainOutput {
    pub fn technique_count(&self) -> usize {
        self.techniques.len()
    }

    pub fn subtechnique_count(&self) -> usize {
        self.techniques.iter().filter(|t| t.is_subtechnique).count()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_round_trip() {
        for domain in [Domain::Enterprise, Domain::Mobile, Domain::Ics] {
            assert_eq!(domain.as_str().parse::<Domain>().unwrap(), domain);
        }
        assert!("windows-attack".parse::<Domain>().is_err());
    }

    #[test]
    fn test_bare_name_strips_suffix() {
        assert_eq!(Domain::Enterprise.bare_name(), "enterprise");
        assert_eq!(Domain::Mobile.bare_name(), "mobile");
    }

    #[test]
    fn test_absent_fields_stay_absent_in_serialized_form() {
        let descriptor = TechniqueDescriptor {
            base: BaseDescriptor { name: "Phishing".to_string(), ..Default::default() },
            class_name: "Phishing".to_string(),
            package_name: "org.mitre.attack.technique".to_string(),
            domain: Domain::Enterprise,
            is_subtechnique: false,
            parent_class_name: None,
            parent_attack_id: None,
            tactics: "Initial Access".to_string(),
            implements: vec!["org.mitre.attack.tactic.InitialAccess".to_string()],
            extends: "org.mitre.attack.AttackMatrix".to_string(),
            detection: None,
            platforms: None,
            data_sources: None,
            domain_fields: DomainFields::Enterprise(EnterpriseFields::default()),
        };

        let value = serde_json::to_value(&descriptor).unwrap();
        let object = value.as_object().unwrap();
        assert!(!object.contains_key("detection"));
        assert!(!object.contains_key("platforms"));
        assert!(!object.contains_key("parent_class_name"));
        assert_eq!(object["extends"], "org.mitre.attack.AttackMatrix");
    }
}
