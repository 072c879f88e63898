use anyhow::Result;
use stixforge::{
    project_bundle, Domain, DomainFields, DomainOutput, ForgeError, ProjectOptions,
    TechniqueDescriptor,
};

const ENTERPRISE_BUNDLE: &str = include_str!("fixtures/enterprise_bundle.json");

fn enterprise_output() -> DomainOutput {
    project_bundle(ENTERPRISE_BUNDLE, &ProjectOptions::default()).unwrap()
}

fn technique<'a>(output: &'a DomainOutput, attack_id: &str) -> &'a TechniqueDescriptor {
    output
        .techniques
        .iter()
        .find(|t| t.base.attack_id.as_deref() == Some(attack_id))
        .unwrap_or_else(|| panic!("no technique {attack_id} in output"))
}

/// Tactics come out in source order, as an interface/abstract pair per record,
/// with revoked tactics excluded
#[test]
fn test_tactic_projection() {
    let output = enterprise_output();

    let class_names: Vec<_> = output.tactics.iter().map(|t| t.class_name.as_str()).collect();
    assert_eq!(class_names, vec!["InitialAccess", "DefenseEvasion", "Execution"]);

    let initial_access = &output.tactics[0];
    assert_eq!(initial_access.shortname, "initial-access");
    assert_eq!(initial_access.abstract_class_name, "AbstractInitialAccess");
    assert_eq!(initial_access.package_name, "org.mitre.attack.tactic");
    assert_eq!(initial_access.domain, Domain::Enterprise);
    assert_eq!(initial_access.base.attack_id.as_deref(), Some("TA0001"));
    assert_eq!(initial_access.base.created.as_deref(), Some("17 October 2018"));
    assert_eq!(initial_access.base.modified.as_deref(), Some("19 July 2019"));
}

/// The root-technique scenario: single tactic membership, root class extends
#[test]
fn test_root_technique_descriptor() {
    let output = enterprise_output();
    let drive_by = technique(&output, "T1189");

    assert_eq!(drive_by.class_name, "DriveByCompromise");
    assert!(!drive_by.is_subtechnique);
    assert_eq!(drive_by.tactics, "Initial Access");
    assert_eq!(drive_by.implements, vec!["org.mitre.attack.tactic.InitialAccess"]);
    assert_eq!(drive_by.extends, "org.mitre.attack.AttackMatrix");
    assert_eq!(drive_by.package_name, "org.mitre.attack.technique");
    assert_eq!(drive_by.parent_class_name, None);
    assert_eq!(drive_by.base.version.as_deref(), Some("1.3"));
    assert_eq!(
        drive_by.base.url.as_deref(),
        Some("https://attack.mitre.org/techniques/T1189")
    );
}

/// Sub-techniques extend their parent's class and land in a package segment
/// named after the lower-cased parent identifier
#[test]
fn test_subtechnique_placement() {
    let output = enterprise_output();
    let spearphish = technique(&output, "T1566.001");

    assert!(spearphish.is_subtechnique);
    assert_eq!(spearphish.parent_class_name.as_deref(), Some("Phishing"));
    assert_eq!(spearphish.parent_attack_id.as_deref(), Some("T1566"));
    assert_eq!(spearphish.extends, "org.mitre.attack.technique.Phishing");
    assert_eq!(spearphish.package_name, "org.mitre.attack.technique.phishing");
    // A sub-technique still implements every tactic interface it is tagged with
    assert_eq!(spearphish.implements, vec!["org.mitre.attack.tactic.InitialAccess"]);
}

/// Multi-tactic membership: display names sorted and joined, one interface
/// reference per distinct tactic
#[test]
fn test_multi_tactic_membership() {
    let output = enterprise_output();
    let obfuscated = technique(&output, "T1027");

    assert_eq!(obfuscated.tactics, "Defense Evasion, Execution");
    assert_eq!(
        obfuscated.implements,
        vec![
            "org.mitre.attack.tactic.DefenseEvasion",
            "org.mitre.attack.tactic.Execution",
        ]
    );
}

/// Sort semantics per field: platforms and data sources case-sensitive,
/// permissions case-insensitive
#[test]
fn test_join_sort_semantics() {
    let output = enterprise_output();

    let drive_by = technique(&output, "T1189");
    assert_eq!(drive_by.platforms.as_deref(), Some("Linux, SaaS, Windows, macOS"));
    assert_eq!(
        drive_by.data_sources.as_deref(),
        Some("Application Log: Application Log Content, Network Traffic: Network Traffic Content")
    );
    assert_eq!(drive_by.base.contributors.as_deref(), Some("Jeff Sakowicz; Saisha Agrawal"));

    let interpreter = technique(&output, "T1059");
    let DomainFields::Enterprise(fields) = &interpreter.domain_fields else {
        panic!("expected enterprise fields");
    };
    assert_eq!(
        fields.permissions_required.as_deref(),
        Some("Administrator, root, SYSTEM, User")
    );
}

/// Phase-gated fields: populated only when the technique carries the gating
/// tactic, absent otherwise even if the source attribute exists
#[test]
fn test_phase_gated_fields() {
    let output = enterprise_output();

    let obfuscated = technique(&output, "T1027");
    let DomainFields::Enterprise(fields) = &obfuscated.domain_fields else {
        panic!("expected enterprise fields");
    };
    assert_eq!(
        fields.defenses_bypassed.as_deref(),
        Some("Anti-virus, Host intrusion prevention systems, Signature-based detection")
    );
    // Carries an execution phase but no remote-support attribute
    assert_eq!(fields.supports_remote, None);

    // T1059 has x_mitre_defense_bypassed but no defense-evasion phase
    let interpreter = technique(&output, "T1059");
    let DomainFields::Enterprise(fields) = &interpreter.domain_fields else {
        panic!("expected enterprise fields");
    };
    assert_eq!(fields.defenses_bypassed, None);
    assert_eq!(fields.supports_remote, Some(true));
}

/// CAPEC references surface as a joined id list
#[test]
fn test_capec_references() {
    let output = enterprise_output();

    let drive_by = technique(&output, "T1189");
    let DomainFields::Enterprise(fields) = &drive_by.domain_fields else {
        panic!("expected enterprise fields");
    };
    assert_eq!(fields.capec_ids.as_deref(), Some("CAPEC-184"));

    let phishing = technique(&output, "T1566");
    let DomainFields::Enterprise(fields) = &phishing.domain_fields else {
        panic!("expected enterprise fields");
    };
    assert_eq!(fields.capec_ids, None);
}

/// Free text is escaped for single-line literal embedding
#[test]
fn test_literal_escaping() {
    let output = enterprise_output();

    let drive_by = technique(&output, "T1189");
    let description = drive_by.base.description.as_deref().unwrap();
    assert!(description.contains("known as a 'watering hole' attack"));
    assert!(!description.contains('\n'));
    assert!(!description.contains('"'));

    let interpreter = technique(&output, "T1059");
    let description = interpreter.base.description.as_deref().unwrap();
    assert!(description.contains(r"C:\\Windows\\System32\\cmd.exe"));

    let spearphish = technique(&output, "T1566.001");
    let detection = spearphish.detection.as_deref().unwrap();
    assert!(!detection.contains('\n'));
    assert!(detection.contains("attachments.Detonation chambers"));
}

/// Data-quality problems skip the offending technique and keep the run alive
#[test]
fn test_skipped_techniques() {
    let output = enterprise_output();

    assert_eq!(output.technique_count(), 5);
    assert_eq!(output.subtechnique_count(), 1);
    assert_eq!(output.skipped_count(), 2);

    let skipped_ids: Vec<_> = output
        .skipped
        .iter()
        .map(|s| s.attack_id.as_deref().unwrap())
        .collect();
    assert_eq!(skipped_ids, vec!["T9998", "T9999.001"]);
    assert!(output.skipped[0].reason.contains("kill chain phases"));
    assert!(output.skipped[1].reason.contains("subtechnique-of"));

    // Revoked records are filtered, not reported as skipped
    assert!(!output.techniques.iter().any(|t| t.base.name == "Revoked Technique"));
}

/// Enumeration descriptors: deduplicated, key-ordered, first display string
/// wins, and values from skipped or non-gated fields never register
#[test]
fn test_enum_descriptors() {
    let output = enterprise_output();
    assert_eq!(output.enums.len(), 2);

    let data_sources = &output.enums[0];
    assert_eq!(data_sources.class_name, "DataSource");
    assert_eq!(data_sources.package_name, "org.mitre.attack.enums");
    let keys: Vec<_> = data_sources.constants.iter().map(|c| c.key.as_str()).collect();
    assert_eq!(
        keys,
        vec![
            "APPLICATION_LOG_CONTENT",
            "NETWORK_TRAFFIC_CONTENT",
            "PROCESS_CREATION",
            "WINDOWS_REGISTRY_KEY_CREATION",
        ]
    );
    let registry = data_sources
        .constants
        .iter()
        .find(|c| c.key == "WINDOWS_REGISTRY_KEY_CREATION")
        .unwrap();
    assert_eq!(registry.display, "Windows Registry: Windows Registry Key Creation");

    let defenses = &output.enums[1];
    assert_eq!(defenses.class_name, "DefenseBypassed");
    let keys: Vec<_> = defenses.constants.iter().map(|c| c.key.as_str()).collect();
    assert_eq!(
        keys,
        vec!["ANTI_VIRUS", "HOST_INTRUSION_PREVENTION_SYSTEMS", "SIGNATURE_BASED_DETECTION"]
    );
    // T1059's "Firewall" is not defense-evasion-gated, so it never registers
    assert!(!keys.contains(&"FIREWALL"));
}

/// Projection is deterministic: two runs over the same bundle are identical
#[test]
fn test_projection_is_deterministic() {
    assert_eq!(enterprise_output(), enterprise_output());
}

/// Mobile domain: domain-specific field bag, no data sources, sub-technique
/// placement still applies
#[test]
fn test_mobile_domain_projection() -> Result<()> {
    let bundle = serde_json::json!({
        "type": "bundle",
        "id": "bundle--9c5f4b3e-0000-4000-8000-000000000002",
        "objects": [
            {
                "id": "x-mitre-tactic--m1",
                "type": "x-mitre-tactic",
                "name": "Initial Access",
                "x_mitre_shortname": "initial-access"
            },
            {
                "id": "attack-pattern--m1",
                "type": "attack-pattern",
                "name": "Supply Chain Compromise",
                "x_mitre_tactic_type": ["Post-Adversary Device Access"],
                "x_mitre_data_sources": ["Application Vetting: API Calls"],
                "kill_chain_phases": [
                    {"kill_chain_name": "mitre-mobile-attack", "phase_name": "initial-access"}
                ],
                "external_references": [
                    {"source_name": "mitre-mobile-attack", "external_id": "T1474"},
                    {"source_name": "NIST Mobile Threat Catalogue", "external_id": "SPC-0"}
                ]
            },
            {
                "id": "attack-pattern--m2",
                "type": "attack-pattern",
                "name": "Compromise Software Supply Chain",
                "x_mitre_is_subtechnique": true,
                "kill_chain_phases": [
                    {"kill_chain_name": "mitre-mobile-attack", "phase_name": "initial-access"}
                ],
                "external_references": [
                    {"source_name": "mitre-mobile-attack", "external_id": "T1474.003"}
                ]
            },
            {
                "id": "relationship--m1",
                "type": "relationship",
                "relationship_type": "subtechnique-of",
                "source_ref": "attack-pattern--m2",
                "target_ref": "attack-pattern--m1"
            }
        ]
    });

    let options = ProjectOptions::new(Domain::Mobile, "org.mitre.attack");
    let output = project_bundle(&bundle.to_string(), &options)?;

    let supply_chain = technique(&output, "T1474");
    let DomainFields::Mobile(fields) = &supply_chain.domain_fields else {
        panic!("expected mobile fields");
    };
    assert_eq!(fields.tactic_type.as_deref(), Some("Post-Adversary Device Access"));
    assert_eq!(fields.mtc_id.as_deref(), Some("SPC-0"));
    // Data sources are an enterprise/ICS attribute
    assert_eq!(supply_chain.data_sources, None);
    assert!(output.enums.is_empty());

    let sub = technique(&output, "T1474.003");
    assert_eq!(sub.extends, "org.mitre.attack.technique.SupplyChainCompromise");
    assert_eq!(sub.package_name, "org.mitre.attack.technique.supplychaincompromise");

    Ok(())
}

/// Structural problems are fatal, unlike per-record data-quality issues
#[test]
fn test_malformed_bundle_is_fatal() {
    let err = project_bundle("not json at all", &ProjectOptions::default()).unwrap_err();
    assert!(matches!(err, ForgeError::MalformedBundle { .. }));
    assert!(!err.is_recoverable());
}
