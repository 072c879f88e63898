//! Taxonomy graph resolution.
//!
//! Resolves the tactic↔technique and technique↔sub-technique relationships
//! from the flat record set: the tactic shortname table, each technique's
//! tactic memberships, and the single parent of a sub-technique.

use rustc_hash::FxHashMap;

use crate::error::{ForgeError, Result};
use crate::naming;
use crate::stix::{RecordStore, StixObject, SUBTECHNIQUE_OF, TACTIC_TYPE};

/// Resolved parent of a sub-technique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentInfo {
    pub name: String,
    pub class_name: String,
    /// ATT&CK external id of the parent, when its record carries one
    pub attack_id: Option<String>,
}

/// One tactic membership of a technique, in phase-list order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TacticMembership {
    pub shortname: String,
    pub display_name: String,
}

/// Relationship resolver over an immutable record store.
pub struct TaxonomyGraph<'a> {
    store: &'a RecordStore,
    tactic_names: FxHashMap<String, String>,
}

impl<'a> TaxonomyGraph<'a> {
    /// Build the resolver, including the shortname → display name table over
    /// all active tactics.
    pub fn new(store: &'a RecordStore) -> Self {
        let mut tactic_names = FxHashMap::default();
        for tactic in store.active_of_type(TACTIC_TYPE) {
            if let (Some(shortname), Some(name)) = (&tactic.x_mitre_shortname, &tactic.name) {
                tactic_names.insert(shortname.clone(), name.clone());
            }
        }
        Self { store, tactic_names }
    }

    pub fn tactic_display_name(&self, shortname: &str) -> Option<&str> {
        self.tactic_names.get(shortname).map(String::as_str)
    }

    pub fn tactic_count(&self) -> usize {
        self.tactic_names.len()
    }

    /// Resolve the parent technique of a sub-technique via its
    /// `subtechnique-of` relationship. The first relationship in source order
    /// wins when several exist.
    ///
    /// A technique flagged as a sub-technique without a usable relationship
    /// (none recorded, dangling target, or a nameless target record) yields
    /// [`ForgeError::MissingParentRelationship`].
    pub fn resolve_parent(&self, technique: &StixObject) -> Result<ParentInfo> {
        let missing = || {
            ForgeError::missing_parent_relationship(
                technique.attack_id().unwrap_or("<no ATT&CK id>"),
                &technique.id,
            )
        };

        let relationship = self
            .store
            .relationships(SUBTECHNIQUE_OF, &technique.id)
            .into_iter()
            .next()
            .ok_or_else(missing)?;

        let parent = relationship
            .target_ref
            .as_deref()
            .and_then(|target| self.store.get(target))
            .ok_or_else(missing)?;

        let name = parent.name.clone().ok_or_else(missing)?;

        Ok(ParentInfo {
            class_name: naming::class_name(&name),
            attack_id: parent.attack_id().map(str::to_string),
            name,
        })
    }

    /// Resolve the tactic memberships of a technique from its kill-chain
    /// phase list, in source order. Duplicate phases are kept as-is.
    ///
    /// A technique with no phases at all is rejected with
    /// [`ForgeError::MissingTacticMembership`]; a phase naming a shortname
    /// missing from the tactic table yields [`ForgeError::UnknownTactic`].
    pub fn resolve_tactic_memberships(&self, technique: &StixObject) -> Result<Vec<TacticMembership>> {
        let attack_id = technique.attack_id().unwrap_or("<no ATT&CK id>");

        let phases = technique
            .kill_chain_phases
            .as_deref()
            .filter(|phases| !phases.is_empty())
            .ok_or_else(|| ForgeError::missing_tactic_membership(attack_id, &technique.id))?;

        let mut memberships = Vec::with_capacity(phases.len());
        for phase in phases {
            let display_name = self
                .tactic_names
                .get(&phase.phase_name)
                .ok_or_else(|| ForgeError::unknown_tactic(&phase.phase_name, attack_id, &technique.id))?;
            memberships.push(TacticMembership {
                shortname: phase.phase_name.clone(),
                display_name: display_name.clone(),
            });
        }

        Ok(memberships)
    }
}
