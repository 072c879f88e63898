use thiserror::Error;

/// Typed errors for taxonomy projection and store construction.
#[derive(Debug, Error)]
pub enum ForgeError {
    #[error("malformed STIX bundle: {message}")]
    MalformedBundle { message: String },

    #[error("technique {attack_id} [{stix_id}] has no kill chain phases")]
    MissingTacticMembership { attack_id: String, stix_id: String },

    #[error("technique {attack_id} [{stix_id}] is flagged as a sub-technique but has no subtechnique-of relationship")]
    MissingParentRelationship { attack_id: String, stix_id: String },

    #[error("technique {attack_id} [{stix_id}] references unknown tactic shortname '{shortname}'")]
    UnknownTactic {
        shortname: String,
        attack_id: String,
        stix_id: String,
    },

    #[error("record [{stix_id}] is missing required attribute '{attribute}'")]
    MissingAttribute { attribute: String, stix_id: String },
}

pub type Result<T> = std::result::Result<T, ForgeError>;

impl ForgeError {
    pub fn malformed_bundle<S: Into<String>>(message: S) -> Self {
        Self::MalformedBundle { message: message.into() }
    }

    pub fn missing_tactic_membership<S1: Into<String>, S2: Into<String>>(attack_id: S1, stix_id: S2) -> Self {
        Self::MissingTacticMembership { attack_id: attack_id.into(), stix_id: stix_id.into() }
    }

    pub fn missing_parent_relationship<S1: Into<String>, S2: Into<String>>(attack_id: S1, stix_id: S2) -> Self {
        Self::MissingParentRelationship { attack_id: attack_id.into(), stix_id: stix_id.into() }
    }

    pub fn unknown_tactic<S1: Into<String>, S2: Into<String>, S3: Into<String>>(
        shortname: S1,
        attack_id: S2,
        stix_id: S3,
    ) -> Self {
        Self::UnknownTactic {
            shortname: shortname.into(),
            attack_id: attack_id.into(),
            stix_id: stix_id.into(),
        }
    }

    pub fn missing_attribute<S1: Into<String>, S2: Into<String>>(attribute: S1, stix_id: S2) -> Self {
        Self::MissingAttribute { attribute: attribute.into(), stix_id: stix_id.into() }
    }

    /// Returns true if the error is confined to a single record and the run can continue
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::MissingTacticMembership { .. }
                | Self::MissingParentRelationship { .. }
                | Self::UnknownTactic { .. }
                | Self::MissingAttribute { .. }
        )
    }
}

impl From<serde_json::Error> for ForgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::malformed_bundle(err.to_string())
    }
}
