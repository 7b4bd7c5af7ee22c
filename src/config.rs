// Copyright 2025 Cowboy AI, LLC.

//! Engine configuration
//!
//! Loaded from TOML. Every section is optional and falls back to the
//! canonical defaults:
//!
//! ```toml
//! [registration]
//! max_title_len = 200
//! max_segment_len = 10
//!
//! [nats]
//! bucket_name = "opex-workflow"
//! history = 10
//! ttl_seconds = 0
//!
//! [[stages]]
//! number = 1
//! name = "Register Initiative"
//! required_role = "INIT_LEAD"
//! activation = { kind = "always" }
//! ```
//!
//! When `[[stages]]` is present it replaces the whole stage table and is
//! validated as a unit.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::errors::{WorkflowError, WorkflowResult};
use crate::persistence::NatsKvConfig;
use crate::workflow::{RegistrationLimits, WorkflowDefinition};

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Registration field limits
    pub registration: RegistrationLimits,
    /// NATS KV store settings
    pub nats: NatsKvConfig,
    /// Stage table
    #[serde(rename = "stages")]
    pub workflow: WorkflowDefinition,
}

impl EngineConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> WorkflowResult<Self> {
        let config: EngineConfig = toml::from_str(source)
            .map_err(|e| WorkflowError::Configuration(e.to_string()))?;
        config.validate()?;
        debug!(stages = config.workflow.len(), "engine configuration loaded");
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> WorkflowResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            WorkflowError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    /// Check values that cannot be enforced by the types alone
    pub fn validate(&self) -> WorkflowResult<()> {
        if self.registration.max_title_len == 0 {
            return Err(WorkflowError::Configuration(
                "registration.max_title_len must be positive".to_string(),
            ));
        }
        if self.registration.max_segment_len == 0 {
            return Err(WorkflowError::Configuration(
                "registration.max_segment_len must be positive".to_string(),
            ));
        }
        self.nats.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::Role;
    use crate::workflow::{ActivationRule, DecisionKind, StageFlag};
    use std::io::Write;

    #[test]
    fn test_empty_document_gives_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.workflow.len(), 15);
        assert_eq!(config.registration.max_title_len, 200);
    }

    #[test]
    fn test_custom_stage_table() {
        let config = EngineConfig::from_toml_str(
            r#"
            [registration]
            max_title_len = 80

            [[stages]]
            number = 1
            name = "Register"
            required_role = "INIT_LEAD"

            [[stages]]
            number = 2
            name = "CAPEX?"
            required_role = "SITE_TSO_LEAD"
            decision = "capex_requirement"

            [[stages]]
            number = 3
            name = "CAPEX"
            required_role = "SITE_TSO_LEAD"
            activation = { kind = "conditional", flag = "requires_capex" }

            [[stages]]
            number = 4
            name = "Close"
            required_role = "SITE_CORP_TSO"
            "#,
        )
        .unwrap();

        assert_eq!(config.registration.max_title_len, 80);
        assert_eq!(config.registration.max_segment_len, 10);
        assert_eq!(config.workflow.len(), 4);
        let capex = config.workflow.stage(3).unwrap();
        assert_eq!(
            capex.activation,
            ActivationRule::Conditional {
                flag: StageFlag::RequiresCapex
            }
        );
        assert_eq!(
            config.workflow.stage(2).unwrap().decision,
            Some(DecisionKind::CapexRequirement)
        );
        assert_eq!(config.workflow.stage(4).unwrap().required_role, Role::SiteCorpTso);
    }

    #[test]
    fn test_invalid_stage_table_is_a_configuration_error() {
        let err = EngineConfig::from_toml_str(
            r#"
            [[stages]]
            number = 1
            name = "Register"
            required_role = "INIT_LEAD"
            activation = { kind = "conditional", flag = "requires_moc" }
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::Configuration(_)));
    }

    #[test]
    fn test_invalid_limits_and_bucket() {
        let err = EngineConfig::from_toml_str("[registration]\nmax_title_len = 0\n").unwrap_err();
        assert!(matches!(err, WorkflowError::Configuration(_)));

        let err = EngineConfig::from_toml_str("[nats]\nbucket_name = \"a b\"\n").unwrap_err();
        assert!(matches!(err, WorkflowError::Configuration(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[nats]\nbucket_name = \"opex-test\"\nhistory = 5").unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.nats.bucket_name, "opex-test");
        assert_eq!(config.nats.history, 5);
        assert_eq!(config.nats.ttl_seconds, 0);

        assert!(EngineConfig::from_file("/definitely/not/here.toml").is_err());
    }
}
