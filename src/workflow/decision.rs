// Copyright 2025 Cowboy AI, LLC.

//! Decision payloads recorded by decision-point stages

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::definition::DecisionKind;
use crate::errors::{WorkflowError, WorkflowResult};
use crate::identifiers::UserId;

/// Stage-specific fields supplied with an approval
///
/// Every field is optional on the wire; which ones are required depends on the
/// [`DecisionKind`] of the stage being approved. Fields that the stage does not
/// use are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DecisionPayload {
    /// Initiative Lead chosen at the assign-responsibilities stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_user_id: Option<UserId>,
    /// Answer to the MOC decision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_moc: Option<bool>,
    /// MOC reference, required when `requires_moc` is true
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub moc_number: Option<String>,
    /// Answer to the CAPEX decision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_capex: Option<bool>,
    /// CAPEX reference, required when `requires_capex` is true
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capex_number: Option<String>,
}

impl DecisionPayload {
    /// Empty payload for stages without a decision
    pub fn none() -> Self {
        Self::default()
    }

    /// Payload for the assign-responsibilities stage
    pub fn assign(user_id: impl Into<UserId>) -> Self {
        Self {
            assigned_user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    /// Payload for the MOC decision stage
    pub fn moc(requires_moc: bool, moc_number: Option<&str>) -> Self {
        Self {
            requires_moc: Some(requires_moc),
            moc_number: moc_number.map(str::to_string),
            ..Self::default()
        }
    }

    /// Payload for the CAPEX decision stage
    pub fn capex(requires_capex: bool, capex_number: Option<&str>) -> Self {
        Self {
            requires_capex: Some(requires_capex),
            capex_number: capex_number.map(str::to_string),
            ..Self::default()
        }
    }

    /// Check the fields `decision` requires and reduce to a [`StageDecision`]
    pub fn validate_for(&self, decision: Option<DecisionKind>) -> WorkflowResult<StageDecision> {
        match decision {
            None => Ok(StageDecision::None),
            Some(DecisionKind::AssignResponsibilities) => self
                .assigned_user_id
                .map(|user_id| StageDecision::AssignLead { user_id })
                .ok_or_else(|| WorkflowError::validation("assignedUserId is required")),
            Some(DecisionKind::MocRequirement) => {
                let required = self
                    .requires_moc
                    .ok_or_else(|| WorkflowError::validation("requiresMoc is required"))?;
                let number = reference(required, self.moc_number.as_deref(), "mocNumber")?;
                Ok(StageDecision::Moc { required, number })
            }
            Some(DecisionKind::CapexRequirement) => {
                let required = self
                    .requires_capex
                    .ok_or_else(|| WorkflowError::validation("requiresCapex is required"))?;
                let number = reference(required, self.capex_number.as_deref(), "capexNumber")?;
                Ok(StageDecision::Capex { required, number })
            }
        }
    }
}

fn reference(required: bool, number: Option<&str>, field: &str) -> WorkflowResult<Option<String>> {
    if !required {
        return Ok(None);
    }
    match number.map(str::trim) {
        Some(n) if !n.is_empty() => Ok(Some(n.to_string())),
        _ => Err(WorkflowError::validation(format!(
            "{field} is required when the requirement is true"
        ))),
    }
}

/// A validated decision, ready to be applied to the initiative
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageDecision {
    /// Stage without a decision
    None,
    /// Initiative Lead assignment
    AssignLead {
        /// Chosen lead
        user_id: UserId,
    },
    /// MOC requirement
    Moc {
        /// Whether MOC is required
        required: bool,
        /// MOC reference when required
        number: Option<String>,
    },
    /// CAPEX requirement
    Capex {
        /// Whether CAPEX is required
        required: bool,
        /// CAPEX reference when required
        number: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_stage_ignores_payload() {
        let payload = DecisionPayload::moc(true, None);
        assert_eq!(payload.validate_for(None).unwrap(), StageDecision::None);
    }

    #[test]
    fn test_assignment_requires_user() {
        let err = DecisionPayload::none()
            .validate_for(Some(DecisionKind::AssignResponsibilities))
            .unwrap_err();
        assert!(err.is_validation_error());

        let decision = DecisionPayload::assign(42)
            .validate_for(Some(DecisionKind::AssignResponsibilities))
            .unwrap();
        assert_eq!(decision, StageDecision::AssignLead { user_id: UserId(42) });
    }

    #[test]
    fn test_moc_number_required_only_when_moc_required() {
        let kind = Some(DecisionKind::MocRequirement);
        assert!(DecisionPayload::none().validate_for(kind).is_err());
        assert!(DecisionPayload::moc(true, None).validate_for(kind).is_err());
        assert!(DecisionPayload::moc(true, Some("  ")).validate_for(kind).is_err());

        assert_eq!(
            DecisionPayload::moc(true, Some(" MOC-17 ")).validate_for(kind).unwrap(),
            StageDecision::Moc {
                required: true,
                number: Some("MOC-17".to_string())
            }
        );
        assert_eq!(
            DecisionPayload::moc(false, Some("ignored")).validate_for(kind).unwrap(),
            StageDecision::Moc {
                required: false,
                number: None
            }
        );
    }

    #[test]
    fn test_capex_number_required_when_capex_required() {
        let kind = Some(DecisionKind::CapexRequirement);
        assert!(DecisionPayload::capex(true, None).validate_for(kind).is_err());
        assert!(DecisionPayload::capex(false, None).validate_for(kind).is_ok());
    }

    #[test]
    fn test_payload_wire_shape_is_camel_case() {
        let payload: DecisionPayload =
            serde_json::from_str(r#"{"requiresMoc": true, "mocNumber": "MOC-1"}"#).unwrap();
        assert_eq!(payload, DecisionPayload::moc(true, Some("MOC-1")));

        let json = serde_json::to_value(DecisionPayload::assign(7)).unwrap();
        assert_eq!(json, serde_json::json!({"assignedUserId": 7}));
    }
}
