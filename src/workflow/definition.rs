// Copyright 2025 Cowboy AI, LLC.

//! Static stage definitions
//!
//! The stage table is configuration, not per-initiative state. It is loaded
//! once, validated, and shared read-only across every engine call. Each stage
//! carries a declarative activation rule; the engine evaluates the rules
//! centrally when computing the next stage instead of branching on stage
//! numbers.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::errors::{WorkflowError, WorkflowResult};
use crate::roles::Role;

/// Initiative flags that can switch a conditional stage off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StageFlag {
    /// Set by the MOC decision stage
    RequiresMoc,
    /// Set by the CAPEX decision stage
    RequiresCapex,
}

/// When a stage is activated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActivationRule {
    /// Every initiative passes through this stage
    Always,
    /// Activated only when `flag` is true
    Conditional {
        /// Flag that gates the stage
        flag: StageFlag,
    },
}

/// Decision a stage must record when approved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// Pick the Initiative Lead responsible for the initiative
    AssignResponsibilities,
    /// Decide whether Management of Change is required
    MocRequirement,
    /// Decide whether a capital expenditure request is required
    CapexRequirement,
}

impl DecisionKind {
    /// The flag this decision sets, if any
    pub fn sets_flag(&self) -> Option<StageFlag> {
        match self {
            DecisionKind::AssignResponsibilities => None,
            DecisionKind::MocRequirement => Some(StageFlag::RequiresMoc),
            DecisionKind::CapexRequirement => Some(StageFlag::RequiresCapex),
        }
    }
}

/// Decided branch flags of one initiative; `None` means not decided yet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchFlags {
    /// MOC requirement
    pub requires_moc: Option<bool>,
    /// CAPEX requirement
    pub requires_capex: Option<bool>,
}

impl BranchFlags {
    /// Value of `flag`
    pub fn get(&self, flag: StageFlag) -> Option<bool> {
        match flag {
            StageFlag::RequiresMoc => self.requires_moc,
            StageFlag::RequiresCapex => self.requires_capex,
        }
    }
}

/// One row of the stage table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StageDefinition {
    /// 1-based stage number
    pub number: u8,
    /// Display name
    pub name: String,
    /// Role required to approve or reject
    pub required_role: Role,
    /// Activation rule
    #[serde(default = "always")]
    pub activation: ActivationRule,
    /// Decision recorded on approval, if the stage is a decision point
    #[serde(default)]
    pub decision: Option<DecisionKind>,
}

fn always() -> ActivationRule {
    ActivationRule::Always
}

impl StageDefinition {
    /// An always-active stage
    pub fn new(number: u8, name: impl Into<String>, required_role: Role) -> Self {
        Self {
            number,
            name: name.into(),
            required_role,
            activation: ActivationRule::Always,
            decision: None,
        }
    }

    /// Make the stage conditional on `flag`
    pub fn when(mut self, flag: StageFlag) -> Self {
        self.activation = ActivationRule::Conditional { flag };
        self
    }

    /// Make the stage a decision point
    pub fn deciding(mut self, decision: DecisionKind) -> Self {
        self.decision = Some(decision);
        self
    }

    /// Whether the stage must record a decision
    pub fn is_decision_point(&self) -> bool {
        self.decision.is_some()
    }

    /// Whether the stage runs for an initiative with `flags`
    ///
    /// A conditional stage whose flag is still undecided counts as active.
    pub fn is_active(&self, flags: &BranchFlags) -> bool {
        match self.activation {
            ActivationRule::Always => true,
            ActivationRule::Conditional { flag } => flags.get(flag) != Some(false),
        }
    }
}

/// Result of looking for the stage after an approved one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advance<'a> {
    /// Next stage to activate, `None` when the workflow is complete
    pub next: Option<&'a StageDefinition>,
    /// Stage numbers passed over because their activation rule was false
    pub skipped: Vec<u8>,
}

/// The validated, ordered stage table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<StageDefinition>", into = "Vec<StageDefinition>")]
pub struct WorkflowDefinition {
    stages: IndexMap<u8, StageDefinition>,
}

impl WorkflowDefinition {
    /// Build and validate a stage table
    pub fn new(stages: Vec<StageDefinition>) -> WorkflowResult<Self> {
        validate(&stages)?;
        Ok(Self {
            stages: stages.into_iter().map(|s| (s.number, s)).collect(),
        })
    }

    /// The canonical 15-stage OpEx table
    pub fn standard() -> Self {
        use DecisionKind::*;
        use Role::*;
        use StageFlag::*;

        let stages = vec![
            StageDefinition::new(1, "Register Initiative", InitLead),
            StageDefinition::new(2, "Approval (Decision Point)", Approver),
            StageDefinition::new(3, "Assign Initiative ID & Define Responsibilities", SiteTsoLead)
                .deciding(AssignResponsibilities),
            StageDefinition::new(4, "MOC Required? (Decision Point)", InitLead)
                .deciding(MocRequirement),
            StageDefinition::new(5, "MOC", InitLead).when(RequiresMoc),
            StageDefinition::new(6, "MOC Approved", InitLead),
            StageDefinition::new(7, "CAPEX Required? (Decision Point)", InitLead)
                .deciding(CapexRequirement),
            StageDefinition::new(8, "CAPEX Process", SiteTsoLead).when(RequiresCapex),
            StageDefinition::new(9, "CAPEX Approved", SiteTsoLead),
            StageDefinition::new(10, "Prepare Initiative Timeline Tracker", InitLead),
            StageDefinition::new(11, "Trial Implementation and Performance Check", SiteTsoLead),
            StageDefinition::new(12, "Periodic Status Review with CMO", CorpTso),
            StageDefinition::new(13, "Savings Monitoring for 1 Month", SiteCorpTso),
            StageDefinition::new(14, "Savings Validation with F&A", SiteCorpTso),
            StageDefinition::new(15, "Initiative Closure", SiteTsoLead),
        ];

        Self {
            stages: stages.into_iter().map(|s| (s.number, s)).collect(),
        }
    }

    /// Stage `number`, if defined
    pub fn stage(&self, number: u8) -> Option<&StageDefinition> {
        self.stages.get(&number)
    }

    /// Stage `number`, or `NotFound`
    pub fn require_stage(&self, number: u8) -> WorkflowResult<&StageDefinition> {
        self.stage(number)
            .ok_or_else(|| WorkflowError::not_found("StageDefinition", number))
    }

    /// The entry stage
    pub fn first_stage(&self) -> &StageDefinition {
        // validated non-empty
        &self.stages[0]
    }

    /// Number of the closing stage
    pub fn last_stage_number(&self) -> u8 {
        self.stages.len() as u8
    }

    /// All stages in order
    pub fn stages(&self) -> impl Iterator<Item = &StageDefinition> {
        self.stages.values()
    }

    /// Number of stages in the table
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Always false for a validated table
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Next stage after `after` whose activation rule holds for `flags`
    pub fn advance(&self, after: u8, flags: &BranchFlags) -> Advance<'_> {
        let mut skipped = Vec::new();
        for stage in self.stages.values().filter(|s| s.number > after) {
            if stage.is_active(flags) {
                return Advance {
                    next: Some(stage),
                    skipped,
                };
            }
            skipped.push(stage.number);
        }
        Advance {
            next: None,
            skipped,
        }
    }

    /// Number of stages an initiative with `flags` will pass through
    pub fn active_stage_count(&self, flags: &BranchFlags) -> usize {
        self.stages.values().filter(|s| s.is_active(flags)).count()
    }
}

impl Default for WorkflowDefinition {
    fn default() -> Self {
        Self::standard()
    }
}

impl TryFrom<Vec<StageDefinition>> for WorkflowDefinition {
    type Error = WorkflowError;

    fn try_from(stages: Vec<StageDefinition>) -> Result<Self, Self::Error> {
        Self::new(stages)
    }
}

impl From<WorkflowDefinition> for Vec<StageDefinition> {
    fn from(definition: WorkflowDefinition) -> Self {
        definition.stages.into_values().collect()
    }
}

fn validate(stages: &[StageDefinition]) -> WorkflowResult<()> {
    let invalid = |msg: String| Err(WorkflowError::Configuration(msg));

    if stages.is_empty() {
        return invalid("stage table is empty".to_string());
    }
    if stages.len() > u8::MAX as usize {
        return invalid(format!("stage table has {} stages", stages.len()));
    }

    let mut decisions = HashSet::new();
    let mut decided_flags = HashSet::new();

    for (index, stage) in stages.iter().enumerate() {
        let expected = (index + 1) as u8;
        if stage.number != expected {
            return invalid(format!(
                "stage numbers must be contiguous from 1: expected {expected}, found {}",
                stage.number
            ));
        }
        if stage.name.trim().is_empty() {
            return invalid(format!("stage {} has no name", stage.number));
        }
        if let ActivationRule::Conditional { flag } = stage.activation {
            if index == 0 || index == stages.len() - 1 {
                return invalid(format!(
                    "stage {} is conditional but the first and last stages must always run",
                    stage.number
                ));
            }
            if !decided_flags.contains(&flag) {
                return invalid(format!(
                    "stage {} depends on {flag:?} before any stage decides it",
                    stage.number
                ));
            }
        }
        if let Some(decision) = stage.decision {
            if stage.activation != ActivationRule::Always {
                return invalid(format!(
                    "decision stage {} must not be conditional",
                    stage.number
                ));
            }
            if !decisions.insert(decision) {
                return invalid(format!("decision {decision:?} appears more than once"));
            }
            if let Some(flag) = decision.sets_flag() {
                decided_flags.insert(flag);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_standard_table_is_valid() {
        let standard = WorkflowDefinition::standard();
        let rebuilt = WorkflowDefinition::new(standard.stages().cloned().collect()).unwrap();
        assert_eq!(rebuilt, standard);
        assert_eq!(standard.len(), 15);
        assert_eq!(standard.last_stage_number(), 15);
        assert_eq!(standard.first_stage().name, "Register Initiative");
        assert_eq!(
            standard
                .stages()
                .find(|s| s.decision == Some(DecisionKind::MocRequirement))
                .map(|s| s.number),
            Some(4)
        );
        assert_eq!(
            standard
                .stages()
                .find(|s| s.decision == Some(DecisionKind::CapexRequirement))
                .map(|s| s.number),
            Some(7)
        );
    }

    #[test]
    fn test_advance_skips_moc_when_not_required() {
        let def = WorkflowDefinition::standard();
        let flags = BranchFlags {
            requires_moc: Some(false),
            requires_capex: None,
        };
        let advance = def.advance(4, &flags);
        assert_eq!(advance.next.map(|s| s.number), Some(6));
        assert_eq!(advance.skipped, vec![5]);
    }

    #[test]
    fn test_advance_keeps_moc_when_required() {
        let def = WorkflowDefinition::standard();
        let flags = BranchFlags {
            requires_moc: Some(true),
            requires_capex: None,
        };
        let advance = def.advance(4, &flags);
        assert_eq!(advance.next.map(|s| s.number), Some(5));
        assert!(advance.skipped.is_empty());
    }

    #[test]
    fn test_advance_skips_capex_when_not_required() {
        let def = WorkflowDefinition::standard();
        let flags = BranchFlags {
            requires_moc: Some(true),
            requires_capex: Some(false),
        };
        let advance = def.advance(7, &flags);
        assert_eq!(advance.next.map(|s| s.number), Some(9));
        assert_eq!(advance.skipped, vec![8]);
    }

    #[test]
    fn test_advance_past_last_stage_completes() {
        let def = WorkflowDefinition::standard();
        let advance = def.advance(15, &BranchFlags::default());
        assert!(advance.next.is_none());
        assert!(advance.skipped.is_empty());
    }

    #[test]
    fn test_active_stage_count() {
        let def = WorkflowDefinition::standard();
        let undecided = BranchFlags::default();
        assert_eq!(def.active_stage_count(&undecided), 15);

        let lean = BranchFlags {
            requires_moc: Some(false),
            requires_capex: Some(false),
        };
        assert_eq!(def.active_stage_count(&lean), 13);
    }

    #[test]
    fn test_rejects_gaps_in_numbering() {
        let err = WorkflowDefinition::new(vec![
            StageDefinition::new(1, "Register", Role::InitLead),
            StageDefinition::new(3, "Close", Role::SiteTsoLead),
        ])
        .unwrap_err();
        assert!(matches!(err, WorkflowError::Configuration(_)));
    }

    #[test]
    fn test_rejects_conditional_stage_before_its_decision() {
        let err = WorkflowDefinition::new(vec![
            StageDefinition::new(1, "Register", Role::InitLead),
            StageDefinition::new(2, "MOC", Role::InitLead).when(StageFlag::RequiresMoc),
            StageDefinition::new(3, "MOC?", Role::InitLead).deciding(DecisionKind::MocRequirement),
            StageDefinition::new(4, "Close", Role::SiteTsoLead),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("before any stage decides it"));
    }

    #[test]
    fn test_rejects_duplicate_decisions_and_conditional_last_stage() {
        let duplicate = WorkflowDefinition::new(vec![
            StageDefinition::new(1, "Register", Role::InitLead),
            StageDefinition::new(2, "MOC?", Role::InitLead).deciding(DecisionKind::MocRequirement),
            StageDefinition::new(3, "MOC again?", Role::InitLead)
                .deciding(DecisionKind::MocRequirement),
            StageDefinition::new(4, "Close", Role::SiteTsoLead),
        ]);
        assert!(duplicate.is_err());

        let conditional_last = WorkflowDefinition::new(vec![
            StageDefinition::new(1, "Register", Role::InitLead),
            StageDefinition::new(2, "MOC?", Role::InitLead).deciding(DecisionKind::MocRequirement),
            StageDefinition::new(3, "MOC", Role::InitLead).when(StageFlag::RequiresMoc),
        ]);
        assert!(conditional_last.is_err());
    }

    #[test]
    fn test_serializes_as_stage_list() {
        let json = serde_json::to_value(WorkflowDefinition::standard()).unwrap();
        let stages = json.as_array().unwrap();
        assert_eq!(stages.len(), 15);
        assert_eq!(stages[4]["activation"]["kind"], "conditional");
        assert_eq!(stages[4]["activation"]["flag"], "requires_moc");
        assert_eq!(stages[3]["decision"], "moc_requirement");

        let back: WorkflowDefinition = serde_json::from_value(json).unwrap();
        assert_eq!(back, WorkflowDefinition::standard());
    }
}
