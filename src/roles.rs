// Copyright 2025 Cowboy AI, LLC.

//! Roles and capability-based authorization
//!
//! Stages name a required role. A user may act on a stage when the user's role
//! is a member of the set of roles that satisfy the requirement. Composite
//! roles such as `SITE_CORP_TSO` are the union of their base roles, so the
//! check is set membership rather than string equality.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::WorkflowError;

/// Roles known to the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Initiative Lead
    InitLead,
    /// Department approver
    Approver,
    /// Site TSO lead
    SiteTsoLead,
    /// Corporate TSO
    CorpTso,
    /// Composite of site and corporate TSO
    SiteCorpTso,
    /// Site TSD lead, registers initiatives; never required by a stage
    SiteTsdLead,
}

impl Role {
    /// Every role, in declaration order
    pub const ALL: [Role; 6] = [
        Role::InitLead,
        Role::Approver,
        Role::SiteTsoLead,
        Role::CorpTso,
        Role::SiteCorpTso,
        Role::SiteTsdLead,
    ];

    /// Wire code of the role
    pub fn code(&self) -> &'static str {
        match self {
            Role::InitLead => "INIT_LEAD",
            Role::Approver => "APPROVER",
            Role::SiteTsoLead => "SITE_TSO_LEAD",
            Role::CorpTso => "CORP_TSO",
            Role::SiteCorpTso => "SITE_CORP_TSO",
            Role::SiteTsdLead => "SITE_TSD_LEAD",
        }
    }

    /// Roles whose holders satisfy a stage requiring `self`
    pub fn accepted_roles(&self) -> &'static [Role] {
        match self {
            Role::InitLead => &[Role::InitLead],
            Role::Approver => &[Role::Approver],
            Role::SiteTsoLead => &[Role::SiteTsoLead],
            Role::CorpTso => &[Role::CorpTso],
            Role::SiteCorpTso => &[Role::SiteCorpTso, Role::SiteTsoLead, Role::CorpTso],
            Role::SiteTsdLead => &[Role::SiteTsdLead],
        }
    }

    /// Whether a holder of this role may act on a stage requiring `required`
    pub fn satisfies(&self, required: Role) -> bool {
        required.accepted_roles().contains(self)
    }

    /// Whether holders act for every site rather than their own
    pub fn is_corporate(&self) -> bool {
        matches!(self, Role::CorpTso)
    }

    /// Whether a holder based at `user_site` may act for an initiative at `initiative_site`
    pub fn covers_site(&self, user_site: &str, initiative_site: &str) -> bool {
        self.is_corporate() || user_site.eq_ignore_ascii_case(initiative_site)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Role {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .iter()
            .copied()
            .find(|role| role.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| WorkflowError::validation(format!("unknown role: {s}")))
    }
}
