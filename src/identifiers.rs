// Copyright 2025 Cowboy AI, LLC.

//! Identifier types for initiatives, stage instances and users

use chrono::{DateTime, Datelike, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::WorkflowError;

/// Initiative ID - globally unique identity of an initiative aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct InitiativeId(Uuid);

impl InitiativeId {
    /// Create a new random initiative ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from a UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for InitiativeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InitiativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<InitiativeId> for Uuid {
    fn from(id: InitiativeId) -> Self {
        id.0
    }
}

/// Stage instance ID - identifies one execution of one stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub struct StageInstanceId(Uuid);

impl StageInstanceId {
    /// Create a new random stage instance ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from a UUID
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for StageInstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StageInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User ID as issued by the identity service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for UserId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Human-facing initiative code, e.g. `NDS/25/OP/AB/001`
///
/// Segments are site, two-digit year, discipline, initiator initials and a
/// 1-based sequence number scoped to the `site/year/discipline` prefix.
///
/// # Examples
///
/// ```rust
/// use opex_workflow::InitiativeCode;
///
/// let code: InitiativeCode = "NDS/25/OP/AB/001".parse().unwrap();
/// assert_eq!(code.site(), "NDS");
/// assert_eq!(code.sequence(), 1);
/// assert_eq!(code.to_string(), "NDS/25/OP/AB/001");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InitiativeCode {
    site: String,
    year: u8,
    discipline: String,
    initiator: String,
    sequence: u32,
}

impl InitiativeCode {
    /// The first code in its scope for an initiative created at `created_at`
    ///
    /// Initials come from the creator's first and last names. A creator
    /// with no ASCII initial gets `U` followed by their user ID. Issue the
    /// real sequence number with [`Self::with_sequence`] once every segment
    /// has been validated.
    pub fn generate(
        site: &str,
        discipline: &str,
        creator_name: &str,
        creator_id: UserId,
        created_at: DateTime<Utc>,
    ) -> Result<Self, WorkflowError> {
        let initiator = match initials(creator_name) {
            i if i.is_empty() => format!("U{}", creator_id.0),
            i => i,
        };
        let code = Self {
            site: site.trim().to_uppercase(),
            year: (created_at.year().rem_euclid(100)) as u8,
            discipline: discipline.trim().to_uppercase(),
            initiator,
            sequence: 1,
        };
        code.validate()?;
        Ok(code)
    }

    /// The same code with sequence number `sequence`
    pub fn with_sequence(mut self, sequence: u32) -> Result<Self, WorkflowError> {
        self.sequence = sequence;
        self.validate()?;
        Ok(self)
    }

    /// The `site/year/discipline` prefix that scopes the sequence
    pub fn scope(&self) -> String {
        format!("{}/{:02}/{}", self.site, self.year, self.discipline)
    }

    /// Site segment
    pub fn site(&self) -> &str {
        &self.site
    }

    /// Two-digit year segment
    pub fn year(&self) -> u8 {
        self.year
    }

    /// Discipline segment
    pub fn discipline(&self) -> &str {
        &self.discipline
    }

    /// Initiator initials segment
    pub fn initiator(&self) -> &str {
        &self.initiator
    }

    /// Sequence number within the scope
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    fn validate(&self) -> Result<(), WorkflowError> {
        let segment_ok = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric());
        if !segment_ok(&self.site) || !segment_ok(&self.discipline) || !segment_ok(&self.initiator) {
            return Err(WorkflowError::validation(format!(
                "initiative code segments must be non-empty alphanumerics: {self}"
            )));
        }
        if self.sequence == 0 {
            return Err(WorkflowError::validation(format!(
                "initiative code sequence out of range: {}",
                self.sequence
            )));
        }
        Ok(())
    }
}

fn initials(full_name: &str) -> String {
    let words: Vec<&str> = full_name.split_whitespace().collect();
    let picked = match words.as_slice() {
        [] => Vec::new(),
        [only] => vec![*only],
        [first, .., last] => vec![*first, *last],
    };
    picked
        .iter()
        .filter_map(|w| w.chars().find(|c| c.is_ascii_alphanumeric()))
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

impl fmt::Display for InitiativeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{:02}/{}/{}/{:03}",
            self.site, self.year, self.discipline, self.initiator, self.sequence
        )
    }
}

impl FromStr for InitiativeCode {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split('/').collect();
        let [site, year, discipline, initiator, sequence] = parts.as_slice() else {
            return Err(WorkflowError::validation(format!(
                "initiative code must have five segments: {s}"
            )));
        };
        let year = year
            .parse::<u8>()
            .ok()
            .filter(|y| *y < 100 && year.len() == 2)
            .ok_or_else(|| WorkflowError::validation(format!("invalid year segment: {year}")))?;
        let sequence = sequence
            .parse::<u32>()
            .map_err(|_| WorkflowError::validation(format!("invalid sequence segment: {sequence}")))?;

        let code = Self {
            site: site.to_string(),
            year,
            discipline: discipline.to_string(),
            initiator: initiator.to_string(),
            sequence,
        };
        code.validate()?;
        Ok(code)
    }
}

impl TryFrom<String> for InitiativeCode {
    type Error = WorkflowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InitiativeCode> for String {
    fn from(code: InitiativeCode) -> Self {
        code.to_string()
    }
}
