//! Rule model: severities, concepts, constraints and groups

use quarry_store::Query;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Severity of a rule, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Severity {
    Info,
    Minor,
    Major,
    Critical,
    Blocker,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown severity: {0}")]
pub struct ParseSeverityError(pub String);

impl Severity {
    pub const ALL: [Severity; 5] = [
        Severity::Info,
        Severity::Minor,
        Severity::Major,
        Severity::Critical,
        Severity::Blocker,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Minor => "MINOR",
            Severity::Major => "MAJOR",
            Severity::Critical => "CRITICAL",
            Severity::Blocker => "BLOCKER",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = ParseSeverityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Severity::ALL
            .into_iter()
            .find(|severity| severity.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseSeverityError(s.to_string()))
    }
}

impl TryFrom<String> for Severity {
    type Error = ParseSeverityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Severity> for String {
    fn from(severity: Severity) -> Self {
        severity.as_str().to_string()
    }
}

/// Common view of concepts, constraints and groups.
pub trait Rule: fmt::Debug {
    fn id(&self) -> &str;

    fn description(&self) -> &str;

    /// The declared severity; groups may leave it open.
    fn severity(&self) -> Option<Severity>;
}

fn default_concept_severity() -> Severity {
    Severity::Minor
}

fn default_constraint_severity() -> Severity {
    Severity::Major
}

/// A rule that enriches the graph, e.g. by adding labels or relationships.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concept {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_concept_severity")]
    pub severity: Severity,
    #[serde(default)]
    pub query: Option<Query>,
    /// Ids of concepts that must be applied first.
    #[serde(default)]
    pub requires: Vec<String>,
}

impl Concept {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            severity: default_concept_severity(),
            query: None,
            requires: Vec::new(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_query(mut self, query: impl Into<Query>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn requires(mut self, concept_id: impl Into<String>) -> Self {
        self.requires.push(concept_id.into());
        self
    }
}

impl Rule for Concept {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn severity(&self) -> Option<Severity> {
        Some(self.severity)
    }
}

/// A rule that verifies the graph; any returned row is a violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_constraint_severity")]
    pub severity: Severity,
    #[serde(default)]
    pub query: Option<Query>,
    /// Ids of concepts that must be applied first.
    #[serde(default)]
    pub requires: Vec<String>,
}

impl Constraint {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            severity: default_constraint_severity(),
            query: None,
            requires: Vec::new(),
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_query(mut self, query: impl Into<Query>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn requires(mut self, concept_id: impl Into<String>) -> Self {
        self.requires.push(concept_id.into());
        self
    }
}

impl Rule for Constraint {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn severity(&self) -> Option<Severity> {
        Some(self.severity)
    }
}

/// Reference from a group to one of its members.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum RuleRef {
    Concept(String),
    Constraint(String),
    Group(String),
}

impl RuleRef {
    pub fn id(&self) -> &str {
        match self {
            RuleRef::Concept(id) | RuleRef::Constraint(id) | RuleRef::Group(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub rule: RuleRef,
    /// Overrides the member's own severity when set.
    #[serde(default)]
    pub severity: Option<Severity>,
}

/// An ordered collection of rules executed together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub members: Vec<GroupMember>,
}

impl Group {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            severity: None,
            members: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_concept(self, id: impl Into<String>, severity: Option<Severity>) -> Self {
        self.with_member(RuleRef::Concept(id.into()), severity)
    }

    pub fn with_constraint(self, id: impl Into<String>, severity: Option<Severity>) -> Self {
        self.with_member(RuleRef::Constraint(id.into()), severity)
    }

    pub fn with_group(self, id: impl Into<String>, severity: Option<Severity>) -> Self {
        self.with_member(RuleRef::Group(id.into()), severity)
    }

    fn with_member(mut self, rule: RuleRef, severity: Option<Severity>) -> Self {
        self.members.push(GroupMember { rule, severity });
        self
    }

    pub fn members(&self) -> &[GroupMember] {
        &self.members
    }
}

impl Rule for Group {
    fn id(&self) -> &str {
        &self.id
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn severity(&self) -> Option<Severity> {
        self.severity
    }
}
