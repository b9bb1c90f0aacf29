//! Marker vocabulary: the table mapping declared member markers to lifecycle roles.
//!
//! Discovery never matches names in code. A member is classified by looking
//! up its marker (the declared member type, e.g. `Because`) in this table; a
//! rule may additionally constrain the field name with a regular expression,
//! which is how `Context before_each` and `Context after_all` resolve to
//! different roles.

use crate::domain::{MspecError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle role of a member.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Runs once when its context activates.
    SetupOnce,
    /// Runs before every specification beneath its context.
    SetupEach,
    /// The exercise phase, accumulated root to leaf like `SetupEach`.
    Action,
    /// A specification body.
    Assertion,
    /// Runs after every specification beneath its context.
    TeardownEach,
    /// Runs once after everything beneath its context completed.
    TeardownOnce,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SetupOnce => "setup_once",
            Role::SetupEach => "setup_each",
            Role::Action => "action",
            Role::Assertion => "assertion",
            Role::TeardownEach => "teardown_each",
            Role::TeardownOnce => "teardown_once",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the vocabulary table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerRule {
    /// Declared member marker, e.g. `It`.
    pub marker: String,

    /// Regular expression the field name must match, if any.
    #[serde(default)]
    pub name_pattern: Option<String>,

    pub role: Role,
}

impl MarkerRule {
    pub fn new(marker: &str, role: Role) -> Self {
        Self {
            marker: marker.to_string(),
            name_pattern: None,
            role,
        }
    }

    pub fn named(marker: &str, name_pattern: &str, role: Role) -> Self {
        Self {
            marker: marker.to_string(),
            name_pattern: Some(name_pattern.to_string()),
            role,
        }
    }
}

/// Configurable marker vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub rules: Vec<MarkerRule>,
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::machine_specifications()
    }
}

impl Vocabulary {
    /// The Machine.Specifications marker set.
    pub fn machine_specifications() -> Self {
        Self {
            rules: vec![
                MarkerRule::new("Establish", Role::SetupEach),
                MarkerRule::named("Context", "^before_each$", Role::SetupEach),
                MarkerRule::named("Context", "^before_all$", Role::SetupOnce),
                MarkerRule::named("Context", "^after_each$", Role::TeardownEach),
                MarkerRule::named("Context", "^after_all$", Role::TeardownOnce),
                MarkerRule::new("Because", Role::Action),
                MarkerRule::new("It", Role::Assertion),
                MarkerRule::new("Cleanup", Role::TeardownEach),
                MarkerRule::new("After", Role::TeardownEach),
            ],
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let vocabulary: Self = toml::from_str(s)?;
        vocabulary.compile()?;
        Ok(vocabulary)
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let vocabulary: Self = serde_json::from_str(s)?;
        vocabulary.compile()?;
        Ok(vocabulary)
    }

    /// Validate the table and compile its name patterns.
    pub fn compile(&self) -> Result<CompiledVocabulary> {
        let mut rules = Vec::with_capacity(self.rules.len());
        for rule in &self.rules {
            if rule.marker.trim().is_empty() {
                return Err(MspecError::InvalidVocabulary {
                    marker: rule.marker.clone(),
                    reason: "marker must not be empty".to_string(),
                });
            }
            let pattern = match &rule.name_pattern {
                Some(p) => Some(Regex::new(p).map_err(|e| MspecError::InvalidVocabulary {
                    marker: rule.marker.clone(),
                    reason: e.to_string(),
                })?),
                None => None,
            };
            rules.push((rule.clone(), pattern));
        }
        Ok(CompiledVocabulary { rules })
    }
}

/// Outcome of classifying one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// The marker and name resolve to a role.
    Role(Role),
    /// The marker is known but no name rule accepts the field name.
    BadlyNamed,
    /// The marker is not part of the vocabulary: an ordinary field.
    NotAMember,
}

/// A vocabulary with compiled name patterns.
#[derive(Debug, Clone)]
pub struct CompiledVocabulary {
    rules: Vec<(MarkerRule, Option<Regex>)>,
}

impl CompiledVocabulary {
    /// Classify a member by marker and field name. First matching rule wins.
    pub fn classify(&self, marker: &str, field_name: &str) -> Classification {
        let mut known_marker = false;
        for (rule, pattern) in &self.rules {
            if rule.marker != marker {
                continue;
            }
            known_marker = true;
            match pattern {
                Some(re) if !re.is_match(field_name) => continue,
                _ => return Classification::Role(rule.role),
            }
        }

        if known_marker {
            Classification::BadlyNamed
        } else {
            Classification::NotAMember
        }
    }
}
