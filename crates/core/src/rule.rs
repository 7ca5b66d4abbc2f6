use serde::{Deserialize, Serialize};
use std::fmt;

use crate::field::SemanticField;

/// How a rule compares its pattern against an incoming value. Both kinds
/// ignore case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MatchKind {
    #[default]
    Contains,
    ExactEquals,
}

impl MatchKind {
    /// Blank patterns only match blank values, and a blank value never
    /// matches a non-blank pattern.
    pub fn is_match(self, pattern: &str, incoming: &str) -> bool {
        let pattern_blank = pattern.trim().is_empty();
        if incoming.trim().is_empty() {
            return pattern_blank;
        }
        if pattern_blank {
            return false;
        }

        let text = incoming.to_lowercase();
        let pattern = pattern.to_lowercase();
        match self {
            MatchKind::Contains => text.contains(&pattern),
            MatchKind::ExactEquals => text == pattern,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            MatchKind::Contains => "has",
            MatchKind::ExactEquals => "equals",
        }
    }
}

impl std::str::FromStr for MatchKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "contains" | "has" => Ok(MatchKind::Contains),
            "exactequals" | "exact" | "equals" => Ok(MatchKind::ExactEquals),
            other => Err(format!("Unknown match kind: '{other}'")),
        }
    }
}

/// Gate on a second column: the owning rule only fires when this matches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionalMatch {
    pub field: SemanticField,
    pub match_value: String,
    #[serde(default)]
    pub match_kind: MatchKind,
}

impl ConditionalMatch {
    pub fn new(field: SemanticField, match_kind: MatchKind, match_value: impl Into<String>) -> Self {
        Self {
            field,
            match_value: match_value.into(),
            match_kind,
        }
    }

    pub fn matches(&self, incoming: &str) -> bool {
        self.match_kind.is_match(&self.match_value, incoming)
    }
}

/// A single rewrite instruction for one semantic field.
///
/// Equality is structural: two rules are the same rule when every field,
/// including the conditional, is equal. Profile edits locate rules this way.
///
/// `target` is not serialized; persisted rules are grouped under their target
/// field and the grouping restores it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformRule {
    #[serde(skip)]
    pub target: SemanticField,
    pub match_value: String,
    #[serde(default)]
    pub match_kind: MatchKind,
    #[serde(rename = "replacementValue")]
    pub replacement: String,
    #[serde(
        rename = "conditionalOn",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub conditional: Option<ConditionalMatch>,
}

impl TransformRule {
    pub fn new(
        target: SemanticField,
        match_kind: MatchKind,
        match_value: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self {
            target,
            match_value: match_value.into(),
            match_kind,
            replacement: replacement.into(),
            conditional: None,
        }
    }

    pub fn contains(
        target: SemanticField,
        match_value: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self::new(target, MatchKind::Contains, match_value, replacement)
    }

    pub fn exact(
        target: SemanticField,
        match_value: impl Into<String>,
        replacement: impl Into<String>,
    ) -> Self {
        Self::new(target, MatchKind::ExactEquals, match_value, replacement)
    }

    /// Gates this rule on another field's value.
    pub fn when(
        mut self,
        field: SemanticField,
        match_kind: MatchKind,
        match_value: impl Into<String>,
    ) -> Self {
        self.conditional = Some(ConditionalMatch::new(field, match_kind, match_value));
        self
    }

    pub fn matches(&self, incoming: &str) -> bool {
        self.match_kind.is_match(&self.match_value, incoming)
    }
}

impl fmt::Display for TransformRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "if {} {} {}",
            self.target,
            self.match_kind.verb(),
            self.match_value
        )?;
        if let Some(cond) = &self.conditional {
            write!(
                f,
                " and if {} {} {}",
                cond.field,
                cond.match_kind.verb(),
                cond.match_value
            )?;
        }
        write!(f, " --> {}", self.replacement)
    }
}
