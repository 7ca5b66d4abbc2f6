use serde::{Deserialize, Serialize};
use std::fmt;
use tally_core::{ColumnMapping, SemanticField, TransformRule};
use thiserror::Error;

use crate::transforms::TransformSet;

/// Fields every profile must map before its rows can be ingested.
pub const REQUIRED_FIELDS: [SemanticField; 4] = [
    SemanticField::TransactionDate,
    SemanticField::Amount,
    SemanticField::Description,
    SemanticField::Category,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Delimiter {
    #[default]
    Comma,
    Tab,
}

impl Delimiter {
    pub fn as_byte(self) -> u8 {
        match self {
            Delimiter::Comma => b',',
            Delimiter::Tab => b'\t',
        }
    }
}

impl fmt::Display for Delimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Delimiter::Comma => write!(f, "Comma"),
            Delimiter::Tab => write!(f, "Tab"),
        }
    }
}

impl std::str::FromStr for Delimiter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "," => Ok(Delimiter::Comma),
            "\t" => Ok(Delimiter::Tab),
            other => match other.to_lowercase().as_str() {
                "comma" => Ok(Delimiter::Comma),
                "tab" => Ok(Delimiter::Tab),
                _ => Err(format!("Unknown delimiter: '{other}'")),
            },
        }
    }
}

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Profile name must not be empty")]
    EmptyName,
    #[error("Missing required column mappings: {}", .0.join(", "))]
    MissingMappings(Vec<String>),
    #[error("Transforms cannot target an unmapped field")]
    InvalidTarget,
    #[error("Failed to parse TOML profile: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Failed to parse JSON profile: {0}")]
    Json(#[from] serde_json::Error),
}

fn default_true() -> bool {
    true
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

/// Everything needed to read one bank's or issuer's export: how the file is
/// split, which column means what, and how noisy values get rewritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceProfile {
    pub name: String,
    #[serde(default)]
    pub delimiter: Delimiter,
    #[serde(default = "default_true")]
    pub has_header: bool,
    /// Tried first; common layouts are tried after it.
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default)]
    pub mapping: ColumnMapping,
    #[serde(default)]
    pub transforms: TransformSet,
}

impl SourceProfile {
    pub fn new(name: impl Into<String>, delimiter: Delimiter) -> Self {
        Self {
            name: name.into(),
            delimiter,
            has_header: true,
            date_format: default_date_format(),
            mapping: ColumnMapping::new(),
            transforms: TransformSet::new(),
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ProfileError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_json(content: &str) -> Result<Self, ProfileError> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn to_json(&self) -> Result<String, ProfileError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    // ── column mapping ────────────────────────────────────────────────────────

    pub fn set_column(&mut self, field: SemanticField, index: usize) {
        self.mapping.set_column(field, index);
    }

    pub fn remove_column(&mut self, field: SemanticField) {
        self.mapping.remove_column(field);
    }

    pub fn previously_mapped_to(&self, index: usize) -> SemanticField {
        self.mapping.previously_mapped_to(index)
    }

    pub fn missing_mappings(&self) -> Vec<SemanticField> {
        REQUIRED_FIELDS
            .into_iter()
            .filter(|field| !self.mapping.is_mapped(*field))
            .collect()
    }

    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.name.trim().is_empty() {
            return Err(ProfileError::EmptyName);
        }
        let missing = self.missing_mappings();
        if !missing.is_empty() {
            return Err(ProfileError::MissingMappings(
                missing.iter().map(|f| f.display_name().to_string()).collect(),
            ));
        }
        Ok(())
    }

    // ── transforms ────────────────────────────────────────────────────────────

    pub fn add_transform(&mut self, rule: TransformRule) -> Result<(), ProfileError> {
        if !rule.target.is_rewritable() {
            return Err(ProfileError::InvalidTarget);
        }
        self.transforms.push(rule);
        Ok(())
    }

    /// Index of a structurally equal rule within its field's list; this is
    /// the index `update_transform` expects.
    pub fn position_of(&self, rule: &TransformRule) -> Option<usize> {
        self.transforms.position_of(rule)
    }

    /// Replaces the rule at `index` in `rule.target`'s list. Returns `false`
    /// and changes nothing when there is no such slot.
    pub fn update_transform(&mut self, index: usize, rule: TransformRule) -> bool {
        self.transforms.replace(index, rule)
    }

    /// Locates `previous` by structural equality and swaps in `updated`.
    /// A changed target moves the rule to the end of the new field's list.
    pub fn edit_transform(&mut self, previous: &TransformRule, updated: TransformRule) -> bool {
        if !updated.target.is_rewritable() {
            return false;
        }
        if previous.target == updated.target {
            return match self.position_of(previous) {
                Some(index) => self.update_transform(index, updated),
                None => false,
            };
        }
        if !self.transforms.remove(previous) {
            return false;
        }
        self.transforms.push(updated);
        true
    }

    pub fn remove_transform(&mut self, rule: &TransformRule) -> bool {
        self.transforms.remove(rule)
    }

    pub fn transforms_for(&self, field: SemanticField) -> &[TransformRule] {
        self.transforms.for_field(field)
    }

    pub fn has_transform_for(&self, field: SemanticField) -> bool {
        !self.transforms_for(field).is_empty()
    }

    pub fn rule_count(&self) -> usize {
        self.transforms.len()
    }
}
