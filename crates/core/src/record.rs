use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::field::SemanticField;
use crate::money::Money;

/// A value that remembers what it was at ingestion. `original` is fixed;
/// transforms only ever touch `current`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracked<T> {
    original: T,
    pub current: T,
}

impl<T: Clone> Tracked<T> {
    pub fn new(value: T) -> Self {
        Self {
            original: value.clone(),
            current: value,
        }
    }

    /// For values already rewritten during ingestion.
    pub fn rewritten(original: T, current: T) -> Self {
        Self { original, current }
    }

    pub fn original(&self) -> &T {
        &self.original
    }

    pub fn reset(&mut self) {
        self.current = self.original.clone();
    }
}

impl<T: PartialEq> Tracked<T> {
    pub fn is_modified(&self) -> bool {
        self.original != self.current
    }
}

impl<T: fmt::Display> fmt::Display for Tracked<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Current: {} | Original: {}]", self.current, self.original)
    }
}

/// One normalized statement line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// Name of the source profile that produced this record.
    pub source: String,
    pub date: Tracked<NaiveDate>,
    pub amount: Tracked<Money>,
    pub is_debit: bool,
    pub description: Tracked<String>,
    pub category: Tracked<String>,
    /// The row exactly as it arrived, before any rule ran.
    pub raw: Vec<String>,
}

impl CanonicalRecord {
    pub fn is_credit(&self) -> bool {
        !self.is_debit
    }

    /// Current value of a materialized field as text; `None` for fields a
    /// record does not carry.
    pub fn value_of(&self, field: SemanticField) -> Option<String> {
        match field {
            SemanticField::TransactionDate => Some(self.date.current.to_string()),
            SemanticField::Amount => Some(self.amount.current.to_plain_string()),
            SemanticField::Description => Some(self.description.current.clone()),
            SemanticField::Category => Some(self.category.current.clone()),
            _ => None,
        }
    }

    pub fn original_of(&self, field: SemanticField) -> Option<String> {
        match field {
            SemanticField::TransactionDate => Some(self.date.original().to_string()),
            SemanticField::Amount => Some(self.amount.original().to_plain_string()),
            SemanticField::Description => Some(self.description.original().clone()),
            SemanticField::Category => Some(self.category.original().clone()),
            _ => None,
        }
    }

    /// Puts every tracked field back to its ingested value.
    pub fn reset(&mut self) {
        self.date.reset();
        self.amount.reset();
        self.description.reset();
        self.category.reset();
    }

    pub fn is_modified(&self) -> bool {
        self.date.is_modified()
            || self.amount.is_modified()
            || self.description.is_modified()
            || self.category.is_modified()
    }
}

impl fmt::Display for CanonicalRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Date: {} | Desc: {} | Amount: {} | Category: {}",
            self.date.current, self.description, self.amount.current, self.category
        )
    }
}
