use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::field::SemanticField;

/// Binds semantic fields to zero-based column positions for one source
/// format. A field owns at most one column and a column belongs to at most
/// one field.
///
/// Indices are not checked against any row here; readers bounds-check them
/// when a row is actually read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<SemanticField, usize>",
    into = "BTreeMap<SemanticField, usize>"
)]
pub struct ColumnMapping {
    columns: BTreeMap<SemanticField, usize>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `field` to `index`, releasing whichever field held `index`
    /// before. Assigning `SemanticField::None` only releases the column.
    pub fn set_column(&mut self, field: SemanticField, index: usize) {
        let previous = self.previously_mapped_to(index);
        if previous != SemanticField::None {
            self.columns.remove(&previous);
        }
        if field.is_rewritable() {
            self.columns.insert(field, index);
        }
    }

    pub fn previously_mapped_to(&self, index: usize) -> SemanticField {
        self.columns
            .iter()
            .find(|(_, &col)| col == index)
            .map(|(&field, _)| field)
            .unwrap_or_default()
    }

    pub fn remove_column(&mut self, field: SemanticField) {
        self.columns.remove(&field);
    }

    pub fn column_of(&self, field: SemanticField) -> Option<usize> {
        self.columns.get(&field).copied()
    }

    pub fn is_mapped(&self, field: SemanticField) -> bool {
        self.columns.contains_key(&field)
    }

    /// Cell for `field` in `row`, if the field is mapped and the row is long
    /// enough.
    pub fn cell<'r>(&self, row: &'r [String], field: SemanticField) -> Option<&'r str> {
        self.column_of(field)
            .and_then(|index| row.get(index))
            .map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SemanticField, usize)> + '_ {
        self.columns.iter().map(|(&field, &index)| (field, index))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(SemanticField, usize)> for ColumnMapping {
    fn from_iter<I: IntoIterator<Item = (SemanticField, usize)>>(iter: I) -> Self {
        let mut mapping = ColumnMapping::new();
        for (field, index) in iter {
            mapping.set_column(field, index);
        }
        mapping
    }
}

/// `None` entries carry no binding and are dropped rather than replayed, so
/// they cannot release a column another field holds.
impl From<BTreeMap<SemanticField, usize>> for ColumnMapping {
    fn from(columns: BTreeMap<SemanticField, usize>) -> Self {
        columns
            .into_iter()
            .filter(|(field, _)| field.is_rewritable())
            .collect()
    }
}

impl From<ColumnMapping> for BTreeMap<SemanticField, usize> {
    fn from(mapping: ColumnMapping) -> Self {
        mapping.columns
    }
}
