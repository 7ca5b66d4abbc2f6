use std::collections::BTreeMap;

use chrono::NaiveDate;
use tally_core::{CanonicalRecord, DateRange, Money};

use crate::engine::reapply_to_records;
use crate::ingest::{ingest_rows, IngestSummary};
use crate::profile::SourceProfile;

/// Categories that hold money coming in rather than spending.
pub const DEFAULT_CREDIT_CATEGORIES: &[&str] = &["Deposits", "Interest"];

/// Inclusive amount window. Bounds given in either order are normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountRange {
    pub min: Money,
    pub max: Money,
}

impl AmountRange {
    pub fn new(a: Money, b: Money) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn contains(self, amount: Money) -> bool {
        amount >= self.min && amount <= self.max
    }
}

/// Narrows the store to the records a view cares about. Every criterion that
/// is set must hold; an empty filter keeps everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    pub dates: Option<DateRange>,
    pub amounts: Option<AmountRange>,
    pub categories: Vec<String>,
    pub search: Option<String>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn between(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.dates = Some(DateRange::new(start, end));
        self
    }

    pub fn dates(mut self, range: DateRange) -> Self {
        self.dates = Some(range);
        self
    }

    pub fn amounts(mut self, a: Money, b: Money) -> Self {
        self.amounts = Some(AmountRange::new(a, b));
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.categories.push(category.into());
        self
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        self.search = (!text.trim().is_empty()).then_some(text);
        self
    }

    pub fn matches(&self, record: &CanonicalRecord) -> bool {
        if let Some(range) = self.dates {
            if !range.contains(record.date.current) {
                return false;
            }
        }
        if let Some(range) = self.amounts {
            if !range.contains(record.amount.current) {
                return false;
            }
        }
        if !self.categories.is_empty() && !self.categories.contains(&record.category.current) {
            return false;
        }
        match &self.search {
            Some(text) => {
                let needle = text.to_lowercase();
                record.description.current.to_lowercase().contains(&needle)
                    || record.category.current.to_lowercase().contains(&needle)
                    || record.date.current.to_string().contains(&needle)
            }
            None => true,
        }
    }
}

/// The records materialized so far, in ingestion order.
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<CanonicalRecord>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn push(&mut self, record: CanonicalRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanonicalRecord> {
        self.records.iter()
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    /// Runs every row through `profile` and keeps the ones that survive.
    pub fn ingest<I>(&mut self, profile: &SourceProfile, rows: I) -> IngestSummary
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        ingest_rows(profile, rows, |record| self.records.push(record))
    }

    /// Recomputes every record that came from `profile` against its current
    /// rules. Returns the number of fields that ended up rewritten.
    pub fn reapply(&mut self, profile: &SourceProfile) -> usize {
        let rewritten = reapply_to_records(
            self.records.iter_mut().filter(|r| r.source == profile.name),
            profile,
        );
        tracing::info!(profile = %profile.name, rewritten, "reapplied transforms");
        rewritten
    }

    pub fn filter<'a>(&'a self, filter: &'a RecordFilter) -> impl Iterator<Item = &'a CanonicalRecord> + 'a {
        self.records.iter().filter(move |record| filter.matches(record))
    }

    /// Distinct current categories, first seen first.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for record in &self.records {
            let category = record.category.current.as_str();
            if !seen.contains(&category) {
                seen.push(category);
            }
        }
        seen
    }

    /// Amounts grouped by current category, leaving out `excluded`.
    pub fn amounts_by_category(&self, excluded: &[&str]) -> BTreeMap<String, Vec<Money>> {
        let mut groups: BTreeMap<String, Vec<Money>> = BTreeMap::new();
        for record in &self.records {
            let category = &record.category.current;
            if excluded.contains(&category.as_str()) {
                continue;
            }
            groups.entry(category.clone()).or_default().push(record.amount.current);
        }
        groups
    }

    pub fn totals_by_category(&self, excluded: &[&str]) -> BTreeMap<String, Money> {
        self.amounts_by_category(excluded)
            .into_iter()
            .map(|(category, amounts)| (category, amounts.into_iter().sum()))
            .collect()
    }
}

impl Extend<CanonicalRecord> for RecordStore {
    fn extend<I: IntoIterator<Item = CanonicalRecord>>(&mut self, iter: I) {
        self.records.extend(iter);
    }
}

impl<'a> IntoIterator for &'a RecordStore {
    type Item = &'a CanonicalRecord;
    type IntoIter = std::slice::Iter<'a, CanonicalRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
