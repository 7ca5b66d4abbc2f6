use chrono::NaiveDate;
use tally_core::{parse_decimal, CanonicalRecord, Money, SemanticField, Tracked};
use thiserror::Error;

use crate::engine::apply_to_row;
use crate::profile::SourceProfile;

/// Layouts tried after the profile's own date format.
const FALLBACK_DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d", "%m-%d-%Y", "%d-%m-%Y", "%Y-%m-%d",
];

/// Why a row did not become a record. Rejected rows are dropped and
/// ingestion moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowRejection {
    #[error("Empty row")]
    EmptyRow,
    #[error("Invalid date: '{0}'")]
    InvalidDate(String),
    #[error("Invalid amount: '{0}'")]
    InvalidAmount(String),
    #[error("Zero amount")]
    ZeroAmount,
    #[error("Missing description")]
    MissingDescription,
    #[error("Missing category")]
    MissingCategory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub accepted: usize,
    /// Zero-based position of each dropped row within the batch.
    pub rejected: Vec<(usize, RowRejection)>,
}

pub(crate) fn parse_date(s: &str, format: &str) -> Option<NaiveDate> {
    let s = s.trim();
    std::iter::once(format)
        .chain(FALLBACK_DATE_FORMATS.iter().copied())
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Debit/credit direction from the flag columns. The Debit column wins over
/// the combined column; `None` when neither can be read.
pub(crate) fn debit_flag<'a, F>(cell: F) -> Option<bool>
where
    F: Fn(SemanticField) -> Option<&'a str>,
{
    [SemanticField::Debit, SemanticField::DebitCreditCombined]
        .into_iter()
        .find_map(cell)
        .map(|flag| flag.to_lowercase().contains("debit"))
}

/// Lines without a readable flag column count as debits.
pub(crate) fn is_debit<'a, F>(cell: F) -> bool
where
    F: Fn(SemanticField) -> Option<&'a str>,
{
    debit_flag(cell).unwrap_or(true)
}

/// Turns one pre-split row into a record: snapshot, rewrite through the
/// profile's rules, then parse the rewritten cells.
pub fn ingest_row(profile: &SourceProfile, row: Vec<String>) -> Result<CanonicalRecord, RowRejection> {
    if row.is_empty() {
        return Err(RowRejection::EmptyRow);
    }
    let mapping = &profile.mapping;
    let raw = row.clone();
    let mut row = row;
    apply_to_row(&mut row, mapping, &profile.transforms);

    let date_text = mapping.cell(&row, SemanticField::TransactionDate).unwrap_or_default();
    let date = parse_date(date_text, &profile.date_format)
        .ok_or_else(|| RowRejection::InvalidDate(date_text.to_string()))?;

    let amount_text = mapping.cell(&row, SemanticField::Amount).unwrap_or_default();
    let exact = parse_decimal(amount_text)
        .map_err(|_| RowRejection::InvalidAmount(amount_text.to_string()))?;
    if exact.is_zero() {
        return Err(RowRejection::ZeroAmount);
    }
    let amount = Money::from_decimal(exact);

    let description = mapping.cell(&row, SemanticField::Description).unwrap_or_default();
    if description.trim().is_empty() {
        return Err(RowRejection::MissingDescription);
    }
    let category = mapping.cell(&row, SemanticField::Category).unwrap_or_default();
    if category.trim().is_empty() {
        return Err(RowRejection::MissingCategory);
    }

    let original = |field| mapping.cell(&raw, field);
    let original_date = original(SemanticField::TransactionDate)
        .and_then(|text| parse_date(text, &profile.date_format))
        .unwrap_or(date);
    let original_amount = original(SemanticField::Amount)
        .and_then(|text| text.parse::<Money>().ok())
        .unwrap_or(amount);
    let original_description = original(SemanticField::Description).unwrap_or_default().to_string();
    let original_category = original(SemanticField::Category).unwrap_or_default().to_string();

    Ok(CanonicalRecord {
        source: profile.name.clone(),
        date: Tracked::rewritten(original_date, date),
        amount: Tracked::rewritten(original_amount, amount),
        is_debit: is_debit(|field| mapping.cell(&row, field)),
        description: Tracked::rewritten(original_description, description.to_string()),
        category: Tracked::rewritten(original_category, category.to_string()),
        raw,
    })
}

/// Ingests a batch, handing each accepted record to `sink`.
pub fn ingest_rows<I, F>(profile: &SourceProfile, rows: I, mut sink: F) -> IngestSummary
where
    I: IntoIterator<Item = Vec<String>>,
    F: FnMut(CanonicalRecord),
{
    let mut summary = IngestSummary::default();
    for (index, row) in rows.into_iter().enumerate() {
        match ingest_row(profile, row) {
            Ok(record) => {
                sink(record);
                summary.accepted += 1;
            }
            Err(reason) => {
                tracing::debug!(profile = %profile.name, row = index, %reason, "row rejected");
                summary.rejected.push((index, reason));
            }
        }
    }
    tracing::info!(
        profile = %profile.name,
        accepted = summary.accepted,
        rejected = summary.rejected.len(),
        "ingested statement rows"
    );
    summary
}
