//! Transform engine.
//!
//! One evaluation routine, [`apply_rules`], serves both ingestion of raw rows
//! and re-application over materialized records. The two paths differ only in
//! their [`FieldAccess`]: where predicate inputs are read from and where
//! replacements are written to.
//!
//! Collision policy, identical on both paths: rules run in declaration order,
//! the first rule that matches a field rewrites it and locks it for the rest
//! of the pass. Predicates always see the values as they were before the pass
//! started, never a replacement written earlier in the same pass.

use std::collections::HashSet;

use tally_core::{CanonicalRecord, ColumnMapping, Money, SemanticField};

use crate::ingest::{debit_flag, parse_date};
use crate::profile::SourceProfile;
use crate::transforms::TransformSet;

/// Read/write capability the engine evaluates rules against.
pub trait FieldAccess {
    /// Pre-pass value of `field`, or `None` when the field cannot be read
    /// (unmapped, or past the end of a short row).
    fn read(&self, field: SemanticField) -> Option<&str>;

    /// Stores a replacement. Returns `false` if nothing was written.
    fn write(&mut self, field: SemanticField, value: &str) -> bool;
}

/// Runs every rule in `transforms` against `access` and returns the number
/// of fields rewritten.
///
/// Rules whose target or conditional field cannot be read are skipped
/// without error.
pub fn apply_rules<A: FieldAccess + ?Sized>(access: &mut A, transforms: &TransformSet) -> usize {
    let mut locked: HashSet<SemanticField> = HashSet::new();

    for rule in transforms.iter() {
        if !rule.target.is_rewritable() || locked.contains(&rule.target) {
            continue;
        }

        let Some(value) = access.read(rule.target) else {
            continue;
        };
        let target_matches = rule.matches(value);

        let gate_open = match &rule.conditional {
            None => true,
            Some(cond) => match access.read(cond.field) {
                Some(other) => cond.matches(other),
                None => continue,
            },
        };

        if !(gate_open && target_matches) {
            continue;
        }

        if access.write(rule.target, &rule.replacement) {
            tracing::debug!(rule = %rule, "transform applied");
            locked.insert(rule.target);
        }
    }

    locked.len()
}

// ── row path ─────────────────────────────────────────────────────────────────

/// Access over a raw row. Reads come from a snapshot taken before the pass;
/// writes go to the row itself.
///
/// Locking by field is locking by column here: a mapping never lets two
/// fields share one.
struct RowAccess<'a> {
    mapping: &'a ColumnMapping,
    before: Vec<String>,
    row: &'a mut [String],
}

impl FieldAccess for RowAccess<'_> {
    fn read(&self, field: SemanticField) -> Option<&str> {
        self.mapping.cell(&self.before, field)
    }

    fn write(&mut self, field: SemanticField, value: &str) -> bool {
        match self
            .mapping
            .column_of(field)
            .and_then(|index| self.row.get_mut(index))
        {
            Some(cell) => {
                *cell = value.to_string();
                true
            }
            None => false,
        }
    }
}

/// Rewrites mapped cells of `row` in place. An empty row is left alone.
pub fn apply_to_row(row: &mut [String], mapping: &ColumnMapping, transforms: &TransformSet) -> usize {
    if row.is_empty() || transforms.is_empty() {
        return 0;
    }
    let before = row.to_vec();
    let mut access = RowAccess {
        mapping,
        before,
        row,
    };
    apply_rules(&mut access, transforms)
}

// ── record path ──────────────────────────────────────────────────────────────

/// Access over a materialized record. Tracked fields are read from their
/// stored originals; only the flag columns, which keep no original, come
/// from the record's source row. Writes land in the tracked `current` values.
struct RecordAccess<'a> {
    mapping: &'a ColumnMapping,
    date_format: &'a str,
    record: &'a mut CanonicalRecord,
    originals: Vec<(SemanticField, String)>,
    flags: Vec<(SemanticField, String)>,
}

/// Text of each tracked original. Date and amount use the source cell while
/// it still parses to the stored original, so patterns see the same text the
/// row path saw; otherwise the original is rendered canonically.
fn original_texts(
    record: &CanonicalRecord,
    mapping: &ColumnMapping,
    date_format: &str,
) -> Vec<(SemanticField, String)> {
    let cell = |field| mapping.cell(&record.raw, field);
    let date = cell(SemanticField::TransactionDate)
        .filter(|text| parse_date(text, date_format).as_ref() == Some(record.date.original()))
        .map(str::to_string)
        .unwrap_or_else(|| record.date.original().to_string());
    let amount = cell(SemanticField::Amount)
        .filter(|text| text.parse::<Money>().ok().as_ref() == Some(record.amount.original()))
        .map(str::to_string)
        .unwrap_or_else(|| record.amount.original().to_plain_string());

    vec![
        (SemanticField::TransactionDate, date),
        (SemanticField::Amount, amount),
        (SemanticField::Description, record.description.original().clone()),
        (SemanticField::Category, record.category.original().clone()),
    ]
}

impl RecordAccess<'_> {
    fn flag(&self, field: SemanticField) -> Option<&str> {
        self.flags
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, value)| value.as_str())
            .or_else(|| self.mapping.cell(&self.record.raw, field))
    }
}

impl FieldAccess for RecordAccess<'_> {
    fn read(&self, field: SemanticField) -> Option<&str> {
        match field {
            SemanticField::Debit | SemanticField::Credit | SemanticField::DebitCreditCombined => {
                self.mapping.cell(&self.record.raw, field)
            }
            _ => self
                .originals
                .iter()
                .find(|(f, _)| *f == field)
                .map(|(_, value)| value.as_str()),
        }
    }

    fn write(&mut self, field: SemanticField, value: &str) -> bool {
        match field {
            SemanticField::Description => {
                self.record.description.current = value.to_string();
                true
            }
            SemanticField::Category => {
                self.record.category.current = value.to_string();
                true
            }
            SemanticField::Amount => match value.parse::<Money>() {
                Ok(amount) => {
                    self.record.amount.current = amount;
                    true
                }
                Err(e) => {
                    tracing::warn!("Amount rewrite skipped: {e}");
                    false
                }
            },
            SemanticField::TransactionDate => match parse_date(value, self.date_format) {
                Some(date) => {
                    self.record.date.current = date;
                    true
                }
                None => {
                    tracing::warn!("Date rewrite skipped: '{value}' is not a date");
                    false
                }
            },
            SemanticField::Debit | SemanticField::Credit | SemanticField::DebitCreditCombined => {
                self.flags.push((field, value.to_string()));
                true
            }
            SemanticField::None => false,
        }
    }
}

/// Recomputes one record from its originals under the profile's current
/// rules. Calling this any number of times yields the same record.
pub fn reapply_to_record(record: &mut CanonicalRecord, profile: &SourceProfile) -> usize {
    record.reset();
    let originals = original_texts(record, &profile.mapping, &profile.date_format);
    let mut access = RecordAccess {
        mapping: &profile.mapping,
        date_format: &profile.date_format,
        record,
        originals,
        flags: Vec::new(),
    };
    let rewritten = apply_rules(&mut access, &profile.transforms);
    // Without a readable flag column the ingested direction stands.
    if let Some(debit) = debit_flag(|field| access.flag(field)) {
        access.record.is_debit = debit;
    }
    rewritten
}

/// Re-runs `profile`'s rules over already-ingested records. Each record is
/// independent; the returned count sums rewrites over all of them.
pub fn reapply_to_records<'r, I>(records: I, profile: &SourceProfile) -> usize
where
    I: IntoIterator<Item = &'r mut CanonicalRecord>,
{
    records
        .into_iter()
        .map(|record| reapply_to_record(record, profile))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::ingest_row;
    use crate::profile::Delimiter;
    use chrono::NaiveDate;
    use tally_core::{MatchKind, TransformRule, Tracked};

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    fn mapping() -> ColumnMapping {
        [
            (SemanticField::TransactionDate, 0),
            (SemanticField::Description, 1),
            (SemanticField::Amount, 2),
            (SemanticField::Category, 3),
        ]
        .into_iter()
        .collect()
    }

    fn profile(rules: Vec<TransformRule>) -> SourceProfile {
        let mut p = SourceProfile::new("checking", Delimiter::Comma);
        p.mapping = mapping();
        for rule in rules {
            p.add_transform(rule).unwrap();
        }
        p
    }

    fn shopping_row() -> Vec<String> {
        row(&["2024-01-05", "AMZN MKTPLACE", "-42.10", "Shopping"])
    }

    // ── apply_to_row ──────────────────────────────────────────────────────────

    #[test]
    fn no_rules_leaves_row_unchanged() {
        let mut r = shopping_row();
        assert_eq!(apply_to_row(&mut r, &mapping(), &TransformSet::new()), 0);
        assert_eq!(r, shopping_row());
    }

    #[test]
    fn rules_on_unmapped_fields_leave_row_unchanged() {
        let set: TransformSet = [
            TransformRule::contains(SemanticField::Debit, "", "debit"),
            TransformRule::contains(SemanticField::Credit, "x", "y"),
        ]
        .into_iter()
        .collect();
        let mut r = shopping_row();
        assert_eq!(apply_to_row(&mut r, &mapping(), &set), 0);
        assert_eq!(r, shopping_row());
    }

    #[test]
    fn empty_row_is_returned_untouched() {
        let set: TransformSet = [TransformRule::contains(SemanticField::Category, "", "Uncategorized")]
            .into_iter()
            .collect();
        let mut r: Vec<String> = vec![];
        assert_eq!(apply_to_row(&mut r, &mapping(), &set), 0);
        assert!(r.is_empty());
    }

    #[test]
    fn short_row_skips_out_of_range_columns() {
        let set: TransformSet = [
            TransformRule::contains(SemanticField::Category, "Shopping", "Retail"),
            TransformRule::contains(SemanticField::Description, "AMZN", "Amazon"),
        ]
        .into_iter()
        .collect();
        let mut r = row(&["2024-01-05", "AMZN MKTPLACE"]);
        assert_eq!(apply_to_row(&mut r, &mapping(), &set), 1);
        assert_eq!(r, row(&["2024-01-05", "Amazon"]));
    }

    #[test]
    fn first_declared_match_wins_and_locks_the_column() {
        let set: TransformSet = [
            TransformRule::contains(SemanticField::Category, "Shop", "A"),
            TransformRule::contains(SemanticField::Category, "Shopping", "B"),
        ]
        .into_iter()
        .collect();
        let mut r = shopping_row();
        apply_to_row(&mut r, &mapping(), &set);
        assert_eq!(r[3], "A");
    }

    #[test]
    fn later_rule_cannot_match_an_earlier_replacement() {
        // Without the lock the second rule would see "Retail" and fire.
        let set: TransformSet = [
            TransformRule::contains(SemanticField::Category, "Shopping", "Retail"),
            TransformRule::exact(SemanticField::Category, "Retail", "Stores"),
        ]
        .into_iter()
        .collect();
        let mut r = shopping_row();
        apply_to_row(&mut r, &mapping(), &set);
        assert_eq!(r[3], "Retail");
    }

    #[test]
    fn conditional_on_unmapped_field_never_applies() {
        let set: TransformSet = [TransformRule::contains(SemanticField::Category, "Shopping", "Retail")
            .when(SemanticField::Debit, MatchKind::Contains, "")]
        .into_iter()
        .collect();
        let mut r = shopping_row();
        assert_eq!(apply_to_row(&mut r, &mapping(), &set), 0);
        assert_eq!(r[3], "Shopping");
    }

    #[test]
    fn conditional_out_of_bounds_never_applies() {
        let mut m = mapping();
        m.set_column(SemanticField::Debit, 9);
        let set: TransformSet = [TransformRule::contains(SemanticField::Category, "Shopping", "Retail")
            .when(SemanticField::Debit, MatchKind::Contains, "debit")]
        .into_iter()
        .collect();
        let mut r = shopping_row();
        assert_eq!(apply_to_row(&mut r, &m, &set), 0);
    }

    #[test]
    fn conditional_gates_on_another_column() {
        let set: TransformSet = [TransformRule::contains(SemanticField::Category, "Shopping", "Books")
            .when(SemanticField::Description, MatchKind::Contains, "amzn")]
        .into_iter()
        .collect();
        let mut r = shopping_row();
        assert_eq!(apply_to_row(&mut r, &mapping(), &set), 1);
        assert_eq!(r[3], "Books");

        let mut other = row(&["2024-01-05", "TARGET", "-9.00", "Shopping"]);
        assert_eq!(apply_to_row(&mut other, &mapping(), &set), 0);
    }

    #[test]
    fn conditionals_read_pre_pass_values() {
        // Description is rewritten first; the category rule still sees the
        // source description.
        let set: TransformSet = [
            TransformRule::contains(SemanticField::Description, "AMZN", "Amazon"),
            TransformRule::contains(SemanticField::Category, "Shopping", "Books")
                .when(SemanticField::Description, MatchKind::Contains, "AMZN"),
        ]
        .into_iter()
        .collect();
        let mut r = shopping_row();
        assert_eq!(apply_to_row(&mut r, &mapping(), &set), 2);
        assert_eq!(r[1], "Amazon");
        assert_eq!(r[3], "Books");
    }

    #[test]
    fn blank_pattern_fills_blank_cells() {
        let set: TransformSet = [TransformRule::contains(SemanticField::Category, "", "Uncategorized")]
            .into_iter()
            .collect();
        let mut blank = row(&["2024-01-05", "ATM", "-20", " "]);
        apply_to_row(&mut blank, &mapping(), &set);
        assert_eq!(blank[3], "Uncategorized");

        let mut filled = shopping_row();
        apply_to_row(&mut filled, &mapping(), &set);
        assert_eq!(filled[3], "Shopping");
    }

    // ── reapply_to_records ────────────────────────────────────────────────────

    #[test]
    fn reapply_picks_up_new_rules() {
        let mut p = profile(vec![]);
        let mut record = ingest_row(&p, shopping_row()).unwrap();
        assert_eq!(record.category.current, "Shopping");

        p.add_transform(TransformRule::contains(SemanticField::Category, "Shopping", "Retail"))
            .unwrap();
        assert_eq!(reapply_to_record(&mut record, &p), 1);
        assert_eq!(record.category.current, "Retail");
        assert_eq!(record.category.original(), "Shopping");
    }

    #[test]
    fn reapply_is_idempotent() {
        let p = profile(vec![
            TransformRule::contains(SemanticField::Category, "Shopping", "Retail"),
            TransformRule::contains(SemanticField::Description, "AMZN", "Amazon"),
            TransformRule::contains(SemanticField::Amount, "-42.10", "-40.00"),
        ]);
        let mut records = vec![ingest_row(&p, shopping_row()).unwrap()];

        reapply_to_records(records.iter_mut(), &p);
        let first = records.clone();
        reapply_to_records(records.iter_mut(), &p);
        assert_eq!(records, first);
        assert_eq!(records[0].description.current, "Amazon");
        assert_eq!(records[0].amount.current.to_cents(), -4000);
        assert_eq!(records[0].amount.original().to_cents(), -4210);
    }

    #[test]
    fn reapply_after_removal_reverts_to_original() {
        let rule = TransformRule::contains(SemanticField::Category, "Shopping", "Retail");
        let mut p = profile(vec![rule.clone()]);
        let mut record = ingest_row(&p, shopping_row()).unwrap();
        assert_eq!(record.category.current, "Retail");

        p.remove_transform(&rule);
        reapply_to_record(&mut record, &p);
        assert_eq!(record.category.current, "Shopping");
    }

    #[test]
    fn reapply_matches_ingestion_result() {
        let p = profile(vec![
            TransformRule::contains(SemanticField::Category, "Shopping", "Groceries")
                .when(SemanticField::Description, MatchKind::Contains, "WHOLEFDS"),
            TransformRule::contains(SemanticField::Category, "Shopping", "Retail"),
            TransformRule::contains(SemanticField::TransactionDate, "2024-01-05", "2024-01-06"),
        ]);
        let ingested = ingest_row(&p, shopping_row()).unwrap();
        let mut reapplied = ingested.clone();
        reapply_to_record(&mut reapplied, &p);
        assert_eq!(reapplied, ingested);
        assert_eq!(reapplied.category.current, "Retail");
        assert_eq!(reapplied.date.current.to_string(), "2024-01-06");
    }

    #[test]
    fn reapply_uses_first_match_per_field() {
        let p = profile(vec![
            TransformRule::contains(SemanticField::Category, "Shop", "A"),
            TransformRule::contains(SemanticField::Category, "Shopping", "B"),
        ]);
        let mut record = ingest_row(&profile(vec![]), shopping_row()).unwrap();
        reapply_to_record(&mut record, &p);
        assert_eq!(record.category.current, "A");
    }

    #[test]
    fn unparseable_amount_replacement_keeps_original() {
        let p = profile(vec![TransformRule::contains(SemanticField::Amount, "42", "lots")]);
        let mut record = ingest_row(&profile(vec![]), shopping_row()).unwrap();
        assert_eq!(reapply_to_record(&mut record, &p), 0);
        assert_eq!(record.amount.current.to_cents(), -4210);
    }

    #[test]
    fn flag_rewrites_rederive_debit() {
        let mut p = profile(vec![TransformRule::exact(SemanticField::DebitCreditCombined, "CR", "credit")]);
        p.set_column(SemanticField::DebitCreditCombined, 4);
        let source = row(&["2024-01-05", "PAYROLL", "1500.00", "Income", "CR"]);

        let mut record = ingest_row(&p, source).unwrap();
        assert!(record.is_credit());

        record.is_debit = true;
        reapply_to_record(&mut record, &p);
        assert!(record.is_credit());
    }

    #[test]
    fn reapply_works_on_records_without_a_source_row() {
        let p = profile(vec![
            TransformRule::contains(SemanticField::Category, "Shopping", "Retail")
                .when(SemanticField::Description, MatchKind::Contains, "amzn"),
            TransformRule::contains(SemanticField::Amount, "-42.10", "-40.00"),
            TransformRule::contains(SemanticField::TransactionDate, "2024-01-05", "2024-01-06"),
        ]);
        let mut record = CanonicalRecord {
            source: "checking".to_string(),
            date: Tracked::new(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()),
            amount: Tracked::new(Money::from_cents(-4210)),
            is_debit: false,
            description: Tracked::new("AMZN MKTPLACE".to_string()),
            category: Tracked::new("Shopping".to_string()),
            raw: vec![],
        };

        assert_eq!(reapply_to_record(&mut record, &p), 3);
        assert_eq!(record.category.current, "Retail");
        assert_eq!(record.amount.current.to_cents(), -4000);
        assert_eq!(record.date.current, NaiveDate::from_ymd_opt(2024, 1, 6).unwrap());
        assert!(record.is_credit());
    }

    #[test]
    fn reapply_reads_originals_after_a_mapping_change() {
        let mut p = profile(vec![]);
        let source = row(&["2024-01-05", "AMZN MKTPLACE", "-42.10", "Shopping", "Misc"]);
        let mut record = ingest_row(&p, source).unwrap();

        p.set_column(SemanticField::Category, 4);
        p.add_transform(TransformRule::contains(SemanticField::Category, "Shopping", "Retail"))
            .unwrap();

        assert_eq!(reapply_to_record(&mut record, &p), 1);
        assert_eq!(record.category.original(), "Shopping");
        assert_eq!(record.category.current, "Retail");

        let once = record.clone();
        reapply_to_record(&mut record, &p);
        assert_eq!(record, once);
    }

    #[test]
    fn reapply_sees_amount_text_as_ingested() {
        let p = profile(vec![TransformRule::contains(SemanticField::Amount, "$1,250", "1200.00")]);
        let source = row(&["2024-01-05", "RENT", "$1,250.00", "Housing"]);

        let ingested = ingest_row(&p, source).unwrap();
        assert_eq!(ingested.amount.current.to_cents(), 120000);

        let mut reapplied = ingested.clone();
        reapply_to_record(&mut reapplied, &p);
        assert_eq!(reapplied, ingested);
    }
}
