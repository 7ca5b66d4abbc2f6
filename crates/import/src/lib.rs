pub mod csv;
pub mod engine;
pub mod ingest;
pub mod profile;
pub mod store;
pub mod transforms;

pub use crate::csv::{detect_columns, read_statement, CsvError, StatementFile};
pub use engine::{apply_rules, apply_to_row, reapply_to_record, reapply_to_records, FieldAccess};
pub use ingest::{ingest_row, ingest_rows, IngestSummary, RowRejection};
pub use profile::{Delimiter, ProfileError, SourceProfile, REQUIRED_FIELDS};
pub use store::{AmountRange, RecordFilter, RecordStore, DEFAULT_CREDIT_CATEGORIES};
pub use transforms::TransformSet;

pub mod import {
    use crate::*;

    /// Tokenizes a statement with the profile's layout and ingests its rows
    /// into `store`.
    pub fn import_statement<R: std::io::Read>(
        data: R,
        profile: &SourceProfile,
        store: &mut RecordStore,
    ) -> Result<IngestSummary, CsvError> {
        let file = read_statement(data, profile.delimiter, profile.has_header)?;
        Ok(store.ingest(profile, file.rows))
    }

    /// Content opening with `{` is read as JSON, anything else as TOML.
    pub fn load_profile(content: &str) -> Result<SourceProfile, ProfileError> {
        let profile = if content.trim_start().starts_with('{') {
            SourceProfile::from_json(content)?
        } else {
            SourceProfile::from_toml(content)?
        };
        profile.validate()?;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::import::load_profile;
    use super::*;

    #[test]
    fn load_profile_reads_json_and_toml() {
        let json = r#"{"name":"checking","mapping":{"TransactionDate":0,"Description":1,"Amount":2,"Category":3}}"#;
        assert_eq!(load_profile(json).unwrap().name, "checking");

        let toml = "name = \"visa\"\n[mapping]\nTransactionDate = 0\nDescription = 1\nAmount = 2\nCategory = 3\n";
        assert_eq!(load_profile(toml).unwrap().name, "visa");
    }

    #[test]
    fn malformed_json_reports_the_json_error() {
        let json = r#"{"name":"checking","mapping":{"Category":3},}"#;
        assert!(matches!(load_profile(json), Err(ProfileError::Json(_))));
    }
}
