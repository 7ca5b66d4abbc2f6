use serde::{Deserialize, Serialize};
use std::fmt;

/// Canonical role a statement column can play, independent of the header
/// text any one bank uses for it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub enum SemanticField {
    TransactionDate,
    Description,
    Amount,
    Category,
    Debit,
    Credit,
    DebitCreditCombined,
    /// Unmapped. Never a valid rewrite target.
    #[default]
    None,
}

impl SemanticField {
    pub const ALL: [SemanticField; 8] = [
        SemanticField::TransactionDate,
        SemanticField::Description,
        SemanticField::Amount,
        SemanticField::Category,
        SemanticField::Debit,
        SemanticField::Credit,
        SemanticField::DebitCreditCombined,
        SemanticField::None,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            SemanticField::TransactionDate => "Transaction Date",
            SemanticField::Description => "Description",
            SemanticField::Amount => "Amount",
            SemanticField::Category => "Category",
            SemanticField::Debit => "Debit",
            SemanticField::Credit => "Credit",
            SemanticField::DebitCreditCombined => "Credit & Debit",
            SemanticField::None => "",
        }
    }

    pub fn is_rewritable(self) -> bool {
        self != SemanticField::None
    }
}

impl fmt::Display for SemanticField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl std::str::FromStr for SemanticField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match wanted.as_str() {
            "transactiondate" | "date" => Ok(SemanticField::TransactionDate),
            "description" | "lineitem" => Ok(SemanticField::Description),
            "amount" => Ok(SemanticField::Amount),
            "category" => Ok(SemanticField::Category),
            "debit" => Ok(SemanticField::Debit),
            "credit" => Ok(SemanticField::Credit),
            "debitcreditcombined" | "creditdebit" | "creditdebitcombined" => {
                Ok(SemanticField::DebitCreditCombined)
            }
            "none" | "" => Ok(SemanticField::None),
            _ => Err(format!("Unknown field: '{s}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn catalog_has_eight_distinct_fields() {
        let mut all = SemanticField::ALL.to_vec();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 8);
    }

    #[test]
    fn display_names() {
        assert_eq!(SemanticField::TransactionDate.to_string(), "Transaction Date");
        assert_eq!(SemanticField::DebitCreditCombined.to_string(), "Credit & Debit");
        assert_eq!(SemanticField::None.to_string(), "");
    }

    #[test]
    fn parse_accepts_variant_and_display_names() {
        for field in SemanticField::ALL {
            assert_eq!(SemanticField::from_str(&format!("{field:?}")).unwrap(), field);
        }
        assert_eq!(
            SemanticField::from_str("Transaction Date").unwrap(),
            SemanticField::TransactionDate
        );
        assert_eq!(
            SemanticField::from_str("credit & debit").unwrap(),
            SemanticField::DebitCreditCombined
        );
        assert!(SemanticField::from_str("payee").is_err());
    }

    #[test]
    fn none_is_not_rewritable() {
        assert!(!SemanticField::None.is_rewritable());
        assert!(SemanticField::Category.is_rewritable());
    }
}
