pub mod field;
pub mod mapping;
pub mod money;
pub mod period;
pub mod record;
pub mod rule;

pub use field::SemanticField;
pub use mapping::ColumnMapping;
pub use money::{parse_decimal, InvalidAmount, Money};
pub use period::DateRange;
pub use record::{CanonicalRecord, Tracked};
pub use rule::{ConditionalMatch, MatchKind, TransformRule};
