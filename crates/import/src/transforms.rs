use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use tally_core::{SemanticField, TransformRule};

/// Rules grouped by target field.
///
/// Fields keep the order in which they first received a rule and rules keep
/// insertion order within their field. That order is behavior: the engine
/// walks it front to back and the first matching rule for a field wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformSet {
    groups: Vec<(SemanticField, Vec<TransformRule>)>,
}

impl TransformSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: TransformRule) {
        match self.groups.iter_mut().find(|(field, _)| *field == rule.target) {
            Some((_, rules)) => rules.push(rule),
            None => self.groups.push((rule.target, vec![rule])),
        }
    }

    pub fn for_field(&self, field: SemanticField) -> &[TransformRule] {
        self.groups
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, rules)| rules.as_slice())
            .unwrap_or_default()
    }

    pub fn fields(&self) -> impl Iterator<Item = SemanticField> + '_ {
        self.groups.iter().map(|(field, _)| *field)
    }

    /// Every rule in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = &TransformRule> {
        self.groups.iter().flat_map(|(_, rules)| rules.iter())
    }

    /// Position of a structurally equal rule within its target field's list.
    pub fn position_of(&self, rule: &TransformRule) -> Option<usize> {
        self.for_field(rule.target).iter().position(|r| r == rule)
    }

    /// Replaces the rule at `index` in `rule.target`'s list.
    pub fn replace(&mut self, index: usize, rule: TransformRule) -> bool {
        let slot = self
            .groups
            .iter_mut()
            .find(|(field, _)| *field == rule.target)
            .and_then(|(_, rules)| rules.get_mut(index));
        match slot {
            Some(slot) => {
                *slot = rule;
                true
            }
            None => false,
        }
    }

    /// Removes the first structurally equal rule. Fields left without rules
    /// are dropped.
    pub fn remove(&mut self, rule: &TransformRule) -> bool {
        let Some(group) = self.groups.iter().position(|(f, _)| *f == rule.target) else {
            return false;
        };
        let rules = &mut self.groups[group].1;
        let Some(index) = rules.iter().position(|r| r == rule) else {
            return false;
        };
        rules.remove(index);
        if rules.is_empty() {
            self.groups.remove(group);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.groups.iter().map(|(_, rules)| rules.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<TransformRule> for TransformSet {
    fn from_iter<I: IntoIterator<Item = TransformRule>>(iter: I) -> Self {
        let mut set = TransformSet::new();
        for rule in iter {
            set.push(rule);
        }
        set
    }
}

impl Serialize for TransformSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.groups.len()))?;
        for (field, rules) in &self.groups {
            map.serialize_entry(field, rules)?;
        }
        map.end()
    }
}

struct TransformSetVisitor;

impl<'de> Visitor<'de> for TransformSetVisitor {
    type Value = TransformSet;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map of field name to a list of transforms")
    }

    fn visit_map<M>(self, mut access: M) -> Result<Self::Value, M::Error>
    where
        M: MapAccess<'de>,
    {
        let mut set = TransformSet::new();
        while let Some((field, rules)) =
            access.next_entry::<SemanticField, Vec<TransformRule>>()?
        {
            if !field.is_rewritable() {
                return Err(de::Error::custom("transforms cannot target the None field"));
            }
            for mut rule in rules {
                rule.target = field;
                set.push(rule);
            }
        }
        Ok(set)
    }
}

impl<'de> Deserialize<'de> for TransformSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(TransformSetVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_core::MatchKind;

    fn category(pattern: &str, replacement: &str) -> TransformRule {
        TransformRule::contains(SemanticField::Category, pattern, replacement)
    }

    fn description(pattern: &str, replacement: &str) -> TransformRule {
        TransformRule::contains(SemanticField::Description, pattern, replacement)
    }

    #[test]
    fn iteration_follows_first_registration_then_insertion() {
        let set: TransformSet = [
            category("a", "1"),
            description("b", "2"),
            category("c", "3"),
        ]
        .into_iter()
        .collect();

        let order: Vec<&str> = set.iter().map(|r| r.replacement.as_str()).collect();
        assert_eq!(order, vec!["1", "3", "2"]);
        assert_eq!(
            set.fields().collect::<Vec<_>>(),
            vec![SemanticField::Category, SemanticField::Description]
        );
    }

    #[test]
    fn position_and_replace_work_within_the_field_list() {
        let mut set: TransformSet = [category("a", "1"), category("c", "3")].into_iter().collect();
        let index = set.position_of(&category("c", "3")).unwrap();
        assert_eq!(index, 1);

        assert!(set.replace(index, category("c", "three")));
        assert_eq!(set.for_field(SemanticField::Category)[1].replacement, "three");
        assert!(!set.replace(5, category("x", "y")));
    }

    #[test]
    fn remove_drops_empty_groups() {
        let mut set: TransformSet = [category("a", "1"), description("b", "2")].into_iter().collect();
        assert!(set.remove(&category("a", "1")));
        assert!(!set.remove(&category("a", "1")));
        assert_eq!(set.fields().collect::<Vec<_>>(), vec![SemanticField::Description]);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn persisted_shape_is_keyed_by_field_and_restores_targets() {
        let set: TransformSet = [
            description("AMZN", "Amazon"),
            category("Shopping", "Groceries").when(
                SemanticField::Description,
                MatchKind::Contains,
                "WHOLEFDS",
            ),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_value(&set).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "Description": [
                    {"matchValue": "AMZN", "matchKind": "Contains", "replacementValue": "Amazon"}
                ],
                "Category": [{
                    "matchValue": "Shopping",
                    "matchKind": "Contains",
                    "replacementValue": "Groceries",
                    "conditionalOn": {
                        "field": "Description",
                        "matchValue": "WHOLEFDS",
                        "matchKind": "Contains"
                    }
                }]
            })
        );

        let text = serde_json::to_string(&set).unwrap();
        let back: TransformSet = serde_json::from_str(&text).unwrap();
        assert_eq!(back, set);
        assert_eq!(back.for_field(SemanticField::Category)[0].target, SemanticField::Category);
    }

    #[test]
    fn deserialize_keeps_document_order() {
        let json = r#"{"Category":[{"matchValue":"x","replacementValue":"y"}],
                       "Description":[{"matchValue":"a","replacementValue":"b"}]}"#;
        let set: TransformSet = serde_json::from_str(json).unwrap();
        assert_eq!(
            set.fields().collect::<Vec<_>>(),
            vec![SemanticField::Category, SemanticField::Description]
        );
    }

    #[test]
    fn deserialize_rejects_none_target() {
        let json = r#"{"None":[{"matchValue":"x","replacementValue":"y"}]}"#;
        assert!(serde_json::from_str::<TransformSet>(json).is_err());
    }
}
