//! Compiles typed filter conditions into store predicates.

use crate::error::{Error, Result};
use crate::store::{Predicate, StoreQuery, slot_index};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One filter condition from the administrative query surface.
///
/// `field` is a generic slot name (`v0`..`v5`); the store layout does not
/// expose domain meaning. `operator` is one of `eq`, `contains`, `regex`,
/// `in`, `gt`, `lt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    /// Generic slot name the condition applies to.
    pub field: String,
    /// Comparison value; `in` expects an array.
    pub value: Value,
    /// Operator name.
    pub operator: String,
}

impl FilterCondition {
    /// Convenience constructor.
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            operator: operator.into(),
        }
    }

    /// Returns true when this is an equality condition on `field`.
    pub fn is_eq_on(&self, field: &str) -> bool {
        self.field == field && self.operator == "eq"
    }
}

/// How the compiler treats malformed conditions.
///
/// The stored-rule administration surface historically dropped unrecognized
/// operators and fields instead of rejecting them; `Lenient` preserves that
/// behavior and is the default. `Strict` rejects with
/// [`Error::InvalidFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Skip malformed conditions.
    #[default]
    Lenient,
    /// Reject malformed conditions.
    Strict,
}

/// Compiles conditions into a conjunctive store query.
///
/// An empty condition list compiles to a match-everything query.
pub fn compile(conditions: &[FilterCondition], mode: FilterMode) -> Result<StoreQuery> {
    let mut query = StoreQuery::new();
    for condition in conditions {
        match compile_condition(condition) {
            Ok(predicate) => query.push(condition.field.clone(), predicate),
            Err(error) => match mode {
                FilterMode::Lenient => continue,
                FilterMode::Strict => return Err(error),
            },
        }
    }
    Ok(query)
}

/// Compiles conditions, dropping any on the excluded fields first.
///
/// Used to strip the subject dimension for administrators; yields a
/// match-everything query when nothing remains.
pub fn compile_excluding(
    conditions: &[FilterCondition],
    excluded_fields: &[&str],
    mode: FilterMode,
) -> Result<StoreQuery> {
    let retained: Vec<FilterCondition> = conditions
        .iter()
        .filter(|condition| !excluded_fields.contains(&condition.field.as_str()))
        .cloned()
        .collect();
    compile(&retained, mode)
}

fn compile_condition(condition: &FilterCondition) -> Result<Predicate> {
    if slot_index(&condition.field).is_none() {
        return Err(Error::InvalidFilter(format!(
            "unknown field `{}`",
            condition.field
        )));
    }
    match condition.operator.as_str() {
        "eq" => Ok(Predicate::Eq(scalar_string(condition)?)),
        "contains" => Ok(Predicate::Contains(scalar_string(condition)?.to_lowercase())),
        "regex" => {
            let pattern = scalar_string(condition)?;
            let compiled = regex::Regex::new(&pattern).map_err(|error| {
                Error::InvalidFilter(format!("invalid regex `{pattern}`: {error}"))
            })?;
            Ok(Predicate::Regex(compiled))
        }
        "in" => {
            let Value::Array(items) = &condition.value else {
                return Err(Error::InvalidFilter(format!(
                    "`in` on `{}` expects an array value",
                    condition.field
                )));
            };
            let mut options = Vec::with_capacity(items.len());
            for item in items {
                options.push(value_string(item).ok_or_else(|| {
                    Error::InvalidFilter(format!(
                        "`in` on `{}` expects scalar elements",
                        condition.field
                    ))
                })?);
            }
            Ok(Predicate::In(options))
        }
        "gt" => Ok(Predicate::Gt(scalar_string(condition)?)),
        "lt" => Ok(Predicate::Lt(scalar_string(condition)?)),
        other => Err(Error::InvalidFilter(format!(
            "unrecognized operator `{other}`"
        ))),
    }
}

fn scalar_string(condition: &FilterCondition) -> Result<String> {
    value_string(&condition.value).ok_or_else(|| {
        Error::InvalidFilter(format!(
            "`{}` on `{}` expects a scalar value",
            condition.operator, condition.field
        ))
    })
}

fn value_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{FIELD_RESOURCE, FIELD_SUBJECT, RuleRecord};
    use serde_json::json;

    fn fixture() -> Vec<RuleRecord> {
        let tuple = |fields: &[&str]| {
            RuleRecord::new(fields.iter().map(|field| field.to_string()).collect())
        };
        vec![
            tuple(&["alice", "CN-US-sea", "read", "", "allow", ""]),
            tuple(&["bob", "CN-DE-air", "write", "", "deny", ""]),
            tuple(&["carol", "US-JP-sea", "read", "", "allow", "3"]),
        ]
    }

    fn matching(conditions: &[FilterCondition]) -> Vec<String> {
        let query = compile(conditions, FilterMode::Lenient).unwrap();
        fixture()
            .iter()
            .filter(|record| query.matches(record))
            .map(|record| record.field(FIELD_SUBJECT).unwrap().to_string())
            .collect()
    }

    #[test]
    fn empty_conditions_should_match_everything() {
        assert_eq!(matching(&[]), ["alice", "bob", "carol"]);
    }

    #[test]
    fn eq_should_match_exactly() {
        let conditions = [FilterCondition::new("v0", "eq", "bob")];
        assert_eq!(matching(&conditions), ["bob"]);
    }

    #[test]
    fn contains_should_be_case_insensitive() {
        let conditions = [FilterCondition::new("v1", "contains", "cn-")];
        assert_eq!(matching(&conditions), ["alice", "bob"]);
    }

    #[test]
    fn regex_should_be_case_sensitive() {
        let conditions = [FilterCondition::new("v1", "regex", "^CN-.*-sea$")];
        assert_eq!(matching(&conditions), ["alice"]);

        let lowercase = [FilterCondition::new("v1", "regex", "^cn-")];
        assert!(matching(&lowercase).is_empty());
    }

    #[test]
    fn in_should_match_set_members() {
        let conditions = [FilterCondition::new("v0", "in", json!(["alice", "carol"]))];
        assert_eq!(matching(&conditions), ["alice", "carol"]);
    }

    #[test]
    fn gt_and_lt_should_compare_numerically_when_possible() {
        let gt = [FilterCondition::new("v5", "gt", json!(2))];
        assert_eq!(matching(&gt), ["carol"]);

        let lt = [FilterCondition::new("v2", "lt", "write")];
        assert_eq!(matching(&lt), ["alice", "carol"]);
    }

    #[test]
    fn conditions_should_combine_conjunctively() {
        let conditions = [
            FilterCondition::new("v2", "eq", "read"),
            FilterCondition::new("v1", "contains", "us"),
        ];
        assert_eq!(matching(&conditions), ["alice", "carol"]);
    }

    #[test]
    fn lenient_mode_should_skip_unrecognized_operators() {
        let conditions = [
            FilterCondition::new("v0", "approximately", "alice"),
            FilterCondition::new("v2", "eq", "read"),
        ];
        assert_eq!(matching(&conditions), ["alice", "carol"]);
    }

    #[test]
    fn lenient_mode_should_skip_unknown_fields() {
        let conditions = [FilterCondition::new("v9", "eq", "alice")];
        assert_eq!(matching(&conditions), ["alice", "bob", "carol"]);
    }

    #[test]
    fn strict_mode_should_reject_unrecognized_operators() {
        let conditions = [FilterCondition::new("v0", "approximately", "alice")];
        let result = compile(&conditions, FilterMode::Strict);
        assert!(matches!(result, Err(Error::InvalidFilter(_))));
    }

    #[test]
    fn strict_mode_should_reject_malformed_regex() {
        let conditions = [FilterCondition::new("v1", "regex", "(")];
        let result = compile(&conditions, FilterMode::Strict);
        assert!(matches!(result, Err(Error::InvalidFilter(_))));
    }

    #[test]
    fn compile_excluding_should_drop_conditions_on_excluded_fields() {
        let conditions = [
            FilterCondition::new("v0", "eq", "alice"),
            FilterCondition::new("v1", "eq", "CN-US-sea"),
        ];
        let query =
            compile_excluding(&conditions, &[FIELD_SUBJECT], FilterMode::Lenient).unwrap();
        let records = fixture();
        let hits: Vec<&RuleRecord> = records
            .iter()
            .filter(|record| query.matches(record))
            .collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].field(FIELD_RESOURCE), Some("CN-US-sea"));

        let all = compile_excluding(&conditions, &["v0", "v1"], FilterMode::Lenient).unwrap();
        assert!(all.is_empty());
    }
}
