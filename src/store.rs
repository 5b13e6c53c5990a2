//! Rule store seam and the positional record format.
//!
//! Rules are persisted as flat string tuples partitioned by [`RuleKind`]:
//! slot `v0` holds the subject/principal, `v1` the resource/role, and so on.
//! That layout, and the legacy attribute encoding, are confined to this
//! module; the rest of the crate works with typed [`Rule`] values.

use crate::error::StoreError;
use crate::types::{AccessRule, AttributeMap, Effect, Rule, RoleAssignment, RuleKind};
use async_trait::async_trait;
use std::cmp::Ordering;

/// Slot name for the subject/principal field.
pub const FIELD_SUBJECT: &str = "v0";
/// Slot name for the resource/role field.
pub const FIELD_RESOURCE: &str = "v1";
/// Slot name for the action field ("p") or description field ("g").
pub const FIELD_ACTION: &str = "v2";
/// Slot name for the attribute-filter field.
pub const FIELD_ATTRIBUTES: &str = "v3";
/// Slot name for the effect field.
pub const FIELD_EFFECT: &str = "v4";
/// Slot name for the description field of "p" rules.
pub const FIELD_DESCRIPTION: &str = "v5";

pub(crate) fn slot_index(field: &str) -> Option<usize> {
    match field {
        "v0" => Some(0),
        "v1" => Some(1),
        "v2" => Some(2),
        "v3" => Some(3),
        "v4" => Some(4),
        "v5" => Some(5),
        _ => None,
    }
}

/// Flat positional tuple as persisted by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuleRecord {
    fields: Vec<String>,
}

impl RuleRecord {
    /// Builds a record from ordered slot values.
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// Returns the value of a generic slot name (`v0`..`v5`), if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        slot_index(name).and_then(|idx| self.fields.get(idx).map(String::as_str))
    }

    /// Returns the ordered slot values.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

/// Single compiled predicate over one record slot.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Exact string match.
    Eq(String),
    /// Case-insensitive substring match; the needle is stored lowercased.
    Contains(String),
    /// Case-sensitive pattern match.
    Regex(regex::Regex),
    /// Set membership.
    In(Vec<String>),
    /// Greater-than, numeric when both sides parse, else lexicographic.
    Gt(String),
    /// Less-than, numeric when both sides parse, else lexicographic.
    Lt(String),
}

impl Predicate {
    fn matches(&self, value: &str) -> bool {
        match self {
            Self::Eq(expected) => value == expected,
            Self::Contains(needle) => value.to_lowercase().contains(needle),
            Self::Regex(pattern) => pattern.is_match(value),
            Self::In(options) => options.iter().any(|option| option == value),
            Self::Gt(bound) => ordered_cmp(value, bound) == Ordering::Greater,
            Self::Lt(bound) => ordered_cmp(value, bound) == Ordering::Less,
        }
    }
}

/// Compares numerically when both sides parse as numbers, else as strings.
fn ordered_cmp(left: &str, right: &str) -> Ordering {
    if let (Ok(l), Ok(r)) = (left.parse::<f64>(), right.parse::<f64>())
        && let Some(ordering) = l.partial_cmp(&r)
    {
        return ordering;
    }
    left.cmp(right)
}

/// Conjunction of slot predicates; empty means match-everything.
#[derive(Debug, Clone, Default)]
pub struct StoreQuery {
    predicates: Vec<(String, Predicate)>,
}

impl StoreQuery {
    /// Creates a match-everything query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a full-tuple equality query for a record.
    pub fn exact(record: &RuleRecord) -> Self {
        let mut query = Self::new();
        for (idx, value) in record.fields().iter().enumerate() {
            query.push(format!("v{idx}"), Predicate::Eq(value.clone()));
        }
        query
    }

    /// Appends a predicate on a slot.
    pub fn push(&mut self, field: impl Into<String>, predicate: Predicate) {
        self.predicates.push((field.into(), predicate));
    }

    /// Appends an equality predicate on a slot.
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(field, Predicate::Eq(value.into()));
        self
    }

    /// Appends a membership predicate on a slot.
    pub fn any_of(mut self, field: impl Into<String>, values: Vec<String>) -> Self {
        self.push(field, Predicate::In(values));
        self
    }

    /// Returns true when no predicate is present.
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// Evaluates the query against a record.
    ///
    /// A predicate on a slot the record does not have never matches.
    pub fn matches(&self, record: &RuleRecord) -> bool {
        self.predicates.iter().all(|(field, predicate)| {
            record
                .field(field)
                .is_some_and(|value| predicate.matches(value))
        })
    }
}

/// Store interface for the partitioned rule collection.
///
/// Implementations translate [`StoreQuery`] into their native query language;
/// in-process stores can evaluate it with [`StoreQuery::matches`]. All
/// methods are suspension points; no ordering is guaranteed between
/// concurrent callers.
#[async_trait]
pub trait RuleStore {
    /// Returns all records of `kind` matching `query`.
    async fn find(
        &self,
        kind: RuleKind,
        query: &StoreQuery,
    ) -> std::result::Result<Vec<RuleRecord>, StoreError>;

    /// Counts records of `kind` matching `query`.
    async fn count(
        &self,
        kind: RuleKind,
        query: &StoreQuery,
    ) -> std::result::Result<u64, StoreError>;

    /// Inserts a record under `kind`.
    async fn insert(
        &self,
        kind: RuleKind,
        record: RuleRecord,
    ) -> std::result::Result<(), StoreError>;

    /// Deletes one record of `kind` matching `query`; returns whether one
    /// was deleted.
    async fn delete_one(
        &self,
        kind: RuleKind,
        query: &StoreQuery,
    ) -> std::result::Result<bool, StoreError>;

    /// Replaces one record of `kind` matching `query`; returns whether one
    /// was replaced.
    async fn replace_one(
        &self,
        kind: RuleKind,
        query: &StoreQuery,
        record: RuleRecord,
    ) -> std::result::Result<bool, StoreError>;
}

/// Encodes a rule into its positional record form.
pub fn encode_rule(rule: &Rule) -> RuleRecord {
    match rule {
        Rule::Access(rule) => RuleRecord::new(vec![
            rule.subject.clone(),
            rule.resource.clone(),
            rule.action.clone(),
            encode_attributes(rule.attributes.as_ref()),
            rule.effect.as_str().to_string(),
            rule.description.clone(),
        ]),
        Rule::Assignment(assignment) => RuleRecord::new(vec![
            assignment.principal.clone(),
            assignment.role.clone(),
            assignment.description.clone(),
        ]),
    }
}

/// Decodes a positional record into a typed rule.
///
/// Missing slots decode as empty strings; a blank effect decodes as Allow.
pub fn decode_rule(kind: RuleKind, record: &RuleRecord) -> Rule {
    let slot = |idx: usize| {
        record
            .fields()
            .get(idx)
            .cloned()
            .unwrap_or_default()
    };
    match kind {
        RuleKind::Access => Rule::Access(AccessRule {
            subject: slot(0),
            resource: slot(1),
            action: slot(2),
            attributes: decode_attributes(&slot(3)),
            effect: Effect::parse_lenient(&slot(4)),
            description: slot(5),
        }),
        RuleKind::Assignment => Rule::Assignment(RoleAssignment {
            principal: slot(0),
            role: slot(1),
            description: slot(2),
        }),
    }
}

/// Decodes an access-kind record directly into an [`AccessRule`].
pub(crate) fn decode_access(record: &RuleRecord) -> AccessRule {
    match decode_rule(RuleKind::Access, record) {
        Rule::Access(rule) => rule,
        Rule::Assignment(_) => unreachable!("access kind decodes to access rules"),
    }
}

/// Decodes an assignment-kind record directly into a [`RoleAssignment`].
pub(crate) fn decode_assignment(record: &RuleRecord) -> RoleAssignment {
    match decode_rule(RuleKind::Assignment, record) {
        Rule::Assignment(assignment) => assignment,
        Rule::Access(_) => unreachable!("assignment kind decodes to assignments"),
    }
}

/// Encodes an attribute filter into its stored string form.
///
/// Absent or empty filters encode as the empty string; populated filters
/// keep the legacy one-element list wrapping.
fn encode_attributes(attributes: Option<&AttributeMap>) -> String {
    match attributes {
        Some(map) if !map.is_empty() => {
            serde_json::to_string(&vec![map]).unwrap_or_default()
        }
        _ => String::new(),
    }
}

/// Decodes a stored attribute filter.
///
/// Accepts the empty string, a bare JSON mapping, or the legacy one-element
/// list wrapping a mapping. Anything else decodes as absent.
fn decode_attributes(stored: &str) -> Option<AttributeMap> {
    let trimmed = stored.trim();
    if trimmed.is_empty() {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(trimmed).ok()?;
    let mapping = match value {
        serde_json::Value::Object(map) => map,
        serde_json::Value::Array(items) => match items.into_iter().next()? {
            serde_json::Value::Object(map) => map,
            _ => return None,
        },
        _ => return None,
    };
    if mapping.is_empty() {
        return None;
    }
    Some(mapping.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attribute_rule() -> Rule {
        Rule::Access(AccessRule {
            subject: "alice".into(),
            resource: "CN-US-sea".into(),
            action: "read".into(),
            attributes: Some(AttributeMap::from([("start".into(), json!("CN"))])),
            effect: Effect::Allow,
            description: "lane read".into(),
        })
    }

    #[test]
    fn encode_should_wrap_attributes_in_single_element_list() {
        let record = encode_rule(&attribute_rule());
        assert_eq!(record.field(FIELD_ATTRIBUTES), Some(r#"[{"start":"CN"}]"#));
        assert_eq!(record.field(FIELD_EFFECT), Some("allow"));
    }

    #[test]
    fn decode_should_accept_list_wrapped_and_bare_mappings() {
        let wrapped = decode_attributes(r#"[{"start":"CN"}]"#).unwrap();
        let bare = decode_attributes(r#"{"start":"CN"}"#).unwrap();
        assert_eq!(wrapped, bare);
        assert_eq!(wrapped.get("start"), Some(&json!("CN")));

        assert_eq!(decode_attributes(""), None);
        assert_eq!(decode_attributes("   "), None);
        assert_eq!(decode_attributes("not json"), None);
        assert_eq!(decode_attributes("[1, 2]"), None);
    }

    #[test]
    fn decode_should_default_blank_effect_to_allow() {
        let record = RuleRecord::new(vec![
            "alice".into(),
            "obj".into(),
            "act".into(),
            String::new(),
            String::new(),
            String::new(),
        ]);
        let Rule::Access(rule) = decode_rule(RuleKind::Access, &record) else {
            panic!("expected access rule");
        };
        assert_eq!(rule.effect, Effect::Allow);
        assert_eq!(rule.attributes, None);
    }

    #[test]
    fn decode_should_tolerate_short_records() {
        let record = RuleRecord::new(vec!["alice".into(), "shipper".into()]);
        let Rule::Assignment(assignment) = decode_rule(RuleKind::Assignment, &record) else {
            panic!("expected assignment");
        };
        assert_eq!(assignment.principal, "alice");
        assert_eq!(assignment.role, "shipper");
        assert_eq!(assignment.description, "");
    }

    #[test]
    fn rule_should_round_trip_through_record_form() {
        let rule = attribute_rule();
        let record = encode_rule(&rule);
        assert_eq!(decode_rule(RuleKind::Access, &record), rule);
    }

    #[test]
    fn exact_query_should_match_only_the_same_tuple() {
        let record = encode_rule(&attribute_rule());
        let query = StoreQuery::exact(&record);
        assert!(query.matches(&record));

        let other = RuleRecord::new(vec![
            "bob".into(),
            "CN-US-sea".into(),
            "read".into(),
            String::new(),
            "allow".into(),
            String::new(),
        ]);
        assert!(!query.matches(&other));
    }

    #[test]
    fn ordered_cmp_should_prefer_numeric_comparison() {
        assert_eq!(ordered_cmp("9", "10"), Ordering::Less);
        assert_eq!(ordered_cmp("b", "a"), Ordering::Greater);
        assert_eq!(ordered_cmp("10", "2x"), Ordering::Less);
    }
}
