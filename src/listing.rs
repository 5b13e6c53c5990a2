//! Administrative rule listing: filtering, sorting, pagination, role
//! expansion, and the administrator collapse.

use crate::cache::Cache;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::filter::{self, FilterCondition};
use crate::store::{FIELD_RESOURCE, FIELD_SUBJECT, RuleRecord, RuleStore, decode_rule};
use crate::types::{AccessRule, Effect, Rule, RuleKind};
use std::collections::HashSet;

/// Parameters for one page of the administrative rule listing.
#[derive(Debug, Clone)]
pub struct ListRequest {
    /// Rule partition to list.
    pub kind: RuleKind,
    /// Conjunctive filter conditions over generic slot names.
    pub conditions: Vec<FilterCondition>,
    /// Rows to skip before the page starts.
    pub skip: usize,
    /// Page size; zero means no limit.
    pub limit: usize,
    /// Slot name to sort by; listings are unsorted without it.
    pub sort_field: Option<String>,
    /// Expands a subject-equality condition across the subject's resolved
    /// roles, or collapses the listing for administrators.
    pub expand_inheritance: bool,
}

impl ListRequest {
    /// Creates an unfiltered, unpaginated request for a partition.
    pub fn new(kind: RuleKind) -> Self {
        Self {
            kind,
            conditions: Vec::new(),
            skip: 0,
            limit: 0,
            sort_field: None,
            expand_inheritance: false,
        }
    }

    /// Appends a filter condition.
    pub fn condition(mut self, condition: FilterCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Sets the page window. A zero limit disables the limit.
    pub fn page(mut self, skip: usize, limit: usize) -> Self {
        self.skip = skip;
        self.limit = limit;
        self
    }

    /// Sorts by a single slot name.
    pub fn sort_by(mut self, field: impl Into<String>) -> Self {
        self.sort_field = Some(field.into());
        self
    }

    /// Requests inheritance-aware listing.
    pub fn expand_inheritance(mut self, on: bool) -> Self {
        self.expand_inheritance = on;
        self
    }
}

/// One page of listing results.
///
/// `total` counts the materialized result set before pagination.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleListing {
    /// Pre-pagination row count.
    pub total: usize,
    /// The requested page.
    pub items: Vec<Rule>,
}

impl<S, C> Engine<S, C>
where
    S: RuleStore + Send + Sync,
    C: Cache,
{
    /// Lists rules for the administrative query surface.
    ///
    /// Three shapes, chosen per request:
    /// - subject-equality condition present, expansion requested, subject is
    ///   an administrator (access partition): the subject dimension is
    ///   stripped and rows collapse to one per distinct resource with
    ///   subject and action discarded, attributes emptied, and effect forced
    ///   to Allow — the administrator view answers "what resources exist".
    /// - subject-equality condition present, expansion requested, subject
    ///   not an administrator: the union of the literal query and one query
    ///   per resolved role with the subject condition substituted.
    /// - otherwise: a plain filtered read.
    ///
    /// Sorting and pagination apply to the materialized set; collapsed rows
    /// sort by resource only.
    pub async fn list_rules(&self, request: &ListRequest) -> Result<RuleListing> {
        let subject = request
            .conditions
            .iter()
            .find(|condition| condition.is_eq_on(FIELD_SUBJECT))
            .and_then(|condition| condition.value.as_str().map(str::to_string));

        if request.expand_inheritance
            && let Some(subject) = subject
        {
            if request.kind == RuleKind::Access && self.is_admin(&subject).await? {
                return self.list_collapsed(request).await;
            }
            return self.list_expanded(request, &subject).await;
        }

        self.list_plain(request).await
    }

    async fn list_plain(&self, request: &ListRequest) -> Result<RuleListing> {
        let query = filter::compile(&request.conditions, self.filter_mode)?;
        let mut records = self
            .store
            .find(request.kind, &query)
            .await
            .map_err(Error::from)?;
        sort_records(&mut records, request.sort_field.as_deref());
        Ok(paginate(records, request))
    }

    async fn list_expanded(&self, request: &ListRequest, subject: &str) -> Result<RuleListing> {
        let mut union: Vec<RuleRecord> = Vec::new();
        let mut seen: HashSet<RuleRecord> = HashSet::new();

        let literal = filter::compile(&request.conditions, self.filter_mode)?;
        for record in self
            .store
            .find(request.kind, &literal)
            .await
            .map_err(Error::from)?
        {
            if seen.insert(record.clone()) {
                union.push(record);
            }
        }

        for role in self.resolve_roles(subject).await? {
            let substituted = substitute_subject(&request.conditions, &role);
            let query = filter::compile(&substituted, self.filter_mode)?;
            for record in self
                .store
                .find(request.kind, &query)
                .await
                .map_err(Error::from)?
            {
                if seen.insert(record.clone()) {
                    union.push(record);
                }
            }
        }

        sort_records(&mut union, request.sort_field.as_deref());
        Ok(paginate(union, request))
    }

    async fn list_collapsed(&self, request: &ListRequest) -> Result<RuleListing> {
        let query =
            filter::compile_excluding(&request.conditions, &[FIELD_SUBJECT], self.filter_mode)?;
        let records = self
            .store
            .find(RuleKind::Access, &query)
            .await
            .map_err(Error::from)?;

        let mut resources: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for record in &records {
            let resource = record.field(FIELD_RESOURCE).unwrap_or_default().to_string();
            if seen.insert(resource.clone()) {
                resources.push(resource);
            }
        }
        resources.sort();

        let total = resources.len();
        let items = window(resources, request.skip, request.limit)
            .map(|resource| {
                Rule::Access(AccessRule {
                    subject: String::new(),
                    resource,
                    action: String::new(),
                    attributes: None,
                    effect: Effect::Allow,
                    description: String::new(),
                })
            })
            .collect();

        Ok(RuleListing { total, items })
    }
}

fn substitute_subject(conditions: &[FilterCondition], role: &str) -> Vec<FilterCondition> {
    conditions
        .iter()
        .map(|condition| {
            if condition.is_eq_on(FIELD_SUBJECT) {
                FilterCondition::new(FIELD_SUBJECT, "eq", role)
            } else {
                condition.clone()
            }
        })
        .collect()
}

fn sort_records(records: &mut [RuleRecord], sort_field: Option<&str>) {
    if let Some(field) = sort_field {
        records.sort_by(|left, right| {
            left.field(field)
                .unwrap_or_default()
                .cmp(right.field(field).unwrap_or_default())
        });
    }
}

fn paginate(records: Vec<RuleRecord>, request: &ListRequest) -> RuleListing {
    let total = records.len();
    let items = window(records, request.skip, request.limit)
        .map(|record| decode_rule(request.kind, &record))
        .collect();
    RuleListing { total, items }
}

fn window<T>(rows: Vec<T>, skip: usize, limit: usize) -> impl Iterator<Item = T> {
    let limit = if limit == 0 { usize::MAX } else { limit };
    rows.into_iter().skip(skip).take(limit)
}
