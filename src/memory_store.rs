use crate::error::StoreError;
use crate::store::{RuleRecord, RuleStore, StoreQuery, encode_rule};
use crate::types::{AccessRule, Rule, RoleAssignment, RuleKind};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

/// In-memory store implementation for tests and demos.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    access: RwLock<Vec<RuleRecord>>,
    assignments: RwLock<Vec<RuleRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn partition(&self, kind: RuleKind) -> &RwLock<Vec<RuleRecord>> {
        match kind {
            RuleKind::Access => &self.inner.access,
            RuleKind::Assignment => &self.inner.assignments,
        }
    }

    /// Seeds an access rule without duplicate checks.
    pub fn add_access_rule(&self, rule: AccessRule) {
        let record = encode_rule(&Rule::Access(rule));
        let mut guard = self.inner.access.write().expect("poisoned lock");
        guard.push(record);
    }

    /// Seeds a principal→role edge without duplicate checks.
    pub fn add_role_assignment(&self, principal: &str, role: &str) {
        let record = encode_rule(&Rule::Assignment(RoleAssignment {
            principal: principal.to_string(),
            role: role.to_string(),
            description: String::new(),
        }));
        let mut guard = self.inner.assignments.write().expect("poisoned lock");
        guard.push(record);
    }
}

#[async_trait]
impl RuleStore for MemoryStore {
    async fn find(
        &self,
        kind: RuleKind,
        query: &StoreQuery,
    ) -> std::result::Result<Vec<RuleRecord>, StoreError> {
        let guard = self.partition(kind).read().expect("poisoned lock");
        Ok(guard
            .iter()
            .filter(|record| query.matches(record))
            .cloned()
            .collect())
    }

    async fn count(
        &self,
        kind: RuleKind,
        query: &StoreQuery,
    ) -> std::result::Result<u64, StoreError> {
        let guard = self.partition(kind).read().expect("poisoned lock");
        Ok(guard.iter().filter(|record| query.matches(record)).count() as u64)
    }

    async fn insert(
        &self,
        kind: RuleKind,
        record: RuleRecord,
    ) -> std::result::Result<(), StoreError> {
        let mut guard = self.partition(kind).write().expect("poisoned lock");
        guard.push(record);
        Ok(())
    }

    async fn delete_one(
        &self,
        kind: RuleKind,
        query: &StoreQuery,
    ) -> std::result::Result<bool, StoreError> {
        let mut guard = self.partition(kind).write().expect("poisoned lock");
        match guard.iter().position(|record| query.matches(record)) {
            Some(index) => {
                guard.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn replace_one(
        &self,
        kind: RuleKind,
        query: &StoreQuery,
        record: RuleRecord,
    ) -> std::result::Result<bool, StoreError> {
        let mut guard = self.partition(kind).write().expect("poisoned lock");
        match guard.iter().position(|existing| query.matches(existing)) {
            Some(index) => {
                guard[index] = record;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
