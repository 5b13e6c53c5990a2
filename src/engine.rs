use crate::cache::{Cache, NoCache};
use crate::error::{Error, Result};
use crate::filter::FilterMode;
use crate::matcher::{AttributeMatcher, ConjunctiveMatcher};
use crate::store::{
    FIELD_ACTION, FIELD_RESOURCE, FIELD_SUBJECT, RuleStore, StoreQuery, decode_access,
    decode_assignment, encode_rule,
};
use crate::types::{AccessRule, AttributeMap, Effect, Rule, RoleAssignment, RuleKind};
use std::collections::{HashSet, VecDeque};
use tracing::debug;

const DEFAULT_ADMIN_ROLE: &str = "admin";

/// Authorization engine with pluggable store, cache, and attribute matcher.
///
/// Stateless per call: every operation re-reads the store, so concurrent
/// invocation is safe at the operation level. The default configuration
/// performs no caching, trading performance for freshness.
pub struct Engine<S, C = NoCache> {
    pub(crate) store: S,
    pub(crate) cache: C,
    pub(crate) matcher: Box<dyn AttributeMatcher>,
    pub(crate) admin_role: String,
    pub(crate) filter_mode: FilterMode,
}

/// Builder for [`Engine`].
pub struct EngineBuilder<S, C = NoCache> {
    store: S,
    cache: C,
    matcher: Box<dyn AttributeMatcher>,
    admin_role: String,
    filter_mode: FilterMode,
}

impl<S> EngineBuilder<S, NoCache> {
    /// Creates a new builder with default configuration.
    pub fn new(store: S) -> Self {
        Self {
            store,
            cache: NoCache,
            matcher: Box::new(ConjunctiveMatcher),
            admin_role: DEFAULT_ADMIN_ROLE.to_string(),
            filter_mode: FilterMode::Lenient,
        }
    }
}

impl<S, C> EngineBuilder<S, C> {
    /// Sets the role name granting administrative visibility.
    pub fn admin_role(mut self, role: impl Into<String>) -> Self {
        self.admin_role = role.into();
        self
    }

    /// Rejects malformed filter conditions instead of skipping them.
    pub fn strict_filters(mut self, on: bool) -> Self {
        self.filter_mode = if on {
            FilterMode::Strict
        } else {
            FilterMode::Lenient
        };
        self
    }

    /// Sets the attribute matcher used by [`Engine::enforce`].
    pub fn attribute_matcher(mut self, matcher: impl AttributeMatcher + 'static) -> Self {
        self.matcher = Box::new(matcher);
        self
    }

    /// Sets the role-resolution cache implementation.
    pub fn cache<C2: Cache>(self, cache: C2) -> EngineBuilder<S, C2> {
        EngineBuilder {
            store: self.store,
            cache,
            matcher: self.matcher,
            admin_role: self.admin_role,
            filter_mode: self.filter_mode,
        }
    }

    /// Builds the engine.
    pub fn build(self) -> Engine<S, C> {
        Engine {
            store: self.store,
            cache: self.cache,
            matcher: self.matcher,
            admin_role: self.admin_role,
            filter_mode: self.filter_mode,
        }
    }
}

impl<S, C> Engine<S, C>
where
    S: RuleStore + Send + Sync,
    C: Cache,
{
    /// Decides whether `subject` may perform `action` on `resource` given
    /// the request context.
    ///
    /// Candidate rules are those naming the subject directly or any of its
    /// transitively resolved roles. A candidate applies when its attribute
    /// filter is empty or the context satisfies it. Any applicable Deny
    /// wins; zero applicable rules deny by default.
    pub async fn enforce(
        &self,
        subject: &str,
        resource: &str,
        action: &str,
        context: &AttributeMap,
    ) -> Result<bool> {
        let mut subjects = vec![subject.to_string()];
        subjects.extend(self.resolve_roles(subject).await?);

        let query = StoreQuery::new()
            .any_of(FIELD_SUBJECT, subjects)
            .eq(FIELD_RESOURCE, resource)
            .eq(FIELD_ACTION, action);
        let records = self
            .store
            .find(RuleKind::Access, &query)
            .await
            .map_err(Error::from)?;

        let mut allowed = false;
        for record in &records {
            let rule = decode_access(record);
            let applies = match &rule.attributes {
                None => true,
                Some(filter) => self.matcher.matches(filter, context),
            };
            if !applies {
                continue;
            }
            if rule.effect == Effect::Deny {
                debug!(subject, resource, action, "denied by matching deny rule");
                return Ok(false);
            }
            allowed = true;
        }

        debug!(subject, resource, action, allowed, "authorization decision");
        Ok(allowed)
    }

    /// Returns every role transitively reachable from `principal`.
    ///
    /// Breadth-first over assignment edges with a visited set, so cyclic
    /// graphs terminate and each role appears exactly once, in traversal
    /// order.
    pub async fn resolve_roles(&self, principal: &str) -> Result<Vec<String>> {
        if let Some(cached) = self.cache.get_roles(principal).await {
            return Ok(cached);
        }

        let mut resolved = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        for role in self.direct_roles(principal).await? {
            if visited.insert(role.clone()) {
                resolved.push(role.clone());
                queue.push_back(role);
            }
        }

        while let Some(role) = queue.pop_front() {
            for next in self.direct_roles(&role).await? {
                if visited.insert(next.clone()) {
                    resolved.push(next.clone());
                    queue.push_back(next);
                }
            }
        }

        self.cache.set_roles(principal, resolved.clone()).await;
        Ok(resolved)
    }

    /// Returns whether `principal` holds the admin role directly.
    ///
    /// Inherited admin assignments do not count; the check is a single
    /// store lookup.
    pub async fn is_admin(&self, principal: &str) -> Result<bool> {
        let query = StoreQuery::new()
            .eq(FIELD_SUBJECT, principal)
            .eq(FIELD_RESOURCE, self.admin_role.clone());
        let count = self
            .store
            .count(RuleKind::Assignment, &query)
            .await
            .map_err(Error::from)?;
        Ok(count > 0)
    }

    /// Returns every access rule granted to `principal` directly or through
    /// any transitively resolved role.
    pub async fn implicit_permissions(&self, principal: &str) -> Result<Vec<AccessRule>> {
        let mut subjects = vec![principal.to_string()];
        subjects.extend(self.resolve_roles(principal).await?);

        let query = StoreQuery::new().any_of(FIELD_SUBJECT, subjects);
        let records = self
            .store
            .find(RuleKind::Access, &query)
            .await
            .map_err(Error::from)?;
        Ok(records.iter().map(decode_access).collect())
    }

    /// Returns every access rule.
    pub async fn policy(&self) -> Result<Vec<AccessRule>> {
        let records = self
            .store
            .find(RuleKind::Access, &StoreQuery::new())
            .await
            .map_err(Error::from)?;
        Ok(records.iter().map(decode_access).collect())
    }

    /// Returns every role assignment.
    pub async fn role_assignments(&self) -> Result<Vec<RoleAssignment>> {
        let records = self
            .store
            .find(RuleKind::Assignment, &StoreQuery::new())
            .await
            .map_err(Error::from)?;
        Ok(records.iter().map(decode_assignment).collect())
    }

    /// Inserts a rule; duplicates are rejected.
    pub async fn add_rule(&self, rule: Rule) -> Result<()> {
        let kind = rule.kind();
        let record = encode_rule(&rule);
        let exact = StoreQuery::exact(&record);
        let existing = self
            .store
            .count(kind, &exact)
            .await
            .map_err(Error::from)?;
        if existing > 0 {
            return Err(Error::RuleAlreadyExists(rule.to_string()));
        }
        self.store
            .insert(kind, record)
            .await
            .map_err(Error::from)?;
        self.invalidate_if_assignment(kind).await;
        Ok(())
    }

    /// Removes a rule; a missing target is an error.
    pub async fn remove_rule(&self, rule: &Rule) -> Result<()> {
        let kind = rule.kind();
        let exact = StoreQuery::exact(&encode_rule(rule));
        let removed = self
            .store
            .delete_one(kind, &exact)
            .await
            .map_err(Error::from)?;
        if !removed {
            return Err(Error::RuleNotFound(rule.to_string()));
        }
        self.invalidate_if_assignment(kind).await;
        Ok(())
    }

    /// Replaces `old` with `new` within one rule kind.
    ///
    /// Cross-kind moves go through [`Engine::apply_updates`], which models
    /// them as remove-then-add.
    pub async fn update_rule(&self, old: &Rule, new: Rule) -> Result<()> {
        let kind = old.kind();
        if new.kind() != kind {
            return Err(Error::InvalidFilter(
                "update_rule requires both rules in the same partition".to_string(),
            ));
        }
        let exact = StoreQuery::exact(&encode_rule(old));
        let replaced = self
            .store
            .replace_one(kind, &exact, encode_rule(&new))
            .await
            .map_err(Error::from)?;
        if !replaced {
            return Err(Error::RuleNotFound(old.to_string()));
        }
        self.invalidate_if_assignment(kind).await;
        Ok(())
    }

    /// Replaces every rule of `kind` whose `match_field` slot equals
    /// `match_value` with `new_rules`. Returns the removed rules.
    ///
    /// Steps are sequential without compensation; use
    /// [`Engine::apply_updates`] for all-or-nothing semantics.
    pub async fn update_filtered(
        &self,
        kind: RuleKind,
        new_rules: Vec<Rule>,
        match_field: &str,
        match_value: &str,
    ) -> Result<Vec<Rule>> {
        for rule in &new_rules {
            if rule.kind() != kind {
                return Err(Error::InvalidFilter(format!(
                    "replacement rule {rule} does not belong to the `{kind}` partition"
                )));
            }
        }

        let query = StoreQuery::new().eq(match_field, match_value);
        let matched = self
            .store
            .find(kind, &query)
            .await
            .map_err(Error::from)?;

        let mut removed = Vec::with_capacity(matched.len());
        for record in &matched {
            self.store
                .delete_one(kind, &StoreQuery::exact(record))
                .await
                .map_err(Error::from)?;
            removed.push(crate::store::decode_rule(kind, record));
        }
        for rule in &new_rules {
            self.store
                .insert(kind, encode_rule(rule))
                .await
                .map_err(Error::from)?;
        }

        self.invalidate_if_assignment(kind).await;
        Ok(removed)
    }

    /// Adds a principal→role edge; duplicates are rejected.
    pub async fn add_role_assignment(&self, assignment: RoleAssignment) -> Result<()> {
        self.add_rule(Rule::Assignment(assignment)).await
    }

    /// Removes a principal→role edge; a missing edge is an error.
    pub async fn remove_role_assignment(&self, assignment: &RoleAssignment) -> Result<()> {
        self.remove_rule(&Rule::Assignment(assignment.clone())).await
    }

    /// Drops any cached role closures so the next resolution re-reads the
    /// store.
    pub async fn reload(&self) {
        self.cache.clear().await;
        debug!("role cache cleared");
    }

    async fn direct_roles(&self, source: &str) -> Result<Vec<String>> {
        let query = StoreQuery::new().eq(FIELD_SUBJECT, source);
        let records = self
            .store
            .find(RuleKind::Assignment, &query)
            .await
            .map_err(Error::from)?;
        Ok(records
            .iter()
            .map(|record| decode_assignment(record).role)
            .collect())
    }

    /// Role-assignment edges feed every closure, so any mutation of that
    /// partition clears the whole cache.
    async fn invalidate_if_assignment(&self, kind: RuleKind) {
        if kind == RuleKind::Assignment {
            self.cache.clear().await;
        }
    }
}
