//! Attribute-aware RBAC authorization library for multi-tenant logistics
//! platforms.
//!
//! This crate decides whether a principal may perform an action on a
//! resource, accounting for role inheritance and request-time contextual
//! attributes, and exposes an administrative query layer for inspecting,
//! filtering, and bulk-editing the rule set. The default behavior is
//! deny-by-default with deny-overrides conflict resolution. Use [`Engine`]
//! for authorization and [`ListRequest`] for the administrative listing.
//!
//! # Examples
//!
//! Basic authorization flow using the in-memory store (enable
//! `memory-store`):
//! ```no_run
//! use freight_authz::{AttributeMap, EngineBuilder};
//! # #[cfg(feature = "memory-store")]
//! # {
//! use freight_authz::MemoryStore;
//! let store = MemoryStore::new();
//! store.add_role_assignment("alice", "shipper");
//! let engine = EngineBuilder::new(store).build();
//! let _ = engine.enforce("alice", "CN-US-sea", "read", &AttributeMap::new());
//! # }
//! ```
//!
//! Creating a process-local role cache (enable `memory-cache`):
//! ```no_run
//! # #[cfg(feature = "memory-cache")]
//! # {
//! use freight_authz::MemoryCache;
//! use std::time::Duration;
//! let cache = MemoryCache::new(1024).with_ttl(Duration::from_secs(30));
//! # let _ = cache;
//! # }
//! ```
#![forbid(unsafe_code)]

mod batch;
mod cache;
mod engine;
mod error;
mod filter;
mod listing;
mod matcher;
mod store;
mod types;
#[cfg(any(test, feature = "memory-cache"))]
mod memory_cache;

#[cfg(any(test, feature = "memory-store"))]
mod memory_store;

pub use crate::batch::RuleUpdate;
pub use crate::cache::{Cache, NoCache};
pub use crate::engine::{Engine, EngineBuilder};
pub use crate::error::{Error, Result, StoreError};
pub use crate::filter::{FilterCondition, FilterMode};
pub use crate::listing::{ListRequest, RuleListing};
pub use crate::matcher::{AttributeMatcher, ConjunctiveMatcher};
pub use crate::store::{
    FIELD_ACTION, FIELD_ATTRIBUTES, FIELD_DESCRIPTION, FIELD_EFFECT, FIELD_RESOURCE,
    FIELD_SUBJECT, Predicate, RuleRecord, RuleStore, StoreQuery, decode_rule, encode_rule,
};
pub use crate::types::{AccessRule, AttributeMap, Effect, Rule, RoleAssignment, RuleKind};

#[cfg(feature = "memory-store")]
pub use crate::memory_store::MemoryStore;

#[cfg(feature = "memory-cache")]
pub use crate::memory_cache::MemoryCache;
