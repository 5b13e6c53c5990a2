#![cfg(feature = "memory-store")]

use freight_authz::{
    AccessRule, AttributeMap, Effect, EngineBuilder, Error, FIELD_SUBJECT, FilterCondition,
    ListRequest, MemoryStore, Rule, RoleAssignment, RuleKind, RuleUpdate,
};
use futures::executor::block_on;
use serde_json::json;

fn access(subject: &str, resource: &str, action: &str, effect: Effect) -> AccessRule {
    AccessRule {
        subject: subject.into(),
        resource: resource.into(),
        action: action.into(),
        attributes: None,
        effect,
        description: String::new(),
    }
}

fn context(entries: &[(&str, &str)]) -> AttributeMap {
    entries
        .iter()
        .map(|(key, value)| (key.to_string(), json!(value)))
        .collect()
}

#[test]
fn shipment_read_should_flow_through_role_inheritance() {
    let store = MemoryStore::new();
    store.add_role_assignment("alice", "shipper");
    store.add_role_assignment("shipper", "approver");
    store.add_access_rule(access("approver", "CN-US-sea", "read", Effect::Allow));

    let engine = EngineBuilder::new(store).build();

    assert_eq!(
        block_on(engine.resolve_roles("alice")).unwrap(),
        ["shipper", "approver"]
    );
    assert!(block_on(engine.enforce("alice", "CN-US-sea", "read", &AttributeMap::new())).unwrap());
    assert!(
        !block_on(engine.enforce("alice", "CN-US-sea", "delete", &AttributeMap::new())).unwrap()
    );
}

#[test]
fn origin_restricted_rule_should_match_only_its_lane() {
    let store = MemoryStore::new();
    store.add_access_rule(AccessRule {
        attributes: Some(context(&[("start", "CN")])),
        ..access("alice", "obj", "act", Effect::Allow)
    });

    let engine = EngineBuilder::new(store).build();

    assert!(!block_on(engine.enforce("alice", "obj", "act", &context(&[("start", "US")]))).unwrap());
    assert!(block_on(engine.enforce("alice", "obj", "act", &context(&[("start", "CN")]))).unwrap());
}

#[test]
fn matching_deny_should_win_over_matching_allow() {
    let store = MemoryStore::new();
    store.add_access_rule(access("ops", "CN-US-sea", "read", Effect::Allow));
    store.add_access_rule(access("ops", "CN-US-sea", "read", Effect::Deny));
    store.add_role_assignment("alice", "ops");

    let engine = EngineBuilder::new(store).build();

    assert!(!block_on(engine.enforce("alice", "CN-US-sea", "read", &AttributeMap::new())).unwrap());
}

#[test]
fn admin_listing_should_answer_what_resources_exist() {
    let store = MemoryStore::new();
    // Many subject/action rows over few resources.
    for subject in ["alice", "bob", "carol"] {
        for action in ["read", "write"] {
            store.add_access_rule(access(subject, "CN-US-sea", action, Effect::Allow));
            store.add_access_rule(access(subject, "CN-DE-air", action, Effect::Allow));
        }
    }
    store.add_role_assignment("root", "admin");

    let engine = EngineBuilder::new(store).build();
    let request = ListRequest::new(RuleKind::Access)
        .condition(FilterCondition::new(FIELD_SUBJECT, "eq", "root"))
        .expand_inheritance(true);

    let listing = block_on(engine.list_rules(&request)).unwrap();

    assert_eq!(listing.total, 2);
    let resources: Vec<&str> = listing
        .items
        .iter()
        .filter_map(|rule| match rule {
            Rule::Access(rule) => Some(rule.resource.as_str()),
            Rule::Assignment(_) => None,
        })
        .collect();
    assert_eq!(resources, ["CN-DE-air", "CN-US-sea"]);
}

#[test]
fn ordinary_listing_should_union_inherited_rules() {
    let store = MemoryStore::new();
    store.add_access_rule(access("alice", "CN-US-sea", "read", Effect::Allow));
    store.add_access_rule(access("shipper", "CN-DE-air", "read", Effect::Allow));
    store.add_access_rule(access("bob", "US-JP-sea", "read", Effect::Allow));
    store.add_role_assignment("alice", "shipper");

    let engine = EngineBuilder::new(store).build();
    let request = ListRequest::new(RuleKind::Access)
        .condition(FilterCondition::new(FIELD_SUBJECT, "eq", "alice"))
        .expand_inheritance(true);

    let listing = block_on(engine.list_rules(&request)).unwrap();

    assert_eq!(listing.total, 2);
}

#[test]
fn failed_batch_should_leave_no_trace() {
    let store = MemoryStore::new();
    store.add_access_rule(access("alice", "CN-US-sea", "read", Effect::Allow));
    store.add_role_assignment("alice", "shipper");

    let engine = EngineBuilder::new(store).build();
    let before_policy = block_on(engine.policy()).unwrap();
    let before_assignments = block_on(engine.role_assignments()).unwrap();

    let updates = [
        RuleUpdate {
            old: Rule::Access(access("alice", "CN-US-sea", "read", Effect::Allow)),
            new: Rule::Access(access("alice", "CN-US-sea", "write", Effect::Allow)),
        },
        RuleUpdate {
            old: Rule::Assignment(RoleAssignment {
                principal: "nobody".into(),
                role: "ghost".into(),
                description: String::new(),
            }),
            new: Rule::Assignment(RoleAssignment {
                principal: "nobody".into(),
                role: "phantom".into(),
                description: String::new(),
            }),
        },
    ];

    let error = block_on(engine.apply_updates(&updates)).unwrap_err();
    assert!(matches!(error, Error::BatchStepFailed { step: 2, .. }));

    assert_eq!(block_on(engine.policy()).unwrap(), before_policy);
    assert_eq!(
        block_on(engine.role_assignments()).unwrap(),
        before_assignments
    );
}

#[test]
fn rule_lifecycle_should_round_trip() {
    let engine = EngineBuilder::new(MemoryStore::new()).build();
    let rule = Rule::Access(access("alice", "CN-US-sea", "read", Effect::Allow));

    block_on(engine.add_rule(rule.clone())).unwrap();
    assert!(block_on(engine.enforce("alice", "CN-US-sea", "read", &AttributeMap::new())).unwrap());

    let updated = Rule::Access(access("alice", "CN-US-sea", "write", Effect::Allow));
    block_on(engine.update_rule(&rule, updated.clone())).unwrap();
    assert!(!block_on(engine.enforce("alice", "CN-US-sea", "read", &AttributeMap::new())).unwrap());

    block_on(engine.remove_rule(&updated)).unwrap();
    assert!(block_on(engine.policy()).unwrap().is_empty());
}
