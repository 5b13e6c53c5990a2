use crate::types::AttributeMap;

/// Attribute matching interface for custom context semantics.
///
/// The engine consults this when an access rule carries an attribute
/// filter. Swap it to support richer matching such as range or prefix
/// comparisons on geographic fields.
pub trait AttributeMatcher: Send + Sync {
    /// Returns whether `context` satisfies `filter`.
    fn matches(&self, filter: &AttributeMap, context: &AttributeMap) -> bool;
}

/// Default matcher: every filter key must be present in the context with an
/// equal value. An empty filter matches any context.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConjunctiveMatcher;

impl AttributeMatcher for ConjunctiveMatcher {
    fn matches(&self, filter: &AttributeMap, context: &AttributeMap) -> bool {
        filter
            .iter()
            .all(|(key, expected)| context.get(key) == Some(expected))
    }
}
