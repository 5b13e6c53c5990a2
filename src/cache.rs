use async_trait::async_trait;

/// Cache interface for resolved role closures.
///
/// The engine performs no caching by default; every resolution re-reads the
/// store. A configured cache is cleared wholesale on any role-assignment
/// mutation, since a single edge change can alter any principal's closure.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Gets the cached role closure for a principal.
    async fn get_roles(&self, principal: &str) -> Option<Vec<String>>;

    /// Sets the cached role closure for a principal.
    async fn set_roles(&self, principal: &str, roles: Vec<String>);

    /// Drops every cached entry.
    async fn clear(&self);
}

/// No-op cache implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

#[async_trait]
impl Cache for NoCache {
    async fn get_roles(&self, _principal: &str) -> Option<Vec<String>> {
        None
    }

    async fn set_roles(&self, _principal: &str, _roles: Vec<String>) {}

    async fn clear(&self) {}
}
