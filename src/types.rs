use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Request-time attribute bag and rule attribute filter type.
///
/// Keys are attribute names (e.g. `start`, `dest`, `mode`); values are
/// arbitrary JSON scalars or structures.
pub type AttributeMap = BTreeMap<String, serde_json::Value>;

/// Outcome of a matching rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Effect {
    /// Permission is granted.
    Allow,
    /// Permission is denied.
    Deny,
}

impl Effect {
    /// Parses a stored effect string.
    ///
    /// A blank or unrecognized value decodes as [`Effect::Allow`]. This
    /// lenient default is inherited from the stored rule format.
    pub fn parse_lenient(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("deny") {
            Self::Deny
        } else {
            Self::Allow
        }
    }

    /// Returns the stored string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

impl Default for Effect {
    fn default() -> Self {
        Self::Allow
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discriminator separating the two rule shapes in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Authorization statement ("p" partition).
    Access,
    /// Role-inheritance edge ("g" partition).
    Assignment,
}

impl RuleKind {
    /// Returns the store partition tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "p",
            Self::Assignment => "g",
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authorization statement for a (subject, resource, action) triple.
///
/// Identity is the full tuple; there is no synthetic id. `attributes`
/// restricts the rule to requests whose context matches; an absent or empty
/// filter applies unconditionally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRule {
    /// Principal or role name the rule applies to.
    pub subject: String,
    /// Resource identifier, e.g. a trade lane like `CN-US-sea`.
    pub resource: String,
    /// Action name, e.g. `read`.
    pub action: String,
    /// Optional conjunctive attribute filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<AttributeMap>,
    /// Allow or Deny.
    #[serde(default)]
    pub effect: Effect,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
}

impl fmt::Display for AccessRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "p({}, {}, {}, {})",
            self.subject, self.resource, self.action, self.effect
        )
    }
}

/// Directed principal→role edge in the role-inheritance graph.
///
/// The graph may contain cycles; resolution terminates regardless.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Edge source: a principal or a role inheriting from `role`.
    pub principal: String,
    /// Edge target role.
    pub role: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
}

impl fmt::Display for RoleAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g({}, {})", self.principal, self.role)
    }
}

/// Tagged union over the two rule shapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Rule {
    /// An [`AccessRule`].
    Access(AccessRule),
    /// A [`RoleAssignment`].
    Assignment(RoleAssignment),
}

impl Rule {
    /// Returns the store partition this rule belongs to.
    pub fn kind(&self) -> RuleKind {
        match self {
            Self::Access(_) => RuleKind::Access,
            Self::Assignment(_) => RuleKind::Assignment,
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Access(rule) => rule.fmt(f),
            Self::Assignment(assignment) => assignment.fmt(f),
        }
    }
}

impl From<AccessRule> for Rule {
    fn from(rule: AccessRule) -> Self {
        Self::Access(rule)
    }
}

impl From<RoleAssignment> for Rule {
    fn from(assignment: RoleAssignment) -> Self {
        Self::Assignment(assignment)
    }
}
