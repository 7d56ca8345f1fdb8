//! Payload-level routing tags.
//!
//! The broker isolates subscribers per scope and nothing finer. Messages
//! that target one destination inside a tier (for instance one region of
//! a window) carry a [`RoutingTag`], and each handler compares it with its
//! own identity before acting. See
//! [`FilteredHandler::for_destination`](crate::subscription::FilteredHandler::for_destination).

use crate::message::Message;
use crate::scope::Scope;
use std::fmt;

/// Destination of a message inside a broadcast tier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoutingTag {
    region: String,
    scope: Scope,
}

impl RoutingTag {
    /// Create a tag for `region` within `scope`
    pub fn new(region: impl Into<String>, scope: Scope) -> Self {
        Self {
            region: region.into(),
            scope,
        }
    }

    /// Destination region name
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Scope the message originates from
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// True if this tag addresses `region` in `scope`
    pub fn matches(&self, region: &str, scope: &Scope) -> bool {
        self.region == region && &self.scope == scope
    }
}

impl fmt::Display for RoutingTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.region, self.scope.id())
    }
}

/// Messages that carry a destination tag.
pub trait Routed: Message {
    /// The destination this message is meant for
    fn routing_tag(&self) -> &RoutingTag;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_matches_region_and_scope() {
        let scope = Scope::new();
        let tag = RoutingTag::new("logs", scope.clone());

        assert!(tag.matches("logs", &scope));
        assert!(!tag.matches("secrets", &scope));
        assert!(!tag.matches("logs", &Scope::new()));
    }

    #[test]
    fn test_tag_equality_follows_scope_identity() {
        let scope = Scope::new();
        let a = RoutingTag::new("logs", scope.clone());
        let b = RoutingTag::new("logs", scope);
        let c = RoutingTag::new("logs", Scope::new());

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
