//! Permission predicates consumed from the host environment.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Permissions guarding statistics features.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    /// Change settings and purge counters.
    AdministerStatistics,
    /// See counters in fields, blocks and reports.
    ViewStatistics,
}

impl Permission {
    /// Returns the host-facing permission label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AdministerStatistics => "administer download statistics",
            Self::ViewStatistics => "view file download statistics",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Answers permission questions for a user id.
pub trait AccessPolicy: Send + Sync {
    /// Returns whether `user_id` holds `permission`.
    fn has_permission(&self, user_id: i64, permission: Permission) -> bool;

    /// Whether the user may change statistics settings.
    fn can_administer_statistics(&self, user_id: i64) -> bool {
        self.has_permission(user_id, Permission::AdministerStatistics)
    }

    /// Whether the user may see download counts.
    fn can_view_statistics(&self, user_id: i64) -> bool {
        self.has_permission(user_id, Permission::ViewStatistics)
    }
}

/// Grants every permission. Used by the trusted local operator CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn has_permission(&self, _user_id: i64, _permission: Permission) -> bool {
        true
    }
}

/// Fixed per-user grants.
#[derive(Debug, Clone, Default)]
pub struct StaticAccessPolicy {
    grants: HashMap<i64, HashSet<Permission>>,
}

impl StaticAccessPolicy {
    /// Creates a policy with no grants.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Grants `permission` to `user_id`.
    #[must_use]
    pub fn grant(mut self, user_id: i64, permission: Permission) -> Self {
        self.grants.entry(user_id).or_default().insert(permission);
        self
    }
}

impl AccessPolicy for StaticAccessPolicy {
    fn has_permission(&self, user_id: i64, permission: Permission) -> bool {
        self.grants
            .get(&user_id)
            .is_some_and(|granted| granted.contains(&permission))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_policy_only_grants_listed_permissions() {
        let policy = StaticAccessPolicy::new().grant(3, Permission::ViewStatistics);

        assert!(policy.can_view_statistics(3));
        assert!(!policy.can_administer_statistics(3));
        assert!(!policy.can_view_statistics(4));
    }

    #[test]
    fn test_allow_all_grants_everything() {
        assert!(AllowAll.can_administer_statistics(0));
        assert!(AllowAll.can_view_statistics(0));
    }

    #[test]
    fn test_permission_labels() {
        assert_eq!(
            Permission::AdministerStatistics.to_string(),
            "administer download statistics"
        );
        assert_eq!(
            Permission::ViewStatistics.to_string(),
            "view file download statistics"
        );
    }
}
