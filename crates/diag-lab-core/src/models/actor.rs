//! Authenticated actor handed to the core by the entry-point layer.

use serde::{Deserialize, Serialize};

/// Role assigned to a lab user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full access, including invoice deletion and directory management
    Admin,
    /// Front-desk and bench staff
    Staff,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Staff => "staff",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "staff" | "user" => Some(Role::Staff),
            _ => None,
        }
    }
}

/// An already-authenticated user performing an operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Actor {
    /// Stable user identifier from the session gate
    pub user_id: String,
    /// Login name, recorded on invoices and reports
    pub username: String,
    /// Role used by the entry point for permission checks
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, username: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            role,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse(" Staff "), Some(Role::Staff));
        assert_eq!(Role::parse("user"), Some(Role::Staff));
        assert_eq!(Role::parse("root"), None);
    }

    #[test]
    fn test_is_admin() {
        assert!(Actor::new("1", "alice", Role::Admin).is_admin());
        assert!(!Actor::new("2", "bob", Role::Staff).is_admin());
    }
}
