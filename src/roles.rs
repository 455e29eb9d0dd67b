use serde::{Deserialize, Serialize};

/// Role of a user inside a group.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "group_role", rename_all = "lowercase")]
pub enum Role {
    Admin,
    Moderator,
    #[default]
    Member,
}

impl Role {
    /// Position in the hierarchy: admin(3) > moderator(2) > member(1).
    pub const fn rank(self) -> u8 {
        match self {
            Role::Admin => 3,
            Role::Moderator => 2,
            Role::Member => 1,
        }
    }

    /// True when `self` is at least as strong as `required`.
    pub const fn satisfies(self, required: Role) -> bool {
        self.rank() >= required.rank()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Moderator => "moderator",
            Role::Member => "member",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Role; 3] = [Role::Admin, Role::Moderator, Role::Member];

    #[test]
    fn ranks_follow_hierarchy() {
        assert_eq!(Role::Admin.rank(), 3);
        assert_eq!(Role::Moderator.rank(), 2);
        assert_eq!(Role::Member.rank(), 1);
    }

    #[test]
    fn satisfies_is_rank_comparison() {
        for have in ALL {
            for need in ALL {
                assert_eq!(have.satisfies(need), have.rank() >= need.rank());
            }
        }
        assert!(Role::Admin.satisfies(Role::Moderator));
        assert!(!Role::Member.satisfies(Role::Moderator));
        assert!(!Role::Moderator.satisfies(Role::Admin));
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Moderator).unwrap(), "\"moderator\"");
        let parsed: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(parsed, Role::Admin);
        assert!(serde_json::from_str::<Role>("\"owner\"").is_err());
    }

    #[test]
    fn default_is_member() {
        assert_eq!(Role::default(), Role::Member);
    }
}
