//! User roles.

use serde::{Deserialize, Serialize};

/// Account role carried in access tokens and checked by the route guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shopfront.user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// A shopper. The default for self-registered accounts.
    #[default]
    Customer,
    /// Store staff with access to `/admin`.
    Admin,
}

impl Role {
    /// Where a signed-in user of this role lands when sent "home".
    #[must_use]
    pub const fn home_path(self) -> &'static str {
        match self {
            Self::Customer => "/",
            Self::Admin => "/admin",
        }
    }

    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Admin)
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Admin => "admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_through_str() {
        for role in [Role::Customer, Role::Admin] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("superuser".parse::<Role>().is_err());
    }

    #[test]
    fn test_home_path() {
        assert_eq!(Role::Customer.home_path(), "/");
        assert_eq!(Role::Admin.home_path(), "/admin");
    }
}
