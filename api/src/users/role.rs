use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::SqliteConnection;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Guest,
    Member,
    President,
    Admin,
}

impl Role {
    /// The role a user should hold given their club standing. Admins are
    /// assigned by hand and never demoted here.
    pub fn derive(current: Role, leads_a_club: bool, has_active_membership: bool) -> Role {
        match current {
            Role::Admin => Role::Admin,
            _ if leads_a_club => Role::President,
            _ if has_active_membership => Role::Member,
            _ => Role::Guest,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "GUEST",
            Role::Member => "MEMBER",
            Role::President => "PRESIDENT",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GUEST" => Ok(Role::Guest),
            "MEMBER" => Ok(Role::Member),
            "PRESIDENT" => Ok(Role::President),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(AppError::bad_request(format!("unknown role: {s}"))),
        }
    }
}

/// Something changed in a user's club standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleEvent {
    MembershipChanged { user_id: i64 },
    LeadershipChanged { user_id: i64 },
}

impl RoleEvent {
    pub fn user_id(&self) -> i64 {
        match self {
            RoleEvent::MembershipChanged { user_id } | RoleEvent::LeadershipChanged { user_id } => {
                *user_id
            }
        }
    }
}

/// Recomputes and stores `users.role` for the user named by `event`.
///
/// This is the only writer of the role column besides registration.
pub async fn apply_role_event(db: &mut SqliteConnection, event: RoleEvent) -> AppResult<Role> {
    let user_id = event.user_id();

    let current: Role = sqlx::query_scalar("SELECT role FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(&mut *db)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    let terms: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM president_terms WHERE user_id = ? AND is_current = 1",
    )
    .bind(user_id)
    .fetch_one(&mut *db)
    .await?;

    let active_memberships: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM memberships WHERE user_id = ? AND is_active = 1",
    )
    .bind(user_id)
    .fetch_one(&mut *db)
    .await?;

    let role = Role::derive(current, terms > 0, active_memberships > 0);
    if role != current {
        sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role)
            .bind(chrono::Utc::now().naive_utc())
            .bind(user_id)
            .execute(&mut *db)
            .await?;
        tracing::info!(user_id, from = %current, to = %role, ?event, "role changed");
    }

    Ok(role)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_derive() {
        assert_eq!(Role::derive(Role::Guest, false, false), Role::Guest);
        assert_eq!(Role::derive(Role::Guest, false, true), Role::Member);
        assert_eq!(Role::derive(Role::Member, true, true), Role::President);
        assert_eq!(Role::derive(Role::President, false, true), Role::Member);
        assert_eq!(Role::derive(Role::Member, false, false), Role::Guest);
        assert_eq!(Role::derive(Role::Admin, false, false), Role::Admin);
        assert_eq!(Role::derive(Role::Admin, true, true), Role::Admin);
    }

    #[test]
    fn test_parse_role() {
        assert_eq!("member".parse::<Role>().unwrap(), Role::Member);
        assert_eq!("PRESIDENT".parse::<Role>().unwrap(), Role::President);
        assert!("chair".parse::<Role>().is_err());
    }
}
