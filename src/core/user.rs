//! User records - the identities that own accounts.
//!
//! Passwords, sessions and role checks are handled outside the engine; this module
//! only stores who a user is and which role they hold.

use crate::{
    entities::{User, UserRole, user},
    errors::{Error, Result},
};
use sea_orm::{Set, prelude::*};
use tracing::info;

/// Creates a user. The username is trimmed and must be non-empty and unused.
pub async fn create_user<C>(
    conn: &C,
    username: &str,
    display_name: &str,
    role: UserRole,
) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    let username = username.trim();
    if username.is_empty() {
        return Err(Error::validation("Username cannot be empty"));
    }
    if get_user_by_username(conn, username).await?.is_some() {
        return Err(Error::validation(format!(
            "Username '{username}' is already taken"
        )));
    }

    let model = user::ActiveModel {
        username: Set(username.to_string()),
        display_name: Set(display_name.trim().to_string()),
        role: Set(role),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    };

    let created = model.insert(conn).await?;
    info!("Created {} user {} ({})", created.role, created.id, created.username);
    Ok(created)
}

/// Finds a user by id or fails with `NotFound`.
pub async fn get_user<C>(conn: &C, user_id: i64) -> Result<user::Model>
where
    C: ConnectionTrait,
{
    User::find_by_id(user_id)
        .one(conn)
        .await?
        .ok_or(Error::NotFound {
            entity: "user",
            id: user_id,
        })
}

/// Finds a user by login name.
pub async fn get_user_by_username<C>(conn: &C, username: &str) -> Result<Option<user::Model>>
where
    C: ConnectionTrait,
{
    User::find()
        .filter(user::Column::Username.eq(username))
        .one(conn)
        .await
        .map_err(Into::into)
}
