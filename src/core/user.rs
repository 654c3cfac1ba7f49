//! User and session business logic.
//!
//! Passwords are stored as argon2 PHC strings. A login opens a session whose UUID doubles
//! as the bearer token; a session expires after `timeout_secs` without an authenticated
//! request. Each user may hold at most `max_concurrent` live sessions, except the
//! configured administrator account.

use crate::{
    config::{Limits, SessionSettings},
    core::record::{self, NewRecord, OperationType},
    entities::{User, UserSession, user, user_session},
    errors::{Error, Result},
};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use chrono::Utc;
use sea_orm::{
    ConnectionTrait, PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{info, warn};
use uuid::Uuid;

/// Username written on records produced by the server itself.
pub const SYSTEM_USERNAME: &str = "system";

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// May manage users and sessions
    Admin,
    /// Regular back-office operator
    #[default]
    User,
}

impl Role {
    /// Stored string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            other => Err(Error::validation(format!("Unknown role '{other}'"))),
        }
    }
}

/// The authenticated caller behind a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    /// Bearer token of the current session
    pub session_id: String,
    /// Account id
    pub user_id: i64,
    /// Account name, written on records
    pub username: String,
    /// Account role
    pub role: Role,
}

impl SessionUser {
    /// True for administrators.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    fn require_admin(&self) -> Result<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(Error::forbidden("Administrator role required"))
        }
    }
}

/// Result of a successful login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginOutcome {
    /// Bearer token for subsequent requests
    pub token: String,
    /// The logged-in account
    pub user: user::Model,
    /// Idle seconds before the session expires
    pub expires_in_secs: u64,
}

/// A live session as listed to administrators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Session id
    pub id: String,
    /// When it was opened
    pub created_at: DateTimeUtc,
    /// Last authenticated request
    pub last_seen_at: DateTimeUtc,
}

/// User as listed to administrators, with live sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    /// Stored account row (without the password hash)
    #[serde(flatten)]
    pub user: user::Model,
    /// Live sessions
    pub sessions: Vec<SessionInfo>,
}

/// Fields of an account to create.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    /// Unique login name
    pub username: String,
    /// Plain-text password
    pub password: String,
    /// Role, defaults to `user`
    #[serde(default)]
    pub role: Option<Role>,
    /// Opaque avatar reference
    #[serde(default)]
    pub avatar_path: Option<String>,
}

/// Partial update of an account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserChanges {
    /// New login name
    #[serde(default)]
    pub username: Option<String>,
    /// New password; revokes the account's sessions
    #[serde(default)]
    pub password: Option<String>,
    /// New role
    #[serde(default)]
    pub role: Option<Role>,
    /// New avatar reference
    #[serde(default)]
    pub avatar_path: Option<String>,
}

/// Hashes a password into an argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| Error::PasswordHash(e.to_string()))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::PasswordHash(e.to_string()))
}

/// Checks a password against a stored PHC string.
pub fn verify_password(hash: &str, password: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| Error::PasswordHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn validate_username(raw: &str, limits: &Limits) -> Result<String> {
    let username = raw.trim();
    if username.is_empty() {
        return Err(Error::validation("Username cannot be empty"));
    }
    if username.chars().count() > limits.max_username_length {
        return Err(Error::validation(format!(
            "Username cannot exceed {} characters",
            limits.max_username_length
        )));
    }
    Ok(username.to_string())
}

fn validate_password(password: &str, limits: &Limits) -> Result<()> {
    if password.is_empty() {
        return Err(Error::validation("Password cannot be empty"));
    }
    if password.chars().count() > limits.max_password_length {
        return Err(Error::validation(format!(
            "Password cannot exceed {} characters",
            limits.max_password_length
        )));
    }
    Ok(())
}

async fn find_by_username<C: ConnectionTrait>(db: &C, username: &str) -> Result<Option<user::Model>> {
    User::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await
        .map_err(Into::into)
}

async fn admin_count<C: ConnectionTrait>(db: &C) -> Result<u64> {
    User::find()
        .filter(user::Column::Role.eq(Role::Admin.as_str()))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Deletes every session idle for longer than the timeout.
pub async fn purge_expired_sessions<C: ConnectionTrait>(
    db: &C,
    settings: &SessionSettings,
) -> Result<u64> {
    let cutoff = Utc::now() - settings.timeout();
    let result = UserSession::delete_many()
        .filter(user_session::Column::LastSeenAt.lt(cutoff))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Verifies credentials and opens a session.
///
/// # Errors
/// - `Unauthorized` for an unknown user or a wrong password
/// - `Conflict` when the account already holds the maximum number of live sessions
pub async fn login(
    db: &DatabaseConnection,
    username: &str,
    password: &str,
    settings: &SessionSettings,
) -> Result<LoginOutcome> {
    let username = username.trim();
    let Some(account) = find_by_username(db, username).await? else {
        warn!("Login rejected for unknown user '{username}'");
        return Err(Error::unauthorized("Invalid username or password"));
    };
    if !verify_password(&account.password_hash, password)? {
        warn!("Login rejected for '{username}': wrong password");
        return Err(Error::unauthorized("Invalid username or password"));
    }

    let txn = db.begin().await?;
    purge_expired_sessions(&txn, settings).await?;

    if account.username != settings.admin_username {
        let live = UserSession::find()
            .filter(user_session::Column::UserId.eq(account.id))
            .count(&txn)
            .await?;
        if live >= settings.max_concurrent as u64 {
            warn!("Login rejected for '{username}': {live} live sessions");
            return Err(Error::conflict(format!(
                "User '{username}' already has {live} active sessions"
            )));
        }
    }

    let now = Utc::now();
    let session = user_session::ActiveModel {
        id: Set(Uuid::new_v4().to_string()),
        user_id: Set(account.id),
        created_at: Set(now),
        last_seen_at: Set(now),
    }
    .insert(&txn)
    .await?;

    record::append_record(
        &txn,
        &account.username,
        NewRecord::new(OperationType::Login, Some(account.id), &account.username, "login"),
    )
    .await?;
    txn.commit().await?;

    info!("User '{}' logged in", account.username);
    Ok(LoginOutcome {
        token: session.id,
        user: account,
        expires_in_secs: settings.timeout_secs,
    })
}

/// Closes the caller's session.
pub async fn logout(db: &DatabaseConnection, caller: &SessionUser) -> Result<()> {
    let txn = db.begin().await?;
    UserSession::delete_by_id(caller.session_id.clone())
        .exec(&txn)
        .await?;
    record::append_record(
        &txn,
        &caller.username,
        NewRecord::new(OperationType::Logout, Some(caller.user_id), &caller.username, "logout"),
    )
    .await?;
    txn.commit().await?;
    info!("User '{}' logged out", caller.username);
    Ok(())
}

/// Resolves a bearer token to its live session and refreshes `last_seen_at`.
///
/// # Errors
/// `Unauthorized` for an unknown or expired token.
pub async fn authenticate<C: ConnectionTrait>(
    db: &C,
    token: &str,
    settings: &SessionSettings,
) -> Result<SessionUser> {
    let Some(session) = UserSession::find_by_id(token.to_string()).one(db).await? else {
        return Err(Error::unauthorized("Session not found"));
    };

    let now = Utc::now();
    if now - session.last_seen_at > settings.timeout() {
        UserSession::delete_by_id(session.id).exec(db).await?;
        return Err(Error::unauthorized("Session expired"));
    }

    let Some(account) = User::find_by_id(session.user_id).one(db).await? else {
        UserSession::delete_by_id(session.id).exec(db).await?;
        return Err(Error::unauthorized("Session owner no longer exists"));
    };

    let mut active: user_session::ActiveModel = session.into();
    active.last_seen_at = Set(now);
    let session = active.update(db).await?;

    Ok(SessionUser {
        session_id: session.id,
        user_id: account.id,
        role: account.role.parse().unwrap_or_default(),
        username: account.username,
    })
}

/// Lists accounts with their live sessions. Administrators only.
pub async fn list_users<C: ConnectionTrait>(
    db: &C,
    caller: &SessionUser,
    settings: &SessionSettings,
) -> Result<Vec<UserView>> {
    caller.require_admin()?;
    let cutoff = Utc::now() - settings.timeout();
    let users = User::find()
        .order_by_asc(user::Column::Id)
        .find_with_related(UserSession)
        .all(db)
        .await?;
    Ok(users
        .into_iter()
        .map(|(user, sessions)| UserView {
            user,
            sessions: sessions
                .into_iter()
                .filter(|s| s.last_seen_at >= cutoff)
                .map(|s| SessionInfo {
                    id: s.id,
                    created_at: s.created_at,
                    last_seen_at: s.last_seen_at,
                })
                .collect(),
        })
        .collect())
}

async fn insert_user<C: ConnectionTrait>(
    db: &C,
    username: String,
    password: &str,
    role: Role,
    avatar_path: Option<String>,
) -> Result<user::Model> {
    if find_by_username(db, &username).await?.is_some() {
        return Err(Error::conflict(format!("User '{username}' already exists")));
    }
    let now = Utc::now();
    user::ActiveModel {
        username: Set(username),
        password_hash: Set(hash_password(password)?),
        role: Set(role.as_str().to_string()),
        avatar_path: Set(avatar_path),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .map_err(Into::into)
}

/// Creates an account. Administrators only.
pub async fn create_user(
    db: &DatabaseConnection,
    caller: &SessionUser,
    input: NewUser,
    limits: &Limits,
) -> Result<user::Model> {
    caller.require_admin()?;
    let username = validate_username(&input.username, limits)?;
    validate_password(&input.password, limits)?;
    let role = input.role.unwrap_or_default();

    let txn = db.begin().await?;
    let created = insert_user(&txn, username, &input.password, role, input.avatar_path).await?;
    record::append_record(
        &txn,
        &caller.username,
        NewRecord::new(
            OperationType::UserCreate,
            Some(created.id),
            &created.username,
            format!("role: {role}"),
        ),
    )
    .await?;
    txn.commit().await?;

    info!("User '{}' created by '{}'", created.username, caller.username);
    Ok(created)
}

/// Applies a partial update to an account. Administrators only.
///
/// # Errors
/// `Conflict` for a taken username or when the change would leave no administrator.
pub async fn update_user(
    db: &DatabaseConnection,
    caller: &SessionUser,
    user_id: i64,
    changes: UserChanges,
    limits: &Limits,
) -> Result<user::Model> {
    caller.require_admin()?;

    let txn = db.begin().await?;
    let current = User::find_by_id(user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| Error::UserNotFound {
            name: user_id.to_string(),
        })?;
    let mut active: user::ActiveModel = current.clone().into();
    let mut details = Vec::new();

    if let Some(raw) = changes.username.as_deref() {
        let username = validate_username(raw, limits)?;
        if username != current.username {
            if find_by_username(&txn, &username).await?.is_some() {
                return Err(Error::conflict(format!("User '{username}' already exists")));
            }
            details.push(format!("username: {} -> {username}", current.username));
            active.username = Set(username);
        }
    }

    if let Some(role) = changes.role {
        if role.as_str() != current.role {
            if current.role == Role::Admin.as_str() && admin_count(&txn).await? <= 1 {
                return Err(Error::conflict("Cannot demote the last administrator"));
            }
            details.push(format!("role: {} -> {role}", current.role));
            active.role = Set(role.as_str().to_string());
        }
    }

    if let Some(password) = changes.password.as_deref() {
        validate_password(password, limits)?;
        active.password_hash = Set(hash_password(password)?);
        UserSession::delete_many()
            .filter(user_session::Column::UserId.eq(user_id))
            .exec(&txn)
            .await?;
        details.push("password changed, sessions revoked".to_string());
    }

    if let Some(avatar_path) = changes.avatar_path {
        details.push("avatar updated".to_string());
        active.avatar_path = Set(Some(avatar_path));
    }

    if details.is_empty() {
        txn.commit().await?;
        return Ok(current);
    }

    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;
    record::append_record(
        &txn,
        &caller.username,
        NewRecord::new(
            OperationType::UserUpdate,
            Some(user_id),
            &updated.username,
            details.join(", "),
        ),
    )
    .await?;
    txn.commit().await?;

    info!("User '{}' updated by '{}'", updated.username, caller.username);
    Ok(updated)
}

/// Deletes an account and its sessions. Administrators only.
///
/// # Errors
/// `Conflict` when deleting oneself or the last administrator.
pub async fn delete_user(db: &DatabaseConnection, caller: &SessionUser, username: &str) -> Result<()> {
    caller.require_admin()?;
    if username == caller.username {
        return Err(Error::conflict("You cannot delete your own account"));
    }

    let txn = db.begin().await?;
    let target = find_by_username(&txn, username)
        .await?
        .ok_or_else(|| Error::UserNotFound {
            name: username.to_string(),
        })?;
    if target.role == Role::Admin.as_str() && admin_count(&txn).await? <= 1 {
        return Err(Error::conflict("Cannot delete the last administrator"));
    }

    UserSession::delete_many()
        .filter(user_session::Column::UserId.eq(target.id))
        .exec(&txn)
        .await?;
    User::delete_by_id(target.id).exec(&txn).await?;
    record::append_record(
        &txn,
        &caller.username,
        NewRecord::new(OperationType::UserDelete, Some(target.id), &target.username, "deleted"),
    )
    .await?;
    txn.commit().await?;

    info!("User '{username}' deleted by '{}'", caller.username);
    Ok(())
}

/// Force-closes one session of a user. Administrators only.
pub async fn revoke_session(
    db: &DatabaseConnection,
    caller: &SessionUser,
    username: &str,
    session_id: &str,
) -> Result<()> {
    caller.require_admin()?;

    let txn = db.begin().await?;
    let target = find_by_username(&txn, username)
        .await?
        .ok_or_else(|| Error::UserNotFound {
            name: username.to_string(),
        })?;
    let result = UserSession::delete_many()
        .filter(user_session::Column::Id.eq(session_id))
        .filter(user_session::Column::UserId.eq(target.id))
        .exec(&txn)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::SessionNotFound {
            id: session_id.to_string(),
        });
    }
    record::append_record(
        &txn,
        &caller.username,
        NewRecord::new(
            OperationType::SessionRevoke,
            Some(target.id),
            &target.username,
            "session revoked",
        ),
    )
    .await?;
    txn.commit().await?;

    info!("Session of '{username}' revoked by '{}'", caller.username);
    Ok(())
}

/// Creates the administrator account when the user table is empty.
///
/// The password comes from the session settings (`ADMIN_PASSWORD`); without one a random
/// password is generated and logged once.
pub async fn seed_admin(
    db: &DatabaseConnection,
    settings: &SessionSettings,
) -> Result<Option<user::Model>> {
    if User::find().count(db).await? > 0 {
        return Ok(None);
    }

    let password = match settings.admin_password.clone() {
        Some(password) if !password.is_empty() => password,
        _ => {
            let generated = Uuid::new_v4().simple().to_string();
            warn!(
                "ADMIN_PASSWORD not set; generated password for '{}': {generated}",
                settings.admin_username
            );
            generated
        }
    };

    let txn = db.begin().await?;
    let admin = insert_user(
        &txn,
        settings.admin_username.clone(),
        &password,
        Role::Admin,
        None,
    )
    .await?;
    record::append_record(
        &txn,
        SYSTEM_USERNAME,
        NewRecord::new(
            OperationType::UserCreate,
            Some(admin.id),
            &admin.username,
            "role: admin, seeded",
        ),
    )
    .await?;
    txn.commit().await?;

    info!("Seeded administrator '{}'", admin.username);
    Ok(Some(admin))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    fn settings() -> SessionSettings {
        SessionSettings {
            admin_password: Some("admin-secret".to_string()),
            ..SessionSettings::default()
        }
    }

    #[test]
    fn test_password_hash_round_trip() -> Result<()> {
        let hash = hash_password("s3cret")?;
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password(&hash, "s3cret")?);
        assert!(!verify_password(&hash, "wrong")?);
        Ok(())
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>().ok(), Some(Role::Admin));
        assert!("root".parse::<Role>().is_err());
    }

    #[tokio::test]
    async fn test_seed_admin_once() -> Result<()> {
        let db = setup_test_db().await?;
        let admin = seed_admin(&db, &settings()).await?.unwrap();
        assert_eq!(admin.role, "admin");
        assert!(seed_admin(&db, &settings()).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_login_authenticate_logout() -> Result<()> {
        let db = setup_test_db().await?;
        seed_admin(&db, &settings()).await?;

        let bad = login(&db, "admin", "nope", &settings()).await;
        assert!(matches!(bad, Err(Error::Unauthorized { .. })));

        let outcome = login(&db, "admin", "admin-secret", &settings()).await?;
        let caller = authenticate(&db, &outcome.token, &settings()).await?;
        assert!(caller.is_admin());
        assert_eq!(caller.username, "admin");

        logout(&db, &caller).await?;
        let after = authenticate(&db, &outcome.token, &settings()).await;
        assert!(matches!(after, Err(Error::Unauthorized { .. })));
        assert_eq!(count_records(&db, OperationType::Login).await?, 1);
        assert_eq!(count_records(&db, OperationType::Logout).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_expired_session_is_unauthorized() -> Result<()> {
        let db = setup_test_db().await?;
        seed_admin(&db, &settings()).await?;
        let outcome = login(&db, "admin", "admin-secret", &settings()).await?;

        let stale = Utc::now() - chrono::Duration::hours(25);
        let mut session: user_session::ActiveModel = UserSession::find_by_id(outcome.token.clone())
            .one(&db)
            .await?
            .unwrap()
            .into();
        session.last_seen_at = Set(stale);
        session.update(&db).await?;

        let result = authenticate(&db, &outcome.token, &settings()).await;
        assert!(matches!(result, Err(Error::Unauthorized { .. })));
        assert!(UserSession::find_by_id(outcome.token).one(&db).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_session_cap_exempts_admin() -> Result<()> {
        let db = setup_test_db().await?;
        let admin = admin_session(&db).await?;
        create_user(
            &db,
            &admin,
            NewUser {
                username: "clerk".to_string(),
                password: "pw".to_string(),
                ..NewUser::default()
            },
            &Limits::default(),
        )
        .await?;

        for _ in 0..3 {
            login(&db, "clerk", "pw", &settings()).await?;
        }
        let fourth = login(&db, "clerk", "pw", &settings()).await;
        assert!(matches!(fourth, Err(Error::Conflict { .. })));

        // Admin already holds one session; three more are fine
        for _ in 0..3 {
            login(&db, "admin", "admin-secret", &settings()).await?;
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_user_management_requires_admin() -> Result<()> {
        let db = setup_test_db().await?;
        let admin = admin_session(&db).await?;
        let clerk = create_user(
            &db,
            &admin,
            NewUser {
                username: "clerk".to_string(),
                password: "pw".to_string(),
                ..NewUser::default()
            },
            &Limits::default(),
        )
        .await?;
        let outcome = login(&db, "clerk", "pw", &settings()).await?;
        let caller = authenticate(&db, &outcome.token, &settings()).await?;
        assert!(!caller.is_admin());

        let result = list_users(&db, &caller, &settings()).await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        let result = delete_user(&db, &caller, "admin").await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));

        let users = list_users(&db, &admin, &settings()).await?;
        assert_eq!(users.len(), 2);
        let listed = users.iter().find(|u| u.user.id == clerk.id).unwrap();
        assert_eq!(listed.sessions.len(), 1);
        assert_eq!(listed.sessions[0].id, outcome.token);
        Ok(())
    }

    #[tokio::test]
    async fn test_admin_deletion_rules() -> Result<()> {
        let db = setup_test_db().await?;
        let admin = admin_session(&db).await?;

        let own = delete_user(&db, &admin, "admin").await;
        assert!(matches!(own, Err(Error::Conflict { .. })));

        let demote = update_user(
            &db,
            &admin,
            admin.user_id,
            UserChanges {
                role: Some(Role::User),
                ..UserChanges::default()
            },
            &Limits::default(),
        )
        .await;
        assert!(matches!(demote, Err(Error::Conflict { .. })));

        let missing = delete_user(&db, &admin, "ghost").await;
        assert!(matches!(missing, Err(Error::UserNotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_password_change_revokes_sessions() -> Result<()> {
        let db = setup_test_db().await?;
        let admin = admin_session(&db).await?;
        let clerk = create_user(
            &db,
            &admin,
            NewUser {
                username: "clerk".to_string(),
                password: "pw".to_string(),
                ..NewUser::default()
            },
            &Limits::default(),
        )
        .await?;
        let outcome = login(&db, "clerk", "pw", &settings()).await?;

        update_user(
            &db,
            &admin,
            clerk.id,
            UserChanges {
                password: Some("new-pw".to_string()),
                ..UserChanges::default()
            },
            &Limits::default(),
        )
        .await?;
        assert!(authenticate(&db, &outcome.token, &settings()).await.is_err());
        assert!(login(&db, "clerk", "new-pw", &settings()).await.is_ok());
        Ok(())
    }

    #[tokio::test]
    async fn test_revoke_session() -> Result<()> {
        let db = setup_test_db().await?;
        let admin = admin_session(&db).await?;
        create_user(
            &db,
            &admin,
            NewUser {
                username: "clerk".to_string(),
                password: "pw".to_string(),
                ..NewUser::default()
            },
            &Limits::default(),
        )
        .await?;
        let outcome = login(&db, "clerk", "pw", &settings()).await?;

        let wrong_user = revoke_session(&db, &admin, "admin", &outcome.token).await;
        assert!(matches!(wrong_user, Err(Error::SessionNotFound { .. })));

        revoke_session(&db, &admin, "clerk", &outcome.token).await?;
        assert!(authenticate(&db, &outcome.token, &settings()).await.is_err());
        assert_eq!(count_records(&db, OperationType::SessionRevoke).await?, 1);
        Ok(())
    }
}
