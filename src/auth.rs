// src/auth.rs
use crate::db::{get_timestamp, DbError};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Issued tokens stay valid this long.
pub const TOKEN_TTL_DAYS: i64 = 30;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("Premium subscription required")]
    UpgradeRequired,
    #[error("Identity lookup failed")]
    Db(#[from] DbError),
}

impl AuthError {
    pub fn missing() -> Self {
        AuthError::Unauthorized("Authentication required".to_string())
    }

    pub fn invalid() -> Self {
        AuthError::Unauthorized("Invalid or expired token".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub username: String,
}

/// Emitted by the service whenever the signed-in identity changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn(AuthUser),
    SignedOut,
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(header: Option<&str>) -> Result<&str, AuthError> {
    let header = header.ok_or_else(AuthError::missing)?;
    match header.trim().split_once(' ') {
        Some((scheme, token)) if scheme == "Bearer" && !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(AuthError::missing()),
    }
}

pub trait IdentityProvider {
    /// Resolves a token to its user, failing with `Unauthorized` when the
    /// token is unknown or expired.
    fn user_for_token(&self, token: &str, now: DateTime<Utc>) -> Result<AuthUser, AuthError>;
}

/// Tokens kept in the `auth_tokens` table.
pub struct SqliteIdentity<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteIdentity<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Creates a fresh random token for a profile.
    pub fn issue_token(&self, user_id: &str, now: DateTime<Utc>) -> Result<String, DbError> {
        let token = Uuid::new_v4().simple().to_string();
        let expires_at = now + Duration::days(TOKEN_TTL_DAYS);
        self.conn
            .execute(
                "INSERT INTO auth_tokens (token, user_id, created_at, expires_at) VALUES (?1, ?2, ?3, ?4)",
                params![token, user_id, now.to_rfc3339(), expires_at.to_rfc3339()],
            )
            .map_err(DbError::InsertFailed)?;
        info!("Issued session token for user {}", user_id);
        Ok(token)
    }

    /// Returns true if the token existed.
    pub fn revoke(&self, token: &str) -> Result<bool, DbError> {
        let rows = self
            .conn
            .execute("DELETE FROM auth_tokens WHERE token = ?1", params![token])
            .map_err(DbError::DeleteFailed)?;
        Ok(rows > 0)
    }

    /// Drops every expired token.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize, DbError> {
        self.conn
            .execute(
                "DELETE FROM auth_tokens WHERE expires_at <= ?1",
                params![now.to_rfc3339()],
            )
            .map_err(DbError::DeleteFailed)
    }
}

impl IdentityProvider for SqliteIdentity<'_> {
    fn user_for_token(&self, token: &str, now: DateTime<Utc>) -> Result<AuthUser, AuthError> {
        let row = self
            .conn
            .query_row(
                "SELECT p.id, p.username, t.expires_at
                 FROM auth_tokens t JOIN profiles p ON p.id = t.user_id
                 WHERE t.token = ?1",
                params![token],
                |row| {
                    Ok((
                        AuthUser {
                            id: row.get(0)?,
                            username: row.get(1)?,
                        },
                        get_timestamp(row, 2)?,
                    ))
                },
            )
            .optional()
            .map_err(DbError::QueryFailed)?;

        match row {
            Some((user, expires_at)) if expires_at > now => {
                debug!("Token resolved to user {}", user.id);
                Ok(user)
            }
            Some(_) => {
                debug!("Rejected expired token");
                Err(AuthError::invalid())
            }
            None => Err(AuthError::invalid()),
        }
    }
}
