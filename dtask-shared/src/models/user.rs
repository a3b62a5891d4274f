/// User model and database operations
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_role AS ENUM ('Client', 'Freelancer');
///
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     full_name VARCHAR(255) NOT NULL,
///     email VARCHAR(320) NOT NULL,
///     phone VARCHAR(64) NOT NULL,
///     location VARCHAR(255) NOT NULL DEFAULT '',
///     password_hash VARCHAR(255) NOT NULL,
///     role user_role NOT NULL,
///     wallet_address VARCHAR(128) NOT NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     CONSTRAINT users_email_key UNIQUE (email),
///     CONSTRAINT users_wallet_role_key UNIQUE (wallet_address, role)
/// );
/// ```
///
/// Emails are normalized (trimmed, lowercased) before they reach this module,
/// so the plain unique constraint is effectively case-insensitive.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Account role
///
/// A wallet may hold at most one account per role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role")]
pub enum Role {
    Client,
    Freelancer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Client => "Client",
            Role::Freelancer => "Freelancer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    /// Role names are matched exactly, as the client sends them
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Client" => Ok(Role::Client),
            "Freelancer" => Ok(Role::Freelancer),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Stored user record, including the password hash
///
/// Never serialize this to clients; use [`UserProfile`] or [`UserSummary`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub password_hash: String,
    pub role: Role,
    pub wallet_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct NewUser {
    pub full_name: String,
    /// Already normalized
    pub email: String,
    pub phone: String,
    pub location: String,
    /// Argon2id hash, not the plaintext password
    pub password_hash: String,
    pub role: Role,
    pub wallet_address: String,
}

/// Public summary returned by register and login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: Role,
}

/// Full profile without the password hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub role: Role,
    pub wallet_address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name,
            email: user.email,
            phone: user.phone,
            location: user.location,
            role: user.role,
            wallet_address: user.wallet_address,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Trims and lowercases an email address for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    /// Inserts a new user
    ///
    /// # Errors
    ///
    /// Fails with a database error carrying the constraint name
    /// (`users_email_key` or `users_wallet_role_key`) on duplicates
    pub async fn create(pool: &PgPool, data: NewUser) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (full_name, email, phone, location, password_hash, role, wallet_address)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, full_name, email, phone, location, password_hash, role,
                      wallet_address, created_at, updated_at
            "#,
        )
        .bind(data.full_name)
        .bind(data.email)
        .bind(data.phone)
        .bind(data.location)
        .bind(data.password_hash)
        .bind(data.role)
        .bind(data.wallet_address)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, full_name, email, phone, location, password_hash, role,
                   wallet_address, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by ID, only if the account holds `role`
    pub async fn find_by_id_and_role(
        pool: &PgPool,
        id: Uuid,
        role: Role,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, full_name, email, phone, location, password_hash, role,
                   wallet_address, created_at, updated_at
            FROM users
            WHERE id = $1 AND role = $2
            "#,
        )
        .bind(id)
        .bind(role)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by normalized email
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, full_name, email, phone, location, password_hash, role,
                   wallet_address, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds the account a wallet registered under `role`
    pub async fn find_by_wallet_and_role(
        pool: &PgPool,
        wallet_address: &str,
        role: Role,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, full_name, email, phone, location, password_hash, role,
                   wallet_address, created_at, updated_at
            FROM users
            WHERE wallet_address = $1 AND role = $2
            "#,
        )
        .bind(wallet_address)
        .bind(role)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }
}
