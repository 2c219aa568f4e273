//! # User Repository
//!
//! Accounts, password hashes and the login lookup.
//!
//! Hashing happens in kiosk-api (argon2); this module only stores the PHC
//! string and never returns it outside [`UserRecord`].

use chrono::{DateTime, Utc};
use kiosk_core::{Role, User};
use sqlx::{Executor, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info};

use super::new_id;
use crate::error::{DbError, DbResult};

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at";

/// Full user row, including the password hash.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// Drops the password hash.
    pub fn into_user(self) -> User {
        User {
            id: self.id,
            username: self.username,
            email: self.email,
            role: self.role,
            created_at: self.created_at,
        }
    }
}

/// Input for creating a user. `password_hash` is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
    pub password_hash: String,
    pub role: Role,
}

async fn fetch_record<'e, E>(executor: E, id: &str) -> DbResult<Option<UserRecord>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let record = sqlx::query_as::<_, UserRecord>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(record)
}

async fn insert_user<'e, E>(executor: E, new: NewUser, at: DateTime<Utc>) -> DbResult<User>
where
    E: Executor<'e, Database = Sqlite>,
{
    let user = User {
        id: new_id(),
        username: new.username,
        email: new.email,
        role: new.role,
        created_at: at,
    };

    sqlx::query(
        r#"
        INSERT INTO users (id, username, email, password_hash, role, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(&user.id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&new.password_hash)
    .bind(user.role)
    .bind(user.created_at)
    .execute(executor)
    .await
    .map_err(|e| DbError::from(e).with_duplicate_value(user.username.clone()))?;

    info!(user_id = %user.id, username = %user.username, role = %user.role, "User created");
    Ok(user)
}

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    /// Creates a new UserRepository.
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// All users, oldest first.
    pub async fn list(&self) -> DbResult<Vec<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at, username");
        let records = sqlx::query_as::<_, UserRecord>(&sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(records.into_iter().map(UserRecord::into_user).collect())
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<User>> {
        Ok(fetch_record(&self.pool, id).await?.map(UserRecord::into_user))
    }

    /// Finds a user by username or email, case-insensitively.
    pub async fn find_by_login(&self, login: &str) -> DbResult<Option<UserRecord>> {
        let login = login.trim().to_lowercase();
        debug!(login = %login, "Looking up user for login");

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE lower(username) = ?1 OR lower(email) = ?1 \
             ORDER BY created_at LIMIT 1"
        );
        let record = sqlx::query_as::<_, UserRecord>(&sql)
            .bind(&login)
            .fetch_optional(&self.pool)
            .await?;
        Ok(record)
    }

    /// Creates a user. A taken username or email is a `UniqueViolation`.
    pub async fn insert(&self, new: NewUser) -> DbResult<User> {
        insert_user(&self.pool, new, Utc::now()).await
    }

    /// Changes the password hash and/or role.
    pub async fn update(
        &self,
        id: &str,
        password_hash: Option<String>,
        role: Option<Role>,
    ) -> DbResult<User> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET password_hash = COALESCE(?2, password_hash),
                role = COALESCE(?3, role)
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(password_hash)
        .bind(role)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        info!(user_id = %id, "User updated");
        fetch_record(&self.pool, id)
            .await?
            .map(UserRecord::into_user)
            .ok_or_else(|| DbError::not_found("User", id))
    }

    /// Deletes a user. Users referenced by sales or movements cannot be
    /// deleted (`ForeignKeyViolation`).
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }

        info!(user_id = %id, "User deleted");
        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// User statements inside a [`UnitOfWork`](crate::UnitOfWork).
pub struct UserOps<'a> {
    conn: &'a mut SqliteConnection,
}

impl<'a> UserOps<'a> {
    pub(crate) fn new(conn: &'a mut SqliteConnection) -> Self {
        UserOps { conn }
    }

    /// Username for notification texts; falls back to the id.
    pub async fn username(&mut self, id: &str) -> DbResult<String> {
        let username: Option<String> = sqlx::query_scalar("SELECT username FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;
        Ok(username.unwrap_or_else(|| id.to_string()))
    }

    pub async fn insert(&mut self, new: NewUser, at: DateTime<Utc>) -> DbResult<User> {
        insert_user(&mut *self.conn, new, at).await
    }

    pub async fn count(&mut self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&mut *self.conn)
            .await?;
        Ok(count)
    }
}
