//! Postgres-backed user directory.
//!
//! ## Error Mapping
//!
//! | SQLx error | PostgreSQL code | `StoreError` |
//! |------------|-----------------|--------------|
//! | Database (unique violation) | `23505` | `UniqueViolation(constraint)` |
//! | Database (other) | any other | `Database` |
//! | PoolClosed / other | n/a | `Database` |
//!
//! Uniqueness of `email`, `cpf` and `activation_token` is enforced by unique
//! indexes, so concurrent inserts resolve inside Postgres. Updates are
//! conditional on the `updated_at` the caller read.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tracing::instrument;

use usersvc_auth::{User, UserStatus, VisibilityScope};
use usersvc_core::{Cpf, Secretary, UserId};

use super::{Page, PageRequest, StoreError, UserDirectory};

const CREATE_USERS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id                UUID PRIMARY KEY,
    name              TEXT NOT NULL,
    email             TEXT NOT NULL UNIQUE,
    cpf               TEXT NOT NULL UNIQUE,
    phone             TEXT NOT NULL,
    role              TEXT NOT NULL CHECK (role IN ('ADMIN', 'GESTOR', 'OPERADOR')),
    secretary         TEXT,
    status            TEXT NOT NULL CHECK (status IN ('PENDING_PASSWORD', 'ACTIVE', 'INACTIVE')),
    password          TEXT,
    activation_token  TEXT UNIQUE,
    token_expires_at  TIMESTAMPTZ,
    inactivated_at    TIMESTAMPTZ,
    inactivated_by_id UUID,
    created_at        TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at        TIMESTAMPTZ NOT NULL DEFAULT now()
)
"#;

const CREATE_GESTOR_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS users_secretary_role_status_idx
    ON users (secretary, role, status)
"#;

const USER_COLUMNS: &str = "id, name, email, cpf, phone, role, secretary, status, password, \
     activation_token, token_expires_at, inactivated_at, inactivated_by_id, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct PostgresUserDirectory {
    pool: Arc<PgPool>,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the `users` table and its indexes if they are missing.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in [CREATE_USERS_TABLE, CREATE_GESTOR_INDEX] {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }
        Ok(())
    }

    async fn find_one(&self, operation: &str, column: &str, value: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = $1");
        let row = sqlx::query(&sql)
            .bind(value)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;
        row.as_ref().map(user_from_row).transpose()
    }
}

#[async_trait::async_trait]
impl UserDirectory for PostgresUserDirectory {
    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn insert(&self, user: User) -> Result<User, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, name, email, cpf, phone, role, secretary, status, password,
                activation_token, token_expires_at, inactivated_at, inactivated_by_id,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.cpf.as_str())
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.secretary.as_ref().map(Secretary::as_str))
        .bind(user.status.as_str())
        .bind(user.password.as_deref())
        .bind(user.activation_token.as_deref())
        .bind(user.token_expires_at)
        .bind(user.inactivated_at)
        .bind(user.inactivated_by_id.map(uuid::Uuid::from))
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert", e))?;
        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_by_id", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self, email), err)]
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_one("find_by_email", "email", email).await
    }

    #[instrument(skip(self, token), err)]
    async fn find_by_activation_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        self.find_one("find_by_activation_token", "activation_token", token).await
    }

    #[instrument(skip(self, user, seen), fields(user_id = %user.id), err)]
    async fn update(&self, user: User, seen: DateTime<Utc>) -> Result<User, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                email = $2,
                phone = $3,
                role = $4,
                secretary = $5,
                status = $6,
                password = $7,
                activation_token = $8,
                token_expires_at = $9,
                inactivated_at = $10,
                inactivated_by_id = $11,
                updated_at = $12
            WHERE id = $1 AND updated_at = $13
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.secretary.as_ref().map(Secretary::as_str))
        .bind(user.status.as_str())
        .bind(user.password.as_deref())
        .bind(user.activation_token.as_deref())
        .bind(user.token_expires_at)
        .bind(user.inactivated_at)
        .bind(user.inactivated_by_id.map(uuid::Uuid::from))
        .bind(user.updated_at)
        .bind(seen)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update", e))?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM users WHERE id = $1")
                .bind(user.id.as_uuid())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("update", e))?
                .is_some();
            return Err(if exists {
                StoreError::Stale(user.id)
            } else {
                StoreError::Missing(user.id)
            });
        }
        Ok(user)
    }

    #[instrument(skip(self), fields(secretary = %secretary), err)]
    async fn count_active_gestors(&self, secretary: &Secretary) -> Result<u64, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM users
            WHERE secretary = $1 AND role = 'GESTOR' AND status = 'ACTIVE'
            "#,
        )
        .bind(secretary.as_str())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_active_gestors", e))?;

        let total: i64 = row
            .try_get("total")
            .map_err(|e| StoreError::Database(format!("failed to read count: {e}")))?;
        Ok(total.max(0) as u64)
    }

    #[instrument(skip(self), fields(page = page.page, limit = page.limit), err)]
    async fn list(&self, scope: &VisibilityScope, page: PageRequest) -> Result<Page<User>, StoreError> {
        let secretary: Option<&str> = match scope {
            VisibilityScope::All => None,
            VisibilityScope::Secretary(s) => Some(s.as_str()),
            VisibilityScope::Nothing => return Ok(Page::empty(page)),
        };

        let count_row = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM users
            WHERE ($1::text IS NULL OR (role <> 'ADMIN' AND secretary = $1))
            "#,
        )
        .bind(secretary)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("count_users", e))?;

        let total: i64 = count_row
            .try_get("total")
            .map_err(|e| StoreError::Database(format!("failed to read count: {e}")))?;

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE ($1::text IS NULL OR (role <> 'ADMIN' AND secretary = $1)) \
             ORDER BY name ASC, id ASC \
             LIMIT $2 OFFSET $3"
        );
        let rows = sqlx::query(&sql)
            .bind(secretary)
            .bind(i64::from(page.limit))
            .bind(page.offset() as i64)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;

        let data = rows.iter().map(user_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(Page::new(data, total.max(0) as u64, page))
    }
}

fn user_from_row(row: &PgRow) -> Result<User, StoreError> {
    let corrupt = |e: &dyn std::fmt::Display| StoreError::Database(format!("failed to decode user row: {e}"));

    let id: uuid::Uuid = row.try_get("id").map_err(|e| corrupt(&e))?;
    let role: String = row.try_get("role").map_err(|e| corrupt(&e))?;
    let status: String = row.try_get("status").map_err(|e| corrupt(&e))?;
    let secretary: Option<String> = row.try_get("secretary").map_err(|e| corrupt(&e))?;
    let cpf: String = row.try_get("cpf").map_err(|e| corrupt(&e))?;
    let inactivated_by_id: Option<uuid::Uuid> = row.try_get("inactivated_by_id").map_err(|e| corrupt(&e))?;
    let token_expires_at: Option<DateTime<Utc>> = row.try_get("token_expires_at").map_err(|e| corrupt(&e))?;
    let inactivated_at: Option<DateTime<Utc>> = row.try_get("inactivated_at").map_err(|e| corrupt(&e))?;

    Ok(User {
        id: UserId::from_uuid(id),
        name: row.try_get("name").map_err(|e| corrupt(&e))?,
        email: row.try_get("email").map_err(|e| corrupt(&e))?,
        cpf: Cpf::from_trusted(cpf),
        phone: row.try_get("phone").map_err(|e| corrupt(&e))?,
        role: role.parse().map_err(|e| corrupt(&e))?,
        secretary: secretary.map(Secretary::parse).transpose().map_err(|e| corrupt(&e))?,
        status: status.parse::<UserStatus>().map_err(|e| corrupt(&e))?,
        password: row.try_get("password").map_err(|e| corrupt(&e))?,
        activation_token: row.try_get("activation_token").map_err(|e| corrupt(&e))?,
        token_expires_at,
        inactivated_at,
        inactivated_by_id: inactivated_by_id.map(UserId::from_uuid),
        created_at: row.try_get("created_at").map_err(|e| corrupt(&e))?,
        updated_at: row.try_get("updated_at").map_err(|e| corrupt(&e))?,
    })
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown").to_string();
                StoreError::UniqueViolation(constraint)
            } else {
                StoreError::Database(format!("database error in {operation}: {}", db_err.message()))
            }
        }
        sqlx::Error::PoolClosed => StoreError::Database(format!("connection pool closed in {operation}")),
        other => StoreError::Database(format!("sqlx error in {operation}: {other}")),
    }
}
