//! User directory: the only owner of persisted user records.
//!
//! The directory enforces uniqueness of `email`, `cpf` and `activation_token`
//! atomically; callers never check-then-insert.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryUserDirectory;
pub use postgres::PostgresUserDirectory;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use usersvc_auth::{User, VisibilityScope};
use usersvc_core::{Secretary, UserId};

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const MAX_PAGE_LIMIT: u32 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Another record already holds this value. Carries the field or constraint.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// An update targeted a record that does not exist.
    #[error("user {0} does not exist")]
    Missing(UserId),

    /// The record was written by someone else after the caller read it.
    #[error("user {0} was modified concurrently")]
    Stale(UserId),

    #[error("store failure: {0}")]
    Database(String),
}

/// Page parameters, already normalised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

impl PageRequest {
    /// Missing values take defaults; `page` is at least 1 and `limit` is
    /// capped at [`MAX_PAGE_LIMIT`].
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

/// One page of results plus the numbers needed to page further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub last_page: u64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            data,
            total,
            page: request.page,
            last_page: total.div_ceil(u64::from(request.limit)),
        }
    }

    pub fn empty(request: PageRequest) -> Self {
        Self::new(Vec::new(), 0, request)
    }
}

#[async_trait::async_trait]
pub trait UserDirectory: Send + Sync {
    /// Insert a new record; fails with `UniqueViolation` on any clash.
    async fn insert(&self, user: User) -> Result<User, StoreError>;

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_activation_token(&self, token: &str) -> Result<Option<User>, StoreError>;

    /// Replace an existing record if it is unchanged since it was read.
    ///
    /// `seen` is the `updated_at` the caller loaded; any other stored value
    /// fails with `Stale` and writes nothing. Uniqueness is enforced as on
    /// insert.
    async fn update(&self, user: User, seen: DateTime<Utc>) -> Result<User, StoreError>;

    /// Active GESTORs of `secretary`.
    async fn count_active_gestors(&self, secretary: &Secretary) -> Result<u64, StoreError>;

    /// Records admitted by `scope`, ordered by name ascending.
    async fn list(&self, scope: &VisibilityScope, page: PageRequest) -> Result<Page<User>, StoreError>;
}

#[async_trait::async_trait]
impl<D> UserDirectory for Arc<D>
where
    D: UserDirectory + ?Sized,
{
    async fn insert(&self, user: User) -> Result<User, StoreError> {
        (**self).insert(user).await
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        (**self).find_by_id(id).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        (**self).find_by_email(email).await
    }

    async fn find_by_activation_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        (**self).find_by_activation_token(token).await
    }

    async fn update(&self, user: User, seen: DateTime<Utc>) -> Result<User, StoreError> {
        (**self).update(user, seen).await
    }

    async fn count_active_gestors(&self, secretary: &Secretary) -> Result<u64, StoreError> {
        (**self).count_active_gestors(secretary).await
    }

    async fn list(&self, scope: &VisibilityScope, page: PageRequest) -> Result<Page<User>, StoreError> {
        (**self).list(scope, page).await
    }
}
