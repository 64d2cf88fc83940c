use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use usersvc_auth::{Role, User, UserStatus, VisibilityScope};
use usersvc_core::{Secretary, UserId};

use super::{Page, PageRequest, StoreError, UserDirectory};

/// In-memory directory for tests/dev.
///
/// Uniqueness checks, the `updated_at` guard and writes happen under one
/// write lock, so concurrent inserts with the same email cannot both succeed
/// and a stale update never lands.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    inner: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, HashMap<UserId, User>>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::Database("user directory lock poisoned".to_string()))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<UserId, User>>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::Database("user directory lock poisoned".to_string()))
    }

    fn find_where(&self, pred: impl Fn(&User) -> bool) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.values().find(|u| pred(u)).cloned())
    }
}

/// First unique field of `candidate` already held by another record.
fn clash(map: &HashMap<UserId, User>, candidate: &User) -> Option<&'static str> {
    map.values().filter(|u| u.id != candidate.id).find_map(|u| {
        if u.email == candidate.email {
            Some("email")
        } else if u.cpf == candidate.cpf {
            Some("cpf")
        } else if candidate.activation_token.is_some() && u.activation_token == candidate.activation_token {
            Some("activation_token")
        } else {
            None
        }
    })
}

#[async_trait::async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn insert(&self, user: User) -> Result<User, StoreError> {
        let mut map = self.write()?;
        if map.contains_key(&user.id) {
            return Err(StoreError::UniqueViolation("id".to_string()));
        }
        if let Some(field) = clash(&map, &user) {
            return Err(StoreError::UniqueViolation(field.to_string()));
        }
        map.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        self.find_where(|u| u.email == email)
    }

    async fn find_by_activation_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        self.find_where(|u| u.activation_token.as_deref() == Some(token))
    }

    async fn update(&self, user: User, seen: DateTime<Utc>) -> Result<User, StoreError> {
        let mut map = self.write()?;
        match map.get(&user.id) {
            None => return Err(StoreError::Missing(user.id)),
            Some(stored) if stored.updated_at != seen => return Err(StoreError::Stale(user.id)),
            Some(_) => {}
        }
        if let Some(field) = clash(&map, &user) {
            return Err(StoreError::UniqueViolation(field.to_string()));
        }
        map.insert(user.id, user.clone());
        Ok(user)
    }

    async fn count_active_gestors(&self, secretary: &Secretary) -> Result<u64, StoreError> {
        let count = self
            .read()?
            .values()
            .filter(|u| u.role == Role::Gestor && u.status == UserStatus::Active)
            .filter(|u| u.secretary.as_ref() == Some(secretary))
            .count();
        Ok(count as u64)
    }

    async fn list(&self, scope: &VisibilityScope, page: PageRequest) -> Result<Page<User>, StoreError> {
        let mut visible: Vec<User> = self.read()?.values().filter(|u| scope.admits(u)).cloned().collect();
        visible.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        let total = visible.len() as u64;
        let data = visible
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit as usize)
            .collect();
        Ok(Page::new(data, total, page))
    }
}
