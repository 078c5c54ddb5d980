use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{StoreError, StoreResult, TaskStore, UserStore};
use crate::models::{NewUser, Page, Task, TaskFilter, TaskPatch, User};

/// In-process store for development and tests.
///
/// Locks are never held across an `.await`, so the `std` lock is enough.
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    tasks: RwLock<HashMap<Uuid, Task>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
        // A panic while holding the lock cannot leave a map half-written.
        lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
        lock.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Test hook: flips the active flag on a user.
    pub fn set_user_active(&self, id: Uuid, active: bool) -> bool {
        match Self::write(&self.users).get_mut(&id) {
            Some(user) => {
                user.is_active = active;
                true
            }
            None => false,
        }
    }

    /// Test hook: drops a user and everything they own.
    pub fn remove_user(&self, id: Uuid) -> bool {
        let removed = Self::write(&self.users).remove(&id).is_some();
        if removed {
            Self::write(&self.tasks).retain(|_, task| task.user_id != id);
        }
        removed
    }

    fn owned_sorted(&self, owner: Uuid, filter: TaskFilter) -> Vec<Task> {
        let mut tasks: Vec<Task> = Self::read(&self.tasks)
            .values()
            .filter(|task| task.user_id == owner && filter.matches(task))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        tasks
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> StoreResult<User> {
        let mut users = Self::write(&self.users);

        if users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::Conflict("email".into()));
        }
        if let Some(username) = &new_user.username {
            if users.values().any(|u| u.username.as_ref() == Some(username)) {
                return Err(StoreError::Conflict("username".into()));
            }
        }

        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            email: new_user.email,
            username: new_user.username,
            password_hash: new_user.password_hash,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            is_active: true,
            created_at: now,
            updated_at: now,
            last_login_at: None,
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(Self::read(&self.users)
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(Self::read(&self.users).get(&id).cloned())
    }

    async fn record_login(&self, id: Uuid, at: DateTime<Utc>) -> StoreResult<()> {
        if let Some(user) = Self::write(&self.users).get_mut(&id) {
            user.last_login_at = Some(at);
            user.updated_at = at;
        }
        Ok(())
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn insert_task(&self, task: &Task) -> StoreResult<Task> {
        Self::write(&self.tasks).insert(task.id, task.clone());
        Ok(task.clone())
    }

    async fn list_tasks(
        &self,
        owner: Uuid,
        filter: TaskFilter,
        page: Page,
    ) -> StoreResult<Vec<Task>> {
        let offset = usize::try_from(page.offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(page.limit).unwrap_or(usize::MAX);
        Ok(self
            .owned_sorted(owner, filter)
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn count_tasks(&self, owner: Uuid, filter: TaskFilter) -> StoreResult<i64> {
        let count = Self::read(&self.tasks)
            .values()
            .filter(|task| task.user_id == owner && filter.matches(task))
            .count();
        Ok(count as i64)
    }

    async fn find_task(&self, owner: Uuid, id: Uuid) -> StoreResult<Option<Task>> {
        Ok(Self::read(&self.tasks)
            .get(&id)
            .filter(|task| task.user_id == owner)
            .cloned())
    }

    async fn update_task(
        &self,
        owner: Uuid,
        id: Uuid,
        patch: &TaskPatch,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Task>> {
        // Read and write under one guard.
        let mut tasks = Self::write(&self.tasks);
        match tasks.get_mut(&id) {
            Some(stored) if stored.user_id == owner => {
                stored.apply(patch, now);
                Ok(Some(stored.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn toggle_task(
        &self,
        owner: Uuid,
        id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Task>> {
        let mut tasks = Self::write(&self.tasks);
        match tasks.get_mut(&id) {
            Some(stored) if stored.user_id == owner => {
                let flip = TaskPatch {
                    completed: Some(!stored.completed),
                    ..Default::default()
                };
                stored.apply(&flip, now);
                Ok(Some(stored.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_task(&self, owner: Uuid, id: Uuid) -> StoreResult<bool> {
        let mut tasks = Self::write(&self.tasks);
        if tasks.get(&id).is_some_and(|task| task.user_id == owner) {
            tasks.remove(&id);
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskInput;

    fn new_user(email: &str, username: Option<&str>) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: username.map(String::from),
            password_hash: "digest".to_string(),
            first_name: None,
            last_name: None,
        }
    }

    fn task(owner: Uuid, title: &str, at: DateTime<Utc>) -> Task {
        Task::new(
            TaskInput {
                title: title.to_string(),
                ..Default::default()
            },
            owner,
            at,
        )
    }

    #[actix_rt::test]
    async fn test_unique_email_and_username() {
        let store = MemoryStore::new();
        store
            .create_user(new_user("a@x.com", Some("alice")))
            .await
            .unwrap();

        let dup_email = store.create_user(new_user("a@x.com", None)).await;
        assert!(matches!(dup_email, Err(StoreError::Conflict(_))));

        let dup_name = store
            .create_user(new_user("b@x.com", Some("alice")))
            .await;
        assert!(matches!(dup_name, Err(StoreError::Conflict(_))));

        // Users without a username never collide on it.
        store.create_user(new_user("c@x.com", None)).await.unwrap();
        store.create_user(new_user("d@x.com", None)).await.unwrap();
    }

    #[actix_rt::test]
    async fn test_listing_order_is_stable() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let t0 = Utc::now();

        let later = task(owner, "later", t0 + chrono::Duration::seconds(1));
        let first = task(owner, "first", t0);
        let tied = task(owner, "tied", t0);
        for t in [&later, &first, &tied] {
            store.insert_task(t).await.unwrap();
        }

        let listed = store
            .list_tasks(owner, TaskFilter::default(), Page::unbounded())
            .await
            .unwrap();
        let titles: Vec<&str> = listed.iter().map(|t| t.title.as_str()).collect();

        assert_eq!(titles.len(), 3);
        assert_eq!(titles[2], "later");
        assert!(listed[0].id < listed[1].id);
    }

    #[actix_rt::test]
    async fn test_foreign_owner_sees_nothing() {
        let store = MemoryStore::new();
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let t = task(owner, "mine", Utc::now());
        store.insert_task(&t).await.unwrap();

        assert!(store.find_task(stranger, t.id).await.unwrap().is_none());
        let hijack = TaskPatch {
            title: Some(Some("hijacked".into())),
            ..Default::default()
        };
        assert!(store
            .update_task(stranger, t.id, &hijack, Utc::now())
            .await
            .unwrap()
            .is_none());
        assert!(store
            .toggle_task(stranger, t.id, Utc::now())
            .await
            .unwrap()
            .is_none());
        assert!(!store.delete_task(stranger, t.id).await.unwrap());

        let kept = store.find_task(owner, t.id).await.unwrap().unwrap();
        assert_eq!(kept, t);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_patches_to_different_fields_both_land() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        let t = task(owner, "original", Utc::now());
        store.insert_task(&t).await.unwrap();
        let id = t.id;

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = store.clone();
            let patch = if i % 2 == 0 {
                TaskPatch {
                    title: Some(Some("renamed".into())),
                    ..Default::default()
                }
            } else {
                TaskPatch {
                    description: Some(Some("described".into())),
                    ..Default::default()
                }
            };
            handles.push(tokio::spawn(async move {
                store.update_task(owner, id, &patch, Utc::now()).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_some());
        }

        let stored = store.find_task(owner, id).await.unwrap().unwrap();
        assert_eq!(stored.title, "renamed");
        assert_eq!(stored.description.as_deref(), Some("described"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_toggles_are_not_lost() {
        let store = std::sync::Arc::new(MemoryStore::new());
        let owner = Uuid::new_v4();
        let t = task(owner, "flip", Utc::now());
        store.insert_task(&t).await.unwrap();
        let id = t.id;

        let handles: Vec<_> = (0..51)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.toggle_task(owner, id, Utc::now()).await })
            })
            .collect();
        for handle in handles {
            assert!(handle.await.unwrap().unwrap().is_some());
        }

        // An odd number of flips from `false`.
        let stored = store.find_task(owner, id).await.unwrap().unwrap();
        assert!(stored.completed);
        assert!(stored.completed_at.is_some());
    }
}
