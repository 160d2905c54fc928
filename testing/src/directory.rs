//! In-memory [`UserDirectory`].

use helpdesk_core::directory::{DirectoryError, DirectoryFuture, UserDirectory};
use helpdesk_core::types::UserId;
use helpdesk_core::user::{User, UserRole, UserStatus};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

/// A fixed list of users, kept in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<Vec<User>>,
    unavailable: AtomicBool,
    failing_technician_lookups: AtomicUsize,
}

impl InMemoryUserDirectory {
    /// An empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A directory pre-populated with `users`.
    #[must_use]
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        let directory = Self::new();
        for user in users {
            directory.upsert(user);
        }
        directory
    }

    /// Adds a user, replacing any existing user with the same id.
    pub fn upsert(&self, user: User) {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = users.iter_mut().find(|u| u.id == user.id) {
            *existing = user;
        } else {
            users.push(user);
        }
    }

    /// Changes a user's account status. Returns false for unknown ids.
    pub fn set_status(&self, id: &UserId, status: UserStatus) -> bool {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        users
            .iter_mut()
            .find(|u| &u.id == id)
            .map(|u| u.status = status)
            .is_some()
    }

    /// Makes every lookup fail with [`DirectoryError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Makes the next `n` calls to `get_active_technicians` fail.
    pub fn fail_next_technician_lookups(&self, n: usize) {
        self.failing_technician_lookups.store(n, Ordering::SeqCst);
    }

    /// Number of users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// True when the directory has no users.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), DirectoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(DirectoryError::Unavailable("in-memory directory switched off".to_string()))
        } else {
            Ok(())
        }
    }

    fn consume_injected_failure(&self) -> bool {
        self.failing_technician_lookups
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn get_user_by_id(&self, id: &UserId) -> DirectoryFuture<'_, Option<User>> {
        let id = id.clone();
        Box::pin(async move {
            self.check_available()?;
            let users = self
                .users
                .read()
                .map_err(|_| DirectoryError::Other("directory lock poisoned".to_string()))?;
            Ok(users.iter().find(|u| u.id == id).cloned())
        })
    }

    fn get_active_technicians(&self) -> DirectoryFuture<'_, Vec<User>> {
        Box::pin(async move {
            self.check_available()?;
            if self.consume_injected_failure() {
                return Err(DirectoryError::Unavailable(
                    "injected technician lookup failure".to_string(),
                ));
            }
            let users = self
                .users
                .read()
                .map_err(|_| DirectoryError::Other("directory lock poisoned".to_string()))?;
            Ok(users
                .iter()
                .filter(|u| u.role == UserRole::Technician && u.is_active())
                .cloned()
                .collect())
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[tokio::test]
    async fn active_technicians_exclude_admins_and_inactive() {
        let directory = InMemoryUserDirectory::with_users([
            fixtures::technician("t1"),
            fixtures::admin("a1"),
            fixtures::inactive_technician("t2"),
            fixtures::customer("u1"),
            fixtures::technician("t3"),
        ]);

        let ids: Vec<_> = directory
            .get_active_technicians()
            .await
            .expect("lookup")
            .into_iter()
            .map(|u| u.id)
            .collect();
        assert_eq!(ids, [UserId::new("t1"), UserId::new("t3")]);
    }

    #[tokio::test]
    async fn injected_failures_run_out() {
        let directory = InMemoryUserDirectory::with_users([fixtures::technician("t1")]);
        directory.fail_next_technician_lookups(1);

        assert!(directory.get_active_technicians().await.is_err());
        assert!(directory.get_active_technicians().await.is_ok());
    }

    #[tokio::test]
    async fn status_changes_are_visible() {
        let directory = InMemoryUserDirectory::with_users([fixtures::technician("t1")]);
        assert!(directory.set_status(&UserId::new("t1"), UserStatus::Suspended));

        let user = directory
            .get_user_by_id(&UserId::new("t1"))
            .await
            .expect("lookup")
            .expect("exists");
        assert!(!user.is_assignable());
        assert!(!directory.set_status(&UserId::new("nobody"), UserStatus::Active));
    }
}
