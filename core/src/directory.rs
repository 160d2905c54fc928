//! User directory port.

use crate::types::UserId;
use crate::user::User;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors surfaced by the user directory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// The directory could not be reached.
    #[error("user directory unavailable: {0}")]
    Unavailable(String),

    /// Any other failure.
    #[error("user directory error: {0}")]
    Other(String),
}

/// Boxed future returned by directory operations.
pub type DirectoryFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, DirectoryError>> + Send + 'a>>;

/// Resolves user identity, role and account status.
pub trait UserDirectory: Send + Sync {
    /// Looks up a user. `None` when the id is unknown.
    fn get_user_by_id(&self, id: &UserId) -> DirectoryFuture<'_, Option<User>>;

    /// Active users with the technician role, in a stable order.
    fn get_active_technicians(&self) -> DirectoryFuture<'_, Vec<User>>;
}
