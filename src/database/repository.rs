use crate::models::user::User;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not read store file: {0}")]
    Decode(#[from] quick_xml::Error),
    #[error("invalid store file: {0}")]
    Invalid(String),
    #[error("could not encode store file: {0}")]
    Encode(#[from] quick_xml::SeError),
}

/// Loads and saves the complete set of users together with their todos.
///
/// Implementations always operate on the whole collection: `save_users`
/// replaces whatever was stored before.
#[async_trait::async_trait]
pub trait UserRepository: Send + Sync {
    async fn load_users(&self) -> Result<Vec<User>, StorageError>;
    async fn save_users(&self, users: &[User]) -> Result<(), StorageError>;
}
