use crate::database::registry::UserRegistry;
use crate::database::repository::UserRepository;
use crate::error::app_error::AppError;
use crate::models::todo::{NewTodo, Todo, TodoFilter, TodoPatch};
use crate::models::user::{User, UserResponse};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Owns the user registry and the repository it is persisted through.
///
/// Mutations run lock → mutate → save → unlock, so two requests never write the
/// store file at the same time and readers never see a half-applied change.
pub struct TodoStore {
    registry: Mutex<UserRegistry>,
    repository: Arc<dyn UserRepository>,
}

impl TodoStore {
    pub fn new(registry: UserRegistry, repository: Arc<dyn UserRepository>) -> Self {
        Self {
            registry: Mutex::new(registry),
            repository,
        }
    }

    /// Reads every user from `repository` and recomputes the id sequences.
    pub async fn load(repository: Arc<dyn UserRepository>) -> Result<Self, AppError> {
        let users = repository.load_users().await?;
        info!(users = users.len(), "todo store loaded");
        Ok(Self::new(UserRegistry::from_users(users)?, repository))
    }

    async fn persist(&self, registry: &UserRegistry) -> Result<(), AppError> {
        self.repository.save_users(registry.users()).await?;
        debug!(users = registry.len(), "todo store persisted");
        Ok(())
    }

    pub async fn user_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    pub async fn register(&self, name: &str, password: &str) -> Result<UserResponse, AppError> {
        let mut registry = self.registry.lock().await;
        let user = UserResponse::from(registry.register(name, password)?);
        self.persist(&registry).await?;
        info!(user_id = user.id, name = %user.name, "user registered");
        Ok(user)
    }

    pub async fn authenticate(&self, name: &str, password: &str) -> Result<UserResponse, AppError> {
        let registry = self.registry.lock().await;
        registry.authenticate(name, password).map(UserResponse::from)
    }

    pub async fn get_user(&self, id: u32) -> Option<UserResponse> {
        let registry = self.registry.lock().await;
        registry.get_user(id).map(UserResponse::from)
    }

    pub async fn list_todos(&self, user_id: u32, filter: &TodoFilter) -> Result<Vec<Todo>, AppError> {
        let registry = self.registry.lock().await;
        let user = owner(&registry, user_id)?;
        Ok(user.get_todos(filter).into_iter().cloned().collect())
    }

    pub async fn categories(&self, user_id: u32) -> Result<Vec<String>, AppError> {
        let registry = self.registry.lock().await;
        Ok(owner(&registry, user_id)?.categories())
    }

    pub async fn get_todo(&self, user_id: u32, todo_id: u32) -> Result<Option<Todo>, AppError> {
        let registry = self.registry.lock().await;
        Ok(owner(&registry, user_id)?.get_todo(todo_id).cloned())
    }

    pub async fn create_todo(&self, user_id: u32, new_todo: NewTodo) -> Result<Todo, AppError> {
        let mut registry = self.registry.lock().await;
        let todo = registry.add_todo(user_id, new_todo)?;
        self.persist(&registry).await?;
        info!(user_id, todo_id = todo.id, "todo created");
        Ok(todo)
    }

    pub async fn update_todo(&self, user_id: u32, todo_id: u32, patch: TodoPatch) -> Result<Todo, AppError> {
        let mut registry = self.registry.lock().await;
        let todo = registry.update_todo(user_id, todo_id, patch)?;
        self.persist(&registry).await?;
        info!(user_id, todo_id, "todo updated");
        Ok(todo)
    }

    pub async fn delete_todo(&self, user_id: u32, todo_id: u32) -> Result<(), AppError> {
        let mut registry = self.registry.lock().await;
        registry.delete_todo(user_id, todo_id)?;
        self.persist(&registry).await?;
        info!(user_id, todo_id, "todo removed");
        Ok(())
    }
}

fn owner(registry: &UserRegistry, user_id: u32) -> Result<&User, AppError> {
    registry.get_user(user_id).ok_or(AppError::UserNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MemoryRepository;

    fn new_todo(title: &str, category: Option<&str>) -> NewTodo {
        NewTodo {
            title: title.to_string(),
            category: category.map(str::to_string),
            ..NewTodo::default()
        }
    }

    #[rocket::async_test]
    async fn every_mutation_is_persisted() {
        let repository = Arc::new(MemoryRepository::default());
        let store = TodoStore::new(UserRegistry::default(), repository.clone());

        let alice = store.register("alice", "pw").await.unwrap();
        assert_eq!(repository.save_count(), 1);

        let todo = store.create_todo(alice.id, new_todo("one", None)).await.unwrap();
        store
            .update_todo(
                alice.id,
                todo.id,
                TodoPatch {
                    completed: Some(true),
                    ..TodoPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(repository.save_count(), 3);

        let saved = repository.snapshot();
        assert!(saved[0].get_todo(todo.id).unwrap().completed);

        store.delete_todo(alice.id, todo.id).await.unwrap();
        assert_eq!(repository.save_count(), 4);
        assert!(repository.snapshot()[0].all_todos().is_empty());
    }

    #[rocket::async_test]
    async fn failed_lookups_do_not_write() {
        let repository = Arc::new(MemoryRepository::default());
        let store = TodoStore::new(UserRegistry::default(), repository.clone());
        let alice = store.register("alice", "pw").await.unwrap();

        assert!(store.register("ALICE", "pw").await.is_err());
        assert!(store.delete_todo(alice.id, 77).await.is_err());
        assert_eq!(repository.save_count(), 1);
    }

    #[rocket::async_test]
    async fn load_restores_users_and_id_sequences() {
        let repository = Arc::new(MemoryRepository::default());
        {
            let store = TodoStore::new(UserRegistry::default(), repository.clone());
            let alice = store.register("alice", "pw").await.unwrap();
            store.create_todo(alice.id, new_todo("a", Some("home"))).await.unwrap();
            store.create_todo(alice.id, new_todo("b", Some("work"))).await.unwrap();
        }

        let store = TodoStore::load(repository.clone()).await.unwrap();
        let alice = store.authenticate("alice", "pw").await.unwrap();
        let bob = store.register("bob", "pw").await.unwrap();
        assert_eq!(bob.id, alice.id + 1);

        let todo = store.create_todo(bob.id, new_todo("c", None)).await.unwrap();
        assert_eq!(todo.id, 3);

        let home = TodoFilter {
            category: Some("home".to_string()),
            status: None,
        };
        let titles: Vec<String> = store.list_todos(alice.id, &home).await.unwrap().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["a".to_string()]);
        assert_eq!(store.categories(alice.id).await.unwrap(), vec!["home".to_string(), "work".to_string()]);
    }

    #[rocket::async_test]
    async fn storage_failure_surfaces_as_server_error() {
        let repository = Arc::new(MemoryRepository::failing());
        let store = TodoStore::new(UserRegistry::default(), repository);
        let err = store.register("alice", "pw").await.unwrap_err();
        assert!(matches!(err, AppError::Storage { .. }));
    }
}
