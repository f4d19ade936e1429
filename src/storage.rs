use crate::database::repository::UserRepository;
use crate::service::todo_store::TodoStore;
use rocket::fairing::AdHoc;
use std::sync::Arc;

/// Loads the persisted users once at ignition and manages the resulting
/// [`TodoStore`]. An unreadable store file aborts the launch.
pub fn stage_store(repository: Arc<dyn UserRepository>) -> AdHoc {
    AdHoc::try_on_ignite("Todo store (XML)", |rocket| async move {
        match TodoStore::load(repository).await {
            Ok(store) => {
                tracing::info!("Todo store initialized successfully");
                Ok(rocket.manage(store))
            }
            Err(e) => {
                tracing::error!(error = ?e, "Failed to load todo store");
                Err(rocket)
            }
        }
    })
}
