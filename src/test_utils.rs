use crate::database::repository::{StorageError, UserRepository};
use crate::models::user::User;
use crate::{Config, build_rocket_with_repository};
use base64::{Engine as _, engine::general_purpose};
use rocket::http::{ContentType, Header, Status};
use rocket::local::asynchronous::Client;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Keeps the "persisted" users in memory and counts how often they were saved.
#[derive(Default)]
pub struct MemoryRepository {
    users: Mutex<Vec<User>>,
    saves: AtomicUsize,
    fail_writes: bool,
}

impl MemoryRepository {
    pub fn with_users(users: Vec<User>) -> Self {
        Self {
            users: Mutex::new(users),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Vec<User> {
        self.users.lock().expect("repository lock").clone()
    }
}

#[async_trait::async_trait]
impl UserRepository for MemoryRepository {
    async fn load_users(&self) -> Result<Vec<User>, StorageError> {
        Ok(self.snapshot())
    }

    async fn save_users(&self, users: &[User]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Io(std::io::Error::other("write refused")));
        }
        *self.users.lock().expect("repository lock") = users.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub async fn client_with(repository: Arc<MemoryRepository>) -> Client {
    Client::tracked(build_rocket_with_repository(Config::default(), repository))
        .await
        .expect("valid rocket instance")
}

pub async fn client() -> Client {
    client_with(Arc::new(MemoryRepository::default())).await
}

pub fn basic_auth(name: &str, password: &str) -> Header<'static> {
    let encoded = general_purpose::STANDARD.encode(format!("{name}:{password}"));
    Header::new("Authorization", format!("Basic {encoded}"))
}

pub fn accept_json() -> Header<'static> {
    Header::new("Accept", "application/json")
}

pub async fn register(client: &Client, name: &str, password: &str) {
    let response = client
        .post("/api/users")
        .header(ContentType::JSON)
        .body(serde_json::json!({ "name": name, "password": password }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
}

/// Creates a todo over the REST API and returns its id.
pub async fn create_todo(client: &Client, auth: Header<'static>, body: serde_json::Value) -> u32 {
    let response = client
        .post("/api/todos")
        .header(ContentType::JSON)
        .header(accept_json())
        .header(auth)
        .body(body.to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Created);
    let id = response.into_string().await.expect("response body");
    id.trim().parse().expect("numeric todo id")
}
