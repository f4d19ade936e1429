use crate::error::app_error::AppError;
use crate::models::todo::{NewTodo, Todo, TodoPatch};
use crate::models::user::User;
use std::sync::atomic::{AtomicU32, Ordering};

/// Monotonic identifier source. Values are never handed out twice, even when
/// the entity that used one is deleted.
#[derive(Debug)]
pub struct IdSequence {
    next: AtomicU32,
}

impl Default for IdSequence {
    fn default() -> Self {
        Self { next: AtomicU32::new(1) }
    }
}

impl IdSequence {
    /// A sequence whose first value is `max(existing) + 1`, or 1 when empty.
    /// Fails when `existing` already holds `u32::MAX`.
    pub fn after<I: IntoIterator<Item = u32>>(existing: I) -> Result<Self, AppError> {
        let next = match existing.into_iter().max() {
            Some(max) => max.checked_add(1).ok_or(AppError::IdsExhausted)?,
            None => 1,
        };
        Ok(Self {
            next: AtomicU32::new(next),
        })
    }

    /// Hands out the next id. The counter never wraps, so `u32::MAX` itself is
    /// never issued and the sequence fails once it gets there.
    pub fn next_id(&self) -> Result<u32, AppError> {
        self.next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |next| next.checked_add(1))
            .map_err(|_| AppError::IdsExhausted)
    }
}

/// In-memory set of all registered users and their todos.
#[derive(Debug)]
pub struct UserRegistry {
    users: Vec<User>,
    user_ids: IdSequence,
    todo_ids: IdSequence,
}

impl Default for UserRegistry {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            user_ids: IdSequence::default(),
            todo_ids: IdSequence::default(),
        }
    }
}

impl UserRegistry {
    pub fn from_users(users: Vec<User>) -> Result<Self, AppError> {
        let user_ids = IdSequence::after(users.iter().map(|user| user.id))?;
        let todo_ids = IdSequence::after(users.iter().flat_map(|user| user.all_todos().iter().map(|todo| todo.id)))?;

        Ok(Self { users, user_ids, todo_ids })
    }

    pub fn users(&self) -> &[User] {
        &self.users
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.users.iter().any(|user| user.has_name(name))
    }

    pub fn register(&mut self, name: &str, password: &str) -> Result<&User, AppError> {
        if self.is_registered(name) {
            return Err(AppError::UserAlreadyExists(name.to_string()));
        }

        let id = self.user_ids.next_id()?;
        self.users.push(User::new(id, name, password));
        Ok(&self.users[self.users.len() - 1])
    }

    pub fn authenticate(&self, name: &str, password: &str) -> Result<&User, AppError> {
        let user = self
            .users
            .iter()
            .find(|user| user.has_name(name))
            .ok_or(AppError::UserNotFound)?;

        if user.password == password {
            Ok(user)
        } else {
            Err(AppError::InvalidCredentials)
        }
    }

    pub fn get_user(&self, id: u32) -> Option<&User> {
        self.users.iter().find(|user| user.id == id)
    }

    pub fn get_user_mut(&mut self, id: u32) -> Option<&mut User> {
        self.users.iter_mut().find(|user| user.id == id)
    }

    /// Creates a todo for `user_id`, drawing its id from the registry-wide sequence.
    pub fn add_todo(&mut self, user_id: u32, new_todo: NewTodo) -> Result<Todo, AppError> {
        if self.get_user(user_id).is_none() {
            return Err(AppError::UserNotFound);
        }

        let todo_id = self.todo_ids.next_id()?;
        let user = self.get_user_mut(user_id).ok_or(AppError::UserNotFound)?;
        Ok(user.add_todo(Todo::new(todo_id, new_todo)).clone())
    }

    pub fn update_todo(&mut self, user_id: u32, todo_id: u32, patch: TodoPatch) -> Result<Todo, AppError> {
        let user = self.get_user_mut(user_id).ok_or(AppError::UserNotFound)?;
        user.update_todo(todo_id, patch)
            .cloned()
            .ok_or_else(|| AppError::not_found(format!("todo {todo_id}")))
    }

    pub fn delete_todo(&mut self, user_id: u32, todo_id: u32) -> Result<Todo, AppError> {
        let user = self.get_user_mut(user_id).ok_or(AppError::UserNotFound)?;
        user.delete_todo(todo_id).ok_or_else(|| AppError::not_found(format!("todo {todo_id}")))
    }
}
