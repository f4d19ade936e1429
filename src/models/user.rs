use crate::models::todo::{Todo, TodoFilter, TodoPatch};
use rocket::FromForm;
use rocket::serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: u32,
    pub name: String,
    pub password: String,
    todos: Vec<Todo>,
}

impl User {
    pub fn new(id: u32, name: impl Into<String>, password: impl Into<String>) -> Self {
        Self::with_todos(id, name, password, Vec::new())
    }

    pub fn with_todos(id: u32, name: impl Into<String>, password: impl Into<String>, todos: Vec<Todo>) -> Self {
        Self {
            id,
            name: name.into(),
            password: password.into(),
            todos,
        }
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }

    pub fn add_todo(&mut self, todo: Todo) -> &Todo {
        self.todos.push(todo);
        &self.todos[self.todos.len() - 1]
    }

    pub fn get_todo(&self, id: u32) -> Option<&Todo> {
        self.todos.iter().find(|todo| todo.id == id)
    }

    /// Every todo when the filter is empty, otherwise the matching subset, in insertion order.
    pub fn get_todos(&self, filter: &TodoFilter) -> Vec<&Todo> {
        self.todos.iter().filter(|todo| todo.matches(filter)).collect()
    }

    pub fn all_todos(&self) -> &[Todo] {
        &self.todos
    }

    pub fn update_todo(&mut self, id: u32, patch: TodoPatch) -> Option<&Todo> {
        let todo = self.todos.iter_mut().find(|todo| todo.id == id)?;
        todo.apply(patch);
        Some(todo)
    }

    pub fn delete_todo(&mut self, id: u32) -> Option<Todo> {
        let index = self.todos.iter().position(|todo| todo.id == id)?;
        Some(self.todos.remove(index))
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for category in self.todos.iter().filter_map(|todo| todo.category.as_ref()) {
            if !categories.contains(category) {
                categories.push(category.clone());
            }
        }
        categories
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct UserResponse {
    pub id: u32,
    pub name: String,
}

#[derive(Deserialize, Debug, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    #[validate(length(min = 1, message = "password must not be empty"))]
    pub password: String,
}

/// Login and registration form posted by the web pages.
#[derive(FromForm, Debug)]
pub struct CredentialsForm {
    pub name: String,
    pub password: String,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
        }
    }
}
