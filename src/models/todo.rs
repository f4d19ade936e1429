use crate::error::app_error::AppError;
use chrono::NaiveDate;
use rocket::FromForm;
use rocket::serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Todo {
    pub id: u32,
    pub title: String,
    pub category: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub important: bool,
    pub completed: bool,
}

/// Field values for a todo that has not been assigned an id yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTodo {
    pub title: String,
    pub category: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub important: bool,
    pub completed: bool,
}

/// Partial update. `None` leaves the current value in place; an empty title or
/// category is treated the same as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub category: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub important: Option<bool>,
    pub completed: Option<bool>,
}

impl Todo {
    pub fn new(id: u32, new_todo: NewTodo) -> Self {
        Self {
            id,
            title: new_todo.title,
            category: non_empty(new_todo.category),
            due_date: new_todo.due_date,
            important: new_todo.important,
            completed: new_todo.completed,
        }
    }

    pub fn apply(&mut self, patch: TodoPatch) {
        if let Some(title) = non_empty(patch.title) {
            self.title = title;
        }
        if let Some(category) = non_empty(patch.category) {
            self.category = Some(category);
        }
        if let Some(due_date) = patch.due_date {
            self.due_date = Some(due_date);
        }
        if let Some(important) = patch.important {
            self.important = important;
        }
        if let Some(completed) = patch.completed {
            self.completed = completed;
        }
    }

    pub fn matches(&self, filter: &TodoFilter) -> bool {
        let category_matches = filter
            .category
            .as_deref()
            .is_none_or(|category| self.category.as_deref() == Some(category));
        let status_matches = filter.status.is_none_or(|status| status.matches(self.completed));
        category_matches && status_matches
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodoStatus {
    Open,
    Completed,
}

impl TodoStatus {
    pub fn matches(self, completed: bool) -> bool {
        match self {
            TodoStatus::Open => !completed,
            TodoStatus::Completed => completed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TodoStatus::Open => "open",
            TodoStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TodoStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(TodoStatus::Open),
            "completed" => Ok(TodoStatus::Completed),
            other => Err(AppError::bad_request(format!("unknown status filter '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TodoFilter {
    pub category: Option<String>,
    pub status: Option<TodoStatus>,
}

impl TodoFilter {
    /// Builds a filter from raw query/form values; blank values mean "no filter".
    pub fn from_params(category: Option<String>, status: Option<String>) -> Result<Self, AppError> {
        let status = match non_empty(status) {
            Some(status) => Some(status.parse::<TodoStatus>()?),
            None => None,
        };

        Ok(Self {
            category: non_empty(category),
            status,
        })
    }

    pub fn is_filtered(&self) -> bool {
        self.category.is_some() || self.status.is_some()
    }
}

/// Body of `POST /todos`.
#[derive(Deserialize, Debug, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TodoRequest {
    #[validate(length(min = 1, message = "title must not be empty"))]
    pub title: String,
    pub category: Option<String>,
    pub due_date: Option<String>,
    /// Absent and `null` both mean `false`.
    pub important: Option<bool>,
    pub completed: Option<bool>,
}

impl TodoRequest {
    pub fn into_new_todo(self) -> Result<NewTodo, AppError> {
        Ok(NewTodo {
            due_date: parse_due_date(self.due_date.as_deref())?,
            title: self.title,
            category: self.category,
            important: self.important.unwrap_or(false),
            completed: self.completed.unwrap_or(false),
        })
    }
}

/// Body of `PUT /todos/<id>`. Every field is optional at the wire level so the
/// handler can tell "absent" from "empty".
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct TodoUpdateRequest {
    pub id: Option<u32>,
    pub title: Option<String>,
    pub category: Option<String>,
    pub due_date: Option<String>,
    pub important: Option<bool>,
    pub completed: Option<bool>,
}

impl TodoUpdateRequest {
    pub fn into_patch(self, path_id: u32) -> Result<TodoPatch, AppError> {
        if let Some(body_id) = self.id
            && body_id != path_id
        {
            return Err(AppError::bad_request(format!(
                "todo id in body ({body_id}) does not match id in path ({path_id})"
            )));
        }

        let title = non_empty(self.title).ok_or_else(|| AppError::bad_request("title must not be empty"))?;

        Ok(TodoPatch {
            title: Some(title),
            category: self.category,
            due_date: parse_due_date(self.due_date.as_deref())?,
            important: self.important,
            completed: self.completed,
        })
    }
}

/// Create and edit form posted by the web pages. Unchecked boxes are absent
/// from the form and read as `false`.
#[derive(FromForm, Debug, Default)]
pub struct TodoForm {
    pub title: Option<String>,
    pub category: Option<String>,
    pub due_date: Option<String>,
    pub important: bool,
    pub completed: bool,
}

impl TodoForm {
    pub fn into_new_todo(self) -> Result<NewTodo, AppError> {
        let title = non_empty(self.title).ok_or_else(|| AppError::bad_request("title must not be empty"))?;
        Ok(NewTodo {
            due_date: parse_due_date(self.due_date.as_deref())?,
            title,
            category: self.category,
            important: self.important,
            completed: self.completed,
        })
    }

    pub fn into_patch(self) -> Result<TodoPatch, AppError> {
        Ok(TodoPatch {
            due_date: parse_due_date(self.due_date.as_deref())?,
            title: self.title,
            category: self.category,
            important: Some(self.important),
            completed: Some(self.completed),
        })
    }
}

/// Filter form of the web todo list.
#[derive(FromForm, Debug, Default)]
pub struct FilterForm {
    pub category: Option<String>,
    pub status: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TodoResponse {
    pub id: u32,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    pub important: bool,
    pub completed: bool,
}

impl From<&Todo> for TodoResponse {
    fn from(todo: &Todo) -> Self {
        Self {
            id: todo.id,
            title: todo.title.clone(),
            category: todo.category.clone(),
            due_date: todo.due_date,
            important: todo.important,
            completed: todo.completed,
        }
    }
}

/// Parses an ISO date; blank input means no date.
pub fn parse_due_date(value: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match value.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(Some)
            .map_err(|e| AppError::bad_request(format!("invalid due date '{raw}': {e}"))),
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Todo {
        Todo::new(
            7,
            NewTodo {
                title: "Water plants".to_string(),
                category: Some("home".to_string()),
                due_date: NaiveDate::from_ymd_opt(2024, 5, 1),
                important: false,
                completed: false,
            },
        )
    }

    #[test]
    fn patch_keeps_fields_that_are_absent_or_empty() {
        let mut todo = sample();
        todo.apply(TodoPatch {
            title: Some("Water all plants".to_string()),
            category: Some(String::new()),
            due_date: None,
            important: Some(true),
            completed: None,
        });

        assert_eq!(todo.title, "Water all plants");
        assert_eq!(todo.category.as_deref(), Some("home"));
        assert_eq!(todo.due_date, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert!(todo.important);
        assert!(!todo.completed);
    }

    #[test]
    fn empty_category_is_stored_as_absent() {
        let todo = Todo::new(
            1,
            NewTodo {
                title: "x".to_string(),
                category: Some(String::new()),
                ..NewTodo::default()
            },
        );
        assert_eq!(todo.category, None);
    }

    #[test]
    fn filter_combines_category_and_status() {
        let mut todo = sample();
        let home_open = TodoFilter::from_params(Some("home".into()), Some("open".into())).unwrap();
        let work = TodoFilter::from_params(Some("work".into()), None).unwrap();
        let completed = TodoFilter::from_params(None, Some("completed".into())).unwrap();

        assert!(todo.matches(&home_open));
        assert!(!todo.matches(&work));
        assert!(!todo.matches(&completed));

        todo.completed = true;
        assert!(todo.matches(&completed));
        assert!(todo.matches(&TodoFilter::default()));
    }

    #[test]
    fn blank_filter_values_do_not_filter() {
        let filter = TodoFilter::from_params(Some(String::new()), Some(String::new())).unwrap();
        assert!(!filter.is_filtered());
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(matches!(
            TodoFilter::from_params(None, Some("someday".into())),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn update_request_rejects_mismatched_ids() {
        let request = TodoUpdateRequest {
            id: Some(3),
            title: Some("t".into()),
            ..TodoUpdateRequest::default()
        };
        assert!(matches!(request.into_patch(4), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn update_request_requires_title() {
        let request = TodoUpdateRequest {
            title: Some(String::new()),
            ..TodoUpdateRequest::default()
        };
        assert!(matches!(request.into_patch(4), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn due_dates_must_be_iso_dates() {
        assert_eq!(parse_due_date(Some("2024-02-29")).unwrap(), NaiveDate::from_ymd_opt(2024, 2, 29));
        assert_eq!(parse_due_date(Some("")).unwrap(), None);
        assert!(parse_due_date(Some("29.02.2024")).is_err());
    }

    #[test]
    fn web_form_edit_keeps_blank_fields_but_sets_flags() {
        let mut todo = sample();
        todo.important = true;
        todo.completed = true;
        let form = TodoForm {
            title: Some(String::new()),
            category: Some(String::new()),
            ..TodoForm::default()
        };
        todo.apply(form.into_patch().unwrap());
        assert_eq!(todo.title, sample().title);
        assert_eq!(todo.category, sample().category);
        assert!(!todo.important);
        assert!(!todo.completed);
    }

    #[test]
    fn web_form_create_requires_title() {
        assert!(matches!(TodoForm::default().into_new_todo(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn null_flags_in_create_request_mean_false() {
        let request: TodoRequest =
            serde_json::from_str(r#"{ "title": "t", "important": null, "completed": null }"#).unwrap();
        let new_todo = request.into_new_todo().unwrap();
        assert!(!new_todo.important);
        assert!(!new_todo.completed);

        let request: TodoRequest = serde_json::from_str(r#"{ "title": "t", "important": true }"#).unwrap();
        assert!(request.into_new_todo().unwrap().important);
    }
}
