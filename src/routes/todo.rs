use crate::Config;
use crate::auth::ApiUser;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::join_base_path;
use crate::middleware::media_type::{AcceptsJson, JsonContent};
use crate::models::todo::{TodoFilter, TodoRequest, TodoResponse, TodoUpdateRequest};
use crate::service::todo_store::TodoStore;
use rocket::http::Status;
use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::{State, routes};
use validator::Validate;

fn parse_todo_id(id: &str) -> Option<u32> {
    id.trim().parse().ok()
}

#[rocket::get("/?<category>&<status>")]
pub async fn list_todos(
    store: &State<TodoStore>,
    user: ApiUser,
    _accept: AcceptsJson,
    category: Option<String>,
    status: Option<String>,
) -> Result<Json<Vec<TodoResponse>>, AppError> {
    let filter = TodoFilter::from_params(category, status)?;
    let todos = store.list_todos(user.id, &filter).await?;
    Ok(Json(todos.iter().map(TodoResponse::from).collect()))
}

#[rocket::get("/<id>")]
pub async fn get_todo(store: &State<TodoStore>, user: ApiUser, _accept: AcceptsJson, id: &str) -> Result<Json<TodoResponse>, AppError> {
    let todo_id = parse_todo_id(id).ok_or_else(|| AppError::not_found(format!("todo {id}")))?;
    match store.get_todo(user.id, todo_id).await? {
        Some(todo) => Ok(Json(TodoResponse::from(&todo))),
        None => Err(AppError::not_found(format!("todo {todo_id}"))),
    }
}

#[rocket::post("/", data = "<payload>")]
pub async fn create_todo(
    store: &State<TodoStore>,
    config: &State<Config>,
    user: ApiUser,
    _content: JsonContent,
    _accept: AcceptsJson,
    payload: JsonBody<TodoRequest>,
) -> Result<Created<Json<u32>>, AppError> {
    payload.validate()?;

    let new_todo = payload.into_inner().into_new_todo()?;
    let todo = store.create_todo(user.id, new_todo).await?;
    let location = join_base_path(&config.api.base_path, &format!("todos/{}", todo.id));
    Ok(Created::new(location).body(Json(todo.id)))
}

#[rocket::put("/<id>", data = "<payload>")]
pub async fn put_todo(
    store: &State<TodoStore>,
    user: ApiUser,
    _content: JsonContent,
    id: &str,
    payload: Result<JsonBody<TodoUpdateRequest>, AppError>,
) -> Result<Status, AppError> {
    let todo_id = parse_todo_id(id).ok_or_else(|| AppError::bad_request(format!("invalid todo id '{id}'")))?;
    if store.get_todo(user.id, todo_id).await?.is_none() {
        return Err(AppError::not_found(format!("todo {todo_id}")));
    }

    let patch = payload?.into_inner().into_patch(todo_id)?;
    store.update_todo(user.id, todo_id, patch).await?;
    Ok(Status::NoContent)
}

/// `PUT` on the collection itself names no todo to update.
#[rocket::put("/")]
pub async fn put_without_id(_user: ApiUser, _content: JsonContent) -> AppError {
    AppError::bad_request("a todo id is required in the path")
}

#[rocket::delete("/<id>")]
pub async fn delete_todo(store: &State<TodoStore>, user: ApiUser, id: &str) -> Result<Status, AppError> {
    let todo_id = parse_todo_id(id).ok_or_else(|| AppError::not_found(format!("todo {id}")))?;
    store.delete_todo(user.id, todo_id).await?;
    Ok(Status::NoContent)
}

pub fn routes() -> Vec<rocket::Route> {
    routes![list_todos, get_todo, create_todo, put_todo, put_without_id, delete_todo]
}
