use crate::Config;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::join_base_path;
use crate::middleware::media_type::JsonContent;
use crate::models::user::{CreateUserRequest, UserResponse};
use crate::service::todo_store::TodoStore;
use rocket::response::status::Created;
use rocket::serde::json::Json;
use rocket::{State, routes};
use validator::Validate;

#[rocket::post("/", data = "<payload>")]
pub async fn post_user(
    store: &State<TodoStore>,
    config: &State<Config>,
    _content: JsonContent,
    payload: JsonBody<CreateUserRequest>,
) -> Result<Created<Json<UserResponse>>, AppError> {
    payload.validate()?;

    let user = store.register(&payload.name, &payload.password).await?;
    let location = join_base_path(&config.api.base_path, &format!("users/{}", user.id));
    Ok(Created::new(location).body(Json(user)))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![post_user]
}
