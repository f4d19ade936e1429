use crate::models::health::HealthResponse;
use crate::service::todo_store::TodoStore;
use rocket::serde::json::Json;
use rocket::{State, routes};

#[rocket::get("/")]
pub async fn healthcheck(store: &State<TodoStore>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        users: store.user_count().await,
    })
}

pub fn routes() -> Vec<rocket::Route> {
    routes![healthcheck]
}
