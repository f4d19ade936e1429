use crate::error::app_error::AppError;
use crate::middleware::request_id_of;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use tracing::warn;

/// Succeeds only when the `Accept` header lists `application/json`.
/// Missing headers and wildcards are answered with `406 Not Acceptable`.
#[derive(Debug, Clone, Copy)]
pub struct AcceptsJson;

/// Succeeds only when the request body is declared as `application/json`,
/// otherwise `415 Unsupported Media Type`.
#[derive(Debug, Clone, Copy)]
pub struct JsonContent;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AcceptsJson {
    type Error = AppError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        if request.accept().is_some_and(|accept| accept.media_types().any(|media| media.is_json())) {
            return Outcome::Success(AcceptsJson);
        }

        let accept = request.headers().get_one("Accept").unwrap_or("<none>");
        warn!(
            request_id = %request_id_of(request),
            method = %request.method(),
            uri = %request.uri(),
            accept = %accept,
            "client does not accept JSON"
        );
        Outcome::Error((Status::NotAcceptable, AppError::NotAcceptable(accept.to_string())))
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for JsonContent {
    type Error = AppError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        if request.content_type().is_some_and(|content_type| content_type.is_json()) {
            return Outcome::Success(JsonContent);
        }

        let content_type = request.headers().get_one("Content-Type").unwrap_or("<none>");
        warn!(
            request_id = %request_id_of(request),
            method = %request.method(),
            uri = %request.uri(),
            content_type = %content_type,
            "request body is not JSON"
        );
        Outcome::Error((
            Status::UnsupportedMediaType,
            AppError::UnsupportedMediaType(content_type.to_string()),
        ))
    }
}
