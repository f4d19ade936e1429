use crate::error::app_error::AppError;
use crate::middleware::request_id_of;
use crate::models::user::UserResponse;
use crate::service::todo_store::TodoStore;
use base64::{Engine as _, engine::general_purpose};
use rocket::http::{Cookie, CookieJar, SameSite, Status};
use rocket::outcome::Outcome;
use rocket::request::{FromRequest, Outcome as RequestOutcome, Request};
use serde::Serialize;
use std::ops::Deref;
use tracing::warn;

pub const SESSION_COOKIE: &str = "user";

#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: u32,
    pub name: String,
}

impl From<UserResponse> for CurrentUser {
    fn from(user: UserResponse) -> Self {
        Self { id: user.id, name: user.name }
    }
}

/// The caller of a REST endpoint, identified by HTTP Basic credentials or, when
/// no `Authorization` header is sent, by the web session cookie.
#[derive(Debug, Clone)]
pub struct ApiUser(pub CurrentUser);

impl Deref for ApiUser {
    type Target = CurrentUser;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub(crate) fn parse_session_cookie_value(value: &str) -> Option<u32> {
    value.trim().parse().ok()
}

pub(crate) fn parse_basic_credentials(header: &str) -> Option<(String, String)> {
    let (scheme, encoded) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = general_purpose::STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (name, password) = decoded.split_once(':')?;
    Some((name.to_string(), password.to_string()))
}

pub fn start_session(cookies: &CookieJar<'_>, user_id: u32, secure: bool) {
    let cookie = Cookie::build((SESSION_COOKIE, user_id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build();
    cookies.add_private(cookie);
}

pub fn end_session(cookies: &CookieJar<'_>) {
    cookies.remove_private(Cookie::build(SESSION_COOKIE).path("/").build());
}

async fn session_user(req: &Request<'_>) -> Option<CurrentUser> {
    let cookie = req.cookies().get_private(SESSION_COOKIE)?;
    let user_id = parse_session_cookie_value(cookie.value())?;
    let store = req.rocket().state::<TodoStore>()?;
    store.get_user(user_id).await.map(CurrentUser::from)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CurrentUser {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        match session_user(req).await {
            Some(user) => {
                req.local_cache(|| Some(user.clone()));
                Outcome::Success(user)
            }
            None => Outcome::Error((Status::Unauthorized, AppError::Unauthorized)),
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ApiUser {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> RequestOutcome<Self, Self::Error> {
        let Some(header) = req.headers().get_one("Authorization") else {
            return match session_user(req).await {
                Some(user) => {
                    req.local_cache(|| Some(user.clone()));
                    Outcome::Success(ApiUser(user))
                }
                None => Outcome::Error((Status::Unauthorized, AppError::Unauthorized)),
            };
        };

        let Some((name, password)) = parse_basic_credentials(header) else {
            warn!(request_id = %request_id_of(req), "malformed Authorization header");
            return Outcome::Error((Status::Unauthorized, AppError::Unauthorized));
        };

        let Some(store) = req.rocket().state::<TodoStore>() else {
            return Outcome::Error((Status::InternalServerError, AppError::Unauthorized));
        };

        match store.authenticate(&name, &password).await {
            Ok(user) => {
                let user = CurrentUser::from(user);
                req.local_cache(|| Some(user.clone()));
                Outcome::Success(ApiUser(user))
            }
            Err(err) => {
                warn!(request_id = %request_id_of(req), name = %name, error = %err, "basic authentication failed");
                Outcome::Error((Status::Unauthorized, err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_session_cookie_value_valid() {
        assert_eq!(parse_session_cookie_value("42"), Some(42));
    }

    #[test]
    fn parse_session_cookie_value_invalid() {
        assert_eq!(parse_session_cookie_value("not-a-number"), None);
        assert_eq!(parse_session_cookie_value("-1"), None);
    }

    #[test]
    fn parse_basic_credentials_valid() {
        let header = format!("Basic {}", general_purpose::STANDARD.encode("alice:se:cret"));
        assert_eq!(
            parse_basic_credentials(&header),
            Some(("alice".to_string(), "se:cret".to_string()))
        );
    }

    #[test]
    fn parse_basic_credentials_rejects_other_schemes_and_garbage() {
        assert_eq!(parse_basic_credentials("Bearer abc.def"), None);
        assert_eq!(parse_basic_credentials("Basic !!!"), None);
        let no_colon = format!("Basic {}", general_purpose::STANDARD.encode("alice"));
        assert_eq!(parse_basic_credentials(&no_colon), None);
    }
}
