use rocket::http::{Header, Status};
use rocket::response::status;
use rocket::serde::Serialize;
use rocket::serde::json::Json;
use rocket::{Request, Responder, catch};
use rocket_dyn_templates::{Template, context};

pub const BASIC_CHALLENGE: &str = r#"Basic realm="todos""#;

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct Error {
    pub message: String,
}

impl Error {
    fn for_status(status: Status) -> Json<Self> {
        Json(Error {
            message: status.reason().unwrap_or("Error").to_string(),
        })
    }
}

/// 401 body plus the `WWW-Authenticate` challenge clients need to retry.
#[derive(Responder)]
#[response(status = 401)]
pub struct Challenge {
    body: Json<Error>,
    authenticate: Header<'static>,
}

#[catch(401)]
pub fn unauthorized(_: &Request) -> Challenge {
    Challenge {
        body: Error::for_status(Status::Unauthorized),
        authenticate: Header::new("WWW-Authenticate", BASIC_CHALLENGE),
    }
}

#[catch(default)]
pub fn api_error(status: Status, _: &Request) -> status::Custom<Json<Error>> {
    status::Custom(status, Error::for_status(status))
}

// web pages get an HTML error page instead of a JSON body
#[catch(default)]
pub fn web_error(status: Status, _: &Request) -> status::Custom<Template> {
    status::Custom(
        status,
        Template::render(
            "error",
            context! {
                code: status.code,
                reason: status.reason().unwrap_or("Error"),
            },
        ),
    )
}
