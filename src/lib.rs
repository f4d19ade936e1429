mod auth;
mod config;
mod database;
mod error;
mod middleware;
mod models;
mod routes;
mod service;
mod storage;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;
pub use database::repository::{StorageError, UserRepository};
pub use database::xml_repository::XmlRepository;

use crate::middleware::RequestLogger;
use crate::routes as app_routes;
use crate::storage::stage_store;
use rocket::config::Config as RocketConfig;
use rocket::fairing::AdHoc;
use rocket::{Build, Rocket, catchers};
use rocket_dyn_templates::Template;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_tracing(log_level: &str, json_format: bool) {
    // RUST_LOG overrides the configured level, e.g.
    //   RUST_LOG=todo_keeper::routes=debug,info
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_line_number(true);

    // a second build (tests) keeps the subscriber installed by the first
    let _ = if json_format {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
}

/// Private session cookies need a stable key outside the debug profile.
fn ensure_rocket_secret_key() -> AdHoc {
    AdHoc::try_on_ignite("Secret key check", |rocket| async move {
        let profile = rocket.figment().profile().clone();
        if profile != RocketConfig::DEBUG_PROFILE && !rocket.figment().contains("secret_key") {
            tracing::error!(
                profile = %profile,
                "ROCKET_SECRET_KEY is required outside the debug profile. Generate one with: openssl rand -base64 32"
            );
            return Err(rocket);
        }
        Ok(rocket)
    })
}

fn normalize_base_path(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return config::DEFAULT_API_BASE_PATH.to_string();
    }

    let mut normalized = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    };

    while normalized.ends_with('/') && normalized.len() > 1 {
        normalized.pop();
    }

    normalized
}

pub(crate) fn join_base_path(base_path: &str, path: &str) -> String {
    let base = base_path.trim_end_matches('/');
    let suffix = path.trim_start_matches('/');

    if base.is_empty() {
        format!("/{}", suffix)
    } else {
        format!("{}/{}", base, suffix)
    }
}

fn mount_api_routes(rocket: Rocket<Build>, base_path: &str) -> Rocket<Build> {
    rocket
        .mount(join_base_path(base_path, "todos"), app_routes::todo::routes())
        .mount(join_base_path(base_path, "users"), app_routes::user::routes())
        .mount(join_base_path(base_path, "health"), app_routes::health::routes())
        .register(base_path, catchers![app_routes::error::unauthorized, app_routes::error::api_error])
}

/// Builds the server around the XML file named by `config.storage.path`.
pub fn build_rocket(config: Config) -> Rocket<Build> {
    let repository = Arc::new(XmlRepository::new(&config.storage.path));
    build_rocket_with_repository(config, repository)
}

pub fn build_rocket_with_repository(mut config: Config, repository: Arc<dyn UserRepository>) -> Rocket<Build> {
    init_tracing(&config.logging.level, config.logging.json_format);

    config.api.base_path = normalize_base_path(&config.api.base_path);
    let base_path = config.api.base_path.clone();

    let figment = RocketConfig::figment()
        .merge(("address", config.server.address.clone()))
        .merge(("port", config.server.port))
        .merge(("template_dir", config.web.template_dir.clone()));

    let rocket = rocket::custom(figment)
        .attach(ensure_rocket_secret_key())
        .attach(RequestLogger)
        .attach(Template::fairing())
        .attach(stage_store(repository))
        .manage(config);

    mount_api_routes(rocket, &base_path)
        .mount("/", app_routes::web::routes())
        .register("/", catchers![app_routes::error::web_error])
}
