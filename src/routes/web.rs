use crate::Config;
use crate::auth::{CurrentUser, end_session, start_session};
use crate::error::app_error::AppError;
use crate::models::todo::{FilterForm, TodoFilter, TodoForm, TodoResponse};
use crate::models::user::CredentialsForm;
use crate::service::todo_store::TodoStore;
use rocket::form::Form;
use rocket::http::{CookieJar, Status};
use rocket::request::FlashMessage;
use rocket::response::{Flash, Redirect};
use rocket::serde::Serialize;
use rocket::{Responder, State, routes};
use rocket_dyn_templates::{Template, context};
use tracing::{error, info, warn};

/// Every web handler either renders a view or redirects somewhere else.
#[derive(Responder)]
pub enum Page {
    View(Template),
    Redirect(Redirect),
    Flash(Flash<Redirect>),
}

impl Page {
    fn to(uri: &'static str) -> Self {
        Page::Redirect(Redirect::to(uri))
    }

    fn success(uri: &'static str, message: impl Into<String>) -> Self {
        Page::Flash(Flash::success(Redirect::to(uri), message.into()))
    }

    fn error(uri: impl Into<String>, message: impl Into<String>) -> Self {
        Page::Flash(Flash::error(Redirect::to(uri.into()), message.into()))
    }
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
struct Notice {
    kind: String,
    message: String,
}

impl Notice {
    fn from_flash(flash: Option<FlashMessage<'_>>) -> Option<Self> {
        flash.map(|flash| Notice {
            kind: flash.kind().to_string(),
            message: flash.message().to_string(),
        })
    }
}

fn failed(err: AppError) -> Status {
    error!(error = ?err, "web request failed");
    Status::from(&err)
}

#[rocket::get("/")]
pub fn index() -> Redirect {
    Redirect::to("/todos")
}

#[rocket::get("/login")]
pub fn login_page(user: Option<CurrentUser>, flash: Option<FlashMessage<'_>>) -> Page {
    if user.is_some() {
        return Page::to("/todos");
    }
    Page::View(Template::render("login", context! { notice: Notice::from_flash(flash) }))
}

#[rocket::post("/login", data = "<form>")]
pub async fn login(
    store: &State<TodoStore>,
    config: &State<Config>,
    cookies: &CookieJar<'_>,
    form: Form<CredentialsForm>,
) -> Page {
    match store.authenticate(&form.name, &form.password).await {
        Ok(user) => {
            start_session(cookies, user.id, config.session.cookie_secure);
            info!(user_id = user.id, "user logged in");
            Page::to("/todos")
        }
        Err(err) => {
            warn!(name = %form.name, error = %err, "web login failed");
            Page::error("/login", "Unknown user name or wrong password.")
        }
    }
}

#[rocket::get("/register")]
pub fn register_page(flash: Option<FlashMessage<'_>>) -> Template {
    Template::render("register", context! { notice: Notice::from_flash(flash) })
}

#[rocket::post("/register", data = "<form>")]
pub async fn register(
    store: &State<TodoStore>,
    config: &State<Config>,
    cookies: &CookieJar<'_>,
    form: Form<CredentialsForm>,
) -> Result<Page, Status> {
    if form.name.is_empty() || form.password.is_empty() {
        return Ok(Page::error("/register", "Name and password must not be empty."));
    }

    match store.register(&form.name, &form.password).await {
        Ok(user) => {
            start_session(cookies, user.id, config.session.cookie_secure);
            Ok(Page::success("/todos", format!("Welcome, {}!", user.name)))
        }
        Err(AppError::UserAlreadyExists(name)) => Ok(Page::error("/register", format!("User {name} already exists."))),
        Err(err) => Err(failed(err)),
    }
}

#[rocket::post("/logout")]
pub fn logout(cookies: &CookieJar<'_>) -> Flash<Redirect> {
    end_session(cookies);
    Flash::success(Redirect::to("/login"), "You have been logged out.")
}

async fn render_list(store: &TodoStore, user: CurrentUser, filter: TodoFilter, notice: Option<Notice>) -> Result<Page, Status> {
    let todos = store.list_todos(user.id, &filter).await.map_err(failed)?;
    let categories = store.categories(user.id).await.map_err(failed)?;
    let todos: Vec<TodoResponse> = todos.iter().map(TodoResponse::from).collect();

    Ok(Page::View(Template::render(
        "todos",
        context! {
            user: user,
            todos: todos,
            categories: categories,
            category: filter.category.clone().unwrap_or_default(),
            status: filter.status.map(|s| s.as_str()).unwrap_or_default(),
            list_is_filtered: filter.is_filtered(),
            notice: notice,
        },
    )))
}

#[rocket::get("/todos")]
pub async fn list_page(
    store: &State<TodoStore>,
    user: Option<CurrentUser>,
    flash: Option<FlashMessage<'_>>,
) -> Result<Page, Status> {
    let Some(user) = user else {
        return Ok(Page::to("/login"));
    };
    render_list(store, user, TodoFilter::default(), Notice::from_flash(flash)).await
}

#[rocket::post("/todos", data = "<form>")]
pub async fn filter_list(store: &State<TodoStore>, user: Option<CurrentUser>, form: Form<FilterForm>) -> Result<Page, Status> {
    let Some(user) = user else {
        return Ok(Page::to("/login"));
    };

    let form = form.into_inner();
    match TodoFilter::from_params(form.category, form.status) {
        Ok(filter) => render_list(store, user, filter, None).await,
        Err(err) => Ok(Page::error("/todos", err.to_string())),
    }
}

fn render_form(user: CurrentUser, action: String, todo: Option<TodoResponse>, notice: Option<Notice>) -> Page {
    Page::View(Template::render(
        "todo_form",
        context! {
            user: user,
            action: action,
            todo: todo,
            notice: notice,
        },
    ))
}

#[rocket::get("/todos/new")]
pub fn new_todo_page(user: Option<CurrentUser>, flash: Option<FlashMessage<'_>>) -> Page {
    match user {
        Some(user) => render_form(user, "/todos/new".to_string(), None, Notice::from_flash(flash)),
        None => Page::to("/login"),
    }
}

#[rocket::post("/todos/new", data = "<form>")]
pub async fn create_todo(store: &State<TodoStore>, user: Option<CurrentUser>, form: Form<TodoForm>) -> Result<Page, Status> {
    let Some(user) = user else {
        return Ok(Page::to("/login"));
    };

    let new_todo = match form.into_inner().into_new_todo() {
        Ok(new_todo) => new_todo,
        Err(err) => return Ok(Page::error("/todos/new", err.to_string())),
    };
    let todo = store.create_todo(user.id, new_todo).await.map_err(failed)?;
    Ok(Page::success("/todos", format!("Created \"{}\".", todo.title)))
}

#[rocket::get("/todos/<id>/edit")]
pub async fn edit_todo_page(
    store: &State<TodoStore>,
    user: Option<CurrentUser>,
    flash: Option<FlashMessage<'_>>,
    id: u32,
) -> Result<Page, Status> {
    let Some(user) = user else {
        return Ok(Page::to("/login"));
    };

    match store.get_todo(user.id, id).await.map_err(failed)? {
        Some(todo) => Ok(render_form(
            user,
            format!("/todos/{id}/edit"),
            Some(TodoResponse::from(&todo)),
            Notice::from_flash(flash),
        )),
        None => Ok(Page::error("/todos", format!("Todo {id} does not exist."))),
    }
}

#[rocket::post("/todos/<id>/edit", data = "<form>")]
pub async fn update_todo(
    store: &State<TodoStore>,
    user: Option<CurrentUser>,
    id: u32,
    form: Form<TodoForm>,
) -> Result<Page, Status> {
    let Some(user) = user else {
        return Ok(Page::to("/login"));
    };

    let patch = match form.into_inner().into_patch() {
        Ok(patch) => patch,
        Err(err) => return Ok(Page::error(format!("/todos/{id}/edit"), err.to_string())),
    };
    match store.update_todo(user.id, id, patch).await {
        Ok(todo) => Ok(Page::success("/todos", format!("Updated \"{}\".", todo.title))),
        Err(AppError::NotFound(_)) => Ok(Page::error("/todos", format!("Todo {id} does not exist."))),
        Err(err) => Err(failed(err)),
    }
}

#[rocket::post("/todos/<id>/delete")]
pub async fn delete_todo(store: &State<TodoStore>, user: Option<CurrentUser>, id: u32) -> Result<Page, Status> {
    let Some(user) = user else {
        return Ok(Page::to("/login"));
    };

    match store.delete_todo(user.id, id).await {
        Ok(()) => Ok(Page::success("/todos", "Todo deleted.")),
        Err(AppError::NotFound(_)) => Ok(Page::error("/todos", format!("Todo {id} does not exist."))),
        Err(err) => Err(failed(err)),
    }
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        index,
        login_page,
        login,
        register_page,
        register,
        logout,
        list_page,
        filter_list,
        new_todo_page,
        create_todo,
        edit_todo_page,
        update_todo,
        delete_todo,
    ]
}
