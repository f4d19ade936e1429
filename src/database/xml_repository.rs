use crate::database::repository::{StorageError, UserRepository};
use crate::models::todo::Todo;
use crate::models::user::User;
use chrono::NaiveDate;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// Stores every user and todo in a single XML document.
///
/// Saves write the whole document to `<file>.tmp`, flush it to disk and rename
/// it over the target, so a crash leaves either the old or the new file.
#[derive(Debug, Clone)]
pub struct XmlRepository {
    path: PathBuf,
}

impl XmlRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait::async_trait]
impl UserRepository for XmlRepository {
    async fn load_users(&self) -> Result<Vec<User>, StorageError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "store file does not exist yet, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let users = decode_document(&text)?;
        info!(path = %self.path.display(), users = users.len(), "read store file");
        Ok(users)
    }

    async fn save_users(&self, users: &[User]) -> Result<(), StorageError> {
        let document = encode_document(users)?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = self.temp_path();
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(document.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temp_path, &self.path).await?;

        debug!(path = %self.path.display(), users = users.len(), bytes = document.len(), "wrote store file");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename = "root")]
struct XmlDocument {
    users: XmlUsers,
}

#[derive(Debug, Serialize)]
struct XmlUsers {
    #[serde(rename = "user")]
    users: Vec<XmlUser>,
}

#[derive(Debug, Serialize)]
struct XmlUser {
    #[serde(rename = "userID")]
    id: u32,
    #[serde(rename = "userName")]
    name: String,
    password: String,
    todos: XmlTodos,
}

#[derive(Debug, Serialize)]
struct XmlTodos {
    #[serde(rename = "todo")]
    todos: Vec<XmlTodo>,
}

#[derive(Debug, Serialize)]
struct XmlTodo {
    #[serde(rename = "todoID")]
    id: u32,
    title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<String>,
    #[serde(rename = "dueDate", skip_serializing_if = "Option::is_none")]
    due_date: Option<NaiveDate>,
    important: bool,
    completed: bool,
}

impl From<&User> for XmlUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            password: user.password.clone(),
            todos: XmlTodos {
                todos: user.all_todos().iter().map(XmlTodo::from).collect(),
            },
        }
    }
}

impl From<&Todo> for XmlTodo {
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

/// Element of a parsed store file. Text is kept exactly as written: the serde
/// deserializer trims element text, which would alter names, passwords and
/// titles that start or end with whitespace.
#[derive(Debug, Default)]
struct XmlElement {
    name: String,
    text: String,
    children: Vec<XmlElement>,
}

impl XmlElement {
    fn named(start: &BytesStart<'_>) -> Self {
        Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            ..Self::default()
        }
    }

    fn parse(text: &str) -> Result<Self, StorageError> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(false);

        let mut open: Vec<XmlElement> = Vec::new();
        loop {
            let closed = match reader.read_event()? {
                Event::Start(start) => {
                    open.push(XmlElement::named(&start));
                    continue;
                }
                Event::Empty(start) => XmlElement::named(&start),
                Event::End(_) => open
                    .pop()
                    .ok_or_else(|| StorageError::Invalid("unexpected closing tag".to_string()))?,
                Event::Text(text) => {
                    if let Some(current) = open.last_mut() {
                        current.text.push_str(&text.unescape()?);
                    }
                    continue;
                }
                Event::CData(data) => {
                    if let Some(current) = open.last_mut() {
                        current.text.push_str(&data.decode().map_err(quick_xml::Error::from)?);
                    }
                    continue;
                }
                Event::Eof => return Err(StorageError::Invalid("document ends before <root> is closed".to_string())),
                _ => continue,
            };

            match open.last_mut() {
                Some(parent) => parent.children.push(closed),
                None => return Ok(closed),
            }
        }
    }

    fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|child| child.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> + 'a {
        self.children.iter().filter(move |child| child.name == name)
    }

    fn required(&self, name: &str) -> Result<&str, StorageError> {
        self.child(name)
            .map(|child| child.text.as_str())
            .ok_or_else(|| StorageError::Invalid(format!("<{}> is missing <{name}>", self.name)))
    }

    fn optional(&self, name: &str) -> Option<&str> {
        self.child(name).map(|child| child.text.as_str())
    }

    fn parsed<T: FromStr>(&self, name: &str, value: &str) -> Result<T, StorageError> {
        value
            .trim()
            .parse()
            .map_err(|_| StorageError::Invalid(format!("<{name}> in <{}> has invalid value '{value}'", self.name)))
    }

    fn flag(&self, name: &str) -> Result<bool, StorageError> {
        match self.optional(name) {
            Some(value) => self.parsed(name, value),
            None => Ok(false),
        }
    }
}

fn decode_document(text: &str) -> Result<Vec<User>, StorageError> {
    let root = XmlElement::parse(text)?;
    if root.name != "root" {
        return Err(StorageError::Invalid(format!("expected <root>, found <{}>", root.name)));
    }

    match root.child("users") {
        Some(users) => users.children_named("user").map(decode_user).collect(),
        None => Ok(Vec::new()),
    }
}

fn decode_user(element: &XmlElement) -> Result<User, StorageError> {
    let id = element.parsed("userID", element.required("userID")?)?;
    let todos = match element.child("todos") {
        Some(todos) => todos.children_named("todo").map(decode_todo).collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    Ok(User::with_todos(
        id,
        element.required("userName")?,
        element.required("password")?,
        todos,
    ))
}

fn decode_todo(element: &XmlElement) -> Result<Todo, StorageError> {
    let due_date = match element.optional("dueDate").map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
            StorageError::Invalid(format!("<dueDate> '{raw}' is not a date: {e}"))
        })?),
    };

    Ok(Todo {
        id: element.parsed("todoID", element.required("todoID")?)?,
        title: element.required("title")?.to_string(),
        category: element.optional("category").filter(|c| !c.is_empty()).map(str::to_string),
        due_date,
        important: element.flag("important")?,
        completed: element.flag("completed")?,
    })
}

fn encode_document(users: &[User]) -> Result<String, StorageError> {
    let document = XmlDocument {
        users: XmlUsers {
            users: users.iter().map(XmlUser::from).collect(),
        },
    };

    let mut body = String::new();
    let mut serializer = quick_xml::se::Serializer::new(&mut body);
    serializer.indent(' ', 2);
    document.serialize(serializer)?;

    Ok(format!("{XML_DECLARATION}\n{body}\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::todo::NewTodo;
    use tempfile::tempdir;

    fn sample_users() -> Vec<User> {
        let todo = Todo::new(
            4,
            NewTodo {
                title: "Buy milk & bread".to_string(),
                category: Some("home".to_string()),
                due_date: NaiveDate::from_ymd_opt(2024, 5, 1),
                important: true,
                completed: false,
            },
        );
        let bare = Todo::new(
            9,
            NewTodo {
                title: "Call <Bob>".to_string(),
                ..NewTodo::default()
            },
        );
        vec![
            User::with_todos(1, "alice", "secret", vec![todo, bare]),
            User::new(2, "bob", "hunter2"),
        ]
    }

    #[rocket::async_test]
    async fn missing_file_loads_as_empty_store() {
        let dir = tempdir().expect("tempdir");
        let repo = XmlRepository::new(dir.path().join("absent.xml"));
        assert!(repo.load_users().await.expect("load").is_empty());
    }

    #[rocket::async_test]
    async fn saved_users_load_back_identically() {
        let dir = tempdir().expect("tempdir");
        let repo = XmlRepository::new(dir.path().join("nested").join("todos.xml"));
        let users = sample_users();

        repo.save_users(&users).await.expect("save");
        let loaded = repo.load_users().await.expect("load");

        assert_eq!(loaded, users);
        assert!(!repo.temp_path().exists());
    }

    #[rocket::async_test]
    async fn saving_replaces_previous_contents() {
        let dir = tempdir().expect("tempdir");
        let repo = XmlRepository::new(dir.path().join("todos.xml"));

        repo.save_users(&sample_users()).await.expect("first save");
        repo.save_users(&[User::new(5, "carol", "pw")]).await.expect("second save");

        let loaded = repo.load_users().await.expect("load");
        assert_eq!(loaded, vec![User::new(5, "carol", "pw")]);
    }

    #[test]
    fn encoded_document_uses_store_element_names() {
        let xml = encode_document(&sample_users()).expect("encode");
        assert!(xml.starts_with(XML_DECLARATION));
        assert!(xml.contains("<userName>alice</userName>"));
        assert!(xml.contains("<todoID>4</todoID>"));
        assert!(xml.contains("<dueDate>2024-05-01</dueDate>"));
        assert!(xml.contains("&amp;"));
        assert_eq!(xml.matches("<category>").count(), 1);
    }

    #[test]
    fn decodes_hand_written_document() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<root>
  <users>
    <user>
      <userID>3</userID>
      <userName>Dora</userName>
      <password>1234</password>
      <todos>
        <todo>
          <todoID>12</todoID>
          <title>Plan trip</title>
          <category>travel</category>
          <important>true</important>
          <completed>false</completed>
        </todo>
      </todos>
    </user>
    <user>
      <userID>8</userID>
      <userName>Emil</userName>
      <password>pw</password>
    </user>
  </users>
</root>
"#;
        let users = decode_document(xml).expect("decode");
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].name, "Dora");
        let todo = users[0].get_todo(12).expect("todo 12");
        assert_eq!(todo.category.as_deref(), Some("travel"));
        assert_eq!(todo.due_date, None);
        assert!(todo.important);
        assert!(users[1].all_todos().is_empty());
    }

    #[rocket::async_test]
    async fn surrounding_whitespace_survives_a_reload() {
        let dir = tempdir().expect("tempdir");
        let repo = XmlRepository::new(dir.path().join("todos.xml"));
        let todo = Todo::new(
            3,
            NewTodo {
                title: "  padded title  ".to_string(),
                category: Some(" home ".to_string()),
                ..NewTodo::default()
            },
        );
        let blank = Todo::new(
            4,
            NewTodo {
                title: "   ".to_string(),
                ..NewTodo::default()
            },
        );
        let users = vec![User::with_todos(1, " alice ", " pw ", vec![todo, blank])];

        repo.save_users(&users).await.expect("save");
        let loaded = repo.load_users().await.expect("load");

        assert_eq!(loaded, users);
        assert_eq!(loaded[0].password, " pw ");
        assert_eq!(loaded[0].get_todo(4).expect("todo 4").title, "   ");
    }

    #[test]
    fn cdata_and_self_closing_elements_are_read() {
        let xml = "<root><users><user><userID>1</userID><userName><![CDATA[ a<b ]]></userName>\
                   <password>pw</password><todos><todo><todoID>2</todoID><title>t</title><category/>\
                   </todo></todos></user></users></root>";
        let users = decode_document(xml).expect("decode");
        assert_eq!(users[0].name, " a<b ");
        assert_eq!(users[0].get_todo(2).expect("todo 2").category, None);
    }

    #[test]
    fn empty_store_document_decodes_to_no_users() {
        assert!(decode_document("<root/>").expect("decode").is_empty());
        assert!(decode_document(&encode_document(&[]).expect("encode")).expect("decode").is_empty());
    }

    #[test]
    fn invalid_field_values_are_rejected() {
        let result = decode_document("<root><users><user><userID>x</userID></user></users></root>");
        assert!(matches!(result, Err(StorageError::Invalid(_))));

        let result = decode_document("<root><users><user><userID>1</userID></user></users></root>");
        assert!(matches!(result, Err(StorageError::Invalid(_))));
    }

    #[test]
    fn broken_markup_is_a_decode_error() {
        assert!(matches!(decode_document("<root><users></root>"), Err(StorageError::Decode(_))));
        assert!(matches!(decode_document("<root><users>"), Err(StorageError::Invalid(_))));
    }
}
