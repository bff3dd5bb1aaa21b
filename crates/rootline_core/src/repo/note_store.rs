//! Note-store contract and SQLite implementation.
//!
//! # Responsibility
//! - Define the document store that import materializes records into.
//! - Keep SQL details behind the `NoteStore` trait.
//!
//! # Invariants
//! - `path` is the unique key of a document.
//! - `create` never overwrites; `modify` never creates.
//! - `properties` round-trip as a JSON object with stable key order.

use crate::db::DbError;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Property holding the stable internal record identifier.
pub const RECORD_ID_PROPERTY: &str = "cr_id";

const NOTE_SELECT_SQL: &str = "SELECT path, kind, properties, body FROM notes";

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    Json(serde_json::Error),
    AlreadyExists(String),
    NotFound(String),
    InvalidData(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "invalid note properties: {err}"),
            Self::AlreadyExists(path) => write!(f, "note already exists: {path}"),
            Self::NotFound(path) => write!(f, "note not found: {path}"),
            Self::InvalidData(message) => write!(f, "invalid persisted note data: {message}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::AlreadyExists(_) | Self::NotFound(_) | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteKind {
    Person,
    Place,
    Event,
    Source,
    Note,
}

impl NoteKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Person => "person",
            Self::Place => "place",
            Self::Event => "event",
            Self::Source => "source",
            Self::Note => "note",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "person" => Some(Self::Person),
            "place" => Some(Self::Place),
            "event" => Some(Self::Event),
            "source" => Some(Self::Source),
            "note" => Some(Self::Note),
            _ => None,
        }
    }
}

/// One stored document: front-matter style properties plus free text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteDocument {
    pub path: String,
    pub kind: NoteKind,
    pub properties: BTreeMap<String, Value>,
    pub body: String,
}

impl NoteDocument {
    pub fn new(path: impl Into<String>, kind: NoteKind) -> Self {
        Self {
            path: path.into(),
            kind,
            properties: BTreeMap::new(),
            body: String::new(),
        }
    }

    pub fn record_id(&self) -> Option<&str> {
        self.text(RECORD_ID_PROPERTY)
    }

    /// String value of a property; `None` for missing, empty or non-string values.
    pub fn text(&self, key: &str) -> Option<&str> {
        self.properties
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Values of a property that may hold one string or an array of strings.
    pub fn texts(&self, key: &str) -> Vec<&str> {
        match self.properties.get(key) {
            Some(Value::String(value)) if !value.is_empty() => vec![value.as_str()],
            Some(Value::Array(values)) => values
                .iter()
                .filter_map(Value::as_str)
                .filter(|value| !value.is_empty())
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Sets a string property, skipping `None`.
    pub fn set_opt(&mut self, key: &str, value: Option<&str>) {
        if let Some(value) = value.filter(|value| !value.is_empty()) {
            self.set(key, value);
        }
    }

    /// File name without folders or extension.
    pub fn basename(&self) -> &str {
        let file = self.path.rsplit('/').next().unwrap_or(&self.path);
        file.strip_suffix(".md").unwrap_or(file)
    }
}

/// Document store consumed by import and by the store reader.
pub trait NoteStore {
    /// Creates a document; fails with `AlreadyExists` when `path` is taken.
    fn create(&mut self, document: &NoteDocument) -> StoreResult<()>;
    fn read(&self, path: &str) -> StoreResult<Option<NoteDocument>>;
    /// Replaces an existing document; fails with `NotFound` otherwise.
    fn modify(&mut self, document: &NoteDocument) -> StoreResult<()>;
    fn exists(&self, path: &str) -> StoreResult<bool>;
    /// Every document ordered by path.
    fn list_all(&self) -> StoreResult<Vec<NoteDocument>>;
}

/// SQLite-backed note store over the `notes` table.
pub struct SqliteNoteStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNoteStore<'conn> {
    /// Wraps a connection returned by `open_db`/`open_db_in_memory`.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Number of stored documents of one kind.
    pub fn count(&self, kind: NoteKind) -> StoreResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM notes WHERE kind = ?1;",
            [kind.as_str()],
            |row| row.get(0),
        )?;
        usize::try_from(count).map_err(|_| StoreError::InvalidData(format!("negative count {count}")))
    }
}

impl NoteStore for SqliteNoteStore<'_> {
    fn create(&mut self, document: &NoteDocument) -> StoreResult<()> {
        if self.exists(&document.path)? {
            return Err(StoreError::AlreadyExists(document.path.clone()));
        }
        let properties = serde_json::to_string(&document.properties)?;
        self.conn.execute(
            "INSERT INTO notes (path, kind, record_id, properties, body)
             VALUES (?1, ?2, ?3, ?4, ?5);",
            params![
                document.path.as_str(),
                document.kind.as_str(),
                document.record_id(),
                properties,
                document.body.as_str(),
            ],
        )?;
        Ok(())
    }

    fn read(&self, path: &str) -> StoreResult<Option<NoteDocument>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} WHERE path = ?1;"))?;
        let mut rows = stmt.query([path])?;
        match rows.next()? {
            Some(row) => Ok(Some(parse_note_row(row)?)),
            None => Ok(None),
        }
    }

    fn modify(&mut self, document: &NoteDocument) -> StoreResult<()> {
        let properties = serde_json::to_string(&document.properties)?;
        let changed = self.conn.execute(
            "UPDATE notes
             SET
                kind = ?2,
                record_id = ?3,
                properties = ?4,
                body = ?5,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE path = ?1;",
            params![
                document.path.as_str(),
                document.kind.as_str(),
                document.record_id(),
                properties,
                document.body.as_str(),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(document.path.clone()));
        }
        Ok(())
    }

    fn exists(&self, path: &str) -> StoreResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM notes WHERE path = ?1);",
            [path],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn list_all(&self) -> StoreResult<Vec<NoteDocument>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{NOTE_SELECT_SQL} ORDER BY path ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut documents = Vec::new();
        while let Some(row) = rows.next()? {
            documents.push(parse_note_row(row)?);
        }
        Ok(documents)
    }
}

fn parse_note_row(row: &Row<'_>) -> StoreResult<NoteDocument> {
    let path: String = row.get("path")?;
    let kind_text: String = row.get("kind")?;
    let kind = NoteKind::parse(&kind_text)
        .ok_or_else(|| StoreError::InvalidData(format!("invalid kind `{kind_text}` for {path}")))?;
    let properties_text: String = row.get("properties")?;
    let properties: BTreeMap<String, Value> = serde_json::from_str(&properties_text)?;
    Ok(NoteDocument {
        path,
        kind,
        properties,
        body: row.get("body")?,
    })
}
