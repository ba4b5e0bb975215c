//! Secondary index key specifications.

use std::fmt;

use mongodb::bson::{Bson, Document};
use serde::Serialize;

use crate::error::DbError;

/// Sort direction of one indexed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    pub fn as_i32(self) -> i32 {
        match self {
            Direction::Ascending => 1,
            Direction::Descending => -1,
        }
    }

    fn from_bson(value: &Bson) -> Option<Self> {
        let n = match value {
            Bson::Int32(n) => *n as f64,
            Bson::Int64(n) => *n as f64,
            Bson::Double(n) => *n,
            _ => return None,
        };
        if n == 1.0 {
            Some(Direction::Ascending)
        } else if n == -1.0 {
            Some(Direction::Descending)
        } else {
            None
        }
    }
}

/// Ordered list of `(field, direction)` pairs making up an index key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct IndexKeys(Vec<(String, Direction)>);

impl IndexKeys {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn asc(mut self, field: impl Into<String>) -> Self {
        self.0.push((field.into(), Direction::Ascending));
        self
    }

    pub fn desc(mut self, field: impl Into<String>) -> Self {
        self.0.push((field.into(), Direction::Descending));
        self
    }

    /// Name the server assigns when none is given, e.g. `entity_type_1_entity_id_1`.
    pub fn default_name(&self) -> String {
        self.0
            .iter()
            .map(|(field, dir)| format!("{}_{}", field, dir.as_i32()))
            .collect::<Vec<_>>()
            .join("_")
    }

    pub fn to_document(&self) -> Result<Document, DbError> {
        if self.0.is_empty() {
            return Err(DbError::InvalidIndex("index has no key fields".to_string()));
        }
        let mut doc = Document::new();
        for (field, dir) in &self.0 {
            if field.is_empty() {
                return Err(DbError::InvalidIndex("empty field name".to_string()));
            }
            if doc.contains_key(field) {
                return Err(DbError::InvalidIndex(format!(
                    "field '{field}' appears twice"
                )));
            }
            doc.insert(field.clone(), dir.as_i32());
        }
        Ok(doc)
    }

    /// Parse a key document as reported by the server. Text, hashed and
    /// other special index kinds are rejected.
    pub fn from_document(doc: &Document) -> Result<Self, DbError> {
        let mut keys = Vec::with_capacity(doc.len());
        for (field, value) in doc {
            let dir = Direction::from_bson(value).ok_or_else(|| {
                DbError::InvalidIndex(format!("unsupported key '{field}': {value}"))
            })?;
            keys.push((field.clone(), dir));
        }
        Ok(Self(keys))
    }
}

impl Default for IndexKeys {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for IndexKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{ ")?;
        for (i, (field, dir)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", field, dir.as_i32())?;
        }
        f.write_str(" }")
    }
}

/// An index as it exists on a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexSpec {
    pub name: String,
    pub keys: IndexKeys,
}

impl IndexSpec {
    pub fn from_keys(keys: IndexKeys) -> Self {
        Self {
            name: keys.default_name(),
            keys,
        }
    }
}
