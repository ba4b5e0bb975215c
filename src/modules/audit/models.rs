use mongodb::bson::{self, oid::ObjectId, Bson, DateTime, Document};
use serde::{Deserialize, Serialize};

/// Category of the entity an audit record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    User,
    Account,
    Payment,
    System,
}

/// Verb recorded by an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Create,
    Update,
    Delete,
    View,
    Login,
    Logout,
}

/// One document of the `audit_logs` collection. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogRecord {
    /// Assigned by the store on insert
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub entity_type: EntityType,
    pub entity_id: String,
    pub action: Action,
    pub timestamp: DateTime,
    /// Freeform payload
    #[serde(default)]
    pub details: Document,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl AuditLogRecord {
    /// Record stamped with the current time and empty details.
    pub fn new(entity_type: EntityType, entity_id: impl Into<String>, action: Action) -> Self {
        Self {
            id: None,
            entity_type,
            entity_id: entity_id.into(),
            action,
            timestamp: DateTime::now(),
            details: Document::new(),
            user_id: None,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Bson>) -> Self {
        self.details.insert(key, value);
        self
    }

    pub fn to_document(&self) -> Result<Document, bson::ser::Error> {
        bson::to_document(self)
    }

    pub fn from_document(doc: Document) -> Result<Self, bson::de::Error> {
        bson::from_document(doc)
    }
}
