//! In-process document store.
//!
//! Mirrors the server behaviour the bootstrap depends on: default index
//! names, identical index re-creation as a no-op, duplicate principal
//! rejection, and `_id` assignment on insert. Clones share state, so a
//! second "run" against the same database can be simulated.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::{oid::ObjectId, Bson, Document};
use tokio::sync::RwLock;
use xunimpay_authz::{Principal, PrincipalInfo};

use crate::error::DbError;
use crate::index::{IndexKeys, IndexSpec};
use crate::store::DocumentStore;

#[derive(Debug, Default)]
struct MemoryCollection {
    indexes: Vec<IndexSpec>,
    documents: Vec<Document>,
}

#[derive(Debug, Default)]
struct MemoryState {
    principals: BTreeMap<String, PrincipalInfo>,
    collections: BTreeMap<String, MemoryCollection>,
}

#[derive(Debug, Clone)]
pub struct MemoryStore {
    database: String,
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            state: Arc::new(RwLock::new(MemoryState::default())),
        }
    }

    /// Number of principals in the catalog.
    pub async fn principal_count(&self) -> usize {
        self.state.read().await.principals.len()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn database(&self) -> &str {
        &self.database
    }

    async fn create_principal(&self, principal: &Principal) -> Result<(), DbError> {
        let mut state = self.state.write().await;
        if state.principals.contains_key(&principal.user) {
            return Err(DbError::PrincipalExists {
                user: principal.user.clone(),
                db: self.database.clone(),
            });
        }
        state.principals.insert(
            principal.user.clone(),
            principal.info(self.database.clone()),
        );
        Ok(())
    }

    async fn find_principal(&self, user: &str) -> Result<Option<PrincipalInfo>, DbError> {
        Ok(self.state.read().await.principals.get(user).cloned())
    }

    async fn create_index(&self, collection: &str, keys: &IndexKeys) -> Result<String, DbError> {
        keys.to_document()?;
        let mut state = self.state.write().await;
        let coll = state.collections.entry(collection.to_string()).or_default();

        if let Some(existing) = coll.indexes.iter().find(|spec| &spec.keys == keys) {
            return Ok(existing.name.clone());
        }
        let spec = IndexSpec::from_keys(keys.clone());
        if coll.indexes.iter().any(|existing| existing.name == spec.name) {
            return Err(DbError::InvalidIndex(format!(
                "index name '{}' already used with different keys",
                spec.name
            )));
        }
        let name = spec.name.clone();
        coll.indexes.push(spec);
        Ok(name)
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexSpec>, DbError> {
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(collection)
            .map(|coll| coll.indexes.clone())
            .unwrap_or_default())
    }

    async fn insert_one(&self, collection: &str, mut document: Document) -> Result<Bson, DbError> {
        let id = match document.get("_id") {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                document.insert("_id", id.clone());
                id
            }
        };
        let mut state = self.state.write().await;
        let coll = state.collections.entry(collection.to_string()).or_default();
        if coll.documents.iter().any(|doc| doc.get("_id") == Some(&id)) {
            return Err(DbError::Other(anyhow::anyhow!(
                "duplicate _id {id} in collection '{collection}'"
            )));
        }
        coll.documents.push(document);
        Ok(id)
    }

    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>, DbError> {
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(collection)
            .map(|coll| {
                coll.documents
                    .iter()
                    .filter(|doc| matches_filter(doc, &filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn count_documents(&self, collection: &str, filter: Document) -> Result<u64, DbError> {
        Ok(self.find(collection, filter).await?.len() as u64)
    }
}

fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(path, expected)| lookup_path(doc, path) == Some(expected))
}

fn lookup_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            _ => return None,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;
    use xunimpay_authz::{Password, Role};

    fn principal() -> Principal {
        Principal::scoped(
            "xunimpay_user",
            Password::new("xunim123"),
            Role::ReadWrite,
            "xunimpay_audit",
        )
    }

    #[tokio::test]
    async fn duplicate_principal_is_rejected() {
        let store = MemoryStore::new("xunimpay_audit");
        store.create_principal(&principal()).await.unwrap();

        let err = store.create_principal(&principal()).await.unwrap_err();
        assert!(matches!(err, DbError::PrincipalExists { ref user, .. } if user == "xunimpay_user"));
        assert_eq!(store.principal_count().await, 1);
    }

    #[tokio::test]
    async fn recreating_identical_index_is_noop() {
        let store = MemoryStore::new("xunimpay_audit");
        let keys = IndexKeys::new().desc("timestamp");

        let first = store.create_index("audit_logs", &keys).await.unwrap();
        let second = store.create_index("audit_logs", &keys).await.unwrap();

        assert_eq!(first, "timestamp_-1");
        assert_eq!(first, second);
        assert_eq!(store.list_indexes("audit_logs").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn missing_collection_has_no_indexes() {
        let store = MemoryStore::new("xunimpay_audit");
        assert!(store.list_indexes("audit_logs").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn insert_assigns_object_id() {
        let store = MemoryStore::new("xunimpay_audit");
        let id = store
            .insert_one("audit_logs", doc! { "action": "CREATE" })
            .await
            .unwrap();
        assert!(matches!(id, Bson::ObjectId(_)));

        let docs = store.find("audit_logs", doc! {}).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get("_id"), Some(&id));
    }

    #[tokio::test]
    async fn filters_match_nested_paths() {
        let store = MemoryStore::new("xunimpay_audit");
        store
            .insert_one(
                "audit_logs",
                doc! { "action": "CREATE", "details": { "version": "1.0.0" } },
            )
            .await
            .unwrap();
        store
            .insert_one("audit_logs", doc! { "action": "CREATE", "details": {} })
            .await
            .unwrap();

        let versioned = store
            .count_documents("audit_logs", doc! { "details.version": "1.0.0" })
            .await
            .unwrap();
        let created = store
            .count_documents("audit_logs", doc! { "action": "CREATE" })
            .await
            .unwrap();
        assert_eq!(versioned, 1);
        assert_eq!(created, 2);
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = MemoryStore::new("xunimpay_audit");
        let other = store.clone();
        other
            .insert_one("audit_logs", doc! { "action": "VIEW" })
            .await
            .unwrap();
        assert_eq!(store.count_documents("audit_logs", doc! {}).await.unwrap(), 1);
    }
}
