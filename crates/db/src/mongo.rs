//! MongoDB-backed document store.

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::ErrorKind;
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, Database, IndexModel};
use xunimpay_authz::{Principal, PrincipalInfo, Role, RoleGrant};

use crate::error::DbError;
use crate::index::{IndexKeys, IndexSpec};
use crate::store::DocumentStore;

/// Server error code for `createUser` on an existing user.
const USER_ALREADY_EXISTS: i32 = 51003;
/// Server error code for `listIndexes` on a missing collection.
const NAMESPACE_NOT_FOUND: i32 = 26;
const ID_INDEX: &str = "_id_";
const ADMIN_DB: &str = "admin";

/// Connection parameters for [`MongoStore::connect`].
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub uri: String,
    pub database: String,
    pub app_name: Option<String>,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    /// Connect, bind to `options.database`, and ping so an unreachable
    /// server fails here rather than on the first bootstrap step.
    pub async fn connect(options: &ConnectOptions) -> Result<Self, DbError> {
        let mut client_options = ClientOptions::parse(&options.uri).await?;
        client_options.app_name = options.app_name.clone();
        client_options.connect_timeout = Some(options.connect_timeout);
        client_options.server_selection_timeout = Some(options.connect_timeout);

        let client = Client::with_options(client_options)?;
        let admin = Self {
            db: client.database(ADMIN_DB),
            client,
        };
        admin.db.run_command(doc! { "ping": 1 }).await?;
        let store = admin.select_database(&options.database);

        tracing::info!(
            target: "xunimpay-db",
            database = %options.database,
            "connected to mongodb"
        );
        Ok(store)
    }

    /// Bind to a sibling database on the same connection.
    pub fn select_database(&self, name: &str) -> Self {
        Self {
            client: self.client.clone(),
            db: self.client.database(name),
        }
    }

    fn collection(&self, name: &str) -> Collection<Document> {
        self.db.collection::<Document>(name)
    }
}

fn command_code(err: &mongodb::error::Error) -> Option<i32> {
    match err.kind.as_ref() {
        ErrorKind::Command(command) => Some(command.code),
        _ => None,
    }
}

/// Secondary index described by a `listIndexes` entry. The `_id_` index
/// and special kinds (text, hashed, geo) added by other writers are skipped.
fn secondary_index(keys: &Document, name: Option<String>) -> Option<IndexSpec> {
    let keys = match IndexKeys::from_document(keys) {
        Ok(keys) => keys,
        Err(err) => {
            tracing::debug!(
                target: "xunimpay-db",
                index = name.as_deref().unwrap_or("<unnamed>"),
                error = %err,
                "skipping index with unsupported key kinds"
            );
            return None;
        }
    };
    let name = name.unwrap_or_else(|| keys.default_name());
    if name == ID_INDEX {
        return None;
    }
    Some(IndexSpec { name, keys })
}

fn parse_principal(doc: &Document) -> Result<PrincipalInfo, DbError> {
    let user = doc
        .get_str("user")
        .map_err(|e| DbError::Decode(format!("usersInfo.user: {e}")))?;
    let db = doc
        .get_str("db")
        .map_err(|e| DbError::Decode(format!("usersInfo.db: {e}")))?;
    let roles = doc
        .get_array("roles")
        .map_err(|e| DbError::Decode(format!("usersInfo.roles: {e}")))?
        .iter()
        .map(|entry| match entry {
            Bson::Document(grant) => {
                let role = grant
                    .get_str("role")
                    .map_err(|e| DbError::Decode(format!("role: {e}")))?;
                let db = grant
                    .get_str("db")
                    .map_err(|e| DbError::Decode(format!("role db: {e}")))?;
                Ok(RoleGrant::new(Role::from(role), db))
            }
            other => Err(DbError::Decode(format!("role entry {other}"))),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(PrincipalInfo {
        user: user.to_string(),
        db: db.to_string(),
        roles,
    })
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn database(&self) -> &str {
        self.db.name()
    }

    async fn create_principal(&self, principal: &Principal) -> Result<(), DbError> {
        let roles: Vec<Document> = principal
            .roles
            .iter()
            .map(|grant| doc! { "role": grant.role.as_str(), "db": grant.db.as_str() })
            .collect();
        let command = doc! {
            "createUser": principal.user.as_str(),
            "pwd": principal.password.expose(),
            "roles": roles,
        };

        match self.db.run_command(command).await {
            Ok(_) => Ok(()),
            Err(err) if command_code(&err) == Some(USER_ALREADY_EXISTS) => {
                Err(DbError::PrincipalExists {
                    user: principal.user.clone(),
                    db: self.db.name().to_string(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_principal(&self, user: &str) -> Result<Option<PrincipalInfo>, DbError> {
        let reply = self.db.run_command(doc! { "usersInfo": user }).await?;
        let users = reply
            .get_array("users")
            .map_err(|e| DbError::Decode(format!("usersInfo reply: {e}")))?;
        match users.first() {
            Some(Bson::Document(entry)) => parse_principal(entry).map(Some),
            Some(other) => Err(DbError::Decode(format!("usersInfo entry {other}"))),
            None => Ok(None),
        }
    }

    async fn create_index(&self, collection: &str, keys: &IndexKeys) -> Result<String, DbError> {
        let model = IndexModel::builder().keys(keys.to_document()?).build();
        let result = self.collection(collection).create_index(model).await?;
        Ok(result.index_name)
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexSpec>, DbError> {
        let cursor = match self.collection(collection).list_indexes().await {
            Ok(cursor) => cursor,
            Err(err) if command_code(&err) == Some(NAMESPACE_NOT_FOUND) => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        let models: Vec<IndexModel> = cursor.try_collect().await?;

        Ok(models
            .into_iter()
            .filter_map(|model| {
                let name = model.options.and_then(|opts| opts.name);
                secondary_index(&model.keys, name)
            })
            .collect())
    }

    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, DbError> {
        let result = self.collection(collection).insert_one(document).await?;
        Ok(result.inserted_id)
    }

    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>, DbError> {
        let cursor = self.collection(collection).find(filter).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn count_documents(&self, collection: &str, filter: Document) -> Result<u64, DbError> {
        Ok(self.collection(collection).count_documents(filter).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_users_info_entry() {
        let entry = doc! {
            "_id": "xunimpay_audit.xunimpay_user",
            "user": "xunimpay_user",
            "db": "xunimpay_audit",
            "roles": [ { "role": "readWrite", "db": "xunimpay_audit" } ],
        };
        let info = parse_principal(&entry).unwrap();
        assert_eq!(info.user, "xunimpay_user");
        assert!(info.has_role(&Role::ReadWrite, "xunimpay_audit"));
    }

    #[test]
    fn secondary_index_skips_id_and_special_kinds() {
        assert!(secondary_index(&doc! { "_id": 1 }, Some("_id_".to_string())).is_none());
        assert!(secondary_index(&doc! { "details": "text" }, Some("details_text".to_string())).is_none());
        assert!(secondary_index(&doc! { "entity_id": "hashed" }, None).is_none());

        let spec = secondary_index(&doc! { "timestamp": -1 }, Some("timestamp_-1".to_string()))
            .unwrap();
        assert_eq!(spec.keys, IndexKeys::new().desc("timestamp"));

        let unnamed = secondary_index(&doc! { "entity_type": 1, "entity_id": 1 }, None).unwrap();
        assert_eq!(unnamed.name, "entity_type_1_entity_id_1");
    }

    #[test]
    fn rejects_malformed_role_entries() {
        let entry = doc! {
            "user": "xunimpay_user",
            "db": "xunimpay_audit",
            "roles": [ "readWrite" ],
        };
        assert!(matches!(parse_principal(&entry), Err(DbError::Decode(_))));
    }
}
