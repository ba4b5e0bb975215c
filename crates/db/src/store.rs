//! Storage seam between the bootstrap steps and the document store.

use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use xunimpay_authz::{Principal, PrincipalInfo};

use crate::error::DbError;
use crate::index::{IndexKeys, IndexSpec};

/// Operations the bootstrap needs from a document store bound to one
/// logical database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Name of the logical database this store is bound to.
    fn database(&self) -> &str;

    /// Persist a new principal in the user catalog of the bound database.
    async fn create_principal(&self, principal: &Principal) -> Result<(), DbError>;

    /// Look up a principal defined on the bound database.
    async fn find_principal(&self, user: &str) -> Result<Option<PrincipalInfo>, DbError>;

    /// Create a secondary index and return its name. Creating an index that
    /// already exists with the same keys is a no-op.
    async fn create_index(&self, collection: &str, keys: &IndexKeys) -> Result<String, DbError>;

    /// Secondary indexes on a collection; the implicit `_id_` index is not
    /// reported. A missing collection has no indexes.
    async fn list_indexes(&self, collection: &str) -> Result<Vec<IndexSpec>, DbError>;

    /// Append a document, returning its `_id`.
    async fn insert_one(&self, collection: &str, document: Document) -> Result<Bson, DbError>;

    /// Documents matching an equality filter; dotted paths address nested fields.
    async fn find(&self, collection: &str, filter: Document) -> Result<Vec<Document>, DbError>;

    async fn count_documents(&self, collection: &str, filter: Document) -> Result<u64, DbError>;
}
