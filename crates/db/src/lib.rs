//! Document store access for the XunimPay audit database.
//!
//! [`DocumentStore`] is the seam the bootstrap steps run against.
//! [`MongoStore`] talks to a live server; [`MemoryStore`] keeps everything
//! in process for tests and dry runs.

pub mod error;
pub mod index;
pub mod memory;
pub mod mongo;
pub mod store;

pub use error::DbError;
pub use index::{Direction, IndexKeys, IndexSpec};
pub use memory::MemoryStore;
pub use mongo::{ConnectOptions, MongoStore};
pub use store::DocumentStore;

/// Re-exported so callers build documents with the same BSON version.
pub use mongodb::bson;
