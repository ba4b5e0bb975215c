use std::fmt;

use async_trait::async_trait;
use mongodb::bson::Document;
use xunimpay_authz::Principal;
use xunimpay_db::{DocumentStore, IndexKeys};

use crate::settings::Settings;

/// Context provided to modules during initialization
pub struct InitCtx<'a> {
    pub settings: &'a Settings,
    pub store: &'a dyn DocumentStore,
}

/// One bootstrap action against the document store.
#[derive(Debug, Clone)]
pub enum MigrationStep {
    CreatePrincipal(Principal),
    CreateIndex {
        collection: &'static str,
        keys: IndexKeys,
    },
    InsertOne {
        collection: &'static str,
        document: Document,
    },
}

impl fmt::Display for MigrationStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationStep::CreatePrincipal(principal) => {
                let roles: Vec<String> = principal.roles.iter().map(|g| g.to_string()).collect();
                write!(
                    f,
                    "createUser {} roles [{}]",
                    principal.user,
                    roles.join(", ")
                )
            }
            MigrationStep::CreateIndex { collection, keys } => {
                write!(f, "{collection}.createIndex({keys})")
            }
            MigrationStep::InsertOne {
                collection,
                document,
            } => {
                let fields: Vec<&str> = document.keys().map(String::as_str).collect();
                write!(f, "{collection}.insertOne({{ {} }})", fields.join(", "))
            }
        }
    }
}

/// Migration definition for modules
#[derive(Debug, Clone)]
pub struct Migration {
    pub id: &'static str,
    pub step: MigrationStep,
}

/// Core module trait that all bootstrap modules must implement
#[async_trait]
pub trait Module: Sync + Send {
    /// Unique name for this module
    fn name(&self) -> &'static str;

    /// Initialize the module with the provided context
    /// Called before any migration is applied
    async fn init(&self, _ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Return migrations contributed by this module for the given settings.
    /// Documents are built at call time, so timestamps reflect the run.
    fn migrations(&self, _settings: &Settings) -> anyhow::Result<Vec<Migration>> {
        Ok(vec![])
    }
}
