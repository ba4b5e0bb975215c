pub mod models;

use anyhow::Context;
use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use xunimpay_db::IndexKeys;
use xunimpay_kernel::settings::{InitProfile, Settings};
use xunimpay_kernel::{InitCtx, Migration, MigrationStep, Module};

use models::{Action, AuditLogRecord, EntityType};

/// Collection holding audit records.
pub const COLLECTION: &str = "audit_logs";

const SEED_ENTITY_ID: &str = "INIT";
const BASIC_DESCRIPTION: &str = "Sistema inicializado com sucesso";
const APPLICATION_DESCRIPTION: &str = "XunimPay System inicializado com sucesso";

/// Secondary indexes on `audit_logs`, keyed by migration id.
pub fn index_plan() -> Vec<(&'static str, IndexKeys)> {
    vec![
        (
            "001_entity_lookup_index",
            IndexKeys::new().asc("entity_type").asc("entity_id"),
        ),
        ("002_timestamp_index", IndexKeys::new().desc("timestamp")),
        ("003_user_id_index", IndexKeys::new().asc("user_id")),
        ("004_action_index", IndexKeys::new().asc("action")),
    ]
}

/// Filter matching the SYSTEM/INIT/CREATE seed records.
pub fn seed_filter() -> Document {
    doc! {
        "entity_type": "SYSTEM",
        "entity_id": SEED_ENTITY_ID,
        "action": "CREATE",
    }
}

/// Seed record marking system initialization. Only the application profile
/// stamps a version.
pub fn seed_record(profile: InitProfile, seed_version: &str) -> AuditLogRecord {
    let record = AuditLogRecord::new(EntityType::System, SEED_ENTITY_ID, Action::Create);
    match profile {
        InitProfile::Basic => record.with_detail("description", BASIC_DESCRIPTION),
        InitProfile::Application => record
            .with_detail("description", APPLICATION_DESCRIPTION)
            .with_detail("version", seed_version),
    }
}

/// Indexes and seed record for the audit log collection
pub struct AuditLogModule;

impl AuditLogModule {
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Module for AuditLogModule {
    fn name(&self) -> &'static str {
        "audit_logs"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            module = self.name(),
            database = ctx.store.database(),
            collection = COLLECTION,
            "audit log module initialized"
        );
        Ok(())
    }

    fn migrations(&self, settings: &Settings) -> anyhow::Result<Vec<Migration>> {
        let mut migrations: Vec<Migration> = index_plan()
            .into_iter()
            .map(|(id, keys)| Migration {
                id,
                step: MigrationStep::CreateIndex {
                    collection: COLLECTION,
                    keys,
                },
            })
            .collect();

        // No existence check: every run appends another seed record.
        let seed = seed_record(settings.bootstrap.profile, &settings.bootstrap.seed_version)
            .to_document()
            .with_context(|| "failed to encode seed audit record")?;
        migrations.push(Migration {
            id: "005_seed_record",
            step: MigrationStep::InsertOne {
                collection: COLLECTION,
                document: seed,
            },
        });

        Ok(migrations)
    }
}

/// Create a new instance of the audit log module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(AuditLogModule::new())
}
