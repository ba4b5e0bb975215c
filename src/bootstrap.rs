//! The bootstrap procedure: apply every module's migrations against one
//! logical database, then report what exists.

use std::fmt;

use anyhow::{bail, Context};
use serde::Serialize;
use tracing::Instrument;
use uuid::Uuid;
use xunimpay_authz::PrincipalInfo;
use xunimpay_db::{DocumentStore, IndexKeys, IndexSpec};
use xunimpay_kernel::settings::{InitProfile, Settings};
use xunimpay_kernel::{AppliedMigration, InitCtx, Migration, ModuleRegistry};

use crate::modules;
use crate::modules::audit::{self, COLLECTION};

/// Success line printed once every step has completed.
pub fn success_message(profile: InitProfile) -> &'static str {
    match profile {
        InitProfile::Basic => "MongoDB inicializado com sucesso!",
        InitProfile::Application => "MongoDB inicializado com sucesso para XunimPay!",
    }
}

#[derive(Debug)]
pub struct BootstrapReport {
    pub run_id: Uuid,
    pub database: String,
    pub applied: Vec<AppliedMigration>,
    pub message: &'static str,
}

/// Bootstrap state read back from the store.
#[derive(Debug, Serialize)]
pub struct VerifyReport {
    pub database: String,
    pub profile: &'static str,
    pub indexes: Vec<IndexSpec>,
    pub missing_indexes: Vec<IndexKeys>,
    pub seed_records: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<PrincipalInfo>,
    pub principal_ok: bool,
}

impl VerifyReport {
    pub fn is_healthy(&self) -> bool {
        self.missing_indexes.is_empty() && self.seed_records >= 1 && self.principal_ok
    }
}

impl fmt::Display for VerifyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "database: {} (profile {})", self.database, self.profile)?;
        for spec in &self.indexes {
            writeln!(f, "  index {} {}", spec.name, spec.keys)?;
        }
        for keys in &self.missing_indexes {
            writeln!(f, "  missing index {keys}")?;
        }
        writeln!(f, "  seed records: {}", self.seed_records)?;
        match &self.principal {
            Some(info) => {
                let roles: Vec<String> = info.roles.iter().map(|g| g.to_string()).collect();
                writeln!(f, "  principal {} [{}]", info.user, roles.join(", "))?;
            }
            None if self.profile == InitProfile::Application.as_str() => {
                writeln!(f, "  principal missing")?;
            }
            None => {}
        }
        write!(f, "status: {}", if self.is_healthy() { "ok" } else { "incomplete" })
    }
}

pub struct Bootstrapper {
    registry: ModuleRegistry,
    settings: Settings,
}

impl Bootstrapper {
    pub fn new(settings: Settings) -> Self {
        let mut registry = ModuleRegistry::new();
        modules::register_all(&mut registry);
        Self { registry, settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Ordered migrations this configuration would apply.
    pub fn plan(&self) -> anyhow::Result<Vec<(String, Migration)>> {
        self.registry.collect_migrations(&self.settings)
    }

    /// Run the whole procedure. Any failure aborts; earlier steps stay applied.
    pub async fn run(&self, store: &dyn DocumentStore) -> anyhow::Result<BootstrapReport> {
        self.ensure_bound(store)?;

        let run_id = Uuid::now_v7();
        let span = tracing::info_span!("bootstrap", run_id = %run_id, database = store.database());

        async {
            let ctx = InitCtx {
                settings: &self.settings,
                store,
            };
            self.registry.init_modules(&ctx).await?;
            let applied = self.registry.apply_migrations(&ctx).await?;

            tracing::info!(steps = applied.len(), "bootstrap complete");
            Ok::<_, anyhow::Error>(BootstrapReport {
                run_id,
                database: store.database().to_string(),
                applied,
                message: success_message(self.settings.bootstrap.profile),
            })
        }
        .instrument(span)
        .await
    }

    /// Read back indexes, seed records and the principal.
    pub async fn verify(&self, store: &dyn DocumentStore) -> anyhow::Result<VerifyReport> {
        self.ensure_bound(store)?;
        let profile = self.settings.bootstrap.profile;

        let indexes = store
            .list_indexes(COLLECTION)
            .await
            .with_context(|| format!("failed to list indexes on '{COLLECTION}'"))?;
        let missing_indexes: Vec<IndexKeys> = audit::index_plan()
            .into_iter()
            .map(|(_, keys)| keys)
            .filter(|keys| !indexes.iter().any(|spec| &spec.keys == keys))
            .collect();

        let seed_records = store
            .count_documents(COLLECTION, audit::seed_filter())
            .await
            .with_context(|| "failed to count seed records")?;
        if seed_records > 1 {
            tracing::warn!(
                seed_records,
                "seed record inserted by more than one run; duplicates are kept"
            );
        }

        let (principal, principal_ok) = if profile.creates_principal() {
            let principal = store
                .find_principal(&self.settings.principal.user)
                .await
                .with_context(|| "failed to look up application principal")?;
            let ok = principal.as_ref().is_some_and(|info| {
                info.has_role(&self.settings.principal.role, store.database())
            });
            (principal, ok)
        } else {
            (None, true)
        };

        Ok(VerifyReport {
            database: store.database().to_string(),
            profile: profile.as_str(),
            indexes,
            missing_indexes,
            seed_records,
            principal,
            principal_ok,
        })
    }

    fn ensure_bound(&self, store: &dyn DocumentStore) -> anyhow::Result<()> {
        if store.database() != self.settings.database.name {
            bail!(
                "store is bound to database '{}' but settings target '{}'",
                store.database(),
                self.settings.database.name
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xunimpay_authz::{Password, Principal, Role};
    use xunimpay_db::MemoryStore;
    use xunimpay_kernel::StepOutcome;

    use crate::modules::audit::models::{Action, AuditLogRecord};

    fn settings(profile: InitProfile) -> Settings {
        let mut settings = Settings::default();
        settings.bootstrap.profile = profile;
        settings
    }

    async fn seeds(store: &MemoryStore) -> Vec<AuditLogRecord> {
        store
            .find(COLLECTION, audit::seed_filter())
            .await
            .unwrap()
            .into_iter()
            .map(|doc| AuditLogRecord::from_document(doc).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn fresh_database_gets_four_indexes_and_one_seed() {
        let store = MemoryStore::new("xunimpay_audit");
        let bootstrapper = Bootstrapper::new(settings(InitProfile::Basic));

        let report = bootstrapper.run(&store).await.unwrap();
        assert_eq!(report.message, "MongoDB inicializado com sucesso!");
        assert_eq!(report.database, "xunimpay_audit");

        let indexes = store.list_indexes(COLLECTION).await.unwrap();
        let keys: Vec<IndexKeys> = indexes.into_iter().map(|spec| spec.keys).collect();
        let expected: Vec<IndexKeys> = audit::index_plan().into_iter().map(|(_, k)| k).collect();
        assert_eq!(keys, expected);

        assert_eq!(store.count_documents(COLLECTION, Default::default()).await.unwrap(), 1);
        let seeds = seeds(&store).await;
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].action, Action::Create);
        assert!(!seeds[0].details.contains_key("version"));
    }

    #[tokio::test]
    async fn basic_profile_creates_no_principal() {
        let store = MemoryStore::new("xunimpay_audit");
        Bootstrapper::new(settings(InitProfile::Basic))
            .run(&store)
            .await
            .unwrap();
        assert_eq!(store.principal_count().await, 0);
    }

    #[tokio::test]
    async fn application_profile_creates_principal_first() {
        let store = MemoryStore::new("xunimpay_audit");
        let report = Bootstrapper::new(settings(InitProfile::Application))
            .run(&store)
            .await
            .unwrap();

        assert_eq!(report.message, "MongoDB inicializado com sucesso para XunimPay!");
        assert_eq!(
            report.applied[0].outcome,
            StepOutcome::PrincipalCreated {
                user: "xunimpay_user".to_string()
            }
        );
        assert_eq!(report.applied.len(), 6);

        assert_eq!(store.principal_count().await, 1);
        let info = store.find_principal("xunimpay_user").await.unwrap().unwrap();
        assert_eq!(info.roles.len(), 1);
        assert!(info.has_role(&Role::ReadWrite, "xunimpay_audit"));

        let seeds = seeds(&store).await;
        assert_eq!(seeds.len(), 1);
        assert_eq!(seeds[0].details.get_str("version").unwrap(), "1.0.0");
    }

    #[tokio::test]
    async fn second_basic_run_duplicates_seed_record() {
        let store = MemoryStore::new("xunimpay_audit");
        let bootstrapper = Bootstrapper::new(settings(InitProfile::Basic));

        bootstrapper.run(&store).await.unwrap();
        bootstrapper.run(&store).await.unwrap();

        assert_eq!(seeds(&store).await.len(), 2);
        assert_eq!(store.list_indexes(COLLECTION).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn second_application_run_fails_on_existing_principal() {
        let store = MemoryStore::new("xunimpay_audit");
        let bootstrapper = Bootstrapper::new(settings(InitProfile::Application));

        bootstrapper.run(&store).await.unwrap();
        let err = bootstrapper.run(&store).await.unwrap_err();

        assert!(format!("{err:#}").contains("principal 'xunimpay_user' already exists"));
        assert_eq!(seeds(&store).await.len(), 1);
    }

    #[tokio::test]
    async fn refuses_store_bound_to_other_database() {
        let store = MemoryStore::new("admin");
        let err = Bootstrapper::new(Settings::default())
            .run(&store)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("bound to database 'admin'"));
    }

    #[tokio::test]
    async fn verify_reports_fresh_database_incomplete() {
        let store = MemoryStore::new("xunimpay_audit");
        let report = Bootstrapper::new(Settings::default())
            .verify(&store)
            .await
            .unwrap();

        assert_eq!(report.missing_indexes.len(), 4);
        assert_eq!(report.seed_records, 0);
        assert!(report.principal.is_none());
        assert!(!report.is_healthy());
        assert!(report.to_string().ends_with("status: incomplete"));
    }

    #[tokio::test]
    async fn verify_after_run_is_healthy() {
        let store = MemoryStore::new("xunimpay_audit");
        let bootstrapper = Bootstrapper::new(Settings::default());
        bootstrapper.run(&store).await.unwrap();

        let report = bootstrapper.verify(&store).await.unwrap();
        assert!(report.missing_indexes.is_empty());
        assert_eq!(report.indexes.len(), 4);
        assert_eq!(report.seed_records, 1);
        assert!(report.principal_ok);
        assert!(report.is_healthy());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["principal"]["roles"][0]["role"], "readWrite");
        assert_eq!(json["profile"], "application");
    }

    #[tokio::test]
    async fn verify_counts_duplicate_seeds_and_stays_healthy() {
        let store = MemoryStore::new("xunimpay_audit");
        let bootstrapper = Bootstrapper::new(settings(InitProfile::Basic));
        bootstrapper.run(&store).await.unwrap();
        bootstrapper.run(&store).await.unwrap();

        let report = bootstrapper.verify(&store).await.unwrap();
        assert_eq!(report.seed_records, 2);
        assert!(report.missing_indexes.is_empty());
        assert!(report.is_healthy());
    }

    #[tokio::test]
    async fn verify_basic_profile_needs_no_principal() {
        let store = MemoryStore::new("xunimpay_audit");
        let bootstrapper = Bootstrapper::new(settings(InitProfile::Basic));
        bootstrapper.run(&store).await.unwrap();

        let report = bootstrapper.verify(&store).await.unwrap();
        assert!(report.principal.is_none());
        assert!(report.principal_ok);
        assert!(report.is_healthy());
        assert!(!report.to_string().contains("principal"));
    }

    #[tokio::test]
    async fn verify_flags_principal_with_wrong_role() {
        let store = MemoryStore::new("xunimpay_audit");
        store
            .create_principal(&Principal::scoped(
                "xunimpay_user",
                Password::new("x"),
                Role::Read,
                "xunimpay_audit",
            ))
            .await
            .unwrap();
        // indexes and seed without the principal step
        Bootstrapper::new(settings(InitProfile::Basic))
            .run(&store)
            .await
            .unwrap();

        let report = Bootstrapper::new(settings(InitProfile::Application))
            .verify(&store)
            .await
            .unwrap();
        assert!(report.missing_indexes.is_empty());
        assert_eq!(report.seed_records, 1);
        assert!(report.principal.is_some());
        assert!(!report.principal_ok);
        assert!(!report.is_healthy());
        assert!(report.to_string().contains("principal xunimpay_user [read@xunimpay_audit]"));
    }

    #[test]
    fn plan_lists_principal_indexes_then_seed() {
        let plan = Bootstrapper::new(Settings::default()).plan().unwrap();
        let ids: Vec<&str> = plan.iter().map(|(_, m)| m.id).collect();
        assert_eq!(
            ids,
            vec![
                "001_application_principal",
                "001_entity_lookup_index",
                "002_timestamp_index",
                "003_user_id_index",
                "004_action_index",
                "005_seed_record",
            ]
        );
    }
}
