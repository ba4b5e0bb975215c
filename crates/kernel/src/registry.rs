use anyhow::Context;
use mongodb::bson::Bson;
use std::sync::Arc;
use xunimpay_db::DocumentStore;

use crate::module::{InitCtx, Migration, MigrationStep, Module};
use crate::settings::Settings;

/// Core module order; the principal must exist before collections are touched.
const CORE_MODULE_ORDER: &[&str] = &[
    "authz", // Application principal
];

/// Result of applying one migration step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    PrincipalCreated { user: String },
    IndexCreated { collection: String, name: String },
    DocumentInserted { collection: String, id: Bson },
}

/// A migration that ran, tagged with the module that contributed it.
#[derive(Debug, Clone)]
pub struct AppliedMigration {
    pub module: String,
    pub id: &'static str,
    pub outcome: StepOutcome,
}

/// Module registry for managing module lifecycle with core/custom separation
pub struct ModuleRegistry {
    core_modules: Vec<Arc<dyn Module>>,
    custom_modules: Vec<Arc<dyn Module>>,
}

impl ModuleRegistry {
    /// Create a new module registry
    pub fn new() -> Self {
        Self {
            core_modules: Vec::new(),
            custom_modules: Vec::new(),
        }
    }

    /// Register a core module with the registry
    pub fn register_core(&mut self, module: Arc<dyn Module>) {
        self.core_modules.push(module);
    }

    /// Register a custom module with the registry
    pub fn register_custom(&mut self, module: Arc<dyn Module>) {
        self.custom_modules.push(module);
    }

    /// Modules in execution order: core modules by `CORE_MODULE_ORDER`,
    /// then custom modules in registration order.
    pub fn modules(&self) -> Vec<&Arc<dyn Module>> {
        let mut ordered = Vec::new();
        for &module_name in CORE_MODULE_ORDER {
            ordered.extend(self.core_modules.iter().filter(|m| m.name() == module_name));
        }
        ordered.extend(self.custom_modules.iter());
        ordered
    }

    /// Initialize every module in execution order
    pub async fn init_modules(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        tracing::info!(
            "initializing modules, core order: {:?}",
            CORE_MODULE_ORDER
        );

        for module in self.modules() {
            tracing::info!(module = module.name(), "initializing module");

            module
                .init(ctx)
                .await
                .with_context(|| format!("failed to initialize module '{}'", module.name()))?;
        }

        Ok(())
    }

    /// Collect all migrations in execution order. Within a module,
    /// migrations are ordered by id.
    pub fn collect_migrations(
        &self,
        settings: &Settings,
    ) -> anyhow::Result<Vec<(String, Migration)>> {
        let mut migrations = Vec::new();

        for module in self.modules() {
            let mut own = module.migrations(settings).with_context(|| {
                format!("failed to build migrations for module '{}'", module.name())
            })?;
            own.sort_by(|a, b| a.id.cmp(b.id));
            migrations.extend(own.into_iter().map(|m| (module.name().to_string(), m)));
        }

        Ok(migrations)
    }

    /// Apply every migration in order. The first failure aborts the run;
    /// nothing already applied is rolled back.
    pub async fn apply_migrations(
        &self,
        ctx: &InitCtx<'_>,
    ) -> anyhow::Result<Vec<AppliedMigration>> {
        let migrations = self.collect_migrations(ctx.settings)?;
        let mut applied = Vec::with_capacity(migrations.len());

        for (module, migration) in migrations {
            tracing::info!(module = %module, migration = migration.id, step = %migration.step, "applying migration");

            let outcome = apply_step(ctx.store, migration.step)
                .await
                .with_context(|| {
                    format!("migration '{}' of module '{}' failed", migration.id, module)
                })?;

            applied.push(AppliedMigration {
                module,
                id: migration.id,
                outcome,
            });
        }

        Ok(applied)
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

async fn apply_step(store: &dyn DocumentStore, step: MigrationStep) -> anyhow::Result<StepOutcome> {
    match step {
        MigrationStep::CreatePrincipal(principal) => {
            principal.validate()?;
            store.create_principal(&principal).await?;
            Ok(StepOutcome::PrincipalCreated {
                user: principal.user,
            })
        }
        MigrationStep::CreateIndex { collection, keys } => {
            let name = store.create_index(collection, &keys).await?;
            tracing::debug!(collection, index = %name, "index ready");
            Ok(StepOutcome::IndexCreated {
                collection: collection.to_string(),
                name,
            })
        }
        MigrationStep::InsertOne {
            collection,
            document,
        } => {
            let id = store.insert_one(collection, document).await?;
            Ok(StepOutcome::DocumentInserted {
                collection: collection.to_string(),
                id,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;
    use xunimpay_authz::{Password, Principal, Role};
    use xunimpay_db::{IndexKeys, MemoryStore};

    struct TestModule {
        name: &'static str,
        migrations: Vec<Migration>,
    }

    #[async_trait::async_trait]
    impl Module for TestModule {
        fn name(&self) -> &'static str {
            self.name
        }

        fn migrations(&self, _settings: &Settings) -> anyhow::Result<Vec<Migration>> {
            Ok(self.migrations.clone())
        }
    }

    fn principal_module() -> Arc<dyn Module> {
        Arc::new(TestModule {
            name: "authz",
            migrations: vec![Migration {
                id: "001_principal",
                step: MigrationStep::CreatePrincipal(Principal::scoped(
                    "svc",
                    Password::new("pw"),
                    Role::ReadWrite,
                    "xunimpay_audit",
                )),
            }],
        })
    }

    fn collection_module() -> Arc<dyn Module> {
        Arc::new(TestModule {
            name: "audit_logs",
            migrations: vec![
                Migration {
                    id: "002_seed",
                    step: MigrationStep::InsertOne {
                        collection: "audit_logs",
                        document: doc! { "action": "CREATE" },
                    },
                },
                Migration {
                    id: "001_index",
                    step: MigrationStep::CreateIndex {
                        collection: "audit_logs",
                        keys: IndexKeys::new().asc("action"),
                    },
                },
            ],
        })
    }

    #[test]
    fn test_module_registry_creation() {
        let registry = ModuleRegistry::new();
        assert!(registry.modules().is_empty());
    }

    #[test]
    fn test_migration_collection_orders_core_first_then_by_id() {
        let mut registry = ModuleRegistry::new();
        registry.register_custom(collection_module());
        registry.register_core(principal_module());

        let ids: Vec<_> = registry
            .collect_migrations(&Settings::default())
            .unwrap()
            .into_iter()
            .map(|(module, m)| format!("{module}/{}", m.id))
            .collect();
        assert_eq!(
            ids,
            vec!["authz/001_principal", "audit_logs/001_index", "audit_logs/002_seed"]
        );
    }

    #[tokio::test]
    async fn test_apply_migrations() {
        let mut registry = ModuleRegistry::new();
        registry.register_core(principal_module());
        registry.register_custom(collection_module());

        let settings = Settings::default();
        let store = MemoryStore::new("xunimpay_audit");
        let ctx = InitCtx {
            settings: &settings,
            store: &store,
        };

        registry.init_modules(&ctx).await.unwrap();
        let applied = registry.apply_migrations(&ctx).await.unwrap();

        assert_eq!(applied.len(), 3);
        assert_eq!(
            applied[0].outcome,
            StepOutcome::PrincipalCreated {
                user: "svc".to_string()
            }
        );
        assert_eq!(
            applied[1].outcome,
            StepOutcome::IndexCreated {
                collection: "audit_logs".to_string(),
                name: "action_1".to_string()
            }
        );
        assert!(matches!(
            applied[2].outcome,
            StepOutcome::DocumentInserted { .. }
        ));
    }

    #[tokio::test]
    async fn test_failed_step_stops_the_run() {
        let mut registry = ModuleRegistry::new();
        registry.register_core(principal_module());
        registry.register_custom(collection_module());

        let settings = Settings::default();
        let store = MemoryStore::new("xunimpay_audit");
        let ctx = InitCtx {
            settings: &settings,
            store: &store,
        };
        registry.apply_migrations(&ctx).await.unwrap();

        let err = registry.apply_migrations(&ctx).await.unwrap_err();
        assert!(format!("{err:#}").contains("already exists"));
        // the second run never reached the seed insert
        let seeds = store.count_documents("audit_logs", doc! {}).await.unwrap();
        assert_eq!(seeds, 1);
    }
}
