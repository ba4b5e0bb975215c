use async_trait::async_trait;
use xunimpay_authz::Principal;
use xunimpay_kernel::settings::Settings;
use xunimpay_kernel::{InitCtx, Migration, MigrationStep, Module};

/// Application principal scoped to the audit database. Only the
/// application profile contributes it.
pub struct PrincipalModule;

impl PrincipalModule {
    pub const fn new() -> Self {
        Self
    }

    /// Principal described by the settings, bound to the target database.
    pub fn principal(settings: &Settings) -> Principal {
        let (password, _) = settings.principal.resolved_password();
        Principal::scoped(
            settings.principal.user.clone(),
            password,
            settings.principal.role.clone(),
            settings.database.name.clone(),
        )
    }
}

#[async_trait]
impl Module for PrincipalModule {
    fn name(&self) -> &'static str {
        "authz"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let settings = ctx.settings;
        if !settings.bootstrap.profile.creates_principal() {
            tracing::info!(module = self.name(), "principal creation skipped for basic profile");
            return Ok(());
        }

        let (_, legacy) = settings.principal.resolved_password();
        if legacy {
            tracing::warn!(
                module = self.name(),
                user = %settings.principal.user,
                "principal.password is not configured; using the legacy built-in credential"
            );
        }
        Ok(())
    }

    fn migrations(&self, settings: &Settings) -> anyhow::Result<Vec<Migration>> {
        if !settings.bootstrap.profile.creates_principal() {
            return Ok(vec![]);
        }
        Ok(vec![Migration {
            id: "001_application_principal",
            step: MigrationStep::CreatePrincipal(Self::principal(settings)),
        }])
    }
}

/// Create a new instance of the principal module
pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(PrincipalModule::new())
}
