use anyhow::Context;
use xunimpay_bootstrap::Bootstrapper;
use xunimpay_db::MongoStore;
use xunimpay_kernel::settings::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().with_context(|| "failed to load bootstrap settings")?;
    xunimpay_telemetry::init(&settings.telemetry)?;

    tracing::info!(
        env = ?settings.environment,
        database = %settings.database.name,
        profile = settings.bootstrap.profile.as_str(),
        "xunimpay-bootstrap starting"
    );

    let store = MongoStore::connect(&settings.database.connect_options())
        .await
        .with_context(|| format!("failed to connect to {}", settings.database.name))?;

    let report = Bootstrapper::new(settings).run(&store).await?;
    println!("{}", report.message);
    Ok(())
}
