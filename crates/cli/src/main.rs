use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use xunimpay_bootstrap::Bootstrapper;
use xunimpay_db::MongoStore;
use xunimpay_kernel::settings::{InitProfile, Settings};

#[derive(Debug, Parser)]
#[command(name = "xunimpay", version, about = "Bootstrap the XunimPay audit database")]
struct Cli {
    /// MongoDB connection string
    #[arg(long, env = "XUNIMPAY_URI", global = true)]
    uri: Option<String>,

    /// Target logical database
    #[arg(long, env = "XUNIMPAY_DB_NAME", global = true)]
    database: Option<String>,

    /// Init profile: basic or application
    #[arg(long, env = "XUNIMPAY_PROFILE", global = true, value_parser = parse_profile)]
    profile: Option<InitProfile>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the principal, indexes and seed record
    Init,
    /// Check that the bootstrap state is in place
    Verify {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the ordered steps without connecting
    Plan,
}

fn parse_profile(value: &str) -> anyhow::Result<InitProfile> {
    value.parse()
}

impl Cli {
    fn apply_overrides(&self, settings: &mut Settings) {
        if let Some(uri) = &self.uri {
            settings.database.uri = uri.clone();
        }
        if let Some(database) = &self.database {
            settings.database.name = database.clone();
        }
        if let Some(profile) = self.profile {
            settings.bootstrap.profile = profile;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::load().with_context(|| "failed to load bootstrap settings")?;
    cli.apply_overrides(&mut settings);
    xunimpay_telemetry::init(&settings.telemetry)?;

    tracing::debug!(
        env = ?settings.environment,
        database = %settings.database.name,
        profile = settings.bootstrap.profile.as_str(),
        command = ?cli.command,
        "xunimpay cli starting"
    );

    let bootstrapper = Bootstrapper::new(settings);

    match cli.command {
        Command::Plan => {
            for (module, migration) in bootstrapper.plan()? {
                println!("{module}/{}: {}", migration.id, migration.step);
            }
        }
        Command::Init => {
            let store = connect(&bootstrapper).await?;
            let report = bootstrapper.run(&store).await?;
            println!("{}", report.message);
        }
        Command::Verify { json } => {
            let store = connect(&bootstrapper).await?;
            let report = bootstrapper.verify(&store).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("{report}");
            }
            if !report.is_healthy() {
                bail!("bootstrap state of '{}' is incomplete", report.database);
            }
        }
    }

    Ok(())
}

async fn connect(bootstrapper: &Bootstrapper) -> anyhow::Result<MongoStore> {
    let database = &bootstrapper.settings().database;
    MongoStore::connect(&database.connect_options())
        .await
        .with_context(|| format!("failed to connect to {}", database.name))
}
