//! Logging and tracing bootstrap.

use anyhow::Context;
use tracing::Subscriber;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;
use xunimpay_kernel::settings::{LogFormat, TelemetrySettings};

/// Install the global subscriber. Logs go to stderr; stdout is reserved for
/// command output. `RUST_LOG` takes precedence over the configured filter.
pub fn init(settings: &TelemetrySettings) -> anyhow::Result<()> {
    let subscriber = subscriber(settings, std::io::stderr)?;

    // A subscriber installed earlier (e.g. by a test harness) wins.
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        tracing::debug!(target: "xunimpay-telemetry", "global subscriber already set");
    }

    tracing::debug!(
        target: "xunimpay-telemetry",
        format = ?settings.log_format,
        "telemetry initialized"
    );
    Ok(())
}

fn subscriber<W>(
    settings: &TelemetrySettings,
    writer: W,
) -> anyhow::Result<Box<dyn Subscriber + Send + Sync>>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.filter)
            .with_context(|| format!("invalid log filter '{}'", settings.filter))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);

    Ok(match settings.log_format {
        LogFormat::Pretty => Box::new(builder.finish()),
        LogFormat::Json => Box::new(builder.json().finish()),
    })
}
