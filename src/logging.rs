use color_eyre::Result;
use color_eyre::eyre::Context;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. Events go to stderr so stdout only carries
/// command output such as the track report.
///
/// `RUST_LOG` takes precedence over `tracing_level` when set.
pub fn init_tracing(tracing_level: &str) -> Result<()> {
    let filter_layer = match std::env::var("RUST_LOG") {
        Ok(directives) if !directives.is_empty() => {
            EnvFilter::try_new(&directives).wrap_err("Failed to parse RUST_LOG")?
        }
        _ => EnvFilter::try_new(tracing_level).wrap_err("Failed to create tracing filter")?,
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .wrap_err("Failed to install tracing subscriber")?;

    Ok(())
}
