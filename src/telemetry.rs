use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Registry};

use mentor_core::{ChatError, Result};

use crate::config::{LogFormat, TelemetryConfig};

/// Build the log filter: `RUST_LOG` wins, then the configured directive.
pub fn env_filter(cfg: &TelemetryConfig, verbose: bool) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    let directive = if verbose { "debug" } else { cfg.filter.as_str() };
    EnvFilter::try_new(directive)
        .map_err(|err| ChatError::Config(format!("invalid log filter `{directive}`: {err}")))
}

/// Install the global subscriber. Logs go to stderr so they never interleave
/// with chat output on stdout.
pub fn init_tracing(service_name: &str, cfg: &TelemetryConfig, verbose: bool) -> Result<()> {
    let filter = env_filter(cfg, verbose)?;
    let registry = Registry::default().with(filter);

    let installed = match cfg.format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init(),
    };
    installed.map_err(|err| ChatError::Config(format!("tracing already initialised: {err}")))?;

    tracing::info!(service = service_name, "tracing initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_filter_directive() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let cfg = TelemetryConfig {
            format: LogFormat::Pretty,
            filter: "mentor_chat=notalevel".into(),
        };
        assert!(env_filter(&cfg, false).is_err());
        assert!(env_filter(&TelemetryConfig::default(), true).is_ok());
    }
}
