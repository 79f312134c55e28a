use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the configured log filter
pub const LOG_ENV_VAR: &str = "TENDRIL_LOG";

/// Install the fmt subscriber used by the framework's diagnostic console.
///
/// `TENDRIL_LOG` takes precedence over `default_filter`. Calling this more than
/// once (or after the host installed its own subscriber) is harmless.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    if let Err(err) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
    {
        debug!(error = %err, "Global subscriber already installed");
    }
}
