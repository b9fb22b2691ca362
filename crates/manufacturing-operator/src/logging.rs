use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

/// Initializes `tracing` logging with options from the environment variable
/// given in the `env` parameter.
///
/// If the variable is unset or unparsable, the maximum log level is set to
/// INFO.
pub fn initialize_logging(env: &str) {
    let filter = match EnvFilter::try_from_env(env) {
        Ok(env_filter) => env_filter,
        _ => EnvFilter::try_new(tracing::Level::INFO.to_string())
            .expect("Failed to initialize default tracing level to INFO"),
    };

    let fmt = tracing_subscriber::fmt::layer();
    Registry::default().with(filter).with(fmt).init();
}
