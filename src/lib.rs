pub mod assessment; // intake -> features -> prediction -> report
pub mod config;
pub mod inference; // artifact sniffing, loading, probability normalization
pub mod models;
pub mod report; // canonical names, range flags, report assembly and rendering

use tracing_subscriber::EnvFilter;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins; otherwise `config::default_log_filter()` applies.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("{} v{} starting", config::APP_NAME, config::APP_VERSION);
}
