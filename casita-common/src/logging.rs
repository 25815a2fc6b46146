//! Tracing subscriber setup shared by the binaries

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber
///
/// `RUST_LOG` directives win; `default_level` applies to everything they don't
/// mention. An unparseable level falls back to `info`.
pub fn init_tracing(default_level: &str) {
    let level = default_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}
