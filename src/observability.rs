// Logging setup shared by the CLI and the server

use tracing_subscriber::EnvFilter;

/// Log filter comes from `RUST_LOG`, defaulting to info for this crate
pub fn init_tracing() {
    let filter = EnvFilter::from_default_env().add_directive(
        "fuel_tracker=info"
            .parse()
            .unwrap_or_else(|_| tracing_subscriber::filter::LevelFilter::INFO.into()),
    );

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
