use std::sync::Once;

/// Install a global `tracing` subscriber reading the `RUST_LOG` environment
/// variable, defaulting to `info`.
///
/// Call this from `main`, or from the top of each test. Safe to call any
/// number of times; only the first call installs anything.
pub fn setup_logging() {
    static ONCE: Once = Once::new();

    ONCE.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        // Another subscriber may already be installed by the embedding
        // application; that one wins.
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .ok();
    });
}
