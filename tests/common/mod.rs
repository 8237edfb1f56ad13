//! Shared test utilities

/// Route registry diagnostics to the test output when `RUST_LOG` is set.
pub fn init_diagnostics() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
