use env_logger::Env;

/// Console logger filtered by `RUST_LOG`, `info` when unset.
/// A second call is a no-op.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .try_init();
}
