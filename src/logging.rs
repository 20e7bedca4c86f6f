use env_logger::Env;

/// Initializes the process-wide logger. Level is taken from RUST_LOG,
/// defaulting to info.
pub fn setup_logger() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
}
