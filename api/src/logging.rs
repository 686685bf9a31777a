use log::LevelFilter;
use std::sync::OnceLock;

static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// Installs the process logger once at `info`; `RUST_LOG` overrides.
pub fn init() {
    LOGGER_INIT.get_or_init(|| {
        let _ = env_logger::Builder::new()
            .filter_level(LevelFilter::Info)
            .format_timestamp_secs()
            .parse_default_env()
            .try_init();
    });
}
