//! Process-wide logger setup.

use std::sync::Once;

use env_logger::Builder;
use log::LevelFilter;

static INIT: Once = Once::new();

/// Installs an `env_logger` backend once per process.
///
/// Defaults to `info` for ZyronDB crates; `RUST_LOG` overrides it.
pub fn initialize_logger() {
    INIT.call_once_force(|_| {
        let mut builder = Builder::new();

        builder
            .filter_level(LevelFilter::Warn)
            .filter_module("zyron_common", LevelFilter::Info)
            .filter_module("zyron_buffer", LevelFilter::Info)
            .filter_module("zyron_ahi", LevelFilter::Info)
            .format_timestamp_millis()
            .parse_default_env();

        // Another component may have installed a logger already.
        let _ = builder.try_init();
    });
}
