use std::sync::Once;

/// Filter used when neither `LoggingConfig::env_filter` nor `RUST_LOG` is set.
///
/// wgpu and naga are chatty at `info`; resource load failures are reported by
/// this crate at `error`/`warn`, so they stay visible.
pub const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";

/// Logger configuration.
///
/// `env_filter` follows the `env_logger` filter syntax (e.g. "info", "warn",
/// "quill_engine=debug,wgpu=warn").
///
/// `write_style` controls ANSI coloring behavior.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub env_filter: Option<String>,
    pub write_style: env_logger::WriteStyle,
    /// Route output through the test harness capture (`Builder::is_test`).
    pub is_test: bool,
}

impl LoggingConfig {
    /// Configuration for `#[test]` functions: debug level, captured output.
    pub fn for_tests() -> Self {
        Self {
            env_filter: Some("debug,naga=warn".to_owned()),
            write_style: env_logger::WriteStyle::Never,
            is_test: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: env_logger::WriteStyle::Auto,
            is_test: false,
        }
    }
}

static INIT: Once = Once::new();

/// Initializes the global logger once.
///
/// This function is idempotent; subsequent calls are ignored, as is a logger
/// installed by someone else first. Intended usage is early in `main`.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();

        if let Some(filter) = config.env_filter {
            builder.parse_filters(&filter);
        } else if let Ok(filter) = std::env::var("RUST_LOG") {
            builder.parse_filters(&filter);
        } else {
            builder.parse_filters(DEFAULT_FILTER);
        }

        builder.write_style(config.write_style);
        builder.is_test(config.is_test);

        if builder.try_init().is_ok() {
            log::debug!("logging initialized");
        }
    });
}
