//! Tracing setup shared by the server and the seed binary.
//!
//! The subscriber is installed once at startup with a bootstrap level; the
//! configured `logging.level` is applied afterwards through a reload handle,
//! since the configuration file is read after logging is already needed.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

type FilterHandle = reload::Handle<EnvFilter, Registry>;

static FILTER_HANDLE: OnceLock<FilterHandle> = OnceLock::new();

/// Directives appended to every configured level. sqlx logs each statement
/// at info and hyper is chatty at debug.
const QUIET_DEPENDENCIES: &[&str] = &["sqlx=warn", "hyper=info", "reqwest=info"];

fn build_filter(level: &str) -> EnvFilter {
    let mut directives = vec![level.trim().to_string()];
    directives.extend(QUIET_DEPENDENCIES.iter().map(|d| d.to_string()));
    EnvFilter::try_new(directives.join(",")).unwrap_or_else(|err| {
        eprintln!("Invalid log level {level:?} ({err}); using info");
        EnvFilter::new("info")
    })
}

fn rust_log_filter() -> Option<EnvFilter> {
    std::env::var_os("RUST_LOG")?;
    EnvFilter::try_from_default_env().ok()
}

pub fn init_tracing() {
    init_tracing_with_level("info");
}

/// Installs the global subscriber. `RUST_LOG` wins over `level` when set.
/// Calling this twice is harmless; the second call is ignored.
pub fn init_tracing_with_level(level: &str) {
    let filter = rust_log_filter().unwrap_or_else(|| build_filter(level));
    let (filter_layer, handle) = reload::Layer::new(filter);

    let installed = tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok();
    if installed {
        let _ = FILTER_HANDLE.set(handle);
    }
}

/// Switches the active level to the configured one unless `RUST_LOG` is set.
pub fn apply_logging_level(level: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    let Some(handle) = FILTER_HANDLE.get() else {
        return;
    };
    if let Err(err) = handle.reload(build_filter(level)) {
        eprintln!("Failed to apply log level {level:?}: {err}");
    }
}
