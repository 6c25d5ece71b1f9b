//! Logging setup for hosts of the pipeline.
//
// `RUST_LOG` wins over the default filter. Interesting targets:
//   lockstep::fps            periodic FPS records
//   lockstep::update_status  keep-updating reasons
//   lockstep::perf           frame statistics and raw markers

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,lockstep=info";

/// Installs a console subscriber with thread names.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init(default_filter: &str) -> bool {
    let env_filter = match std::env::var("RUST_LOG") {
        Ok(value) => EnvFilter::new(value),
        Err(_) => EnvFilter::new(default_filter),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_names(true)
        .try_init()
        .is_ok()
}
