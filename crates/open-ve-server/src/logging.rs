//! Structured logging (`SPEC_FULL.md` §6.2): `tracing-subscriber`
//! configured from `Config.log.level`, the Rust analogue of
//! `examples/original_source/go/pkg/logger/logger.go`'s level-
//! parameterized `slog` JSON handler.

use tracing_subscriber::EnvFilter;

/// Idempotent: a second call (e.g. across CLI subcommands invoked in
/// the same process during tests) is a no-op rather than a panic.
pub fn init(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_target(true)
        .with_current_span(true)
        .try_init();
}
