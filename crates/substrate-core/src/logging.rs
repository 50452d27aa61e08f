//! Shared `tracing` subscriber setup.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a global `tracing` subscriber honoring `RUST_LOG`, defaulting to
/// `info` when unset.
///
/// Idempotent-ish: a second call in the same process will fail silently
/// (via `try_init`'s error, which is ignored) rather than panic, so test
/// binaries that each call this don't crash the later ones.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_does_not_panic_on_repeat_calls() {
        init_tracing();
        init_tracing();
    }
}
