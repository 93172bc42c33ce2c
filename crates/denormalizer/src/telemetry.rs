//! Tracing subscriber setup.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::DenormalizerConfig;

/// Installs a global fmt subscriber filtered by `RUST_LOG`, falling back to
/// `config.log_level`.
///
/// Returns false when a global subscriber is already set.
pub fn init_tracing(config: &DenormalizerConfig) -> bool {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_rejected() {
        let config = DenormalizerConfig::default();
        init_tracing(&config);
        assert!(!init_tracing(&config));
    }
}
