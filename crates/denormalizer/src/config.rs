//! Denormalizer configuration loaded from environment variables.

use crate::rule::MissingProjectionPolicy;

/// Denormalizer configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DENORMALIZER_STRICT_UPDATES`: fail updates whose key matches nothing
///   (`true`, `1` or `yes`; default: skip them)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct DenormalizerConfig {
    pub missing_projection: MissingProjectionPolicy,
    pub log_level: String,
}

impl DenormalizerConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let strict = std::env::var("DENORMALIZER_STRICT_UPDATES")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);

        Self {
            missing_projection: if strict {
                MissingProjectionPolicy::Fail
            } else {
                MissingProjectionPolicy::Ignore
            },
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }

    /// Default configuration with strict updates.
    pub fn strict() -> Self {
        Self {
            missing_projection: MissingProjectionPolicy::Fail,
            ..Self::default()
        }
    }
}

impl Default for DenormalizerConfig {
    fn default() -> Self {
        Self {
            missing_projection: MissingProjectionPolicy::Ignore,
            log_level: "info".to_string(),
        }
    }
}
