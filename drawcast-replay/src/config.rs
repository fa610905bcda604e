//! Configuration for the replay tool.

use std::path::Path;

use drawcast_core::{BatchLimits, SessionConfig};
use serde::{Deserialize, Serialize};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Update PDU budget.
    pub limits: LimitsConfig,
    /// Session worker settings.
    pub session: SessionSection,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// What to print for each PDU.
    pub output: OutputConfig,
}

/// Update PDU budget, in bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Transport buffer size, header included.
    pub buffer_size: usize,
    /// Largest orders payload per PDU.
    pub payload_ceiling: usize,
    /// Slack kept free on top of each order's worst case.
    pub headroom: usize,
}

/// Session worker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Commands that may wait in the worker's queue.
    pub queue_depth: usize,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
}

/// Per-PDU output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Leading payload bytes shown as hex; 0 disables the preview.
    pub hex_preview: usize,
    /// Print a summary line when the script finishes.
    pub summary: bool,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for LimitsConfig {
    fn default() -> Self {
        let limits = BatchLimits::default();
        Self {
            buffer_size: limits.buffer_size,
            payload_ceiling: limits.payload_ceiling,
            headroom: limits.headroom,
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            queue_depth: SessionConfig::default().queue_depth,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            hex_preview: 32,
            summary: true,
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ReplayConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Convert into the worker's configuration, clamping values the
    /// encoder cannot work with.
    pub fn to_session_config(&self) -> SessionConfig {
        let buffer_size = self.limits.buffer_size.max(64);
        SessionConfig {
            queue_depth: self.session.queue_depth.max(1),
            limits: BatchLimits {
                buffer_size,
                payload_ceiling: self.limits.payload_ceiling.min(buffer_size),
                headroom: self.limits.headroom,
            },
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let text = toml::to_string_pretty(&ReplayConfig::default()).unwrap();
        assert!(text.contains("payload_ceiling"));
        assert!(text.contains("queue_depth"));
        assert!(text.contains("hex_preview"));
    }

    #[test]
    fn roundtrip_config() {
        let text = toml::to_string_pretty(&ReplayConfig::default()).unwrap();
        let parsed: ReplayConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.limits.buffer_size, 8192);
        assert_eq!(parsed.limits.payload_ceiling, 8000);
        assert_eq!(parsed.session.queue_depth, 256);
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let parsed: ReplayConfig = toml::from_str("[output]\nhex_preview = 0\n").unwrap();
        assert_eq!(parsed.output.hex_preview, 0);
        assert!(parsed.output.summary);
        assert_eq!(parsed.limits.headroom, 100);
    }

    #[test]
    fn to_session_config_clamps() {
        let mut cfg = ReplayConfig::default();
        cfg.session.queue_depth = 0;
        cfg.limits.buffer_size = 4096;
        cfg.limits.payload_ceiling = 9000;
        let session = cfg.to_session_config();
        assert_eq!(session.queue_depth, 1);
        assert_eq!(session.limits.payload_ceiling, 4096);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = ReplayConfig::load(Path::new("/nonexistent/drawcast-replay.toml"));
        assert_eq!(cfg.limits.payload_ceiling, 8000);
    }
}
