use prior_crypto::EnvelopeLayout;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PriorError, PriorResult};

/// Top-level configuration (loaded from prior.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorConfig {
    pub log: LogConfig,
    pub crypto: CryptoConfig,
    pub output: OutputConfig,
    /// Warn if the config file is world-readable (default: true)
    #[serde(default = "default_true")]
    pub config_file_mode_check: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            crypto: CryptoConfig::default(),
            output: OutputConfig::default(),
            config_file_mode_check: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

/// Envelope policy. The KDF round count is not configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Layout for new envelopes: "versioned" (default) or "legacy"
    pub layout: String,
    /// Shortest passphrase the CLI accepts (default: 8)
    pub min_passphrase_len: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for sealed envelopes (default: next to the input file)
    pub dir: Option<PathBuf>,
    /// Directory for key bundles (default: current directory)
    pub key_dir: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            layout: "versioned".into(),
            min_passphrase_len: 8,
        }
    }
}

impl CryptoConfig {
    pub fn envelope_layout(&self) -> PriorResult<EnvelopeLayout> {
        match self.layout.as_str() {
            "versioned" => Ok(EnvelopeLayout::Versioned),
            "legacy" => Ok(EnvelopeLayout::Legacy),
            other => Err(PriorError::Config(format!(
                "crypto.layout must be \"versioned\" or \"legacy\", got \"{other}\""
            ))),
        }
    }
}

impl PriorConfig {
    pub fn from_toml_str(content: &str) -> PriorResult<Self> {
        let config: PriorConfig =
            toml::from_str(content).map_err(|e| PriorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> PriorResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
            .map_err(|e| PriorError::Config(format!("{}: {e}", path.display())))
    }

    pub fn validate(&self) -> PriorResult<()> {
        self.crypto.envelope_layout()?;
        if self.crypto.min_passphrase_len == 0 {
            return Err(PriorError::Config(
                "crypto.min_passphrase_len must be at least 1".into(),
            ));
        }
        match self.log.format.as_str() {
            "json" | "text" => Ok(()),
            other => Err(PriorError::Config(format!(
                "log.format must be \"json\" or \"text\", got \"{other}\""
            ))),
        }
    }
}
