// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! Watermark configuration, loaded from TOML.
//!
//! ```toml
//! projektname = "Acme"
//! uuid = "abcd-1234"
//! error_correction = "hamming"      # or "reed-solomon"
//! alternate_naming = false
//!
//! [copyright]
//! jahr = 2024
//!
//! [plugins]
//! before = ["prefix_declarations"]
//! ```
//!
//! Field names follow the established configuration files, hence the German
//! keys for project name and copyright year.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{Result, WatermarkError};
use super::vault::KeyRole;
use crate::codec::reed_solomon::DEFAULT_PARITY_LEN;
use crate::codec::ErrorCorrection;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Copyright {
    #[serde(rename = "jahr")]
    pub year: i32,
}

/// Transform-style maps. Parsed and kept, not yet consulted by any transform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    #[serde(default, rename = "variable_namen")]
    pub variable_names: BTreeMap<String, String>,
    #[serde(default, rename = "code_struktur")]
    pub code_structure: BTreeMap<String, String>,
}

/// Plugin stage ids applied before and after embedding, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfig {
    #[serde(default)]
    pub before: Vec<String>,
    #[serde(default)]
    pub after: Vec<String>,
}

fn default_error_correction() -> String {
    ErrorCorrection::HAMMING.to_string()
}

fn default_parity() -> usize {
    DEFAULT_PARITY_LEN
}

#[derive(Clone, Serialize, Deserialize)]
pub struct WatermarkConfig {
    #[serde(rename = "projektname")]
    pub project_name: String,
    pub copyright: Copyright,
    pub uuid: String,
    #[serde(default)]
    pub mapping: Mapping,
    #[serde(default = "default_error_correction")]
    pub error_correction: String,
    #[serde(default = "default_parity")]
    pub reed_solomon_parity: usize,
    #[serde(default)]
    pub encryption_key_embedder: Option<String>,
    #[serde(default)]
    pub encryption_key_detector: Option<String>,
    #[serde(default)]
    pub random_bit_assignment: bool,
    /// Makes `random_bit_assignment` reproducible (and therefore detectable).
    #[serde(default)]
    pub permutation_seed: Option<u64>,
    #[serde(default)]
    pub alternate_naming: bool,
    #[serde(default)]
    pub plugins: PluginConfig,
}

impl WatermarkConfig {
    /// Minimal configuration: identity fields set, everything else default.
    pub fn new(project_name: &str, year: i32, uuid: &str) -> Self {
        Self {
            project_name: project_name.to_string(),
            copyright: Copyright { year },
            uuid: uuid.to_string(),
            mapping: Mapping::default(),
            error_correction: default_error_correction(),
            reed_solomon_parity: DEFAULT_PARITY_LEN,
            encryption_key_embedder: None,
            encryption_key_detector: None,
            random_bit_assignment: false,
            permutation_seed: None,
            alternate_naming: false,
            plugins: PluginConfig::default(),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WatermarkError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Reject configurations with empty identity fields or an unusable codec.
    pub fn validate(&self) -> Result<()> {
        if self.project_name.is_empty() {
            return Err(WatermarkError::Config("projektname must not be empty".into()));
        }
        if self.uuid.is_empty() {
            return Err(WatermarkError::Config("uuid must not be empty".into()));
        }
        self.codec()?;
        Ok(())
    }

    /// The configured error-correction codec.
    pub fn codec(&self) -> Result<ErrorCorrection> {
        ErrorCorrection::from_key(&self.error_correction, self.reed_solomon_parity)
            .map_err(|e| WatermarkError::Config(e.to_string()))
    }

    /// The identity string the payload is built from.
    pub fn identity(&self) -> String {
        format!("{}{}{}", self.project_name, self.copyright.year, self.uuid)
    }

    /// Secret configured inline for a role, if any.
    pub fn inline_key(&self, role: KeyRole) -> Option<&str> {
        match role {
            KeyRole::Embedder => self.encryption_key_embedder.as_deref(),
            KeyRole::Detector => self.encryption_key_detector.as_deref(),
        }
        .filter(|k| !k.is_empty())
    }

    pub fn with_error_correction(mut self, key: &str) -> Self {
        self.error_correction = key.to_string();
        self
    }

    /// Set the same secret for both roles.
    pub fn with_shared_key(mut self, secret: &str) -> Self {
        self.encryption_key_embedder = Some(secret.to_string());
        self.encryption_key_detector = Some(secret.to_string());
        self
    }
}

impl fmt::Debug for WatermarkConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |k: &Option<String>| k.as_ref().map(|_| "<redacted>");
        f.debug_struct("WatermarkConfig")
            .field("project_name", &self.project_name)
            .field("copyright", &self.copyright)
            .field("uuid", &self.uuid)
            .field("mapping", &self.mapping)
            .field("error_correction", &self.error_correction)
            .field("reed_solomon_parity", &self.reed_solomon_parity)
            .field("encryption_key_embedder", &redact(&self.encryption_key_embedder))
            .field("encryption_key_detector", &redact(&self.encryption_key_detector))
            .field("random_bit_assignment", &self.random_bit_assignment)
            .field("permutation_seed", &self.permutation_seed)
            .field("alternate_naming", &self.alternate_naming)
            .field("plugins", &self.plugins)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
projektname = "Acme"
uuid = "abcd-1234"
error_correction = "reed-solomon"
encryption_key_embedder = "s3cret"
random_bit_assignment = true
permutation_seed = 7
alternate_naming = true

[copyright]
jahr = 2024

[mapping]
variable_namen = { "0" = "snake_case", "1" = "camelCase" }
code_struktur = { "0" = "for_loop", "1" = "list_comprehension" }

[plugins]
before = ["prefix_declarations"]
"#;

    #[test]
    fn parses_full_config() {
        let config = WatermarkConfig::from_toml_str(FULL).unwrap();
        assert_eq!(config.project_name, "Acme");
        assert_eq!(config.copyright.year, 2024);
        assert_eq!(config.codec().unwrap(), ErrorCorrection::ReedSolomon { parity_len: 10 });
        assert_eq!(config.inline_key(KeyRole::Embedder), Some("s3cret"));
        assert_eq!(config.inline_key(KeyRole::Detector), None);
        assert_eq!(config.permutation_seed, Some(7));
        assert_eq!(config.mapping.variable_names["1"], "camelCase");
        assert_eq!(config.plugins.before, vec!["prefix_declarations"]);
        assert_eq!(config.identity(), "Acme2024abcd-1234");
    }

    #[test]
    fn defaults_apply() {
        let config = WatermarkConfig::from_toml_str(
            "projektname = \"P\"\nuuid = \"u\"\n[copyright]\njahr = 2023\n",
        )
        .unwrap();
        assert_eq!(config.codec().unwrap(), ErrorCorrection::Hamming74);
        assert!(!config.random_bit_assignment);
        assert!(!config.alternate_naming);
        assert!(config.plugins.before.is_empty());
    }

    #[test]
    fn missing_required_field_is_config_error() {
        let result = WatermarkConfig::from_toml_str("projektname = \"P\"\n[copyright]\njahr = 1\n");
        assert!(matches!(result, Err(WatermarkError::Config(msg)) if msg.contains("uuid")));
    }

    #[test]
    fn unknown_codec_is_config_error() {
        let result = WatermarkConfig::from_toml_str(
            "projektname = \"P\"\nuuid = \"u\"\nerror_correction = \"bch\"\n[copyright]\njahr = 1\n",
        );
        assert!(matches!(result, Err(WatermarkError::Config(msg)) if msg.contains("bch")));
    }

    #[test]
    fn debug_redacts_secrets() {
        let config = WatermarkConfig::new("P", 2024, "u").with_shared_key("hunter2");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("<redacted>"));
    }
}
