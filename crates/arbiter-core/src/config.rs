// Copyright (c) Walrus Foundation
// SPDX-License-Identifier: Apache-2.0

//! Configuration of the adjudicator.

use std::path::Path;

use anyhow::{Context, ensure};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{StakeAmount, hash::HashAlgorithm};

/// Trait for loading a configuration from a YAML file.
pub trait LoadConfig: DeserializeOwned {
    /// Loads the configuration from the YAML file at `path`.
    fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "reading config from file");

        let reader = std::fs::File::open(path)
            .with_context(|| format!("unable to load config from {}", path.display()))?;

        serde_yaml::from_reader(reader)
            .with_context(|| format!("unable to parse config file {}", path.display()))
    }
}

/// Configuration of an [`Adjudicator`][crate::Adjudicator].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdjudicatorConfig {
    /// The hash algorithm used for signed messages and challenge IDs.
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,
    /// The stake slashed from a worker for an incorrect fragment.
    #[serde(default = "defaults::penalty")]
    pub penalty: StakeAmount,
}

impl Default for AdjudicatorConfig {
    fn default() -> Self {
        Self {
            hash_algorithm: HashAlgorithm::default(),
            penalty: defaults::penalty(),
        }
    }
}

impl LoadConfig for AdjudicatorConfig {}

impl AdjudicatorConfig {
    /// Checks that the configuration can be used to slash workers.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.penalty > 0, "the penalty must be positive");
        Ok(())
    }
}

/// Default values for the adjudicator configuration.
pub mod defaults {
    use crate::StakeAmount;

    /// The default penalty for an incorrect fragment.
    pub fn penalty() -> StakeAmount {
        100
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use super::*;

    #[test]
    fn loads_config_from_yaml() -> arbiter_test_utils::Result {
        let mut file = tempfile::NamedTempFile::new()?;
        writeln!(file, "hash_algorithm: keccak256\npenalty: 250")?;

        let config = AdjudicatorConfig::load(file.path())?;

        assert_eq!(
            config,
            AdjudicatorConfig {
                hash_algorithm: HashAlgorithm::Keccak256,
                penalty: 250,
            }
        );
        Ok(())
    }

    #[test]
    fn missing_fields_take_defaults() -> arbiter_test_utils::Result {
        let config: AdjudicatorConfig = serde_yaml::from_str("{}")?;
        assert_eq!(config, AdjudicatorConfig::default());
        assert_eq!(config.hash_algorithm, HashAlgorithm::Sha256);
        assert_eq!(config.penalty, 100);
        Ok(())
    }

    #[test]
    fn rejects_unknown_hash_algorithm() {
        assert!(serde_yaml::from_str::<AdjudicatorConfig>("hash_algorithm: ripemd160").is_err());
    }

    #[test]
    fn zero_penalty_is_invalid() {
        let config = AdjudicatorConfig {
            penalty: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert!(AdjudicatorConfig::default().validate().is_ok());
    }

    #[test]
    fn missing_file_is_reported() {
        let error = AdjudicatorConfig::load("/nonexistent/arbiter.yaml")
            .expect_err("file does not exist");
        assert!(error.to_string().contains("/nonexistent/arbiter.yaml"));
    }
}
