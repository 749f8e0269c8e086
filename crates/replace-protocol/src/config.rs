//! Replacement runtime configuration.
//!
//! Every suspension point of a run is bounded by one of these timeouts. Values
//! come from defaults, optionally overlaid by a TOML file and then by
//! `REPLACE_*` environment variables.

use crate::ProtocolError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "REPLACE_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplacementConfig {
    /// Wait for a peer to acknowledge a handshake
    pub handshake_timeout_ms: u64,
    /// Wait for a peer's proposal result, and for an acceptor's proposal
    pub proposal_timeout_ms: u64,
    /// Wait, on the acceptor side, for the aggregated signature set
    pub signature_set_timeout_ms: u64,
    /// Wait for the notary's signature
    pub notary_timeout_ms: u64,
    /// Wait for dependency resolution
    pub resolution_timeout_ms: u64,
    /// Largest encoded envelope accepted from a peer
    pub max_payload_bytes: usize,
}

impl Default for ReplacementConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_ms: 10_000,
            proposal_timeout_ms: 30_000,
            signature_set_timeout_ms: 30_000,
            notary_timeout_ms: 30_000,
            resolution_timeout_ms: 30_000,
            max_payload_bytes: 4 * 1024 * 1024,
        }
    }
}

impl ReplacementConfig {
    /// Parse a TOML document; missing keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ProtocolError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ProtocolError::Config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ProtocolError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProtocolError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Overlay `REPLACE_*` variables from the process environment
    pub fn merge_with_env(&mut self) -> Result<(), ProtocolError> {
        self.merge_with_vars(std::env::vars())
    }

    /// Overlay `REPLACE_*` variables from an explicit set
    pub fn merge_with_vars(
        &mut self,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<(), ProtocolError> {
        for (key, value) in vars {
            let Some(field) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            let parse = |value: &str| {
                value
                    .parse::<u64>()
                    .map_err(|e| ProtocolError::Config(format!("{key}: {e}")))
            };
            match field {
                "HANDSHAKE_TIMEOUT_MS" => self.handshake_timeout_ms = parse(&value)?,
                "PROPOSAL_TIMEOUT_MS" => self.proposal_timeout_ms = parse(&value)?,
                "SIGNATURE_SET_TIMEOUT_MS" => self.signature_set_timeout_ms = parse(&value)?,
                "NOTARY_TIMEOUT_MS" => self.notary_timeout_ms = parse(&value)?,
                "RESOLUTION_TIMEOUT_MS" => self.resolution_timeout_ms = parse(&value)?,
                "MAX_PAYLOAD_BYTES" => {
                    self.max_payload_bytes = usize::try_from(parse(&value)?)
                        .map_err(|e| ProtocolError::Config(format!("{key}: {e}")))?;
                }
                _ => {}
            }
        }
        self.validate()
    }

    /// Take every field of `other` that differs from the default
    pub fn merge_with(&mut self, other: &Self) {
        let defaults = Self::default();
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field != defaults.$field {
                    self.$field = other.$field;
                })*
            };
        }
        take!(
            handshake_timeout_ms,
            proposal_timeout_ms,
            signature_set_timeout_ms,
            notary_timeout_ms,
            resolution_timeout_ms,
            max_payload_bytes
        );
    }

    /// Reject settings that would make a run unable to progress
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let timeouts = [
            ("handshake_timeout_ms", self.handshake_timeout_ms),
            ("proposal_timeout_ms", self.proposal_timeout_ms),
            ("signature_set_timeout_ms", self.signature_set_timeout_ms),
            ("notary_timeout_ms", self.notary_timeout_ms),
            ("resolution_timeout_ms", self.resolution_timeout_ms),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, value)| *value == 0) {
            return Err(ProtocolError::Config(format!("{name} must be > 0")));
        }
        if self.max_payload_bytes == 0 {
            return Err(ProtocolError::Config(
                "max_payload_bytes must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn proposal_timeout(&self) -> Duration {
        Duration::from_millis(self.proposal_timeout_ms)
    }

    pub fn signature_set_timeout(&self) -> Duration {
        Duration::from_millis(self.signature_set_timeout_ms)
    }

    pub fn notary_timeout(&self) -> Duration {
        Duration::from_millis(self.notary_timeout_ms)
    }

    pub fn resolution_timeout(&self) -> Duration {
        Duration::from_millis(self.resolution_timeout_ms)
    }

    /// Uniform timeout for every wait point; handy in tests
    pub fn with_uniform_timeout(timeout_ms: u64) -> Self {
        Self {
            handshake_timeout_ms: timeout_ms,
            proposal_timeout_ms: timeout_ms,
            signature_set_timeout_ms: timeout_ms,
            notary_timeout_ms: timeout_ms,
            resolution_timeout_ms: timeout_ms,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ReplacementConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ReplacementConfig::from_toml_str("proposal_timeout_ms = 500\n").unwrap();
        assert_eq!(config.proposal_timeout_ms, 500);
        assert_eq!(
            config.handshake_timeout_ms,
            ReplacementConfig::default().handshake_timeout_ms
        );
    }

    #[test]
    fn test_zero_timeout_rejected() {
        assert_matches!(
            ReplacementConfig::from_toml_str("notary_timeout_ms = 0"),
            Err(ProtocolError::Config(_))
        );
    }

    #[test]
    fn test_env_overrides() {
        let mut config = ReplacementConfig::default();
        config
            .merge_with_vars([
                ("REPLACE_PROPOSAL_TIMEOUT_MS".to_string(), "1234".to_string()),
                ("REPLACE_MAX_PAYLOAD_BYTES".to_string(), "2048".to_string()),
                ("UNRELATED".to_string(), "x".to_string()),
            ])
            .unwrap();
        assert_eq!(config.proposal_timeout_ms, 1234);
        assert_eq!(config.max_payload_bytes, 2048);

        assert!(config
            .merge_with_vars([("REPLACE_NOTARY_TIMEOUT_MS".to_string(), "soon".to_string())])
            .is_err());
    }

    #[test]
    fn test_merge_takes_non_default_fields() {
        let mut base = ReplacementConfig::with_uniform_timeout(50);
        let overlay = ReplacementConfig {
            notary_timeout_ms: 75,
            ..ReplacementConfig::default()
        };
        base.merge_with(&overlay);
        assert_eq!(base.notary_timeout_ms, 75);
        assert_eq!(base.proposal_timeout_ms, 50);
    }
}
