// SPDX-License-Identifier: PMPL-1.0-or-later

//! Engine profile loading and process-wide feature flags.

use crate::pql::optimizer::OptimizerSettings;
use crate::pql::parser::QueryParserConfig;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json;
use serde_yaml;
use std::env;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

pub const ENABLE_BIP_ENV: &str = "SPA_ENABLE_BIP";
pub const DISABLE_OPTIMIZER_ENV: &str = "SPA_DISABLE_OPTIMIZER";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineProfile {
    /// Master switch; `false` turns every optimizer toggle off
    pub optimize: bool,
    #[serde(flatten)]
    pub optimizer: OptimizerSettings,
    /// Accept `NextBip`, `AffectsBip` and their transitive forms
    pub enable_bip: bool,
}

impl Default for EngineProfile {
    fn default() -> Self {
        Self {
            optimize: true,
            optimizer: OptimizerSettings::enabled(),
            enable_bip: false,
        }
    }
}

impl EngineProfile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading engine profile {}", path.display()))?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&content)
                .with_context(|| format!("parsing json engine profile {}", path.display())),
            Some("yaml") | Some("yml") => serde_yaml::from_str(&content)
                .with_context(|| format!("parsing yaml engine profile {}", path.display())),
            _ => Err(anyhow!(
                "unsupported engine profile extension for {}",
                path.display()
            )),
        }
    }

    /// Defaults adjusted by the environment flags
    pub fn from_env() -> Self {
        Self::default().with_flags(EnvFlags::get())
    }

    /// Apply process-wide flags on top of this profile; a flag can only
    /// enable bip relations or disable the optimizer, never the reverse
    pub fn with_flags(self, flags: EnvFlags) -> Self {
        Self {
            optimize: self.optimize && !flags.disable_optimizer,
            enable_bip: self.enable_bip || flags.enable_bip,
            ..self
        }
    }

    /// Settings the evaluator should run with
    pub fn settings(&self) -> OptimizerSettings {
        if self.optimize {
            self.optimizer
        } else {
            OptimizerSettings::disabled()
        }
    }

    pub fn parser_config(&self) -> QueryParserConfig {
        QueryParserConfig {
            enable_bip: self.enable_bip,
        }
    }
}

/// Environment flags, read once per process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvFlags {
    pub enable_bip: bool,
    pub disable_optimizer: bool,
}

impl EnvFlags {
    pub fn get() -> Self {
        static FLAGS: OnceLock<EnvFlags> = OnceLock::new();
        *FLAGS.get_or_init(|| EnvFlags {
            enable_bip: flag(ENABLE_BIP_ENV),
            disable_optimizer: flag(DISABLE_OPTIMIZER_ENV),
        })
    }
}

fn flag(key: &str) -> bool {
    match env::var(key) {
        Ok(value) => is_truthy(&value),
        Err(_) => false,
    }
}

pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truthy_values() {
        for value in ["1", "true", "YES", " on "] {
            assert!(is_truthy(value), "{}", value);
        }
        for value in ["0", "false", "", "enabled"] {
            assert!(!is_truthy(value), "{}", value);
        }
    }

    #[test]
    fn test_disabled_master_switch_overrides_toggles() {
        let profile = EngineProfile {
            optimize: false,
            ..EngineProfile::default()
        };
        assert_eq!(profile.settings(), OptimizerSettings::disabled());
        assert_eq!(EngineProfile::default().settings(), OptimizerSettings::enabled());
    }

    #[test]
    fn test_flags_layer_over_loaded_profile() {
        let loaded = EngineProfile::default();
        let flags = EnvFlags {
            enable_bip: true,
            disable_optimizer: false,
        };
        let profile = loaded.with_flags(flags);
        assert!(profile.enable_bip);
        assert!(profile.optimize);

        let bip_profile = EngineProfile {
            enable_bip: true,
            ..EngineProfile::default()
        };
        let profile = bip_profile.with_flags(EnvFlags {
            enable_bip: false,
            disable_optimizer: true,
        });
        assert!(profile.enable_bip);
        assert_eq!(profile.settings(), OptimizerSettings::disabled());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let profile: EngineProfile =
            serde_yaml::from_str("enable_bip: true\nsort_clauses: false\n").unwrap();
        assert!(profile.enable_bip);
        assert!(profile.optimize);
        assert!(!profile.optimizer.sort_clauses);
        assert!(profile.optimizer.dedup_clauses);
    }
}
