//! Configuration of one device entry.
//!
//! A TOML file holds the persisted entry (`host`, optional `code`, optional
//! detected `model`) plus tunables. Environment variables override the file.
//!
//! ```toml
//! host = "192.168.1.20"
//! code = "12345"
//! model = "perla_local_api"
//! fetch_timeout_secs = 10
//!
//! [register_maps.silk]
//! daily_water_usage = 42
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::decoder::Decoder;
use crate::error::{PerlaError, Result};
use crate::model::DeviceModel;
use crate::registers::RegisterMap;
use crate::transport::DeviceEndpoints;

/// Default values.
pub mod defaults {
    /// Timeout of one fetch, and of the whole fetch + decode cycle.
    pub const FETCH_TIMEOUT_SECS: u64 = 10;
    /// Timeout of each detection probe.
    pub const PROBE_TIMEOUT_SECS: u64 = 5;
    /// Port of the local REST API.
    pub const LOCAL_API_PORT: u16 = 8080;
}

/// Environment variable names.
pub mod env_vars {
    pub const HOST: &str = "BWT_PERLA_HOST";
    pub const CODE: &str = "BWT_PERLA_CODE";
    pub const MODEL: &str = "BWT_PERLA_MODEL";
    pub const LOG_JSON: &str = "BWT_PERLA_LOG_JSON";
}

/// Per-variant register offset overrides, by register name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterMapOverrides {
    #[serde(default)]
    pub silk: BTreeMap<String, i64>,
    #[serde(default)]
    pub silk_registers: BTreeMap<String, i64>,
}

/// Device entry configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerlaConfig {
    /// Host name or IP, optionally with a port for the register endpoints
    #[serde(default)]
    pub host: String,
    /// User code of the local API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Detected firmware; detection runs when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<DeviceModel>,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_local_api_port")]
    pub local_api_port: u16,
    #[serde(default)]
    pub register_maps: RegisterMapOverrides,
}

fn default_fetch_timeout() -> u64 {
    defaults::FETCH_TIMEOUT_SECS
}

fn default_probe_timeout() -> u64 {
    defaults::PROBE_TIMEOUT_SECS
}

fn default_local_api_port() -> u16 {
    defaults::LOCAL_API_PORT
}

impl PerlaConfig {
    /// Create a configuration for `host` with default tunables.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            code: None,
            model: None,
            fetch_timeout_secs: defaults::FETCH_TIMEOUT_SECS,
            probe_timeout_secs: defaults::PROBE_TIMEOUT_SECS,
            local_api_port: defaults::LOCAL_API_PORT,
            register_maps: RegisterMapOverrides::default(),
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_model(mut self, model: DeviceModel) -> Self {
        self.model = Some(model);
        self
    }

    /// Parse a TOML document without touching the environment.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load a file, apply environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| PerlaError::Configuration(format!("TOML encode error: {}", e)))
    }

    /// Apply `BWT_PERLA_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(env_vars::HOST) {
            self.host = host;
        }
        if let Some(code) = lookup(env_vars::CODE) {
            self.code = Some(code);
        }
        if let Some(model) = lookup(env_vars::MODEL) {
            self.model = Some(model.parse()?);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(PerlaError::Configuration("host must not be empty".to_string()));
        }
        if self.fetch_timeout_secs == 0 || self.probe_timeout_secs == 0 {
            return Err(PerlaError::Configuration(
                "timeouts must be at least one second".to_string(),
            ));
        }
        if self.model.is_some_and(|m| m.requires_code()) && self.code().is_none() {
            return Err(PerlaError::Configuration(
                "the local API requires a code".to_string(),
            ));
        }
        Ok(())
    }

    /// Non-empty user code.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref().filter(|c| !c.is_empty())
    }

    /// Model implied without probing: the persisted one, or the local API
    /// when a code is configured (legacy entries never stored a model).
    pub fn implied_model(&self) -> Option<DeviceModel> {
        self.model
            .or_else(|| self.code().map(|_| DeviceModel::LocalApi))
    }

    pub fn endpoints(&self) -> DeviceEndpoints {
        DeviceEndpoints::new(&self.host, self.local_api_port)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// Decoder with the configured register overrides applied.
    pub fn decoder(&self) -> Result<Decoder> {
        Ok(Decoder::new(
            RegisterMap::SILK.with_overrides(&self.register_maps.silk)?,
            RegisterMap::SILK_REGISTERS.with_overrides(&self.register_maps.silk_registers)?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_from_minimal_toml() {
        let config = PerlaConfig::from_toml_str("host = \"perla.local\"").unwrap();
        assert_eq!(config.host, "perla.local");
        assert_eq!(config.fetch_timeout_secs, 10);
        assert_eq!(config.probe_timeout_secs, 5);
        assert_eq!(config.local_api_port, 8080);
        assert!(config.code.is_none());
        assert!(config.implied_model().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_code_implies_local_api() {
        let config = PerlaConfig::new("perla").with_code("1234");
        assert_eq!(config.implied_model(), Some(DeviceModel::LocalApi));

        let config = PerlaConfig::new("perla").with_code("");
        assert_eq!(config.implied_model(), None);
    }

    #[test]
    fn test_persisted_model_wins() {
        let config = PerlaConfig::new("perla")
            .with_code("1234")
            .with_model(DeviceModel::SilkRegisters);
        assert_eq!(config.implied_model(), Some(DeviceModel::SilkRegisters));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            (env_vars::HOST, "10.0.0.5"),
            (env_vars::MODEL, "perla_silk"),
        ]
        .into_iter()
        .collect();
        let mut config = PerlaConfig::new("perla");
        config
            .apply_env_from(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.host, "10.0.0.5");
        assert_eq!(config.model, Some(DeviceModel::Silk));
    }

    #[test]
    fn test_validation() {
        assert!(PerlaConfig::new("  ").validate().is_err());
        assert!(PerlaConfig::new("perla")
            .with_model(DeviceModel::LocalApi)
            .validate()
            .is_err());
        let mut config = PerlaConfig::new("perla");
        config.fetch_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_register_overrides_reach_decoder() {
        let config = PerlaConfig::from_toml_str(
            r#"
            host = "perla"

            [register_maps.silk]
            daily_water_usage = 42
            "#,
        )
        .unwrap();
        let decoder = config.decoder().unwrap();
        let map = decoder.register_map(DeviceModel::Silk).unwrap();
        assert_eq!(map.daily_water_usage, Some(42));
        assert_eq!(
            decoder.register_map(DeviceModel::SilkRegisters),
            Some(&RegisterMap::SILK_REGISTERS)
        );
    }

    #[test]
    fn test_toml_round_trip() {
        let config = PerlaConfig::new("perla")
            .with_code("1234")
            .with_model(DeviceModel::LocalApi);
        let text = config.to_toml_string().unwrap();
        assert!(text.contains("model = \"perla_local_api\""));
        assert_eq!(PerlaConfig::from_toml_str(&text).unwrap(), config);
    }
}
