//! Device firmware variants.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::PerlaError;

/// The protocol a Perla device speaks.
///
/// Determined once at setup and held for the lifetime of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceModel {
    /// Local REST API protected by the user code.
    #[serde(rename = "perla_local_api")]
    LocalApi,
    /// Perla Silk register API.
    #[serde(rename = "perla_silk")]
    Silk,
    /// Newer firmware exposing `/silk/registers`.
    #[serde(rename = "perla_silk_registers")]
    SilkRegisters,
}

impl DeviceModel {
    /// Stable identifier persisted alongside the host.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocalApi => "perla_local_api",
            Self::Silk => "perla_silk",
            Self::SilkRegisters => "perla_silk_registers",
        }
    }

    /// Only the local API is protected by the user code.
    pub fn requires_code(&self) -> bool {
        matches!(self, Self::LocalApi)
    }
}

impl std::fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceModel {
    type Err = PerlaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "perla_local_api" | "local_api" | "local" => Ok(Self::LocalApi),
            "perla_silk" | "silk" => Ok(Self::Silk),
            "perla_silk_registers" | "silk_registers" | "registers" => Ok(Self::SilkRegisters),
            other => Err(PerlaError::UnsupportedModel(other.to_string())),
        }
    }
}
