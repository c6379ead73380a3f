//! Firmware detection.
//!
//! Probes a host in a fixed order and classifies the first variant that
//! answers: the newer register endpoint first, then the local API, then the
//! original Silk register endpoint. The result is meant to be persisted with
//! the entry and never re-run per poll.

use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::defaults;
use crate::error::{PerlaError, Result};
use crate::model::DeviceModel;
use crate::transport::{is_register_shape, DeviceEndpoints};

/// Outcome of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    /// The endpoint answered in the expected way.
    Match,
    /// Something answered, but not as this variant.
    Mismatch,
    /// Nothing answered.
    Unreachable,
}

/// Detects which firmware variant a host runs.
pub struct ModelDetector {
    endpoints: DeviceEndpoints,
    timeout: Duration,
    client: Client,
}

impl ModelDetector {
    pub fn new(endpoints: DeviceEndpoints, timeout: Duration) -> Self {
        Self {
            endpoints,
            timeout,
            client: Client::new(),
        }
    }

    /// Detector for `host` with the default endpoints and probe timeout.
    pub fn for_host(host: &str) -> Self {
        Self::new(
            DeviceEndpoints::for_host(host),
            Duration::from_secs(defaults::PROBE_TIMEOUT_SECS),
        )
    }

    /// Classify the device.
    ///
    /// Fails with `Connection` when no endpoint answered at all and with
    /// `UnsupportedModel` when something answered but matched no variant.
    pub async fn detect(&self) -> Result<DeviceModel> {
        let mut answered = false;

        let ordered = [
            (DeviceModel::SilkRegisters, self.endpoints.registers.as_str()),
            (DeviceModel::LocalApi, self.endpoints.local_api.as_str()),
            (DeviceModel::Silk, self.endpoints.silk.as_str()),
        ];

        for (model, url) in ordered {
            let probe = match model {
                DeviceModel::LocalApi => self.probe_local_api(url).await,
                _ => self.probe_registers(url).await,
            };
            debug!(url = %url, model = %model, ?probe, "Probed endpoint");
            match probe {
                Probe::Match => {
                    info!(model = %model, "Detected BWT firmware");
                    return Ok(model);
                }
                Probe::Mismatch => answered = true,
                Probe::Unreachable => {}
            }
        }

        if answered {
            Err(PerlaError::UnsupportedModel(format!(
                "No known firmware behind {}",
                self.endpoints.registers
            )))
        } else {
            Err(PerlaError::Connection(
                "No endpoint of the device responded".to_string(),
            ))
        }
    }

    /// HTTP 200 with a body in either register shape.
    async fn probe_registers(&self, url: &str) -> Probe {
        let response = match self.client.get(url).timeout(self.timeout).send().await {
            Ok(response) => response,
            Err(e) => {
                debug!(url = %url, "Registers endpoint test failed: {}", e);
                return Probe::Unreachable;
            }
        };
        if response.status() != StatusCode::OK {
            return Probe::Mismatch;
        }
        match response.json::<Value>().await {
            Ok(body) if is_register_shape(&body) => Probe::Match,
            _ => Probe::Mismatch,
        }
    }

    /// The local API answers 401 without a code, 200 with a valid one.
    async fn probe_local_api(&self, url: &str) -> Probe {
        match self.client.get(url).timeout(self.timeout).send().await {
            Ok(response) => match response.status() {
                StatusCode::OK | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Probe::Match,
                _ => Probe::Mismatch,
            },
            Err(e) => {
                debug!(url = %url, "Local API endpoint test failed: {}", e);
                Probe::Unreachable
            }
        }
    }
}

/// Detect the firmware of `host` with default settings.
pub async fn determine_model(host: &str) -> Result<DeviceModel> {
    ModelDetector::for_host(host).detect().await
}
