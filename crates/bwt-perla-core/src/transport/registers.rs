use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Session, Transport};
use crate::error::{PerlaError, Result};
use crate::model::DeviceModel;
use crate::payload::RawPayload;

/// Client for the register endpoints of the Silk firmwares.
pub struct RegistersClient {
    model: DeviceModel,
    url: String,
    timeout: Duration,
    session: Session,
}

impl RegistersClient {
    pub fn new(model: DeviceModel, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            model,
            url: url.into(),
            timeout,
            session: Session::default(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and parse the register array.
    pub async fn get_registers(&self) -> Result<Vec<i64>> {
        let client = self.session.client().await?;
        let timeout_secs = self.timeout.as_secs();

        let response = client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                let err = PerlaError::from_request(e, timeout_secs);
                warn!(url = %self.url, "Fetching registers failed: {}", err);
                err
            })?;

        if response.status() != reqwest::StatusCode::OK {
            warn!(url = %self.url, status = %response.status(), "HTTP error when fetching registers");
            return Err(PerlaError::MalformedResponse(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| PerlaError::from_request(e, timeout_secs))?;
        let registers = parse_registers(body)?;
        debug!(url = %self.url, count = registers.len(), "Fetched registers");
        Ok(registers)
    }
}

#[async_trait]
impl Transport for RegistersClient {
    fn model(&self) -> DeviceModel {
        self.model
    }

    async fn fetch(&self) -> Result<RawPayload> {
        Ok(RawPayload::Registers(self.get_registers().await?))
    }

    async fn close(&self) {
        if self.session.close().await {
            debug!(url = %self.url, "Closed register session");
        }
    }
}

/// Whether `body` looks like a register response: an object carrying
/// `params`, or a bare array. Element types are not checked.
pub fn is_register_shape(body: &Value) -> bool {
    match body {
        Value::Array(_) => true,
        Value::Object(map) => map.contains_key("params"),
        _ => false,
    }
}

/// Accept either `{"params": [...]}` or a bare array of numbers.
///
/// Fractional values are truncated toward zero.
pub fn parse_registers(body: Value) -> Result<Vec<i64>> {
    let values = match body {
        Value::Array(values) => values,
        Value::Object(mut map) => match map.remove("params") {
            Some(Value::Array(values)) => values,
            _ => {
                return Err(PerlaError::MalformedResponse(
                    "Unexpected response format: no params array".to_string(),
                ))
            }
        },
        other => {
            return Err(PerlaError::MalformedResponse(format!(
                "Unexpected response format: {}",
                other
            )))
        }
    };

    values
        .into_iter()
        .map(|v| {
            v.as_i64()
                .or_else(|| v.as_f64().map(|f| f as i64))
                .ok_or_else(|| {
                    PerlaError::MalformedResponse(format!("Register is not a number: {}", v))
                })
        })
        .collect()
}
