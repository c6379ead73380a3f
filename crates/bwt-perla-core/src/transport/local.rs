use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::{Session, Transport};
use crate::error::{PerlaError, Result};
use crate::model::DeviceModel;
use crate::payload::{CurrentData, RawPayload};

/// Basic auth user of the local API; the password is the user code.
const API_USER: &str = "user";

/// Client for the code protected local REST API.
pub struct LocalApiClient {
    url: String,
    code: String,
    timeout: Duration,
    session: Session,
}

impl LocalApiClient {
    pub fn new(url: impl Into<String>, code: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            code: code.into(),
            timeout,
            session: Session::default(),
        }
    }

    /// Fetch the current data record.
    pub async fn get_current_data(&self) -> Result<CurrentData> {
        let client = self.session.client().await?;
        let timeout_secs = self.timeout.as_secs();

        let response = client
            .get(&self.url)
            .basic_auth(API_USER, Some(&self.code))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| PerlaError::from_request(e, timeout_secs))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(PerlaError::Auth(format!(
                    "Device rejected the code (HTTP {})",
                    response.status()
                )));
            }
            status => {
                warn!(url = %self.url, status = %status, "HTTP error when fetching current data");
                return Err(PerlaError::MalformedResponse(format!("HTTP {}", status)));
            }
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| PerlaError::from_request(e, timeout_secs))?;
        let data = CurrentData::from_json(body)?;
        debug!(url = %self.url, firmware = %data.firmware_version, "Fetched current data");
        Ok(data)
    }
}

#[async_trait]
impl Transport for LocalApiClient {
    fn model(&self) -> DeviceModel {
        DeviceModel::LocalApi
    }

    async fn fetch(&self) -> Result<RawPayload> {
        Ok(RawPayload::Current(self.get_current_data().await?))
    }

    async fn close(&self) {
        if self.session.close().await {
            debug!(url = %self.url, "Closed local API session");
        }
    }
}
