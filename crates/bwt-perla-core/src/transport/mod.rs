//! HTTP transports, one per firmware variant.
//!
//! Every transport shares the same contract: `fetch()` returns one raw
//! payload or fails with a connection, timeout, authentication or malformed
//! response error. The underlying HTTP client is opened on first use and
//! released by `close()` (or when the transport is dropped).

mod local;
mod registers;

pub use local::LocalApiClient;
pub use registers::{is_register_shape, parse_registers, RegistersClient};

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::defaults;
use crate::error::{PerlaError, Result};
use crate::model::DeviceModel;
use crate::payload::RawPayload;

/// Fetches raw payloads from one device.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Firmware variant this transport speaks.
    fn model(&self) -> DeviceModel;

    /// Fetch one payload.
    async fn fetch(&self) -> Result<RawPayload>;

    /// Release the HTTP connection pool. Fetching again reopens it.
    async fn close(&self);
}

/// URLs of every endpoint a Perla device may serve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEndpoints {
    /// Newer firmware register endpoint, also used as detection probe.
    pub registers: String,
    /// Register endpoint of the original Silk firmware.
    pub silk: String,
    /// Local REST API record.
    pub local_api: String,
}

impl DeviceEndpoints {
    /// Endpoints for `host`, which may carry an explicit port for the
    /// register endpoints. The local API always uses `local_api_port`.
    pub fn new(host: &str, local_api_port: u16) -> Self {
        let host = host.trim().trim_end_matches('/');
        Self {
            registers: format!("http://{}/silk/registers", host),
            silk: format!("http://{}/registers", host),
            local_api: format!(
                "http://{}:{}/api/GetCurrentData",
                host_name(host),
                local_api_port
            ),
        }
    }

    pub fn for_host(host: &str) -> Self {
        Self::new(host, defaults::LOCAL_API_PORT)
    }
}

/// Strip a `:port` suffix, keeping bracketed IPv6 literals intact.
fn host_name(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.parse::<u16>().is_ok() => name,
        _ => host,
    }
}

/// Lazily opened HTTP client shared by the transports.
#[derive(Default)]
pub(crate) struct Session {
    client: Mutex<Option<Client>>,
}

impl Session {
    /// Current client, building one on first use.
    pub(crate) async fn client(&self) -> Result<Client> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }
        let client = Client::builder()
            .pool_max_idle_per_host(1)
            .build()
            .map_err(|e| PerlaError::Connection(format!("HTTP client setup failed: {}", e)))?;
        *guard = Some(client.clone());
        Ok(client)
    }

    pub(crate) async fn close(&self) -> bool {
        self.client.lock().await.take().is_some()
    }

    #[cfg(test)]
    pub(crate) async fn is_open(&self) -> bool {
        self.client.lock().await.is_some()
    }
}

/// Build the transport for `model`.
///
/// The local API needs the user code; the register firmwares ignore it.
pub fn create_transport(
    model: DeviceModel,
    endpoints: &DeviceEndpoints,
    code: Option<&str>,
    timeout: Duration,
) -> Result<Arc<dyn Transport>> {
    let code = code.filter(|c| !c.is_empty());
    if model.requires_code() && code.is_none() {
        return Err(PerlaError::Configuration(format!("{} requires a code", model)));
    }

    let transport: Arc<dyn Transport> = match model {
        DeviceModel::LocalApi => {
            let code = code.unwrap_or_default();
            Arc::new(LocalApiClient::new(&endpoints.local_api, code, timeout))
        }
        DeviceModel::Silk => Arc::new(RegistersClient::new(
            DeviceModel::Silk,
            &endpoints.silk,
            timeout,
        )),
        DeviceModel::SilkRegisters => Arc::new(RegistersClient::new(
            DeviceModel::SilkRegisters,
            &endpoints.registers,
            timeout,
        )),
    };
    Ok(transport)
}
