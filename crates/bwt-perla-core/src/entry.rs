//! Config entry lifecycle: setup, unload and schema migration.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::config::PerlaConfig;
use crate::detector::ModelDetector;
use crate::error::{PerlaError, Result};
use crate::model::DeviceModel;
use crate::scheduler::{PollScheduler, PollState, SchedulerHandle, Subscription};
use crate::sensors::{unique_id, SensorSet};
use crate::transport::create_transport;

/// Current entry schema version.
///
/// Version 1 registered sensors under their bare key; version 2 prefixes
/// every unique id with the entry id so several devices can coexist.
pub const ENTRY_VERSION: u32 = 2;

/// A configured device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub entry_id: String,
    #[serde(default = "default_version")]
    pub version: u32,
    pub title: String,
    pub config: PerlaConfig,
    /// Unique ids of the sensors registered for this entry
    #[serde(default)]
    pub unique_ids: Vec<String>,
}

fn default_version() -> u32 {
    ENTRY_VERSION
}

impl ConfigEntry {
    pub fn new(entry_id: impl Into<String>, title: impl Into<String>, config: PerlaConfig) -> Self {
        Self {
            entry_id: entry_id.into(),
            version: ENTRY_VERSION,
            title: title.into(),
            config,
            unique_ids: Vec::new(),
        }
    }

    /// Entry named after its host.
    pub fn for_config(config: PerlaConfig) -> Self {
        let entry_id: String = config
            .host
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect();
        let title = config.host.clone();
        Self::new(entry_id, title, config)
    }

    /// Bring an older entry up to [`ENTRY_VERSION`].
    ///
    /// Returns whether anything changed.
    pub fn migrate(&mut self) -> Result<bool> {
        debug!(entry_id = %self.entry_id, version = self.version, "Migrating entry");
        if self.version > ENTRY_VERSION {
            return Err(PerlaError::Configuration(format!(
                "Entry version {} is newer than supported version {}",
                self.version, ENTRY_VERSION
            )));
        }
        if self.version == ENTRY_VERSION {
            return Ok(false);
        }

        for id in &mut self.unique_ids {
            *id = unique_id(&self.entry_id, id);
        }
        self.version = ENTRY_VERSION;
        info!(entry_id = %self.entry_id, version = self.version, "Migration successful");
        Ok(true)
    }
}

/// Why an entry could not be set up.
#[derive(Debug, Error)]
pub enum SetupError {
    /// The device rejected the code; retrying will not help.
    #[error("Authentication failed: {0}")]
    AuthFailed(#[source] PerlaError),

    /// The device could not be reached or understood; retry later.
    #[error("Device not ready: {0}")]
    NotReady(#[source] PerlaError),
}

impl SetupError {
    pub fn inner(&self) -> &PerlaError {
        match self {
            Self::AuthFailed(e) | Self::NotReady(e) => e,
        }
    }
}

impl From<PerlaError> for SetupError {
    fn from(e: PerlaError) -> Self {
        if e.is_auth() {
            Self::AuthFailed(e)
        } else {
            Self::NotReady(e)
        }
    }
}

/// An entry whose scheduler is running.
pub struct LoadedEntry {
    pub entry: ConfigEntry,
    pub sensors: SensorSet,
    handle: SchedulerHandle,
}

impl LoadedEntry {
    pub fn model(&self) -> DeviceModel {
        self.handle.model()
    }

    /// Subscribe to poll states. Polling runs while a subscription exists.
    pub fn subscribe(&self) -> Subscription {
        self.handle.subscribe()
    }

    pub fn current(&self) -> PollState {
        self.handle.current()
    }

    pub fn request_refresh(&self) {
        self.handle.request_refresh();
    }

    /// Stop polling and release the transport.
    pub async fn unload(self) -> Result<()> {
        let entry_id = self.entry.entry_id;
        self.handle.unload().await?;
        info!(entry_id = %entry_id, "Entry unloaded");
        Ok(())
    }
}

/// Set up `entry`: resolve the model, build the transport and run the first
/// refresh before polling starts.
///
/// A model found by detection is stored on the returned entry so it can be
/// persisted and detection skipped next time.
pub async fn setup_entry(mut entry: ConfigEntry) -> std::result::Result<LoadedEntry, SetupError> {
    entry.migrate()?;
    entry.config.validate()?;

    let endpoints = entry.config.endpoints();
    let model = match entry.config.implied_model() {
        Some(model) => model,
        None => {
            let model = ModelDetector::new(endpoints.clone(), entry.config.probe_timeout())
                .detect()
                .await?;
            entry.config.model = Some(model);
            model
        }
    };

    let decoder = entry.config.decoder()?;
    let timeout = entry.config.fetch_timeout();
    let transport = create_transport(model, &endpoints, entry.config.code(), timeout)?;

    let mut scheduler = PollScheduler::new(transport.clone(), decoder, timeout);
    let snapshot = match scheduler.refresh().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!(entry_id = %entry.entry_id, model = %model, "Error setting up BWT API: {}", e);
            transport.close().await;
            return Err(e.into());
        }
    };

    let sensors = SensorSet::new(&entry.entry_id, &entry.title, &snapshot);
    entry.unique_ids = sensors
        .sensors()
        .iter()
        .map(|s| s.unique_id.clone())
        .collect();

    info!(
        entry_id = %entry.entry_id,
        model = %model,
        device = %sensors.device.model,
        sensors = sensors.sensors().len(),
        "Entry set up"
    );

    Ok(LoadedEntry {
        entry,
        sensors,
        handle: scheduler.spawn(),
    })
}
