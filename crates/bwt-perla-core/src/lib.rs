//! BWT Perla Water Softener Client
//!
//! Polls a BWT Perla softener on the local network and turns its replies into
//! typed snapshots and sensor readings.
//!
//! ## Architecture
//!
//! - **ModelDetector**: Probes a host once and classifies its firmware
//! - **Transport**: One HTTP client per firmware (`/silk/registers`,
//!   `/registers`, local API on port 8080)
//! - **Decoder**: Pure payload to [`Snapshot`] mapping driven by a [`RegisterMap`]
//! - **PollScheduler**: Adaptive polling, 1s while water flows and backing off
//!   to 30s when idle
//! - **SensorSet**: Sensor catalogue refreshed from published snapshots
//!
//! Entries are configured with [`PerlaConfig`] and brought up with
//! [`setup_entry`].

pub mod blending;
pub mod config;
pub mod decoder;
pub mod detector;
pub mod entry;
pub mod error;
pub mod interval;
pub mod model;
pub mod payload;
pub mod registers;
pub mod scheduler;
pub mod sensors;
pub mod snapshot;

// HTTP clients per firmware variant
pub mod transport;

pub use blending::treated_to_blended;
pub use config::{PerlaConfig, RegisterMapOverrides};
pub use decoder::{decode, Decoder};
pub use detector::{determine_model, ModelDetector};
pub use entry::{setup_entry, ConfigEntry, LoadedEntry, SetupError, ENTRY_VERSION};
pub use error::{PerlaError, Result};
pub use interval::{next_interval, PollInterval, MAX_INTERVAL, MIN_INTERVAL};
pub use model::DeviceModel;
pub use payload::{CurrentData, DeviceFault, DeviceStatus, Hardness, RawPayload};
pub use registers::{RegisterMap, Registers};
pub use scheduler::{
    PollScheduler, PollState, SchedulerHandle, SnapshotSubscriber, Subscription, UpdateStatus,
};
pub use sensors::{catalogue, DeviceInfo, Sensor, SensorDescription, SensorSet, SensorValue};
pub use snapshot::{Snapshot, WaterData};
pub use transport::{create_transport, DeviceEndpoints, LocalApiClient, RegistersClient, Transport};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
