//! Decoded device snapshots.
//!
//! Every poll produces one immutable [`Snapshot`]. All variants expose the
//! common accessor set of [`WaterData`]; accessors a firmware cannot supply
//! fall back to the trait defaults (`None` or `0`) instead of failing.
//!
//! Accessors are pure projections over the payload captured at construction,
//! including the wall-clock instant used to resolve time-of-day registers.

mod local;
mod silk;
mod silk_registers;

pub use local::LocalSnapshot;
pub use silk::SilkSnapshot;
pub use silk_registers::{SilkRegistersSnapshot, RATED_CAPACITY};

use chrono::{DateTime, FixedOffset, Utc};
use std::ops::Deref;

use crate::model::DeviceModel;
use crate::payload::{DeviceFault, DeviceStatus};

/// Named accessors consumed by the sensor layer.
pub trait WaterData {
    /// Current flow in l/h.
    fn current_flow(&self) -> i64;

    /// Total water delivered in liters.
    fn total_output(&self) -> i64;

    /// Inlet hardness, if the firmware reports one.
    fn hardness_in(&self) -> Option<i64>;

    /// Remaining salt in percent, `0..=100`.
    fn regenerativ_level(&self) -> i64;

    /// Water delivered today in liters.
    fn day_output(&self) -> i64;

    /// Remaining softening capacity of column 1 in liters.
    ///
    /// `None` when the capacity cannot be derived (equal inlet and outlet
    /// hardness on the local API).
    fn capacity_1(&self) -> Option<f64>;

    fn last_regeneration_1(&self) -> Option<DateTime<FixedOffset>>;

    fn customer_service(&self) -> Option<DateTime<FixedOffset>>;

    fn columns(&self) -> u8 {
        1
    }

    fn firmware_version(&self) -> Option<&str> {
        None
    }

    fn hardness_out(&self) -> Option<i64> {
        None
    }

    fn technician_service(&self) -> Option<DateTime<FixedOffset>> {
        None
    }

    fn next_customer_service(&self) -> Option<DateTime<FixedOffset>> {
        None
    }

    fn state(&self) -> Option<DeviceStatus> {
        None
    }

    fn errors(&self) -> &[DeviceFault] {
        &[]
    }

    /// 0 = off, 1 = on, larger values are the scheduled start (unix time).
    fn holiday_mode(&self) -> i64 {
        0
    }

    fn holiday_mode_start(&self) -> Option<DateTime<Utc>> {
        let mode = self.holiday_mode();
        if mode > 1 {
            DateTime::from_timestamp(mode, 0)
        } else {
            None
        }
    }

    fn regenerativ_days(&self) -> Option<i64> {
        None
    }

    /// Salt consumed since setup in grams.
    fn regenerativ_total(&self) -> Option<i64> {
        None
    }

    fn month_output(&self) -> Option<i64> {
        None
    }

    fn year_output(&self) -> Option<i64> {
        None
    }

    fn capacity_2(&self) -> Option<f64> {
        None
    }

    fn last_regeneration_2(&self) -> Option<DateTime<FixedOffset>> {
        None
    }

    fn regeneration_count_1(&self) -> i64 {
        0
    }

    fn regeneration_count_2(&self) -> i64 {
        0
    }

    fn capacity_percentage(&self) -> i64 {
        0
    }

    fn days_in_service(&self) -> i64 {
        0
    }

    fn warranty_days_remaining(&self) -> i64 {
        0
    }

    fn daily_average_water_use(&self) -> i64 {
        0
    }

    /// Salt capacity in kg.
    fn max_salt_capacity(&self) -> f64 {
        0.0
    }

    /// Current salt level in kg.
    fn current_salt_level(&self) -> f64 {
        0.0
    }

    /// Raw register passthrough for debugging unknown slots.
    fn register(&self, _index: i64) -> Option<i64> {
        None
    }
}

/// Result of decoding one poll.
#[derive(Debug, Clone, PartialEq)]
pub enum Snapshot {
    Local(LocalSnapshot),
    Silk(SilkSnapshot),
    SilkRegisters(SilkRegistersSnapshot),
}

impl Snapshot {
    pub fn model(&self) -> DeviceModel {
        match self {
            Snapshot::Local(_) => DeviceModel::LocalApi,
            Snapshot::Silk(_) => DeviceModel::Silk,
            Snapshot::SilkRegisters(_) => DeviceModel::SilkRegisters,
        }
    }

    pub fn data(&self) -> &(dyn WaterData + 'static) {
        match self {
            Snapshot::Local(s) => s,
            Snapshot::Silk(s) => s,
            Snapshot::SilkRegisters(s) => s,
        }
    }

    /// Label shown after "Perla" in the device name.
    pub fn model_suffix(&self) -> &'static str {
        match self {
            Snapshot::Local(s) if s.columns() == 2 => "Duplex",
            Snapshot::Local(_) => "One",
            Snapshot::Silk(_) => "Silk",
            Snapshot::SilkRegisters(_) => "Water Softener",
        }
    }
}

impl Deref for Snapshot {
    type Target = dyn WaterData;

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

/// `floor(remaining / capacity * 100)` bounded to `0..=100`, or 0 when
/// either register is missing or the capacity is not positive.
pub(crate) fn salt_percentage(remaining: Option<i64>, capacity: Option<i64>) -> i64 {
    match (remaining, capacity) {
        (Some(remaining), Some(capacity)) if capacity > 0 => {
            let level = (remaining as f64 / capacity as f64 * 100.0).floor() as i64;
            level.clamp(0, 100)
        }
        _ => 0,
    }
}
