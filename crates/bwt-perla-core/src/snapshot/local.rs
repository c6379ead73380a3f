use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};

use super::WaterData;
use crate::blending::treated_to_blended;
use crate::payload::{CurrentData, DeviceFault, DeviceStatus};

/// Snapshot of the local REST API record.
///
/// Device dates carry no zone; they are placed in the UTC offset captured
/// when the snapshot was decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalSnapshot {
    data: CurrentData,
    offset: FixedOffset,
}

impl LocalSnapshot {
    pub fn new(data: CurrentData, offset: FixedOffset) -> Self {
        Self { data, offset }
    }

    pub fn raw(&self) -> &CurrentData {
        &self.data
    }

    fn localize(&self, date: Option<NaiveDateTime>) -> Option<DateTime<FixedOffset>> {
        date.and_then(|d| self.offset.from_local_datetime(&d).single())
    }

    fn blended(&self, treated: i64) -> i64 {
        treated_to_blended(treated, self.data.in_hardness.dh, self.data.out_hardness.dh) as i64
    }

    /// ml·°dH to liters for the current hardness difference.
    fn capacity_liters(&self, raw: i64) -> Option<f64> {
        let removed = self.data.in_hardness.dh.saturating_sub(self.data.out_hardness.dh);
        if removed == 0 {
            return None;
        }
        Some(raw as f64 / removed as f64 / 1000.0)
    }
}

impl WaterData for LocalSnapshot {
    fn current_flow(&self) -> i64 {
        self.data.current_flow
    }

    fn total_output(&self) -> i64 {
        self.data.blended_total
    }

    fn hardness_in(&self) -> Option<i64> {
        Some(self.data.in_hardness.dh)
    }

    fn regenerativ_level(&self) -> i64 {
        self.data.regenerativ_level.clamp(0, 100)
    }

    fn day_output(&self) -> i64 {
        self.blended(self.data.treated_day)
    }

    fn capacity_1(&self) -> Option<f64> {
        self.capacity_liters(self.data.capacity_1)
    }

    fn last_regeneration_1(&self) -> Option<DateTime<FixedOffset>> {
        self.localize(self.data.regeneration_last_1)
    }

    fn customer_service(&self) -> Option<DateTime<FixedOffset>> {
        self.localize(self.data.service_customer)
    }

    fn columns(&self) -> u8 {
        self.data.columns
    }

    fn firmware_version(&self) -> Option<&str> {
        Some(&self.data.firmware_version)
    }

    fn hardness_out(&self) -> Option<i64> {
        Some(self.data.out_hardness.dh)
    }

    fn technician_service(&self) -> Option<DateTime<FixedOffset>> {
        self.localize(self.data.service_technician)
    }

    fn state(&self) -> Option<DeviceStatus> {
        Some(self.data.status())
    }

    fn errors(&self) -> &[DeviceFault] {
        &self.data.errors
    }

    fn holiday_mode(&self) -> i64 {
        self.data.holiday_mode
    }

    fn regenerativ_days(&self) -> Option<i64> {
        Some(self.data.regenerativ_days)
    }

    fn regenerativ_total(&self) -> Option<i64> {
        Some(self.data.regenerativ_total)
    }

    fn month_output(&self) -> Option<i64> {
        Some(self.blended(self.data.treated_month))
    }

    fn year_output(&self) -> Option<i64> {
        Some(self.blended(self.data.treated_year))
    }

    fn capacity_2(&self) -> Option<f64> {
        self.capacity_liters(self.data.capacity_2)
    }

    fn last_regeneration_2(&self) -> Option<DateTime<FixedOffset>> {
        self.localize(self.data.regeneration_last_2)
    }

    fn regeneration_count_1(&self) -> i64 {
        self.data.regeneration_count_1
    }

    fn regeneration_count_2(&self) -> i64 {
        self.data.regeneration_count_2
    }
}
