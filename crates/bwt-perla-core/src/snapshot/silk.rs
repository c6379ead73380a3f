use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Timelike};

use super::{salt_percentage, WaterData};
use crate::registers::{RegisterMap, Registers};

/// Flow register unit is l/min.
const FLOW_FACTOR: i64 = 60;

/// Total output register unit is 100 l.
const OUTPUT_FACTOR: i64 = 100;

/// Snapshot of a Perla Silk register array.
#[derive(Debug, Clone, PartialEq)]
pub struct SilkSnapshot {
    registers: Registers,
    map: RegisterMap,
    now: DateTime<FixedOffset>,
}

impl SilkSnapshot {
    pub fn new(registers: Registers, map: RegisterMap, now: DateTime<FixedOffset>) -> Self {
        Self { registers, map, now }
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    /// Instant the time-of-day registers are resolved against.
    pub fn decoded_at(&self) -> DateTime<FixedOffset> {
        self.now
    }

    fn reg(&self, offset: Option<i64>) -> Option<i64> {
        self.registers.at(offset)
    }

    fn midnight_in(&self, days: i64) -> Option<DateTime<FixedOffset>> {
        let date = self.now.checked_add_signed(Duration::try_days(days)?)?.date_naive();
        self.now
            .offset()
            .from_local_datetime(&date.and_time(NaiveTime::MIN))
            .single()
    }
}

/// Most recent occurrence of `hour:minute` that is not after `now`.
///
/// The registers only hold a time of day, so a regeneration more than a day
/// ago is reported as yesterday.
pub(crate) fn most_recent_time_of_day(
    now: DateTime<FixedOffset>,
    hour: i64,
    minute: i64,
) -> Option<DateTime<FixedOffset>> {
    let hour = u32::try_from(hour).ok()?;
    let minute = u32::try_from(minute).ok()?;
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    let candidate = now
        .offset()
        .from_local_datetime(&now.date_naive().and_time(time))
        .single()?;

    if hour < now.hour() || (hour == now.hour() && minute <= now.minute()) {
        Some(candidate)
    } else {
        Some(candidate - Duration::days(1))
    }
}

impl WaterData for SilkSnapshot {
    fn current_flow(&self) -> i64 {
        self.reg(self.map.current_flow)
            .map(|v| v.saturating_mul(FLOW_FACTOR))
            .unwrap_or(0)
    }

    fn total_output(&self) -> i64 {
        self.reg(self.map.total_water_served)
            .map(|v| v.saturating_mul(OUTPUT_FACTOR))
            .unwrap_or(0)
    }

    fn hardness_in(&self) -> Option<i64> {
        self.reg(self.map.water_hardness)
    }

    fn regenerativ_level(&self) -> i64 {
        salt_percentage(
            self.reg(self.map.regenerativ_remaining),
            self.reg(self.map.regenerativ_capacity),
        )
    }

    fn day_output(&self) -> i64 {
        self.reg(self.map.daily_water_usage).unwrap_or(0)
    }

    fn capacity_1(&self) -> Option<f64> {
        Some(self.reg(self.map.remaining_capacity).unwrap_or(0) as f64)
    }

    fn last_regeneration_1(&self) -> Option<DateTime<FixedOffset>> {
        let hour = self.reg(self.map.last_regeneration_hour)?;
        let minute = self.reg(self.map.last_regeneration_minute)?;
        most_recent_time_of_day(self.now, hour, minute)
    }

    fn customer_service(&self) -> Option<DateTime<FixedOffset>> {
        self.next_customer_service()
    }

    /// Outgoing hardness is not reported; one below the inlet keeps the
    /// blending ratio neutral.
    fn hardness_out(&self) -> Option<i64> {
        self.hardness_in().map(|h| h.saturating_sub(1))
    }

    fn next_customer_service(&self) -> Option<DateTime<FixedOffset>> {
        let days = self.reg(self.map.days_until_service)?;
        self.midnight_in(days)
    }

    fn regeneration_count_1(&self) -> i64 {
        self.reg(self.map.total_recharges).unwrap_or(0)
    }

    fn days_in_service(&self) -> i64 {
        self.reg(self.map.days_in_service).unwrap_or(0)
    }

    fn warranty_days_remaining(&self) -> i64 {
        self.reg(self.map.warranty_days_remaining).unwrap_or(0)
    }

    fn daily_average_water_use(&self) -> i64 {
        self.reg(self.map.avg_water_served_per_day).unwrap_or(0)
    }

    fn register(&self, index: i64) -> Option<i64> {
        self.registers.get(index)
    }
}
