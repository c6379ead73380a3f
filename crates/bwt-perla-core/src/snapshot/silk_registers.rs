use chrono::{DateTime, FixedOffset};

use super::{salt_percentage, WaterData};
use crate::registers::{RegisterMap, Registers};

/// Rated softening capacity of this device class, in the unit of the
/// remaining-capacity register.
pub const RATED_CAPACITY: i64 = 2630;

/// Flow register unit is l/s.
const FLOW_FACTOR: i64 = 3600;

const OUTPUT_FACTOR: i64 = 100;

/// Salt registers hold tenths of a kilogram.
const SALT_SCALE: f64 = 10.0;

/// Snapshot of the `/silk/registers` firmware.
#[derive(Debug, Clone, PartialEq)]
pub struct SilkRegistersSnapshot {
    registers: Registers,
    map: RegisterMap,
}

impl SilkRegistersSnapshot {
    pub fn new(registers: Registers, map: RegisterMap) -> Self {
        Self { registers, map }
    }

    pub fn registers(&self) -> &Registers {
        &self.registers
    }

    fn reg(&self, offset: Option<i64>) -> Option<i64> {
        self.registers.at(offset)
    }
}

impl WaterData for SilkRegistersSnapshot {
    fn current_flow(&self) -> i64 {
        self.reg(self.map.current_flow)
            .map(|v| v.saturating_mul(FLOW_FACTOR))
            .unwrap_or(0)
    }

    fn total_output(&self) -> i64 {
        self.reg(self.map.total_water_served)
            .unwrap_or(0)
            .saturating_mul(OUTPUT_FACTOR)
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
        None
    }

    fn customer_service(&self) -> Option<DateTime<FixedOffset>> {
        None
    }

    fn capacity_percentage(&self) -> i64 {
        match self.reg(self.map.remaining_capacity) {
            Some(current) => (current as f64 / RATED_CAPACITY as f64 * 100.0).floor() as i64,
            None => 0,
        }
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

    fn max_salt_capacity(&self) -> f64 {
        self.reg(self.map.regenerativ_capacity)
            .map(|v| v as f64 / SALT_SCALE)
            .unwrap_or(0.0)
    }

    fn current_salt_level(&self) -> f64 {
        self.reg(self.map.regenerativ_remaining)
            .map(|v| v as f64 / SALT_SCALE)
            .unwrap_or(0.0)
    }

    fn register(&self, index: i64) -> Option<i64> {
        self.registers.get(index)
    }
}
