//! Sensor catalogue.
//!
//! Sensors are thin projections over a [`Snapshot`]. The set exposed for a
//! device depends on its firmware: a common core, extras for the local API
//! (and its second column), and the register based extras including raw
//! passthrough of the registers nobody has decoded yet.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::DeviceModel;
use crate::scheduler::{PollState, SnapshotSubscriber};
use crate::snapshot::{Snapshot, WaterData};

/// Unit symbols.
pub mod units {
    pub const LITERS: &str = "L";
    pub const CUBIC_METERS_PER_HOUR: &str = "m³/h";
    pub const PERCENTAGE: &str = "%";
    pub const DAYS: &str = "d";
    pub const GRAMS: &str = "g";
    pub const KILOGRAMS: &str = "kg";
}

/// Register slots without a known meaning, exposed for debugging.
pub const UNKNOWN_REGISTERS: &[i64] = &[
    0, 1, 5, 6, 9, 12, 20, 21, 22, 24, 29, 32, 33, 35, 36, 37, 38, 39, 40, 41, 42, 44, 45, 46, 47,
];

const MANUFACTURER: &str = "BWT";

/// A sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorValue {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Timestamp(DateTime<FixedOffset>),
    Text(String),
    Null,
}

impl SensorValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Boolean(v) => write!(f, "{}", if *v { "on" } else { "off" }),
            Self::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Text(v) => f.write_str(v),
            Self::Null => f.write_str("unknown"),
        }
    }
}

impl From<i64> for SensorValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for SensorValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for SensorValue {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<String> for SensorValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<DateTime<FixedOffset>> for SensorValue {
    fn from(v: DateTime<FixedOffset>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<DateTime<Utc>> for SensorValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v.fixed_offset())
    }
}

impl<T: Into<SensorValue>> From<Option<T>> for SensorValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Self::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Water,
    VolumeFlowRate,
    Timestamp,
    Enum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    Measurement,
    TotalIncreasing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Sensor,
    BinarySensor,
}

/// How a sensor reads its value from a snapshot.
#[derive(Debug, Clone, Copy)]
pub enum Projection {
    Accessor(fn(&dyn WaterData) -> SensorValue),
    Register(i64),
}

impl Projection {
    pub fn project(&self, data: &dyn WaterData) -> SensorValue {
        match self {
            Self::Accessor(f) => f(data),
            Self::Register(index) => data.register(*index).into(),
        }
    }
}

/// Static description of one sensor.
#[derive(Debug, Clone)]
pub struct SensorDescription {
    pub key: String,
    pub kind: SensorKind,
    pub unit: Option<&'static str>,
    pub device_class: Option<DeviceClass>,
    pub state_class: Option<StateClass>,
    /// Allowed values of an enum sensor
    pub options: Option<&'static [&'static str]>,
    pub projection: Projection,
}

impl SensorDescription {
    fn new(key: impl Into<String>, projection: fn(&dyn WaterData) -> SensorValue) -> Self {
        Self {
            key: key.into(),
            kind: SensorKind::Sensor,
            unit: None,
            device_class: None,
            state_class: None,
            options: None,
            projection: Projection::Accessor(projection),
        }
    }

    /// Raw register passthrough.
    fn register(index: i64) -> Self {
        Self {
            projection: Projection::Register(index),
            ..Self::new(format!("silk_register_{}", index), |_| SensorValue::Null)
        }
    }

    /// Plain measurement with a unit.
    fn measurement(
        key: &str,
        unit: &'static str,
        projection: fn(&dyn WaterData) -> SensorValue,
    ) -> Self {
        Self {
            unit: Some(unit),
            state_class: Some(StateClass::Measurement),
            ..Self::new(key, projection)
        }
    }

    /// Water volume counter in liters.
    fn water(key: &str, projection: fn(&dyn WaterData) -> SensorValue) -> Self {
        Self {
            unit: Some(units::LITERS),
            device_class: Some(DeviceClass::Water),
            state_class: Some(StateClass::TotalIncreasing),
            ..Self::new(key, projection)
        }
    }

    fn timestamp(key: &str, projection: fn(&dyn WaterData) -> SensorValue) -> Self {
        Self {
            device_class: Some(DeviceClass::Timestamp),
            ..Self::new(key, projection)
        }
    }

    pub fn project(&self, data: &dyn WaterData) -> SensorValue {
        self.projection.project(data)
    }
}

fn fault_names(data: &dyn WaterData, fatal: bool) -> SensorValue {
    let names: Vec<String> = data
        .errors()
        .iter()
        .filter(|fault| fault.is_fatal() == fatal)
        .map(|fault| fault.name())
        .collect();
    SensorValue::Text(names.join(","))
}

/// Sensors exposed for `model`. `columns` only matters for the local API.
pub fn catalogue(model: DeviceModel, columns: u8) -> Vec<SensorDescription> {
    let mut sensors = vec![
        SensorDescription::water("total_output", |d| d.total_output().into()),
        SensorDescription::new("hardness_in", |d| d.hardness_in().into()),
        SensorDescription::measurement("regenerativ_level", units::PERCENTAGE, |d| {
            d.regenerativ_level().into()
        }),
        SensorDescription::water("day_output", |d| d.day_output().into()),
        SensorDescription {
            device_class: Some(DeviceClass::VolumeFlowRate),
            ..SensorDescription::measurement("current_flow", units::CUBIC_METERS_PER_HOUR, |d| {
                (d.current_flow() as f64 / 1000.0).into()
            })
        },
        SensorDescription::measurement("capacity_1", units::LITERS, |d| d.capacity_1().into()),
        SensorDescription::timestamp("last_regeneration_1", |d| d.last_regeneration_1().into()),
        SensorDescription::new("counter_regeneration_1", |d| d.regeneration_count_1().into()),
    ];

    match model {
        DeviceModel::LocalApi => {
            sensors.extend([
                SensorDescription::new("errors", |d| fault_names(d, true)),
                SensorDescription::new("warnings", |d| fault_names(d, false)),
                SensorDescription::new("hardness_out", |d| d.hardness_out().into()),
                SensorDescription::timestamp("technician_service", |d| {
                    d.technician_service().into()
                }),
                SensorDescription {
                    device_class: Some(DeviceClass::Enum),
                    options: Some(&["OK", "WARNING", "ERROR"]),
                    ..SensorDescription::new("state", |d| {
                        d.state()
                            .map(|s| s.name().to_string())
                            .into()
                    })
                },
                SensorDescription::measurement("regenerativ_days", units::DAYS, |d| {
                    d.regenerativ_days().into()
                }),
                SensorDescription::measurement("regenerativ_mass", units::GRAMS, |d| {
                    d.regenerativ_total().into()
                }),
                SensorDescription {
                    kind: SensorKind::BinarySensor,
                    ..SensorDescription::new("holiday_mode", |d| (d.holiday_mode() == 1).into())
                },
                SensorDescription::timestamp("holiday_mode_start", |d| {
                    d.holiday_mode_start().into()
                }),
                SensorDescription::water("month_output", |d| d.month_output().into()),
                SensorDescription::water("year_output", |d| d.year_output().into()),
                SensorDescription::timestamp("customer_service", |d| d.customer_service().into()),
            ]);
            if columns == 2 {
                sensors.extend([
                    SensorDescription::measurement("capacity_2", units::LITERS, |d| {
                        d.capacity_2().into()
                    }),
                    SensorDescription::timestamp("last_regeneration_2", |d| {
                        d.last_regeneration_2().into()
                    }),
                    SensorDescription::new("counter_regeneration_2", |d| {
                        d.regeneration_count_2().into()
                    }),
                ]);
            }
        }
        DeviceModel::Silk | DeviceModel::SilkRegisters => {
            sensors.extend([
                SensorDescription::timestamp("next_customer_service", |d| {
                    d.next_customer_service().into()
                }),
                SensorDescription::new("days_in_service", |d| d.days_in_service().into()),
                SensorDescription::new("warranty_days_remaining", |d| {
                    d.warranty_days_remaining().into()
                }),
            ]);
            if model == DeviceModel::SilkRegisters {
                sensors.extend([
                    SensorDescription::measurement("capacity_percentage", units::PERCENTAGE, |d| {
                        d.capacity_percentage().into()
                    }),
                    SensorDescription::measurement("daily_average_water_use", units::LITERS, |d| {
                        d.daily_average_water_use().into()
                    }),
                    SensorDescription::measurement("max_salt_capacity", units::KILOGRAMS, |d| {
                        d.max_salt_capacity().into()
                    }),
                    SensorDescription::measurement("current_salt_level", units::KILOGRAMS, |d| {
                        d.current_salt_level().into()
                    }),
                ]);
            }
            sensors.extend(UNKNOWN_REGISTERS.iter().copied().map(SensorDescription::register));
        }
    }

    sensors
}

/// Device registry entry shared by all sensors of one config entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// The config entry id
    pub identifier: String,
    pub manufacturer: String,
    pub model: String,
    pub name: String,
    pub sw_version: String,
}

impl DeviceInfo {
    pub fn new(entry_id: &str, title: &str, snapshot: &Snapshot) -> Self {
        Self {
            identifier: entry_id.to_string(),
            manufacturer: MANUFACTURER.to_string(),
            model: format!("Perla {}", snapshot.model_suffix()),
            name: title.to_string(),
            sw_version: snapshot.firmware_version().unwrap_or("Unknown").to_string(),
        }
    }
}

/// One live sensor.
#[derive(Debug, Clone)]
pub struct Sensor {
    pub unique_id: String,
    pub description: SensorDescription,
    pub value: SensorValue,
}

impl Sensor {
    fn new(entry_id: &str, description: SensorDescription, data: &dyn WaterData) -> Self {
        Self {
            unique_id: unique_id(entry_id, &description.key),
            value: description.project(data),
            description,
        }
    }

    pub fn key(&self) -> &str {
        &self.description.key
    }
}

/// Unique id of a sensor within all entries.
pub fn unique_id(entry_id: &str, key: &str) -> String {
    format!("{}_{}", entry_id, key)
}

/// All sensors of one device, refreshed from published poll states.
#[derive(Debug, Clone)]
pub struct SensorSet {
    pub device: DeviceInfo,
    sensors: Vec<Sensor>,
    available: bool,
    updates: u64,
}

impl SensorSet {
    /// Build the set from the first snapshot of an entry.
    pub fn new(entry_id: &str, title: &str, snapshot: &Snapshot) -> Self {
        let sensors = catalogue(snapshot.model(), snapshot.columns())
            .into_iter()
            .map(|description| Sensor::new(entry_id, description, snapshot.data()))
            .collect();
        Self {
            device: DeviceInfo::new(entry_id, title, snapshot),
            sensors,
            available: true,
            updates: 0,
        }
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.sensors
    }

    pub fn get(&self, key: &str) -> Option<&Sensor> {
        self.sensors.iter().find(|s| s.key() == key)
    }

    pub fn value(&self, key: &str) -> Option<&SensorValue> {
        self.get(key).map(|s| &s.value)
    }

    /// False while the last refresh failed; values keep their last reading.
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Number of snapshots applied since creation.
    pub fn updates(&self) -> u64 {
        self.updates
    }

    pub fn apply(&mut self, snapshot: &Snapshot) {
        for sensor in &mut self.sensors {
            sensor.value = sensor.description.project(snapshot.data());
        }
        self.updates += 1;
    }
}

impl SnapshotSubscriber for SensorSet {
    fn on_update(&mut self, state: &PollState) {
        self.available = state.is_available();
        if self.available {
            if let Some(snapshot) = &state.snapshot {
                self.apply(snapshot);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;
    use crate::payload::{CurrentData, RawPayload};
    use chrono::TimeZone;
    use serde_json::json;

    fn keys(sensors: &[SensorDescription]) -> Vec<&str> {
        sensors.iter().map(|s| s.key.as_str()).collect()
    }

    fn now() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2024, 5, 10, 12, 0, 0)
            .unwrap()
    }

    fn local_snapshot(body: serde_json::Value) -> Snapshot {
        let data = CurrentData::from_json(body).unwrap();
        Decoder::default()
            .decode_at(RawPayload::Current(data), DeviceModel::LocalApi, now())
            .unwrap()
    }

    #[test]
    fn test_local_catalogue() {
        let one = catalogue(DeviceModel::LocalApi, 1);
        assert_eq!(one.len(), 20);
        assert!(keys(&one).contains(&"holiday_mode_start"));
        assert!(!keys(&one).contains(&"capacity_2"));

        let duplex = catalogue(DeviceModel::LocalApi, 2);
        assert_eq!(duplex.len(), 23);
        assert!(keys(&duplex).contains(&"counter_regeneration_2"));
    }

    #[test]
    fn test_silk_catalogue() {
        let silk = catalogue(DeviceModel::Silk, 1);
        assert_eq!(silk.len(), 8 + 3 + UNKNOWN_REGISTERS.len());
        assert!(keys(&silk).contains(&"silk_register_47"));
        assert!(!keys(&silk).contains(&"errors"));

        let registers = catalogue(DeviceModel::SilkRegisters, 1);
        assert!(keys(&registers).contains(&"capacity_percentage"));
        assert!(!keys(&silk).contains(&"capacity_percentage"));
    }

    #[test]
    fn test_local_values() {
        let snapshot = local_snapshot(json!({
            "ActiveErrorIDs": "1, 4, 18",
            "CurrentFlowrate_l_h": 1500,
            "HardnessIN_dH": 20,
            "HardnessOUT_dH": 6,
            "HolidayModeStartTime": 1,
            "Columns": 1
        }));
        let set = SensorSet::new("entry", "Perla", &snapshot);

        assert_eq!(set.value("current_flow"), Some(&SensorValue::Float(1.5)));
        assert_eq!(set.value("errors"), Some(&SensorValue::Text("OFFLINE_MOTOR_1".into())));
        assert_eq!(
            set.value("warnings"),
            Some(&SensorValue::Text("REGENERATIV_20,MAINTENANCE_CUSTOMER".into()))
        );
        assert_eq!(set.value("state"), Some(&SensorValue::Text("ERROR".into())));
        assert_eq!(set.value("holiday_mode"), Some(&SensorValue::Boolean(true)));
        assert_eq!(set.value("holiday_mode_start"), Some(&SensorValue::Null));
        assert_eq!(set.get("hardness_in").unwrap().unique_id, "entry_hardness_in");
    }

    #[test]
    fn test_device_info() {
        let snapshot = local_snapshot(json!({ "Columns": 2, "FirmwareVersion": "2.0206" }));
        let info = DeviceInfo::new("abc", "Kitchen", &snapshot);
        assert_eq!(info.model, "Perla Duplex");
        assert_eq!(info.sw_version, "2.0206");
        assert_eq!(info.manufacturer, "BWT");

        let snapshot = Decoder::default()
            .decode_at(RawPayload::Registers(vec![]), DeviceModel::SilkRegisters, now())
            .unwrap();
        let info = DeviceInfo::new("abc", "Cellar", &snapshot);
        assert_eq!(info.model, "Perla Water Softener");
        assert_eq!(info.sw_version, "Unknown");
    }

    #[test]
    fn test_register_passthrough() {
        let mut registers = vec![0; 48];
        registers[5] = 77;
        let snapshot = Decoder::default()
            .decode_at(RawPayload::Registers(registers), DeviceModel::Silk, now())
            .unwrap();
        let set = SensorSet::new("e", "Perla", &snapshot);
        assert_eq!(set.value("silk_register_5"), Some(&SensorValue::Integer(77)));

        let short = Decoder::default()
            .decode_at(RawPayload::Registers(vec![1, 2]), DeviceModel::Silk, now())
            .unwrap();
        let set = SensorSet::new("e", "Perla", &short);
        assert_eq!(set.value("silk_register_5"), Some(&SensorValue::Null));
        assert_eq!(set.value("silk_register_1"), Some(&SensorValue::Integer(2)));
    }

    #[test]
    fn test_failed_refresh_keeps_values() {
        let snapshot = local_snapshot(json!({ "CurrentFlowrate_l_h": 500 }));
        let mut set = SensorSet::new("e", "Perla", &snapshot);

        let mut state = PollState {
            snapshot: Some(std::sync::Arc::new(local_snapshot(json!({ "CurrentFlowrate_l_h": 0 })))),
            status: crate::scheduler::UpdateStatus::Unavailable("timeout".into()),
            interval: crate::interval::PollInterval::min(),
            refreshed_at: None,
        };
        set.on_update(&state);
        assert!(!set.is_available());
        assert_eq!(set.value("current_flow"), Some(&SensorValue::Float(0.5)));

        state.status = crate::scheduler::UpdateStatus::Available;
        set.on_update(&state);
        assert!(set.is_available());
        assert_eq!(set.value("current_flow"), Some(&SensorValue::Float(0.0)));
        assert_eq!(set.updates(), 1);
    }
}
