//! Raw payloads returned by the device transports.
//!
//! A poll yields either a flat register array (Silk firmwares) or the
//! structured record of the local REST API. Both are immutable once fetched.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};

/// One raw poll result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawPayload {
    /// 0-indexed register values; trailing entries may be missing.
    Registers(Vec<i64>),
    /// Structured local API record.
    Current(CurrentData),
}

/// Water hardness in the units reported by the local API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Hardness {
    /// German degrees (°dH)
    pub dh: i64,
    /// French degrees (°fH)
    pub fh: i64,
    pub caco3: i64,
    pub mmol_l: f64,
}

/// Overall device state derived from the active error list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    Ok,
    Warning,
    Error,
}

impl DeviceStatus {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }

    /// All states, in display order.
    pub fn options() -> [&'static str; 3] {
        ["OK", "WARNING", "ERROR"]
    }
}

/// An error or warning id reported by the local API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceFault(pub u32);

/// Known fault ids: (id, name, fatal).
const FAULT_TABLE: &[(u32, &str, bool)] = &[
    (1, "OFFLINE_MOTOR_1", true),
    (2, "OFFLINE_MOTOR_2", true),
    (3, "OFFLINE_MOTOR_BLEND", true),
    (4, "REGENERATIV_20", false),
    (5, "OVERCURRENT_MOTOR_1", true),
    (6, "OVERCURRENT_MOTOR_2", true),
    (7, "OVERCURRENT_MOTOR_3", true),
    (8, "OVERCURRENT_VALVE", true),
    (9, "STOP_VOLUME", true),
    (10, "STOP_SENSOR", true),
    (11, "CONSTANT_FLOW", false),
    (12, "LOW_PRESSURE", true),
    (13, "PISTON_POSITION", true),
    (14, "ELECTRONIC", true),
    (15, "INSUFFICIENT_REGENERATIV", true),
    (16, "STOP_WIRELESS_SENSOR", true),
    (17, "REGENERATIV_0", true),
    (18, "MAINTENANCE_CUSTOMER", false),
    (19, "INSPECTION_CUSTOMER", false),
    (20, "MAINTENANCE_SERVICE", false),
    (21, "MINERALS_LOW", false),
    (22, "MINERALS_0", true),
];

impl DeviceFault {
    fn lookup(&self) -> Option<&'static (u32, &'static str, bool)> {
        FAULT_TABLE.iter().find(|(id, _, _)| *id == self.0)
    }

    pub fn name(&self) -> String {
        match self.lookup() {
            Some((_, name, _)) => (*name).to_string(),
            None => format!("UNKNOWN_{}", self.0),
        }
    }

    /// Fatal faults stop water treatment; the rest are warnings.
    /// Unknown ids count as fatal.
    pub fn is_fatal(&self) -> bool {
        self.lookup().map(|(_, _, fatal)| *fatal).unwrap_or(true)
    }
}

/// Decoded record of `GET /api/GetCurrentData`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentData {
    pub errors: Vec<DeviceFault>,
    pub blended_total: i64,
    /// Remaining capacity of column 1 in ml·°dH
    pub capacity_1: i64,
    pub capacity_2: i64,
    /// Current flow in l/h
    pub current_flow: i64,
    pub columns: u8,
    pub firmware_version: String,
    pub in_hardness: Hardness,
    pub out_hardness: Hardness,
    /// 0 = off, 1 = on, anything larger is the unix start time
    pub holiday_mode: i64,
    pub regeneration_last_1: Option<NaiveDateTime>,
    pub regeneration_last_2: Option<NaiveDateTime>,
    pub regeneration_count_1: i64,
    pub regeneration_count_2: i64,
    pub regenerativ_level: i64,
    pub regenerativ_days: i64,
    pub regenerativ_total: i64,
    pub service_customer: Option<NaiveDateTime>,
    pub service_technician: Option<NaiveDateTime>,
    pub treated_day: i64,
    pub treated_month: i64,
    pub treated_year: i64,
}

impl CurrentData {
    /// Parse the JSON body returned by the local API.
    pub fn from_json(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        let wire: CurrentDataWire = serde_json::from_value(value)?;
        Ok(wire.into())
    }

    pub fn status(&self) -> DeviceStatus {
        if self.errors.iter().any(|e| e.is_fatal()) {
            DeviceStatus::Error
        } else if !self.errors.is_empty() {
            DeviceStatus::Warning
        } else {
            DeviceStatus::Ok
        }
    }
}

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn parse_date(raw: Option<String>) -> Option<NaiveDateTime> {
    raw.and_then(|s| NaiveDateTime::parse_from_str(s.trim(), DATE_FORMAT).ok())
}

/// The error list arrives either as an array or as a comma separated string.
fn deserialize_fault_ids<'de, D>(deserializer: D) -> Result<Vec<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Ids {
        List(Vec<u32>),
        Text(String),
    }

    Ok(match Option::<Ids>::deserialize(deserializer)? {
        Some(Ids::List(ids)) => ids,
        Some(Ids::Text(text)) => text
            .split(',')
            .filter_map(|part| part.trim().parse().ok())
            .collect(),
        None => Vec::new(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CurrentDataWire {
    #[serde(rename = "ActiveErrorIDs", default, deserialize_with = "deserialize_fault_ids")]
    active_error_ids: Vec<u32>,
    #[serde(rename = "BlendedWaterSinceSetup_l", default)]
    blended_water_since_setup: i64,
    #[serde(rename = "CapacityColumn1_ml_dH", default)]
    capacity_column1: i64,
    #[serde(rename = "CapacityColumn2_ml_dH", default)]
    capacity_column2: i64,
    #[serde(rename = "CurrentFlowrate_l_h", default)]
    current_flowrate: i64,
    #[serde(default = "default_columns")]
    columns: u8,
    #[serde(default)]
    firmware_version: String,
    #[serde(rename = "HardnessIN_dH", default)]
    hardness_in_dh: i64,
    #[serde(rename = "HardnessIN_fH", default)]
    hardness_in_fh: i64,
    #[serde(rename = "HardnessIN_CaCO3", default)]
    hardness_in_caco3: i64,
    #[serde(rename = "HardnessIN_mmol_l", default)]
    hardness_in_mmol: f64,
    #[serde(rename = "HardnessOUT_dH", default)]
    hardness_out_dh: i64,
    #[serde(rename = "HardnessOUT_fH", default)]
    hardness_out_fh: i64,
    #[serde(rename = "HardnessOUT_CaCO3", default)]
    hardness_out_caco3: i64,
    #[serde(rename = "HardnessOUT_mmol_l", default)]
    hardness_out_mmol: f64,
    #[serde(rename = "HolidayModeStartTime", default)]
    holiday_mode: i64,
    #[serde(default)]
    last_regeneration_column1: Option<String>,
    #[serde(default)]
    last_regeneration_column2: Option<String>,
    #[serde(rename = "RegenerationCountSinceSetup_Column1", default)]
    regeneration_count_1: i64,
    #[serde(rename = "RegenerationCountSinceSetup_Column2", default)]
    regeneration_count_2: i64,
    #[serde(default)]
    regenerativ_level: i64,
    #[serde(default)]
    regenerativ_remaining_days: i64,
    #[serde(rename = "RegenerativSinceSetup_g", default)]
    regenerativ_since_setup: i64,
    #[serde(default)]
    service_customer: Option<String>,
    #[serde(default)]
    service_technician: Option<String>,
    #[serde(rename = "TreatedWaterDay_l", default)]
    treated_day: i64,
    #[serde(rename = "TreatedWaterMonth_l", default)]
    treated_month: i64,
    #[serde(rename = "TreatedWaterYear_l", default)]
    treated_year: i64,
}

fn default_columns() -> u8 {
    1
}

impl From<CurrentDataWire> for CurrentData {
    fn from(w: CurrentDataWire) -> Self {
        Self {
            errors: w.active_error_ids.into_iter().map(DeviceFault).collect(),
            blended_total: w.blended_water_since_setup,
            capacity_1: w.capacity_column1,
            capacity_2: w.capacity_column2,
            current_flow: w.current_flowrate,
            columns: w.columns,
            firmware_version: w.firmware_version,
            in_hardness: Hardness {
                dh: w.hardness_in_dh,
                fh: w.hardness_in_fh,
                caco3: w.hardness_in_caco3,
                mmol_l: w.hardness_in_mmol,
            },
            out_hardness: Hardness {
                dh: w.hardness_out_dh,
                fh: w.hardness_out_fh,
                caco3: w.hardness_out_caco3,
                mmol_l: w.hardness_out_mmol,
            },
            holiday_mode: w.holiday_mode,
            regeneration_last_1: parse_date(w.last_regeneration_column1),
            regeneration_last_2: parse_date(w.last_regeneration_column2),
            regeneration_count_1: w.regeneration_count_1,
            regeneration_count_2: w.regeneration_count_2,
            regenerativ_level: w.regenerativ_level,
            regenerativ_days: w.regenerativ_remaining_days,
            regenerativ_total: w.regenerativ_since_setup,
            service_customer: parse_date(w.service_customer),
            service_technician: parse_date(w.service_technician),
            treated_day: w.treated_day,
            treated_month: w.treated_month,
            treated_year: w.treated_year,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_current_data() {
        let data = CurrentData::from_json(json!({
            "ActiveErrorIDs": "4, 18",
            "BlendedWaterSinceSetup_l": 123456,
            "CapacityColumn1_ml_dH": 1300000,
            "Columns": 2,
            "CurrentFlowrate_l_h": 420,
            "FirmwareVersion": "2.0206",
            "HardnessIN_dH": 20,
            "HardnessOUT_dH": 7,
            "LastRegenerationColumn1": "2024-03-01 02:15:00",
            "ServiceCustomer": "not a date",
            "TreatedWaterDay_l": 130
        }))
        .unwrap();

        assert_eq!(data.errors, vec![DeviceFault(4), DeviceFault(18)]);
        assert_eq!(data.columns, 2);
        assert_eq!(data.current_flow, 420);
        assert_eq!(data.in_hardness.dh, 20);
        assert_eq!(data.out_hardness.dh, 7);
        assert!(data.regeneration_last_1.is_some());
        assert!(data.regeneration_last_2.is_none());
        assert!(data.service_customer.is_none());
        assert_eq!(data.status(), DeviceStatus::Warning);
    }

    #[test]
    fn test_fault_ids_as_list() {
        let data = CurrentData::from_json(json!({ "ActiveErrorIDs": [1] })).unwrap();
        assert_eq!(data.status(), DeviceStatus::Error);
        assert_eq!(data.columns, 1);
    }

    #[test]
    fn test_fault_names() {
        assert_eq!(DeviceFault(12).name(), "LOW_PRESSURE");
        assert!(DeviceFault(12).is_fatal());
        assert!(!DeviceFault(21).is_fatal());
        assert_eq!(DeviceFault(999).name(), "UNKNOWN_999");
        assert!(DeviceFault(999).is_fatal());
    }

    #[test]
    fn test_empty_errors_ok() {
        let data = CurrentData::from_json(json!({ "ActiveErrorIDs": "" })).unwrap();
        assert!(data.errors.is_empty());
        assert_eq!(data.status(), DeviceStatus::Ok);
    }
}
