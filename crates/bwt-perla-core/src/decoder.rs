//! Payload to snapshot decoding.
//!
//! Decoding is pure: the offset table comes from the decoder and the wall
//! clock is passed in, so the same inputs always yield the same snapshot.
//! Short or malformed register arrays never fail; missing slots surface as
//! absent values on the snapshot.

use chrono::{DateTime, FixedOffset, Local};

use crate::error::{PerlaError, Result};
use crate::model::DeviceModel;
use crate::payload::RawPayload;
use crate::registers::{RegisterMap, Registers};
use crate::snapshot::{LocalSnapshot, SilkRegistersSnapshot, SilkSnapshot, Snapshot};

/// Decoder holding one register table per register firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoder {
    silk: RegisterMap,
    silk_registers: RegisterMap,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new(RegisterMap::SILK, RegisterMap::SILK_REGISTERS)
    }
}

impl Decoder {
    pub fn new(silk: RegisterMap, silk_registers: RegisterMap) -> Self {
        Self {
            silk,
            silk_registers,
        }
    }

    /// Offset table used for `model`, if it is register based.
    pub fn register_map(&self, model: DeviceModel) -> Option<&RegisterMap> {
        match model {
            DeviceModel::LocalApi => None,
            DeviceModel::Silk => Some(&self.silk),
            DeviceModel::SilkRegisters => Some(&self.silk_registers),
        }
    }

    /// Decode `raw` for `model` using the current local time.
    pub fn decode(&self, raw: RawPayload, model: DeviceModel) -> Result<Snapshot> {
        self.decode_at(raw, model, Local::now().fixed_offset())
    }

    /// Decode `raw` for `model`, resolving time-of-day registers against `now`.
    ///
    /// Only a payload of the wrong shape for `model` is an error.
    pub fn decode_at(
        &self,
        raw: RawPayload,
        model: DeviceModel,
        now: DateTime<FixedOffset>,
    ) -> Result<Snapshot> {
        match (model, raw) {
            (DeviceModel::LocalApi, RawPayload::Current(data)) => {
                Ok(Snapshot::Local(LocalSnapshot::new(data, *now.offset())))
            }
            (DeviceModel::Silk, RawPayload::Registers(values)) => Ok(Snapshot::Silk(
                SilkSnapshot::new(Registers::new(values), self.silk, now),
            )),
            (DeviceModel::SilkRegisters, RawPayload::Registers(values)) => {
                Ok(Snapshot::SilkRegisters(SilkRegistersSnapshot::new(
                    Registers::new(values),
                    self.silk_registers,
                )))
            }
            (model, RawPayload::Registers(_)) => Err(PerlaError::MalformedResponse(format!(
                "{} expects a structured record, got registers",
                model
            ))),
            (model, RawPayload::Current(_)) => Err(PerlaError::MalformedResponse(format!(
                "{} expects registers, got a structured record",
                model
            ))),
        }
    }
}

/// Decode with the built-in register tables.
pub fn decode(raw: RawPayload, model: DeviceModel) -> Result<Snapshot> {
    Decoder::default().decode(raw, model)
}
