use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::Hs110Error;

/// Status field, named the same by every hardware revision.
pub const ERROR_CODE_FIELD: &str = "err_code";

/// Current field only reported by hardware version 2.x. Its presence is what
/// tells the two variants apart.
const MILLIAMP_CURRENT_FIELD: &str = "current_ma";

/// On-wire field naming scheme of one HS110 hardware revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HardwareVariant {
    /// Hardware version 1.x: `current`, `voltage`, `power`, `total`.
    Variant1,
    /// Hardware version 2.x: `current_ma`, `voltage_mv`, `power_mw`, `total_wh`.
    #[default]
    Variant2,
}

/// Logical measurement, independent of hardware revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementField {
    Current,
    Voltage,
    Power,
    CumulativeEnergy,
}

impl MeasurementField {
    pub const ALL: [MeasurementField; 4] = [
        MeasurementField::Current,
        MeasurementField::Voltage,
        MeasurementField::Power,
        MeasurementField::CumulativeEnergy,
    ];
}

impl FromStr for MeasurementField {
    type Err = Hs110Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current" => Ok(MeasurementField::Current),
            "voltage" => Ok(MeasurementField::Voltage),
            "power" => Ok(MeasurementField::Power),
            "cumulativeEnergy" => Ok(MeasurementField::CumulativeEnergy),
            other => Err(Hs110Error::UnknownField(other.to_string())),
        }
    }
}

impl HardwareVariant {
    /// Wire name of `field` for this hardware revision.
    pub fn field_name(self, field: MeasurementField) -> &'static str {
        match (self, field) {
            (HardwareVariant::Variant1, MeasurementField::Current) => "current",
            (HardwareVariant::Variant1, MeasurementField::Voltage) => "voltage",
            (HardwareVariant::Variant1, MeasurementField::Power) => "power",
            (HardwareVariant::Variant1, MeasurementField::CumulativeEnergy) => "total",
            (HardwareVariant::Variant2, MeasurementField::Current) => MILLIAMP_CURRENT_FIELD,
            (HardwareVariant::Variant2, MeasurementField::Voltage) => "voltage_mv",
            (HardwareVariant::Variant2, MeasurementField::Power) => "power_mw",
            (HardwareVariant::Variant2, MeasurementField::CumulativeEnergy) => "total_wh",
        }
    }

    /// Classifies the `get_realtime` object of a decoded reply.
    pub fn detect(realtime: &Map<String, Value>) -> Self {
        if realtime.contains_key(MILLIAMP_CURRENT_FIELD) {
            HardwareVariant::Variant2
        } else {
            HardwareVariant::Variant1
        }
    }
}

/// Wire name of the logical field called `logical_name` for `variant`.
pub fn field_name_for(
    variant: HardwareVariant,
    logical_name: &str,
) -> Result<&'static str, Hs110Error> {
    let field = logical_name.parse::<MeasurementField>()?;
    Ok(variant.field_name(field))
}

impl FromStr for HardwareVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "h1" | "variant1" => Ok(HardwareVariant::Variant1),
            "h2" | "variant2" => Ok(HardwareVariant::Variant2),
            other => Err(format!(
                "hardware version must be 'h1' or 'h2', got '{other}'"
            )),
        }
    }
}

impl fmt::Display for HardwareVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareVariant::Variant1 => f.write_str("h1"),
            HardwareVariant::Variant2 => f.write_str("h2"),
        }
    }
}
