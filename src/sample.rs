use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde_derive::Deserialize;
use serde_json::{Map, Value};

use crate::device_schema::{HardwareVariant, MeasurementField, ERROR_CODE_FIELD};
use crate::error::Hs110Error;

/// Latest realtime readout of the plug.
///
/// Values are kept in the units the hardware reports them in. The all-zero
/// sample means nothing has been measured yet, or the last reply was garbage.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample {
    pub current: f64,
    pub voltage: f64,
    pub power: f64,
    pub cumulative_energy: f64,
    pub error_code: i64,
}

// {"emeter":{"get_realtime":{...}}}
#[derive(Debug, Deserialize)]
struct RealtimeReply {
    emeter: Emeter,
}

#[derive(Debug, Deserialize)]
struct Emeter {
    get_realtime: Map<String, Value>,
}

impl Sample {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::empty()
    }

    pub fn value(&self, field: MeasurementField) -> f64 {
        match field {
            MeasurementField::Current => self.current,
            MeasurementField::Voltage => self.voltage,
            MeasurementField::Power => self.power,
            MeasurementField::CumulativeEnergy => self.cumulative_energy,
        }
    }

    /// Parses a decrypted realtime reply, detecting which hardware revision
    /// produced it.
    pub fn from_reply(text: &str) -> Result<(Self, HardwareVariant), Hs110Error> {
        let reply: RealtimeReply = serde_json::from_str(text)
            .map_err(|e| Hs110Error::Decode(format!("not a realtime reply: {e}")))?;
        let realtime = reply.emeter.get_realtime;
        let variant = HardwareVariant::detect(&realtime);

        let read = |field: MeasurementField| -> Result<f64, Hs110Error> {
            let name = variant.field_name(field);
            let value = realtime
                .get(name)
                .ok_or_else(|| Hs110Error::Decode(format!("missing field `{name}`")))?
                .as_f64()
                .ok_or_else(|| Hs110Error::Decode(format!("field `{name}` is not a number")))?;
            if !value.is_finite() || value < 0.0 {
                return Err(Hs110Error::Decode(format!(
                    "field `{name}` has out of range value {value}"
                )));
            }
            Ok(value)
        };

        let error_code = match realtime.get(ERROR_CODE_FIELD) {
            None => 0,
            Some(code) => code.as_i64().ok_or_else(|| {
                Hs110Error::Decode(format!("field `{ERROR_CODE_FIELD}` is not an integer"))
            })?,
        };

        let sample = Sample {
            current: read(MeasurementField::Current)?,
            voltage: read(MeasurementField::Voltage)?,
            power: read(MeasurementField::Power)?,
            cumulative_energy: read(MeasurementField::CumulativeEnergy)?,
            error_code,
        };
        Ok((sample, variant))
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "current={}, voltage={}, power={}, total={}, err_code={}",
            self.current, self.voltage, self.power, self.cumulative_energy, self.error_code
        )
    }
}

/// Read-only handle on the sample owned by a `DeviceClient`.
///
/// Cheap to clone; every snapshot is a whole sample taken under one lock.
#[derive(Debug, Clone, Default)]
pub struct SampleReader {
    inner: Arc<RwLock<Sample>>,
}

impl SampleReader {
    pub fn snapshot(&self) -> Sample {
        *self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn replace(&self, sample: Sample) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = sample;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARIANT2_REPLY: &str = r#"{"emeter":{"get_realtime":{"voltage_mv":229865,"current_ma":1110,"power_mw":231866,"total_wh":228,"err_code":0}}}"#;
    const VARIANT1_REPLY: &str = r#"{"emeter":{"get_realtime":{"voltage":229.865,"current":1.11,"power":231.866,"total":0.228,"err_code":0}}}"#;

    #[test]
    fn test_parse_variant2_reply() {
        let (sample, variant) = Sample::from_reply(VARIANT2_REPLY).unwrap();
        assert_eq!(variant, HardwareVariant::Variant2);
        assert_eq!(
            sample,
            Sample {
                current: 1110.0,
                voltage: 229865.0,
                power: 231866.0,
                cumulative_energy: 228.0,
                error_code: 0,
            }
        );
    }

    #[test]
    fn test_parse_variant1_reply() {
        let (sample, variant) = Sample::from_reply(VARIANT1_REPLY).unwrap();
        assert_eq!(variant, HardwareVariant::Variant1);
        assert_eq!(sample.current, 1.11);
        assert_eq!(sample.voltage, 229.865);
        assert_eq!(sample.power, 231.866);
        assert_eq!(sample.cumulative_energy, 0.228);
    }

    #[test]
    fn test_missing_error_code_defaults_to_zero() {
        let reply = r#"{"emeter":{"get_realtime":{"voltage":1,"current":2,"power":3,"total":4}}}"#;
        let (sample, _) = Sample::from_reply(reply).unwrap();
        assert_eq!(sample.error_code, 0);
        assert_eq!(sample.value(MeasurementField::CumulativeEnergy), 4.0);
    }

    #[test]
    fn test_rejects_malformed_replies() {
        let bad = [
            "",
            "not json",
            r#"{"emeter":{"err_code":-1,"err_msg":"module not support"}}"#,
            r#"{"system":{"get_sysinfo":{}}}"#,
            r#"{"emeter":{"get_realtime":{"current_ma":1,"voltage_mv":2,"power_mw":3}}}"#,
            r#"{"emeter":{"get_realtime":{"current":"1","voltage":2,"power":3,"total":4}}}"#,
            r#"{"emeter":{"get_realtime":{"current":-1,"voltage":2,"power":3,"total":4}}}"#,
            r#"{"emeter":{"get_realtime":{"current":1,"voltage":2,"power":3,"total":4,"err_code":"x"}}}"#,
        ];
        for reply in bad {
            assert!(
                matches!(Sample::from_reply(reply), Err(Hs110Error::Decode(_))),
                "reply {reply:?} should not decode"
            );
        }
    }

    #[test]
    fn test_empty_sample() {
        let sample = Sample::empty();
        assert!(sample.is_empty());
        for field in MeasurementField::ALL {
            assert_eq!(sample.value(field), 0.0);
        }
        let (parsed, _) = Sample::from_reply(VARIANT2_REPLY).unwrap();
        assert!(!parsed.is_empty());
    }

    #[test]
    fn test_display() {
        let (sample, _) = Sample::from_reply(VARIANT2_REPLY).unwrap();
        assert_eq!(
            sample.to_string(),
            "current=1110, voltage=229865, power=231866, total=228, err_code=0"
        );
    }

    #[test]
    fn test_reader_sees_whole_replacement() {
        let reader = SampleReader::default();
        let other = reader.clone();
        assert!(reader.snapshot().is_empty());

        let (sample, _) = Sample::from_reply(VARIANT2_REPLY).unwrap();
        other.replace(sample);
        assert_eq!(reader.snapshot(), sample);
    }
}
