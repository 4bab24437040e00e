//! CayenneLPP telemetry.
//!
//! A telemetry payload is a sequence of `channel (u8) | type (u8) | value`
//! records. Value width and scaling depend on the type; all multi-byte values
//! are big-endian. There is no per-record length, so a type outside the
//! registry below ends decoding.

use serde::Serialize;

use crate::buffer::{BufferReader, BufferWriter};
use crate::PacketError;

pub const LPP_GENERIC_SENSOR: u8 = 100;
pub const LPP_LUMINOSITY: u8 = 101;
pub const LPP_PRESENCE: u8 = 102;
pub const LPP_TEMPERATURE: u8 = 103;
pub const LPP_RELATIVE_HUMIDITY: u8 = 104;
pub const LPP_BAROMETRIC_PRESSURE: u8 = 115;
pub const LPP_VOLTAGE: u8 = 116;
pub const LPP_CURRENT: u8 = 117;
pub const LPP_PERCENTAGE: u8 = 120;
pub const LPP_CONCENTRATION: u8 = 125;
pub const LPP_POWER: u8 = 128;
pub const LPP_GPS: u8 = 136;

/// Telemetry types the decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TelemetryType {
    GenericSensor,
    Luminosity,
    Presence,
    Temperature,
    RelativeHumidity,
    BarometricPressure,
    Voltage,
    Current,
    Percentage,
    Concentration,
    Power,
    Gps,
}

impl TelemetryType {
    /// Look up a registry entry by its LPP type code.
    pub fn from_code(code: u8) -> Option<Self> {
        let kind = match code {
            LPP_GENERIC_SENSOR => TelemetryType::GenericSensor,
            LPP_LUMINOSITY => TelemetryType::Luminosity,
            LPP_PRESENCE => TelemetryType::Presence,
            LPP_TEMPERATURE => TelemetryType::Temperature,
            LPP_RELATIVE_HUMIDITY => TelemetryType::RelativeHumidity,
            LPP_BAROMETRIC_PRESSURE => TelemetryType::BarometricPressure,
            LPP_VOLTAGE => TelemetryType::Voltage,
            LPP_CURRENT => TelemetryType::Current,
            LPP_PERCENTAGE => TelemetryType::Percentage,
            LPP_CONCENTRATION => TelemetryType::Concentration,
            LPP_POWER => TelemetryType::Power,
            LPP_GPS => TelemetryType::Gps,
            _ => return None,
        };
        Some(kind)
    }

    pub fn code(self) -> u8 {
        match self {
            TelemetryType::GenericSensor => LPP_GENERIC_SENSOR,
            TelemetryType::Luminosity => LPP_LUMINOSITY,
            TelemetryType::Presence => LPP_PRESENCE,
            TelemetryType::Temperature => LPP_TEMPERATURE,
            TelemetryType::RelativeHumidity => LPP_RELATIVE_HUMIDITY,
            TelemetryType::BarometricPressure => LPP_BAROMETRIC_PRESSURE,
            TelemetryType::Voltage => LPP_VOLTAGE,
            TelemetryType::Current => LPP_CURRENT,
            TelemetryType::Percentage => LPP_PERCENTAGE,
            TelemetryType::Concentration => LPP_CONCENTRATION,
            TelemetryType::Power => LPP_POWER,
            TelemetryType::Gps => LPP_GPS,
        }
    }

    fn read_value(self, reader: &mut BufferReader<'_>) -> Result<TelemetryValue, PacketError> {
        use TelemetryValue::{Decimal, Integer};

        let value = match self {
            TelemetryType::GenericSensor => Integer(reader.read_u32_be()? as i64),
            TelemetryType::Luminosity => Integer(reader.read_i16_be()? as i64),
            TelemetryType::Presence => Integer(reader.read_u8()? as i64),
            TelemetryType::Temperature => Decimal(reader.read_i16_be()? as f64 / 10.0),
            TelemetryType::RelativeHumidity => Decimal(reader.read_u8()? as f64 / 2.0),
            TelemetryType::BarometricPressure => Decimal(reader.read_u16_be()? as f64 / 10.0),
            // Signed on purpose so negative readings survive.
            TelemetryType::Voltage => Decimal(reader.read_i16_be()? as f64 / 100.0),
            TelemetryType::Current => Decimal(reader.read_i16_be()? as f64 / 1000.0),
            TelemetryType::Percentage => Integer(reader.read_u8()? as i64),
            TelemetryType::Concentration => Integer(reader.read_u16_be()? as i64),
            TelemetryType::Power => Integer(reader.read_u16_be()? as i64),
            TelemetryType::Gps => TelemetryValue::Gps {
                latitude: reader.read_i24_be()? as f64 / 10_000.0,
                longitude: reader.read_i24_be()? as f64 / 10_000.0,
                altitude: reader.read_i24_be()? as f64 / 100.0,
            },
        };
        Ok(value)
    }
}

/// A decoded telemetry value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    /// Unscaled integer reading.
    Integer(i64),
    /// Scaled reading.
    Decimal(f64),
    /// GPS fix in degrees and metres.
    Gps {
        latitude: f64,
        longitude: f64,
        altitude: f64,
    },
}

impl TelemetryValue {
    /// Scalar value as a float; `None` for GPS fixes.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            TelemetryValue::Integer(v) => Some(v as f64),
            TelemetryValue::Decimal(v) => Some(v),
            TelemetryValue::Gps { .. } => None,
        }
    }
}

/// One telemetry record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TelemetryRecord {
    pub channel: u8,
    #[serde(rename = "type")]
    pub lpp_type: u8,
    pub value: TelemetryValue,
}

impl TelemetryRecord {
    pub fn kind(&self) -> Option<TelemetryType> {
        TelemetryType::from_code(self.lpp_type)
    }
}

/// Decode every record in a telemetry payload.
///
/// Stops at a `0, 0` channel/type pair, at the first unsupported type, or at a
/// record whose value is cut short, returning whatever was decoded before.
pub fn decode(data: &[u8]) -> Vec<TelemetryRecord> {
    let mut reader = BufferReader::new(data);
    let mut records = Vec::new();

    while reader.remaining() >= 2 {
        let offset = reader.offset();
        let (channel, lpp_type) = match (reader.read_u8(), reader.read_u8()) {
            (Ok(channel), Ok(lpp_type)) => (channel, lpp_type),
            _ => break,
        };

        if channel == 0 && lpp_type == 0 {
            break;
        }

        let Some(kind) = TelemetryType::from_code(lpp_type) else {
            log::debug!(
                "unsupported telemetry type {} at offset {}, stopping",
                lpp_type,
                offset
            );
            break;
        };

        match kind.read_value(&mut reader) {
            Ok(value) => records.push(TelemetryRecord {
                channel,
                lpp_type,
                value,
            }),
            Err(e) => {
                log::debug!("truncated telemetry record at offset {}: {}", offset, e);
                break;
            }
        }
    }

    records
}

/// Builds CayenneLPP payloads for the supported registry types.
#[derive(Debug, Clone, Default)]
pub struct TelemetryEncoder {
    writer: BufferWriter,
}

impl TelemetryEncoder {
    pub fn new() -> Self {
        TelemetryEncoder::default()
    }

    fn header(&mut self, channel: u8, kind: TelemetryType) -> &mut BufferWriter {
        self.writer.write_byte(channel);
        self.writer.write_byte(kind.code());
        &mut self.writer
    }

    pub fn add_generic_sensor(&mut self, channel: u8, value: u32) -> &mut Self {
        self.header(channel, TelemetryType::GenericSensor).write_u32_be(value);
        self
    }

    pub fn add_luminosity(&mut self, channel: u8, lux: i16) -> &mut Self {
        self.header(channel, TelemetryType::Luminosity).write_i16_be(lux);
        self
    }

    pub fn add_presence(&mut self, channel: u8, present: u8) -> &mut Self {
        self.header(channel, TelemetryType::Presence).write_byte(present);
        self
    }

    /// Temperature in degrees Celsius, 0.1 resolution.
    pub fn add_temperature(&mut self, channel: u8, celsius: f64) -> &mut Self {
        self.header(channel, TelemetryType::Temperature)
            .write_i16_be((celsius * 10.0).round() as i16);
        self
    }

    /// Relative humidity in percent, 0.5 resolution.
    pub fn add_relative_humidity(&mut self, channel: u8, percent: f64) -> &mut Self {
        self.header(channel, TelemetryType::RelativeHumidity)
            .write_byte((percent * 2.0).round() as u8);
        self
    }

    /// Pressure in hPa, 0.1 resolution.
    pub fn add_barometric_pressure(&mut self, channel: u8, hpa: f64) -> &mut Self {
        self.header(channel, TelemetryType::BarometricPressure)
            .write_u16_be((hpa * 10.0).round() as u16);
        self
    }

    /// Voltage in volts, 0.01 resolution.
    pub fn add_voltage(&mut self, channel: u8, volts: f64) -> &mut Self {
        self.header(channel, TelemetryType::Voltage)
            .write_i16_be((volts * 100.0).round() as i16);
        self
    }

    /// Current in amps, 0.001 resolution.
    pub fn add_current(&mut self, channel: u8, amps: f64) -> &mut Self {
        self.header(channel, TelemetryType::Current)
            .write_i16_be((amps * 1000.0).round() as i16);
        self
    }

    pub fn add_percentage(&mut self, channel: u8, percent: u8) -> &mut Self {
        self.header(channel, TelemetryType::Percentage).write_byte(percent);
        self
    }

    pub fn add_concentration(&mut self, channel: u8, ppm: u16) -> &mut Self {
        self.header(channel, TelemetryType::Concentration).write_u16_be(ppm);
        self
    }

    pub fn add_power(&mut self, channel: u8, watts: u16) -> &mut Self {
        self.header(channel, TelemetryType::Power).write_u16_be(watts);
        self
    }

    /// GPS fix: degrees with 0.0001 resolution, altitude in metres with 0.01.
    pub fn add_gps(&mut self, channel: u8, latitude: f64, longitude: f64, altitude: f64) -> &mut Self {
        let writer = self.header(channel, TelemetryType::Gps);
        writer.write_i24_be((latitude * 10_000.0).round() as i32);
        writer.write_i24_be((longitude * 10_000.0).round() as i32);
        writer.write_i24_be((altitude * 100.0).round() as i32);
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.writer.as_bytes()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_negative_voltage_round_trip() {
        let mut encoder = TelemetryEncoder::new();
        encoder.add_voltage(1, -1.5);
        assert_eq!(encoder.as_bytes(), &[1, LPP_VOLTAGE, 0xFF, 0x6A]);

        let records = decode(encoder.as_bytes());
        assert_eq!(
            records,
            vec![TelemetryRecord {
                channel: 1,
                lpp_type: LPP_VOLTAGE,
                value: TelemetryValue::Decimal(-1.5),
            }]
        );
        assert_eq!(records[0].kind(), Some(TelemetryType::Voltage));
    }

    #[test]
    fn test_mixed_records() {
        let mut encoder = TelemetryEncoder::new();
        encoder
            .add_temperature(2, 21.5)
            .add_relative_humidity(2, 47.5)
            .add_barometric_pressure(3, 1013.2)
            .add_current(4, 0.25)
            .add_percentage(5, 80)
            .add_generic_sensor(6, 4_000_000_000)
            .add_luminosity(7, -12)
            .add_presence(8, 1)
            .add_concentration(9, 412)
            .add_power(10, 60);

        let records = decode(&encoder.into_bytes());
        let values: Vec<f64> = records.iter().filter_map(|r| r.value.as_f64()).collect();
        assert_eq!(values.len(), 10);
        assert!(close(values[0], 21.5));
        assert!(close(values[1], 47.5));
        assert!(close(values[2], 1013.2));
        assert!(close(values[3], 0.25));
        assert_eq!(records[4].value, TelemetryValue::Integer(80));
        assert_eq!(records[5].value, TelemetryValue::Integer(4_000_000_000));
        assert_eq!(records[6].value, TelemetryValue::Integer(-12));
        assert_eq!(records[7].value, TelemetryValue::Integer(1));
        assert_eq!(records[8].value, TelemetryValue::Integer(412));
        assert_eq!(records[9].value, TelemetryValue::Integer(60));
        assert_eq!(records[9].channel, 10);
    }

    #[test]
    fn test_gps_record() {
        let mut encoder = TelemetryEncoder::new();
        encoder.add_gps(1, -33.8688, 151.2093, 58.25);
        let bytes = encoder.into_bytes();
        assert_eq!(bytes.len(), 2 + 9);

        let records = decode(&bytes);
        match records[0].value {
            TelemetryValue::Gps {
                latitude,
                longitude,
                altitude,
            } => {
                assert!(close(latitude, -33.8688));
                assert!(close(longitude, 151.2093));
                assert!(close(altitude, 58.25));
            }
            other => panic!("Expected GPS value, got {:?}", other),
        }
        assert_eq!(records[0].value.as_f64(), None);
    }

    #[test]
    fn test_stops_at_zero_pair() {
        let mut encoder = TelemetryEncoder::new();
        encoder.add_percentage(1, 50);
        let mut bytes = encoder.into_bytes();
        bytes.extend_from_slice(&[0, 0, 1, LPP_PERCENTAGE, 60]);

        assert_eq!(decode(&bytes).len(), 1);
    }

    #[test]
    fn test_stops_at_unknown_type() {
        let mut encoder = TelemetryEncoder::new();
        encoder.add_percentage(1, 50);
        let mut bytes = encoder.into_bytes();
        // Accelerometer (113) is not in the registry.
        bytes.extend_from_slice(&[2, 113, 0, 1, 0, 2, 0, 3]);
        bytes.extend_from_slice(&[3, LPP_PERCENTAGE, 70]);

        let records = decode(&bytes);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].channel, 1);
    }

    #[test]
    fn test_truncated_record_is_dropped() {
        let records = decode(&[1, LPP_PERCENTAGE, 9, 2, LPP_VOLTAGE, 0x01]);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].value, TelemetryValue::Integer(9));
    }

    #[test]
    fn test_single_trailing_byte_is_ignored() {
        assert!(decode(&[1]).is_empty());
        assert!(decode(&[]).is_empty());
    }

    #[test]
    fn test_serialize_records() {
        let mut encoder = TelemetryEncoder::new();
        encoder.add_voltage(1, 3.7).add_gps(2, 1.0, 2.0, 3.0);
        let json = serde_json::to_value(decode(encoder.as_bytes())).unwrap();

        assert_eq!(json[0]["channel"], 1);
        assert_eq!(json[0]["type"], LPP_VOLTAGE);
        assert_eq!(json[0]["value"], 3.7);
        assert_eq!(json[1]["value"]["latitude"], 1.0);
        assert_eq!(json[1]["value"]["altitude"], 3.0);
    }
}
