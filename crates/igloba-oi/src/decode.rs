use crate::packets::{packet_by_id, STREAM_HEADER};
use crate::types::{FieldKind, FieldSpec, PacketSpec};
use crate::{ProtocolError, Result};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SensorValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl SensorValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SensorValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SensorValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SensorValue::Float(v) => Some(*v),
            SensorValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SensorValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for SensorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorValue::Bool(b) => write!(f, "{b}"),
            SensorValue::Int(v) => write!(f, "{v}"),
            SensorValue::Float(v) => write!(f, "{v:.3}"),
            SensorValue::Text(s) => f.write_str(s),
        }
    }
}

/// Fields decoded from one sensor telegram.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub packet_id: u8,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<String>,
    pub fields: BTreeMap<String, SensorValue>,
}

impl SensorReading {
    pub fn get(&self, field: &str) -> Option<&SensorValue> {
        self.fields.get(field)
    }

    pub fn flag(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(SensorValue::as_bool)
    }

    pub(crate) fn stamp(mut self, ts: OffsetDateTime) -> Self {
        self.ts = ts
            .format(&time::format_description::well_known::Rfc3339)
            .ok();
        self
    }
}

/// Decode a payload for `packet_id`. The slice must be exactly the declared length.
pub fn decode_packet(packet_id: u8, data: &[u8]) -> Result<SensorReading> {
    let spec = packet_by_id(packet_id).ok_or(ProtocolError::UnknownPacketId(packet_id))?;
    decode_spec(spec, data)
}

pub fn decode_spec(spec: &PacketSpec, data: &[u8]) -> Result<SensorReading> {
    if data.len() != spec.len() {
        return Err(ProtocolError::MalformedPacket {
            packet_id: spec.id,
            expected: spec.len(),
            received: data.len(),
        });
    }
    let mut fields = BTreeMap::new();
    for field in spec.fields {
        fields.insert(field.name.to_string(), decode_field(field, data));
    }
    Ok(SensorReading {
        packet_id: spec.id,
        name: spec.name.to_string(),
        ts: None,
        fields,
    })
}

fn raw_be(field: &FieldSpec, data: &[u8]) -> u32 {
    let start = usize::from(field.offset);
    let end = start + usize::from(field.width);
    data[start..end]
        .iter()
        .fold(0u32, |acc, b| (acc << 8) | u32::from(*b))
}

fn sign_extend(raw: u32, width: u8) -> i64 {
    match width {
        1 => i64::from(raw as u8 as i8),
        2 => i64::from(raw as u16 as i16),
        _ => i64::from(raw as i32),
    }
}

fn decode_field(field: &FieldSpec, data: &[u8]) -> SensorValue {
    let raw = raw_be(field, data);
    match field.kind {
        FieldKind::Unsigned => SensorValue::Int(i64::from(raw)),
        FieldKind::Signed => SensorValue::Int(sign_extend(raw, field.width)),
        FieldKind::Scaled { scale, signed } => {
            let v = if signed {
                sign_extend(raw, field.width)
            } else {
                i64::from(raw)
            };
            SensorValue::Float(v as f64 * scale)
        }
        FieldKind::Flag { bit } => SensorValue::Bool((raw >> bit) & 1 == 1),
        FieldKind::Enumerated {
            shift,
            mask,
            labels,
        } => {
            let idx = ((raw >> shift) & u32::from(mask)) as usize;
            let label = labels.get(idx).copied().unwrap_or("unknown");
            SensorValue::Text(label.to_string())
        }
    }
}

/// Checksum byte that makes the low byte of the frame sum zero.
pub fn stream_checksum(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    0u8.wrapping_sub(sum)
}

/// Decode a full stream frame: `[19, n, id, data.., id, data.., checksum]`.
pub fn decode_stream_frame(frame: &[u8]) -> Result<Vec<SensorReading>> {
    if frame.len() < 3 || frame[0] != STREAM_HEADER {
        return Err(ProtocolError::InvalidFrame("bad stream header"));
    }
    let n = usize::from(frame[1]);
    if frame.len() != n + 3 {
        return Err(ProtocolError::InvalidFrame("stream length mismatch"));
    }
    if stream_checksum(frame) != 0 {
        return Err(ProtocolError::InvalidFrame("stream checksum mismatch"));
    }
    let mut body = &frame[2..2 + n];
    let mut out = Vec::new();
    while let Some((&id, rest)) = body.split_first() {
        let spec = packet_by_id(id).ok_or(ProtocolError::UnknownPacketId(id))?;
        if rest.len() < spec.len() {
            return Err(ProtocolError::MalformedPacket {
                packet_id: id,
                expected: spec.len(),
                received: rest.len(),
            });
        }
        out.push(decode_spec(spec, &rest[..spec.len()])?);
        body = &rest[spec.len()..];
    }
    Ok(out)
}

fn display<S: Serializer>(err: &ProtocolError, s: S) -> core::result::Result<S::Ok, S::Error> {
    s.collect_str(err)
}

/// A packet that could not be read during a composite query.
#[derive(Debug, Serialize)]
pub struct PacketFailure {
    pub packet_id: u8,
    #[serde(serialize_with = "display")]
    pub error: ProtocolError,
}

/// Merged fields from several packets plus the packets that failed.
#[derive(Debug, Default, Serialize)]
pub struct SensorSnapshot {
    pub fields: BTreeMap<String, SensorValue>,
    pub packets: Vec<u8>,
    pub failures: Vec<PacketFailure>,
}

impl SensorSnapshot {
    pub fn merge(&mut self, reading: SensorReading) {
        self.packets.push(reading.packet_id);
        self.fields.extend(reading.fields);
    }

    pub fn record_failure(&mut self, packet_id: u8, error: ProtocolError) {
        self.failures.push(PacketFailure { packet_id, error });
    }

    pub fn get(&self, field: &str) -> Option<&SensorValue> {
        self.fields.get(field)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packets::PACKETS;

    #[test]
    fn battery_millivolts_scale_to_volts() {
        let r = decode_packet(13, &[0x0F, 0xA0]).unwrap();
        assert_eq!(r.get("battery_voltage_mv"), Some(&SensorValue::Int(4000)));
        let v = r.get("battery_voltage_v").and_then(SensorValue::as_f64).unwrap();
        assert!((v - 4.0).abs() < 1e-9);
    }

    #[test]
    fn bump_flags_follow_bit_positions() {
        let r = decode_packet(7, &[0x00, 0b0000_0101]).unwrap();
        assert_eq!(r.flag("bump_right"), Some(true));
        assert_eq!(r.flag("bump_left"), Some(false));
        assert_eq!(r.flag("wheel_drop"), Some(true));
        assert_eq!(r.flag("drop_1"), Some(false));

        let r = decode_packet(7, &[0b0000_1010, 0x00]).unwrap();
        assert_eq!(r.flag("drop_1"), Some(true));
        assert_eq!(r.flag("drop_2"), Some(false));
        assert_eq!(r.flag("drop_3"), Some(true));
        assert_eq!(r.flag("bump_right"), Some(false));
    }

    #[test]
    fn signed_fields_use_twos_complement() {
        let r = decode_packet(17, &[0xFF, 0x38, 0x00, 0xC8]).unwrap();
        assert_eq!(
            r.get("requested_left_velocity_mm_s"),
            Some(&SensorValue::Int(-200))
        );
        assert_eq!(
            r.get("requested_right_velocity_mm_s"),
            Some(&SensorValue::Int(200))
        );
    }

    #[test]
    fn enumerations_map_to_labels() {
        let r = decode_packet(12, &[0b0000_1010]).unwrap();
        assert_eq!(r.get("charging_state").and_then(|v| v.as_str()), Some("charging"));
        assert_eq!(r.flag("charging_source_dc"), Some(false));
        assert_eq!(r.flag("charging_source_dock"), Some(true));

        let r = decode_packet(19, &[3]).unwrap();
        assert_eq!(r.get("operating_mode").and_then(|v| v.as_str()), Some("full"));

        let r = decode_packet(8, &[0b0001_0000, 0b0000_0110]).unwrap();
        assert_eq!(r.get("guide_1_signal").and_then(|v| v.as_str()), Some("dock_right"));
        assert_eq!(r.get("guide_2_signal").and_then(|v| v.as_str()), Some("dock_center"));
        assert_eq!(r.flag("guide_1_detected"), Some(true));
        assert_eq!(r.flag("guide_2_detected"), Some(false));
    }

    #[test]
    fn every_packet_decodes_its_declared_length() {
        for p in PACKETS {
            let data = vec![0u8; p.len()];
            let r = decode_spec(p, &data).unwrap();
            assert_eq!(r.fields.len(), p.fields.len(), "packet {}", p.id);
        }
    }

    #[test]
    fn length_mismatch_is_malformed() {
        assert!(matches!(
            decode_packet(13, &[0x0F]),
            Err(ProtocolError::MalformedPacket {
                packet_id: 13,
                expected: 2,
                received: 1
            })
        ));
        assert!(matches!(
            decode_packet(255, &[]),
            Err(ProtocolError::UnknownPacketId(255))
        ));
    }

    #[test]
    fn stream_frame_decodes_each_packet() {
        let mut frame = vec![STREAM_HEADER, 5, 13, 0x0F, 0xA0, 19, 2];
        frame.push(stream_checksum(&frame));
        let readings = decode_stream_frame(&frame).unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].packet_id, 13);
        assert_eq!(
            readings[1].get("operating_mode").and_then(|v| v.as_str()),
            Some("safe")
        );
    }

    #[test]
    fn stream_frame_rejects_bad_checksum_and_header() {
        let mut frame = vec![STREAM_HEADER, 2, 19, 1];
        frame.push(stream_checksum(&frame).wrapping_add(1));
        assert!(matches!(
            decode_stream_frame(&frame),
            Err(ProtocolError::InvalidFrame("stream checksum mismatch"))
        ));
        assert!(matches!(
            decode_stream_frame(&[0x42, 0, 0]),
            Err(ProtocolError::InvalidFrame("bad stream header"))
        ));
    }

    #[test]
    fn stream_frame_rejects_truncated_packet() {
        let mut frame = vec![STREAM_HEADER, 2, 13, 0x0F];
        frame.push(stream_checksum(&frame));
        assert!(matches!(
            decode_stream_frame(&frame),
            Err(ProtocolError::MalformedPacket { packet_id: 13, .. })
        ));
    }

    #[test]
    fn snapshot_merges_and_records_failures() {
        let mut snap = SensorSnapshot::default();
        snap.merge(decode_packet(19, &[1]).unwrap());
        snap.record_failure(12, ProtocolError::UnknownPacketId(12));
        assert_eq!(snap.packets, vec![19]);
        assert!(!snap.is_complete());
        assert_eq!(
            snap.get("operating_mode").and_then(|v| v.as_str()),
            Some("passive")
        );
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["failures"][0]["packet_id"], 12);
        assert_eq!(json["fields"]["operating_mode"], "passive");
    }
}
