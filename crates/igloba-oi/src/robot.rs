use crate::config::RobotConfig;
use crate::decode::{decode_spec, decode_stream_frame, SensorReading, SensorSnapshot};
use crate::encode::{encode, encode_id_list, hex};
use crate::metrics::MetricsHub;
use crate::opcodes::{
    OP_QUERY_LIST, OP_STREAM, RADIUS_STRAIGHT, RADIUS_TURN_CCW, RADIUS_TURN_CW,
};
use crate::packets::{packet_by_id, STREAM_HEADER, SUMMARY_PACKETS};
use crate::status::SensorStatus;
use crate::types::{LedColor, MotorState, PacketSpec};
use crate::{ProtocolError, Result};
use serial_link::{SerialLink, TransportError};
use std::thread;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// Highest speed accepted by the timed motion helpers.
pub const MAX_SPEED_MM_S: i32 = 500;

/// Open Interface session over one exclusively owned link.
///
/// The controller keeps no model of the robot's control mode: escalating to
/// safe or full mode before motion commands is up to the caller.
pub struct Robot<L: SerialLink> {
    link: L,
    read_timeout: Duration,
    query_interval: Duration,
    turn_speed: i32,
    metrics: Option<MetricsHub>,
}

impl<L: SerialLink> Robot<L> {
    pub fn new(link: L) -> Self {
        Self::with_config(link, &RobotConfig::default())
    }

    pub fn with_config(link: L, config: &RobotConfig) -> Self {
        Self {
            link,
            read_timeout: config.read_timeout(),
            query_interval: config.query_interval(),
            turn_speed: config.turn_speed_mm_s,
            metrics: None,
        }
    }

    /// Open `config.port` with the configured line settings.
    pub fn open(config: &RobotConfig) -> Result<Self> {
        let link = L::open(&config.port, &config.link_config())?;
        info!(port = %config.port, "robot link open");
        Ok(Self::with_config(link, config))
    }

    pub fn with_metrics(mut self, hub: MetricsHub) -> Self {
        self.metrics = Some(hub);
        self
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }

    pub fn close(mut self) -> Result<()> {
        self.link.close()?;
        info!("robot link closed");
        Ok(())
    }

    // --- raw command path ---

    /// Encode a table command and write it in one piece.
    pub fn send(&mut self, name: &str, args: &[i32]) -> Result<()> {
        let bytes = encode(name, args)?;
        self.write(name, &bytes)
    }

    fn write(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        debug!(command = name, bytes = %hex(bytes), "send");
        self.link.write_all(bytes)?;
        if let Some(m) = &self.metrics {
            m.link.commands_sent.inc();
        }
        Ok(())
    }

    // --- mode and lifecycle ---

    /// Enter passive mode.
    pub fn start(&mut self) -> Result<()> {
        self.send("start", &[])
    }

    pub fn reset(&mut self) -> Result<()> {
        self.send("reset", &[])
    }

    /// Leave the Open Interface (back to off).
    pub fn stop(&mut self) -> Result<()> {
        self.send("stop", &[])
    }

    pub fn safe_mode(&mut self) -> Result<()> {
        self.send("safe_mode", &[])
    }

    pub fn full_mode(&mut self) -> Result<()> {
        self.send("full_mode", &[])
    }

    pub fn power_off(&mut self) -> Result<()> {
        self.send("power_off", &[])
    }

    // --- cleaning ---

    pub fn clean(&mut self) -> Result<()> {
        self.send("clean", &[])
    }

    pub fn max_clean(&mut self) -> Result<()> {
        self.send("max_clean", &[])
    }

    pub fn seek_dock(&mut self) -> Result<()> {
        self.send("seek_dock", &[])
    }

    // --- actuators ---

    /// Velocity in mm/s, radius in mm (32767 = straight, ±1 = spin).
    pub fn drive(&mut self, velocity: i32, radius: i32) -> Result<()> {
        self.send("drive", &[velocity, radius])
    }

    pub fn drive_direct(&mut self, left_velocity: i32, right_velocity: i32) -> Result<()> {
        self.send("drive_direct", &[left_velocity, right_velocity])
    }

    pub fn drive_pwm(&mut self, left_pwm: i32, right_pwm: i32) -> Result<()> {
        self.send("drive_pwm", &[left_pwm, right_pwm])
    }

    pub fn motors(&mut self, state: MotorState) -> Result<()> {
        self.send("motors", &[i32::from(state.bits())])
    }

    pub fn leds(&mut self, color: LedColor, intensity: u8) -> Result<()> {
        self.send("leds", &[color as i32, i32::from(intensity)])
    }

    pub fn stop_movement(&mut self) -> Result<()> {
        self.drive(0, 0)
    }

    // --- timed motion: drive, wait, stop ---

    pub fn move_forward(&mut self, speed: i32, duration: Duration) -> Result<()> {
        check_speed("move_forward", speed)?;
        self.timed_drive(speed, RADIUS_STRAIGHT, duration)
    }

    pub fn move_backward(&mut self, speed: i32, duration: Duration) -> Result<()> {
        check_speed("move_backward", speed)?;
        self.timed_drive(-speed, RADIUS_STRAIGHT, duration)
    }

    pub fn turn_left(&mut self, duration: Duration) -> Result<()> {
        self.timed_drive(self.turn_speed, RADIUS_TURN_CCW, duration)
    }

    pub fn turn_right(&mut self, duration: Duration) -> Result<()> {
        self.timed_drive(self.turn_speed, RADIUS_TURN_CW, duration)
    }

    fn timed_drive(&mut self, velocity: i32, radius: i32, duration: Duration) -> Result<()> {
        self.drive(velocity, radius)?;
        thread::sleep(duration);
        self.stop_movement()
    }

    // --- sensors ---

    /// Query one packet and return its raw payload.
    pub fn read_sensor_raw(&mut self, packet_id: u8) -> Result<Vec<u8>> {
        let spec = packet_by_id(packet_id).ok_or(ProtocolError::UnknownPacketId(packet_id))?;
        self.query_payload(spec)
    }

    pub fn read_and_parse_sensor(&mut self, packet_id: u8) -> Result<SensorReading> {
        let spec = packet_by_id(packet_id).ok_or(ProtocolError::UnknownPacketId(packet_id))?;
        let outcome = self
            .query_payload(spec)
            .and_then(|payload| decode_spec(spec, &payload));
        self.count(outcome.is_ok());
        let reading = outcome?.stamp(OffsetDateTime::now_utc());
        debug!(packet_id, fields = reading.fields.len(), "decoded");
        Ok(reading)
    }

    fn query_payload(&mut self, spec: &PacketSpec) -> Result<Vec<u8>> {
        self.discard_stale_input()?;
        let query = encode("sensors", &[i32::from(spec.id)])?;
        self.write("sensors", &query)?;
        self.link
            .read_exact(spec.len(), self.read_timeout)
            .map_err(|e| ProtocolError::from_read(spec.id, spec.len(), e))
    }

    /// Query several packets with one request; the reply is their payloads back to back.
    pub fn query_list(&mut self, packet_ids: &[u8]) -> Result<Vec<SensorReading>> {
        let specs = packet_ids
            .iter()
            .map(|&id| packet_by_id(id).ok_or(ProtocolError::UnknownPacketId(id)))
            .collect::<Result<Vec<_>>>()?;
        let request = encode_id_list(OP_QUERY_LIST, packet_ids)?;
        self.discard_stale_input()?;
        self.write("query_list", &request)?;

        let total: usize = specs.iter().map(|s| s.len()).sum();
        let payload = match self.link.read_exact(total, self.read_timeout) {
            Ok(payload) => payload,
            Err(e) => {
                self.count(false);
                return Err(short_list_read(&specs, e));
            }
        };

        let now = OffsetDateTime::now_utc();
        let mut rest = payload.as_slice();
        let mut out = Vec::with_capacity(specs.len());
        for spec in specs {
            let (chunk, tail) = rest.split_at(spec.len());
            out.push(decode_spec(spec, chunk)?.stamp(now));
            rest = tail;
        }
        self.count_many(out.len());
        Ok(out)
    }

    /// Read the summary packets one by one and merge their fields.
    ///
    /// A packet that times out or comes back short is recorded in
    /// `failures` and the remaining packets are still queried. Transport
    /// failures abort the whole call.
    pub fn get_all_sensors(&mut self) -> Result<SensorSnapshot> {
        let mut snapshot = SensorSnapshot::default();
        for (i, &packet_id) in SUMMARY_PACKETS.iter().enumerate() {
            if i > 0 && !self.query_interval.is_zero() {
                thread::sleep(self.query_interval);
            }
            match self.read_and_parse_sensor(packet_id) {
                Ok(reading) => snapshot.merge(reading),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(packet_id, error = %e, "sensor packet skipped");
                    snapshot.record_failure(packet_id, e);
                }
            }
        }
        Ok(snapshot)
    }

    /// Summary of mode, battery, charger and fault flags.
    pub fn sensor_status(&mut self) -> Result<SensorStatus> {
        Ok(SensorStatus::from_snapshot(&self.get_all_sensors()?))
    }

    // --- streaming (caller polls `read_stream_frame`) ---

    pub fn start_stream(&mut self, packet_ids: &[u8]) -> Result<()> {
        for &id in packet_ids {
            packet_by_id(id).ok_or(ProtocolError::UnknownPacketId(id))?;
        }
        let request = encode_id_list(OP_STREAM, packet_ids)?;
        self.write("stream", &request)
    }

    pub fn pause_stream(&mut self) -> Result<()> {
        self.send("pause_resume_stream", &[0])
    }

    pub fn resume_stream(&mut self) -> Result<()> {
        self.send("pause_resume_stream", &[1])
    }

    /// Block for the next stream frame and decode every packet in it.
    pub fn read_stream_frame(&mut self) -> Result<Vec<SensorReading>> {
        let head = self
            .link
            .read_exact(2, self.read_timeout)
            .map_err(|e| ProtocolError::from_read(STREAM_HEADER, 2, e))?;
        if head[0] != STREAM_HEADER {
            self.discard_stale_input()?;
            self.count(false);
            return Err(ProtocolError::InvalidFrame("bad stream header"));
        }
        let body_len = usize::from(head[1]) + 1;
        let body = self
            .link
            .read_exact(body_len, self.read_timeout)
            .map_err(|e| ProtocolError::from_read(STREAM_HEADER, body_len, e))?;
        let mut frame = head;
        frame.extend_from_slice(&body);
        let outcome = decode_stream_frame(&frame);
        match &outcome {
            Ok(readings) => self.count_many(readings.len()),
            Err(e) => {
                // Framing lost; resync from a clean buffer.
                if matches!(e, ProtocolError::InvalidFrame(_)) {
                    self.discard_stale_input()?;
                }
                self.count(false);
            }
        }
        let now = OffsetDateTime::now_utc();
        Ok(outcome?.into_iter().map(|r| r.stamp(now)).collect())
    }

    fn discard_stale_input(&mut self) -> Result<()> {
        match self.link.clear_input() {
            Ok(()) | Err(TransportError::Unsupported(_)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn count(&self, ok: bool) {
        if let Some(m) = &self.metrics {
            if ok {
                m.link.sensor_reads.inc();
            } else {
                m.link.sensor_failures.inc();
            }
        }
    }

    fn count_many(&self, n: usize) {
        if let Some(m) = &self.metrics {
            m.link.sensor_reads.inc_by(n as u64);
        }
    }
}

/// Blame a short query-list reply on the packet whose bytes ran out.
fn short_list_read(specs: &[&PacketSpec], err: TransportError) -> ProtocolError {
    let received = err.partial().len();
    let mut start = 0;
    for spec in specs {
        let end = start + spec.len();
        if received < end {
            let err = match err {
                TransportError::Timeout { received } => TransportError::Timeout {
                    received: received[start..].to_vec(),
                },
                TransportError::Closed { received } => TransportError::Closed {
                    received: received[start..].to_vec(),
                },
                other => other,
            };
            return ProtocolError::from_read(spec.id, spec.len(), err);
        }
        start = end;
    }
    ProtocolError::Transport(err)
}

fn check_speed(command: &'static str, speed: i32) -> Result<()> {
    if !(0..=MAX_SPEED_MM_S).contains(&speed) {
        return Err(ProtocolError::InvalidArgument {
            command,
            arg: "speed",
            value: speed,
            min: 0,
            max: MAX_SPEED_MM_S,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_link::{MockLink, MockReply};

    fn robot(replies: impl IntoIterator<Item = MockReply>) -> Robot<MockLink> {
        let cfg = RobotConfig {
            query_interval_ms: 0,
            ..RobotConfig::default()
        };
        Robot::with_config(MockLink::with_replies(replies), &cfg)
    }

    #[test]
    fn simple_commands_are_single_opcodes() {
        let mut r = robot([]);
        r.start().unwrap();
        r.full_mode().unwrap();
        r.safe_mode().unwrap();
        r.clean().unwrap();
        r.max_clean().unwrap();
        r.seek_dock().unwrap();
        assert_eq!(
            r.link().writes(),
            &[vec![128], vec![132], vec![131], vec![135], vec![136], vec![143]]
        );
    }

    #[test]
    fn move_forward_drives_then_stops() {
        let mut r = robot([]);
        r.move_forward(500, Duration::ZERO).unwrap();
        assert_eq!(
            r.link().writes(),
            &[vec![137, 0x01, 0xF4, 0x7F, 0xFF], vec![137, 0, 0, 0, 0]]
        );
    }

    #[test]
    fn move_forward_rejects_excess_speed_without_writing() {
        let mut r = robot([]);
        let err = r.move_forward(600, Duration::ZERO).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidArgument { value: 600, .. }));
        assert!(r.link().writes().is_empty());
    }

    #[test]
    fn turns_spin_in_place() {
        let mut r = robot([]);
        r.turn_left(Duration::ZERO).unwrap();
        r.turn_right(Duration::ZERO).unwrap();
        let w = r.link().writes();
        assert_eq!(w[0], vec![137, 0x00, 0xC8, 0x00, 0x01]);
        assert_eq!(w[2], vec![137, 0x00, 0xC8, 0xFF, 0xFF]);
        assert_eq!(w[3], vec![137, 0, 0, 0, 0]);
    }

    #[test]
    fn backward_negates_speed() {
        let mut r = robot([]);
        r.move_backward(200, Duration::ZERO).unwrap();
        assert_eq!(r.link().writes()[0], vec![137, 0xFF, 0x38, 0x7F, 0xFF]);
    }

    #[test]
    fn motors_and_leds_encode_their_bytes() {
        let mut r = robot([]);
        r.motors(MotorState {
            side_brush: true,
            vacuum_fan: true,
            main_brush: false,
        })
        .unwrap();
        r.leds(LedColor::Red, 128).unwrap();
        assert_eq!(r.link().writes(), &[vec![138, 0x05], vec![139, 2, 128]]);
    }

    #[test]
    fn sensor_query_writes_request_and_decodes() {
        let mut r = robot([MockReply::Bytes(vec![0x0F, 0xA0])]);
        let reading = r.read_and_parse_sensor(13).unwrap();
        assert_eq!(r.link().writes(), &[vec![142, 13]]);
        assert!(reading.ts.is_some());
        let v = reading
            .get("battery_voltage_v")
            .and_then(|v| v.as_f64())
            .unwrap();
        assert!((v - 4.0).abs() < 1e-9);
    }

    #[test]
    fn unknown_packet_never_touches_link() {
        let mut r = robot([]);
        assert!(matches!(
            r.read_and_parse_sensor(255),
            Err(ProtocolError::UnknownPacketId(255))
        ));
        assert!(r.link().writes().is_empty());
        assert_eq!(r.link().read_calls(), 0);
        assert_eq!(r.link().flush_calls(), 0);
    }

    #[test]
    fn short_read_times_out_then_session_recovers() {
        let mut r = robot([
            MockReply::Timeout(vec![0x0F]),
            MockReply::Bytes(vec![0x0F, 0xA0]),
        ]);
        assert!(matches!(
            r.read_and_parse_sensor(13),
            Err(ProtocolError::PacketTimeout {
                packet_id: 13,
                expected: 2,
                received: 1
            })
        ));
        let again = r.read_and_parse_sensor(13).unwrap();
        assert_eq!(again.get("battery_voltage_mv").and_then(|v| v.as_i64()), Some(4000));
    }

    #[test]
    fn closed_stream_is_malformed() {
        let mut r = robot([MockReply::Closed(vec![0x0F])]);
        assert!(matches!(
            r.read_and_parse_sensor(13),
            Err(ProtocolError::MalformedPacket { received: 1, .. })
        ));
    }

    #[test]
    fn io_failure_is_fatal() {
        let mut r = robot([MockReply::Io("device unplugged".into())]);
        let err = r.read_and_parse_sensor(19).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn query_list_splits_payload() {
        let mut r = robot([MockReply::Bytes(vec![0x0F, 0xA0, 0x02])]);
        let readings = r.query_list(&[13, 19]).unwrap();
        assert_eq!(r.link().writes(), &[vec![149, 2, 13, 19]]);
        assert_eq!(readings.len(), 2);
        assert_eq!(
            readings[1].get("operating_mode").and_then(|v| v.as_str()),
            Some("safe")
        );
        assert!(matches!(
            r.query_list(&[13, 99]),
            Err(ProtocolError::UnknownPacketId(99))
        ));
    }

    #[test]
    fn stream_start_and_frame_read() {
        let mut frame = vec![STREAM_HEADER, 2, 19, 3];
        frame.push(crate::decode::stream_checksum(&frame));
        let mut r = robot([MockReply::Bytes(frame)]);
        r.start_stream(&[19]).unwrap();
        r.pause_stream().unwrap();
        r.resume_stream().unwrap();
        assert_eq!(
            r.link().writes(),
            &[vec![148, 1, 19], vec![150, 0], vec![150, 1]]
        );
        let readings = r.read_stream_frame().unwrap();
        assert_eq!(
            readings[0].get("operating_mode").and_then(|v| v.as_str()),
            Some("full")
        );
    }

    #[test]
    fn stream_resyncs_on_bad_header() {
        let mut r = robot([MockReply::Bytes(vec![0x55, 0x01, 0x02, 0x03])]);
        assert!(matches!(
            r.read_stream_frame(),
            Err(ProtocolError::InvalidFrame("bad stream header"))
        ));
        assert_eq!(r.link().flush_calls(), 1);
    }

    #[test]
    fn stream_resyncs_on_checksum_mismatch() {
        let mut frame = vec![STREAM_HEADER, 2, 19, 3];
        frame.push(crate::decode::stream_checksum(&frame).wrapping_add(1));
        frame.extend_from_slice(&[0x07, 0x00]);
        let mut r = robot([MockReply::Bytes(frame)]);
        assert!(matches!(
            r.read_stream_frame(),
            Err(ProtocolError::InvalidFrame("stream checksum mismatch"))
        ));
        assert_eq!(r.link().flush_calls(), 1);
    }

    #[test]
    fn query_list_timeout_names_the_short_packet() {
        let hub = MetricsHub::new().unwrap();
        let mut r = robot([MockReply::Timeout(vec![0x0F, 0xA0])]).with_metrics(hub.clone());
        assert!(matches!(
            r.query_list(&[13, 19]),
            Err(ProtocolError::PacketTimeout {
                packet_id: 19,
                expected: 1,
                received: 0
            })
        ));
        assert_eq!(hub.link.sensor_failures.get(), 1);
    }

    #[test]
    fn query_list_timeout_inside_first_packet() {
        let mut r = robot([MockReply::Timeout(vec![0x0F])]);
        assert!(matches!(
            r.query_list(&[13, 19]),
            Err(ProtocolError::PacketTimeout {
                packet_id: 13,
                expected: 2,
                received: 1
            })
        ));
    }

    #[test]
    fn metrics_count_commands_and_reads() {
        let hub = MetricsHub::new().unwrap();
        let mut r = robot([MockReply::Bytes(vec![1]), MockReply::Timeout(vec![])])
            .with_metrics(hub.clone());
        r.start().unwrap();
        r.read_and_parse_sensor(19).unwrap();
        assert!(r.read_and_parse_sensor(19).is_err());
        assert_eq!(hub.link.commands_sent.get(), 3);
        assert_eq!(hub.link.sensor_reads.get(), 1);
        assert_eq!(hub.link.sensor_failures.get(), 1);
    }

    #[test]
    fn close_releases_link() {
        let r = robot([]);
        let mut link = r.into_link();
        link.close().unwrap();
        assert!(link.is_closed());
    }
}
