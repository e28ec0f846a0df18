use crate::decode::{SensorSnapshot, SensorValue};
use crate::packets::packet_by_id;
use crate::types::{ChargingState, OperatingMode};
use serde::Serialize;
use std::fmt;

/// Human-oriented digest of the summary packets.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SensorStatus {
    pub mode: Option<OperatingMode>,
    pub battery_voltage_mv: Option<i64>,
    pub charging: Option<ChargingState>,
    pub charging_source_dc: bool,
    pub charging_source_dock: bool,
    pub active_bumps: Vec<String>,
    pub active_drops: Vec<String>,
    pub overcurrents: Vec<String>,
    /// Packets whose fields are missing from this status.
    pub unavailable: Vec<u8>,
}

impl SensorStatus {
    pub fn from_snapshot(snap: &SensorSnapshot) -> Self {
        let text = |name: &str| snap.get(name).and_then(SensorValue::as_str);
        let set = |name: &str| snap.get(name).and_then(SensorValue::as_bool) == Some(true);
        let active = |packet_id: u8, pred: fn(&str) -> bool| -> Vec<String> {
            packet_by_id(packet_id)
                .map(|p| {
                    p.fields
                        .iter()
                        .map(|f| f.name)
                        .filter(|&n| pred(n) && set(n))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default()
        };
        Self {
            mode: text("operating_mode").and_then(OperatingMode::from_label),
            battery_voltage_mv: snap.get("battery_voltage_mv").and_then(SensorValue::as_i64),
            charging: text("charging_state").and_then(ChargingState::from_label),
            charging_source_dc: set("charging_source_dc"),
            charging_source_dock: set("charging_source_dock"),
            active_bumps: active(7, |n| !n.starts_with("drop_")),
            active_drops: active(7, |n| n.starts_with("drop_")),
            overcurrents: active(11, |_| true),
            unavailable: snap.failures.iter().map(|f| f.packet_id).collect(),
        }
    }

    pub fn battery_voltage_v(&self) -> Option<f64> {
        self.battery_voltage_mv.map(|mv| mv as f64 / 1000.0)
    }

    /// True when no bump, drop or over-current flag is raised.
    pub fn is_clear(&self) -> bool {
        self.active_bumps.is_empty() && self.active_drops.is_empty() && self.overcurrents.is_empty()
    }
}

fn list(items: &[String]) -> String {
    if items.is_empty() {
        "ok".to_string()
    } else {
        items.join(", ")
    }
}

impl fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            Some(m) => writeln!(f, "mode:         {m:?}")?,
            None => writeln!(f, "mode:         unknown")?,
        }
        match (self.battery_voltage_v(), self.battery_voltage_mv) {
            (Some(v), Some(mv)) => writeln!(f, "battery:      {v:.2} V ({mv} mV)")?,
            _ => writeln!(f, "battery:      unknown")?,
        }
        match self.charging {
            Some(c) => writeln!(
                f,
                "charging:     {c:?} (dc={}, dock={})",
                self.charging_source_dc, self.charging_source_dock
            )?,
            None => writeln!(f, "charging:     unknown")?,
        }
        writeln!(f, "bumpers:      {}", list(&self.active_bumps))?;
        writeln!(f, "drop sensors: {}", list(&self.active_drops))?;
        write!(f, "motors:       {}", list(&self.overcurrents))?;
        if !self.unavailable.is_empty() {
            write!(f, "\nunavailable:  {:?}", self.unavailable)?;
        }
        Ok(())
    }
}
