use anyhow::Context;
use serde::{Deserialize, Serialize};
use serial_link::{LinkConfig, DEFAULT_BAUD_RATE};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Session settings, usually read from a small YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RobotConfig {
    pub port: String,
    pub baud_rate: u32,
    pub read_timeout_ms: u64,
    /// Pause between consecutive queries of a composite read.
    pub query_interval_ms: u64,
    pub default_speed_mm_s: i32,
    pub turn_speed_mm_s: i32,
}

impl Default for RobotConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB1".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout_ms: 1000,
            query_interval_ms: 50,
            default_speed_mm_s: 200,
            turn_speed_mm_s: 200,
        }
    }
}

impl RobotConfig {
    pub fn link_config(&self) -> LinkConfig {
        LinkConfig::default()
            .with_baud_rate(self.baud_rate)
            .with_read_timeout(self.read_timeout())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn query_interval(&self) -> Duration {
        Duration::from_millis(self.query_interval_ms)
    }
}

pub fn parse_config(raw: &str) -> anyhow::Result<RobotConfig> {
    let cfg: RobotConfig = serde_yaml::from_str(raw).context("parsing robot config yaml")?;
    anyhow::ensure!(cfg.baud_rate > 0, "baud_rate must be positive");
    anyhow::ensure!(cfg.read_timeout_ms > 0, "read_timeout_ms must be positive");
    anyhow::ensure!(
        (0..=500).contains(&cfg.default_speed_mm_s) && (0..=500).contains(&cfg.turn_speed_mm_s),
        "speeds must lie in 0..=500 mm/s"
    );
    Ok(cfg)
}

pub fn load_config_file(path: impl AsRef<Path>) -> anyhow::Result<RobotConfig> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading robot config: {}", path.display()))?;
    parse_config(&raw).with_context(|| format!("loading robot config: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_take_defaults() {
        let cfg = parse_config("port: /dev/ttyACM0\nread_timeout_ms: 250\n").unwrap();
        assert_eq!(cfg.port, "/dev/ttyACM0");
        assert_eq!(cfg.baud_rate, 115_200);
        assert_eq!(cfg.link_config().read_timeout, Duration::from_millis(250));
        assert_eq!(cfg.query_interval(), Duration::from_millis(50));
    }

    #[test]
    fn rejects_out_of_range_speed() {
        assert!(parse_config("default_speed_mm_s: 900\n").is_err());
        assert!(parse_config("read_timeout_ms: 0\n").is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let err = load_config_file("/nonexistent/robot.yaml").unwrap_err();
        assert!(format!("{err:#}").contains("reading robot config"));
    }
}
