use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

/// Counters for one robot session.
#[derive(Clone)]
pub struct LinkMetrics {
    pub commands_sent: IntCounter,
    pub sensor_reads: IntCounter,
    pub sensor_failures: IntCounter,
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub link: LinkMetrics,
}

impl MetricsHub {
    /// Fresh hub with its own registry.
    pub fn new() -> prometheus::Result<Self> {
        Self::with_registry(Registry::new())
    }

    /// Register the session counters in `registry`.
    ///
    /// Fails if the registry already holds counters with the same names.
    pub fn with_registry(registry: Registry) -> prometheus::Result<Self> {
        let link = LinkMetrics {
            commands_sent: counter(&registry, "oi_commands_sent", "Total OI commands written")?,
            sensor_reads: counter(
                &registry,
                "oi_sensor_reads",
                "Sensor packets decoded successfully",
            )?,
            sensor_failures: counter(
                &registry,
                "oi_sensor_failures",
                "Sensor reads that timed out or failed to decode",
            )?,
        };
        Ok(Self { registry, link })
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn encode_text(&self) -> String {
        self.render()
            .unwrap_or_else(|e| format!("# error encoding metrics: {e}\n"))
    }
}

fn counter(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntCounter> {
    let c = IntCounter::new(name, help)?;
    registry.register(Box::new(c.clone()))?;
    Ok(c)
}
