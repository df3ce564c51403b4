use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct CodecMetrics {
    pub tables_unpacked: IntCounter,
    pub tables_packed: IntCounter,
    pub codec_errors: IntCounter,
    pub echoes_suppressed: IntCounter,
    pub layouts_loaded: IntGauge,
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub codec: CodecMetrics,
}

impl MetricsHub {
    pub fn new() -> Result<Self, String> {
        let counter = |name: &str, help: &str| {
            IntCounter::new(name, help).map_err(|e| format!("metrics init error: {e}"))
        };
        let codec = CodecMetrics {
            tables_unpacked: counter("pb_tables_unpacked", "Tables unpacked from device words")?,
            tables_packed: counter("pb_tables_packed", "Tables packed into device words")?,
            codec_errors: counter("pb_codec_errors", "Tables or fields that failed to decode")?,
            echoes_suppressed: counter(
                "pb_echoes_suppressed",
                "Device changes dropped as echoes of our own writes",
            )?,
            layouts_loaded: IntGauge::new("pb_layouts_loaded", "Number of table layouts loaded")
                .map_err(|e| format!("metrics init error: {e}"))?,
        };
        let registry = Registry::new();
        for c in [
            &codec.tables_unpacked,
            &codec.tables_packed,
            &codec.codec_errors,
            &codec.echoes_suppressed,
        ] {
            let _ = registry.register(Box::new(c.clone()));
        }
        let _ = registry.register(Box::new(codec.layouts_loaded.clone()));
        Ok(Self { registry, codec })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
