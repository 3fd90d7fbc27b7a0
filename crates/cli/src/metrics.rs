//! Prometheus registry for the CLI's status endpoint.

use once_cell::sync::Lazy;
use prometheus::{Encoder, Registry, TextEncoder};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

fn register_metrics(registry: &Registry) {
    for metric in livedash_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode every registered metric in the text exposition format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_contains_core_metrics() {
        livedash_core::metrics::LOG_LINES_RECOGNIZED.inc_by(0);
        let text = encode_metrics();
        assert!(text.contains("livedash_log_lines_recognized_total"));
        assert!(text.contains("livedash_push_connected"));
    }
}
