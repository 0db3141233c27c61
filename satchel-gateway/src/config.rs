use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration surface consumed by the gateway. Parsing and ownership of
/// the values live with the host process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Maximum accepted upload size in bytes. Zero means unlimited.
    pub max_upload_size: u64,

    /// How often the garbage collector runs.
    #[serde(with = "humantime_serde")]
    pub gc_period: Duration,

    /// Maximum blobs reclaimed per collector run.
    pub gc_block: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_upload_size: 0,
            gc_period: Duration::from_secs(60),
            gc_block: 100,
        }
    }
}

impl GatewayConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_upload_size(mut self, bytes: u64) -> Self {
        self.max_upload_size = bytes;
        self
    }

    pub fn with_gc_period(mut self, period: Duration) -> Self {
        self.gc_period = period;
        self
    }

    pub fn with_gc_block(mut self, block: usize) -> Self {
        self.gc_block = block;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_humantime_period() {
        let cfg: GatewayConfig =
            serde_json::from_str(r#"{"max_upload_size": 1024, "gc_period": "5m"}"#).unwrap();
        assert_eq!(cfg.max_upload_size, 1024);
        assert_eq!(cfg.gc_period, Duration::from_secs(300));
        assert_eq!(cfg.gc_block, 100);
    }
}
