//! Immutable runtime context shared by the router and the console bridge

use tracing::warn;

use crate::config::AppConfig;
use crate::pads::CcIndex;

/// Configuration plus the lookups derived from it, built once at startup
#[derive(Debug, Clone)]
pub struct BridgeContext {
    pub config: AppConfig,
    pub cc_index: CcIndex,
}

impl BridgeContext {
    /// Build the context, warning once for every pad shadowed by a shared cc
    pub fn new(config: AppConfig) -> Self {
        let cc_index = CcIndex::new(&config.pads_config);

        for shadow in cc_index.shadowed() {
            warn!(
                "pads_config[{}] shares cc {} with pads_config[{}]; the later pad wins",
                shadow.shadowed, shadow.cc, shadow.winner
            );
        }

        Self { config, cc_index }
    }

    /// Pad index addressed by `cc`, if any
    pub fn pad_for_cc(&self, cc: u8) -> Option<usize> {
        self.cc_index.get(cc)
    }

    /// Number of configured pads
    pub fn pad_count(&self) -> usize {
        self.config.pads_config.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;

    #[test]
    fn test_context_resolves_last_declared_pad() {
        let config = AppConfig::parse(
            r#"{
                "mode": "switch",
                "source_device_name": "MPK mini 3",
                "pads_config": [
                    { "cc": 10, "rgb": [255, 0, 0] },
                    { "cc": 11, "rgb": [0, 255, 0] },
                    { "cc": 10, "rgb": [0, 0, 255] }
                ]
            }"#,
            ConfigFormat::Json,
        )
        .unwrap();

        let ctx = BridgeContext::new(config);
        assert_eq!(ctx.pad_count(), 3);
        assert_eq!(ctx.pad_for_cc(10), Some(2));
        assert_eq!(ctx.pad_for_cc(11), Some(1));
        assert_eq!(ctx.pad_for_cc(12), None);
        assert_eq!(ctx.cc_index.shadowed().len(), 1);
    }
}
