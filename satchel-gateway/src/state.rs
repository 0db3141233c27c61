use std::sync::Arc;

use satchel_auth::AuthGate;
use satchel_media::{GarbageCollector, GcHandle, MediaHandler};

use crate::GatewayConfig;

/// Shared handler state: the one media handler instance, the auth gate, and
/// the configuration. Explicitly constructed at startup and injected - no
/// ambient globals.
#[derive(Clone)]
pub struct GatewayState {
    pub media: Arc<dyn MediaHandler>,
    pub auth: Arc<AuthGate>,
    pub config: GatewayConfig,
}

impl GatewayState {
    pub fn new(media: Arc<dyn MediaHandler>, auth: Arc<AuthGate>, config: GatewayConfig) -> Self {
        Self {
            media,
            auth,
            config,
        }
    }

    /// Start the background garbage collector against this state's media
    /// handler. Call once at process scope; stop the handle at shutdown.
    pub fn start_gc(&self) -> GcHandle {
        GarbageCollector::spawn(
            Arc::clone(&self.media),
            self.config.gc_period,
            self.config.gc_block,
        )
    }
}
