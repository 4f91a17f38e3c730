use std::sync::Arc;
use std::time::Duration;

use crate::registry::SessionRegistry;
use crate::relay::MessageRelay;
use crate::signaling::CallSignaling;
use crate::store::MessageStore;

/// The shared core every connection task talks to. The registry is the
/// only mutable state here; the relay and the signaling router read it.
pub struct Hub {
    pub registry: SessionRegistry,
    pub relay: MessageRelay,
    pub signaling: CallSignaling,
}

impl Hub {
    pub fn new(store: Arc<dyn MessageStore>, store_timeout: Duration) -> Self {
        let registry = SessionRegistry::new();
        Self {
            relay: MessageRelay::new(registry.clone(), store, store_timeout),
            signaling: CallSignaling::new(registry.clone()),
            registry,
        }
    }

    pub fn online(&self) -> usize {
        self.registry.len()
    }
}
