/// Wire protocol revision reported by `/info`
pub const PROTOCOL_VERSION: &str = "courier/1";

/// Maximum size of a single WebSocket frame in bytes (256 KiB)
pub const MAX_FRAME_SIZE: usize = 262_144;

/// Default HTTP / WebSocket port
pub const DEFAULT_HTTP_PORT: u16 = 5000;

/// Upper bound on a store append before the relay gives up
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

/// Keepalive ping interval for idle connections
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 30;

/// A connection with no inbound frame for this long is considered dead
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 40;
