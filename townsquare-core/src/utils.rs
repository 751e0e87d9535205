pub const DEFAULT_STUN_ADDR: &str = "stun:stun.l.google.com:19302";

/// Inbound WebSocket ceiling. Backgrounds and posted media travel inline as data URIs.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 50 * 1024 * 1024;
