use std::time::Instant;

use crate::stats::Reservoir;

/// Per-client-endpoint state.
///
/// A flow starts unsynced and becomes synced once a COM_QUERY has been
/// framed on it; desynchronization clears the flag and both buffers, and
/// the flow waits for the next COM_QUERY to recover.
pub struct Flow {
    /// `ip:port` of the client side.
    pub endpoint: String,
    pub src_ip: String,
    pub synced: bool,
    pub req_buffer: Vec<u8>,
    pub resp_buffer: Vec<u8>,
    /// Set while a recorded request awaits its response.
    pub req_sent: Option<Instant>,
    pub times: Reservoir,
    /// Aggregation key of the most recent recorded query.
    pub last_key: Option<String>,
    /// Request payload bytes of the most recent recorded query.
    pub last_bytes: u64,
    pub last_seen: Instant,
}

impl Flow {
    pub fn new(endpoint: String, src_ip: String, now: Instant) -> Self {
        Self {
            endpoint,
            src_ip,
            synced: false,
            req_buffer: Vec::new(),
            resp_buffer: Vec::new(),
            req_sent: None,
            times: Reservoir::new(),
            last_key: None,
            last_bytes: 0,
            last_seen: now,
        }
    }

    /// Drop both direction buffers and fall back to the unsynced state.
    pub fn desync(&mut self) {
        self.req_buffer.clear();
        self.resp_buffer.clear();
        self.synced = false;
    }
}
