//! Per-router traffic counters.

/// Bytes and batches moved by one router, across all its connections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficStats {
    /// Bytes written to sockets, frame headers included.
    pub bytes_sent: u64,
    /// Decoded payload bytes received.
    pub bytes_received: u64,
    /// Batches written.
    pub batches_sent: u64,
    /// Batches received.
    pub batches_received: u64,
}

impl TrafficStats {
    /// Count one sent batch of `bytes`.
    pub fn record_sent(&mut self, bytes: usize) {
        self.bytes_sent += bytes as u64;
        self.batches_sent += 1;
    }

    /// Count one received batch of `bytes`.
    pub fn record_received(&mut self, bytes: usize) {
        self.bytes_received += bytes as u64;
        self.batches_received += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let mut stats = TrafficStats::default();
        stats.record_sent(9);
        stats.record_sent(11);
        stats.record_received(2);
        assert_eq!(stats.bytes_sent, 20);
        assert_eq!(stats.batches_sent, 2);
        assert_eq!(stats.bytes_received, 2);
        assert_eq!(stats.batches_received, 1);
    }
}
