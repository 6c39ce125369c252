//! Per-region read ceilings and global result caps

use crate::config::ScannerConfig;
use serde::{Deserialize, Serialize};

/// Largest single region read, 100 MiB
pub const DEFAULT_MAX_REGION_SIZE: u64 = 100 * 1024 * 1024;
/// Result cap shared across all regions of one request
pub const DEFAULT_MAX_RESULTS: usize = 10_000;
/// Addresses expanded per pointer-chain depth
pub const DEFAULT_MAX_CHAIN_FRONTIER: usize = 10_000;
/// Deepest pointer chain a request may ask for
pub const DEFAULT_MAX_POINTER_DEPTH: usize = 5;
/// Float tolerance used when a request names none
pub const DEFAULT_FLOAT_TOLERANCE: f64 = 0.001;

/// Bounds applied to every scan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanLimits {
    /// Regions larger than this are truncated to their first `max_region_size` bytes
    pub max_region_size: u64,
    /// Global result cap for one request
    pub max_results: usize,
    /// Bound on the number of addresses re-scanned at each pointer-chain depth
    pub max_chain_frontier: usize,
    pub max_pointer_depth: usize,
    pub float_tolerance: f64,
}

impl Default for ScanLimits {
    fn default() -> Self {
        ScanLimits {
            max_region_size: DEFAULT_MAX_REGION_SIZE,
            max_results: DEFAULT_MAX_RESULTS,
            max_chain_frontier: DEFAULT_MAX_CHAIN_FRONTIER,
            max_pointer_depth: DEFAULT_MAX_POINTER_DEPTH,
            float_tolerance: DEFAULT_FLOAT_TOLERANCE,
        }
    }
}

impl ScanLimits {
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_max_region_size(mut self, max_region_size: u64) -> Self {
        self.max_region_size = max_region_size;
        self
    }

    pub fn with_max_chain_frontier(mut self, frontier: usize) -> Self {
        self.max_chain_frontier = frontier;
        self
    }

    pub fn with_max_pointer_depth(mut self, depth: usize) -> Self {
        self.max_pointer_depth = depth;
        self
    }

    /// Request-level cap, never above the configured one
    pub fn effective_cap(&self, requested: Option<usize>) -> usize {
        requested.map_or(self.max_results, |cap| cap.min(self.max_results))
    }

    /// Bytes to read from a span of `len` bytes
    pub fn clamp_read(&self, len: u64) -> u64 {
        len.min(self.max_region_size)
    }
}

impl From<&ScannerConfig> for ScanLimits {
    fn from(config: &ScannerConfig) -> Self {
        ScanLimits {
            max_region_size: config.max_region_size,
            max_results: config.max_results,
            max_chain_frontier: config.max_chain_frontier,
            max_pointer_depth: config.max_pointer_depth,
            float_tolerance: config.float_tolerance,
        }
    }
}

/// Capped accumulator handed to matchers
#[derive(Debug)]
pub struct ResultSink<T> {
    items: Vec<T>,
    cap: usize,
}

impl<T> ResultSink<T> {
    pub fn new(cap: usize) -> Self {
        ResultSink {
            items: Vec::new(),
            cap,
        }
    }

    /// Stores `item`; returns false once the cap is reached and the item was dropped
    pub fn push(&mut self, item: T) -> bool {
        if self.items.len() >= self.cap {
            return false;
        }
        self.items.push(item);
        true
    }

    pub fn is_full(&self) -> bool {
        self.items.len() >= self.cap
    }

    pub fn remaining(&self) -> usize {
        self.cap.saturating_sub(self.items.len())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Moves items from another sink, up to this sink's cap
    pub fn absorb(&mut self, other: Vec<T>) {
        let take = self.remaining().min(other.len());
        self.items.extend(other.into_iter().take(take));
    }

    pub fn into_vec(self) -> Vec<T> {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_stops_at_cap() {
        let mut sink = ResultSink::new(2);
        assert!(sink.push(1));
        assert!(sink.push(2));
        assert!(!sink.push(3));
        assert!(sink.is_full());
        assert_eq!(sink.into_vec(), vec![1, 2]);
    }

    #[test]
    fn test_zero_cap_accepts_nothing() {
        let mut sink = ResultSink::new(0);
        assert!(!sink.push(()));
        assert!(sink.is_empty());
    }

    #[test]
    fn test_absorb_truncates() {
        let mut sink = ResultSink::new(3);
        sink.push(0);
        sink.absorb(vec![1, 2, 3, 4]);
        assert_eq!(sink.into_vec(), vec![0, 1, 2]);
    }

    #[test]
    fn test_effective_cap_and_clamp() {
        let limits = ScanLimits::default().with_max_results(100);
        assert_eq!(limits.effective_cap(None), 100);
        assert_eq!(limits.effective_cap(Some(10)), 10);
        assert_eq!(limits.effective_cap(Some(1000)), 100);

        let limits = limits.with_max_region_size(0x1000);
        assert_eq!(limits.clamp_read(0x5000), 0x1000);
        assert_eq!(limits.clamp_read(0x10), 0x10);
    }
}
