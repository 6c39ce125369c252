//! Memory scanning over the target's committed regions
//!
//! Every scan follows one template: list the regions that pass the filter,
//! intersect them with the caller's bounds, clamp each to the per-region
//! ceiling, read it in one bounded call and hand the buffer to a matcher.
//! Results accumulate in a [`ResultSink`] shared across regions, and the scan
//! stops as soon as that sink is full. Unreadable regions are counted and
//! skipped.

mod code;
mod diff;
pub mod matchers;
mod pointers;
mod request;
mod values;

pub use code::{FUNCTION_PROLOGUES, NEAR_CALL_LEN, NEAR_CALL_OPCODE};
pub use request::{ScanKind, ScanRequest};

use crate::config::ScannerConfig;
use crate::core::types::{Address, MemoryError, MemoryResult, MemoryRegion};
use crate::memory::limits::{ResultSink, ScanLimits};
use crate::memory::regions::{enumerate_regions, RegionFilter};
use crate::memory::{access, MemorySource};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Shared flag checked before each region read
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-request scan options
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    /// Inclusive lower bound of the scanned span
    pub start_address: Option<Address>,
    /// Exclusive upper bound of the scanned span
    pub end_address: Option<Address>,
    /// Step integer scans by the value width instead of one byte
    pub aligned: bool,
    /// Request-level result cap, never above the configured one
    pub max_results: Option<usize>,
    pub cancel: Option<CancelToken>,
}

impl ScanOptions {
    pub fn new() -> Self {
        ScanOptions::default()
    }

    /// Restricts the scan to `[start, end)`
    pub fn range(mut self, start: Address, end: Address) -> Self {
        self.start_address = Some(start);
        self.end_address = Some(end);
        self
    }

    pub fn aligned(mut self) -> Self {
        self.aligned = true;
        self
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }

    pub fn cancel_with(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Part of `region` inside the bounds, as (start, length)
    fn intersect(&self, region: &MemoryRegion) -> Option<(Address, u64)> {
        let start = self
            .start_address
            .map_or(region.base_address, |s| s.max(region.base_address));
        let end = self
            .end_address
            .map_or(region.end_address(), |e| e.min(region.end_address()));
        end.distance_from(start)
            .filter(|len| *len > 0)
            .map(|len| (start, len))
    }
}

/// Matches of one request plus what it took to find them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOutcome<T> {
    pub matches: Vec<T>,
    pub regions_scanned: usize,
    pub regions_skipped: usize,
    /// The result cap was hit; later regions may hold more matches
    pub cap_reached: bool,
    pub cancelled: bool,
}

impl<T> ScanOutcome<T> {
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Converts every match into another representation
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> ScanOutcome<U> {
        ScanOutcome {
            matches: self.matches.into_iter().map(f).collect(),
            regions_scanned: self.regions_scanned,
            regions_skipped: self.regions_skipped,
            cap_reached: self.cap_reached,
            cancelled: self.cancelled,
        }
    }
}

enum RegionPass<T> {
    Scanned(Vec<T>),
    Skipped,
    NotRun,
}

/// Scanner over one attached target
///
/// Owns a reference to the memory source, so a scan in flight keeps the
/// target handle alive even if the process manager detaches meanwhile.
pub struct MemoryScanner {
    source: Arc<dyn MemorySource>,
    limits: ScanLimits,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl MemoryScanner {
    /// Sequential scanner with default limits
    pub fn new(source: Arc<dyn MemorySource>) -> Self {
        MemoryScanner {
            source,
            limits: ScanLimits::default(),
            pool: None,
        }
    }

    /// Scanner shaped by configuration
    pub fn from_config(source: Arc<dyn MemorySource>, config: &ScannerConfig) -> MemoryResult<Self> {
        let scanner = MemoryScanner::new(source).with_limits(ScanLimits::from(config));
        if config.parallel {
            scanner.with_threads(config.max_threads)
        } else {
            Ok(scanner)
        }
    }

    pub fn with_limits(mut self, limits: ScanLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Scans regions on a dedicated pool of `threads` workers
    pub fn with_threads(mut self, threads: usize) -> MemoryResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("memory-scan-{i}"))
            .build()
            .map_err(|e| MemoryError::ScanningFailed(format!("Failed to build scan pool: {e}")))?;
        self.pool = Some(Arc::new(pool));
        Ok(self)
    }

    pub fn limits(&self) -> &ScanLimits {
        &self.limits
    }

    pub fn source(&self) -> &dyn MemorySource {
        self.source.as_ref()
    }

    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    /// Reads one clamped span; `None` when the span cannot be read
    fn fetch(&self, start: Address, len: u64) -> Option<Vec<u8>> {
        let len = usize::try_from(len).ok()?;
        let mut buffer = vec![0u8; len];
        match access::read(self.source.as_ref(), start, &mut buffer) {
            Ok(transfer) => {
                buffer.truncate(transfer.transferred);
                Some(buffer)
            }
            Err(e) => {
                trace!("Skipping region at {}: {}", start, e);
                None
            }
        }
    }

    /// Region spans to read for a request, already bounded and clamped
    fn spans(&self, filter: &RegionFilter, options: &ScanOptions) -> MemoryResult<Vec<(Address, u64)>> {
        let regions = enumerate_regions(self.source.as_ref(), filter)?;
        Ok(regions
            .iter()
            .filter_map(|region| options.intersect(region))
            .map(|(start, len)| {
                let clamped = self.limits.clamp_read(len);
                if clamped < len {
                    debug!(
                        "Region at {} truncated from {:#x} to {:#x} bytes",
                        start, len, clamped
                    );
                }
                (start, clamped)
            })
            .collect())
    }

    /// Runs `matcher` over every applicable region until the cap is reached
    pub(crate) fn scan_regions<T, F>(
        &self,
        filter: &RegionFilter,
        options: &ScanOptions,
        matcher: F,
    ) -> MemoryResult<ScanOutcome<T>>
    where
        T: Send,
        F: Fn(Address, &[u8], &mut ResultSink<T>) + Sync,
    {
        let cap = self.limits.effective_cap(options.max_results);
        let spans = self.spans(filter, options)?;

        let outcome = match &self.pool {
            Some(pool) => self.scan_parallel(pool, &spans, cap, options, &matcher),
            None => self.scan_sequential(&spans, cap, options, &matcher),
        };

        if outcome.cap_reached {
            debug!("Result cap of {} reached", cap);
        }
        if outcome.cancelled {
            info!(
                "Scan cancelled after {} regions with {} matches",
                outcome.regions_scanned,
                outcome.matches.len()
            );
        }
        Ok(outcome)
    }

    fn scan_sequential<T, F>(
        &self,
        spans: &[(Address, u64)],
        cap: usize,
        options: &ScanOptions,
        matcher: &F,
    ) -> ScanOutcome<T>
    where
        F: Fn(Address, &[u8], &mut ResultSink<T>),
    {
        let mut sink = ResultSink::new(cap);
        let mut scanned = 0;
        let mut skipped = 0;
        let mut cancelled = false;

        for &(start, len) in spans {
            if sink.is_full() {
                break;
            }
            if options.is_cancelled() {
                cancelled = true;
                break;
            }
            match self.fetch(start, len) {
                Some(buffer) => {
                    scanned += 1;
                    matcher(start, &buffer, &mut sink);
                }
                None => skipped += 1,
            }
        }

        ScanOutcome {
            cap_reached: sink.is_full(),
            matches: sink.into_vec(),
            regions_scanned: scanned,
            regions_skipped: skipped,
            cancelled,
        }
    }

    /// Scans spans in batches of a few regions per worker
    ///
    /// Each batch is merged in region order before the next one starts, so
    /// the output equals the sequential scan and the cap still stops early.
    fn scan_parallel<T, F>(
        &self,
        pool: &rayon::ThreadPool,
        spans: &[(Address, u64)],
        cap: usize,
        options: &ScanOptions,
        matcher: &F,
    ) -> ScanOutcome<T>
    where
        T: Send,
        F: Fn(Address, &[u8], &mut ResultSink<T>) + Sync,
    {
        let batch = pool.current_num_threads().max(1) * 2;
        let mut sink = ResultSink::new(cap);
        let mut scanned = 0;
        let mut skipped = 0;
        let mut cancelled = false;

        for chunk in spans.chunks(batch) {
            if sink.is_full() {
                break;
            }
            if options.is_cancelled() {
                cancelled = true;
                break;
            }
            let remaining = sink.remaining();

            let passes: Vec<RegionPass<T>> = pool.install(|| {
                chunk
                    .par_iter()
                    .map(|&(start, len)| {
                        if options.is_cancelled() {
                            return RegionPass::NotRun;
                        }
                        match self.fetch(start, len) {
                            Some(buffer) => {
                                let mut local = ResultSink::new(remaining);
                                matcher(start, &buffer, &mut local);
                                RegionPass::Scanned(local.into_vec())
                            }
                            None => RegionPass::Skipped,
                        }
                    })
                    .collect()
            });

            for pass in passes {
                match pass {
                    RegionPass::Scanned(matches) => {
                        scanned += 1;
                        sink.absorb(matches);
                    }
                    RegionPass::Skipped => skipped += 1,
                    RegionPass::NotRun => cancelled = true,
                }
            }
        }

        ScanOutcome {
            cap_reached: sink.is_full(),
            matches: sink.into_vec(),
            regions_scanned: scanned,
            regions_skipped: skipped,
            cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Protection;
    use crate::memory::mock::MockProcess;

    fn scanner_over(mock: MockProcess) -> (Arc<MockProcess>, MemoryScanner) {
        let mock = Arc::new(mock);
        let scanner = MemoryScanner::new(mock.clone());
        (mock, scanner)
    }

    fn count_bytes(base: Address, data: &[u8], sink: &mut ResultSink<Address>) {
        for i in 0..data.len() {
            if !sink.push(base.add(i as u64)) {
                return;
            }
        }
    }

    #[test]
    fn test_bounds_intersect_regions() {
        let (_, scanner) = scanner_over(
            MockProcess::builder()
                .zeroed_region(0x1000, 0x100, Protection::READWRITE)
                .zeroed_region(0x2000, 0x100, Protection::READWRITE)
                .build(),
        );
        let options = ScanOptions::new().range(Address::new(0x1080), Address::new(0x2010));
        let outcome = scanner
            .scan_regions(&RegionFilter::all(), &options, count_bytes)
            .unwrap();
        assert_eq!(outcome.len(), 0x80 + 0x10);
        assert_eq!(outcome.matches[0], Address::new(0x1080));
        assert_eq!(outcome.regions_scanned, 2);
    }

    #[test]
    fn test_unreadable_region_skipped() {
        let (_, scanner) = scanner_over(
            MockProcess::builder()
                .zeroed_region(0x1000, 0x10, Protection::READWRITE.with(Protection::GUARD))
                .zeroed_region(0x2000, 0x10, Protection::READWRITE)
                .build(),
        );
        let outcome = scanner
            .scan_regions(&RegionFilter::all(), &ScanOptions::new(), count_bytes)
            .unwrap();
        assert_eq!(outcome.regions_skipped, 1);
        assert_eq!(outcome.regions_scanned, 1);
        assert_eq!(outcome.len(), 0x10);
    }

    #[test]
    fn test_region_reads_are_clamped() {
        let (mock, scanner) = scanner_over(
            MockProcess::builder()
                .zeroed_region(0x10000, 0x4000, Protection::READWRITE)
                .build(),
        );
        let scanner = scanner.with_limits(ScanLimits::default().with_max_region_size(0x1000));
        let outcome = scanner
            .scan_regions(&RegionFilter::all(), &ScanOptions::new(), count_bytes)
            .unwrap();
        assert_eq!(outcome.len(), 0x1000);
        assert_eq!(mock.largest_read(), 0x1000);
    }

    #[test]
    fn test_global_cap_spans_regions() {
        let (mock, scanner) = scanner_over(
            MockProcess::builder()
                .zeroed_region(0x1000, 0x10, Protection::READWRITE)
                .zeroed_region(0x2000, 0x10, Protection::READWRITE)
                .zeroed_region(0x3000, 0x10, Protection::READWRITE)
                .build(),
        );
        let options = ScanOptions::new().max_results(20);
        let outcome = scanner
            .scan_regions(&RegionFilter::all(), &options, count_bytes)
            .unwrap();
        assert_eq!(outcome.len(), 20);
        assert!(outcome.cap_reached);
        // Third region never read
        assert_eq!(mock.read_count(), 2);
    }

    #[test]
    fn test_cancelled_before_start() {
        let (mock, scanner) = scanner_over(
            MockProcess::builder()
                .zeroed_region(0x1000, 0x10, Protection::READWRITE)
                .build(),
        );
        let token = CancelToken::new();
        token.cancel();
        let options = ScanOptions::new().cancel_with(token);
        let outcome = scanner
            .scan_regions(&RegionFilter::all(), &options, count_bytes)
            .unwrap();
        assert!(outcome.cancelled);
        assert!(outcome.is_empty());
        assert_eq!(mock.read_count(), 0);
    }

    /// Fires the token while the region at `trigger` is being read
    struct CancelOnRead {
        inner: MockProcess,
        token: CancelToken,
        trigger: Address,
    }

    impl MemorySource for CancelOnRead {
        fn is_alive(&self) -> bool {
            self.inner.is_alive()
        }

        fn query(&self, address: Address) -> MemoryResult<MemoryRegion> {
            self.inner.query(address)
        }

        fn read_raw(&self, address: Address, buffer: &mut [u8]) -> MemoryResult<usize> {
            if address == self.trigger {
                self.token.cancel();
            }
            self.inner.read_raw(address, buffer)
        }

        fn write_raw(&self, address: Address, data: &[u8]) -> MemoryResult<usize> {
            self.inner.write_raw(address, data)
        }

        fn protect(&self, address: Address, size: usize, protection: Protection) -> MemoryResult<Protection> {
            self.inner.protect(address, size, protection)
        }
    }

    #[test]
    fn test_cancel_during_last_region_is_not_reported() {
        let run = |threads: Option<usize>| {
            let token = CancelToken::new();
            let source = CancelOnRead {
                inner: MockProcess::builder()
                    .zeroed_region(0x1000, 0x2, Protection::READWRITE)
                    .zeroed_region(0x2000, 0x2, Protection::READWRITE)
                    .build(),
                token: token.clone(),
                trigger: Address::new(0x2000),
            };
            let mut scanner = MemoryScanner::new(Arc::new(source));
            if let Some(n) = threads {
                scanner = scanner.with_threads(n).unwrap();
            }
            scanner
                .scan_regions(&RegionFilter::all(), &ScanOptions::new().cancel_with(token), count_bytes)
                .unwrap()
        };

        let sequential = run(None);
        let parallel = run(Some(1));
        assert_eq!(sequential.regions_scanned, 2);
        assert_eq!(sequential.len(), 4);
        assert!(!sequential.cancelled);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_cancel_before_scan_is_reported() {
        let token = CancelToken::new();
        token.cancel();
        let (_, scanner) = scanner_over(
            MockProcess::builder()
                .zeroed_region(0x1000, 0x10, Protection::READWRITE)
                .build(),
        );
        let scanner = scanner.with_threads(2).unwrap();
        let outcome = scanner
            .scan_regions(&RegionFilter::all(), &ScanOptions::new().cancel_with(token), count_bytes)
            .unwrap();
        assert!(outcome.cancelled);
        assert_eq!(outcome.regions_scanned, 0);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let build = || {
            MockProcess::builder()
                .zeroed_region(0x1000, 0x40, Protection::READWRITE)
                .zeroed_region(0x2000, 0x40, Protection::READONLY)
                .zeroed_region(0x3000, 0x40, Protection::NOACCESS)
                .zeroed_region(0x4000, 0x40, Protection::READWRITE)
                .build()
        };
        let (_, sequential) = scanner_over(build());
        let (_, parallel) = scanner_over(build());
        let parallel = parallel.with_threads(4).unwrap();
        assert!(parallel.is_parallel());

        let options = ScanOptions::new();
        let a = sequential
            .scan_regions(&RegionFilter::all(), &options, count_bytes)
            .unwrap();
        let b = parallel
            .scan_regions(&RegionFilter::all(), &options, count_bytes)
            .unwrap();
        assert_eq!(a, b);
    }
}
