//! Pointer scans and pointer-chain resolution

use super::{matchers, MemoryScanner, ScanOptions, ScanOutcome};
use crate::core::types::{Address, MemoryError, MemoryResult, PointerChain, PointerResult};
use crate::memory::access;
use crate::memory::regions::RegionFilter;
use std::collections::HashSet;
use tracing::debug;

impl MemoryScanner {
    /// Pointer-sized, pointer-aligned slots holding zero
    pub fn find_null_pointers(&self, options: &ScanOptions) -> MemoryResult<ScanOutcome<PointerResult>> {
        self.find_pointers_to(Address::null(), options)
    }

    /// Pointer-sized, pointer-aligned slots holding exactly `target`
    pub fn find_pointers_to(&self, target: Address, options: &ScanOptions) -> MemoryResult<ScanOutcome<PointerResult>> {
        self.scan_pointer_level(&HashSet::from([target.0]), 0, options)
    }

    fn scan_pointer_level(
        &self,
        targets: &HashSet<u64>,
        offset: u64,
        options: &ScanOptions,
    ) -> MemoryResult<ScanOutcome<PointerResult>> {
        let width = self.source().pointer_size();
        self.scan_regions(&RegionFilter::all(), options, |base, data, sink| {
            matchers::match_pointers(targets, width, offset, base, data, sink)
        })
    }

    /// Walks backwards from `target`, collecting who points at each link
    ///
    /// Depth 1 is the direct pointer scan on `target`. Every further depth
    /// scans for slots pointing at any address found at the previous depth
    /// and tags them with `offsets[depth]` (0 when absent). Addresses are not
    /// deduplicated across depths, so cyclic layouts repeat; growth is bounded
    /// by `max_depth`, the result cap and the per-depth frontier limit.
    pub fn find_pointer_chain(
        &self,
        target: Address,
        max_depth: usize,
        offsets: &[u64],
        options: &ScanOptions,
    ) -> MemoryResult<ScanOutcome<PointerResult>> {
        if max_depth == 0 {
            return Err(MemoryError::InvalidSize(
                "pointer chain depth must be at least 1".to_string(),
            ));
        }
        if max_depth > self.limits().max_pointer_depth {
            return Err(MemoryError::InvalidSize(format!(
                "pointer chain depth {} exceeds the maximum of {}",
                max_depth,
                self.limits().max_pointer_depth
            )));
        }

        let cap = self.limits().effective_cap(options.max_results);
        let mut outcome = self.find_pointers_to(target, options)?;
        let mut frontier: Vec<u64> = outcome.matches.iter().map(|r| r.address.0).collect();

        for depth in 1..max_depth {
            let remaining = cap.saturating_sub(outcome.matches.len());
            if remaining == 0 || frontier.is_empty() || outcome.cancelled {
                break;
            }

            let limit = self.limits().max_chain_frontier;
            if frontier.len() > limit {
                debug!(
                    "Pointer chain frontier at depth {} trimmed from {} to {}",
                    depth + 1,
                    frontier.len(),
                    limit
                );
                frontier.truncate(limit);
            }

            let targets: HashSet<u64> = frontier.iter().copied().collect();
            let offset = offsets.get(depth).copied().unwrap_or(0);
            let level = self.scan_pointer_level(&targets, offset, &options.clone().max_results(remaining))?;

            frontier = level.matches.iter().map(|r| r.address.0).collect();
            outcome.regions_scanned += level.regions_scanned;
            outcome.regions_skipped += level.regions_skipped;
            outcome.cancelled = level.cancelled;
            outcome.matches.extend(level.matches);
        }

        outcome.cap_reached = outcome.matches.len() >= cap;
        Ok(outcome)
    }

    /// Follows `base -> [base] + offsets[0] -> ...` forwards, one read per link
    pub fn follow_pointer_chain(&self, base: Address, offsets: &[u64]) -> MemoryResult<PointerChain> {
        let width = self.source().pointer_size();
        let mut chain = PointerChain::default();
        let mut address = base;

        for (level, &offset) in offsets.iter().enumerate() {
            let raw = access::read_exact(self.source(), address, width).map_err(|e| {
                MemoryError::read_failed(
                    address,
                    format!("pointer chain broken at level {}: {}", level, e),
                    e.os_code(),
                )
            })?;
            let value = match width {
                4 => u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as u64,
                _ => u64::from_le_bytes([raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7]]),
            };
            if value == 0 {
                return Err(MemoryError::read_failed(
                    address,
                    format!("pointer chain broken at level {}: null pointer", level),
                    None,
                ));
            }

            let link = PointerResult {
                address,
                points_to: Address::new(value),
                offset,
            };
            chain.links.push(link);
            address = link.points_to.offset(offset as i64);
        }

        Ok(chain)
    }
}
