//! Opcode heuristics over executable regions
//!
//! There is no instruction decoder here. Prologue and call detection are
//! byte-pattern heuristics and can report positions that are not on an
//! instruction boundary.

use super::{matchers, MemoryScanner, ScanOptions, ScanOutcome};
use crate::core::types::{Address, MemoryResult, PatternMatch};
use crate::memory::regions::RegionFilter;
use crate::utils::BytePattern;
use std::collections::BTreeMap;

/// `call rel32`
pub const NEAR_CALL_OPCODE: u8 = 0xE8;
/// Opcode plus 4-byte displacement
pub const NEAR_CALL_LEN: usize = 5;

/// Common x86/x64 function entry sequences
pub const FUNCTION_PROLOGUES: [&[u8]; 4] = [
    // push ebp; mov ebp, esp
    &[0x55, 0x8B, 0xEC],
    // mov [rsp+..], rbx
    &[0x48, 0x89, 0x5C, 0x24],
    // sub rsp, imm8
    &[0x48, 0x83, 0xEC],
    // push rbp; mov rbp, rsp
    &[0x55, 0x48, 0x89, 0xE5],
];

impl MemoryScanner {
    /// Exact opcode bytes within executable regions
    pub fn scan_code(&self, bytes: &[u8], options: &ScanOptions) -> MemoryResult<ScanOutcome<PatternMatch>> {
        let pattern = BytePattern::exact(bytes)?;
        self.scan_regions(&RegionFilter::all().executable(), options, |base, data, sink| {
            matchers::match_pattern(&pattern, base, data, sink)
        })
    }

    /// Likely function starts, deduplicated and in ascending address order
    pub fn find_function_prologues(&self, options: &ScanOptions) -> MemoryResult<ScanOutcome<PatternMatch>> {
        let patterns = FUNCTION_PROLOGUES
            .iter()
            .map(|bytes| BytePattern::exact(bytes))
            .collect::<MemoryResult<Vec<_>>>()?;

        self.scan_regions(&RegionFilter::all().executable(), options, |base, data, sink| {
            let mut hits: BTreeMap<Address, PatternMatch> = BTreeMap::new();
            for pattern in &patterns {
                for offset in pattern.find_iter(data) {
                    let address = base.add(offset as u64);
                    hits.entry(address)
                        .or_insert_with(|| PatternMatch::new(address, &data[offset..offset + pattern.len()]));
                }
            }
            for hit in hits.into_values() {
                if !sink.push(hit) {
                    return;
                }
            }
        })
    }

    /// Near calls in executable regions whose destination is `target`
    pub fn find_calls_to(&self, target: Address, options: &ScanOptions) -> MemoryResult<ScanOutcome<PatternMatch>> {
        self.scan_regions(&RegionFilter::all().executable(), options, |base, data, sink| {
            matchers::match_calls_to(target, base, data, sink)
        })
    }
}
