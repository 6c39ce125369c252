//! Pattern, text and numeric scans

use super::{matchers, MemoryScanner, ScanOptions, ScanOutcome};
use crate::core::types::{MemoryError, MemoryResult, NumericMatch, NumericType, PatternMatch};
use crate::memory::regions::RegionFilter;
use crate::utils::BytePattern;
use regex::bytes::Regex;

impl MemoryScanner {
    /// Byte pattern with wildcard mask over every committed region
    pub fn scan_pattern(&self, pattern: &BytePattern, options: &ScanOptions) -> MemoryResult<ScanOutcome<PatternMatch>> {
        self.scan_regions(&RegionFilter::all(), options, |base, data, sink| {
            matchers::match_pattern(pattern, base, data, sink)
        })
    }

    /// Exact byte sequence over every committed region
    pub fn scan_bytes(&self, bytes: &[u8], options: &ScanOptions) -> MemoryResult<ScanOutcome<PatternMatch>> {
        let pattern = BytePattern::exact(bytes)?;
        self.scan_pattern(&pattern, options)
    }

    /// Text search; `unicode` selects UTF-16LE at even addresses
    ///
    /// Case folding applies to ASCII letters on the single-byte path only;
    /// the UTF-16 path always compares exactly.
    pub fn scan_string(
        &self,
        text: &str,
        case_sensitive: bool,
        unicode: bool,
        options: &ScanOptions,
    ) -> MemoryResult<ScanOutcome<PatternMatch>> {
        if text.is_empty() {
            return Err(MemoryError::InvalidPattern("Empty search string".to_string()));
        }

        self.scan_regions(&RegionFilter::all(), options, |base, data, sink| {
            if unicode {
                matchers::match_utf16(text, base, data, sink)
            } else {
                matchers::match_ascii(text.as_bytes(), case_sensitive, base, data, sink)
            }
        })
    }

    /// Regular expression over raw region bytes
    ///
    /// Matches never span two regions. Unicode classes such as `.` only match
    /// valid UTF-8, so disable Unicode mode (`(?-u)`) to match arbitrary bytes.
    pub fn scan_regex(&self, expression: &str, options: &ScanOptions) -> MemoryResult<ScanOutcome<PatternMatch>> {
        let regex = Regex::new(expression)
            .map_err(|e| MemoryError::InvalidPattern(format!("Invalid regex '{}': {}", expression, e)))?;

        self.scan_regions(&RegionFilter::all(), options, |base, data, sink| {
            matchers::match_regex(&regex, base, data, sink)
        })
    }

    pub fn scan_i32(&self, value: i32, options: &ScanOptions) -> MemoryResult<ScanOutcome<NumericMatch>> {
        self.scan_exact(&value.to_le_bytes(), NumericType::Int32, options)
    }

    pub fn scan_i64(&self, value: i64, options: &ScanOptions) -> MemoryResult<ScanOutcome<NumericMatch>> {
        self.scan_exact(&value.to_le_bytes(), NumericType::Int64, options)
    }

    fn scan_exact(
        &self,
        value: &[u8],
        data_type: NumericType,
        options: &ScanOptions,
    ) -> MemoryResult<ScanOutcome<NumericMatch>> {
        self.scan_regions(&RegionFilter::all(), options, |base, data, sink| {
            matchers::match_exact(value, data_type, options.aligned, base, data, sink)
        })
    }

    /// Floats within `tolerance` of `value`, on 4-byte aligned slots
    pub fn scan_f32(&self, value: f32, tolerance: f32, options: &ScanOptions) -> MemoryResult<ScanOutcome<NumericMatch>> {
        self.scan_regions(&RegionFilter::all(), options, |base, data, sink| {
            matchers::match_f32(value, tolerance, base, data, sink)
        })
    }

    /// Doubles within `tolerance` of `value`, on 8-byte aligned slots
    pub fn scan_f64(&self, value: f64, tolerance: f64, options: &ScanOptions) -> MemoryResult<ScanOutcome<NumericMatch>> {
        self.scan_regions(&RegionFilter::all(), options, |base, data, sink| {
            matchers::match_f64(value, tolerance, base, data, sink)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Address, ErrorKind, NumericType, Protection};
    use crate::memory::mock::MockProcess;
    use std::sync::Arc;

    fn scanner() -> MemoryScanner {
        let mut data = vec![0u8; 0x100];
        data[0x20..0x24].copy_from_slice(&1337i32.to_le_bytes());
        data[0x40..0x48].copy_from_slice(&2.5f64.to_le_bytes());
        data[0x60..0x67].copy_from_slice(b"Example");
        let mock = MockProcess::builder()
            .region(0x10000, data, Protection::READWRITE)
            .build();
        MemoryScanner::new(Arc::new(mock))
    }

    #[test]
    fn test_scan_i32() {
        let outcome = scanner().scan_i32(1337, &ScanOptions::new().aligned()).unwrap();
        assert_eq!(outcome.len(), 1);
        assert_eq!(outcome.matches[0].address, Address::new(0x10020));
        assert_eq!(outcome.matches[0].as_i64(), Some(1337));
    }

    #[test]
    fn test_scan_i64_alignment() {
        let mut data = vec![0u8; 0x40];
        // 0x11..0x19 straddles the 8-byte boundary at 0x18
        data[0x11..0x19].copy_from_slice(&(-5i64).to_le_bytes());
        data[0x20..0x28].copy_from_slice(&(-5i64).to_le_bytes());
        let mock = MockProcess::builder()
            .region(0x20000, data, Protection::READWRITE)
            .build();
        let scanner = MemoryScanner::new(Arc::new(mock));

        let unaligned = scanner.scan_i64(-5, &ScanOptions::new()).unwrap();
        let addresses: Vec<_> = unaligned.matches.iter().map(|m| m.address).collect();
        assert_eq!(addresses, vec![Address::new(0x20011), Address::new(0x20020)]);
        assert!(unaligned
            .matches
            .iter()
            .all(|m| m.data_type == NumericType::Int64 && m.as_i64() == Some(-5)));

        let aligned = scanner.scan_i64(-5, &ScanOptions::new().aligned()).unwrap();
        let addresses: Vec<_> = aligned.matches.iter().map(|m| m.address).collect();
        assert_eq!(addresses, vec![Address::new(0x20020)]);
    }

    #[test]
    fn test_scan_f64_tolerance() {
        let scanner = scanner();
        let hit = scanner.scan_f64(2.5005, 0.001, &ScanOptions::new()).unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit.matches[0].address, Address::new(0x10040));

        let miss = scanner.scan_f64(2.6, 0.001, &ScanOptions::new()).unwrap();
        assert!(miss.is_empty());
    }

    #[test]
    fn test_scan_string_paths() {
        let scanner = scanner();
        let exact = scanner.scan_string("Example", true, false, &ScanOptions::new()).unwrap();
        assert_eq!(exact.len(), 1);
        let folded = scanner.scan_string("EXAMPLE", false, false, &ScanOptions::new()).unwrap();
        assert_eq!(folded.matches, exact.matches);
        let wide = scanner.scan_string("Example", true, true, &ScanOptions::new()).unwrap();
        assert!(wide.is_empty());
    }

    #[test]
    fn test_invalid_inputs_are_typed_errors() {
        let scanner = scanner();
        let err = scanner.scan_regex("(unclosed", &ScanOptions::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPattern);
        let err = scanner.scan_string("", true, false, &ScanOptions::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPattern);
        let err = scanner.scan_bytes(&[], &ScanOptions::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidPattern);
    }

    #[test]
    fn test_scan_regex() {
        let outcome = scanner().scan_regex("Ex[a-z]+", &ScanOptions::new()).unwrap();
        assert_eq!(outcome.len(), 1);
        assert_eq!(outcome.matches[0].bytes, b"Example");
    }
}
