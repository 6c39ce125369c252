//! Matcher algorithms over one region buffer
//!
//! Each matcher receives the absolute address of `data[0]` and pushes hits
//! into a capped sink, returning early once the sink refuses an item.

use crate::core::types::{Address, NumericMatch, NumericType, PatternMatch, PointerResult};
use crate::memory::limits::ResultSink;
use crate::utils::BytePattern;
use memchr::memmem;
use regex::bytes::Regex;
use std::collections::HashSet;

/// First offset into `data` whose absolute address is a multiple of `step`
fn first_aligned(base: Address, step: usize) -> usize {
    let step = step as u64;
    ((step - base.0 % step) % step) as usize
}

/// Offsets of `needle` in `haystack`, overlapping occurrences included
fn find_overlapping<'a>(needle: &'a [u8], haystack: &'a [u8]) -> impl Iterator<Item = usize> + 'a {
    let finder = memmem::Finder::new(needle);
    let mut pos = 0;
    std::iter::from_fn(move || {
        let found = pos + finder.find(haystack.get(pos..)?)?;
        pos = found + 1;
        Some(found)
    })
}

/// Byte pattern with wildcard mask
pub fn match_pattern(pattern: &BytePattern, base: Address, data: &[u8], sink: &mut ResultSink<PatternMatch>) {
    for offset in pattern.find_iter(data) {
        let hit = PatternMatch::new(base.add(offset as u64), &data[offset..offset + pattern.len()]);
        if !sink.push(hit) {
            return;
        }
    }
}

/// Single-byte-per-character text, optionally folding ASCII case on both sides
pub fn match_ascii(
    needle: &[u8],
    case_sensitive: bool,
    base: Address,
    data: &[u8],
    sink: &mut ResultSink<PatternMatch>,
) {
    if needle.is_empty() {
        return;
    }

    let folded;
    let (needle, haystack) = if case_sensitive {
        (needle.to_vec(), data)
    } else {
        folded = data.to_ascii_lowercase();
        (needle.to_ascii_lowercase(), folded.as_slice())
    };

    for offset in find_overlapping(&needle, haystack) {
        let hit = PatternMatch::new(base.add(offset as u64), &data[offset..offset + needle.len()]);
        if !sink.push(hit) {
            return;
        }
    }
}

/// UTF-16LE text, matched only at even absolute addresses
pub fn match_utf16(text: &str, base: Address, data: &[u8], sink: &mut ResultSink<PatternMatch>) {
    let needle: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
    if needle.is_empty() {
        return;
    }

    for offset in find_overlapping(&needle, data) {
        if (base.0 + offset as u64) % 2 != 0 {
            continue;
        }
        let hit = PatternMatch::new(base.add(offset as u64), &data[offset..offset + needle.len()]);
        if !sink.push(hit) {
            return;
        }
    }
}

/// Regular expression over raw bytes; non-overlapping, leftmost-first
pub fn match_regex(regex: &Regex, base: Address, data: &[u8], sink: &mut ResultSink<PatternMatch>) {
    for m in regex.find_iter(data) {
        if !sink.push(PatternMatch::new(base.add(m.start() as u64), m.as_bytes())) {
            return;
        }
    }
}

/// Exact little-endian integer match, stepping `1` byte or the value width
pub fn match_exact(
    value: &[u8],
    data_type: NumericType,
    aligned: bool,
    base: Address,
    data: &[u8],
    sink: &mut ResultSink<NumericMatch>,
) {
    let size = value.len();
    if size == 0 || data.len() < size {
        return;
    }
    let (first, step) = if aligned {
        (first_aligned(base, size), size)
    } else {
        (0, 1)
    };

    for offset in (first..=data.len() - size).step_by(step) {
        let candidate = &data[offset..offset + size];
        if candidate == value {
            let hit = NumericMatch {
                address: base.add(offset as u64),
                data_type,
                bytes: candidate.to_vec(),
            };
            if !sink.push(hit) {
                return;
            }
        }
    }
}

macro_rules! tolerant_matcher {
    ($name:ident, $ty:ty, $data_type:expr) => {
        /// Aligned floating-point match within `tolerance`; boundary equality matches
        pub fn $name(
            value: $ty,
            tolerance: $ty,
            base: Address,
            data: &[u8],
            sink: &mut ResultSink<NumericMatch>,
        ) {
            // Negative or NaN tolerance never matches
            if tolerance.is_nan() || tolerance < 0.0 {
                return;
            }
            const SIZE: usize = std::mem::size_of::<$ty>();
            if data.len() < SIZE {
                return;
            }

            for offset in (first_aligned(base, SIZE)..=data.len() - SIZE).step_by(SIZE) {
                let mut raw = [0u8; SIZE];
                raw.copy_from_slice(&data[offset..offset + SIZE]);
                let candidate = <$ty>::from_le_bytes(raw);
                if (candidate - value).abs() <= tolerance {
                    let hit = NumericMatch {
                        address: base.add(offset as u64),
                        data_type: $data_type,
                        bytes: raw.to_vec(),
                    };
                    if !sink.push(hit) {
                        return;
                    }
                }
            }
        }
    };
}

tolerant_matcher!(match_f32, f32, NumericType::Float);
tolerant_matcher!(match_f64, f64, NumericType::Double);

fn read_slot(data: &[u8], offset: usize, width: usize) -> u64 {
    match width {
        4 => u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]]) as u64,
        _ => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&data[offset..offset + 8]);
            u64::from_le_bytes(raw)
        }
    }
}

/// Pointer-aligned slots whose value is one of `targets`
///
/// Each hit records the slot address, the value it holds and `offset`.
pub fn match_pointers(
    targets: &HashSet<u64>,
    width: usize,
    offset: u64,
    base: Address,
    data: &[u8],
    sink: &mut ResultSink<PointerResult>,
) {
    let width = if width == 4 { 4 } else { 8 };
    if data.len() < width {
        return;
    }

    for at in (first_aligned(base, width)..=data.len() - width).step_by(width) {
        let value = read_slot(data, at, width);
        if targets.contains(&value) {
            let hit = PointerResult {
                address: base.add(at as u64),
                points_to: Address::new(value),
                offset,
            };
            if !sink.push(hit) {
                return;
            }
        }
    }
}

/// Near-relative calls (`E8 rel32`) whose computed destination is `target`
///
/// No instruction-boundary validation: an `E8` byte inside another
/// instruction can produce a false positive.
pub fn match_calls_to(target: Address, base: Address, data: &[u8], sink: &mut ResultSink<PatternMatch>) {
    const LEN: usize = super::NEAR_CALL_LEN;
    for site in memchr::memchr_iter(super::NEAR_CALL_OPCODE, data) {
        if site + LEN > data.len() {
            break;
        }
        let displacement =
            i32::from_le_bytes([data[site + 1], data[site + 2], data[site + 3], data[site + 4]]);
        let site_address = base.add(site as u64);
        let destination = site_address.offset(LEN as i64 + displacement as i64);
        if destination == target && !sink.push(PatternMatch::new(site_address, &data[site..site + LEN])) {
            return;
        }
    }
}

/// Offsets where two equal-length buffers differ, reported against `base`
pub fn diff_bytes(base: Address, before: &[u8], after: &[u8], sink: &mut ResultSink<Address>) {
    for (i, (a, b)) in before.iter().zip(after).enumerate() {
        if a != b && !sink.push(base.add(i as u64)) {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn addrs<T>(sink: ResultSink<T>, f: impl Fn(&T) -> Address) -> Vec<u64> {
        sink.into_vec().iter().map(|m| f(m).0).collect()
    }

    #[test]
    fn test_ascii_case_folding() {
        let mut data = vec![0u8; 64];
        data[10..21].copy_from_slice(b"SECRETVALUE");
        let base = Address::new(0x1000);

        let mut sink = ResultSink::new(10);
        match_ascii(b"SECRETVALUE", true, base, &data, &mut sink);
        assert_eq!(addrs(sink, |m| m.address), vec![0x100A]);

        let mut sink = ResultSink::new(10);
        match_ascii(b"secretvalue", true, base, &data, &mut sink);
        assert!(sink.is_empty());

        let mut sink = ResultSink::new(10);
        match_ascii(b"secretvalue", false, base, &data, &mut sink);
        let hits = sink.into_vec();
        assert_eq!(hits.len(), 1);
        // Payload is the target's bytes, not the folded copy
        assert_eq!(hits[0].bytes, b"SECRETVALUE");
    }

    #[test]
    fn test_utf16_even_offsets_only() {
        let wide: Vec<u8> = "Hi".encode_utf16().flat_map(u16::to_le_bytes).collect();
        let mut data = vec![0u8; 16];
        data[3..7].copy_from_slice(&wide);
        data[8..12].copy_from_slice(&wide);

        let mut sink = ResultSink::new(10);
        match_utf16("Hi", Address::new(0x2000), &data, &mut sink);
        assert_eq!(addrs(sink, |m| m.address), vec![0x2008]);
    }

    #[test]
    fn test_regex_spans() {
        let regex = Regex::new(r"key=\d+").unwrap();
        let data = b"\x00\x00key=42\x00key=7";
        let mut sink = ResultSink::new(10);
        match_regex(&regex, Address::new(0x100), data, &mut sink);
        let hits = sink.into_vec();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].address, Address::new(0x102));
        assert_eq!(hits[0].bytes, b"key=42");
        assert_eq!(hits[1].address, Address::new(0x109));
    }

    #[test]
    fn test_exact_alignment() {
        let mut data = vec![0u8; 16];
        data[1..5].copy_from_slice(&7i32.to_le_bytes());
        data[8..12].copy_from_slice(&7i32.to_le_bytes());

        let mut sink = ResultSink::new(10);
        match_exact(&7i32.to_le_bytes(), NumericType::Int32, false, Address::new(0), &data, &mut sink);
        assert_eq!(addrs(sink, |m| m.address), vec![1, 8]);

        let mut sink = ResultSink::new(10);
        match_exact(&7i32.to_le_bytes(), NumericType::Int32, true, Address::new(0), &data, &mut sink);
        assert_eq!(addrs(sink, |m| m.address), vec![8]);
    }

    #[test]
    fn test_alignment_is_absolute() {
        // Buffer starts at an odd address: aligned slots begin at offset 3
        let data = [0u8; 12];
        let mut sink = ResultSink::new(10);
        match_exact(&[0; 4], NumericType::Int32, true, Address::new(0x1001), &data, &mut sink);
        assert_eq!(addrs(sink, |m| m.address), vec![0x1004, 0x1008]);
    }

    #[test]
    fn test_null_pointer_slots() {
        let data = vec![0u8; 16 * 8];
        let targets = HashSet::from([0u64]);
        let mut sink = ResultSink::new(100);
        match_pointers(&targets, 8, 0, Address::new(0x4000), &data, &mut sink);
        let hits = addrs(sink, |m| m.address);
        assert_eq!(hits.len(), 16);
        assert!(hits.windows(2).all(|w| w[1] - w[0] == 8));
    }

    #[test]
    fn test_pointer_width_four() {
        let mut data = vec![0xFFu8; 16];
        data[4..8].copy_from_slice(&0x1234u32.to_le_bytes());
        let targets = HashSet::from([0x1234u64]);
        let mut sink = ResultSink::new(10);
        match_pointers(&targets, 4, 0, Address::new(0x100), &data, &mut sink);
        let hits = sink.into_vec();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].address, Address::new(0x104));
        assert_eq!(hits[0].points_to, Address::new(0x1234));
    }

    #[test]
    fn test_call_resolution() {
        let base = Address::new(0x401000);
        let target = Address::new(0x401100);
        // call at +0x10: destination = 0x401010 + 5 + rel
        let rel = (target.0 as i64 - (base.0 as i64 + 0x10 + 5)) as i32;
        let mut data = vec![0x90u8; 0x40];
        data[0x10] = 0xE8;
        data[0x11..0x15].copy_from_slice(&rel.to_le_bytes());
        // Truncated call at the end of the buffer is ignored
        data[0x3D] = 0xE8;

        let mut sink = ResultSink::new(10);
        match_calls_to(target, base, &data, &mut sink);
        let hits = sink.into_vec();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].address, Address::new(0x401010));
        assert_eq!(hits[0].size, 5);
        assert_eq!(hits[0].bytes[0], 0xE8);
    }

    #[test]
    fn test_negative_call_displacement() {
        let base = Address::new(0x500000);
        let mut data = vec![0u8; 0x20];
        data[0x10] = 0xE8;
        data[0x11..0x15].copy_from_slice(&(-0x15i32).to_le_bytes());
        let mut sink = ResultSink::new(10);
        match_calls_to(base, base, &data, &mut sink);
        assert_eq!(addrs(sink, |m| m.address), vec![0x500010]);
    }

    #[test]
    fn test_diff_three_offsets() {
        let a = vec![0u8; 32];
        let mut b = a.clone();
        b[1] = 1;
        b[7] = 2;
        b[31] = 3;
        let mut sink = ResultSink::new(100);
        diff_bytes(Address::new(0x9000), &a, &b, &mut sink);
        assert_eq!(addrs(sink, |a| *a), vec![0x9001, 0x9007, 0x901F]);
    }

    proptest! {
        #[test]
        fn tolerance_window_matches(v in -1.0e6f64..1.0e6, delta in -10.0f64..10.0, t in 0.0f64..10.0) {
            let c = v + delta;
            let data = c.to_le_bytes();
            let mut sink = ResultSink::new(1);
            match_f64(v, t, Address::new(0), &data, &mut sink);
            prop_assert_eq!(!sink.is_empty(), (c - v).abs() <= t);
        }

        #[test]
        fn tolerance_boundary_matches(v in -1.0e6f32..1.0e6, c in -1.0e6f32..1.0e6) {
            let t = (c - v).abs();
            let data = c.to_le_bytes();
            let mut sink = ResultSink::new(1);
            match_f32(v, t, Address::new(0), &data, &mut sink);
            prop_assert_eq!(sink.len(), 1);
        }

        #[test]
        fn negative_tolerance_never_matches(v in -1.0e6f64..1.0e6, t in -1.0e6f64..-1.0e-9) {
            let data = v.to_le_bytes();
            let mut sink = ResultSink::new(1);
            match_f64(v, t, Address::new(0), &data, &mut sink);
            prop_assert!(sink.is_empty());
        }
    }
}
