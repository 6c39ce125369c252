//! Serializable scan requests and their dispatch

use super::{CancelToken, MemoryScanner, ScanOptions, ScanOutcome};
use crate::core::types::{Address, Match, MemoryResult};
use crate::utils::BytePattern;
use serde::{Deserialize, Serialize};

/// What to look for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScanKind {
    /// Pattern text such as `"48 8B ?? ?? 89"`
    Pattern { pattern: String },
    Bytes { bytes: Vec<u8> },
    String {
        text: String,
        #[serde(default = "default_true")]
        case_sensitive: bool,
        #[serde(default)]
        unicode: bool,
    },
    Regex { expression: String },
    Int32 { value: i32 },
    Int64 { value: i64 },
    /// `tolerance` falls back to the configured default
    Float {
        value: f32,
        #[serde(default)]
        tolerance: Option<f32>,
    },
    Double {
        value: f64,
        #[serde(default)]
        tolerance: Option<f64>,
    },
    NullPointers,
    PointersTo { target: Address },
    PointerChain {
        target: Address,
        max_depth: usize,
        #[serde(default)]
        offsets: Vec<u64>,
    },
    Code { bytes: Vec<u8> },
    FunctionPrologues,
    CallsTo { target: Address },
}

fn default_true() -> bool {
    true
}

/// A scan kind plus its bounds, alignment and cap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRequest {
    #[serde(flatten)]
    pub kind: ScanKind,
    #[serde(default)]
    pub start_address: Option<Address>,
    #[serde(default)]
    pub end_address: Option<Address>,
    #[serde(default)]
    pub aligned: bool,
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl ScanRequest {
    /// Unbounded, unaligned request using the configured cap
    pub fn new(kind: ScanKind) -> Self {
        ScanRequest {
            kind,
            start_address: None,
            end_address: None,
            aligned: false,
            max_results: None,
        }
    }

    pub fn options(&self) -> ScanOptions {
        ScanOptions {
            start_address: self.start_address,
            end_address: self.end_address,
            aligned: self.aligned,
            max_results: self.max_results,
            cancel: None,
        }
    }
}

impl MemoryScanner {
    /// Runs any request, returning matches in their tagged form
    pub fn execute(&self, request: &ScanRequest) -> MemoryResult<ScanOutcome<Match>> {
        self.execute_with(request, &request.options())
    }

    /// Like [`execute`](Self::execute), abandoning work between regions once `cancel` fires
    pub fn execute_cancellable(&self, request: &ScanRequest, cancel: CancelToken) -> MemoryResult<ScanOutcome<Match>> {
        self.execute_with(request, &request.options().cancel_with(cancel))
    }

    fn execute_with(&self, request: &ScanRequest, options: &ScanOptions) -> MemoryResult<ScanOutcome<Match>> {
        Ok(match &request.kind {
            ScanKind::Pattern { pattern } => {
                self.scan_pattern(&BytePattern::parse(pattern)?, options)?.map(Match::from)
            }
            ScanKind::Bytes { bytes } => self.scan_bytes(bytes, options)?.map(Match::from),
            ScanKind::String {
                text,
                case_sensitive,
                unicode,
            } => self
                .scan_string(text, *case_sensitive, *unicode, options)?
                .map(Match::from),
            ScanKind::Regex { expression } => self.scan_regex(expression, options)?.map(Match::from),
            ScanKind::Int32 { value } => self.scan_i32(*value, options)?.map(Match::from),
            ScanKind::Int64 { value } => self.scan_i64(*value, options)?.map(Match::from),
            ScanKind::Float { value, tolerance } => {
                let tolerance = tolerance.unwrap_or(self.limits().float_tolerance as f32);
                self.scan_f32(*value, tolerance, options)?.map(Match::from)
            }
            ScanKind::Double { value, tolerance } => {
                let tolerance = tolerance.unwrap_or(self.limits().float_tolerance);
                self.scan_f64(*value, tolerance, options)?.map(Match::from)
            }
            ScanKind::NullPointers => self.find_null_pointers(options)?.map(Match::from),
            ScanKind::PointersTo { target } => self.find_pointers_to(*target, options)?.map(Match::from),
            ScanKind::PointerChain {
                target,
                max_depth,
                offsets,
            } => self
                .find_pointer_chain(*target, *max_depth, offsets, options)?
                .map(Match::from),
            ScanKind::Code { bytes } => self.scan_code(bytes, options)?.map(Match::from),
            ScanKind::FunctionPrologues => self.find_function_prologues(options)?.map(Match::from),
            ScanKind::CallsTo { target } => self.find_calls_to(*target, options)?.map(Match::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Protection, PatternMatch};
    use crate::memory::mock::MockProcess;
    use std::sync::Arc;

    fn scanner() -> MemoryScanner {
        let mut data = vec![0u8; 0x80];
        data[0x10..0x14].copy_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let mock = MockProcess::builder()
            .region(0x7000, data, Protection::READWRITE)
            .build();
        MemoryScanner::new(Arc::new(mock))
    }

    #[test]
    fn test_request_from_json() {
        let request: ScanRequest = serde_json::from_str(
            r#"{"kind":"pattern","pattern":"DE ?? BE EF","max_results":5}"#,
        )
        .unwrap();
        assert_eq!(request.max_results, Some(5));
        assert_eq!(
            request.kind,
            ScanKind::Pattern {
                pattern: "DE ?? BE EF".to_string()
            }
        );

        let outcome = scanner().execute(&request).unwrap();
        assert_eq!(
            outcome.matches,
            vec![Match::Pattern(PatternMatch::new(
                Address::new(0x7010),
                &[0xDE, 0xAD, 0xBE, 0xEF]
            ))]
        );
    }

    #[test]
    fn test_request_bounds_apply() {
        let mut request = ScanRequest::new(ScanKind::Bytes {
            bytes: vec![0xDE, 0xAD],
        });
        request.start_address = Some(Address::new(0x7011));
        assert!(scanner().execute(&request).unwrap().is_empty());
    }

    #[test]
    fn test_null_pointer_request_is_capped() {
        let mut request = ScanRequest::new(ScanKind::NullPointers);
        request.max_results = Some(3);
        let outcome = scanner().execute(&request).unwrap();
        assert_eq!(outcome.len(), 3);
        assert!(outcome.cap_reached);
        assert!(matches!(outcome.matches[0], Match::Pointer(_)));
    }

    #[test]
    fn test_float_uses_default_tolerance() {
        let mut data = vec![0u8; 0x20];
        data[0x08..0x0C].copy_from_slice(&1.5f32.to_le_bytes());
        let mock = MockProcess::builder()
            .region(0x9000, data, Protection::READONLY)
            .build();
        let scanner = MemoryScanner::new(Arc::new(mock));

        let request: ScanRequest = serde_json::from_str(r#"{"kind":"float","value":1.5004}"#).unwrap();
        let outcome = scanner.execute(&request).unwrap();
        assert_eq!(outcome.len(), 1);
        assert!(matches!(&outcome.matches[0], Match::Numeric(m) if m.address == Address::new(0x9008)));

        let request: ScanRequest =
            serde_json::from_str(r#"{"kind":"float","value":1.5004,"tolerance":0.0001}"#).unwrap();
        assert!(scanner.execute(&request).unwrap().is_empty());
    }

    #[test]
    fn test_int64_request() {
        let mut data = vec![0u8; 0x30];
        data[0x0D..0x15].copy_from_slice(&0x0123_4567_89AB_CDEFi64.to_le_bytes());
        data[0x18..0x20].copy_from_slice(&0x0123_4567_89AB_CDEFi64.to_le_bytes());
        let mock = MockProcess::builder()
            .region(0xA000, data, Protection::READWRITE)
            .build();
        let scanner = MemoryScanner::new(Arc::new(mock));

        let request: ScanRequest =
            serde_json::from_str(r#"{"kind":"int64","value":81985529216486895}"#).unwrap();
        assert_eq!(
            request.kind,
            ScanKind::Int64 {
                value: 0x0123_4567_89AB_CDEF
            }
        );
        let outcome = scanner.execute(&request).unwrap();
        let addresses: Vec<_> = outcome
            .matches
            .iter()
            .filter_map(|m| match m {
                Match::Numeric(n) => Some(n.address),
                _ => None,
            })
            .collect();
        assert_eq!(addresses, vec![Address::new(0xA00D), Address::new(0xA018)]);

        let aligned = ScanRequest {
            aligned: true,
            ..request
        };
        assert_eq!(scanner.execute(&aligned).unwrap().len(), 1);
    }

    #[test]
    fn test_cancelled_request() {
        let token = CancelToken::new();
        token.cancel();
        let outcome = scanner()
            .execute_cancellable(&ScanRequest::new(ScanKind::NullPointers), token)
            .unwrap();
        assert!(outcome.cancelled);
        assert!(outcome.is_empty());
    }
}
