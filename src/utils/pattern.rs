//! Byte patterns with wildcard masks
//!
//! A pattern is a byte sequence plus a parallel mask; `mask[i] == false`
//! makes byte `i` a wildcard. Searching anchors on the longest run of
//! significant bytes with `memchr::memmem` and then verifies the rest, which
//! yields exactly the positions a plain sliding-window compare would,
//! overlapping matches included.

use crate::core::types::{MemoryError, MemoryResult};
use memchr::memmem;
use serde::{Deserialize, Serialize};

/// Byte sequence with a per-byte significance mask
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BytePattern {
    bytes: Vec<u8>,
    mask: Vec<bool>,
}

impl BytePattern {
    /// Builds a pattern from parallel byte and mask arrays
    pub fn new(bytes: Vec<u8>, mask: Vec<bool>) -> MemoryResult<Self> {
        if bytes.is_empty() {
            return Err(MemoryError::InvalidPattern("Empty pattern".to_string()));
        }
        if bytes.len() != mask.len() {
            return Err(MemoryError::InvalidPattern(format!(
                "Pattern has {} bytes but mask has {} entries",
                bytes.len(),
                mask.len()
            )));
        }
        Ok(BytePattern { bytes, mask })
    }

    /// Pattern in which every byte is significant
    pub fn exact(bytes: &[u8]) -> MemoryResult<Self> {
        BytePattern::new(bytes.to_vec(), vec![true; bytes.len()])
    }

    /// Parses `"48 8B ?? ?? 89"`; `?` and `??` are wildcards
    ///
    /// Each byte token is one or two hex digits.
    pub fn parse(text: &str) -> MemoryResult<Self> {
        let parts: Vec<&str> = text.split_whitespace().collect();
        if parts.is_empty() {
            return Err(MemoryError::InvalidPattern("Empty pattern".to_string()));
        }

        let mut bytes = Vec::with_capacity(parts.len());
        let mut mask = Vec::with_capacity(parts.len());
        for part in parts {
            if part == "??" || part == "?" {
                bytes.push(0);
                mask.push(false);
                continue;
            }
            // One digit is the low nibble, as in "A" for 0x0A
            let digits = match part.len() {
                1 => format!("0{part}"),
                2 => part.to_string(),
                _ => {
                    return Err(MemoryError::InvalidPattern(format!(
                        "Invalid hex byte '{}': must be 1 or 2 digits",
                        part
                    )))
                }
            };
            let decoded = hex::decode(&digits)
                .map_err(|_| MemoryError::InvalidPattern(format!("Invalid hex: {}", part)))?;
            bytes.push(decoded[0]);
            mask.push(true);
        }

        BytePattern::new(bytes, mask)
    }

    /// Code-style pattern: raw bytes plus a mask string of `x` (match) and `?` (wildcard)
    pub fn with_mask_string(bytes: &[u8], mask: &str) -> MemoryResult<Self> {
        let mask = mask
            .chars()
            .map(|c| match c {
                'x' | 'X' => Ok(true),
                '?' => Ok(false),
                other => Err(MemoryError::InvalidPattern(format!(
                    "Invalid mask character '{}'",
                    other
                ))),
            })
            .collect::<MemoryResult<Vec<bool>>>()?;
        BytePattern::new(bytes.to_vec(), mask)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    /// True when no byte is a wildcard
    pub fn is_exact(&self) -> bool {
        self.mask.iter().all(|m| *m)
    }

    /// Compares the pattern against `data` starting at `start`
    pub fn matches_at(&self, data: &[u8], start: usize) -> bool {
        let Some(window) = data.get(start..start + self.bytes.len()) else {
            return false;
        };
        window
            .iter()
            .zip(self.bytes.iter().zip(&self.mask))
            .all(|(d, (p, significant))| !significant || d == p)
    }

    /// Offset and length of the longest run of significant bytes
    fn anchor(&self) -> Option<(usize, usize)> {
        let mut best: Option<(usize, usize)> = None;
        let mut run_start = 0;
        for (i, significant) in self.mask.iter().chain(std::iter::once(&false)).enumerate() {
            if *significant {
                continue;
            }
            let run_len = i - run_start;
            if run_len > 0 && best.map_or(true, |(_, len)| run_len > len) {
                best = Some((run_start, run_len));
            }
            run_start = i + 1;
        }
        best
    }

    /// Every start offset in `haystack` where the pattern matches, ascending
    pub fn find_iter<'a>(&'a self, haystack: &'a [u8]) -> PatternMatches<'a> {
        let anchor = self.anchor();
        PatternMatches {
            pattern: self,
            haystack,
            finder: anchor.map(|(start, len)| (start, memmem::Finder::new(&self.bytes[start..start + len]))),
            pos: 0,
        }
    }
}

/// Parses pattern text into a [`BytePattern`]
pub fn parse_pattern(text: &str) -> MemoryResult<BytePattern> {
    BytePattern::parse(text)
}

/// Iterator over match offsets produced by [`BytePattern::find_iter`]
pub struct PatternMatches<'a> {
    pattern: &'a BytePattern,
    haystack: &'a [u8],
    finder: Option<(usize, memmem::Finder<'a>)>,
    pos: usize,
}

impl Iterator for PatternMatches<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let len = self.pattern.len();
        if len == 0 || self.haystack.len() < len {
            return None;
        }
        let last_start = self.haystack.len() - len;

        while self.pos <= last_start {
            let start = match &self.finder {
                // All wildcards: every position matches
                None => self.pos,
                Some((offset, finder)) => {
                    let needle_len = finder.needle().len();
                    let window =
                        &self.haystack[self.pos + offset..last_start + offset + needle_len];
                    self.pos + finder.find(window)?
                }
            };
            self.pos = start + 1;
            if self.pattern.matches_at(self.haystack, start) {
                return Some(start);
            }
        }
        None
    }
}
