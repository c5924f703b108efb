use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::DocumentError;
use super::types::Segment;

/// Cascade separator priority: paragraph break, line break, sentence end,
/// word boundary.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", "! ", "? ", " "];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStrategy {
    Fixed,
    SeparatorCascade,
    Paragraph,
}

impl SegmentStrategy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::SeparatorCascade => "separator_cascade",
            Self::Paragraph => "paragraph",
        }
    }
}

impl std::fmt::Display for SegmentStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentStrategy {
    type Err = DocumentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "separator_cascade" => Ok(Self::SeparatorCascade),
            "paragraph" => Ok(Self::Paragraph),
            other => Err(DocumentError::UnknownStrategy(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    pub strategy: SegmentStrategy,
    /// Target maximum segment size in characters.
    pub max_size: usize,
    /// Characters of repetition between consecutive segments (`fixed` only;
    /// `separator_cascade` validates it, `paragraph` ignores it).
    pub overlap: usize,
    /// Cascade separators, highest priority first.
    pub separators: Vec<String>,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            strategy: SegmentStrategy::SeparatorCascade,
            max_size: 500,
            overlap: 50,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_owned()).collect(),
        }
    }
}

/// Deterministically splits text into ordered, bounded-size segments.
///
/// Pure given its inputs; every emitted segment is a contiguous trimmed
/// slice of the source, so character offsets always satisfy
/// `end_offset - start_offset == text.chars().count()`.
pub struct Segmenter {
    config: SegmenterConfig,
}

impl Segmenter {
    /// # Errors
    ///
    /// Returns [`DocumentError::InvalidConfiguration`] when `max_size` is
    /// zero, or when `overlap >= max_size` for the overlap-aware strategies.
    pub fn new(config: SegmenterConfig) -> Result<Self, DocumentError> {
        if config.max_size == 0 {
            return Err(DocumentError::InvalidConfiguration(
                "max_size must be positive".into(),
            ));
        }
        if matches!(
            config.strategy,
            SegmentStrategy::Fixed | SegmentStrategy::SeparatorCascade
        ) && config.overlap >= config.max_size
        {
            return Err(DocumentError::InvalidConfiguration(format!(
                "overlap ({}) must be less than max_size ({})",
                config.overlap, config.max_size
            )));
        }
        Ok(Self { config })
    }

    #[must_use]
    pub fn config(&self) -> &SegmenterConfig {
        &self.config
    }

    #[must_use]
    pub fn segment(&self, text: &str) -> Vec<Segment> {
        if text.is_empty() {
            return Vec::new();
        }

        let map = CharMap::new(text);
        let ranges = match self.config.strategy {
            SegmentStrategy::Fixed => {
                fixed_ranges(text, &map, self.config.max_size, self.config.overlap)
            }
            SegmentStrategy::SeparatorCascade => {
                let separators: Vec<&str> =
                    self.config.separators.iter().map(String::as_str).collect();
                let mut ranges = Vec::new();
                cascade_ranges(
                    text,
                    &map,
                    0,
                    map.char_count(),
                    &separators,
                    self.config.max_size,
                    &mut ranges,
                );
                ranges
            }
            SegmentStrategy::Paragraph => paragraph_ranges(text, &map, self.config.max_size),
        };

        ranges
            .into_iter()
            .enumerate()
            .map(|(i, (start, end))| Segment {
                text: map.slice(text, start, end).to_owned(),
                start_offset: start,
                end_offset: end,
                sequence_index: i,
            })
            .collect()
    }
}

/// Byte offset per character index, so character ranges slice in O(1).
struct CharMap {
    bounds: Vec<usize>,
}

impl CharMap {
    fn new(text: &str) -> Self {
        let mut bounds: Vec<usize> = text.char_indices().map(|(b, _)| b).collect();
        bounds.push(text.len());
        Self { bounds }
    }

    fn char_count(&self) -> usize {
        self.bounds.len() - 1
    }

    fn slice<'a>(&self, text: &'a str, start: usize, end: usize) -> &'a str {
        &text[self.bounds[start]..self.bounds[end]]
    }

    fn char_of_byte(&self, byte: usize) -> usize {
        self.bounds.partition_point(|&b| b < byte)
    }
}

/// Shrink a char range past its surrounding whitespace; `None` when nothing
/// remains.
fn trimmed_range(
    text: &str,
    map: &CharMap,
    start: usize,
    end: usize,
) -> Option<(usize, usize)> {
    let raw = map.slice(text, start, end);
    if raw.trim().is_empty() {
        return None;
    }
    let lead_bytes = raw.len() - raw.trim_start().len();
    let lead_chars = raw[..lead_bytes].chars().count();
    let tail_bytes = raw.len() - raw.trim_end().len();
    let tail_chars = raw[raw.len() - tail_bytes..].chars().count();
    Some((start + lead_chars, end - tail_chars))
}

fn fixed_ranges(text: &str, map: &CharMap, max_size: usize, overlap: usize) -> Vec<(usize, usize)> {
    let total = map.char_count();
    let step = max_size - overlap;
    let mut ranges = Vec::new();
    let mut start = 0;

    while start < total {
        // Clamp the final window to the end of the text.
        let end = usize::min(start + max_size, total);
        if let Some(range) = trimmed_range(text, map, start, end) {
            ranges.push(range);
        }
        if end == total {
            break;
        }
        start += step;
    }

    ranges
}

fn cascade_ranges(
    text: &str,
    map: &CharMap,
    start: usize,
    end: usize,
    separators: &[&str],
    max_size: usize,
    out: &mut Vec<(usize, usize)>,
) {
    if start >= end {
        return;
    }
    if end - start <= max_size {
        if let Some(range) = trimmed_range(text, map, start, end) {
            out.push(range);
        }
        return;
    }
    // Out of separators: emit oversize rather than lose content.
    let Some((separator, rest)) = separators.split_first() else {
        if let Some(range) = trimmed_range(text, map, start, end) {
            out.push(range);
        }
        return;
    };

    let pieces = split_on(text, map, start, end, separator);
    if pieces.len() <= 1 {
        cascade_ranges(text, map, start, end, rest, max_size, out);
        return;
    }

    let mut buffer: Option<(usize, usize)> = None;
    for (piece_start, piece_end) in pieces {
        buffer = match buffer {
            None => Some((piece_start, piece_end)),
            Some((buf_start, _)) if piece_end - buf_start <= max_size => {
                // Extending through the separator keeps the buffer contiguous.
                Some((buf_start, piece_end))
            }
            Some((buf_start, buf_end)) => {
                cascade_ranges(text, map, buf_start, buf_end, rest, max_size, out);
                Some((piece_start, piece_end))
            }
        };
    }
    if let Some((buf_start, buf_end)) = buffer {
        cascade_ranges(text, map, buf_start, buf_end, rest, max_size, out);
    }
}

/// Split a char range on a separator; pieces exclude the separator itself.
fn split_on(
    text: &str,
    map: &CharMap,
    start: usize,
    end: usize,
    separator: &str,
) -> Vec<(usize, usize)> {
    let slice = map.slice(text, start, end);
    let base_byte = map.bounds[start];
    let separator_chars = separator.chars().count();

    let mut pieces = Vec::new();
    let mut cursor = start;
    for (rel_byte, _) in slice.match_indices(separator) {
        let sep_start = map.char_of_byte(base_byte + rel_byte);
        pieces.push((cursor, sep_start));
        cursor = sep_start + separator_chars;
    }
    pieces.push((cursor, end));
    pieces
}

fn paragraph_ranges(text: &str, map: &CharMap, max_size: usize) -> Vec<(usize, usize)> {
    let paragraphs = paragraph_bounds(text, map);

    let mut ranges = Vec::new();
    let mut buffer: Option<(usize, usize)> = None;
    for (para_start, para_end) in paragraphs {
        buffer = match buffer {
            None => Some((para_start, para_end)),
            Some((buf_start, _)) if para_end - buf_start <= max_size => {
                Some((buf_start, para_end))
            }
            Some(full) => {
                ranges.push(full);
                // An oversize paragraph rides alone; the semantic unit wins
                // over the size limit.
                Some((para_start, para_end))
            }
        };
    }
    if let Some(range) = buffer {
        ranges.push(range);
    }
    ranges
}

/// Trimmed, non-empty paragraph ranges delimited by blank lines (whitespace
/// runs containing at least two newlines).
fn paragraph_bounds(text: &str, map: &CharMap) -> Vec<(usize, usize)> {
    let chars: Vec<char> = text.chars().collect();
    let mut bounds = Vec::new();
    let mut para_start = 0;
    let mut i = 0;

    while i < chars.len() {
        if chars[i].is_whitespace() {
            let run_start = i;
            let mut newlines = 0;
            while i < chars.len() && chars[i].is_whitespace() {
                if chars[i] == '\n' {
                    newlines += 1;
                }
                i += 1;
            }
            if newlines >= 2 {
                if let Some(range) = trimmed_range(text, map, para_start, run_start) {
                    bounds.push(range);
                }
                para_start = i;
            }
        } else {
            i += 1;
        }
    }

    if let Some(range) = trimmed_range(text, map, para_start, chars.len()) {
        bounds.push(range);
    }

    bounds
}
