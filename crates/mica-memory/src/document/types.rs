use serde::{Deserialize, Serialize};

/// A loaded source document before segmentation.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub content: String,
    /// Identifier of the originating file or input, e.g. `notes.md`.
    pub source: String,
    pub content_type: String,
}

/// A contiguous slice of a source document.
///
/// Offsets are character positions into the source text, so
/// `end_offset - start_offset` equals the segment's character count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    /// Zero-based position among the segments of the same source.
    pub sequence_index: usize,
}

impl Segment {
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.end_offset - self.start_offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn char_len_matches_offsets() {
        let segment = Segment {
            text: "hello".into(),
            start_offset: 10,
            end_offset: 15,
            sequence_index: 0,
        };
        assert_eq!(segment.char_len(), 5);
        assert_eq!(segment.char_len(), segment.text.chars().count());
    }

    #[test]
    fn segment_roundtrips_through_json() {
        let segment = Segment {
            text: "본문 텍스트".into(),
            start_offset: 3,
            end_offset: 9,
            sequence_index: 2,
        };
        let json = serde_json::to_string(&segment).unwrap();
        let back: Segment = serde_json::from_str(&json).unwrap();
        assert_eq!(back, segment);
    }
}
