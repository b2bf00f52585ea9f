use std::fmt;

use serde::Serialize;

/// A 1-based (line, column) position in a source file.
///
/// `(0, 0)` is reserved as the "empty" sentinel: the anchor of the outermost
/// layout frame and the position of diagnostics that have no real location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TextLoc {
    pub line: u64,
    pub column: u64,
}

impl TextLoc {
    pub fn new(line: u64, column: u64) -> Self {
        Self { line, column }
    }

    /// The `(0, 0)` sentinel position.
    pub fn empty() -> Self {
        Self { line: 0, column: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.line == 0 && self.column == 0
    }

    /// Advance this position over a chunk of source text, tracking newlines.
    pub fn advance(&mut self, text: &str) {
        for c in text.chars() {
            if c == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }
}

impl fmt::Display for TextLoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open range of source text between two [`TextLoc`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TextRange {
    pub start: TextLoc,
    pub end: TextLoc,
}

impl TextRange {
    pub fn new(start: TextLoc, end: TextLoc) -> Self {
        Self { start, end }
    }

    pub fn empty() -> Self {
        Self {
            start: TextLoc::empty(),
            end: TextLoc::empty(),
        }
    }

    /// The smallest range covering both `self` and `other`.
    pub fn merge(self, other: TextRange) -> TextRange {
        TextRange {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A source file: path, full text, and a precomputed table of line-start
/// byte offsets for position conversion.
///
/// Line/column queries run in O(log n) over the line table; converting a
/// [`TextLoc`] back to a byte offset walks the characters of a single line.
#[derive(Debug)]
pub struct TextFile {
    path: String,
    text: String,
    /// Byte offset of the start of each line. The first entry is always 0.
    line_starts: Vec<usize>,
}

impl TextFile {
    pub fn new(path: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_starts = vec![0usize];
        for (i, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            path: path.into(),
            text,
            line_starts,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// The 1-based line containing the given byte offset.
    pub fn line_of(&self, offset: usize) -> u64 {
        let idx = self.line_starts.partition_point(|&start| start <= offset);
        idx.max(1) as u64
    }

    /// The 1-based column of the given byte offset, counted in characters
    /// from the start of its line.
    pub fn column_of(&self, offset: usize) -> u64 {
        let line = self.line_of(offset);
        let line_start = self.start_offset_of_line(line);
        self.text[line_start..offset].chars().count() as u64 + 1
    }

    /// Byte offset at which the given 1-based line starts.
    pub fn start_offset_of_line(&self, line: u64) -> usize {
        self.line_starts[(line as usize).saturating_sub(1)]
    }

    /// Byte offset one past the last character of the given 1-based line
    /// (excluding the newline).
    pub fn end_offset_of_line(&self, line: u64) -> usize {
        match self.line_starts.get(line as usize) {
            Some(&next_start) => next_start.saturating_sub(1),
            None => self.text.len(),
        }
    }

    /// Convert a [`TextLoc`] to a byte offset into the file's text.
    ///
    /// The sentinel `(0, 0)` maps to offset 0. Positions past the end of
    /// their line clamp to the line end.
    pub fn offset_of(&self, loc: TextLoc) -> usize {
        if loc.is_empty() {
            return 0;
        }
        let line = loc.line.min(self.line_count() as u64);
        let start = self.start_offset_of_line(line);
        let end = self.end_offset_of_line(line);
        let mut offset = start;
        let mut column = 1;
        for c in self.text[start..end].chars() {
            if column >= loc.column {
                break;
            }
            offset += c.len_utf8();
            column += 1;
        }
        offset.min(end)
    }

    /// Convert a [`TextRange`] to a byte range into the file's text.
    pub fn byte_range(&self, range: TextRange) -> std::ops::Range<usize> {
        let start = self.offset_of(range.start);
        let end = self.offset_of(range.end).max(start);
        start..end
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loc_advance_tracks_newlines() {
        let mut loc = TextLoc::new(1, 1);
        loc.advance("ab");
        assert_eq!(loc, TextLoc::new(1, 3));
        loc.advance("c\nd");
        assert_eq!(loc, TextLoc::new(2, 2));
    }

    #[test]
    fn line_and_column_of_offset() {
        let file = TextFile::new("test.bolt", "hello\nworld\nfoo");
        assert_eq!(file.line_of(0), 1);
        assert_eq!(file.column_of(0), 1);
        assert_eq!(file.line_of(6), 2);
        assert_eq!(file.column_of(6), 1);
        assert_eq!(file.line_of(13), 3);
        assert_eq!(file.column_of(13), 2);
    }

    #[test]
    fn line_offsets_round_trip() {
        let file = TextFile::new("test.bolt", "ab\ncde\nf");
        assert_eq!(file.start_offset_of_line(2), 3);
        assert_eq!(file.end_offset_of_line(2), 6);
        assert_eq!(file.end_offset_of_line(3), 8);
        assert_eq!(file.offset_of(TextLoc::new(2, 2)), 4);
        assert_eq!(file.line_of(4), 2);
        assert_eq!(file.column_of(4), 2);
    }

    #[test]
    fn offset_of_sentinel_is_zero() {
        let file = TextFile::new("test.bolt", "abc");
        assert_eq!(file.offset_of(TextLoc::empty()), 0);
    }

    #[test]
    fn range_merge_covers_both() {
        let a = TextRange::new(TextLoc::new(1, 2), TextLoc::new(1, 5));
        let b = TextRange::new(TextLoc::new(1, 4), TextLoc::new(2, 1));
        let merged = a.merge(b);
        assert_eq!(merged.start, TextLoc::new(1, 2));
        assert_eq!(merged.end, TextLoc::new(2, 1));
    }
}
