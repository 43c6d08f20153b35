//! Text positions, spans and line indexing
//!
//! Offsets are byte offsets into UTF-8 text. Lines and columns are 0-indexed;
//! columns count bytes from the start of the line.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Position within a document (0-indexed)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Convert 1-indexed CLI input to a 0-indexed position
    pub fn from_cli(line: u32, column: u32) -> Self {
        Self {
            line: line.saturating_sub(1),
            column: column.saturating_sub(1),
        }
    }

    /// Convert to a 1-indexed display position
    pub fn to_display(&self) -> (u32, u32) {
        (self.line + 1, self.column + 1)
    }
}

/// Range within a document, end exclusive
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    /// Single-line range
    pub fn on_line(line: u32, start_column: u32, end_column: u32) -> Self {
        Self {
            start: Position::new(line, start_column),
            end: Position::new(line, end_column),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Half-open byte span `[start, start + length)`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct TextSpan {
    pub start: usize,
    pub length: usize,
}

impl TextSpan {
    pub fn new(start: usize, length: usize) -> Self {
        Self { start, length }
    }

    pub fn from_bounds(start: usize, end: usize) -> Self {
        Self {
            start,
            length: end.saturating_sub(start),
        }
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn contains(&self, offset: usize) -> bool {
        offset >= self.start && offset < self.end()
    }

    pub fn overlaps(&self, other: &TextSpan) -> bool {
        self.start < other.end() && other.start < self.end()
    }

    /// Slice `text` by this span, `None` when out of bounds or off a char boundary
    pub fn slice<'a>(&self, text: &'a str) -> Option<&'a str> {
        text.get(self.start..self.end())
    }
}

/// A range inside a specific source file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceRange {
    pub file: PathBuf,
    pub range: Range,
}

impl SourceRange {
    pub fn new(file: impl Into<PathBuf>, range: Range) -> Self {
        Self {
            file: file.into(),
            range,
        }
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    pub fn start(&self) -> Position {
        self.range.start
    }

    pub fn end(&self) -> Position {
        self.range.end
    }
}

/// Line boundaries of a text for offset/position conversion
///
/// Each line's content excludes its terminator (`\n` or `\r\n`).
#[derive(Debug, Clone, Default)]
pub struct LineIndex {
    lines: Vec<TextSpan>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut lines = Vec::new();
        let mut start = 0;
        for raw in text.split('\n') {
            let content = raw.strip_suffix('\r').unwrap_or(raw);
            lines.push(TextSpan::new(start, content.len()));
            start += raw.len() + 1;
        }
        Self {
            lines,
            len: text.len(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Content span of a 0-indexed line
    pub fn line_span(&self, line: u32) -> Option<TextSpan> {
        self.lines.get(line as usize).copied()
    }

    /// 0-indexed line containing `offset`
    ///
    /// An offset on a line terminator belongs to the line it terminates.
    pub fn line_of(&self, offset: usize) -> Option<u32> {
        if offset > self.len {
            return None;
        }
        let idx = self
            .lines
            .partition_point(|span| span.start <= offset)
            .saturating_sub(1);
        Some(idx as u32)
    }

    pub fn position_of(&self, offset: usize) -> Option<Position> {
        let line = self.line_of(offset)?;
        let span = self.lines[line as usize];
        let column = (offset - span.start).min(span.length);
        Some(Position::new(line, column as u32))
    }

    /// Offset of a position, `None` if the column is past the end of the line
    pub fn offset_of(&self, position: Position) -> Option<usize> {
        let span = self.line_span(position.line)?;
        let column = position.column as usize;
        (column <= span.length).then_some(span.start + column)
    }

    pub fn range_to_span(&self, range: &Range) -> Option<TextSpan> {
        let start = self.offset_of(range.start)?;
        let end = self.offset_of(range.end)?;
        (start <= end).then(|| TextSpan::from_bounds(start, end))
    }

    pub fn span_to_range(&self, span: TextSpan) -> Option<Range> {
        Some(Range::new(
            self.position_of(span.start)?,
            self.position_of(span.end())?,
        ))
    }
}
