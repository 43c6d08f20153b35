//! Location parsing for CLI commands
//!
//! Locations are written `file:line[:column]`, both numbers 1-indexed. The
//! column counts bytes within the line.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use crate::models::text::{LineIndex, Position};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedLocation {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

const EXAMPLE: &str = "Example: src/main.ml:10:5";

impl ParsedLocation {
    /// Parse location string and convert to absolute path in one step
    pub fn parse_absolute(input: &str) -> Result<Self> {
        Self::parse(input)?.to_absolute()
    }

    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            bail!("Location cannot be empty");
        }

        // Numbers are taken from the right so drive letters and colons in
        // directory names stay in the path
        let mut parts = input.rsplitn(3, ':');
        let last = parts.next().unwrap_or_default();
        let middle = parts.next();
        let rest = parts.next();

        let (file, line, column): (String, &str, Option<&str>) = match (rest, middle) {
            (Some(file), Some(line)) if is_number_like(line) => {
                (file.to_string(), line, Some(last))
            }
            (Some(head), Some(tail)) => (format!("{head}:{tail}"), last, None),
            (None, Some(file)) => (file.to_string(), last, None),
            _ => bail!("Invalid location format. Expected: file:line[:column]\n{EXAMPLE}"),
        };

        if file.is_empty() {
            bail!("Location is missing a file path\n{EXAMPLE}");
        }
        let line = parse_number("line", line)?;
        let column = column.map(|c| parse_number("column", c)).transpose()?.unwrap_or(1);

        Ok(Self {
            file: PathBuf::from(file),
            line,
            column,
        })
    }

    /// Resolve against the working directory and canonicalize
    pub fn to_absolute(&self) -> Result<Self> {
        let file = if self.file.is_absolute() {
            self.file.clone()
        } else {
            std::env::current_dir()
                .context("Failed to get current directory")?
                .join(&self.file)
        };
        let file = file
            .canonicalize()
            .map_err(|_| anyhow::anyhow!("File not found: {}", file.display()))?;

        Ok(Self { file, ..self.clone() })
    }

    /// Byte offset of this location in `text`
    pub fn offset_in(&self, text: &str) -> Result<usize> {
        let index = LineIndex::new(text);
        let position = Position::from_cli(self.line, self.column);

        let Some(line_span) = index.line_span(position.line) else {
            bail!(
                "Line {} exceeds file length ({} lines)",
                self.line,
                index.line_count()
            );
        };
        match index.offset_of(position) {
            Some(offset) if text.is_char_boundary(offset) => Ok(offset),
            Some(_) => bail!(
                "Column {} at line {} falls inside a multi-byte character",
                self.column,
                self.line
            ),
            None => bail!(
                "Column {} exceeds line length ({} bytes) at line {}",
                self.column,
                line_span.length,
                self.line
            ),
        }
    }
}

fn is_number_like(s: &str) -> bool {
    !s.is_empty() && s.trim_start_matches('-').chars().all(|c| c.is_ascii_digit())
}

fn parse_number(what: &str, s: &str) -> Result<u32> {
    if s.starts_with('-') {
        bail!("Invalid {what} number '{s}': negative values not allowed\n{EXAMPLE}");
    }
    let value: u32 = s
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid {what} number '{s}': must be a positive integer"))?;
    if value == 0 {
        bail!("{what} must be >= 1 (got 0), locations are 1-indexed");
    }
    Ok(value)
}

impl std::fmt::Display for ParsedLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}
