//! Source files and position decoding.
//!
//! Every token and AST node carries a byte offset into its source file;
//! offsets decode lazily into (file, line, column) for error reporting.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One source file, with precomputed line offsets.
#[derive(Debug)]
pub struct SourceFile {
    /// Display name (as written in the include directive or CLI).
    name: String,
    /// Canonical absolute path; used for include de-duplication.
    abs: PathBuf,
    src: String,
    /// Byte offset of the first character of each line.
    line_offsets: Vec<usize>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, abs: PathBuf, src: String) -> Arc<Self> {
        let mut line_offsets = vec![0];
        line_offsets.extend(src.match_indices('\n').map(|(i, _)| i + 1));
        Arc::new(Self {
            name: name.into(),
            abs,
            src,
            line_offsets,
        })
    }

    /// Read a file from disk. The display name keeps the path the caller
    /// used; the canonical path backs de-duplication.
    pub fn read(path: &Path) -> io::Result<Arc<Self>> {
        let src = fs::read_to_string(path)?;
        let abs = path.canonicalize()?;
        Ok(Self::new(path.display().to_string(), abs, src))
    }

    /// An in-memory file, for tests and `parse_source`.
    pub fn synthetic(name: impl Into<String>, src: impl Into<String>) -> Arc<Self> {
        let name = name.into();
        Self::new(name.clone(), PathBuf::from(name), src.into())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn abs(&self) -> &Path {
        &self.abs
    }

    /// Directory containing this file; include paths resolve relative to it.
    pub fn dir(&self) -> &Path {
        self.abs.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    /// Decode a byte offset into a 1-based (line, column) pair.
    pub fn position(self: &Arc<Self>, offset: usize) -> Position {
        let line = self.line_offsets.partition_point(|&start| start <= offset);
        let line_start = self.line_offsets[line - 1];
        let column = self.src[line_start..offset.min(self.src.len())]
            .chars()
            .count()
            + 1;
        Position {
            file: Arc::from(self.name.as_str()),
            line: line as u32,
            column: column as u32,
        }
    }
}

/// A decoded source position, rendered as `file:line:column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub file: Arc<str>,
    pub line: u32,
    pub column: u32,
}

impl Position {
    /// Placeholder for errors raised outside any source context.
    pub fn none() -> Self {
        Position {
            file: Arc::from(""),
            line: 0,
            column: 0,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// The set of files reached from the main Cookfile through includes.
#[derive(Debug, Default)]
pub struct SourceSet {
    files: Vec<Arc<SourceFile>>,
}

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a file with the given canonical path is already registered.
    pub fn contains(&self, abs: &Path) -> bool {
        self.files.iter().any(|f| f.abs() == abs)
    }

    pub fn add(&mut self, file: Arc<SourceFile>) {
        self.files.push(file);
    }

    pub fn files(&self) -> &[Arc<SourceFile>] {
        &self.files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_decodes_lines_and_columns() {
        let f = SourceFile::synthetic("t.cook", "ab\ncd\n\nxyz");
        assert_eq!(f.position(0).line, 1);
        assert_eq!(f.position(0).column, 1);
        assert_eq!(f.position(1).column, 2);
        let p = f.position(4); // 'd'
        assert_eq!((p.line, p.column), (2, 2));
        let p = f.position(7); // 'x'
        assert_eq!((p.line, p.column), (4, 1));
    }

    #[test]
    fn position_renders_file_line_column() {
        let f = SourceFile::synthetic("a.cook", "x = 1\n");
        assert_eq!(f.position(4).to_string(), "a.cook:1:5");
    }
}
