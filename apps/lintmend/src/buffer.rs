//! Line-indexed file buffer.
//!
//! Each line keeps its own terminator so a pass that only touches a few
//! lines renders every other byte of the file unchanged (mixed `\n`/`\r\n`
//! files stay mixed). Inserted lines use the file's dominant terminator,
//! which is the first terminator seen, or `\n` for files with none.

use crate::error::FixError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
    Cr,
    /// Unterminated last line.
    None,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::Cr => "\r",
            LineEnding::None => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Line content without its terminator.
    pub text: String,
    pub ending: LineEnding,
}

impl Line {
    pub fn new(text: impl Into<String>, ending: LineEnding) -> Self {
        Self {
            text: text.into(),
            ending,
        }
    }

    pub fn empty(ending: LineEnding) -> Self {
        Self::new(String::new(), ending)
    }

    /// Blank in the pycodestyle sense: nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn render(&self) -> String {
        format!("{}{}", self.text, self.ending.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineBuffer {
    lines: Vec<Line>,
    newline: LineEnding,
}

impl LineBuffer {
    pub fn parse(content: &str) -> Self {
        let bytes = content.as_bytes();
        let mut lines = Vec::new();
        let mut start = 0;
        let mut i = 0;
        // `\n` and `\r` are ASCII, so every slice boundary is a char boundary.
        while i < bytes.len() {
            match bytes[i] {
                b'\n' => {
                    lines.push(Line::new(&content[start..i], LineEnding::Lf));
                    i += 1;
                    start = i;
                }
                b'\r' => {
                    if bytes.get(i + 1) == Some(&b'\n') {
                        lines.push(Line::new(&content[start..i], LineEnding::CrLf));
                        i += 2;
                    } else {
                        lines.push(Line::new(&content[start..i], LineEnding::Cr));
                        i += 1;
                    }
                    start = i;
                }
                _ => i += 1,
            }
        }
        if start < bytes.len() {
            lines.push(Line::new(&content[start..], LineEnding::None));
        }
        let newline = lines
            .iter()
            .map(|l| l.ending)
            .find(|e| *e != LineEnding::None)
            .unwrap_or(LineEnding::Lf);
        Self { lines, newline }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn newline(&self) -> LineEnding {
        self.newline
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    /// Convert a 1-based line number into a vector index.
    pub fn index_of(&self, line: usize) -> Result<usize, FixError> {
        if line == 0 || line > self.lines.len() {
            return Err(FixError::LineOutOfRange {
                line,
                len: self.lines.len(),
            });
        }
        Ok(line - 1)
    }

    pub fn line(&self, index: usize) -> &Line {
        &self.lines[index]
    }

    pub fn line_mut(&mut self, index: usize) -> &mut Line {
        &mut self.lines[index]
    }

    pub fn last_mut(&mut self) -> Option<&mut Line> {
        self.lines.last_mut()
    }

    pub fn insert_empty(&mut self, index: usize, count: usize) {
        let ending = self.newline;
        self.lines
            .splice(index..index, vec![Line::empty(ending); count]);
    }

    /// Replace the line at `index` with `replacement`.
    pub fn splice(&mut self, index: usize, replacement: Vec<Line>) {
        self.lines.splice(index..=index, replacement);
    }

    pub fn remove_range(&mut self, start: usize, end: usize) {
        self.lines.drain(start..end);
    }

    /// Render `count` lines starting at `index`, for outcome reporting.
    pub fn render_range(&self, index: usize, count: usize) -> String {
        self.lines
            .iter()
            .skip(index)
            .take(count)
            .map(Line::render)
            .collect()
    }

    pub fn render(&self) -> String {
        self.lines.iter().map(Line::render).collect()
    }
}
