//! Rendering lines back to env file text.

use std::fmt;

use crate::{
  merge::MergeResult,
  parse::{Assignment, EnvDocument, Line},
};

const ASSIGNMENT_OPERATOR: &str = "=";
const EXPORT_PREFIX: &str = "export ";

/// Terminator that ended one physical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineEnding {
  /// Last line of a file without a final newline.
  #[default]
  None,
  Lf,
  CrLf,
}

impl LineEnding {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::None => "",
      Self::Lf => "\n",
      Self::CrLf => "\r\n",
    }
  }
}

/// Splits text into lines, each paired with the terminator that ended it.
pub fn split_lines(text: &str) -> impl Iterator<Item = (&str, LineEnding)> {
  text.split_inclusive('\n').map(|chunk| {
    if let Some(line) = chunk.strip_suffix("\r\n") {
      (line, LineEnding::CrLf)
    } else if let Some(line) = chunk.strip_suffix('\n') {
      (line, LineEnding::Lf)
    } else {
      (chunk, LineEnding::None)
    }
  })
}

/// Line terminators observed in an input file.
///
/// Lines read from the file keep their own terminator. Lines past the end of
/// the recorded endings, e.g. appended by a merge, use the file's default.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Newlines {
  endings: Vec<LineEnding>,
  /// Default terminator is `\r\n` instead of `\n`.
  pub crlf: bool,
  /// The last line is followed by a terminator.
  pub trailing: bool,
}

impl Newlines {
  pub fn detect(text: &str) -> Self {
    Self::from_endings(split_lines(text).map(|(_, ending)| ending).collect())
  }

  /// The default follows the last terminator seen.
  pub fn from_endings(endings: Vec<LineEnding>) -> Self {
    let crlf = endings
      .iter()
      .rev()
      .find(|ending| **ending != LineEnding::None)
      .is_some_and(|ending| *ending == LineEnding::CrLf);
    let trailing = endings.last().is_some_and(|ending| *ending != LineEnding::None);
    Self {
      endings,
      crlf,
      trailing,
    }
  }

  /// Same defaults without any per-line endings.
  pub fn defaults_only(&self) -> Self {
    Self {
      endings: Vec::new(),
      ..self.clone()
    }
  }

  /// Recorded terminator of the line at `position`, if it was read from a file.
  pub fn ending(&self, position: usize) -> Option<LineEnding> {
    self.endings.get(position).copied()
  }

  pub fn terminator(&self) -> &'static str {
    if self.crlf { "\r\n" } else { "\n" }
  }
}

/// Renders lines as env file text.
///
/// Comments, blanks, malformed lines and unmodified assignments come out exactly
/// as read, with their original terminators. Rewritten assignments are rebuilt
/// from their key, value, quoting and export flag.
pub fn serialize(lines: &[Line<'_>], newlines: &Newlines) -> String {
  let mut out = String::new();
  let last = lines.len().saturating_sub(1);
  for (position, line) in lines.iter().enumerate() {
    out.push_str(&line.raw());
    let terminator = match newlines.ending(position) {
      Some(LineEnding::None) | None if position < last => newlines.terminator(),
      Some(LineEnding::None) => "",
      Some(ending) => ending.as_str(),
      None if newlines.trailing => newlines.terminator(),
      None => "",
    };
    out.push_str(terminator);
  }
  out
}

impl<'a> fmt::Display for Assignment<'a> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if let Some(raw) = &self.raw {
      return f.write_str(raw);
    }
    if self.export {
      f.write_str(EXPORT_PREFIX)?;
    }
    let quote = self.quote.as_str();
    write!(
      f,
      "{}{}{}{}{}",
      self.key, ASSIGNMENT_OPERATOR, quote, self.value, quote
    )
  }
}

impl<'a> fmt::Display for Line<'a> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Line::Comment(text) | Line::Blank(text) | Line::Malformed(text) => f.write_str(text),
      Line::Assignment(assignment) => write!(f, "{}", assignment),
    }
  }
}

impl<'a> fmt::Display for EnvDocument<'a> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&serialize(self.lines(), self.newlines()))
  }
}

impl<'a> fmt::Display for MergeResult<'a> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&serialize(&self.lines, &self.newlines))
  }
}
