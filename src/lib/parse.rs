//! Line classification and env document construction.
//!
//! Every physical line of an env file becomes a [`Line`]. Nothing is dropped or
//! normalized here: comments, blank lines and even lines that cannot be parsed
//! keep their exact text, so a parsed [`EnvDocument`] renders back to its input.

use std::{borrow::Cow, collections::HashMap, sync::LazyLock};

use regex_lite::Regex;

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

use crate::format::{Newlines, split_lines};

const COMMENT_PREFIX: &str = "#";

static ASSIGNMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"^\s*(export\s+)?([A-Za-z_][A-Za-z0-9_]*)=(.*)$")
    .expect("assignment pattern is a valid regex")
});

/// Quoting applied around an assignment value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteStyle {
  #[default]
  None,
  Single,
  Double,
}

impl QuoteStyle {
  /// The quote character as written in the file, empty for [`QuoteStyle::None`].
  pub fn as_str(self) -> &'static str {
    match self {
      Self::None => "",
      Self::Single => "'",
      Self::Double => "\"",
    }
  }

  /// Splits a raw value into its quote style and inner text.
  ///
  /// Only a value that starts and ends with the same quote character counts as
  /// quoted. No unescaping is done.
  fn detect(raw: &str) -> (Self, &str) {
    if raw.len() >= 2 {
      for style in [Self::Single, Self::Double] {
        let quote = style.as_str();
        if let Some(inner) = raw.strip_prefix(quote).and_then(|rest| rest.strip_suffix(quote)) {
          return (style, inner);
        }
      }
    }
    (Self::None, raw)
  }
}

/// A single `KEY=VALUE` or `export KEY=VALUE` line.
///
/// Assignments parsed from a file remember their original text and render it
/// unchanged. Assignments built with [`Assignment::new`] are rendered from their
/// fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment<'a> {
  pub(crate) key: Cow<'a, str>,
  pub(crate) value: Cow<'a, str>,
  pub(crate) quote: QuoteStyle,
  pub(crate) export: bool,
  pub(crate) line_index: Option<usize>,
  pub(crate) raw: Option<Cow<'a, str>>,
}

impl<'a> Assignment<'a> {
  pub fn new(
    key: impl Into<Cow<'a, str>>,
    value: impl Into<Cow<'a, str>>,
    quote: QuoteStyle,
    export: bool,
  ) -> Self {
    Self {
      key: key.into(),
      value: value.into(),
      quote,
      export,
      line_index: None,
      raw: None,
    }
  }

  fn parse(line: &'a str) -> Option<Self> {
    let captures = ASSIGNMENT_PATTERN.captures(line)?;
    let export = captures.get(1).is_some();
    let key = captures.get(2)?.as_str();
    let (quote, value) = QuoteStyle::detect(captures.get(3)?.as_str());

    #[cfg(feature = "tracing")]
    trace!(key, ?quote, export, "Parsed assignment");

    Some(Self {
      key: Cow::Borrowed(key),
      value: Cow::Borrowed(value),
      quote,
      export,
      line_index: None,
      raw: Some(Cow::Borrowed(line)),
    })
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  /// The logical value, without surrounding quotes.
  pub fn value(&self) -> &str {
    &self.value
  }

  pub fn quote(&self) -> QuoteStyle {
    self.quote
  }

  pub fn is_export(&self) -> bool {
    self.export
  }

  /// Zero-based position of this line in the document it was built into.
  pub fn line_index(&self) -> Option<usize> {
    self.line_index
  }

  /// Whether this assignment still renders as its original text.
  pub fn is_verbatim(&self) -> bool {
    self.raw.is_some()
  }

  /// Whether both assignments would write the same value the same way.
  pub fn same_binding(&self, other: &Assignment<'_>) -> bool {
    self.value == other.value && self.quote == other.quote && self.export == other.export
  }

  /// Takes over value, quoting and export prefix from `other`, keeping this
  /// key and position.
  pub(crate) fn rebind(&self, other: &Assignment<'a>) -> Self {
    Self {
      key: self.key.clone(),
      value: other.value.clone(),
      quote: other.quote,
      export: other.export,
      line_index: self.line_index,
      raw: None,
    }
  }

  /// A copy that is rendered from its fields and belongs to no document yet.
  pub(crate) fn detached(&self) -> Self {
    Self {
      line_index: None,
      raw: None,
      ..self.clone()
    }
  }
}

/// One physical line of an env file, newline excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line<'a> {
  Comment(Cow<'a, str>),
  Blank(Cow<'a, str>),
  Assignment(Assignment<'a>),
  Malformed(Cow<'a, str>),
}

impl<'a> From<&'a str> for Line<'a> {
  fn from(s: &'a str) -> Self {
    let trimmed = s.trim();

    if trimmed.is_empty() {
      Line::Blank(Cow::Borrowed(s))
    } else if trimmed.starts_with(COMMENT_PREFIX) {
      Line::Comment(Cow::Borrowed(s))
    } else if let Some(assignment) = Assignment::parse(s) {
      Line::Assignment(assignment)
    } else {
      #[cfg(feature = "tracing")]
      trace!("Malformed line: {:?}", s);

      Line::Malformed(Cow::Borrowed(s))
    }
  }
}

impl<'a> Line<'a> {
  /// The text this line renders as.
  pub fn raw(&self) -> Cow<'_, str> {
    match self {
      Line::Comment(text) | Line::Blank(text) | Line::Malformed(text) => {
        Cow::Borrowed(text.as_ref())
      }
      Line::Assignment(assignment) => match &assignment.raw {
        Some(raw) => Cow::Borrowed(raw.as_ref()),
        None => Cow::Owned(assignment.to_string()),
      },
    }
  }

  pub fn as_assignment(&self) -> Option<&Assignment<'a>> {
    match self {
      Line::Assignment(assignment) => Some(assignment),
      _ => None,
    }
  }

  pub fn is_malformed(&self) -> bool {
    matches!(self, Line::Malformed(_))
  }
}

/// Classifies a single line. Never fails: anything unrecognized is
/// [`Line::Malformed`].
pub fn classify(line: &str) -> Line<'_> {
  Line::from(line)
}

/// Parses a whole env file.
pub fn parse(text: &str) -> EnvDocument<'_> {
  EnvDocument::from(text)
}

/// An env file as an ordered list of lines plus a key index.
///
/// When a key is assigned more than once, the index points at the last
/// assignment. Earlier ones stay in [`EnvDocument::lines`] untouched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnvDocument<'a> {
  lines: Vec<Line<'a>>,
  key_index: HashMap<Cow<'a, str>, usize>,
  malformed: usize,
  newlines: Newlines,
}

impl<'a> From<&'a str> for EnvDocument<'a> {
  fn from(s: &'a str) -> Self {
    #[cfg(feature = "tracing")]
    debug!("Parsing env file with {} lines", s.lines().count());

    let mut endings = Vec::new();
    let lines: Vec<Line<'a>> = split_lines(s)
      .map(|(line, ending)| {
        endings.push(ending);
        Line::from(line)
      })
      .collect();

    Self::build(lines, Newlines::from_endings(endings))
  }
}

impl<'a> EnvDocument<'a> {
  /// Builds a document from already classified lines in a single forward scan.
  pub fn build(lines: impl IntoIterator<Item = Line<'a>>, newlines: Newlines) -> Self {
    let mut document = Self {
      newlines,
      ..Self::default()
    };

    for (position, mut line) in lines.into_iter().enumerate() {
      match &mut line {
        Line::Assignment(assignment) => {
          assignment.line_index = Some(position);
          document.key_index.insert(assignment.key.clone(), position);
        }
        Line::Malformed(_) => document.malformed += 1,
        Line::Comment(_) | Line::Blank(_) => {}
      }
      document.lines.push(line);
    }

    #[cfg(feature = "tracing")]
    debug!(
      lines = document.lines.len(),
      keys = document.key_index.len(),
      malformed = document.malformed,
      "Built env document"
    );

    document
  }

  pub fn lines(&self) -> &[Line<'a>] {
    &self.lines
  }

  pub fn newlines(&self) -> &Newlines {
    &self.newlines
  }

  /// The authoritative assignment for `key`.
  pub fn get(&self, key: &str) -> Option<&Assignment<'a>> {
    self
      .position(key)
      .and_then(|position| self.lines[position].as_assignment())
  }

  /// Index into [`EnvDocument::lines`] of the authoritative assignment for `key`.
  pub fn position(&self, key: &str) -> Option<usize> {
    self.key_index.get(key).copied()
  }

  pub fn contains_key(&self, key: &str) -> bool {
    self.key_index.contains_key(key)
  }

  /// Distinct keys in the order of their authoritative assignments.
  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self
      .lines
      .iter()
      .enumerate()
      .filter_map(move |(position, line)| {
        let assignment = line.as_assignment()?;
        (self.position(&assignment.key) == Some(position)).then_some(assignment.key())
      })
  }

  /// Number of distinct keys.
  pub fn len(&self) -> usize {
    self.key_index.len()
  }

  /// Whether the document has no lines at all.
  pub fn is_empty(&self) -> bool {
    self.lines.is_empty()
  }

  pub fn malformed_count(&self) -> usize {
    self.malformed
  }

  /// Malformed lines as `(line_number, text)`, line numbers starting at 1.
  pub fn malformed_lines(&self) -> impl Iterator<Item = (usize, &str)> {
    self
      .lines
      .iter()
      .enumerate()
      .filter_map(|(position, line)| match line {
        Line::Malformed(text) => Some((position + 1, &**text)),
        _ => None,
      })
  }
}
