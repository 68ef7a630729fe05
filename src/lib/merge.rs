//! Merging a source env document into a target env document.
//!
//! # Merge Logic
//!
//! The merge:
//! 1. Takes the target's lines as the base
//! 2. For every key present in both documents, rewrites the target's assignment in
//!    place with the source's value, quoting and export prefix
//! 3. Leaves target-only keys, comments, blank lines and malformed lines untouched
//! 4. With `squash`, appends source-only keys at the end in source order
//!
//! The source always wins for shared keys. A shared key whose assignment already
//! matches the source is left byte-for-byte as it was, so merging the output
//! again with the same source reports no changes.
//!
//! # Examples
//!
//! ```rust
//! use envyeet::{merge::merge, parse::parse};
//!
//! let source = parse("DEBUG=false\nNEW=1\n");
//! let target = parse("# prod\nDEBUG=true\nAPI_KEY=secret\n");
//!
//! let result = merge(&source, &target, false);
//! assert_eq!(result.to_string(), "# prod\nDEBUG=false\nAPI_KEY=secret\n");
//! assert_eq!(result.updated, vec!["DEBUG"]);
//! assert!(result.added.is_empty());
//! ```

use std::{collections::HashSet, fmt};

#[cfg(feature = "tracing")]
use tracing::{debug, trace};

use crate::{
  format::Newlines,
  parse::{EnvDocument, Line},
};

/// Which input a warning came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
  Source,
  Target,
}

impl fmt::Display for Origin {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Origin::Source => f.write_str("source"),
      Origin::Target => f.write_str("target"),
    }
  }
}

/// A line that could not be classified, kept in the output as is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedLine {
  pub origin: Origin,
  /// One-based line number in the originating file.
  pub line_number: usize,
  pub text: String,
}

/// Output of [`merge`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergeResult<'a> {
  pub lines: Vec<Line<'a>>,
  /// Shared keys whose assignment was rewritten, in target order.
  pub updated: Vec<String>,
  /// Source-only keys appended by squash, in source order.
  pub added: Vec<String>,
  pub warnings: Vec<MalformedLine>,
  pub newlines: Newlines,
}

impl<'a> MergeResult<'a> {
  pub fn malformed_count(&self, origin: Origin) -> usize {
    self
      .warnings
      .iter()
      .filter(|warning| warning.origin == origin)
      .count()
  }

  pub fn has_changes(&self) -> bool {
    !self.updated.is_empty() || !self.added.is_empty()
  }

  /// Re-indexes the merged lines as a document, e.g. to merge into it again.
  pub fn into_document(self) -> EnvDocument<'a> {
    EnvDocument::build(self.lines, self.newlines)
  }
}

/// Merges `source` into `target`.
///
/// Neither document is modified; the result owns a copy of the target's lines.
pub fn merge<'a>(source: &EnvDocument<'a>, target: &EnvDocument<'a>, squash: bool) -> MergeResult<'a> {
  #[cfg(feature = "tracing")]
  debug!(
    source_keys = source.len(),
    target_keys = target.len(),
    squash,
    "Starting merge"
  );

  let mut lines = target.lines().to_vec();
  let mut updated = Vec::new();

  for (position, line) in target.lines().iter().enumerate() {
    let Some(current) = line.as_assignment() else {
      continue;
    };

    // Superseded duplicates stay as they are
    if target.position(current.key()) != Some(position) {
      continue;
    }

    let Some(incoming) = source.get(current.key()) else {
      #[cfg(feature = "tracing")]
      trace!("Keeping target-only key: {}", current.key());
      continue;
    };

    if current.same_binding(incoming) {
      #[cfg(feature = "tracing")]
      trace!("Key already up to date: {}", current.key());
      continue;
    }

    #[cfg(feature = "tracing")]
    trace!(
      "Updating {}: {:?} -> {:?}",
      current.key(),
      current.value(),
      incoming.value()
    );

    lines[position] = Line::Assignment(current.rebind(incoming));
    updated.push(current.key().to_string());
  }

  let mut added = Vec::new();

  if squash {
    let mut seen = HashSet::new();
    for line in source.lines() {
      let Some(assignment) = line.as_assignment() else {
        continue;
      };
      let key = assignment.key();
      if target.contains_key(key) || !seen.insert(key) {
        continue;
      }
      // Last assignment of the key carries the value
      if let Some(winner) = source.get(key) {
        #[cfg(feature = "tracing")]
        trace!("Adding source-only key: {}", key);

        lines.push(Line::Assignment(winner.detached()));
        added.push(key.to_string());
      }
    }
  }

  let warnings = malformed_lines(source, Origin::Source)
    .chain(malformed_lines(target, Origin::Target))
    .collect();

  let newlines = if target.is_empty() {
    source.newlines().defaults_only()
  } else {
    target.newlines().clone()
  };

  #[cfg(feature = "tracing")]
  debug!(
    updated = updated.len(),
    added = added.len(),
    "Merge finished"
  );

  MergeResult {
    lines,
    updated,
    added,
    warnings,
    newlines,
  }
}

fn malformed_lines<'d>(
  document: &'d EnvDocument<'_>,
  origin: Origin,
) -> impl Iterator<Item = MalformedLine> + 'd {
  document
    .malformed_lines()
    .map(move |(line_number, text)| MalformedLine {
      origin,
      line_number,
      text: text.to_string(),
    })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::parse::{QuoteStyle, parse};

  const STAGING: &str = "# Staging database config
DATABASE_URL=\"postgresql://staging-db:5432/app\"
REDIS_HOST=\"staging-redis\"
DEBUG=false

# Staging-only key (won't be added)
STAGING_FEATURE_ENABLED=true
";

  const PRODUCTION: &str = "# Production database config
DATABASE_URL=\"postgresql://prod-db:5432/app\"
API_KEY=\"prod-key-123\"
REDIS_HOST=\"prod-redis\"
DEBUG=true
";

  fn keys(document: &EnvDocument<'_>) -> HashSet<String> {
    document.keys().map(str::to_string).collect()
  }

  #[test]
  fn test_merge_without_squash() {
    let source = parse(STAGING);
    let target = parse(PRODUCTION);

    let result = merge(&source, &target, false);

    assert_eq!(
      result.to_string(),
      "# Production database config
DATABASE_URL=\"postgresql://staging-db:5432/app\"
API_KEY=\"prod-key-123\"
REDIS_HOST=\"staging-redis\"
DEBUG=false
"
    );
    assert_eq!(result.updated, vec!["DATABASE_URL", "REDIS_HOST", "DEBUG"]);
    assert!(result.added.is_empty());
    assert!(result.warnings.is_empty());
  }

  #[test]
  fn test_merge_with_squash() {
    let source = parse(STAGING);
    let target = parse(PRODUCTION);

    let result = merge(&source, &target, true);

    assert_eq!(result.updated, vec!["DATABASE_URL", "REDIS_HOST", "DEBUG"]);
    assert_eq!(result.added, vec!["STAGING_FEATURE_ENABLED"]);
    assert_eq!(
      result.lines.last().unwrap().raw(),
      "STAGING_FEATURE_ENABLED=true"
    );

    let merged = result.into_document();
    let added = merged.get("STAGING_FEATURE_ENABLED").unwrap();
    assert_eq!(added.value(), "true");
    assert_eq!(added.quote(), QuoteStyle::None);
  }

  #[test]
  fn test_source_quoting_and_export_win() {
    let source = parse("export DATABASE_URL='postgresql://localhost:5432/app'\nexport DEBUG=false\n");
    let target = parse(
      "export DATABASE_URL=\"postgresql://remote:5432/app\"\nexport DEBUG=\"true\"\nexport API_KEY=\"secret\"\n",
    );

    let result = merge(&source, &target, false);

    assert_eq!(
      result.to_string(),
      "export DATABASE_URL='postgresql://localhost:5432/app'\nexport DEBUG=false\nexport API_KEY=\"secret\"\n"
    );
  }

  #[test]
  fn test_source_export_flag_wins() {
    let source = parse("export KEY1=value1\nKEY2=value2\n");
    let target = parse("KEY1=old\nexport KEY2=old\n");

    let result = merge(&source, &target, false);

    assert_eq!(result.to_string(), "export KEY1=value1\nKEY2=value2\n");
  }

  #[test]
  fn test_preserves_layout() {
    let source = parse("KEY3=value3\nKEY1=value1\nKEY2=value2\n");
    let target = parse("KEY1=old1\n# Comment between keys\n\n  KEY2=old2\nKEY3=old3\n");

    let result = merge(&source, &target, false);

    assert_eq!(
      result.to_string(),
      "KEY1=value1\n# Comment between keys\n\nKEY2=value2\nKEY3=value3\n"
    );
  }

  #[test]
  fn test_unchanged_key_keeps_original_text() {
    let source = parse("KEY=value\n");
    let target = parse("   KEY=value\n");

    let result = merge(&source, &target, false);

    assert!(result.updated.is_empty());
    assert_eq!(result.to_string(), "   KEY=value\n");
  }

  #[test]
  fn test_duplicate_keys() {
    let source = parse("KEY=value1\nKEY=value2\n");
    let target = parse("KEY=old\nOTHER=1\nKEY=older\n");

    let result = merge(&source, &target, false);

    // Only the authoritative target line is rewritten
    assert_eq!(result.to_string(), "KEY=old\nOTHER=1\nKEY=value2\n");
    assert_eq!(result.updated, vec!["KEY"]);
  }

  #[test]
  fn test_squash_adds_in_source_order_with_last_value() {
    let source = parse("B=1\nA=\"x\"\nB=2\n");
    let target = parse("C=3\n");

    let result = merge(&source, &target, true);

    assert_eq!(result.added, vec!["B", "A"]);
    assert_eq!(result.to_string(), "C=3\nB=2\nA=\"x\"\n");
  }

  #[test]
  fn test_key_sets() {
    let source = parse(STAGING);
    let target = parse(PRODUCTION);

    let plain = merge(&source, &target, false).into_document();
    assert_eq!(keys(&plain), keys(&target));

    let squashed = merge(&source, &target, true).into_document();
    let expected: HashSet<String> = keys(&target).union(&keys(&source)).cloned().collect();
    assert_eq!(keys(&squashed), expected);
  }

  #[test]
  fn test_source_wins_and_positions_hold() {
    let source = parse(STAGING);
    let target = parse(PRODUCTION);

    let merged = merge(&source, &target, true).into_document();

    for key in target.keys() {
      assert_eq!(merged.position(key), target.position(key), "position of {key}");
      if let Some(expected) = source.get(key) {
        let actual = merged.get(key).unwrap();
        assert_eq!(actual.value(), expected.value());
        assert_eq!(actual.quote(), expected.quote());
      }
    }
  }

  #[test]
  fn test_idempotent() {
    let source = parse(STAGING);
    let target = parse(PRODUCTION);

    for squash in [false, true] {
      let first = merge(&source, &target, squash);
      let rendered = first.to_string();
      let second = merge(&source, &first.into_document(), squash);

      assert!(second.updated.is_empty());
      assert!(second.added.is_empty());
      assert!(!second.has_changes());
      assert_eq!(second.to_string(), rendered);
    }
  }

  #[test]
  fn test_malformed_lines_are_reported_and_kept() {
    let source = parse("not valid\nKEY=new\n");
    let target = parse("KEY=old\n???\nALSO BAD\n");

    let result = merge(&source, &target, false);

    assert_eq!(result.to_string(), "KEY=new\n???\nALSO BAD\n");
    assert_eq!(result.malformed_count(Origin::Source), 1);
    assert_eq!(result.malformed_count(Origin::Target), 2);
    assert_eq!(
      result.warnings[0],
      MalformedLine {
        origin: Origin::Source,
        line_number: 1,
        text: "not valid".to_string(),
      }
    );
    assert_eq!(result.warnings[2].line_number, 3);
  }

  #[test]
  fn test_keeps_each_line_ending() {
    let source = parse("A=new\n");
    let target = parse("A=old\nB=keep\r\n");

    let result = merge(&source, &target, false);
    assert_eq!(result.to_string(), "A=new\nB=keep\r\n");

    let source = parse("A=new\nC=added\n");
    let result = merge(&source, &target, true);
    assert_eq!(result.to_string(), "A=new\nB=keep\r\nC=added\r\n");
  }

  #[test]
  fn test_empty_inputs() {
    let target = parse("KEY=value\n");
    let result = merge(&parse(""), &target, true);
    assert_eq!(result.to_string(), "KEY=value\n");
    assert!(!result.has_changes());

    let source = parse("A=1\nB='2'\n");
    let result = merge(&source, &parse(""), true);
    assert!(result.updated.is_empty());
    assert_eq!(result.added, vec!["A", "B"]);
    assert_eq!(result.to_string(), "A=1\nB='2'\n");

    let result = merge(&source, &parse(""), false);
    assert_eq!(result.to_string(), "");
  }

  #[test]
  fn test_target_not_mutated() {
    let source = parse("KEY=new\n");
    let target = parse("KEY=old\n");
    let before = target.clone();

    let _ = merge(&source, &target, true);

    assert_eq!(target, before);
  }
}
