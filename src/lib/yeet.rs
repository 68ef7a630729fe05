//! Reading, merging and writing env files, and backing them up.
//!
//! # Examples
//!
//! ```rust,no_run
//! use envyeet::yeet::{BackupOptions, EnvYeet};
//! use std::path::PathBuf;
//!
//! let options = BackupOptions {
//!     file: PathBuf::from(".env"),
//!     output: None, // defaults to .env.bkp-<timestamp>
//! };
//!
//! let backup = EnvYeet::backup_with_options(options).unwrap();
//! println!("{}", backup.display());
//! ```

use std::{
  io::{self, BufRead, IsTerminal, Write},
  path::{Path, PathBuf},
};

use chrono::Utc;

#[cfg(feature = "tracing")]
use tracing::{debug, info, warn};

use crate::{
  merge::{MalformedLine, merge},
  parse::EnvDocument,
};

const BACKUP_SUFFIX: &str = ".bkp-";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Entry point for merge and backup operations on env files.
pub struct EnvYeet;

impl EnvYeet {
  /// Merges the source file into the target file and writes the result to the
  /// requested destination.
  ///
  /// Nothing is written on a dry run or when the destination is stdout; the
  /// rendered text is returned in [`MergeReport::output`] either way.
  pub fn merge_with_options(options: MergeOptions) -> Result<MergeReport, EnvYeetError> {
    #[cfg(feature = "tracing")]
    info!("Starting env merge");

    let MergeOptions {
      source_file,
      target_file,
      squash,
      destination,
      dry_run,
      force,
    } = options;

    #[cfg(feature = "tracing")]
    debug!(?source_file, ?target_file, squash, dry_run, "Resolved merge options");

    if !source_file.exists() {
      return Err(EnvYeetError::SourceNotFound(source_file));
    }
    if !target_file.exists() {
      return Err(EnvYeetError::TargetNotFound(target_file));
    }

    let source_str = std::fs::read_to_string(&source_file).map_err(EnvYeetError::SourceIo)?;
    let target_str = std::fs::read_to_string(&target_file).map_err(EnvYeetError::TargetIo)?;

    let source = EnvDocument::from(source_str.as_str());
    let target = EnvDocument::from(target_str.as_str());

    let skipped = if squash {
      Vec::new()
    } else {
      source
        .keys()
        .filter(|key| !target.contains_key(key))
        .map(str::to_string)
        .collect()
    };

    let result = merge(&source, &target, squash);

    #[cfg(feature = "tracing")]
    for warning in &result.warnings {
      warn!(
        origin = %warning.origin,
        line = warning.line_number,
        "Skipping malformed line: {:?}",
        warning.text
      );
    }

    let output = result.to_string();

    let written_to = if dry_run {
      #[cfg(feature = "tracing")]
      debug!("Dry run, nothing written");
      None
    } else {
      match destination {
        Destination::Stdout => None,
        Destination::File(path) => {
          Self::write(&path, &output, force)?;
          Some(path)
        }
        Destination::Overwrite => {
          Self::write(&target_file, &output, force)?;
          Some(target_file)
        }
      }
    };

    #[cfg(feature = "tracing")]
    info!("Merge completed successfully");

    Ok(MergeReport {
      updated: result.updated,
      added: result.added,
      skipped,
      warnings: result.warnings,
      output,
      written_to,
    })
  }

  /// Copies a file to a backup next to it, or to the given output path.
  ///
  /// Refuses to replace an existing backup.
  pub fn backup_with_options(options: BackupOptions) -> Result<PathBuf, EnvYeetError> {
    let BackupOptions { file, output } = options;

    if !file.exists() {
      return Err(EnvYeetError::BackupSourceNotFound(file));
    }

    let backup_path = output.unwrap_or_else(|| Self::backup_path(&file));

    if backup_path.exists() {
      return Err(EnvYeetError::BackupExists(backup_path));
    }

    #[cfg(feature = "tracing")]
    debug!("Backing up {:?} to {:?}", file, backup_path);

    std::fs::copy(&file, &backup_path).map_err(EnvYeetError::Backup)?;

    #[cfg(feature = "tracing")]
    info!("Backup created at {:?}", backup_path);

    Ok(backup_path)
  }

  /// Default backup location: `<file>.bkp-<UTC timestamp>`.
  pub fn backup_path<P: AsRef<Path>>(file: P) -> PathBuf {
    let mut name = file.as_ref().as_os_str().to_owned();
    name.push(BACKUP_SUFFIX);
    name.push(Utc::now().format(BACKUP_TIMESTAMP_FORMAT).to_string());
    PathBuf::from(name)
  }

  /// Writes merged content, asking before replacing an existing file when
  /// attached to a terminal.
  fn write<P: AsRef<Path>>(path: P, content: &str, force: bool) -> Result<(), EnvYeetError> {
    let path = path.as_ref();

    if path.exists() && !force && io::stdout().is_terminal() && !Self::confirm_overwrite(path) {
      return Err(EnvYeetError::Aborted);
    }

    #[cfg(feature = "tracing")]
    debug!("Writing merged content to {:?}", path);

    std::fs::write(path, content).map_err(EnvYeetError::Write)
  }

  /// Writes user-facing output. A reader that went away is not an error.
  pub fn emit<W: Write>(mut writer: W, text: &str) -> Result<(), EnvYeetError> {
    match writer.write_all(text.as_bytes()).and_then(|()| writer.flush()) {
      Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
        #[cfg(feature = "tracing")]
        debug!("Output closed early, stopping");
        Ok(())
      }
      result => result.map_err(EnvYeetError::Write),
    }
  }

  fn confirm_overwrite(path: &Path) -> bool {
    eprint!("Overwrite {}? [y/N]: ", path.display());
    if io::stderr().flush().is_err() {
      return false;
    }

    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
      Ok(_) => is_yes(&answer),
      Err(_) => false,
    }
  }
}

fn is_yes(answer: &str) -> bool {
  matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Where merged output goes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Destination {
  #[default]
  Stdout,
  /// A separate output file.
  File(PathBuf),
  /// Back into the target file.
  Overwrite,
}

/// Configuration options for merging env files.
#[derive(Debug, Clone)]
pub struct MergeOptions {
  /// File whose values win.
  pub source_file: PathBuf,
  /// File whose layout is kept.
  pub target_file: PathBuf,
  /// Also append keys that only exist in the source.
  pub squash: bool,
  pub destination: Destination,
  /// Compute the merge without writing anything.
  pub dry_run: bool,
  /// Never ask before overwriting.
  pub force: bool,
}

/// Configuration options for backing up an env file.
#[derive(Debug, Clone)]
pub struct BackupOptions {
  pub file: PathBuf,
  /// Backup path. If None, a timestamped name next to `file` is used.
  pub output: Option<PathBuf>,
}

/// What a merge changed, or would change on a dry run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReport {
  pub updated: Vec<String>,
  pub added: Vec<String>,
  /// Source-only keys left out because squash was off.
  pub skipped: Vec<String>,
  pub warnings: Vec<MalformedLine>,
  /// The merged file contents.
  pub output: String,
  /// File that was written, if any.
  pub written_to: Option<PathBuf>,
}

/// Errors that can occur while merging or backing up env files.
#[derive(Debug, thiserror::Error)]
pub enum EnvYeetError {
  /// Source file does not exist
  #[error("Source file not found: {}", .0.display())]
  SourceNotFound(PathBuf),
  /// Target file does not exist
  #[error("Target file not found: {}", .0.display())]
  TargetNotFound(PathBuf),
  /// Error reading the source file
  #[error("Source file IO error: {0}")]
  SourceIo(io::Error),
  /// Error reading the target file
  #[error("Target file IO error: {0}")]
  TargetIo(io::Error),
  /// Error writing the merged content
  #[error("Write error: {0}")]
  Write(io::Error),
  /// Overwrite was declined at the prompt
  #[error("Aborted")]
  Aborted,
  /// File to back up does not exist
  #[error("File not found: {}", .0.display())]
  BackupSourceNotFound(PathBuf),
  /// Backup destination is already taken
  #[error("Backup file already exists: {}", .0.display())]
  BackupExists(PathBuf),
  /// Error copying the backup
  #[error("Backup error: {0}")]
  Backup(io::Error),
}

impl EnvYeetError {
  /// Process exit code for this error.
  pub fn exit_code(&self) -> u8 {
    match self {
      Self::SourceNotFound(_) | Self::TargetNotFound(_) | Self::BackupSourceNotFound(_) => 2,
      Self::BackupExists(_) | Self::Backup(_) => 4,
      Self::SourceIo(_) | Self::TargetIo(_) | Self::Write(_) | Self::Aborted => 1,
    }
  }
}
