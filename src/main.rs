use clap::{Args, Parser, Subcommand};
use envyeet::{
  merge::Origin,
  yeet::{BackupOptions, Destination, EnvYeet, EnvYeetError, MergeOptions, MergeReport},
};
use std::{io, path::PathBuf, process::ExitCode};

#[derive(Parser)]
#[command(
  name = "envyeet",
  about = "Merge environment variable files with intelligent key swapping and optional value injection",
  version,
  author,
  arg_required_else_help = true
)]
struct Cli {
  /// Suppress non-error output
  #[arg(short, long, global = true)]
  quiet: bool,

  /// Verbose output (-v for verbose, -vv for very verbose)
  #[arg(short, long, action = clap::ArgAction::Count, global = true)]
  verbose: u8,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Merge source env file into target env file
  Merge(MergeArgs),
  /// Create a backup of an environment file
  Backup(BackupArgs),
}

#[derive(Args)]
struct MergeArgs {
  /// Source environment file
  source: PathBuf,

  /// Target environment file
  target: PathBuf,

  /// Add new keys from source (default: only update existing)
  #[arg(long)]
  squash: bool,

  /// Write output to specified file
  #[arg(long, conflicts_with = "overwrite")]
  output: Option<PathBuf>,

  /// Write directly to target file (destructive)
  #[arg(long)]
  overwrite: bool,

  /// Show what would change without modifying files
  #[arg(long)]
  dry_run: bool,

  /// Skip confirmation prompts
  #[arg(long)]
  force: bool,

  /// Disable confirmation prompts (alias for --force)
  #[arg(long)]
  no_input: bool,
}

#[derive(Args)]
struct BackupArgs {
  /// File to backup
  file: PathBuf,

  /// Custom backup filename (must not exist)
  #[arg(long)]
  output: Option<PathBuf>,
}

fn setup_tracing(verbose: u8, quiet: bool) {
  use tracing_subscriber::fmt;
  use tracing_subscriber::prelude::*;

  let log_level = match (quiet, verbose) {
    (true, _) => "error",
    (false, 0) => "info",
    (false, 1) => "debug",
    _ => "trace",
  };

  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr))
    .with(tracing_subscriber::EnvFilter::new(
      std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
    ))
    .init();
}

fn run_merge(args: MergeArgs, quiet: bool, verbose: u8) -> Result<(), EnvYeetError> {
  let destination = match (args.overwrite, args.output) {
    (true, _) => Destination::Overwrite,
    (false, Some(path)) => Destination::File(path),
    (false, None) => Destination::Stdout,
  };

  let source_file = args.source;
  let target_file = args.target;

  let options = MergeOptions {
    source_file: source_file.clone(),
    target_file: target_file.clone(),
    squash: args.squash,
    destination,
    dry_run: args.dry_run,
    force: args.force || args.no_input,
  };

  let report = EnvYeet::merge_with_options(options)?;

  if verbose > 0 {
    for warning in &report.warnings {
      let path = match warning.origin {
        Origin::Source => &source_file,
        Origin::Target => &target_file,
      };
      eprintln!(
        "warning: skipping malformed line {} in {}",
        warning.line_number,
        path.display()
      );
    }
  }

  if args.dry_run {
    if !quiet {
      print_dry_run(&report);
    }
    return Ok(());
  }

  if quiet {
    return Ok(());
  }

  let stdout = io::stdout().lock();
  match &report.written_to {
    Some(path) => EnvYeet::emit(stdout, &format!("Written to {}\n", path.display())),
    None => EnvYeet::emit(stdout, &report.output),
  }
}

fn print_dry_run(report: &MergeReport) {
  if !report.updated.is_empty() {
    eprintln!("Keys to update: {}", report.updated.join(", "));
  }
  if !report.added.is_empty() {
    eprintln!("Keys to add: {}", report.added.join(", "));
  }
  if !report.skipped.is_empty() {
    eprintln!(
      "Keys skipped (use --squash to add): {}",
      report.skipped.join(", ")
    );
  }
  if report.updated.is_empty() && report.added.is_empty() {
    eprintln!("No changes would be made");
  }
}

fn run_backup(args: BackupArgs, quiet: bool) -> Result<(), EnvYeetError> {
  let options = BackupOptions {
    file: args.file,
    output: args.output,
  };

  let backup = EnvYeet::backup_with_options(options)?;

  if quiet {
    return Ok(());
  }

  EnvYeet::emit(io::stdout().lock(), &format!("{}\n", backup.display()))
}

fn main() -> ExitCode {
  let cli = match Cli::try_parse() {
    Ok(cli) => cli,
    // Usage errors, including a missing subcommand, share the general exit code
    Err(err) if err.use_stderr() => {
      let _ = err.print();
      return ExitCode::FAILURE;
    }
    Err(err) => err.exit(),
  };

  setup_tracing(cli.verbose, cli.quiet);

  let result = match cli.command {
    Command::Merge(args) => run_merge(args, cli.quiet, cli.verbose),
    Command::Backup(args) => run_backup(args, cli.quiet),
  };

  match result {
    Ok(()) => ExitCode::SUCCESS,
    Err(err) => {
      eprintln!("Error: {err}");
      ExitCode::from(err.exit_code())
    }
  }
}
