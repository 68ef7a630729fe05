//! Environment file merging library.
//!
//! This library merges one `.env` file into another: values from the source file
//! replace the values of matching keys in the target file, while the target's
//! comments, blank lines, ordering and formatting stay exactly as they were.
//!
//! # Features
//!
//! - **Format preservation**: untouched lines are written back byte-for-byte
//! - **Zero-copy parsing**: Uses `Cow<str>` for efficient string handling
//! - **Quote-aware**: substituted values keep the source's quoting and `export` prefix
//! - **Squash mode**: optionally append keys that only exist in the source
//! - **Optional tracing**: Detailed logging when the `tracing` feature is enabled
//!
//! # Example
//!
//! ```rust,no_run
//! use envyeet::yeet::{Destination, EnvYeet, MergeOptions};
//! use std::path::PathBuf;
//!
//! let options = MergeOptions {
//!     source_file: PathBuf::from(".env.staging"),
//!     target_file: PathBuf::from(".env"),
//!     squash: false,
//!     destination: Destination::Overwrite,
//!     dry_run: false,
//!     force: true,
//! };
//!
//! EnvYeet::merge_with_options(options).unwrap();
//! ```

pub mod format;
pub mod merge;
pub mod parse;
pub mod yeet;

pub use format::serialize;
pub use merge::merge;
pub use parse::parse;
