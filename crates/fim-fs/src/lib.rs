//! Filesystem layer for the integrity monitor
//!
//! Provides normalized path identity, deterministic file and folder
//! fingerprints, directory snapshots, and safe I/O for state files.

pub mod config;
pub mod entry;
pub mod error;
pub mod fingerprint;
pub mod io;
pub mod path;
pub mod scanner;
pub mod timestamp;

pub use config::{ConfigFormat, load_config, save_config};
pub use entry::{Entry, EntryKind, Snapshot};
pub use error::{Error, Result};
pub use fingerprint::{Fingerprint, FolderDigest, hash_file, hash_folder, hash_folder_filtered};
pub use path::NormalizedPath;
pub use scanner::{ExclusionSet, Scanner};
