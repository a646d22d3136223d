//! Integrity-tracking engine for the file integrity monitor
//!
//! This crate sits between the filesystem layer and the CLI, implementing:
//!
//! - **Change ledger**: de-duplicated, collapsing record of classified changes
//! - **Reconciliation**: diffing snapshots or single paths against the baseline
//! - **Persistence**: the `BaselineStore` contract and its SQLite adapter
//! - **Backups and logs**: pre-monitoring snapshots and per-directory log files
//! - **Monitor**: poll and watch sessions with a graceful stop
//!
//! # Architecture
//!
//! ```text
//!                 fim-cli
//!                    |
//!                 Monitor
//!          +---------+---------+
//!          |         |         |
//!     Reconciler  Loggers   Backups
//!       |     |
//!   Ledger  BaselineStore (SQLite)
//!       \     /
//!        fim-fs
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::path::PathBuf;
//! use fim_core::{Monitor, MonitorConfig, MonitorMode};
//!
//! fn example() -> fim_core::Result<()> {
//!     let mut config = MonitorConfig::with_data_dir("/var/lib/fim");
//!     config.mode = MonitorMode::Poll;
//!
//!     let mut monitor = Monitor::open(config)?;
//!     let report = monitor.start(&[PathBuf::from("/srv/www")], &[])?;
//!     println!("monitoring {} directories", report.started.len());
//!     monitor.stop()
//! }
//! ```

pub mod backup;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod mode;
pub mod monitor;
pub mod reconcile;
pub mod store;

pub use backup::{BackupCoordinator, BackupManager, BackupMetadata, BackupSnapshot};
pub use config::MonitorConfig;
pub use error::{Error, Result};
pub use ledger::{ChangeLedger, ChangeRecord, Classification, LedgerOutcome};
pub use logging::{DirectoryLogger, LogLevel, LoggerRegistry};
pub use mode::MonitorMode;
pub use monitor::{
    DirectoryBaseline, DirectoryFailure, EventSource, FsEvent, FsEventKind, Monitor, MonitorState,
    NotifyEventSource, StartReport,
};
pub use reconcile::{ReconcileFailure, ReconcileReport, Reconciler};
pub use store::{
    Baseline, BaselineEntry, BaselineStore, BaselineTx, EntryStatus, FileEvent, HistoryEvent, SqliteStore,
};
