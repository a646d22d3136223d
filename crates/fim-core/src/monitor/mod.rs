//! Monitor controller
//!
//! A [`Monitor`] runs one monitoring session at a time through the states
//! `Idle → Starting → Running → Stopping → Idle`:
//!
//! - **Starting** validates every requested directory on its own, takes a
//!   backup, and establishes the baseline (first scan persisted as
//!   `current`, or a reconciliation against the existing one).
//! - **Running** discovers changes either by polling (full rescan per
//!   interval) or by watching (one reconciliation per filesystem event).
//! - **Stopping** unsubscribes event sources, joins every thread, flushes
//!   the change ledger and releases loggers and store connections.
//!
//! Baseline queries and maintenance (`view_baseline`, `reset_baseline`,
//! `acknowledge`, `unmonitor`, history) work in any state.

mod context;
mod events;
mod poll;
mod watch;

pub use context::normalize;
pub use events::{EventSource, FsEvent, FsEventKind, NotifyEventSource, translate};

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crossbeam_channel::Sender;
use fim_fs::{Entry, ExclusionSet, NormalizedPath, Scanner, timestamp};
use serde::{Deserialize, Serialize};

use crate::backup::{BackupCoordinator, BackupManager};
use crate::config::MonitorConfig;
use crate::ledger::ChangeLedger;
use crate::logging::LoggerRegistry;
use crate::mode::MonitorMode;
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::store::{Baseline, BaselineStore, HistoryEvent, SqliteStore, transact};
use crate::{Error, Result};
use context::SessionContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Idle,
    Starting,
    Running,
    Stopping,
}

impl MonitorState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorState::Idle => "idle",
            MonitorState::Starting => "starting",
            MonitorState::Running => "running",
            MonitorState::Stopping => "stopping",
        }
    }
}

impl std::fmt::Display for MonitorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested directory that could not be started
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryFailure {
    pub directory: PathBuf,
    pub reason: String,
}

impl DirectoryFailure {
    fn new(directory: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            reason: reason.into(),
        }
    }
}

/// Outcome of [`Monitor::start`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartReport {
    pub started: Vec<NormalizedPath>,
    /// Requested directories that were skipped because they are excluded
    pub excluded: Vec<NormalizedPath>,
    pub failures: Vec<DirectoryFailure>,
    /// Drift found against existing baselines while starting
    pub initial: ReconcileReport,
}

/// Baseline of one monitored directory, as returned by [`Monitor::view_baseline`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryBaseline {
    pub directory: NormalizedPath,
    pub entries: Baseline,
}

struct Session {
    context: Arc<SessionContext>,
    shutdown: Sender<()>,
    threads: Vec<JoinHandle<()>>,
    events: Option<Sender<FsEvent>>,
    source: Option<Box<dyn EventSource>>,
}

/// Orchestrates one monitoring session over a set of directories.
pub struct Monitor {
    config: MonitorConfig,
    store: Arc<dyn BaselineStore>,
    ledger: Arc<Mutex<ChangeLedger>>,
    loggers: Arc<LoggerRegistry>,
    backups: Option<Arc<dyn BackupCoordinator>>,
    event_source: Option<Box<dyn EventSource>>,
    state: MonitorState,
    session: Option<Session>,
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("mode", &self.config.mode)
            .field("state", &self.state)
            .field("directories", &self.directories())
            .finish_non_exhaustive()
    }
}

impl Monitor {
    /// Create a monitor over an existing store.
    pub fn new(config: MonitorConfig, store: Arc<dyn BaselineStore>) -> Self {
        let backups: Arc<dyn BackupCoordinator> = Arc::new(BackupManager::new(config.backup_path()));
        Self {
            loggers: Arc::new(LoggerRegistry::new(config.logs_path())),
            backups: Some(backups),
            config,
            store,
            ledger: Arc::new(Mutex::new(ChangeLedger::new())),
            event_source: None,
            state: MonitorState::Idle,
            session: None,
        }
    }

    /// Validate `config` and open its SQLite database.
    pub fn open(config: MonitorConfig) -> Result<Self> {
        config.validate()?;
        let store = SqliteStore::open(&config.database_path(), config.read_pool_size())?;
        Ok(Self::new(config, Arc::new(store)))
    }

    /// Replace the backup coordinator; `None` disables backups.
    pub fn with_backup_coordinator(mut self, backups: Option<Arc<dyn BackupCoordinator>>) -> Self {
        self.backups = backups;
        self
    }

    /// Use `source` instead of the platform watcher in watch mode.
    pub fn with_event_source(mut self, source: Box<dyn EventSource>) -> Self {
        self.event_source = Some(source);
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn store(&self) -> &Arc<dyn BaselineStore> {
        &self.store
    }

    pub fn loggers(&self) -> &LoggerRegistry {
        &self.loggers
    }

    /// Directories of the running session; empty when idle.
    pub fn directories(&self) -> Vec<NormalizedPath> {
        self.session
            .as_ref()
            .map(|session| session.context.directories())
            .unwrap_or_default()
    }

    /// Ledger records not yet flushed to history and logs.
    pub fn pending_changes(&self) -> usize {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner).pending()
    }

    fn require_state(&self, expected: MonitorState, operation: &str) -> Result<()> {
        if self.state != expected {
            return Err(Error::InvalidState {
                operation: operation.to_string(),
                state: self.state.to_string(),
            });
        }
        Ok(())
    }

    fn exclusions(&self, excluded: &[PathBuf]) -> ExclusionSet {
        self.config
            .excluded
            .iter()
            .chain(excluded)
            .chain(self.config.engine_paths().iter())
            .map(|path| normalize(path))
            .collect()
    }

    /// Start monitoring `directories`.
    ///
    /// Each directory is validated on its own: a missing one is reported in
    /// [`StartReport::failures`] and the others still start. An empty list,
    /// or one where every directory is excluded, is a configuration error;
    /// if no directory can be started the session does not start at all.
    pub fn start(&mut self, directories: &[PathBuf], excluded: &[PathBuf]) -> Result<StartReport> {
        self.require_state(MonitorState::Idle, "start")?;
        self.config.validate()?;
        if directories.is_empty() {
            return Err(Error::Config {
                message: "no directories to monitor".to_string(),
            });
        }

        let exclusions = self.exclusions(excluded);
        let mut report = StartReport::default();
        let mut candidates = Vec::new();
        for requested in directories {
            let directory = normalize(requested);
            if exclusions.contains(&directory) {
                tracing::info!(directory = %directory, "Skipping excluded directory");
                report.excluded.push(directory);
                continue;
            }
            if !directory.is_dir() {
                report
                    .failures
                    .push(DirectoryFailure::new(requested, "directory not found"));
                continue;
            }
            if !candidates.contains(&directory) {
                candidates.push(directory);
            }
        }

        if candidates.is_empty() && report.failures.is_empty() {
            return Err(Error::Config {
                message: "every requested directory is excluded".to_string(),
            });
        }
        if candidates.is_empty() {
            return Err(Error::NoValidDirectories {
                failures: report.failures,
            });
        }

        self.state = MonitorState::Starting;
        let reconciler = Reconciler::new(
            Arc::clone(&self.store),
            Arc::clone(&self.ledger),
            Scanner::new(exclusions),
        )
        .with_rename_detection(self.config.detect_renames);
        let context = Arc::new(SessionContext::new(
            self.config.owner.clone(),
            Arc::clone(&self.store),
            Arc::clone(&self.ledger),
            Arc::clone(&self.loggers),
            reconciler,
        ));

        for directory in candidates {
            match self.prepare_directory(&context, &directory) {
                Ok(initial) => {
                    context.add_directory(directory.clone());
                    report.initial.merge(initial);
                    report.started.push(directory);
                }
                Err(e) => {
                    tracing::error!(directory = %directory, error = %e, "Directory could not be started");
                    report
                        .failures
                        .push(DirectoryFailure::new(directory.to_native(), e.to_string()));
                }
            }
        }

        if report.started.is_empty() {
            self.state = MonitorState::Idle;
            return Err(Error::NoValidDirectories {
                failures: report.failures,
            });
        }

        match self.launch(context, &mut report) {
            Ok(session) => self.session = Some(session),
            Err(e) => {
                self.state = MonitorState::Idle;
                return Err(e);
            }
        }
        self.state = MonitorState::Running;
        tracing::info!(
            mode = %self.config.mode,
            directories = report.started.len(),
            failures = report.failures.len(),
            "Monitoring started"
        );
        Ok(report)
    }

    /// Backup, then baseline or reconcile one directory before it runs.
    fn prepare_directory(&self, context: &SessionContext, directory: &NormalizedPath) -> Result<ReconcileReport> {
        let logger = context.logger(directory);

        if self.config.backup_on_start
            && let Some(backups) = &self.backups
        {
            match backups.create_backup(directory) {
                Some(snapshot) => logger.info(&format!("Backup created at {}", snapshot.path)),
                None => logger.warning("Backup failed; monitoring without a fresh snapshot"),
            }
        }

        let snapshot = context.reconciler.scanner().scan(&directory.to_native())?;
        let initial = if self.config.rebaseline_on_start || !self.store.has_baseline(directory)? {
            let entries: Vec<Entry> = snapshot.iter().cloned().collect();
            let count = transact(&*self.store, |tx| {
                let count = tx.replace_baseline(directory, &entries)?;
                self.ledger
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clear_directory(directory);
                Ok(count)
            })?;
            logger.info(&format!("Baseline created with {count} entries"));
            ReconcileReport::default()
        } else {
            let report = context.reconciler.reconcile_snapshot(&snapshot)?;
            context.report(directory, &report);
            context.flush(Some(directory));
            report
        };

        logger.info(&format!("Monitoring started ({} mode)", self.config.mode));
        Ok(initial)
    }

    fn launch(&mut self, context: Arc<SessionContext>, report: &mut StartReport) -> Result<Session> {
        let (shutdown, shutdown_rx) = crossbeam_channel::bounded::<()>(0);

        match self.config.mode {
            MonitorMode::Poll => {
                let handle = poll::spawn(Arc::clone(&context), self.config.poll_interval(), shutdown_rx)?;
                Ok(Session {
                    context,
                    shutdown,
                    threads: vec![handle],
                    events: None,
                    source: None,
                })
            }
            MonitorMode::Watch => {
                let mut source = self
                    .event_source
                    .take()
                    .unwrap_or_else(|| Box::new(NotifyEventSource::new()));
                let (events, events_rx) = crossbeam_channel::unbounded();

                for directory in context.directories() {
                    if let Err(e) = source.subscribe(&directory, events.clone()) {
                        tracing::error!(directory = %directory, error = %e, "Subscription failed");
                        context.remove_directory(&directory);
                        report.started.retain(|d| d != &directory);
                        report
                            .failures
                            .push(DirectoryFailure::new(directory.to_native(), e.to_string()));
                    }
                }
                if report.started.is_empty() {
                    source.unsubscribe_all();
                    self.event_source = Some(source);
                    return Err(Error::NoValidDirectories {
                        failures: report.failures.clone(),
                    });
                }

                let threads = match watch::spawn(Arc::clone(&context), self.config.watch_workers(), events_rx, shutdown_rx)
                {
                    Ok(threads) => threads,
                    Err(e) => {
                        source.unsubscribe_all();
                        self.event_source = Some(source);
                        return Err(e);
                    }
                };
                Ok(Session {
                    context,
                    shutdown,
                    threads,
                    events: Some(events),
                    source: Some(source),
                })
            }
        }
    }

    /// Stop the session: no further events are dispatched, in-flight work
    /// finishes, the ledger is flushed and resources are released.
    pub fn stop(&mut self) -> Result<()> {
        self.require_state(MonitorState::Running, "stop")?;
        self.state = MonitorState::Stopping;

        let Some(Session {
            context,
            shutdown,
            threads,
            events,
            source,
        }) = self.session.take()
        else {
            self.state = MonitorState::Idle;
            return Ok(());
        };

        if let Some(mut source) = source {
            source.unsubscribe_all();
            self.event_source = Some(source);
        }
        drop(events);
        drop(shutdown);
        for handle in threads {
            if handle.join().is_err() {
                tracing::error!("Monitor thread panicked");
            }
        }

        let flushed = context.flush(None);
        for directory in context.directories() {
            context.logger(&directory).info("Monitoring stopped");
        }
        self.loggers.shutdown();
        let released = self.store.release();

        self.state = MonitorState::Idle;
        tracing::info!(flushed, "Monitoring stopped");
        released
    }

    /// Add a directory to the running session.
    pub fn add_path(&mut self, directory: &Path) -> Result<()> {
        self.require_state(MonitorState::Running, "add a path")?;
        let Some(context) = self.session.as_ref().map(|session| Arc::clone(&session.context)) else {
            return Ok(());
        };

        let normalized = normalize(directory);
        if !normalized.is_dir() {
            return Err(Error::DirectoryNotFound {
                path: directory.to_path_buf(),
            });
        }
        if context.reconciler.scanner().exclusions().contains(&normalized) {
            return Err(Error::Config {
                message: format!("{normalized} is excluded"),
            });
        }
        if context.is_monitored(&normalized) {
            return Ok(());
        }

        self.prepare_directory(&context, &normalized)?;
        if let Some(session) = self.session.as_mut()
            && let (Some(source), Some(events)) = (session.source.as_mut(), session.events.as_ref())
        {
            source.subscribe(&normalized, events.clone())?;
        }
        context.add_directory(normalized.clone());
        tracing::info!(directory = %normalized, "Directory added to session");
        Ok(())
    }

    /// Run one poll cycle over the session's directories now, in the
    /// calling thread. Works in either mode.
    pub fn poll_once(&self) -> Result<ReconcileReport> {
        self.require_state(MonitorState::Running, "poll")?;
        Ok(self
            .session
            .as_ref()
            .map(|session| session.context.poll_cycle())
            .unwrap_or_default())
    }

    /// Discard the stored baseline of each directory and record a fresh one.
    ///
    /// Change history of a directory that still exists is kept. A directory
    /// that no longer exists has all of its records purged, history included.
    /// Returns the number of entries in the new baselines.
    pub fn reset_baseline(&self, directories: &[PathBuf]) -> Result<usize> {
        let scanner = self
            .session
            .as_ref()
            .map(|session| session.context.reconciler.scanner().clone())
            .unwrap_or_else(|| Scanner::new(self.exclusions(&[])));

        let mut total = 0;
        for requested in directories {
            let directory = normalize(requested);
            let exists = directory.is_dir();
            let entries: Vec<Entry> = if exists {
                scanner.scan(&directory.to_native())?.iter().cloned().collect()
            } else {
                Vec::new()
            };

            let count = transact(&*self.store, |tx| {
                let count = if exists {
                    tx.replace_baseline(&directory, &entries)?
                } else {
                    tx.delete_directory_records(&directory)?;
                    0
                };
                self.ledger
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clear_directory(&directory);
                Ok(count)
            })?;

            self.loggers
                .get_or_create_logger(&self.config.owner, &directory)
                .info(&format!("Baseline reset with {count} entries"));
            total += count;
        }
        Ok(total)
    }

    /// Accept the current drift of a directory as its new baseline.
    pub fn acknowledge(&self, directory: &Path) -> Result<usize> {
        let directory = normalize(directory);
        let promoted = transact(&*self.store, |tx| {
            let promoted = tx.promote_to_current(&directory)?;
            self.ledger
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear_directory(&directory);
            Ok(promoted)
        })?;
        self.loggers
            .get_or_create_logger(&self.config.owner, &directory)
            .info(&format!("Acknowledged {promoted} changes"));
        Ok(promoted)
    }

    /// Stop monitoring a directory and purge its records.
    ///
    /// The directory's event subscription ends first. Reconciliation work
    /// already in flight for it finds the records gone and writes nothing.
    pub fn unmonitor(&mut self, directory: &Path) -> Result<usize> {
        let directory = normalize(directory);
        if let Some(session) = self.session.as_mut() {
            session.context.remove_directory(&directory);
            if let Some(source) = session.source.as_mut() {
                source.unsubscribe(&directory);
            }
        }
        let removed = transact(&*self.store, |tx| {
            let removed = tx.delete_directory_records(&directory)?;
            self.ledger
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear_directory(&directory);
            Ok(removed)
        })?;
        self.loggers
            .get_or_create_logger(&self.config.owner, &directory)
            .info(&format!("Directory no longer monitored ({removed} entries removed)"));
        Ok(removed)
    }

    /// Stored baseline of one directory, or of every known directory.
    pub fn view_baseline(&self, directory: Option<&Path>) -> Result<Vec<DirectoryBaseline>> {
        let directories = match directory {
            Some(directory) => vec![normalize(directory)],
            None => self.store.monitored_directories()?,
        };
        directories
            .into_iter()
            .map(|directory| {
                let entries = self.store.get_current_baseline(&directory)?;
                Ok(DirectoryBaseline { directory, entries })
            })
            .collect()
    }

    /// Log text of one directory, or of every directory log, as
    /// `(file name, content)` pairs.
    pub fn view_logs(&self, directory: Option<&Path>) -> Result<Vec<(String, String)>> {
        match directory {
            Some(directory) => {
                let directory = normalize(directory);
                let content = self.loggers.read_log(&directory)?;
                Ok(vec![(crate::logging::log_file_name(&directory), content)])
            }
            None => self.loggers.read_all_logs(),
        }
    }

    pub fn file_history(&self, path: &Path, limit: usize) -> Result<Vec<HistoryEvent>> {
        self.store.file_history(&normalize(path), limit)
    }

    /// History events of the last `hours` hours across all directories.
    pub fn recent_changes(&self, hours: u32) -> Result<Vec<HistoryEvent>> {
        self.store.recent_changes(&timestamp::hours_ago(hours))
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        if self.state == MonitorState::Running
            && let Err(e) = self.stop()
        {
            tracing::warn!(error = %e, "Monitor did not stop cleanly");
        }
    }
}
