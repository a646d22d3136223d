//! Filesystem event sources for watch mode

use std::path::Path;

use crossbeam_channel::Sender;
use fim_fs::NormalizedPath;
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FsEventKind {
    Created,
    Modified,
    Deleted,
}

/// One filesystem change below a monitored directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FsEvent {
    /// Monitored directory the subscription was made for
    pub directory: NormalizedPath,
    pub kind: FsEventKind,
    pub path: NormalizedPath,
    pub is_directory: bool,
}

impl FsEvent {
    pub fn new(directory: &NormalizedPath, kind: FsEventKind, path: impl Into<NormalizedPath>) -> Self {
        let path = path.into();
        let is_directory = path.is_dir();
        Self {
            directory: directory.clone(),
            kind,
            path,
            is_directory,
        }
    }
}

/// Delivers filesystem events for subscribed directories.
///
/// Implementations send every event into the sender passed to
/// [`subscribe`](EventSource::subscribe), from any thread. After
/// [`unsubscribe`](EventSource::unsubscribe) or
/// [`unsubscribe_all`](EventSource::unsubscribe_all) returns, no further
/// events are sent for the directories concerned.
pub trait EventSource: Send {
    /// Start delivering events for `directory` and everything below it.
    fn subscribe(&mut self, directory: &NormalizedPath, events: Sender<FsEvent>) -> Result<()>;

    /// Stop delivering events for one directory. Returns false if it was
    /// not subscribed.
    fn unsubscribe(&mut self, directory: &NormalizedPath) -> bool;

    fn unsubscribe_all(&mut self);
}

/// Map one `notify` event to zero or more engine events.
///
/// Renames become a deletion of the old path and a creation of the new
/// one. When the rename direction is unknown, the path's existence decides.
/// Access events carry no change and are dropped.
pub fn translate(directory: &NormalizedPath, event: Event) -> Vec<FsEvent> {
    let by_existence = |path: &Path| {
        if path.exists() {
            FsEventKind::Created
        } else {
            FsEventKind::Deleted
        }
    };

    let mut translated = Vec::with_capacity(event.paths.len());
    for path in event.paths {
        let kind = match event.kind {
            EventKind::Create(_) => FsEventKind::Created,
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => FsEventKind::Deleted,
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => FsEventKind::Created,
            EventKind::Modify(ModifyKind::Name(_)) => by_existence(&path),
            EventKind::Modify(_) => FsEventKind::Modified,
            EventKind::Remove(_) => FsEventKind::Deleted,
            EventKind::Any | EventKind::Other => by_existence(&path),
            EventKind::Access(_) => continue,
        };
        translated.push(FsEvent::new(directory, kind, path));
    }
    translated
}

/// [`EventSource`] backed by the platform's recommended `notify` watcher.
#[derive(Default)]
pub struct NotifyEventSource {
    watchers: Vec<(NormalizedPath, RecommendedWatcher)>,
}

impl std::fmt::Debug for NotifyEventSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let paths: Vec<_> = self.watchers.iter().map(|(path, _)| path).collect();
        f.debug_struct("NotifyEventSource").field("watching", &paths).finish()
    }
}

impl NotifyEventSource {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSource for NotifyEventSource {
    fn subscribe(&mut self, directory: &NormalizedPath, events: Sender<FsEvent>) -> Result<()> {
        let root = directory.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for translated in translate(&root, event) {
                    if events.send(translated).is_err() {
                        return;
                    }
                }
            }
            Err(e) => tracing::warn!(directory = %root, error = %e, "Watcher error"),
        })?;

        watcher.watch(&directory.to_native(), RecursiveMode::Recursive)?;
        tracing::debug!(directory = %directory, "Subscribed to filesystem events");
        self.watchers.push((directory.clone(), watcher));
        Ok(())
    }

    fn unsubscribe(&mut self, directory: &NormalizedPath) -> bool {
        let before = self.watchers.len();
        let (gone, kept): (Vec<_>, Vec<_>) = self.watchers.drain(..).partition(|(path, _)| path == directory);
        self.watchers = kept;
        for (path, watcher) in gone {
            unwatch(path, watcher);
        }
        self.watchers.len() != before
    }

    fn unsubscribe_all(&mut self) {
        for (path, watcher) in self.watchers.drain(..) {
            unwatch(path, watcher);
        }
    }
}

fn unwatch(path: NormalizedPath, mut watcher: RecommendedWatcher) {
    if let Err(e) = watcher.unwatch(&path.to_native()) {
        tracing::debug!(path = %path, error = %e, "Unwatch failed");
    }
    tracing::debug!(directory = %path, "Unsubscribed from filesystem events");
}
