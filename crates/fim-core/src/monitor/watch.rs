//! Watch mode: event dispatch to a fixed worker pool
//!
//! One dispatcher thread receives every [`FsEvent`] and forwards it to the
//! worker chosen by hashing the event path. Events for one path therefore
//! reach the same worker and are handled in delivery order, while events
//! for different paths run concurrently.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, select};

use super::context::SessionContext;
use super::events::FsEvent;
use crate::Result;

fn worker_for(event: &FsEvent, workers: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    event.path.hash(&mut hasher);
    (hasher.finish() % workers as u64) as usize
}

/// Spawn the dispatcher and `workers` handler threads.
///
/// On shutdown the dispatcher stops routing and drops the worker queues;
/// each worker finishes the events already queued to it and exits.
pub(crate) fn spawn(
    context: Arc<SessionContext>,
    workers: usize,
    events: Receiver<FsEvent>,
    shutdown: Receiver<()>,
) -> Result<Vec<JoinHandle<()>>> {
    let workers = workers.max(1);
    let mut handles = Vec::with_capacity(workers + 1);
    let mut queues: Vec<Sender<FsEvent>> = Vec::with_capacity(workers);

    for index in 0..workers {
        let (queue, jobs) = crossbeam_channel::unbounded::<FsEvent>();
        let context = Arc::clone(&context);
        let handle = thread::Builder::new()
            .name(format!("fim-watch-{index}"))
            .spawn(move || {
                for event in jobs.iter() {
                    context.handle_event(&event);
                }
            })?;
        queues.push(queue);
        handles.push(handle);
    }

    let dispatcher = thread::Builder::new()
        .name("fim-dispatch".to_string())
        .spawn(move || {
            tracing::debug!(workers = queues.len(), "Event dispatcher started");
            loop {
                select! {
                    recv(events) -> event => match event {
                        Ok(event) => {
                            let index = worker_for(&event, queues.len());
                            if queues[index].send(event).is_err() {
                                tracing::warn!(worker = index, "Watch worker is gone");
                            }
                        }
                        Err(_) => break,
                    },
                    recv(shutdown) -> _ => break,
                }
            }
            drop(queues);
            tracing::debug!("Event dispatcher stopped");
        })?;
    handles.insert(0, dispatcher);

    Ok(handles)
}
