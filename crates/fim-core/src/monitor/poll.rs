//! Poll mode: periodic full rescans

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use super::context::SessionContext;
use crate::Result;

/// Spawn the poll loop. It sleeps `interval` between cycles and exits as
/// soon as `shutdown` is signalled or disconnected, including mid-sleep.
pub(crate) fn spawn(context: Arc<SessionContext>, interval: Duration, shutdown: Receiver<()>) -> Result<JoinHandle<()>> {
    let handle = thread::Builder::new()
        .name("fim-poll".to_string())
        .spawn(move || {
            tracing::debug!(interval_secs = interval.as_secs(), "Poll loop started");
            loop {
                match shutdown.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let report = context.poll_cycle();
                        if !report.is_quiet() {
                            tracing::info!(
                                changes = report.changes.len(),
                                collapsed = report.collapsed.len(),
                                failures = report.failures.len(),
                                "Poll cycle found drift"
                            );
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::debug!("Poll loop stopped");
        })?;
    Ok(handle)
}
