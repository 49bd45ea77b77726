use crate::error::{Result, StoreError};
use crate::snapshot::{write_snapshot, Snapshot};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time;

type Reply = oneshot::Sender<Result<()>>;

enum WriterCommand {
    Write {
        snapshot: Box<Snapshot>,
        reply: Reply,
    },
    Shutdown {
        reply: Reply,
    },
}

/// Serializes snapshot writes onto a single background task.
///
/// Writes never overlap, even when one outlives its timeout. Snapshots queued while a write
/// is in flight are coalesced: only the newest one reaches disk and every waiter receives
/// that write's result.
#[derive(Clone)]
pub struct SnapshotWriter {
    inner: Arc<SnapshotWriterInner>,
}

struct SnapshotWriterInner {
    path: PathBuf,
    command_tx: mpsc::UnboundedSender<WriterCommand>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SnapshotWriter {
    /// Spawn the writer task. Must be called inside a tokio runtime.
    pub fn start(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        let path = path.into();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(write_loop(path.clone(), timeout, command_rx));

        Self {
            inner: Arc::new(SnapshotWriterInner {
                path,
                command_tx,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Queue `snapshot` and wait until it (or a newer snapshot) is on disk.
    pub async fn save(&self, snapshot: Snapshot) -> Result<()> {
        let (reply, done) = oneshot::channel();
        self.inner
            .command_tx
            .send(WriterCommand::Write {
                snapshot: Box::new(snapshot),
                reply,
            })
            .map_err(|_| StoreError::WriterClosed)?;
        done.await.map_err(|_| StoreError::WriterClosed)?
    }

    /// Flush queued writes and stop the task.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply, done) = oneshot::channel();
        if self
            .inner
            .command_tx
            .send(WriterCommand::Shutdown { reply })
            .is_ok()
        {
            let _ = done.await;
        }

        let task = self
            .inner
            .task
            .lock()
            .map_err(|_| StoreError::Other("snapshot writer state poisoned".to_string()))?
            .take();
        if let Some(task) = task {
            task.await
                .map_err(|err| StoreError::Other(format!("snapshot writer task failed: {err}")))?;
        }
        Ok(())
    }
}

async fn write_loop(
    path: PathBuf,
    timeout: Duration,
    mut command_rx: mpsc::UnboundedReceiver<WriterCommand>,
) {
    // A write that outlived its timeout keeps running; nothing else touches the file until
    // it settles.
    let mut stalled: Option<WriteTask> = None;

    while let Some(command) = command_rx.recv().await {
        let mut latest = None;
        let mut waiters = Vec::new();
        let mut shutdown = None;

        let mut absorb = |command: WriterCommand| match command {
            WriterCommand::Write { snapshot, reply } => {
                latest = Some(snapshot);
                waiters.push(reply);
            }
            WriterCommand::Shutdown { reply } => shutdown = Some(reply),
        };
        absorb(command);
        while let Ok(queued) = command_rx.try_recv() {
            absorb(queued);
        }

        if let Some(snapshot) = latest {
            let result = write_with_timeout(&path, snapshot, timeout, &mut stalled).await;
            if let Err(err) = &result {
                log::error!("Failed to save snapshot to {}: {err}", path.display());
            }
            answer(waiters, result);
        }

        if let Some(reply) = shutdown {
            if let Some(write) = stalled.take() {
                match time::timeout(timeout, write).await {
                    Ok(outcome) => log_late_write(&path, outcome),
                    Err(_) => log::warn!(
                        "Snapshot write to {} still pending at shutdown",
                        path.display()
                    ),
                }
            }
            log::debug!("Snapshot writer for {} stopped", path.display());
            let _ = reply.send(Ok(()));
            return;
        }
    }
}

type WriteTask = JoinHandle<Result<()>>;

/// Run one write on its own task, bounded by `timeout`.
///
/// The budget covers waiting for a previously stalled write as well. On timeout the write
/// is parked in `stalled` instead of being abandoned, so two writes never overlap.
async fn write_with_timeout(
    path: &Path,
    snapshot: Box<Snapshot>,
    timeout: Duration,
    stalled: &mut Option<WriteTask>,
) -> Result<()> {
    let deadline = time::Instant::now() + timeout;

    if let Some(mut previous) = stalled.take() {
        match time::timeout_at(deadline, &mut previous).await {
            Ok(outcome) => log_late_write(path, outcome),
            Err(_) => {
                *stalled = Some(previous);
                return Err(timed_out(path, timeout));
            }
        }
    }

    let target = path.to_path_buf();
    let mut write = tokio::spawn(async move { write_snapshot(&target, &snapshot).await });
    match time::timeout_at(deadline, &mut write).await {
        Ok(Ok(result)) => result,
        Ok(Err(err)) => Err(StoreError::Other(format!("snapshot write task failed: {err}"))),
        Err(_) => {
            *stalled = Some(write);
            Err(timed_out(path, timeout))
        }
    }
}

fn log_late_write(path: &Path, outcome: std::result::Result<Result<()>, JoinError>) {
    match outcome {
        Ok(Ok(())) => log::info!("Delayed snapshot write to {} completed", path.display()),
        Ok(Err(err)) => log::warn!("Delayed snapshot write to {} failed: {err}", path.display()),
        Err(err) => log::warn!("Delayed snapshot write to {} aborted: {err}", path.display()),
    }
}

fn timed_out(path: &Path, timeout: Duration) -> StoreError {
    StoreError::PersistenceTimeout {
        path: path.to_path_buf(),
        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    }
}

/// Every waiter gets the outcome; the first one receives the original error.
fn answer(waiters: Vec<Reply>, result: Result<()>) {
    let mut waiters = waiters.into_iter();
    let Err(err) = result else {
        for waiter in waiters {
            let _ = waiter.send(Ok(()));
        }
        return;
    };

    let Some(first) = waiters.next() else {
        return;
    };
    for waiter in waiters {
        let _ = waiter.send(Err(replicate(&err)));
    }
    let _ = first.send(Err(err));
}

fn replicate(err: &StoreError) -> StoreError {
    match err {
        StoreError::PersistenceTimeout { path, timeout_ms } => StoreError::PersistenceTimeout {
            path: path.clone(),
            timeout_ms: *timeout_ms,
        },
        StoreError::WriterClosed => StoreError::WriterClosed,
        other => StoreError::Other(other.to_string()),
    }
}
