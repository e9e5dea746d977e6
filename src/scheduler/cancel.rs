//! Operator cancellation.
//!
//! A [`CancelToken`] is shared by the scheduler and the runner invoker.
//! It can be tripped in-process (Ctrl-C) or by another process writing the
//! cancel-request file, which a background task polls.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Cancel-request file name inside the state directory.
pub const CANCEL_FILE: &str = "cancel";

/// Cloneable one-shot cancellation flag.
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    /// Request cancellation; idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // Sender gone: nothing can cancel any more.
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Path of the cancel-request file for a state directory.
pub fn cancel_file(state_dir: &Path) -> PathBuf {
    state_dir.join(CANCEL_FILE)
}

/// Ask a running loop (possibly in another process) to stop.
pub fn request_cancel(state_dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(state_dir)?;
    let path = cancel_file(state_dir);
    fs::write(&path, chrono::Utc::now().to_rfc3339())?;
    Ok(path)
}

/// Remove a pending cancel request, if any.
pub fn clear_cancel_request(state_dir: &Path) -> io::Result<bool> {
    match fs::remove_file(cancel_file(state_dir)) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Trip `token` once `path` appears. The task ends when the token is
/// cancelled by any source.
pub fn watch_cancel_file(path: PathBuf, token: CancelToken, poll: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let poll = poll.max(Duration::from_millis(10));
        loop {
            if path.exists() {
                log::info!("Cancel requested via {}", path.display());
                token.cancel();
                return;
            }
            tokio::select! {
                _ = tokio::time::sleep(poll) => {}
                _ = token.cancelled() => return,
            }
        }
    })
}
