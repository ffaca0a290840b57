//! Run-scoped state shared between the core sealer/verifier/indexer and a
//! background progress-printing thread: an explicit carrier replacing any
//! notion of global mutable state.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

/// A snapshot of in-progress work, updated by the core and read by the
/// progress thread.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    pub current_path: Option<PathBuf>,
    pub dirs_done: u64,
    pub dirs_total: u64,
}

/// Owns the progress record and the shutdown latch for one run of the CLI.
///
/// The latch is a `RwLock<()>`: a manifest write holds a read guard for its
/// duration; a shutdown handler takes a write guard before exiting, which
/// blocks until any in-flight write finishes.
#[derive(Debug, Clone)]
pub struct RunContext {
    progress: Arc<Mutex<Progress>>,
    shutdown_latch: Arc<RwLock<()>>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self {
            progress: Arc::new(Mutex::new(Progress::default())),
            shutdown_latch: Arc::new(RwLock::new(())),
        }
    }

    pub fn set_total(&self, total: u64) {
        self.progress.lock().expect("progress mutex poisoned").dirs_total = total;
    }

    pub fn report_dir(&self, path: PathBuf) {
        let mut guard = self.progress.lock().expect("progress mutex poisoned");
        guard.current_path = Some(path);
        guard.dirs_done += 1;
    }

    pub fn snapshot(&self) -> Progress {
        self.progress.lock().expect("progress mutex poisoned").clone()
    }

    /// Held for the duration of one manifest write so a concurrent shutdown
    /// request blocks until that write completes.
    pub fn begin_write(&self) -> std::sync::RwLockReadGuard<'_, ()> {
        self.shutdown_latch.read().expect("shutdown latch poisoned")
    }

    /// Blocks until no write is in flight, then marks the run as exiting.
    pub fn request_shutdown(&self) {
        let _guard = self.shutdown_latch.write().expect("shutdown latch poisoned");
    }
}
