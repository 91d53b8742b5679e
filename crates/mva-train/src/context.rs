//! Trainer-side context shared by every processor of one training run.

use std::path::{Path, PathBuf};

use crate::monitor::MonitorStore;

/// Conventional subdirectory for toolkit weights files, relative to the
/// working directory.
pub const WEIGHTS_DIR: &str = "weights";

/// Run-wide state the orchestrator hands into every lifecycle call: run
/// naming, working-file paths, the monitoring switch and the monitor store.
///
/// The context never drives processors itself; ordering and DAG wiring
/// belong to the orchestrator.
#[derive(Debug)]
pub struct TrainerContext {
    name: String,
    work_dir: PathBuf,
    monitoring: bool,
    store: MonitorStore,
}

impl TrainerContext {
    /// Context for one training run, with monitoring enabled.
    pub fn new(name: impl Into<String>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            work_dir: work_dir.into(),
            monitoring: true,
            store: MonitorStore::new(),
        }
    }

    /// Enable or disable monitoring-histogram booking for this run.
    pub fn set_monitoring(&mut self, on: bool) {
        self.monitoring = on;
    }

    /// Training-run name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Directory holding working files and cache files.
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Whether monitoring histograms are booked this run.
    pub fn monitoring(&self) -> bool {
        self.monitoring
    }

    /// Deterministic working-file path for one processor:
    /// `<work_dir>/<run>_<proc>[_<tag>].<ext>`.
    pub fn train_file(&self, proc: &str, ext: &str, tag: Option<&str>) -> PathBuf {
        let mut file = format!("{}_{proc}", self.name);
        if let Some(tag) = tag {
            file.push('_');
            file.push_str(tag);
        }
        file.push('.');
        file.push_str(ext);
        self.work_dir.join(file)
    }

    /// Weights-file path `<work_dir>/weights/<run>_<proc>_<method>.weights.<ext>`.
    pub fn weights_file(&self, proc: &str, method: &str, ext: &str) -> PathBuf {
        self.work_dir
            .join(WEIGHTS_DIR)
            .join(format!("{}_{proc}_{method}.weights.{ext}", self.name))
    }

    /// Exported-dataset table name for one processor.
    pub fn dataset_name(&self, proc: &str) -> String {
        format!("{}_{proc}", self.name)
    }

    /// Finalized monitors published so far.
    pub fn store(&self) -> &MonitorStore {
        &self.store
    }

    /// Mutable access for publishing finalized monitors.
    pub fn store_mut(&mut self) -> &mut MonitorStore {
        &mut self.store
    }
}

/// Remove a working file, ignoring a missing target.
pub(crate) fn remove_file_quiet(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("could not remove {}: {e}", path.display());
        }
    }
}

/// Try to drop the conventional weights subdirectory; non-empty or absent
/// directories are left alone.
pub(crate) fn remove_weights_dir_quiet(ctx: &TrainerContext) {
    let _ = std::fs::remove_dir(ctx.work_dir().join(WEIGHTS_DIR));
}
