//! Toolkit invocation plumbing.
//!
//! External fitting toolkits track a "current working file/directory"
//! notion ambiently and are not reentrant-safe across processor
//! boundaries. Every call into a toolkit therefore runs inside a scope
//! guard that snapshots the ambient state on entry and restores it
//! unconditionally on exit, error paths included.

use std::env;
use std::io;
use std::path::PathBuf;

/// Scope guard over the process working directory.
///
/// ```no_run
/// # fn invoke() -> std::io::Result<()> {
/// let _workdir = mva_train::ScopedWorkdir::enter()?;
/// // ... call into the toolkit; the directory is restored on drop,
/// // whether the call returns or errors out.
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ScopedWorkdir {
    saved: PathBuf,
}

impl ScopedWorkdir {
    /// Snapshot the current working directory.
    pub fn enter() -> io::Result<Self> {
        Ok(Self { saved: env::current_dir()? })
    }
}

impl Drop for ScopedWorkdir {
    fn drop(&mut self) {
        if let Err(e) = env::set_current_dir(&self.saved) {
            log::warn!("could not restore working directory {}: {e}", self.saved.display());
        }
    }
}
