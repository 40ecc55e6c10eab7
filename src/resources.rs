//! Temporary resource tracking for one narration run.
//!
//! Every temporary file, working directory and decoded-media handle allocated during a run is
//! registered here. [`ResourceManager::release_all`] drains the set exactly once: handles are
//! closed first, then files are deleted, then directories are removed. Individual failures are
//! logged and never propagated.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::foundation::error::{NarrateError, NarrateResult};

/// A decoded-media resource that must be closed before its backing files are deleted.
pub trait MediaHandle: Send {
    /// Short label used in log events.
    fn describe(&self) -> String;
    /// Release the handle. Called at most once by the manager.
    fn close(&mut self) -> NarrateResult<()>;
}

/// Outcome of a [`ResourceManager::release_all`] pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReleaseReport {
    /// Handles closed without error.
    pub handles_closed: usize,
    /// Files that existed and were deleted.
    pub files_removed: usize,
    /// Directories that existed and were removed.
    pub dirs_removed: usize,
    /// Human-readable descriptions of every failure that was swallowed.
    pub failures: Vec<String>,
}

impl ReleaseReport {
    /// `true` when the pass touched nothing at all.
    pub fn is_noop(&self) -> bool {
        self.handles_closed == 0
            && self.files_removed == 0
            && self.dirs_removed == 0
            && self.failures.is_empty()
    }
}

#[derive(Default)]
struct ResourceState {
    files: Vec<PathBuf>,
    dirs: Vec<PathBuf>,
    handles: Vec<Box<dyn MediaHandle>>,
    released: bool,
}

/// Thread-safe, append-only registry of temporary resources.
///
/// Registration may happen concurrently from synthesis workers. Draining must happen after
/// all workers have joined.
#[derive(Default)]
pub struct ResourceManager {
    state: Mutex<ResourceState>,
}

impl std::fmt::Debug for ResourceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.lock();
        f.debug_struct("ResourceManager")
            .field("files", &st.files)
            .field("dirs", &st.dirs)
            .field("handles", &st.handles.len())
            .field("released", &st.released)
            .finish()
    }
}

impl ResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ResourceState> {
        // A panicking worker must not prevent cleanup.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a temporary file for deletion.
    pub fn register_path(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        let mut st = self.lock();
        if st.released {
            drop(st);
            tracing::warn!(path = %path.display(), "file registered after release; deleting now");
            let mut report = ReleaseReport::default();
            remove_file(&path, &mut report);
            return;
        }
        st.files.push(path);
    }

    /// Register a temporary directory; directories are removed recursively after all files.
    pub fn register_dir(&self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        let mut st = self.lock();
        if st.released {
            drop(st);
            tracing::warn!(dir = %dir.display(), "directory registered after release; removing now");
            let mut report = ReleaseReport::default();
            remove_dir(&dir, &mut report);
            return;
        }
        st.dirs.push(dir);
    }

    /// Register a decoded-media handle to be closed before files are deleted.
    pub fn register_handle(&self, handle: Box<dyn MediaHandle>) {
        let mut st = self.lock();
        if st.released {
            drop(st);
            let mut handle = handle;
            tracing::warn!(handle = %handle.describe(), "handle registered after release; closing now");
            let mut report = ReleaseReport::default();
            close_handle(handle.as_mut(), &mut report);
            return;
        }
        st.handles.push(handle);
    }

    /// Number of resources still waiting for release.
    pub fn pending(&self) -> usize {
        let st = self.lock();
        st.files.len() + st.dirs.len() + st.handles.len()
    }

    /// Whether [`Self::release_all`] has already run.
    pub fn is_released(&self) -> bool {
        self.lock().released
    }

    /// Close all handles, then delete all files, then remove all directories.
    ///
    /// Idempotent: every call after the first returns an empty report and touches nothing.
    /// Never fails; individual failures are logged and collected in the report.
    pub fn release_all(&self) -> ReleaseReport {
        let (mut handles, files, dirs) = {
            let mut st = self.lock();
            if st.released {
                return ReleaseReport::default();
            }
            st.released = true;
            (
                std::mem::take(&mut st.handles),
                std::mem::take(&mut st.files),
                std::mem::take(&mut st.dirs),
            )
        };

        let mut report = ReleaseReport::default();
        for handle in handles.iter_mut() {
            close_handle(handle.as_mut(), &mut report);
        }
        drop(handles);
        for path in &files {
            remove_file(path, &mut report);
        }
        for dir in &dirs {
            remove_dir(dir, &mut report);
        }

        tracing::debug!(
            handles = report.handles_closed,
            files = report.files_removed,
            dirs = report.dirs_removed,
            failures = report.failures.len(),
            "released run resources"
        );
        report
    }

    /// Guard that calls [`Self::release_all`] when dropped.
    pub fn scope(&self) -> ResourceScope<'_> {
        ResourceScope { manager: self }
    }
}

/// Scoped acquisition guard: releases every registered resource when it goes out of scope,
/// including on early returns and unwinding.
pub struct ResourceScope<'a> {
    manager: &'a ResourceManager,
}

impl ResourceScope<'_> {
    pub fn manager(&self) -> &ResourceManager {
        self.manager
    }
}

impl Drop for ResourceScope<'_> {
    fn drop(&mut self) {
        let _ = self.manager.release_all();
    }
}

fn close_handle(handle: &mut dyn MediaHandle, report: &mut ReleaseReport) {
    match handle.close() {
        Ok(()) => report.handles_closed += 1,
        Err(e) => {
            let err = NarrateError::resource(format!(
                "failed to close '{}': {e}",
                handle.describe()
            ));
            tracing::warn!("{err}");
            report.failures.push(err.to_string());
        }
    }
}

fn remove_file(path: &Path, report: &mut ReleaseReport) {
    match std::fs::remove_file(path) {
        Ok(()) => report.files_removed += 1,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            let err = NarrateError::resource(format!(
                "failed to delete '{}': {e}",
                path.display()
            ));
            tracing::warn!("{err}");
            report.failures.push(err.to_string());
        }
    }
}

fn remove_dir(dir: &Path, report: &mut ReleaseReport) {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => report.dirs_removed += 1,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            let err = NarrateError::resource(format!(
                "failed to remove directory '{}': {e}",
                dir.display()
            ));
            tracing::warn!("{err}");
            report.failures.push(err.to_string());
        }
    }
}

#[cfg(test)]
#[path = "../tests/unit/resources.rs"]
mod tests;
