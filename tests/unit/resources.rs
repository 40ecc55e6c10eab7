use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;

struct CountingHandle {
    closes: Arc<AtomicUsize>,
    // Observed number of files still on disk when `close` ran.
    file_seen: Option<(PathBuf, Arc<AtomicUsize>)>,
    fail: bool,
}

impl MediaHandle for CountingHandle {
    fn describe(&self) -> String {
        "counting".to_string()
    }

    fn close(&mut self) -> NarrateResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if let Some((path, seen)) = &self.file_seen
            && path.exists()
        {
            seen.fetch_add(1, Ordering::SeqCst);
        }
        if self.fail {
            return Err(NarrateError::resource("stuck"));
        }
        Ok(())
    }
}

fn touch(path: &Path) {
    std::fs::write(path, b"x").unwrap();
}

#[test]
fn release_all_closes_handles_before_deleting_files() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("temp_audio_0.mp3");
    touch(&file);

    let closes = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(AtomicUsize::new(0));
    let mgr = ResourceManager::new();
    mgr.register_path(&file);
    mgr.register_handle(Box::new(CountingHandle {
        closes: closes.clone(),
        file_seen: Some((file.clone(), seen.clone())),
        fail: false,
    }));
    assert_eq!(mgr.pending(), 2);

    let report = mgr.release_all();
    assert_eq!(report.handles_closed, 1);
    assert_eq!(report.files_removed, 1);
    assert!(report.failures.is_empty());
    assert_eq!(seen.load(Ordering::SeqCst), 1, "file must still exist at close time");
    assert!(!file.exists());
    assert_eq!(mgr.pending(), 0);
}

#[test]
fn release_all_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("a.bin");
    touch(&file);

    let closes = Arc::new(AtomicUsize::new(0));
    let mgr = ResourceManager::new();
    mgr.register_path(&file);
    mgr.register_handle(Box::new(CountingHandle {
        closes: closes.clone(),
        file_seen: None,
        fail: false,
    }));

    let first = mgr.release_all();
    assert!(!first.is_noop());
    let second = mgr.release_all();
    assert!(second.is_noop());
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert!(mgr.is_released());
}

#[test]
fn one_failure_does_not_block_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.bin");
    touch(&good);
    // A non-empty directory registered as a file cannot be removed with `remove_file`.
    let stuck = dir.path().join("stuck");
    std::fs::create_dir(&stuck).unwrap();
    touch(&stuck.join("inner"));

    let closes = Arc::new(AtomicUsize::new(0));
    let mgr = ResourceManager::new();
    mgr.register_handle(Box::new(CountingHandle {
        closes: closes.clone(),
        file_seen: None,
        fail: true,
    }));
    mgr.register_path(&stuck);
    mgr.register_path(&good);

    let report = mgr.release_all();
    assert_eq!(report.failures.len(), 2);
    assert_eq!(report.files_removed, 1);
    assert!(!good.exists());
    assert!(report.failures.iter().all(|f| f.contains("resource error:")));
}

#[test]
fn missing_files_are_not_failures() {
    let dir = tempfile::tempdir().unwrap();
    let mgr = ResourceManager::new();
    mgr.register_path(dir.path().join("never_written.mp3"));
    let report = mgr.release_all();
    assert!(report.failures.is_empty());
    assert_eq!(report.files_removed, 0);
}

#[test]
fn directories_are_removed_after_files() {
    let root = tempfile::tempdir().unwrap();
    let work = root.path().join("run");
    std::fs::create_dir(&work).unwrap();
    let file = work.join("temp_audio_1.mp3");
    touch(&file);

    let mgr = ResourceManager::new();
    mgr.register_dir(&work);
    mgr.register_path(&file);
    let report = mgr.release_all();
    assert_eq!(report.files_removed, 1);
    assert_eq!(report.dirs_removed, 1);
    assert!(!work.exists());
}

#[test]
fn scope_releases_on_early_return() {
    fn failing_stage(mgr: &ResourceManager, path: &Path) -> NarrateResult<()> {
        let _scope = mgr.scope();
        touch(path);
        mgr.register_path(path);
        Err(NarrateError::synthesis("provider rejected request"))
    }

    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("temp_audio_2.mp3");
    let mgr = ResourceManager::new();
    assert!(failing_stage(&mgr, &file).is_err());
    assert!(!file.exists());
    assert!(mgr.is_released());
}

#[test]
fn registration_after_release_is_released_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("late.mp3");
    touch(&file);

    let mgr = ResourceManager::new();
    let _ = mgr.release_all();
    mgr.register_path(&file);
    assert!(!file.exists());
    assert_eq!(mgr.pending(), 0);
}

#[test]
fn concurrent_registration_is_safe() {
    let mgr = ResourceManager::new();
    std::thread::scope(|s| {
        for t in 0..4 {
            let mgr = &mgr;
            s.spawn(move || {
                for i in 0..25 {
                    mgr.register_path(format!("/nonexistent/narrate/{t}_{i}"));
                }
            });
        }
    });
    assert_eq!(mgr.pending(), 100);
    assert!(mgr.release_all().failures.is_empty());
}
