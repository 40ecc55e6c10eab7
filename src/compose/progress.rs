use std::sync::mpsc;

/// Receives render progress as a fraction in `[0, 1]`.
pub trait ProgressObserver {
    fn on_progress(&mut self, fraction: f64);
}

impl<F: FnMut(f64)> ProgressObserver for F {
    fn on_progress(&mut self, fraction: f64) {
        self(fraction)
    }
}

impl ProgressObserver for mpsc::Sender<f64> {
    fn on_progress(&mut self, fraction: f64) {
        // A dropped receiver only means nobody is watching anymore.
        let _ = self.send(fraction);
    }
}

/// Observer that ignores every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _fraction: f64) {}
}

/// Forwards `done / total` to an observer, only when the whole percent changes.
///
/// The last event is always exactly `1.0`.
pub(crate) struct ProgressTracker<'a> {
    observer: &'a mut dyn ProgressObserver,
    total: u64,
    last_percent: Option<u64>,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(observer: &'a mut dyn ProgressObserver, total: u64) -> Self {
        Self {
            observer,
            total,
            last_percent: None,
        }
    }

    pub(crate) fn update(&mut self, done: u64) {
        let fraction = if self.total == 0 {
            1.0
        } else {
            (done as f64 / self.total as f64).clamp(0.0, 1.0)
        };
        let percent = (fraction * 100.0).floor() as u64;
        if self.last_percent == Some(percent) {
            return;
        }
        self.last_percent = Some(percent);
        self.observer.on_progress(fraction);
    }

    pub(crate) fn finish(&mut self) {
        if self.last_percent != Some(100) {
            self.last_percent = Some(100);
            self.observer.on_progress(1.0);
        }
    }
}
