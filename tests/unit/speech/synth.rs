use std::collections::HashMap;
use std::sync::{Condvar, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::*;
use crate::foundation::core::Fps;
use crate::media::{AudioPcm, VideoSourceInfo};
use crate::segment::segment;

/// Returns `text.len()` bytes of audio; selected texts are rate limited a number of times or
/// rejected outright.
#[derive(Default)]
struct ScriptedProvider {
    rate_limits: Mutex<HashMap<String, u32>>,
    reject: Option<String>,
    calls: AtomicUsize,
}

impl SpeechProvider for ScriptedProvider {
    fn synthesize(&self, request: &SpeechRequest<'_>) -> Result<Vec<u8>, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.reject.as_deref() == Some(request.text) {
            return Err(ProviderError::Rejected("HTTP 400: bad input".to_string()));
        }
        let mut limits = self.rate_limits.lock().unwrap();
        if let Some(n) = limits.get_mut(request.text) {
            if *n > 0 {
                *n -= 1;
                return Err(ProviderError::RateLimited("HTTP 429".to_string()));
            }
        }
        Ok(request.text.as_bytes().to_vec())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// One tenth of a second of silence per byte of the audio file.
struct ByteLengthCodec;

impl MediaCodec for ByteLengthCodec {
    fn decode_audio(&self, path: &Path, sample_rate: u32) -> NarrateResult<AudioPcm> {
        let len = std::fs::read(path).unwrap().len();
        Ok(AudioPcm {
            sample_rate,
            channels: 2,
            interleaved_f32: vec![0.0; len * (sample_rate as usize / 10) * 2],
        })
    }

    fn probe_video(&self, _path: &Path) -> NarrateResult<VideoSourceInfo> {
        unreachable!()
    }

    fn decode_video_frames(
        &self,
        _source: &VideoSourceInfo,
        _start_sec: f64,
        _count: u32,
        _fps: Fps,
    ) -> NarrateResult<Vec<Vec<u8>>> {
        unreachable!()
    }
}

#[derive(Default)]
struct NoSleep(Mutex<Vec<Duration>>);

impl Sleep for NoSleep {
    fn sleep(&self, duration: Duration) {
        self.0.lock().unwrap().push(duration);
    }
}

fn synthesizer(provider: Arc<ScriptedProvider>, dir: &Path, sleep: Arc<NoSleep>) -> SpeechSynthesizer {
    SpeechSynthesizer::new(provider, Arc::new(ByteLengthCodec), Voice::default(), dir)
        .with_sleeper(sleep)
}

#[test]
fn duration_comes_from_decoded_audio_and_file_is_registered() {
    let dir = tempfile::tempdir().unwrap();
    let resources = ResourceManager::new();
    let synth = synthesizer(
        Arc::new(ScriptedProvider::default()),
        dir.path(),
        Arc::new(NoSleep::default()),
    );
    let seg = Segment {
        index: 3,
        text: "Hola.".to_string(),
    };

    let audio = synth.synthesize(&seg, &resources).unwrap();
    assert_eq!(audio.segment_index, 3);
    assert!((audio.duration_secs - 0.5).abs() < 1e-9);
    assert_eq!(audio.path, dir.path().join("temp_audio_3.mp3"));
    assert!(audio.path.exists());
    assert_eq!(resources.pending(), 2);

    let report = resources.release_all();
    assert_eq!(report.files_removed, 1);
    assert_eq!(report.handles_closed, 1);
    assert!(!audio.path.exists());
    assert!(!audio.audio.is_open());
}

#[test]
fn rate_limited_segment_is_retried_with_backoff() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::default());
    provider
        .rate_limits
        .lock()
        .unwrap()
        .insert("Hola.".to_string(), 2);
    let sleep = Arc::new(NoSleep::default());
    let synth = synthesizer(provider.clone(), dir.path(), sleep.clone());

    let audio = synth
        .synthesize(
            &Segment {
                index: 0,
                text: "Hola.".to_string(),
            },
            &ResourceManager::new(),
        )
        .unwrap();
    assert!(audio.duration_secs > 0.0);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        *sleep.0.lock().unwrap(),
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );
}

#[test]
fn exhausted_retries_become_synthesis_error() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider::default());
    provider
        .rate_limits
        .lock()
        .unwrap()
        .insert("Hola.".to_string(), 10);
    let synth = synthesizer(provider.clone(), dir.path(), Arc::new(NoSleep::default()));

    let err = synth
        .synthesize(
            &Segment {
                index: 1,
                text: "Hola.".to_string(),
            },
            &ResourceManager::new(),
        )
        .unwrap_err();
    assert!(matches!(err, NarrateError::Synthesis(_)));
    assert!(err.to_string().contains("segment 1"));
    assert!(err.to_string().contains("maximum retries"));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
}

#[test]
fn rejected_request_is_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider {
        reject: Some("Hola.".to_string()),
        ..Default::default()
    });
    let sleep = Arc::new(NoSleep::default());
    let synth = synthesizer(provider.clone(), dir.path(), sleep.clone());

    let err = synth
        .synthesize(
            &Segment {
                index: 0,
                text: "Hola.".to_string(),
            },
            &ResourceManager::new(),
        )
        .unwrap_err();
    assert!(err.to_string().starts_with("synthesis error: "));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert!(sleep.0.lock().unwrap().is_empty());
}

/// Holds `held` back until every other request has returned, logging completion order.
struct HoldFirstProvider {
    held: String,
    others: usize,
    returned: Mutex<Vec<String>>,
    released: Condvar,
}

impl SpeechProvider for HoldFirstProvider {
    fn synthesize(&self, request: &SpeechRequest<'_>) -> Result<Vec<u8>, ProviderError> {
        let mut returned = self.returned.lock().unwrap();
        if request.text == self.held {
            returned = self
                .released
                .wait_timeout_while(returned, Duration::from_secs(10), |r| r.len() < self.others)
                .unwrap()
                .0;
        }
        returned.push(request.text.to_string());
        self.released.notify_all();
        Ok(request.text.as_bytes().to_vec())
    }

    fn name(&self) -> &str {
        "hold-first"
    }
}

#[test]
fn batch_results_follow_segment_order() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(HoldFirstProvider {
        held: "Uno.".to_string(),
        others: 3,
        returned: Mutex::new(Vec::new()),
        released: Condvar::new(),
    });
    let synth = SpeechSynthesizer::new(
        provider.clone(),
        Arc::new(ByteLengthCodec),
        Voice::default(),
        dir.path(),
    )
    .with_sleeper(Arc::new(NoSleep::default()));
    let segments = segment("Uno. Dos dos. Tres tres tres. Cuatro.", 5);
    assert_eq!(segments.len(), 4);

    let resources = ResourceManager::new();
    let audios = synth.synthesize_all(&segments, &resources, 4).unwrap();

    // The first segment really completed last.
    let returned = provider.returned.lock().unwrap().clone();
    assert_eq!(returned.len(), 4);
    assert_eq!(returned.last().map(String::as_str), Some("Uno."));

    let order: Vec<usize> = audios.iter().map(|a| a.segment_index).collect();
    assert_eq!(order, vec![0, 1, 2, 3]);
    for (seg, audio) in segments.iter().zip(&audios) {
        let expected = seg.text.len() as f64 * 0.1;
        assert!((audio.duration_secs - expected).abs() < 1e-9);
    }
    resources.release_all();
}

#[test]
fn batch_failure_aborts_and_leaves_cleanup_to_resources() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(ScriptedProvider {
        reject: Some("Dos dos.".to_string()),
        ..Default::default()
    });
    let synth = synthesizer(provider, dir.path(), Arc::new(NoSleep::default()));
    let segments = segment("Uno. Dos dos. Tres tres tres.", 5);

    let resources = ResourceManager::new();
    let err = synth.synthesize_all(&segments, &resources, 2).unwrap_err();
    assert!(matches!(err, NarrateError::Synthesis(_)));
    resources.release_all();
    let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[test]
fn zero_concurrency_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let synth = synthesizer(
        Arc::new(ScriptedProvider::default()),
        dir.path(),
        Arc::new(NoSleep::default()),
    );
    let err = synth
        .synthesize_all(&segment("Hola.", 300), &ResourceManager::new(), 0)
        .unwrap_err();
    assert!(matches!(err, NarrateError::Validation(_)));
}
