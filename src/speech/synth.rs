use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;

use crate::foundation::error::{NarrateError, NarrateResult};
use crate::media::{DecodedAudio, MIX_SAMPLE_RATE, MediaCodec};
use crate::resources::ResourceManager;
use crate::segment::Segment;
use crate::speech::provider::{AudioEncoding, ProviderError, SpeechProvider, SpeechRequest};
use crate::speech::retry::{RetryError, RetryPolicy, Sleep, ThreadSleep};
use crate::speech::voices::Voice;

/// Default number of concurrent synthesis workers.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// One segment's narration: persisted audio plus its exact decoded duration.
#[derive(Clone, Debug)]
pub struct SynthesizedAudio {
    /// Index of the [`Segment`] this audio narrates.
    pub segment_index: usize,
    /// Duration in seconds derived from the decoded samples; always `> 0`.
    pub duration_secs: f64,
    /// Temporary file holding the provider's encoded audio.
    pub path: PathBuf,
    /// Decoded PCM, released by the [`ResourceManager`] at the end of the run.
    pub audio: DecodedAudio,
}

/// Calls the speech provider per segment with retry, persists and decodes the result.
pub struct SpeechSynthesizer {
    provider: Arc<dyn SpeechProvider>,
    codec: Arc<dyn MediaCodec>,
    voice: Voice,
    encoding: AudioEncoding,
    work_dir: PathBuf,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleep>,
}

impl SpeechSynthesizer {
    pub fn new(
        provider: Arc<dyn SpeechProvider>,
        codec: Arc<dyn MediaCodec>,
        voice: Voice,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            provider,
            codec,
            voice,
            encoding: AudioEncoding::Mp3,
            work_dir: work_dir.into(),
            policy: RetryPolicy::default(),
            sleeper: Arc::new(ThreadSleep),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleep>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_encoding(mut self, encoding: AudioEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Per-segment temporary audio path; unique per index so workers never collide.
    pub fn temp_audio_path(&self, index: usize) -> PathBuf {
        self.work_dir
            .join(format!("temp_audio_{index}.{}", self.encoding.extension()))
    }

    /// Request audio for `text`, retrying only on rate limiting.
    pub fn request_audio(&self, text: &str) -> NarrateResult<Vec<u8>> {
        let request = SpeechRequest {
            text,
            voice: self.voice,
            encoding: self.encoding,
        };
        let provider = self.provider.as_ref();
        self.policy
            .run(self.sleeper.as_ref(), ProviderError::is_rate_limit, |attempt| {
                provider.synthesize(&request).inspect_err(|e| {
                    if e.is_rate_limit() {
                        tracing::warn!(attempt, provider = provider.name(), "{e}");
                    }
                })
            })
            .map_err(|e| match e {
                RetryError::Exhausted { attempts, last } => NarrateError::synthesis(format!(
                    "maximum retries reached after {attempts} attempts: {last}"
                )),
                RetryError::Fatal { error, .. } => NarrateError::synthesis(error.to_string()),
            })
    }

    /// Synthesize one segment: request audio, persist it to its temporary file, decode it and
    /// measure its exact duration.
    #[tracing::instrument(skip_all, fields(segment = segment.index))]
    pub fn synthesize(
        &self,
        segment: &Segment,
        resources: &ResourceManager,
    ) -> NarrateResult<SynthesizedAudio> {
        tracing::info!(chars = segment.char_len(), "synthesizing segment");
        let bytes = self
            .request_audio(&segment.text)
            .map_err(|e| with_segment(e, segment.index))?;
        if bytes.is_empty() {
            return Err(NarrateError::synthesis(format!(
                "segment {}: provider returned no audio",
                segment.index
            )));
        }

        let path = self.temp_audio_path(segment.index);
        // Registered before writing so a partial file is still cleaned up.
        resources.register_path(&path);
        std::fs::write(&path, &bytes).map_err(|e| {
            NarrateError::synthesis(format!(
                "segment {}: failed to write '{}': {e}",
                segment.index,
                path.display()
            ))
        })?;

        let pcm = self
            .codec
            .decode_audio(&path, MIX_SAMPLE_RATE)
            .map_err(|e| {
                NarrateError::synthesis(format!(
                    "segment {}: failed to decode synthesized audio: {e}",
                    segment.index
                ))
            })?;
        let duration_secs = pcm.duration_secs();
        if !(duration_secs.is_finite() && duration_secs > 0.0) {
            return Err(NarrateError::synthesis(format!(
                "segment {}: synthesized audio has no samples",
                segment.index
            )));
        }

        let audio = DecodedAudio::new(format!("segment-{}-audio", segment.index), pcm);
        resources.register_handle(Box::new(audio.clone()));
        tracing::debug!(duration_secs, "segment synthesized");

        Ok(SynthesizedAudio {
            segment_index: segment.index,
            duration_secs,
            path,
            audio,
        })
    }

    /// Synthesize every segment on a pool of `concurrency` workers.
    ///
    /// Results come back in segment order regardless of completion order. The first failure
    /// aborts the batch; the call returns only after all in-flight workers have finished.
    pub fn synthesize_all(
        &self,
        segments: &[Segment],
        resources: &ResourceManager,
        concurrency: usize,
    ) -> NarrateResult<Vec<SynthesizedAudio>> {
        let pool = build_thread_pool(concurrency)?;
        let audios = pool.install(|| {
            segments
                .par_iter()
                .map(|segment| self.synthesize(segment, resources))
                .collect::<NarrateResult<Vec<_>>>()
        })?;

        for (segment, audio) in segments.iter().zip(&audios) {
            if segment.index != audio.segment_index {
                return Err(NarrateError::synthesis(format!(
                    "internal error: audio for segment {} collected at position of segment {}",
                    audio.segment_index, segment.index
                )));
            }
        }
        Ok(audios)
    }
}

fn with_segment(err: NarrateError, index: usize) -> NarrateError {
    match err {
        NarrateError::Synthesis(msg) => NarrateError::synthesis(format!("segment {index}: {msg}")),
        other => other,
    }
}

fn build_thread_pool(threads: usize) -> NarrateResult<rayon::ThreadPool> {
    if threads == 0 {
        return Err(NarrateError::validation(
            "synthesis concurrency must be >= 1",
        ));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("narrate-tts-{i}"))
        .build()
        .map_err(|e| NarrateError::synthesis(format!("failed to build worker pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/speech/synth.rs"]
mod tests;
