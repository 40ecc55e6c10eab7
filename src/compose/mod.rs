//! Compositor/Renderer: turns a [`Timeline`] into an ordered frame stream plus a narration mix
//! and hands both to a [`FrameSink`].

pub mod mix;
pub mod progress;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::caption::fit_raw_frame;
use crate::config::EncodingConfig;
use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts, ensure_parent_dir};
use crate::encode::sink::{AudioInputConfig, FrameSink, SinkConfig};
use crate::foundation::core::{Canvas, Fps, FrameIndex, FrameRGBA, Rgba8};
use crate::foundation::error::{NarrateError, NarrateResult};
use crate::foundation::math::premul_over_in_place;
use crate::media::{AudioPcm, MIX_SAMPLE_RATE, MediaCodec};
use crate::resources::ResourceManager;
use crate::timeline::{BackgroundTrack, ClipVisual, Timeline};

pub use progress::{NoProgress, ProgressObserver};
use progress::ProgressTracker;

/// Background video frames decoded per codec call.
const BACKGROUND_BATCH_FRAMES: u32 = 48;
/// File name of the narration mix inside the work directory.
pub const MIX_FILE_NAME: &str = "narration_mix.f32le";
/// File name of the in-progress encode inside the work directory.
pub const ENCODE_FILE_NAME: &str = "narration_encode.mp4";

/// Summary of a finished render.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RenderStats {
    /// Frames pushed to the sink.
    pub frames_total: u64,
    /// Timeline duration in seconds.
    pub duration_secs: f64,
    /// Background video frames decoded through the codec.
    pub background_frames_decoded: u64,
}

/// Single-threaded frame producer for one canvas and frame rate.
pub struct Compositor {
    codec: Arc<dyn MediaCodec>,
    canvas: Canvas,
    fps: Fps,
}

impl Compositor {
    pub fn new(codec: Arc<dyn MediaCodec>, canvas: Canvas, fps: Fps) -> Self {
        Self { codec, canvas, fps }
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn fps(&self) -> Fps {
        self.fps
    }

    /// Render `timeline` into `sink`.
    ///
    /// Emits `ceil(total * fps)` frames; frame `f` shows the clip covering `f / fps`. The
    /// narration mix is written into `work_dir` and registered with `resources`.
    pub fn render(
        &self,
        timeline: &Timeline,
        sink: &mut dyn FrameSink,
        resources: &ResourceManager,
        work_dir: &Path,
        progress: &mut dyn ProgressObserver,
    ) -> NarrateResult<RenderStats> {
        if timeline.clips.is_empty() {
            return Err(NarrateError::render("timeline has no clips"));
        }
        let frames_total = self.fps.secs_to_frames_ceil(timeline.total_duration);
        tracing::info!(
            frames = frames_total,
            duration_secs = timeline.total_duration,
            "rendering"
        );

        let audio = self.write_narration_mix(timeline, resources, work_dir)?;
        sink.begin(SinkConfig {
            width: self.canvas.width,
            height: self.canvas.height,
            fps: self.fps,
            audio,
        })?;

        let fill = timeline.background.as_ref().map_or(Rgba8::BLACK, |bg| bg.fill);
        let mut tracker = ProgressTracker::new(progress, frames_total);
        tracker.update(0);
        let mut background = timeline
            .background
            .as_ref()
            .map(|track| BackgroundFrames::new(track, self.codec.as_ref(), self.canvas, self.fps));

        for f in 0..frames_total {
            let idx = FrameIndex(f);
            let t = self.fps.frame_to_secs(idx);
            let Some((_, clip)) = timeline.clip_at(t) else {
                return Err(NarrateError::render(format!("no clip covers {t:.3}s")));
            };
            match &clip.visual {
                ClipVisual::Still(frame) => {
                    self.check_size(frame)?;
                    sink.push_frame(idx, frame)?;
                }
                ClipVisual::Overlay(overlay) => {
                    self.check_size(overlay)?;
                    let mut base = match background.as_mut() {
                        Some(bg) => bg.frame_at(t)?,
                        None => None,
                    }
                    .map(|f| f.as_ref().clone())
                    .unwrap_or_else(|| FrameRGBA::solid(self.canvas, fill));
                    premul_over_in_place(&mut base.data, &overlay.data);
                    sink.push_frame(idx, &base)?;
                }
            }
            tracker.update(f + 1);
        }

        sink.end()?;
        tracker.finish();

        Ok(RenderStats {
            frames_total,
            duration_secs: timeline.total_duration,
            background_frames_decoded: background.map_or(0, |bg| bg.decoded),
        })
    }

    fn check_size(&self, frame: &FrameRGBA) -> NarrateResult<()> {
        if frame.canvas() != self.canvas || frame.data.len() != self.canvas.rgba_len() {
            return Err(NarrateError::render(format!(
                "clip frame is {}x{}, canvas is {}x{}",
                frame.width, frame.height, self.canvas.width, self.canvas.height
            )));
        }
        Ok(())
    }

    fn write_narration_mix(
        &self,
        timeline: &Timeline,
        resources: &ResourceManager,
        work_dir: &Path,
    ) -> NarrateResult<Option<AudioInputConfig>> {
        let mut held: Vec<(f64, Arc<AudioPcm>)> = Vec::new();
        for clip in &timeline.clips {
            if let Some(audio) = clip.audio.as_ref() {
                held.push((clip.start, audio.audio.pcm()?));
            }
        }
        if held.is_empty() {
            return Ok(None);
        }

        let placements: Vec<(f64, &AudioPcm)> =
            held.iter().map(|(start, pcm)| (*start, pcm.as_ref())).collect();
        let samples = mix::mix_placements(&placements, timeline.total_duration, MIX_SAMPLE_RATE)?;

        let path: PathBuf = work_dir.join(MIX_FILE_NAME);
        resources.register_path(&path);
        mix::write_mix_to_f32le_file(&samples, &path)?;
        tracing::debug!(path = %path.display(), clips = held.len(), "narration mix written");

        Ok(Some(AudioInputConfig {
            path,
            sample_rate: MIX_SAMPLE_RATE,
            channels: mix::MIX_CHANNELS,
        }))
    }
}

/// Decoded, canvas-fitted background frames, fetched from the codec in batches.
struct BackgroundFrames<'a> {
    track: &'a BackgroundTrack,
    codec: &'a dyn MediaCodec,
    canvas: Canvas,
    fps: Fps,
    batch_start: u64,
    batch: Vec<Arc<FrameRGBA>>,
    decoded: u64,
}

impl<'a> BackgroundFrames<'a> {
    fn new(track: &'a BackgroundTrack, codec: &'a dyn MediaCodec, canvas: Canvas, fps: Fps) -> Self {
        Self {
            track,
            codec,
            canvas,
            fps,
            batch_start: 0,
            batch: Vec::new(),
            decoded: 0,
        }
    }

    /// Fitted background frame for timeline time `t`, or `None` outside the track.
    fn frame_at(&mut self, t: f64) -> NarrateResult<Option<Arc<FrameRGBA>>> {
        let Some(src_t) = self.track.source_time_at(t) else {
            return Ok(None);
        };
        let n = (src_t * self.fps.as_f64() + 1e-9).floor().max(0.0) as u64;
        let cached = n >= self.batch_start && n < self.batch_start + self.batch.len() as u64;
        if !cached {
            self.load_batch(n)?;
        }
        if self.batch.is_empty() {
            return Ok(None);
        }
        // Streams can end a frame early; hold the last decoded frame.
        let i = ((n - self.batch_start) as usize).min(self.batch.len() - 1);
        Ok(Some(self.batch[i].clone()))
    }

    fn load_batch(&mut self, start: u64) -> NarrateResult<()> {
        let src = &self.track.source;
        let raw = self.codec.decode_video_frames(
            src,
            self.fps.frame_to_secs(FrameIndex(start)),
            BACKGROUND_BATCH_FRAMES,
            self.fps,
        )?;
        if raw.is_empty() && !self.batch.is_empty() {
            // Keep the previous batch's last frame instead of flashing the fill color.
            let last = self.batch[self.batch.len() - 1].clone();
            self.batch = vec![last];
            self.batch_start = start;
            return Ok(());
        }
        self.decoded += raw.len() as u64;
        self.batch = raw
            .into_iter()
            .map(|bytes| {
                fit_raw_frame(
                    bytes,
                    src.width,
                    src.height,
                    self.canvas,
                    self.track.fill,
                    self.track.fit,
                )
                .map(Arc::new)
            })
            .collect::<NarrateResult<Vec<_>>>()?;
        self.batch_start = start;
        Ok(())
    }
}

/// Render `timeline` to an MP4 at `output` through `ffmpeg`.
///
/// The encoder writes [`ENCODE_FILE_NAME`] inside `work_dir`, registered with `resources`;
/// `output` is only replaced once encoding has finished. A failed render never touches an
/// existing file at `output`.
#[allow(clippy::too_many_arguments)]
pub fn render_to_file(
    compositor: &Compositor,
    timeline: &Timeline,
    output: &Path,
    encoding: &EncodingConfig,
    resources: &ResourceManager,
    work_dir: &Path,
    progress: &mut dyn ProgressObserver,
) -> NarrateResult<RenderStats> {
    let staged = work_dir.join(ENCODE_FILE_NAME);
    resources.register_path(&staged);

    let mut sink = FfmpegSink::new(FfmpegSinkOpts::new(&staged, encoding));
    let res = compositor.render(timeline, &mut sink, resources, work_dir, progress);
    drop(sink);

    let stats = res?;
    publish(&staged, output)?;
    tracing::debug!(path = %output.display(), "published encoded video");
    Ok(stats)
}

/// Move `staged` onto `dst`, copying when the two live on different filesystems.
fn publish(staged: &Path, dst: &Path) -> NarrateResult<()> {
    ensure_parent_dir(dst)?;
    if std::fs::rename(staged, dst).is_ok() {
        return Ok(());
    }
    if let Err(e) = std::fs::copy(staged, dst) {
        if let Err(io) = std::fs::remove_file(dst)
            && io.kind() != std::io::ErrorKind::NotFound
        {
            tracing::warn!(path = %dst.display(), "failed to remove partial output: {io}");
        }
        return Err(NarrateError::render(format!(
            "failed to write output '{}': {e}",
            dst.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/compose.rs"]
mod tests;
