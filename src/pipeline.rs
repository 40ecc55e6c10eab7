//! NarrationPipeline: one run from raw text to an encoded video.
//!
//! Segmentation, concurrent synthesis, caption and bumper rendering, timeline layout and
//! composition run in that order. Every temporary file, directory and decoded audio handle is
//! owned by a per-run [`ResourceManager`] that is released on every exit path.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::caption::{
    BackgroundFit, CaptionRenderer, CaptionStyle, load_background_image,
};
use crate::compose::{Compositor, ProgressObserver, RenderStats, render_to_file};
use crate::config::{BackgroundMedia, NarrationConfig};
use crate::encode::sink::FrameSink;
use crate::foundation::core::FrameRGBA;
use crate::foundation::error::{NarrateError, NarrateResult};
use crate::media::MediaCodec;
use crate::resources::ResourceManager;
use crate::segment::{Segment, segment};
use crate::speech::provider::SpeechProvider;
use crate::speech::retry::Sleep;
use crate::speech::synth::SpeechSynthesizer;
use crate::timeline::{BackgroundVideo, ClipVisual, build_timeline};

/// Outcome of a successful run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    /// Final video path (the configured output path, also for sink renders).
    pub output: PathBuf,
    /// Number of narrated segments.
    pub segments: usize,
    /// Total video duration in seconds, bumper included.
    pub duration_secs: f64,
    pub stats: RenderStats,
}

/// Orchestrates a narration run with one explicit configuration.
pub struct NarrationPipeline {
    config: NarrationConfig,
    provider: Arc<dyn SpeechProvider>,
    codec: Arc<dyn MediaCodec>,
    sleeper: Option<Arc<dyn Sleep>>,
    work_root: PathBuf,
}

impl NarrationPipeline {
    pub fn new(
        config: NarrationConfig,
        provider: Arc<dyn SpeechProvider>,
        codec: Arc<dyn MediaCodec>,
    ) -> Self {
        Self {
            config,
            provider,
            codec,
            sleeper: None,
            work_root: std::env::temp_dir(),
        }
    }

    /// Replace the retry backoff sleeper.
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleep>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    /// Directory under which the per-run working directory is created.
    pub fn with_work_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_root = dir.into();
        self
    }

    pub fn config(&self) -> &NarrationConfig {
        &self.config
    }

    /// Narrate `text` into `config.output_path()` through `ffmpeg`.
    ///
    /// On failure no output file is left behind and all temporaries are removed.
    pub fn run(&self, text: &str, progress: &mut dyn ProgressObserver) -> NarrateResult<RunReport> {
        let output = self.config.output_path();
        let encoding = &self.config.encoding;
        self.execute(text, progress, |compositor, timeline, resources, work_dir, progress| {
            render_to_file(
                compositor, timeline, &output, encoding, resources, work_dir, progress,
            )
        })
    }

    /// Narrate `text` into an arbitrary [`FrameSink`].
    pub fn run_to_sink(
        &self,
        text: &str,
        sink: &mut dyn FrameSink,
        progress: &mut dyn ProgressObserver,
    ) -> NarrateResult<RunReport> {
        self.execute(text, progress, |compositor, timeline, resources, work_dir, progress| {
            compositor.render(timeline, sink, resources, work_dir, progress)
        })
    }

    fn execute<R>(
        &self,
        text: &str,
        progress: &mut dyn ProgressObserver,
        render: R,
    ) -> NarrateResult<RunReport>
    where
        R: FnOnce(
            &Compositor,
            &crate::timeline::Timeline,
            &ResourceManager,
            &Path,
            &mut dyn ProgressObserver,
        ) -> NarrateResult<RenderStats>,
    {
        let cfg = &self.config;
        cfg.validate()?;

        let segments = segment(text, cfg.max_segment_len);
        if segments.is_empty() {
            return Err(NarrateError::segmentation("input text has no speakable content"));
        }
        tracing::info!(segments = segments.len(), voice = %cfg.voice, "starting narration run");

        let resources = ResourceManager::new();
        let _scope = resources.scope();
        let work_dir = create_work_dir(&self.work_root)?;
        resources.register_dir(&work_dir);

        let mut synthesizer = SpeechSynthesizer::new(
            self.provider.clone(),
            self.codec.clone(),
            cfg.voice,
            &work_dir,
        )
        .with_policy(cfg.speech.retry_policy());
        if let Some(sleeper) = self.sleeper.clone() {
            synthesizer = synthesizer.with_sleeper(sleeper);
        }
        let audios = synthesizer.synthesize_all(&segments, &resources, cfg.concurrency)?;

        let mut renderer = CaptionRenderer::from_font_path(cfg.canvas, cfg.font_path.as_deref());
        let style = CaptionStyle::from_config(cfg);
        let (captions, background) = self.render_captions(&mut renderer, &style, &segments)?;
        let bumper = renderer.render_bumper(&cfg.bumper)?;

        let timeline = build_timeline(
            &segments,
            audios,
            captions,
            Arc::new(bumper),
            cfg.bumper.duration_secs,
            background,
        )?;

        let compositor = Compositor::new(self.codec.clone(), cfg.canvas, cfg.encoding.fps);
        let stats = render(&compositor, &timeline, &resources, &work_dir, progress)?;

        tracing::info!(
            output = %cfg.output_path().display(),
            duration_secs = timeline.total_duration,
            frames = stats.frames_total,
            "narration run finished"
        );
        Ok(RunReport {
            output: cfg.output_path(),
            segments: segments.len(),
            duration_secs: timeline.total_duration,
            stats,
        })
    }

    /// One caption visual per segment, plus the background video track input if any.
    fn render_captions(
        &self,
        renderer: &mut CaptionRenderer,
        style: &CaptionStyle,
        segments: &[Segment],
    ) -> NarrateResult<(Vec<ClipVisual>, Option<BackgroundVideo>)> {
        let cfg = &self.config;
        let fit = BackgroundFit::from_stretch(cfg.stretch_background);
        let fill = style.fill_color;

        match &cfg.background {
            BackgroundMedia::Video(path) => match self.codec.probe_video(path) {
                Ok(source) => {
                    let overlays = segments
                        .iter()
                        .map(|s| {
                            renderer
                                .render_overlay(&s.text, style, true)
                                .map(|f| ClipVisual::Overlay(Arc::new(f)))
                        })
                        .collect::<NarrateResult<Vec<_>>>()?;
                    return Ok((overlays, Some(BackgroundVideo { source, fit, fill })));
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), "background video unusable, using solid fill: {e}")
                }
            },
            BackgroundMedia::Image(_) | BackgroundMedia::None => {}
        }

        let image: Option<FrameRGBA> = match &cfg.background {
            BackgroundMedia::Image(path) => {
                match load_background_image(path, cfg.canvas, fill, fit) {
                    Ok(frame) => Some(frame),
                    Err(e) => {
                        tracing::warn!("{e}; using solid fill");
                        None
                    }
                }
            }
            _ => None,
        };

        let stills = segments
            .iter()
            .map(|s| {
                renderer
                    .render_caption(&s.text, style, image.as_ref())
                    .map(|f| ClipVisual::Still(Arc::new(f)))
            })
            .collect::<NarrateResult<Vec<_>>>()?;
        Ok((stills, None))
    }
}

fn create_work_dir(root: &Path) -> NarrateResult<PathBuf> {
    let dir = root.join(format!(
        "narrate_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0)
    ));
    std::fs::create_dir_all(&dir).map_err(|e| {
        NarrateError::render(format!(
            "failed to create working directory '{}': {e}",
            dir.display()
        ))
    })?;
    Ok(dir)
}
