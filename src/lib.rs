//! narrate turns a block of prose into a narrated video.
//!
//! Text is split into speakable segments, each segment is synthesized to speech through a
//! [`SpeechProvider`], captions are rasterized over a solid fill, an image or a looping
//! background video, and everything is laid out on a [`Timeline`] that the [`Compositor`]
//! encodes together with a closing bumper card.
//!
//! - Build a [`NarrationConfig`] (or load one from JSON)
//! - Create a [`NarrationPipeline`] with a provider and a [`MediaCodec`]
//! - Call [`NarrationPipeline::run`] with the text and a [`ProgressObserver`]
#![forbid(unsafe_code)]

mod foundation;

/// Caption, background and bumper rasterization.
pub mod caption;
/// Timeline composition, narration mix and progress reporting.
pub mod compose;
pub mod config;
/// Encoding sinks.
pub mod encode;
pub mod media;
pub mod pipeline;
pub mod resources;
pub mod segment;
pub mod speech;
pub mod timeline;

pub use crate::foundation::color::ColorDef;
pub use crate::foundation::core::{Canvas, Fps, FrameIndex, FrameRGBA, Rgba8};
pub use crate::foundation::error::{NarrateError, NarrateResult};

pub use crate::caption::{BackgroundFit, CaptionRenderer, CaptionStyle};
pub use crate::compose::{Compositor, NoProgress, ProgressObserver, RenderStats, render_to_file};
pub use crate::config::{BackgroundMedia, BumperConfig, EncodingConfig, NarrationConfig};
pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
pub use crate::encode::sink::{AudioInputConfig, FrameSink, InMemorySink, SinkConfig};
pub use crate::media::{AudioPcm, FfmpegCodec, MediaCodec, VideoSourceInfo};
pub use crate::pipeline::{NarrationPipeline, RunReport};
pub use crate::resources::{MediaHandle, ReleaseReport, ResourceManager, ResourceScope};
pub use crate::segment::{Segment, segment};
pub use crate::speech::google::GoogleTtsProvider;
pub use crate::speech::{
    ProviderError, RetryPolicy, SpeechProvider, SpeechRequest, SpeechSynthesizer,
    SynthesizedAudio, Voice,
};
pub use crate::timeline::{Timeline, build_timeline, loop_spans};
