//! Run configuration: one explicit [`NarrationConfig`] passed into the pipeline.
//!
//! Every field has a default, so an empty JSON object is a valid config. Values are validated
//! once, before the pipeline starts, and all problems are reported together.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::foundation::color::ColorDef;
use crate::foundation::core::{Canvas, Fps, Rgba8};
use crate::foundation::error::{NarrateError, NarrateResult};
use crate::segment::DEFAULT_MAX_SEGMENT_LEN;
use crate::speech::google::DEFAULT_ENDPOINT;
use crate::speech::retry::{Backoff, RetryPolicy};
use crate::speech::synth::DEFAULT_CONCURRENCY;
use crate::speech::voices::Voice;

pub const MIN_FONT_SIZE: u32 = 10;
pub const MAX_FONT_SIZE: u32 = 100;

/// Optional media shown behind the captions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundMedia {
    #[default]
    None,
    Image(PathBuf),
    Video(PathBuf),
}

/// Output encoding parameters handed to the encoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    pub fps: Fps,
    pub video_codec: String,
    pub audio_codec: String,
    pub preset: String,
    pub threads: u32,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            fps: Fps::default(),
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            preset: "ultrafast".to_string(),
            threads: 4,
        }
    }
}

/// The closing promotional card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BumperConfig {
    pub title: String,
    pub subtitle: String,
    /// File path or `http(s)` URL of a logo drawn in the top-left corner.
    pub logo: Option<String>,
    pub color: ColorDef,
    pub text_color: ColorDef,
    pub title_size: u32,
    pub subtitle_size: u32,
    pub duration_secs: f64,
}

impl Default for BumperConfig {
    fn default() -> Self {
        Self {
            title: "¡SUSCRÍBETE!".to_string(),
            subtitle: "Dale like y activa la campana".to_string(),
            logo: None,
            color: ColorDef::from(Rgba8::opaque(255, 0, 0)),
            text_color: ColorDef::from(Rgba8::WHITE),
            title_size: 60,
            subtitle_size: 30,
            duration_secs: 5.0,
        }
    }
}

/// Speech provider access and retry behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSettings {
    /// Environment variable holding the API key.
    pub api_key_env: String,
    /// Environment variable holding an OAuth access token; preferred over the key when set.
    pub access_token_env: Option<String>,
    pub endpoint: String,
    pub request_timeout_secs: f64,
    pub max_retries: u32,
    pub backoff_base_secs: f64,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            api_key_env: "GOOGLE_TTS_API_KEY".to_string(),
            access_token_env: Some("GOOGLE_TTS_ACCESS_TOKEN".to_string()),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_secs: 60.0,
            max_retries: 3,
            backoff_base_secs: 2.0,
        }
    }
}

impl SpeechSettings {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            backoff: Backoff::Exponential {
                base_secs: self.backoff_base_secs,
            },
        }
    }
}

/// Everything one narration run needs besides the text itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NarrationConfig {
    pub voice: Voice,
    pub max_segment_len: usize,
    pub concurrency: usize,
    pub font_size: u32,
    pub font_path: Option<PathBuf>,
    pub background_color: ColorDef,
    pub text_color: ColorDef,
    pub background: BackgroundMedia,
    pub stretch_background: bool,
    pub backing_alpha: f64,
    pub output_name: String,
    pub output_dir: PathBuf,
    pub canvas: Canvas,
    pub encoding: EncodingConfig,
    pub bumper: BumperConfig,
    pub speech: SpeechSettings,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            voice: Voice::default(),
            max_segment_len: DEFAULT_MAX_SEGMENT_LEN,
            concurrency: DEFAULT_CONCURRENCY,
            font_size: 30,
            font_path: None,
            background_color: ColorDef::from(Rgba8::BLACK),
            text_color: ColorDef::from(Rgba8::WHITE),
            background: BackgroundMedia::None,
            stretch_background: false,
            backing_alpha: 0.7,
            output_name: "video_generado".to_string(),
            output_dir: PathBuf::from("."),
            canvas: Canvas::default(),
            encoding: EncodingConfig::default(),
            bumper: BumperConfig::default(),
            speech: SpeechSettings::default(),
        }
    }
}

impl NarrationConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_path(path: &Path) -> NarrateResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            NarrateError::validation(format!("failed to read config '{}': {e}", path.display()))
        })?;
        Self::from_json(&text)
            .map_err(|e| NarrateError::validation(format!("{}: {e}", path.display())))
    }

    pub fn from_json(text: &str) -> NarrateResult<Self> {
        serde_json::from_str(text)
            .map_err(|e| NarrateError::validation(format!("invalid config json: {e}")))
    }

    /// `<output_dir>/<output_name>.mp4`
    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.mp4", self.output_name))
    }

    /// Check every field, collecting all problems into one validation error.
    pub fn validate(&self) -> NarrateResult<()> {
        let mut errors = Vec::new();
        let mut check = |ok: bool, field: &'static str, msg: String| {
            if !ok {
                errors.push(ConfigError { field, message: msg });
            }
        };

        check(
            self.max_segment_len > 0,
            "max_segment_len",
            "must be > 0".to_string(),
        );
        check(self.concurrency >= 1, "concurrency", "must be >= 1".to_string());
        check(
            (MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&self.font_size),
            "font_size",
            format!("must be in {MIN_FONT_SIZE}..={MAX_FONT_SIZE}"),
        );
        check(
            self.backing_alpha.is_finite() && (0.0..=1.0).contains(&self.backing_alpha),
            "backing_alpha",
            "must be in 0..=1".to_string(),
        );
        check(
            !self.output_name.trim().is_empty()
                && !self.output_name.contains(['/', '\\'])
                && self.output_name != "."
                && self.output_name != "..",
            "output_name",
            "must be a plain, non-empty file name".to_string(),
        );
        check(
            self.canvas.width > 0 && self.canvas.height > 0,
            "canvas",
            "width and height must be > 0".to_string(),
        );
        check(
            self.canvas.width % 2 == 0 && self.canvas.height % 2 == 0,
            "canvas",
            format!(
                "width and height must be even for yuv420p output (got {}x{})",
                self.canvas.width, self.canvas.height
            ),
        );
        check(
            self.canvas.width <= u32::from(u16::MAX) && self.canvas.height <= u32::from(u16::MAX),
            "canvas",
            "width and height must fit in u16".to_string(),
        );
        check(
            self.encoding.fps.num > 0 && self.encoding.fps.den > 0,
            "encoding.fps",
            "num and den must be > 0".to_string(),
        );
        check(
            !self.encoding.video_codec.trim().is_empty(),
            "encoding.video_codec",
            "must not be empty".to_string(),
        );
        check(
            !self.encoding.audio_codec.trim().is_empty(),
            "encoding.audio_codec",
            "must not be empty".to_string(),
        );
        check(
            self.encoding.threads >= 1,
            "encoding.threads",
            "must be >= 1".to_string(),
        );
        check(
            self.bumper.duration_secs.is_finite() && self.bumper.duration_secs > 0.0,
            "bumper.duration_secs",
            "must be a positive number of seconds".to_string(),
        );
        check(
            self.bumper.title_size > 0 && self.bumper.subtitle_size > 0,
            "bumper",
            "title_size and subtitle_size must be > 0".to_string(),
        );
        check(
            self.speech.request_timeout_secs.is_finite() && self.speech.request_timeout_secs > 0.0,
            "speech.request_timeout_secs",
            "must be a positive number of seconds".to_string(),
        );
        check(
            self.speech.backoff_base_secs.is_finite() && self.speech.backoff_base_secs >= 0.0,
            "speech.backoff_base_secs",
            "must be >= 0".to_string(),
        );
        check(
            !self.speech.api_key_env.trim().is_empty(),
            "speech.api_key_env",
            "must name an environment variable".to_string(),
        );

        if errors.is_empty() {
            Ok(())
        } else {
            let msg = errors
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            Err(NarrateError::validation(msg))
        }
    }
}

#[derive(Debug, Clone)]
struct ConfigError {
    field: &'static str,
    message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "$.{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
