//! Media codec boundary.
//!
//! The pipeline never decodes media itself; it goes through [`MediaCodec`]. [`FfmpegCodec`]
//! implements the contract by shelling out to the system `ffmpeg`/`ffprobe` binaries.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

use crate::foundation::core::Fps;
use crate::foundation::error::{NarrateError, NarrateResult};
use crate::resources::MediaHandle;

/// Internal audio mixing sample rate used across decode/mix/encode.
pub const MIX_SAMPLE_RATE: u32 = 48_000;

#[derive(Clone, Debug, PartialEq)]
/// Basic metadata about a source video file.
pub struct VideoSourceInfo {
    /// Source path used for decoding.
    pub source_path: PathBuf,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Container duration in seconds.
    pub duration_secs: f64,
}

#[derive(Clone, Debug, PartialEq)]
/// Decoded interleaved floating-point PCM.
pub struct AudioPcm {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Channel count.
    pub channels: u16,
    /// Interleaved `f32` PCM samples.
    pub interleaved_f32: Vec<f32>,
}

impl AudioPcm {
    /// Number of sample frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.interleaved_f32.len() / usize::from(self.channels)
    }

    /// Exact duration derived from the decoded sample count.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }
}

/// Decode-side media primitives consumed by the pipeline.
pub trait MediaCodec: Send + Sync {
    /// Decode any audio file to interleaved stereo `f32` PCM at `sample_rate`.
    fn decode_audio(&self, path: &Path, sample_rate: u32) -> NarrateResult<AudioPcm>;

    /// Probe dimensions and duration of a video file.
    fn probe_video(&self, path: &Path) -> NarrateResult<VideoSourceInfo>;

    /// Decode up to `count` straight-alpha RGBA8 frames at native size, resampled to `fps`,
    /// starting at `start_sec` of the source.
    fn decode_video_frames(
        &self,
        source: &VideoSourceInfo,
        start_sec: f64,
        count: u32,
        fps: Fps,
    ) -> NarrateResult<Vec<Vec<u8>>>;
}

/// [`MediaCodec`] backed by the system `ffmpeg` and `ffprobe` binaries.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegCodec;

impl MediaCodec for FfmpegCodec {
    fn decode_audio(&self, path: &Path, sample_rate: u32) -> NarrateResult<AudioPcm> {
        let out = Command::new("ffmpeg")
            .args(["-v", "error", "-i"])
            .arg(path)
            .args([
                "-vn",
                "-f",
                "f32le",
                "-acodec",
                "pcm_f32le",
                "-ac",
                "2",
                "-ar",
                &sample_rate.to_string(),
                "pipe:1",
            ])
            .output()
            .map_err(|e| NarrateError::render(format!("failed to run ffmpeg for audio decode: {e}")))?;

        if !out.status.success() {
            let msg = String::from_utf8_lossy(&out.stderr);
            // ffmpeg reports a missing audio stream as an error; treat it as empty PCM.
            if msg.contains("matches no streams")
                || msg.contains("Output file #0 does not contain any stream")
            {
                return Ok(AudioPcm {
                    sample_rate,
                    channels: 2,
                    interleaved_f32: Vec::new(),
                });
            }
            return Err(NarrateError::render(format!(
                "ffmpeg audio decode failed for '{}': {}",
                path.display(),
                msg.trim()
            )));
        }

        Ok(AudioPcm {
            sample_rate,
            channels: 2,
            interleaved_f32: f32le_to_samples(&out.stdout)?,
        })
    }

    fn probe_video(&self, path: &Path) -> NarrateResult<VideoSourceInfo> {
        #[derive(serde::Deserialize)]
        struct ProbeStream {
            codec_type: Option<String>,
            width: Option<u32>,
            height: Option<u32>,
            duration: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeFormat {
            duration: Option<String>,
        }
        #[derive(serde::Deserialize)]
        struct ProbeOut {
            streams: Vec<ProbeStream>,
            format: Option<ProbeFormat>,
        }

        let out = Command::new("ffprobe")
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_streams",
                "-show_format",
            ])
            .arg(path)
            .output()
            .map_err(|e| NarrateError::render(format!("failed to run ffprobe: {e}")))?;
        if !out.status.success() {
            return Err(NarrateError::render(format!(
                "ffprobe failed for '{}': {}",
                path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        let parsed: ProbeOut = serde_json::from_slice(&out.stdout)
            .map_err(|e| NarrateError::render(format!("ffprobe json parse failed: {e}")))?;
        let video = parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some("video"))
            .ok_or_else(|| NarrateError::render(format!("no video stream in '{}'", path.display())))?;
        let width = video
            .width
            .ok_or_else(|| NarrateError::render("missing video width from ffprobe"))?;
        let height = video
            .height
            .ok_or_else(|| NarrateError::render("missing video height from ffprobe"))?;
        let duration_secs = video
            .duration
            .as_deref()
            .or(parsed.format.as_ref().and_then(|f| f.duration.as_deref()))
            .and_then(|d| d.parse::<f64>().ok())
            .filter(|d| d.is_finite() && *d > 0.0)
            .ok_or_else(|| {
                NarrateError::render(format!("could not determine duration of '{}'", path.display()))
            })?;

        Ok(VideoSourceInfo {
            source_path: path.to_path_buf(),
            width,
            height,
            duration_secs,
        })
    }

    fn decode_video_frames(
        &self,
        source: &VideoSourceInfo,
        start_sec: f64,
        count: u32,
        fps: Fps,
    ) -> NarrateResult<Vec<Vec<u8>>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let out = Command::new("ffmpeg")
            .args(["-v", "error", "-ss", &format!("{start_sec:.9}")])
            .arg("-i")
            .arg(&source.source_path)
            .args([
                "-vf",
                &format!("fps={}/{}", fps.num, fps.den),
                "-frames:v",
                &count.to_string(),
                "-f",
                "rawvideo",
                "-pix_fmt",
                "rgba",
                "pipe:1",
            ])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| NarrateError::render(format!("failed to run ffmpeg for video decode: {e}")))?;

        if !out.status.success() {
            return Err(NarrateError::render(format!(
                "ffmpeg video decode failed for '{}': {}",
                source.source_path.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            )));
        }

        split_raw_frames(&out.stdout, source.width, source.height, count)
    }
}

fn f32le_to_samples(bytes: &[u8]) -> NarrateResult<Vec<f32>> {
    if !bytes.len().is_multiple_of(4) {
        return Err(NarrateError::render(
            "decoded audio byte length is not aligned to f32 samples",
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn split_raw_frames(
    bytes: &[u8],
    width: u32,
    height: u32,
    count: u32,
) -> NarrateResult<Vec<Vec<u8>>> {
    let expected_len = width as usize * height as usize * 4;
    if expected_len == 0 {
        return Err(NarrateError::render(
            "decoded video frame size is zero (invalid source dimensions)",
        ));
    }
    if !bytes.len().is_multiple_of(expected_len) {
        return Err(NarrateError::render(format!(
            "decoded video batch has invalid size: got {} bytes, expected multiples of {expected_len}",
            bytes.len()
        )));
    }

    Ok(bytes
        .chunks_exact(expected_len)
        .take(count as usize)
        .map(<[u8]>::to_vec)
        .collect())
}

/// Return `true` when `tool` (e.g. `ffmpeg`) can be invoked from `PATH`.
pub fn is_tool_on_path(tool: &str) -> bool {
    Command::new(tool)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Shared, closable handle to one segment's decoded narration audio.
///
/// Clones share the same buffer; closing any clone frees it for all of them.
#[derive(Clone)]
pub struct DecodedAudio {
    label: String,
    pcm: Arc<Mutex<Option<Arc<AudioPcm>>>>,
}

impl std::fmt::Debug for DecodedAudio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedAudio")
            .field("label", &self.label)
            .field("open", &self.is_open())
            .finish()
    }
}

impl DecodedAudio {
    pub fn new(label: impl Into<String>, pcm: AudioPcm) -> Self {
        Self {
            label: label.into(),
            pcm: Arc::new(Mutex::new(Some(Arc::new(pcm)))),
        }
    }

    /// Borrow the decoded PCM; fails once the handle has been closed.
    pub fn pcm(&self) -> NarrateResult<Arc<AudioPcm>> {
        self.pcm
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
            .ok_or_else(|| NarrateError::render(format!("audio '{}' was already released", self.label)))
    }

    pub fn is_open(&self) -> bool {
        self.pcm
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

impl MediaHandle for DecodedAudio {
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn close(&mut self) -> NarrateResult<()> {
        self.pcm.lock().unwrap_or_else(|e| e.into_inner()).take();
        Ok(())
    }
}


// No tests for `FfmpegCodec` here: it shells out to `ffprobe`/`ffmpeg` and is exercised by
// integration tests that skip themselves when the tools are unavailable.
