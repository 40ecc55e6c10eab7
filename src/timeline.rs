//! TimelineBuilder: absolute clip offsets from synthesized durations, the trailing bumper, and
//! looping of a background video under the narration.

use std::collections::HashMap;
use std::sync::Arc;

use crate::caption::BackgroundFit;
use crate::foundation::core::{FrameRGBA, Rgba8};
use crate::foundation::error::{NarrateError, NarrateResult};
use crate::media::VideoSourceInfo;
use crate::segment::Segment;
use crate::speech::synth::SynthesizedAudio;

/// Times this close to a clip or span end already belong to the next one.
const BOUNDARY_EPSILON_SECS: f64 = 1e-9;

/// One back-to-back copy of a looped background video, starting at the video's beginning.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoopSpan {
    /// Timeline start in seconds.
    pub start: f64,
    /// Seconds of the source shown; only the last copy may be shorter than the source.
    pub duration: f64,
}

impl LoopSpan {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Copies of a `video_duration` long video needed to cover `required` seconds.
///
/// The last copy is truncated to the remaining duration. A video at least as long as
/// `required` yields one span.
pub fn loop_spans(video_duration: f64, required: f64) -> NarrateResult<Vec<LoopSpan>> {
    if !(video_duration.is_finite() && video_duration > 0.0) {
        return Err(NarrateError::validation(format!(
            "background video duration must be > 0, got {video_duration}"
        )));
    }
    if !required.is_finite() || required < 0.0 {
        return Err(NarrateError::validation(format!(
            "required duration must be >= 0, got {required}"
        )));
    }

    let mut spans = Vec::new();
    let mut start = 0.0;
    // Sub-microsecond remainders come from float accumulation, not from the media.
    while required - start > 1e-6 {
        let duration = video_duration.min(required - start);
        spans.push(LoopSpan { start, duration });
        start += duration;
    }
    Ok(spans)
}

/// What a clip carries besides its picture.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClipKind {
    Narration { segment_index: usize, text: String },
    Bumper,
}

/// A clip's picture.
#[derive(Clone, Debug)]
pub enum ClipVisual {
    /// Complete frame shown for the whole clip.
    Still(Arc<FrameRGBA>),
    /// Transparent caption layer composited over the background video track.
    Overlay(Arc<FrameRGBA>),
}

impl ClipVisual {
    pub fn frame(&self) -> &FrameRGBA {
        match self {
            Self::Still(f) | Self::Overlay(f) => f,
        }
    }
}

/// A visual bound to `[start, start + duration)` on the timeline, with optional narration.
#[derive(Clone, Debug)]
pub struct TimedClip {
    pub start: f64,
    pub duration: f64,
    pub kind: ClipKind,
    pub visual: ClipVisual,
    pub audio: Option<SynthesizedAudio>,
}

impl TimedClip {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Background video looped beneath the narration clips.
#[derive(Clone, Debug)]
pub struct BackgroundTrack {
    pub source: VideoSourceInfo,
    pub spans: Vec<LoopSpan>,
    pub fit: BackgroundFit,
    pub fill: Rgba8,
}

impl BackgroundTrack {
    /// Source time shown at timeline time `t`, if the track covers `t`.
    pub fn source_time_at(&self, t: f64) -> Option<f64> {
        self.spans
            .iter()
            .find(|s| t < s.end() - BOUNDARY_EPSILON_SECS)
            .filter(|s| t >= s.start - BOUNDARY_EPSILON_SECS)
            .map(|s| (t - s.start).max(0.0))
    }

    pub fn end(&self) -> f64 {
        self.spans.last().map_or(0.0, LoopSpan::end)
    }
}

/// Background video input for [`build_timeline`].
#[derive(Clone, Debug)]
pub struct BackgroundVideo {
    pub source: VideoSourceInfo,
    pub fit: BackgroundFit,
    pub fill: Rgba8,
}

/// Ordered, offset-assigned clips; the bumper is always last.
#[derive(Clone, Debug)]
pub struct Timeline {
    pub clips: Vec<TimedClip>,
    pub total_duration: f64,
    pub background: Option<BackgroundTrack>,
}

impl Timeline {
    /// Index and clip covering time `t`. Times past the end map to the last clip.
    pub fn clip_at(&self, t: f64) -> Option<(usize, &TimedClip)> {
        let last = self.clips.len().checked_sub(1)?;
        let idx = self
            .clips
            .iter()
            .position(|c| t < c.end() - BOUNDARY_EPSILON_SECS)
            .unwrap_or(last);
        Some((idx, &self.clips[idx]))
    }

    pub fn narration_clips(&self) -> impl Iterator<Item = &TimedClip> {
        self.clips
            .iter()
            .filter(|c| matches!(c.kind, ClipKind::Narration { .. }))
    }

    pub fn starts(&self) -> Vec<f64> {
        self.clips.iter().map(|c| c.start).collect()
    }
}

/// Lay out one clip per segment, in segment order, followed by the bumper.
///
/// `audios` may arrive in any order; they are matched to segments by index. `captions` are
/// positional: caption `i` belongs to `segments[i]`.
pub fn build_timeline(
    segments: &[Segment],
    audios: Vec<SynthesizedAudio>,
    captions: Vec<ClipVisual>,
    bumper: Arc<FrameRGBA>,
    bumper_duration: f64,
    background: Option<BackgroundVideo>,
) -> NarrateResult<Timeline> {
    if segments.is_empty() {
        return Err(NarrateError::validation("timeline needs at least one segment"));
    }
    if audios.len() != segments.len() || captions.len() != segments.len() {
        return Err(NarrateError::validation(format!(
            "timeline inputs disagree: {} segments, {} audios, {} captions",
            segments.len(),
            audios.len(),
            captions.len()
        )));
    }
    if !(bumper_duration.is_finite() && bumper_duration > 0.0) {
        return Err(NarrateError::validation(format!(
            "bumper duration must be > 0, got {bumper_duration}"
        )));
    }

    let mut by_index = HashMap::with_capacity(audios.len());
    for audio in audios {
        let idx = audio.segment_index;
        if by_index.insert(idx, audio).is_some() {
            return Err(NarrateError::validation(format!(
                "duplicate audio for segment {idx}"
            )));
        }
    }

    let mut clips = Vec::with_capacity(segments.len() + 1);
    let mut cursor = 0.0;
    for (segment, visual) in segments.iter().zip(captions) {
        let audio = by_index.remove(&segment.index).ok_or_else(|| {
            NarrateError::validation(format!("no audio for segment {}", segment.index))
        })?;
        let duration = audio.duration_secs;
        if !(duration.is_finite() && duration > 0.0) {
            return Err(NarrateError::validation(format!(
                "segment {} has invalid duration {duration}",
                segment.index
            )));
        }
        clips.push(TimedClip {
            start: cursor,
            duration,
            kind: ClipKind::Narration {
                segment_index: segment.index,
                text: segment.text.clone(),
            },
            visual,
            audio: Some(audio),
        });
        cursor += duration;
    }
    let narration_end = cursor;

    clips.push(TimedClip {
        start: cursor,
        duration: bumper_duration,
        kind: ClipKind::Bumper,
        visual: ClipVisual::Still(bumper),
        audio: None,
    });
    let total_duration = cursor + bumper_duration;

    let background = background
        .map(|bg| -> NarrateResult<BackgroundTrack> {
            let spans = loop_spans(bg.source.duration_secs, narration_end)?;
            if spans.len() > 1 {
                tracing::debug!(copies = spans.len(), "looping background video");
            }
            Ok(BackgroundTrack {
                source: bg.source,
                spans,
                fit: bg.fit,
                fill: bg.fill,
            })
        })
        .transpose()?;

    tracing::debug!(clips = clips.len(), total_duration, "timeline built");
    Ok(Timeline {
        clips,
        total_duration,
        background,
    })
}

#[cfg(test)]
#[path = "../tests/unit/timeline.rs"]
mod tests;
