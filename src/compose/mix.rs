//! Narration audio mix: every clip's decoded PCM placed at its start offset.

use std::path::Path;

use crate::foundation::error::{NarrateError, NarrateResult};
use crate::media::AudioPcm;

/// Output channel count of the mix.
pub const MIX_CHANNELS: u16 = 2;

/// Mix `(start_secs, pcm)` placements into `total_secs` of interleaved stereo at `sample_rate`.
///
/// Each placement starts at sample `round(start_secs * sample_rate)`. Mono sources are copied
/// to both channels. Anything past the end is cut and the result is clamped to `[-1, 1]`.
pub fn mix_placements(
    placements: &[(f64, &AudioPcm)],
    total_secs: f64,
    sample_rate: u32,
) -> NarrateResult<Vec<f32>> {
    if sample_rate == 0 {
        return Err(NarrateError::validation("mix sample_rate must be > 0"));
    }
    let total_frames = secs_to_sample(total_secs, sample_rate);
    let channels = usize::from(MIX_CHANNELS);
    let mut out = vec![0.0f32; total_frames * channels];

    for (start_secs, pcm) in placements {
        if pcm.sample_rate != sample_rate {
            return Err(NarrateError::render(format!(
                "audio at {start_secs}s has sample rate {} but the mix runs at {sample_rate}",
                pcm.sample_rate
            )));
        }
        if pcm.channels == 0 {
            continue;
        }
        let start = secs_to_sample(*start_secs, sample_rate);
        let src_channels = usize::from(pcm.channels);
        for (i, frame) in pcm.interleaved_f32.chunks_exact(src_channels).enumerate() {
            let dst_frame = start + i;
            if dst_frame >= total_frames {
                break;
            }
            let (l, r) = if src_channels == 1 {
                (frame[0], frame[0])
            } else {
                (frame[0], frame[1])
            };
            let d = dst_frame * channels;
            out[d] += l;
            out[d + 1] += r;
        }
    }

    for s in &mut out {
        *s = s.clamp(-1.0, 1.0);
    }
    Ok(out)
}

fn secs_to_sample(secs: f64, sample_rate: u32) -> usize {
    if !secs.is_finite() || secs <= 0.0 {
        return 0;
    }
    (secs * f64::from(sample_rate)).round() as usize
}

/// Write interleaved `f32` PCM samples to a raw little-endian `.f32le` file.
pub fn write_mix_to_f32le_file(samples_interleaved: &[f32], out_path: &Path) -> NarrateResult<()> {
    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            NarrateError::render(format!(
                "failed to create audio mix output directory '{}': {e}",
                parent.display()
            ))
        })?;
    }

    let mut bytes = Vec::<u8>::with_capacity(samples_interleaved.len() * 4);
    for &sample in samples_interleaved {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    std::fs::write(out_path, bytes).map_err(|e| {
        NarrateError::render(format!(
            "failed to write mixed audio file '{}': {e}",
            out_path.display()
        ))
    })
}
