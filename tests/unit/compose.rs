use std::path::Path;
use std::sync::Mutex;

use super::*;
use crate::caption::BackgroundFit;
use crate::media::{DecodedAudio, VideoSourceInfo};
use crate::segment::Segment;
use crate::speech::synth::SynthesizedAudio;
use crate::timeline::{BackgroundVideo, build_timeline};

const CANVAS: Canvas = Canvas {
    width: 4,
    height: 2,
};

fn fps10() -> Fps {
    Fps { num: 10, den: 1 }
}

fn segments(n: usize) -> Vec<Segment> {
    (0..n)
        .map(|index| Segment {
            index,
            text: format!("Frase {index}."),
        })
        .collect()
}

fn audio(segment_index: usize, duration_secs: f64) -> SynthesizedAudio {
    let frames = (duration_secs * f64::from(MIX_SAMPLE_RATE)).round() as usize;
    SynthesizedAudio {
        segment_index,
        duration_secs,
        path: PathBuf::from(format!("temp_audio_{segment_index}.mp3")),
        audio: DecodedAudio::new(
            format!("seg-{segment_index}"),
            AudioPcm {
                sample_rate: MIX_SAMPLE_RATE,
                channels: 2,
                interleaved_f32: vec![0.25; frames * 2],
            },
        ),
    }
}

fn still(color: Rgba8) -> ClipVisual {
    ClipVisual::Still(Arc::new(FrameRGBA::solid(CANVAS, color)))
}

fn red() -> Rgba8 {
    Rgba8::opaque(255, 0, 0)
}

/// Codec with no audio or probing; video frames are solid with red = 10 * source frame.
struct CountingVideoCodec {
    source_frames: u64,
    calls: Mutex<Vec<(f64, u32)>>,
}

impl CountingVideoCodec {
    fn new(source_frames: u64) -> Self {
        Self {
            source_frames,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl MediaCodec for CountingVideoCodec {
    fn decode_audio(&self, _path: &Path, _sample_rate: u32) -> NarrateResult<AudioPcm> {
        Err(NarrateError::render("not used"))
    }

    fn probe_video(&self, _path: &Path) -> NarrateResult<VideoSourceInfo> {
        Err(NarrateError::render("not used"))
    }

    fn decode_video_frames(
        &self,
        source: &VideoSourceInfo,
        start_sec: f64,
        count: u32,
        fps: Fps,
    ) -> NarrateResult<Vec<Vec<u8>>> {
        self.calls.lock().unwrap().push((start_sec, count));
        let first = (start_sec * fps.as_f64()).round() as u64;
        let px = (source.width * source.height) as usize;
        Ok((first..self.source_frames.min(first + u64::from(count)))
            .map(|n| [(n * 10) as u8, 0, 0, 255].repeat(px))
            .collect())
    }
}

#[test]
fn frames_follow_clip_offsets_and_mix_is_handed_to_the_sink() {
    let tl = build_timeline(
        &segments(2),
        vec![audio(0, 0.2), audio(1, 0.3)],
        vec![still(Rgba8::BLACK), still(Rgba8::WHITE)],
        Arc::new(FrameRGBA::solid(CANVAS, red())),
        0.5,
        None,
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let resources = ResourceManager::new();
    let compositor = Compositor::new(Arc::new(CountingVideoCodec::new(0)), CANVAS, fps10());
    let mut sink = crate::encode::sink::InMemorySink::new();
    let mut seen = Vec::new();
    let mut progress = |f: f64| seen.push(f);

    let stats = compositor
        .render(&tl, &mut sink, &resources, dir.path(), &mut progress)
        .unwrap();

    assert_eq!(stats.frames_total, 10);
    assert_eq!(stats.duration_secs, 1.0);
    assert_eq!(stats.background_frames_decoded, 0);
    assert!(sink.is_ended());

    let colors: Vec<[u8; 4]> = sink.frames().iter().map(|(_, f)| f.pixel(0, 0)).collect();
    let mut expected = vec![[0, 0, 0, 255]; 2];
    expected.extend(vec![[255, 255, 255, 255]; 3]);
    expected.extend(vec![[255, 0, 0, 255]; 5]);
    assert_eq!(colors, expected);
    let indices: Vec<u64> = sink.frames().iter().map(|(i, _)| i.0).collect();
    assert_eq!(indices, (0..10).collect::<Vec<_>>());

    let audio = sink.config().unwrap().audio.clone().unwrap();
    assert_eq!(audio.channels, 2);
    assert_eq!(audio.sample_rate, MIX_SAMPLE_RATE);
    assert_eq!(audio.path, dir.path().join(MIX_FILE_NAME));
    let bytes = std::fs::metadata(&audio.path).unwrap().len();
    assert_eq!(bytes, u64::from(MIX_SAMPLE_RATE) * 2 * 4);
    assert_eq!(resources.pending(), 1);

    assert_eq!(seen.first().copied(), Some(0.0));
    assert_eq!(seen.last().copied(), Some(1.0));

    resources.release_all();
    assert!(!audio.path.exists());
}

#[test]
fn background_video_loops_under_overlays() {
    let mut marked = FrameRGBA::transparent(CANVAS);
    marked.data[0..4].copy_from_slice(&[255, 255, 255, 255]);
    let bg = BackgroundVideo {
        source: VideoSourceInfo {
            source_path: PathBuf::from("bg.mp4"),
            width: CANVAS.width,
            height: CANVAS.height,
            duration_secs: 0.4,
        },
        fit: BackgroundFit::Letterbox,
        fill: Rgba8::BLACK,
    };
    let tl = build_timeline(
        &segments(2),
        vec![audio(0, 0.5), audio(1, 0.5)],
        vec![
            ClipVisual::Overlay(Arc::new(FrameRGBA::transparent(CANVAS))),
            ClipVisual::Overlay(Arc::new(marked)),
        ],
        Arc::new(FrameRGBA::solid(CANVAS, red())),
        0.2,
        Some(bg),
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let resources = ResourceManager::new();
    let codec = Arc::new(CountingVideoCodec::new(4));
    let compositor = Compositor::new(codec.clone(), CANVAS, fps10());
    let mut sink = crate::encode::sink::InMemorySink::new();

    let stats = compositor
        .render(&tl, &mut sink, &resources, dir.path(), &mut NoProgress)
        .unwrap();

    assert_eq!(stats.frames_total, 12);
    assert_eq!(stats.background_frames_decoded, 4);
    assert_eq!(codec.calls.lock().unwrap().len(), 1);

    let frames = sink.frames();
    let source_red: Vec<u8> = frames[..10].iter().map(|(_, f)| f.pixel(1, 0)[0]).collect();
    assert_eq!(source_red, vec![0, 10, 20, 30, 0, 10, 20, 30, 0, 10]);

    assert_eq!(frames[4].1.pixel(0, 0), [0, 0, 0, 255]);
    assert_eq!(frames[5].1.pixel(0, 0), [255, 255, 255, 255]);
    assert_eq!(frames[11].1.pixel(1, 0), [255, 0, 0, 255]);
}

#[test]
fn wrong_sized_clip_is_a_render_error() {
    let small = Canvas {
        width: 2,
        height: 2,
    };
    let tl = build_timeline(
        &segments(1),
        vec![audio(0, 0.2)],
        vec![ClipVisual::Still(Arc::new(FrameRGBA::solid(small, Rgba8::BLACK)))],
        Arc::new(FrameRGBA::solid(CANVAS, red())),
        0.1,
        None,
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let resources = ResourceManager::new();
    let compositor = Compositor::new(Arc::new(CountingVideoCodec::new(0)), CANVAS, fps10());
    let mut sink = crate::encode::sink::InMemorySink::new();
    let err = compositor
        .render(&tl, &mut sink, &resources, dir.path(), &mut NoProgress)
        .unwrap_err();
    assert!(matches!(err, NarrateError::Render(_)));
    assert!(!sink.is_ended());
    resources.release_all();
}

#[test]
fn failed_file_render_keeps_existing_output() {
    let small = Canvas {
        width: 2,
        height: 2,
    };
    let tl = build_timeline(
        &segments(1),
        vec![audio(0, 0.2)],
        vec![ClipVisual::Still(Arc::new(FrameRGBA::solid(small, Rgba8::BLACK)))],
        Arc::new(FrameRGBA::solid(CANVAS, red())),
        0.1,
        None,
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let work_dir = dir.path().join("work");
    std::fs::create_dir_all(&work_dir).unwrap();
    let output = dir.path().join("out").join("video.mp4");
    std::fs::create_dir_all(output.parent().unwrap()).unwrap();
    std::fs::write(&output, b"earlier render").unwrap();

    let resources = ResourceManager::new();
    let compositor = Compositor::new(Arc::new(CountingVideoCodec::new(0)), CANVAS, fps10());
    let res = render_to_file(
        &compositor,
        &tl,
        &output,
        &EncodingConfig::default(),
        &resources,
        &work_dir,
        &mut NoProgress,
    );
    assert!(res.is_err());
    assert_eq!(std::fs::read(&output).unwrap(), b"earlier render");

    resources.release_all();
    assert!(!work_dir.join(ENCODE_FILE_NAME).exists());
    assert!(!work_dir.join(MIX_FILE_NAME).exists());
}

#[test]
fn publish_replaces_output_with_the_staged_file() {
    let dir = tempfile::tempdir().unwrap();
    let staged = dir.path().join(ENCODE_FILE_NAME);
    std::fs::write(&staged, b"fresh").unwrap();
    let output = dir.path().join("nested").join("video.mp4");
    std::fs::create_dir_all(output.parent().unwrap()).unwrap();
    std::fs::write(&output, b"old").unwrap();

    publish(&staged, &output).unwrap();
    assert_eq!(std::fs::read(&output).unwrap(), b"fresh");
    assert!(!staged.exists());
}
