use super::*;

#[test]
fn fps_rejects_zero_parts() {
    assert!(Fps::new(0, 1).is_err());
    assert!(Fps::new(24, 0).is_err());
    assert_eq!(Fps::new(24, 1).unwrap(), Fps::default());
}

#[test]
fn secs_to_frames_ceil_absorbs_float_drift() {
    let fps = Fps::default();
    assert_eq!(fps.secs_to_frames_ceil(11.5), 276);
    assert_eq!(fps.secs_to_frames_ceil(1.0 / 48.0), 1);
    assert_eq!(fps.secs_to_frames_ceil(0.0), 0);
    assert_eq!(fps.secs_to_frames_ceil(f64::NAN), 0);
}

#[test]
fn frame_to_secs_uses_rational_fps() {
    let fps = Fps::new(30_000, 1001).unwrap();
    let t = fps.frame_to_secs(FrameIndex(30_000));
    assert!((t - 1001.0).abs() < 1e-9);
}

#[test]
fn rgba8_premul_and_alpha_scaling() {
    let c = Rgba8::opaque(200, 100, 0).with_alpha(0.5);
    assert_eq!(c.a, 128);
    assert_eq!(c.to_premul_array(), [100, 50, 0, 128]);
}

#[test]
fn solid_frame_has_expected_size_and_pixels() {
    let canvas = Canvas {
        width: 4,
        height: 2,
    };
    let frame = FrameRGBA::solid(canvas, Rgba8::opaque(1, 2, 3));
    assert_eq!(frame.data.len(), canvas.rgba_len());
    assert_eq!(frame.pixel(3, 1), [1, 2, 3, 255]);
    assert!(frame.premultiplied);
}
