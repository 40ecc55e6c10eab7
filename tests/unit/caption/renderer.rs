use super::*;
use crate::config::BumperConfig;

fn small_canvas() -> Canvas {
    Canvas {
        width: 320,
        height: 180,
    }
}

fn renderer_with_system_font() -> Option<CaptionRenderer> {
    let renderer = CaptionRenderer::new(small_canvas(), resolve_font(None));
    renderer.has_font().then_some(renderer)
}

fn count_pixels(frame: &FrameRGBA, pred: impl Fn([u8; 4]) -> bool) -> usize {
    frame
        .data
        .chunks_exact(4)
        .filter(|px| pred([px[0], px[1], px[2], px[3]]))
        .count()
}

/// Inclusive `(x0, y0, x1, y1)` box of the pixels matching `pred`, limited to rows `rows`.
fn ink_bounds(
    frame: &FrameRGBA,
    rows: std::ops::Range<u32>,
    pred: impl Fn([u8; 4]) -> bool,
) -> Option<(u32, u32, u32, u32)> {
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for y in rows {
        for x in 0..frame.width {
            if !pred(frame.pixel(x, y)) {
                continue;
            }
            bounds = Some(match bounds {
                None => (x, y, x, y),
                Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            });
        }
    }
    bounds
}

fn hd_canvas() -> Canvas {
    Canvas {
        width: 1280,
        height: 720,
    }
}

#[test]
fn without_font_caption_is_background_only() {
    let mut r = CaptionRenderer::new(small_canvas(), None);
    assert!(!r.has_font());
    let style = CaptionStyle {
        fill_color: Rgba8::opaque(0, 0, 40),
        ..CaptionStyle::default()
    };
    let frame = r.render_caption("Hola mundo.", &style, None).unwrap();
    assert_eq!(frame, FrameRGBA::solid(small_canvas(), Rgba8::opaque(0, 0, 40)));
}

#[test]
fn text_is_drawn_near_the_center() {
    let Some(mut r) = renderer_with_system_font() else {
        return;
    };
    let style = CaptionStyle::default();
    let frame = r.render_caption("Hola.", &style, None).unwrap();
    let lit = count_pixels(&frame, |px| px[0] > 128);
    assert!(lit > 0);
    // Corners stay the fill color.
    assert_eq!(frame.pixel(0, 0), [0, 0, 0, 255]);
    assert_eq!(frame.pixel(319, 179), [0, 0, 0, 255]);
}

#[test]
fn long_text_wraps_within_margin() {
    let Some(mut r) = renderer_with_system_font() else {
        return;
    };
    let text = "Esta es una frase bastante larga que no cabe en una sola línea del lienzo.";
    let lines = r.wrap_lines(text, 30.0).unwrap();
    assert!(lines.len() > 1);
    assert_eq!(lines.join(" "), text);
}

#[test]
fn backing_rect_only_over_background_media() {
    let Some(mut r) = renderer_with_system_font() else {
        return;
    };
    let style = CaptionStyle::default();
    let bg = FrameRGBA::solid(small_canvas(), Rgba8::opaque(200, 200, 200));

    let over_media = r.render_caption("Hola.", &style, Some(&bg)).unwrap();
    // Left edge at the vertical center is dimmed by the backing rectangle.
    let px = over_media.pixel(0, 90);
    assert!(px[0] < 100, "expected dimmed pixel, got {px:?}");
    // Top row is outside the backing rectangle.
    assert_eq!(over_media.pixel(0, 0), [200, 200, 200, 255]);

    let overlay = r.render_overlay("Hola.", &style, false).unwrap();
    assert_eq!(overlay.pixel(0, 90), [0, 0, 0, 0]);
}

#[test]
fn bumper_is_solid_color_with_logo() {
    let mut r = CaptionRenderer::new(small_canvas(), None);
    let logo = image::RgbaImage::from_pixel(bumper::LOGO_SIZE, bumper::LOGO_SIZE, image::Rgba([0, 0, 255, 255]));
    let frame = r
        .render_bumper_with_logo(&BumperConfig::default(), Some(&logo))
        .unwrap();
    assert_eq!(frame.pixel(0, 0), [255, 0, 0, 255]);
    assert_eq!(frame.pixel(20, 20), [0, 0, 255, 255]);
    assert_eq!(frame.pixel(119, 119), [0, 0, 255, 255]);
    assert_eq!(frame.pixel(120, 120), [255, 0, 0, 255]);
}

#[test]
fn missing_logo_is_skipped() {
    let mut r = CaptionRenderer::new(small_canvas(), None);
    let cfg = BumperConfig {
        logo: Some("/no/such/logo.png".to_string()),
        ..BumperConfig::default()
    };
    let frame = r.render_bumper(&cfg).unwrap();
    assert_eq!(frame.pixel(20, 20), [255, 0, 0, 255]);
}

#[test]
fn bumper_text_is_white() {
    let Some(mut r) = renderer_with_system_font() else {
        return;
    };
    let frame = r.render_bumper(&BumperConfig::default()).unwrap();
    let white = count_pixels(&frame, |px| px[1] > 200 && px[2] > 200);
    assert!(white > 0);
}

#[test]
fn caption_line_ink_spans_its_measured_width_inside_the_block() {
    let Some(font) = resolve_font(None) else {
        return;
    };
    let mut r = CaptionRenderer::new(hd_canvas(), Some(font));
    let style = CaptionStyle::default();
    let text = "Hola mundo, esto es una prueba.";

    let lines = r.wrap_lines(text, style.font_size).unwrap();
    assert_eq!(lines.len(), 1);
    let measured = r
        .engine
        .as_mut()
        .unwrap()
        .measure(text, style.font_size)
        .unwrap();

    let frame = r.render_caption(text, &style, None).unwrap();
    let (x0, y0, x1, y1) = ink_bounds(&frame, 0..720, |px| px[0] > 0).unwrap();

    let ink_w = (x1 - x0 + 1) as f32;
    assert!(
        ink_w > measured * 0.85 && ink_w <= measured + 2.0,
        "ink {ink_w}px vs measured {measured}px"
    );
    let center = (x0 + x1) as f32 / 2.0;
    assert!((center - 640.0).abs() < 10.0, "ink centered at {center}");

    let block_h = style.line_height();
    let top = ((720.0 - block_h) / 2.0).floor();
    assert!(y0 as f32 >= top, "ink starts at {y0}, block top {top}");
    assert!(y1 as f32 <= top + block_h, "ink ends at {y1}, block bottom {}", top + block_h);
}

#[test]
fn bumper_title_ink_spans_its_measured_width_above_the_center() {
    let Some(font) = resolve_font(None) else {
        return;
    };
    let mut r = CaptionRenderer::new(hd_canvas(), Some(font));
    let cfg = BumperConfig::default();
    let title_size = cfg.title_size as f32;
    let engine = r.engine.as_mut().unwrap();
    let measured = engine.measure(&cfg.title, title_size).unwrap();
    let title_h = engine
        .layout_line(&cfg.title, title_size, TextBrushRgba8::default())
        .unwrap()
        .height();

    let frame = r.render_bumper(&cfg).unwrap();
    // White-ish title pixels over the red card, upper half only.
    let (x0, y0, x1, y1) = ink_bounds(&frame, 0..360, |px| px[1] > 100 && px[2] > 100).unwrap();

    let ink_w = (x1 - x0 + 1) as f32;
    assert!(
        ink_w > measured * 0.85 && ink_w <= measured + 2.0,
        "ink {ink_w}px vs measured {measured}px"
    );
    let center = (x0 + x1) as f32 / 2.0;
    assert!((center - 640.0).abs() < 10.0, "title centered at {center}");

    let title_y = ((720.0 - title_h) / 2.0 - title_h / 2.0 - 20.0).floor();
    // Accented capitals may reach slightly past the ascent.
    assert!(y0 as f32 >= title_y - 4.0, "title ink starts at {y0}, layout top {title_y}");
    assert!(y1 as f32 <= title_y + title_h + 2.0, "title ink ends at {y1}");
}
