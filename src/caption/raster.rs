//! CPU rasterization of caption overlays with `vello_cpu`.

use crate::caption::layout::TextBrushRgba8;
use crate::foundation::core::{Canvas, FrameRGBA, Rgba8};
use crate::foundation::error::{NarrateError, NarrateResult};

/// A shaped line positioned on the canvas; `(x, y)` is the layout's top-left corner.
pub struct PlacedLine {
    pub layout: parley::Layout<TextBrushRgba8>,
    pub x: f32,
    pub y: f32,
}

/// Axis-aligned filled rectangle in canvas pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FillRect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    pub color: Rgba8,
}

/// Render `rects` then `lines` over a transparent canvas. Output is premultiplied RGBA8.
pub fn rasterize_overlay(
    canvas: Canvas,
    font: Option<&vello_cpu::peniko::FontData>,
    rects: &[FillRect],
    lines: &[PlacedLine],
) -> NarrateResult<FrameRGBA> {
    let (w, h) = canvas_u16(canvas)?;
    let mut ctx = vello_cpu::RenderContext::new(w, h);

    for r in rects {
        if r.color.a == 0 || r.x1 <= r.x0 || r.y1 <= r.y0 {
            continue;
        }
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
            r.color.r, r.color.g, r.color.b, r.color.a,
        ));
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1));
    }

    if let Some(font) = font {
        for placed in lines {
            ctx.set_transform(vello_cpu::kurbo::Affine::translate((
                f64::from(placed.x),
                f64::from(placed.y),
            )));
            for line in placed.layout.lines() {
                for item in line.items() {
                    let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                        continue;
                    };
                    let brush = run.style().brush;
                    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                        brush.r, brush.g, brush.b, brush.a,
                    ));
                    // Positions include the run offset, accumulated advances and the baseline.
                    let glyphs = run.positioned_glyphs().map(|g| vello_cpu::Glyph {
                        id: g.id,
                        x: g.x,
                        y: g.y,
                    });
                    ctx.glyph_run(font)
                        .font_size(run.run().font_size())
                        .fill_glyphs(glyphs);
                }
            }
        }
    }

    ctx.flush();
    let mut pixmap = vello_cpu::Pixmap::new(w, h);
    ctx.render_to_pixmap(&mut pixmap);

    Ok(FrameRGBA {
        width: canvas.width,
        height: canvas.height,
        data: pixmap.data_as_u8_slice().to_vec(),
        premultiplied: true,
    })
}

fn canvas_u16(canvas: Canvas) -> NarrateResult<(u16, u16)> {
    let w: u16 = canvas
        .width
        .try_into()
        .map_err(|_| NarrateError::render("canvas width exceeds u16"))?;
    let h: u16 = canvas
        .height
        .try_into()
        .map_err(|_| NarrateError::render("canvas height exceeds u16"))?;
    if w == 0 || h == 0 {
        return Err(NarrateError::render("canvas must be non-empty"));
    }
    Ok((w, h))
}
