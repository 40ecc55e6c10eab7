//! CaptionRenderer: wrapped, centered caption text over a solid fill or background media, plus
//! the closing bumper card.

pub mod background;
pub mod bumper;
pub mod font;
pub mod layout;
pub mod raster;

use std::path::Path;

use crate::config::NarrationConfig;
use crate::foundation::core::{Canvas, FrameRGBA, Rgba8};
use crate::foundation::error::NarrateResult;
use crate::foundation::math::premul_over_in_place;

pub use background::{BackgroundFit, fit_image, fit_raw_frame, load_background_image};
pub use font::{FontOrigin, LoadedFont, resolve_font};
use layout::{TextBrushRgba8, TextLayoutEngine, wrap_words};
use raster::{FillRect, PlacedLine, rasterize_overlay};

/// Horizontal space kept free around a caption line.
pub const TEXT_MARGIN_PX: f32 = 60.0;
/// Line height as a multiple of the font size.
pub const LINE_HEIGHT_FACTOR: f32 = 1.5;

/// Visual style of a caption.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptionStyle {
    pub font_size: f32,
    pub text_color: Rgba8,
    /// Solid fill used when there is no background media; also the backing rectangle color.
    pub fill_color: Rgba8,
    /// Opacity of the backing rectangle drawn behind text over background media.
    pub backing_alpha: f32,
}

impl CaptionStyle {
    pub fn from_config(cfg: &NarrationConfig) -> Self {
        Self {
            font_size: cfg.font_size as f32,
            text_color: cfg.text_color.to_rgba8(),
            fill_color: cfg.background_color.to_rgba8(),
            backing_alpha: cfg.backing_alpha as f32,
        }
    }

    pub fn line_height(&self) -> f32 {
        self.font_size * LINE_HEIGHT_FACTOR
    }
}

impl Default for CaptionStyle {
    fn default() -> Self {
        Self {
            font_size: 30.0,
            text_color: Rgba8::WHITE,
            fill_color: Rgba8::BLACK,
            backing_alpha: 0.7,
        }
    }
}

/// Rasterizes captions onto a fixed canvas with one resolved font.
pub struct CaptionRenderer {
    canvas: Canvas,
    engine: Option<TextLayoutEngine>,
    font_data: Option<vello_cpu::peniko::FontData>,
}

impl CaptionRenderer {
    /// Renderer using `font`; without a usable font captions render background-only.
    pub fn new(canvas: Canvas, font: Option<LoadedFont>) -> Self {
        let Some(font) = font else {
            return Self {
                canvas,
                engine: None,
                font_data: None,
            };
        };
        match TextLayoutEngine::new(&font) {
            Ok(engine) => {
                tracing::debug!(family = engine.family_name(), origin = ?font.origin, "caption font ready");
                let font_data = vello_cpu::peniko::FontData::new(
                    vello_cpu::peniko::Blob::from(font.bytes.as_ref().clone()),
                    font.index,
                );
                Self {
                    canvas,
                    engine: Some(engine),
                    font_data: Some(font_data),
                }
            }
            Err(e) => {
                tracing::error!(origin = ?font.origin, "font could not be registered, captions will have no text: {e}");
                Self {
                    canvas,
                    engine: None,
                    font_data: None,
                }
            }
        }
    }

    /// Resolve a font starting from `font_path` and build a renderer with it.
    pub fn from_font_path(canvas: Canvas, font_path: Option<&Path>) -> Self {
        Self::new(canvas, resolve_font(font_path))
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn has_font(&self) -> bool {
        self.engine.is_some()
    }

    /// Word-wrap `text` to the canvas width minus the margin. Empty without a font.
    pub fn wrap_lines(&mut self, text: &str, font_size: f32) -> NarrateResult<Vec<String>> {
        let Some(engine) = self.engine.as_mut() else {
            return Ok(Vec::new());
        };
        let max_width = self.canvas.width as f32 - TEXT_MARGIN_PX;
        wrap_words(text, max_width, |line| engine.measure(line, font_size))
    }

    /// Caption text (and its backing rectangle when `with_backing`) on a transparent canvas.
    pub fn render_overlay(
        &mut self,
        text: &str,
        style: &CaptionStyle,
        with_backing: bool,
    ) -> NarrateResult<FrameRGBA> {
        let lines = self.wrap_lines(text, style.font_size)?;
        if lines.is_empty() {
            return Ok(FrameRGBA::transparent(self.canvas));
        }

        let w = self.canvas.width as f32;
        let h = self.canvas.height as f32;
        let line_h = style.line_height();
        let block_h = lines.len() as f32 * line_h;
        let top = ((h - block_h) / 2.0).floor();

        let mut rects = Vec::new();
        if with_backing && style.backing_alpha > 0.0 {
            rects.push(FillRect {
                x0: 0.0,
                y0: f64::from(top - line_h / 2.0),
                x1: f64::from(w),
                y1: f64::from(top + block_h + line_h / 2.0),
                color: style.fill_color.with_alpha(style.backing_alpha),
            });
        }

        let mut placed = Vec::with_capacity(lines.len());
        if let Some(engine) = self.engine.as_mut() {
            let brush = TextBrushRgba8::from(style.text_color);
            for (i, line) in lines.iter().enumerate() {
                let layout = engine.layout_line(line, style.font_size, brush)?;
                let x = ((w - layout.width()) / 2.0).floor();
                let y = top + i as f32 * line_h + (line_h - layout.height()) / 2.0;
                placed.push(PlacedLine { layout, x, y });
            }
        }

        rasterize_overlay(self.canvas, self.font_data.as_ref(), &rects, &placed)
    }

    /// Complete caption frame: `background` (already fitted to the canvas) or the solid fill,
    /// with the text centered on top.
    pub fn render_caption(
        &mut self,
        text: &str,
        style: &CaptionStyle,
        background: Option<&FrameRGBA>,
    ) -> NarrateResult<FrameRGBA> {
        let mut base = match background {
            Some(bg) if bg.canvas() == self.canvas => bg.clone(),
            Some(bg) => {
                tracing::warn!(
                    width = bg.width,
                    height = bg.height,
                    "background does not match canvas, using solid fill"
                );
                FrameRGBA::solid(self.canvas, style.fill_color)
            }
            None => FrameRGBA::solid(self.canvas, style.fill_color),
        };
        let overlay = self.render_overlay(text, style, background.is_some())?;
        premul_over_in_place(&mut base.data, &overlay.data);
        Ok(base)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/caption/renderer.rs"]
mod tests;
