//! The closing "subscribe" card: solid color, centered title and subtitle, optional logo.

use std::time::Duration;

use crate::caption::CaptionRenderer;
use crate::caption::background::blit_premul_over;
use crate::caption::layout::TextBrushRgba8;
use crate::caption::raster::{PlacedLine, rasterize_overlay};
use crate::config::BumperConfig;
use crate::foundation::core::FrameRGBA;
use crate::foundation::error::{NarrateError, NarrateResult};
use crate::foundation::math::{premul_over_in_place, premultiply_rgba8_in_place};

/// Logo edge length in pixels.
pub const LOGO_SIZE: u32 = 100;
/// Top-left corner of the logo.
pub const LOGO_POSITION: (u32, u32) = (20, 20);
/// Vertical gap between the title block and the canvas center line.
const TITLE_GAP_PX: f32 = 20.0;

const LOGO_FETCH_TIMEOUT: Duration = Duration::from_secs(20);

/// Load a logo from a file path or `http(s)` URL and resize it to [`LOGO_SIZE`].
pub fn load_logo(source: &str) -> NarrateResult<image::RgbaImage> {
    let bytes = if source.starts_with("http://") || source.starts_with("https://") {
        fetch_url(source)?
    } else {
        std::fs::read(source)
            .map_err(|e| NarrateError::render(format!("failed to read logo '{source}': {e}")))?
    };
    let img = image::load_from_memory(&bytes)
        .map_err(|e| NarrateError::render(format!("failed to decode logo '{source}': {e}")))?;
    Ok(image::imageops::resize(
        &img.to_rgba8(),
        LOGO_SIZE,
        LOGO_SIZE,
        image::imageops::FilterType::Triangle,
    ))
}

fn fetch_url(url: &str) -> NarrateResult<Vec<u8>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(LOGO_FETCH_TIMEOUT)
        .build()
        .map_err(|e| NarrateError::render(format!("failed to build http client: {e}")))?;
    let resp = client
        .get(url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(|e| NarrateError::render(format!("failed to fetch logo '{url}': {e}")))?;
    let bytes = resp
        .bytes()
        .map_err(|e| NarrateError::render(format!("failed to read logo '{url}': {e}")))?;
    Ok(bytes.to_vec())
}

impl CaptionRenderer {
    /// Render the bumper card. A logo that cannot be loaded is logged and skipped.
    pub fn render_bumper(&mut self, bumper: &BumperConfig) -> NarrateResult<FrameRGBA> {
        let logo = bumper.logo.as_deref().and_then(|source| match load_logo(source) {
            Ok(img) => Some(img),
            Err(e) => {
                tracing::warn!("skipping bumper logo: {e}");
                None
            }
        });
        self.render_bumper_with_logo(bumper, logo.as_ref())
    }

    /// Render the bumper card with an already loaded logo.
    pub fn render_bumper_with_logo(
        &mut self,
        bumper: &BumperConfig,
        logo: Option<&image::RgbaImage>,
    ) -> NarrateResult<FrameRGBA> {
        let canvas = self.canvas;
        let mut frame = FrameRGBA::solid(canvas, bumper.color.to_rgba8());

        if let Some(logo) = logo {
            let mut premul = logo.as_raw().clone();
            premultiply_rgba8_in_place(&mut premul);
            let (w, h) = logo.dimensions();
            blit_premul_over(&mut frame, &premul, w, h, LOGO_POSITION.0, LOGO_POSITION.1);
        }

        let Some(engine) = self.engine.as_mut() else {
            return Ok(frame);
        };
        let brush = TextBrushRgba8::from(bumper.text_color.to_rgba8());
        let title = engine.layout_line(&bumper.title, bumper.title_size as f32, brush)?;
        let subtitle = engine.layout_line(&bumper.subtitle, bumper.subtitle_size as f32, brush)?;

        let cw = canvas.width as f32;
        let ch = canvas.height as f32;
        let title_h = title.height();
        let sub_h = subtitle.height();
        let title_y = ((ch - title_h) / 2.0 - title_h / 2.0 - TITLE_GAP_PX).floor();
        let sub_y = ((ch - sub_h) / 2.0 + title_h / 2.0 + TITLE_GAP_PX).floor();
        let title_x = ((cw - title.width()) / 2.0).floor();
        let sub_x = ((cw - subtitle.width()) / 2.0).floor();

        let lines = [
            PlacedLine {
                layout: title,
                x: title_x,
                y: title_y,
            },
            PlacedLine {
                layout: subtitle,
                x: sub_x,
                y: sub_y,
            },
        ];
        let text = rasterize_overlay(canvas, self.font_data.as_ref(), &[], &lines)?;
        premul_over_in_place(&mut frame.data, &text.data);
        Ok(frame)
    }
}
