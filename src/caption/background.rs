//! Fitting background images and video frames onto the output canvas.

use std::path::Path;

use image::imageops::FilterType;

use crate::foundation::core::{Canvas, FrameRGBA, Rgba8};
use crate::foundation::error::{NarrateError, NarrateResult};
use crate::foundation::math::{premul_over_in_place, premultiply_rgba8_in_place};

/// How background media is mapped onto the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum BackgroundFit {
    /// Aspect-preserving shrink-to-fit, centered over the fill color. Never upscales.
    #[default]
    Letterbox,
    /// Resize to exactly the canvas size.
    Stretch,
}

impl BackgroundFit {
    pub fn from_stretch(stretch: bool) -> Self {
        if stretch { Self::Stretch } else { Self::Letterbox }
    }
}

/// Size of `(w, h)` after a shrink-only fit into `canvas`.
pub fn letterbox_size(w: u32, h: u32, canvas: Canvas) -> (u32, u32) {
    if w <= canvas.width && h <= canvas.height {
        return (w, h);
    }
    let scale = (f64::from(canvas.width) / f64::from(w)).min(f64::from(canvas.height) / f64::from(h));
    let nw = ((f64::from(w) * scale).round() as u32).clamp(1, canvas.width);
    let nh = ((f64::from(h) * scale).round() as u32).clamp(1, canvas.height);
    (nw, nh)
}

/// Fit a straight-alpha image onto a canvas filled with `fill`.
pub fn fit_image(img: &image::RgbaImage, canvas: Canvas, fill: Rgba8, fit: BackgroundFit) -> FrameRGBA {
    let mut out = FrameRGBA::solid(canvas, fill);
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return out;
    }

    let (tw, th) = match fit {
        BackgroundFit::Stretch => (canvas.width, canvas.height),
        BackgroundFit::Letterbox => letterbox_size(w, h, canvas),
    };
    let resized;
    let src = if (tw, th) == (w, h) {
        img
    } else {
        resized = image::imageops::resize(img, tw, th, FilterType::Triangle);
        &resized
    };

    let mut premul = src.as_raw().clone();
    premultiply_rgba8_in_place(&mut premul);
    let x = (canvas.width - tw) / 2;
    let y = (canvas.height - th) / 2;
    blit_premul_over(&mut out, &premul, tw, th, x, y);
    out
}

/// Decode an image file and fit it onto the canvas.
pub fn load_background_image(
    path: &Path,
    canvas: Canvas,
    fill: Rgba8,
    fit: BackgroundFit,
) -> NarrateResult<FrameRGBA> {
    let img = image::open(path).map_err(|e| {
        NarrateError::render(format!(
            "failed to load background image '{}': {e}",
            path.display()
        ))
    })?;
    Ok(fit_image(&img.to_rgba8(), canvas, fill, fit))
}

/// Fit one decoded straight-alpha video frame onto the canvas.
pub fn fit_raw_frame(
    rgba: Vec<u8>,
    width: u32,
    height: u32,
    canvas: Canvas,
    fill: Rgba8,
    fit: BackgroundFit,
) -> NarrateResult<FrameRGBA> {
    let img = image::RgbaImage::from_raw(width, height, rgba).ok_or_else(|| {
        NarrateError::render(format!("video frame byte length does not match {width}x{height}"))
    })?;
    Ok(fit_image(&img, canvas, fill, fit))
}

/// Composite a premultiplied `w x h` RGBA8 block over `dst` at `(x, y)`, clipped to `dst`.
pub fn blit_premul_over(dst: &mut FrameRGBA, src: &[u8], w: u32, h: u32, x: u32, y: u32) {
    if x >= dst.width || y >= dst.height {
        return;
    }
    let cw = w.min(dst.width - x) as usize;
    let ch = h.min(dst.height - y) as usize;
    let dst_stride = dst.width as usize * 4;
    let src_stride = w as usize * 4;
    for row in 0..ch {
        let s = row * src_stride;
        let d = (y as usize + row) * dst_stride + x as usize * 4;
        premul_over_in_place(&mut dst.data[d..d + cw * 4], &src[s..s + cw * 4]);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/caption/background.rs"]
mod tests;
