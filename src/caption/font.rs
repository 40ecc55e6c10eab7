//! Font resolution with fallback.
//!
//! Order: the configured font file, well-known system font paths, then any sans-serif face
//! from the system font database. Failure at every step is not an error: callers render
//! without text.

use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Well-known locations of common sans-serif fonts.
pub const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/truetype/noto/NotoSans-Regular.ttf",
    "/usr/share/fonts/noto/NotoSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Helvetica.ttc",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Where a resolved font came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FontOrigin {
    Configured(PathBuf),
    SystemPath(PathBuf),
    SystemDatabase(String),
}

/// Font file bytes ready for both shaping and rasterization.
#[derive(Clone)]
pub struct LoadedFont {
    pub bytes: Arc<Vec<u8>>,
    /// Face index inside a collection file.
    pub index: u32,
    pub origin: FontOrigin,
}

impl std::fmt::Debug for LoadedFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedFont")
            .field("bytes", &self.bytes.len())
            .field("index", &self.index)
            .field("origin", &self.origin)
            .finish()
    }
}

/// Resolve a usable font, logging each fallback step.
pub fn resolve_font(configured: Option<&Path>) -> Option<LoadedFont> {
    if let Some(path) = configured {
        match read_font_file(path) {
            Ok(bytes) => {
                return Some(LoadedFont {
                    bytes: Arc::new(bytes),
                    index: 0,
                    origin: FontOrigin::Configured(path.to_path_buf()),
                });
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to load font, using fallback: {e}");
            }
        }
    }

    for candidate in SYSTEM_FONT_CANDIDATES {
        let path = Path::new(candidate);
        if let Ok(bytes) = read_font_file(path) {
            tracing::debug!(path = %path.display(), "using system font");
            return Some(LoadedFont {
                bytes: Arc::new(bytes),
                index: 0,
                origin: FontOrigin::SystemPath(path.to_path_buf()),
            });
        }
    }

    if let Some(font) = query_system_database() {
        return Some(font);
    }

    tracing::error!("no usable font found; captions will render without text");
    None
}

fn read_font_file(path: &Path) -> std::io::Result<Vec<u8>> {
    let bytes = std::fs::read(path)?;
    if bytes.len() < 12 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "file is too small to be a font",
        ));
    }
    Ok(bytes)
}

fn query_system_database() -> Option<LoadedFont> {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    let query = usvg::fontdb::Query {
        families: &[usvg::fontdb::Family::SansSerif],
        ..usvg::fontdb::Query::default()
    };
    let id = db.query(&query)?;
    let family = db
        .face(id)
        .and_then(|face| face.families.first().map(|(name, _)| name.clone()))
        .unwrap_or_else(|| "sans-serif".to_string());
    let (bytes, index) = db.with_face_data(id, |data, index| (data.to_vec(), index))?;
    tracing::debug!(family = %family, "using font from system database");
    Some(LoadedFont {
        bytes: Arc::new(bytes),
        index,
        origin: FontOrigin::SystemDatabase(family),
    })
}
