use anyhow::{Result, anyhow};
use rustc_hash::FxHashMap;
use skrifa::{
    FontRef, GlyphId, MetadataProvider,
    instance::{LocationRef, Size},
    raw::FileRef,
};
use tracing::{trace, warn};

use super::{FontMetrics, TextMeasurer};
use crate::style::Paint;

/// Measures text with real font data. Paints without a font use the primary
/// face; named fonts resolve against families registered with
/// [`FontMeasurer::with_family`].
pub struct FontMeasurer<'a> {
    font: FontRef<'a>,
    families: FxHashMap<String, FontRef<'a>>,
}

/// Load the first font of a font file or collection.
pub fn load_font(data: &[u8]) -> Result<FontRef<'_>> {
    let file = FileRef::new(data).map_err(|e| anyhow!("Failed to parse font file: {:?}", e))?;

    file.fonts()
        .next()
        .ok_or_else(|| anyhow!("No fonts found in font file"))?
        .map_err(|e| anyhow!("Failed to load first font: {:?}", e))
}

impl<'a> FontMeasurer<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self> {
        Ok(Self {
            font: load_font(data)?,
            families: FxHashMap::default(),
        })
    }

    /// Register `data` under the family `name` (matched case-insensitively).
    pub fn with_family(mut self, name: &str, data: &'a [u8]) -> Result<Self> {
        self.families.insert(name.to_lowercase(), load_font(data)?);
        Ok(self)
    }

    /// The face `paint` resolves to.
    pub fn face(&self, paint: &Paint) -> Option<&FontRef<'a>> {
        match &paint.font {
            None => Some(&self.font),
            Some(name) => {
                let face = self.families.get(&name.to_lowercase());

                if face.is_none() {
                    trace!(%name, "Unknown font family");
                }

                face
            }
        }
    }

    pub(crate) fn glyph_id(face: &FontRef<'a>, c: char) -> GlyphId {
        face.charmap().map(c).unwrap_or_else(|| {
            warn!(%c, "Missing glyph, using .notdef");
            GlyphId::NOTDEF
        })
    }
}

impl std::fmt::Debug for FontMeasurer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontMeasurer")
            .field("families", &self.families.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl TextMeasurer for FontMeasurer<'_> {
    fn advance(&self, text: &str, paint: &Paint) -> Option<f64> {
        let face = self.face(paint)?;
        let glyph_metrics = face.glyph_metrics(Size::new(paint.size as f32), LocationRef::default());

        let width: f32 = text
            .chars()
            .map(|c| {
                glyph_metrics
                    .advance_width(Self::glyph_id(face, c))
                    .unwrap_or_default()
            })
            .sum();

        Some(width as f64)
    }

    fn metrics(&self, paint: &Paint) -> Option<FontMetrics> {
        let face = self.face(paint)?;
        let metrics = face.metrics(Size::new(paint.size as f32), LocationRef::default());

        Some(FontMetrics {
            ascent: metrics.ascent as f64,
            // Descent is negative (below the baseline) in font coordinates.
            descent: -(metrics.descent as f64),
            leading: metrics.leading as f64,
        })
    }
}
