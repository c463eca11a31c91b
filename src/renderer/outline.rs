use std::fmt::Write as _;

use kurbo::{Affine, BezPath, Point, Rect, RoundedRect, Shape};
use skrifa::{
    MetadataProvider,
    instance::{LocationRef, Size},
};
use tracing::warn;

use super::{Canvas, font::FontMeasurer};
use crate::{pen::PathPen, style::{Paint, Rgba}};

/// Slant used to synthesize italics (about 12 degrees).
const ITALIC_SLANT: f64 = 0.2;
/// Horizontal smear used to synthesize bold, as a fraction of the font size.
/// Advances are left as measured.
const EMBOLDEN_OFFSET: f64 = 0.03;
/// Decoration thickness, as a fraction of the font size.
const DECORATION_THICKNESS: f64 = 0.06;
const UNDERLINE_OFFSET: f64 = 0.12;
const STRIKETHROUGH_OFFSET: f64 = -0.3;
const FLATTEN_TOLERANCE: f64 = 0.1;

/// Draws glyph outlines into filled paths, one layer per consecutive color.
pub struct OutlineCanvas<'m, 'a> {
    fonts: &'m FontMeasurer<'a>,
    layers: Vec<(Rgba, BezPath)>,
}

impl<'m, 'a> OutlineCanvas<'m, 'a> {
    pub fn new(fonts: &'m FontMeasurer<'a>) -> Self {
        Self {
            fonts,
            layers: Vec::new(),
        }
    }

    pub fn layers(&self) -> &[(Rgba, BezPath)] {
        &self.layers
    }

    fn layer(&mut self, color: Rgba) -> &mut BezPath {
        let reuse = self.layers.last().is_some_and(|(last, _)| *last == color);

        if !reuse {
            self.layers.push((color, BezPath::new()));
        }

        let last = self.layers.len() - 1;
        &mut self.layers[last].1
    }

    fn fill(&mut self, color: Rgba, shape: &impl Shape) {
        let path = shape.to_path(FLATTEN_TOLERANCE);
        self.layer(color).extend(path);
    }

    /// Serialize as a standalone SVG document of the given size.
    pub fn to_svg(&self, width: f64, height: f64) -> String {
        let mut svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = width.ceil(),
            h = height.ceil(),
        );
        svg.push('\n');

        for (color, path) in &self.layers {
            if path.elements().is_empty() {
                continue;
            }

            let _ = write!(svg, r#"<path fill="{}""#, color.to_hex());

            if color.a != 0xff {
                let _ = write!(svg, r#" fill-opacity="{:.3}""#, color.opacity());
            }

            let _ = writeln!(svg, r#" d="{}"/>"#, path.to_svg());
        }

        svg.push_str("</svg>\n");
        svg
    }
}

impl Canvas for OutlineCanvas<'_, '_> {
    fn fill_text(&mut self, text: &str, origin: Point, paint: &Paint) {
        let fonts = self.fonts;

        // Fall back to the primary face when the paint's family is unknown.
        let Some(face) = fonts.face(paint).or_else(|| fonts.face(&Paint::new(paint.size))) else {
            return;
        };

        let size = Size::new(paint.size as f32);
        let outlines = face.outline_glyphs();
        let glyph_metrics = face.glyph_metrics(size, LocationRef::default());
        let slant = if paint.italic { ITALIC_SLANT } else { 0.0 };
        let embolden = paint
            .bold
            .then(|| Affine::translate((paint.size * EMBOLDEN_OFFSET, 0.0)));

        let mut glyphs = BezPath::new();
        let mut x = origin.x;

        for c in text.chars() {
            let gid = FontMeasurer::glyph_id(face, c);

            if let Some(glyph) = outlines.get(gid) {
                let mut pen = PathPen::at(Point::new(x, origin.y), slant);

                match glyph.draw(size, &mut pen) {
                    Ok(_) => {
                        // Overlapping copies with the same winding fill as
                        // their union under the nonzero rule.
                        if let Some(offset) = embolden {
                            glyphs.extend(offset * &pen.path);
                        }

                        glyphs.extend(pen.path);
                    }
                    Err(err) => warn!(%c, ?err, "Failed to draw glyph"),
                }
            }

            x += glyph_metrics.advance_width(gid).unwrap_or_default() as f64;
        }

        let thickness = paint.size * DECORATION_THICKNESS;
        let mut decorations = Vec::new();

        if paint.underline {
            decorations.push(origin.y + paint.size * UNDERLINE_OFFSET);
        }

        if paint.strikethrough {
            decorations.push(origin.y + paint.size * STRIKETHROUGH_OFFSET);
        }

        let layer = self.layer(paint.color);
        layer.extend(glyphs);

        for y in decorations {
            let rect = Rect::new(origin.x, y, x, y + thickness);
            layer.extend(rect.to_path(FLATTEN_TOLERANCE));
        }
    }

    fn fill_rect(&mut self, rect: RoundedRect, color: Rgba) {
        self.fill(color, &rect);
    }
}
