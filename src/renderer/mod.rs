//! The surface text is measured against and drawn onto.
//!
//! Layout only talks to [`TextMeasurer`] and [`Canvas`]; the font-backed
//! implementations live in [`font`] and [`outline`].

pub mod font;
pub mod outline;

use kurbo::{Point, RoundedRect};
use rustc_hash::FxHashSet;

use crate::{
    annotate::is_wide,
    style::{Paint, Rgba},
};

/// Vertical font metrics, as positive distances from the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FontMetrics {
    pub ascent: f64,
    pub descent: f64,
    pub leading: f64,
}

impl FontMetrics {
    pub fn height(&self) -> f64 {
        self.ascent + self.descent
    }
}

/// Text measurement supplied by the rendering surface.
pub trait TextMeasurer {
    /// Advance width of `text` drawn with `paint`, or `None` when the paint
    /// cannot be resolved (for example an unknown font).
    fn advance(&self, text: &str, paint: &Paint) -> Option<f64>;

    /// Metrics of the face `paint` resolves to.
    fn metrics(&self, paint: &Paint) -> Option<FontMetrics>;
}

impl<T: TextMeasurer + ?Sized> TextMeasurer for &T {
    fn advance(&self, text: &str, paint: &Paint) -> Option<f64> {
        (**self).advance(text, paint)
    }

    fn metrics(&self, paint: &Paint) -> Option<FontMetrics> {
        (**self).metrics(paint)
    }
}

/// Draw calls issued by layout. `origin` is the left end of the baseline,
/// with any baseline shift already applied.
pub trait Canvas {
    fn fill_text(&mut self, text: &str, origin: Point, paint: &Paint);

    fn fill_rect(&mut self, rect: RoundedRect, color: Rgba);
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Text {
        text: String,
        origin: Point,
        paint: Paint,
    },
    Rect {
        rect: RoundedRect,
        color: Rgba,
    },
}

/// A canvas that records draw calls in order.
#[derive(Debug, Clone, Default)]
pub struct DisplayList {
    pub commands: Vec<DrawCommand>,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded text draws, as `(text, origin, paint)`.
    pub fn texts(&self) -> impl Iterator<Item = (&str, Point, &Paint)> {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::Text {
                text,
                origin,
                paint,
            } => Some((text.as_str(), *origin, paint)),
            DrawCommand::Rect { .. } => None,
        })
    }

    pub fn rects(&self) -> impl Iterator<Item = (RoundedRect, Rgba)> {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::Rect { rect, color } => Some((*rect, *color)),
            DrawCommand::Text { .. } => None,
        })
    }
}

impl Canvas for DisplayList {
    fn fill_text(&mut self, text: &str, origin: Point, paint: &Paint) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            origin,
            paint: paint.clone(),
        });
    }

    fn fill_rect(&mut self, rect: RoundedRect, color: Rgba) {
        self.commands.push(DrawCommand::Rect { rect, color });
    }
}

/// Approximate metrics without font data: wide (CJK) characters advance a
/// full em, everything else half an em.
#[derive(Debug, Clone)]
pub struct MonoMeasurer {
    ascent: f64,
    descent: f64,
    families: FxHashSet<String>,
}

impl MonoMeasurer {
    pub const ASCENT: f64 = 0.8;
    pub const DESCENT: f64 = 0.2;

    pub fn new() -> Self {
        Self {
            ascent: Self::ASCENT,
            descent: Self::DESCENT,
            families: FxHashSet::default(),
        }
    }

    /// Accept `name` as a [`CustomFont`](crate::style::StyleAttribute::CustomFont)
    /// family. Other families fail to resolve.
    pub fn with_family(mut self, name: &str) -> Self {
        self.families.insert(name.to_lowercase());
        self
    }

    fn resolves(&self, paint: &Paint) -> bool {
        paint
            .font
            .as_ref()
            .is_none_or(|name| self.families.contains(&name.to_lowercase()))
    }
}

impl Default for MonoMeasurer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextMeasurer for MonoMeasurer {
    fn advance(&self, text: &str, paint: &Paint) -> Option<f64> {
        if !self.resolves(paint) {
            return None;
        }

        let ems: f64 = text
            .chars()
            .map(|c| if is_wide(c) { 1.0 } else { 0.5 })
            .sum();

        Some(ems * paint.size)
    }

    fn metrics(&self, paint: &Paint) -> Option<FontMetrics> {
        if !self.resolves(paint) {
            return None;
        }

        Some(FontMetrics {
            ascent: self.ascent * paint.size,
            descent: self.descent * paint.size,
            leading: 0.0,
        })
    }
}
