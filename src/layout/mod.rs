//! Measuring and placing annotated segments.
//!
//! Coordinates are y-down: a negative `y` offset is above the baseline.

pub mod flow;

use std::{num::NonZeroUsize, str::FromStr};

use anyhow::anyhow;
use kurbo::{Point, Rect, RoundedRect};
use tracing::{debug, trace, warn};

use crate::{
    cache::LayoutCache,
    markup::AnnotatedSegment,
    renderer::{Canvas, FontMetrics, TextMeasurer},
    style::{FormattedText, Paint, Rgba},
};

pub const MIN_RATIO: f64 = 0.3;
pub const MAX_RATIO: f64 = 1.0;
pub const DEFAULT_RATIO: f64 = 0.65;

/// Horizontal placement of a gloss narrower than its base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RubyAlign {
    /// flush with the start of the reserved box
    Start,
    #[default]
    Center,
    /// flush with the end of the reserved box
    End,
    /// centered over the base run itself
    Distribute,
}

impl FromStr for RubyAlign {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "start" => Ok(RubyAlign::Start),
            "center" => Ok(RubyAlign::Center),
            "end" => Ok(RubyAlign::End),
            "distribute" => Ok(RubyAlign::Distribute),
            other => Err(anyhow!("Unknown ruby alignment: {}", other)),
        }
    }
}

/// A rounded box drawn behind every annotated segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Highlight {
    pub color: Rgba,
    pub radius: f64,
}

/// Caller-configurable gloss style.
#[derive(Debug, Clone, PartialEq)]
pub struct RubyStyle {
    /// gloss size as a fraction of the base size, kept within
    /// [`MIN_RATIO`]..=[`MAX_RATIO`]
    ratio: f64,
    /// gloss color; the base color when unset
    pub color: Option<Rgba>,
    /// gap between the top of the base run and the bottom of the gloss
    pub spacing: f64,
    pub align: RubyAlign,
    pub highlight: Option<Highlight>,
    /// gloss font family
    pub font: Option<String>,
    /// when true, each gloss sits directly above its own base; otherwise
    /// glosses on a line share the highest gloss baseline
    pub tight: bool,
}

impl RubyStyle {
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn set_ratio(&mut self, ratio: f64) {
        self.ratio = clamp_ratio(ratio);
    }

    pub fn with_ratio(mut self, ratio: f64) -> Self {
        self.set_ratio(ratio);
        self
    }

    pub fn with_spacing(mut self, spacing: f64) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn with_align(mut self, align: RubyAlign) -> Self {
        self.align = align;
        self
    }
}

impl Default for RubyStyle {
    fn default() -> Self {
        Self {
            ratio: DEFAULT_RATIO,
            color: None,
            spacing: 0.0,
            align: RubyAlign::Center,
            highlight: None,
            font: None,
            tight: false,
        }
    }
}

fn clamp_ratio(ratio: f64) -> f64 {
    if ratio.is_nan() {
        return DEFAULT_RATIO;
    }

    ratio.clamp(MIN_RATIO, MAX_RATIO)
}

/// Placement of one annotated segment relative to its origin (the left end
/// of the base baseline).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutMetrics {
    pub base_width: f64,
    pub gloss_width: f64,
    /// `max(base_width, gloss_width)`
    pub reserved_width: f64,
    pub base_offset_x: f64,
    pub gloss_offset_x: f64,
    /// gloss baseline, relative to the base baseline
    pub gloss_offset_y: f64,
    /// ascent of the base run alone
    pub base_ascent: f64,
    /// ascent extended to cover the gloss
    pub ascent: f64,
    pub descent: f64,
    pub leading: f64,
}

/// State of a cached measurement relative to the current parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Valid,
    Stale,
}

/// Everything a measurement depends on besides the segment itself.
#[derive(Debug, Clone, PartialEq)]
struct LayoutParams {
    font_size: f64,
    ratio: f64,
    spacing: f64,
    align: RubyAlign,
    font: Option<String>,
    base_font: Option<String>,
}

#[derive(Debug)]
struct CachedMetrics {
    params: LayoutParams,
    metrics: LayoutMetrics,
}

/// Measures and draws annotated segments, caching metrics per segment
/// (base text, base styles and gloss). A cached entry whose parameters no longer match is recomputed on
/// its next use.
#[derive(Debug)]
pub struct RubyLayout {
    style: RubyStyle,
    paint: Paint,
    cache: LayoutCache<String, CachedMetrics>,
}

impl RubyLayout {
    /// `paint` is the enclosing paint: default size, color and font of the
    /// text being laid out.
    pub fn new(style: RubyStyle, paint: Paint) -> Self {
        Self {
            style,
            paint,
            cache: LayoutCache::default(),
        }
    }

    pub fn with_capacity(style: RubyStyle, paint: Paint, capacity: NonZeroUsize) -> Self {
        Self {
            style,
            paint,
            cache: LayoutCache::new(capacity),
        }
    }

    pub fn style(&self) -> &RubyStyle {
        &self.style
    }

    pub fn style_mut(&mut self) -> &mut RubyStyle {
        &mut self.style
    }

    pub fn paint(&self) -> &Paint {
        &self.paint
    }

    pub fn set_ratio(&mut self, ratio: f64) {
        self.style.set_ratio(ratio);
    }

    pub fn set_spacing(&mut self, spacing: f64) {
        self.style.spacing = spacing;
    }

    pub fn set_align(&mut self, align: RubyAlign) {
        self.style.align = align;
    }

    pub fn set_font_size(&mut self, size: f64) {
        self.paint.size = size;
    }

    pub fn evict_all(&mut self) {
        self.cache.evict_all();
    }

    /// The enclosing paint at `font_size`.
    pub fn base_paint(&self, font_size: f64) -> Paint {
        Paint {
            size: font_size,
            ..self.paint.clone()
        }
    }

    /// The paint glosses are drawn with, over a base of `font_size`.
    pub fn gloss_paint(&self, font_size: f64) -> Paint {
        let mut paint = Paint::new(font_size * self.style.ratio)
            .with_color(self.style.color.unwrap_or(self.paint.color))
            .with_font(self.style.font.clone().or_else(|| self.paint.font.clone()));
        paint.italic = self.paint.italic;
        paint
    }

    fn params(&self, font_size: f64) -> LayoutParams {
        LayoutParams {
            font_size,
            ratio: self.style.ratio,
            spacing: self.style.spacing,
            align: self.style.align,
            font: self.style.font.clone(),
            base_font: self.paint.font.clone(),
        }
    }

    /// Whether a measurement of `segment` is cached, and if so whether it
    /// still matches the current parameters.
    pub fn cache_state(&self, segment: &AnnotatedSegment, font_size: f64) -> Option<CacheState> {
        let params = self.params(font_size);

        self.cache.peek(segment.layout_key().as_str()).map(|cached| {
            if cached.params == params {
                CacheState::Valid
            } else {
                CacheState::Stale
            }
        })
    }

    /// Measure `segment` over a base of `font_size`.
    pub fn measure(
        &mut self,
        segment: &AnnotatedSegment,
        font_size: f64,
        measurer: &impl TextMeasurer,
    ) -> LayoutMetrics {
        let params = self.params(font_size);
        let key = segment.layout_key();

        if let Some(cached) = self.cache.get(key.as_str()) {
            if cached.params == params {
                trace!(markup = %segment.markup, "Layout cache hit");
                return cached.metrics;
            }

            debug!(markup = %segment.markup, "Layout cache entry stale, remeasuring");
        }

        let metrics = self.compute(segment, font_size, measurer);

        self.cache.put(key, CachedMetrics { params, metrics });

        metrics
    }

    fn compute(
        &self,
        segment: &AnnotatedSegment,
        font_size: f64,
        measurer: &impl TextMeasurer,
    ) -> LayoutMetrics {
        let base_paint = self.base_paint(font_size);
        let (base_width, base) = measure_formatted(&segment.base, &base_paint, measurer);

        let gloss_paint = self.gloss_paint(font_size);
        let gloss_width = resolve_advance(measurer, &segment.gloss, &gloss_paint, &base_paint);
        let gloss = resolve_metrics(measurer, &gloss_paint, &base_paint);

        let reserved_width = base_width.max(gloss_width);

        let base_offset_x = if gloss_width > base_width {
            (reserved_width - base_width) / 2.0
        } else {
            0.0
        };

        let gloss_offset_x = match self.style.align {
            RubyAlign::Start => 0.0,
            RubyAlign::Center => (reserved_width - gloss_width) / 2.0,
            RubyAlign::End => reserved_width - gloss_width,
            RubyAlign::Distribute => {
                if gloss_width <= base_width {
                    base_offset_x + (base_width - gloss_width) / 2.0
                } else {
                    (reserved_width - gloss_width) / 2.0
                }
            }
        };

        let spacing = self.style.spacing;

        LayoutMetrics {
            base_width,
            gloss_width,
            reserved_width,
            base_offset_x,
            gloss_offset_x,
            gloss_offset_y: -(base.ascent + spacing + gloss.descent),
            base_ascent: base.ascent,
            ascent: base.ascent + gloss.height() + spacing,
            descent: base.descent,
            leading: base.leading,
        }
    }

    /// Draw `segment` with its base baseline starting at `origin`.
    ///
    /// `gloss_baseline`, when given, overrides the segment's own gloss
    /// offset so glosses across a line can share one baseline.
    pub fn draw(
        &mut self,
        segment: &AnnotatedSegment,
        font_size: f64,
        origin: Point,
        gloss_baseline: Option<f64>,
        measurer: &impl TextMeasurer,
        canvas: &mut impl Canvas,
    ) -> LayoutMetrics {
        let metrics = self.measure(segment, font_size, measurer);
        let gloss_offset_y = gloss_baseline.unwrap_or(metrics.gloss_offset_y);

        if let Some(highlight) = self.style.highlight {
            let gloss = resolve_metrics(
                measurer,
                &self.gloss_paint(font_size),
                &self.base_paint(font_size),
            );
            let top = origin.y + (gloss_offset_y - gloss.ascent).min(-metrics.ascent);

            let rect = Rect::new(
                origin.x,
                top,
                origin.x + metrics.reserved_width,
                origin.y + metrics.descent,
            );

            canvas.fill_rect(RoundedRect::from_rect(rect, highlight.radius), highlight.color);
        }

        draw_formatted(
            &segment.base,
            &self.base_paint(font_size),
            Point::new(origin.x + metrics.base_offset_x, origin.y),
            measurer,
            canvas,
        );

        canvas.fill_text(
            &segment.gloss,
            Point::new(origin.x + metrics.gloss_offset_x, origin.y + gloss_offset_y),
            &self.gloss_paint(font_size),
        );

        metrics
    }
}

/// Advance of `text` with `paint`. If the paint cannot be resolved the font
/// is dropped first, then the enclosing paint is used.
fn resolve_advance(
    measurer: &impl TextMeasurer,
    text: &str,
    paint: &Paint,
    enclosing: &Paint,
) -> f64 {
    measurer
        .advance(text, paint)
        .or_else(|| measurer.advance(text, &paint.clone().with_font(enclosing.font.clone())))
        .or_else(|| measurer.advance(text, enclosing))
        .unwrap_or_else(|| {
            warn!(text, "No measurement available, treating run as zero width");
            0.0
        })
}

fn resolve_metrics(measurer: &impl TextMeasurer, paint: &Paint, enclosing: &Paint) -> FontMetrics {
    measurer
        .metrics(paint)
        .or_else(|| measurer.metrics(&paint.clone().with_font(enclosing.font.clone())))
        .or_else(|| measurer.metrics(enclosing))
        .unwrap_or_default()
}

/// Width of `text` and the metrics covering all of its runs, including any
/// baseline shifts.
pub fn measure_formatted(
    text: &FormattedText,
    enclosing: &Paint,
    measurer: &impl TextMeasurer,
) -> (f64, FontMetrics) {
    let mut width = 0.0;
    let mut extent = resolve_metrics(measurer, enclosing, enclosing);

    for run in text.runs() {
        let paint = run.paint(enclosing);
        let run_metrics = resolve_metrics(measurer, &paint, enclosing);

        width += resolve_advance(measurer, run.text, &paint, enclosing);
        extent.ascent = extent.ascent.max(run_metrics.ascent - paint.baseline_shift);
        extent.descent = extent.descent.max(run_metrics.descent + paint.baseline_shift);
        extent.leading = extent.leading.max(run_metrics.leading);
    }

    (width, extent)
}

/// Replay the runs of `text` from `origin`, each with its own paint. Returns
/// the total advance.
pub fn draw_formatted(
    text: &FormattedText,
    enclosing: &Paint,
    origin: Point,
    measurer: &impl TextMeasurer,
    canvas: &mut impl Canvas,
) -> f64 {
    let mut x = origin.x;

    for run in text.runs() {
        let paint = run.paint(enclosing);
        let width = resolve_advance(measurer, run.text, &paint, enclosing);

        if let Some(background) = paint.background {
            let run_metrics = resolve_metrics(measurer, &paint, enclosing);
            let baseline = origin.y + paint.baseline_shift;

            let rect = Rect::new(
                x,
                baseline - run_metrics.ascent,
                x + width,
                baseline + run_metrics.descent,
            );

            canvas.fill_rect(RoundedRect::from_rect(rect, 0.0), background);
        }

        canvas.fill_text(run.text, Point::new(x, origin.y + paint.baseline_shift), &paint);
        x += width;
    }

    x - origin.x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        markup::MarkupParser,
        renderer::{DisplayList, MonoMeasurer},
        style::StyleAttribute,
    };

    const EPSILON: f64 = 1e-3;

    fn segment(base: &str, gloss: &str) -> AnnotatedSegment {
        AnnotatedSegment::new(FormattedText::new(base), gloss).expect("non-empty segment")
    }

    fn layout(align: RubyAlign) -> RubyLayout {
        RubyLayout::new(RubyStyle::default().with_align(align), Paint::new(20.0))
    }

    #[test]
    fn ratio_is_clamped() {
        let mut style = RubyStyle::default();
        assert_eq!(style.ratio(), DEFAULT_RATIO);

        style.set_ratio(0.1);
        assert_eq!(style.ratio(), 0.3);

        style.set_ratio(2.0);
        assert_eq!(style.ratio(), 1.0);

        style.set_ratio(0.5);
        assert_eq!(style.ratio(), 0.5);
    }

    #[test]
    fn narrow_gloss_is_centered() {
        // Base "漢字" is 40px wide, gloss "ab" at 13px is 13px wide.
        let mut layout = layout(RubyAlign::Center);
        let metrics = layout.measure(&segment("漢字", "ab"), 20.0, &MonoMeasurer::new());

        assert!((metrics.base_width - 40.0).abs() < EPSILON);
        assert!((metrics.gloss_width - 13.0).abs() < EPSILON);
        assert_eq!(metrics.reserved_width, metrics.base_width);
        assert_eq!(metrics.base_offset_x, 0.0);
        assert!(
            (metrics.gloss_offset_x - (metrics.reserved_width - metrics.gloss_width) / 2.0).abs()
                < EPSILON
        );
    }

    #[test]
    fn wide_gloss_centers_the_base() {
        // Base "a" is 10px wide, gloss "かんじ" is 3 * 13px.
        let mut layout = layout(RubyAlign::Center);
        let metrics = layout.measure(&segment("a", "かんじ"), 20.0, &MonoMeasurer::new());

        assert!((metrics.reserved_width - 39.0).abs() < EPSILON);
        assert!((metrics.base_offset_x - 14.5).abs() < EPSILON);
        assert_eq!(metrics.gloss_offset_x, 0.0);
    }

    #[test]
    fn alignment_policies() {
        let measurer = MonoMeasurer::new();
        let narrow = segment("漢字", "ab");

        let offset = |align| layout(align).measure(&narrow, 20.0, &measurer).gloss_offset_x;

        assert_eq!(offset(RubyAlign::Start), 0.0);
        assert!((offset(RubyAlign::End) - 27.0).abs() < EPSILON);
        assert!((offset(RubyAlign::Center) - 13.5).abs() < EPSILON);
        assert!((offset(RubyAlign::Distribute) - 13.5).abs() < EPSILON);
    }

    #[test]
    fn reserved_width_covers_both_runs() {
        let measurer = MonoMeasurer::new();

        for align in [
            RubyAlign::Start,
            RubyAlign::Center,
            RubyAlign::End,
            RubyAlign::Distribute,
        ] {
            for (base, gloss) in [("漢字", "a"), ("a", "かんじ"), ("ab", "かん"), ("字", "字")] {
                let metrics = layout(align).measure(&segment(base, gloss), 20.0, &measurer);

                assert!(metrics.reserved_width >= metrics.base_width, "{align:?} {base} {gloss}");
                assert!(metrics.reserved_width >= metrics.gloss_width, "{align:?} {base} {gloss}");
                assert!(metrics.gloss_offset_x >= 0.0);
                assert!(
                    metrics.gloss_offset_x + metrics.gloss_width
                        <= metrics.reserved_width + EPSILON
                );
            }
        }
    }

    #[test]
    fn gloss_sits_above_the_base() {
        let mut layout = RubyLayout::new(RubyStyle::default().with_spacing(2.0), Paint::new(20.0));
        let metrics = layout.measure(&segment("漢", "かん"), 20.0, &MonoMeasurer::new());

        // base ascent 16, gloss at 13px: descent 2.6, height 13
        assert!((metrics.base_ascent - 16.0).abs() < EPSILON);
        assert!((metrics.gloss_offset_y + (16.0 + 2.0 + 2.6)).abs() < EPSILON);
        assert!((metrics.ascent - (16.0 + 13.0 + 2.0)).abs() < EPSILON);
        assert!((metrics.descent - 4.0).abs() < EPSILON);
    }

    #[test]
    fn styled_runs_are_measured_separately() {
        let mut base = FormattedText::new("ab");
        base.push_span(1..2, StyleAttribute::RelativeSize(2.0));
        let styled = AnnotatedSegment::new(base, "x").expect("segment");

        let metrics = layout(RubyAlign::Center).measure(&styled, 20.0, &MonoMeasurer::new());

        assert!((metrics.base_width - 30.0).abs() < EPSILON);
        assert!((metrics.base_ascent - 32.0).abs() < EPSILON);
    }

    #[test]
    fn same_text_with_other_styles_is_measured_again() {
        let measurer = MonoMeasurer::new();
        let mut layout = layout(RubyAlign::Center);

        let plain = layout.measure(&segment("ab", "x"), 20.0, &measurer);
        assert!((plain.base_width - 20.0).abs() < EPSILON);

        let mut base = FormattedText::new("ab");
        base.push_span(0..2, StyleAttribute::RelativeSize(2.0));
        let styled = AnnotatedSegment::new(base, "x").expect("segment");

        assert_eq!(layout.cache_state(&styled, 20.0), None);

        let metrics = layout.measure(&styled, 20.0, &measurer);
        assert!((metrics.base_width - 40.0).abs() < EPSILON);
    }

    #[test]
    fn unknown_font_falls_back_to_enclosing_paint() {
        let mut base = FormattedText::new("ab");
        base.push_span(0..2, StyleAttribute::CustomFont("missing".into()));
        let styled = AnnotatedSegment::new(base, "x").expect("segment");

        let metrics = layout(RubyAlign::Center).measure(&styled, 20.0, &MonoMeasurer::new());

        assert!((metrics.base_width - 20.0).abs() < EPSILON);
    }

    #[test]
    fn parameter_changes_mark_entries_stale() {
        let measurer = MonoMeasurer::new();
        let mut layout = layout(RubyAlign::Center);
        let segment = segment("漢字", "かんじ");

        assert_eq!(layout.cache_state(&segment, 20.0), None);

        let before = layout.measure(&segment, 20.0, &measurer);
        assert_eq!(layout.cache_state(&segment, 20.0), Some(CacheState::Valid));
        assert_eq!(layout.cache_state(&segment, 30.0), Some(CacheState::Stale));

        layout.set_ratio(1.0);
        assert_eq!(layout.cache_state(&segment, 20.0), Some(CacheState::Stale));

        let after = layout.measure(&segment, 20.0, &measurer);
        assert!(after.gloss_width > before.gloss_width);
        assert_eq!(layout.cache_state(&segment, 20.0), Some(CacheState::Valid));
    }

    #[test]
    fn default_ratio_applies_to_the_gloss() {
        let mut parser = MarkupParser::new();
        let document = parser.parse("<ruby>漢字<rt>かんじ</rt></ruby>です");
        let segment = document.annotated().next().expect("annotated segment");

        let metrics = layout(RubyAlign::Center).measure(segment, 20.0, &MonoMeasurer::new());

        assert!((metrics.gloss_width - 3.0 * 20.0 * DEFAULT_RATIO).abs() < EPSILON);
    }

    #[test]
    fn draw_replays_runs_then_gloss() {
        let mut base = FormattedText::new("ab");
        base.push_span(0..1, StyleAttribute::Bold);
        base.push_span(1..2, StyleAttribute::BackgroundColor(Rgba::WHITE));
        let styled = AnnotatedSegment::new(base, "かんじ").expect("segment");

        let mut canvas = DisplayList::new();
        let metrics = layout(RubyAlign::Center).draw(
            &styled,
            20.0,
            Point::new(5.0, 50.0),
            None,
            &MonoMeasurer::new(),
            &mut canvas,
        );

        let texts: Vec<_> = canvas.texts().collect();
        assert_eq!(texts.len(), 3);

        let (text, origin, paint) = texts[0];
        assert_eq!(text, "a");
        assert!(paint.bold);
        assert!((origin.x - (5.0 + metrics.base_offset_x)).abs() < EPSILON);

        let (text, origin, _) = texts[1];
        assert_eq!(text, "b");
        assert!((origin.x - (5.0 + metrics.base_offset_x + 10.0)).abs() < EPSILON);

        let (text, origin, paint) = texts[2];
        assert_eq!(text, "かんじ");
        assert!((origin.y - (50.0 + metrics.gloss_offset_y)).abs() < EPSILON);
        assert!((paint.size - 13.0).abs() < EPSILON);

        assert_eq!(canvas.rects().count(), 1, "background run");
    }

    #[test]
    fn highlight_covers_the_reserved_box() {
        let style = RubyStyle {
            highlight: Some(Highlight {
                color: Rgba::rgb(0xff, 0xff, 0),
                radius: 3.0,
            }),
            ..RubyStyle::default()
        };
        let mut layout = RubyLayout::new(style, Paint::new(20.0));
        let mut canvas = DisplayList::new();

        let metrics = layout.draw(
            &segment("漢", "かん"),
            20.0,
            Point::new(0.0, 40.0),
            None,
            &MonoMeasurer::new(),
            &mut canvas,
        );

        let (rect, color) = canvas.rects().next().expect("highlight");
        assert_eq!(color, Rgba::rgb(0xff, 0xff, 0));
        assert!((rect.width() - metrics.reserved_width).abs() < EPSILON);
        assert!((rect.rect().y0 - (40.0 - metrics.ascent)).abs() < EPSILON);
        assert!((rect.rect().y1 - (40.0 + metrics.descent)).abs() < EPSILON);
    }

    #[test]
    fn parses_alignment_names() {
        assert_eq!("END".parse::<RubyAlign>().ok(), Some(RubyAlign::End));
        assert!("middle".parse::<RubyAlign>().is_err());
    }
}
