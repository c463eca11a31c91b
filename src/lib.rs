//! Ruby (interlinear gloss) text: parse `<ruby>base<rt>gloss</rt></ruby>`
//! markup, measure it and draw it onto a [`Canvas`].
//!
//! ```no_run
//! use kurbo::Point;
//! use rubify_text::{DisplayList, MonoMeasurer, Paint, RubyStyle, RubyText};
//!
//! let mut text = RubyText::new(RubyStyle::default(), Paint::new(24.0));
//! text.set_markup("<ruby>漢字<rt>かんじ</rt></ruby>です");
//!
//! let mut canvas = DisplayList::new();
//! let text_box = text.render(Point::ZERO, &MonoMeasurer::new(), &mut canvas);
//! println!("{}x{}", text_box.width, text_box.height);
//! ```

pub mod annotate;
pub mod cache;
pub mod layout;
pub mod markup;
pub mod pen;
pub mod renderer;
pub mod style;

use kurbo::Point;

pub use crate::{
    annotate::{Annotator, GlossTable, annotate_text},
    cache::LayoutCache,
    layout::{
        CacheState, Highlight, LayoutMetrics, RubyAlign, RubyLayout, RubyStyle,
        flow::{LineBox, TextBox},
    },
    markup::{AnnotatedSegment, MarkupParser, ParsedDocument, Segment, normalize},
    renderer::{Canvas, DisplayList, DrawCommand, FontMetrics, MonoMeasurer, TextMeasurer},
    style::{FormattedText, Paint, Rgba, StyleAttribute, StyleSpan},
};

/// A piece of ruby text: owns the parser and layout engine, and with them
/// both caches, for as long as it lives.
#[derive(Debug)]
pub struct RubyText {
    parser: MarkupParser,
    layout: RubyLayout,
    document: ParsedDocument,
}

impl RubyText {
    pub fn new(style: RubyStyle, paint: Paint) -> Self {
        Self {
            parser: MarkupParser::new(),
            layout: RubyLayout::new(style, paint),
            document: ParsedDocument::default(),
        }
    }

    /// Replace the text. The previous document is discarded.
    pub fn set_markup(&mut self, markup: &str) {
        self.document = self.parser.parse(markup);
    }

    pub fn document(&self) -> &ParsedDocument {
        &self.document
    }

    pub fn style(&self) -> &RubyStyle {
        self.layout.style()
    }

    pub fn layout_mut(&mut self) -> &mut RubyLayout {
        &mut self.layout
    }

    pub fn parser_mut(&mut self) -> &mut MarkupParser {
        &mut self.parser
    }

    pub fn measure(&mut self, measurer: &impl TextMeasurer) -> TextBox {
        layout::flow::measure(&self.document, &mut self.layout, measurer)
    }

    /// Draw the current document with its top left corner at `origin`.
    pub fn render(
        &mut self,
        origin: Point,
        measurer: &impl TextMeasurer,
        canvas: &mut impl Canvas,
    ) -> TextBox {
        layout::flow::draw(&self.document, &mut self.layout, origin, measurer, canvas)
    }

    /// Drop every cached parse and measurement.
    pub fn evict_all(&mut self) {
        self.parser.evict_all();
        self.layout.evict_all();
    }
}
