//! Flowing a whole [`ParsedDocument`] onto lines.

use kurbo::Point;
use tracing::debug;

use super::{RubyLayout, draw_formatted, measure_formatted, resolve_metrics};
use crate::{
    markup::{AnnotatedSegment, ParsedDocument, Segment},
    renderer::{Canvas, TextMeasurer},
    style::FormattedText,
};

/// One laid out line. Vertical positions are relative to the top of the
/// text box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LineBox {
    pub top: f64,
    pub baseline: f64,
    pub width: f64,
    pub ascent: f64,
    pub descent: f64,
    pub leading: f64,
    /// gloss baseline shared by the line, relative to `baseline`; `None`
    /// when the line has no annotations or glosses are placed tightly
    pub gloss_baseline: Option<f64>,
}

impl LineBox {
    pub fn height(&self) -> f64 {
        self.ascent + self.descent + self.leading
    }
}

/// Extent of a flowed document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextBox {
    pub width: f64,
    pub height: f64,
    pub lines: Vec<LineBox>,
}

#[derive(Debug)]
enum Item<'d> {
    Plain(FormattedText),
    Annotated(&'d AnnotatedSegment),
}

/// Split the document at `\n` in plain text. Annotated segments never
/// break.
fn split_lines(document: &ParsedDocument) -> Vec<Vec<Item<'_>>> {
    let mut lines = vec![Vec::new()];

    for segment in document {
        match segment {
            Segment::Plain(text) => {
                for (i, line) in text.lines().into_iter().enumerate() {
                    if i > 0 {
                        lines.push(Vec::new());
                    }

                    if !line.is_empty()
                        && let Some(current) = lines.last_mut()
                    {
                        current.push(Item::Plain(line));
                    }
                }
            }
            Segment::Annotated(annotated) => {
                if let Some(current) = lines.last_mut() {
                    current.push(Item::Annotated(annotated));
                }
            }
        }
    }

    lines
}

fn measure_line(
    items: &[Item<'_>],
    top: f64,
    layout: &mut RubyLayout,
    measurer: &impl TextMeasurer,
) -> LineBox {
    let font_size = layout.paint().size;
    let enclosing = layout.base_paint(font_size);
    let base = resolve_metrics(measurer, &enclosing, &enclosing);

    let mut line = LineBox {
        ascent: base.ascent,
        descent: base.descent,
        leading: base.leading,
        ..LineBox::default()
    };

    for item in items {
        match item {
            Item::Plain(text) => {
                let (width, metrics) = measure_formatted(text, &enclosing, measurer);

                line.width += width;
                line.ascent = line.ascent.max(metrics.ascent);
                line.descent = line.descent.max(metrics.descent);
                line.leading = line.leading.max(metrics.leading);
            }
            Item::Annotated(segment) => {
                let metrics = layout.measure(segment, font_size, measurer);

                line.width += metrics.reserved_width;
                line.ascent = line.ascent.max(metrics.ascent);
                line.descent = line.descent.max(metrics.descent);
                line.leading = line.leading.max(metrics.leading);

                if !layout.style().tight {
                    let highest = line
                        .gloss_baseline
                        .map_or(metrics.gloss_offset_y, |y| y.min(metrics.gloss_offset_y));
                    line.gloss_baseline = Some(highest);
                }
            }
        }
    }

    line.top = top;
    line.baseline = top + line.ascent;
    line
}

fn flow<'d>(
    document: &'d ParsedDocument,
    layout: &mut RubyLayout,
    measurer: &impl TextMeasurer,
) -> (TextBox, Vec<Vec<Item<'d>>>) {
    let lines = split_lines(document);
    let mut text_box = TextBox::default();

    for items in &lines {
        let line = measure_line(items, text_box.height, layout, measurer);

        text_box.width = text_box.width.max(line.width);
        text_box.height += line.height();
        text_box.lines.push(line);
    }

    debug!(
        lines = text_box.lines.len(),
        width = text_box.width,
        height = text_box.height,
        "Flowed document"
    );

    (text_box, lines)
}

/// Measure `document` without drawing it.
pub fn measure(
    document: &ParsedDocument,
    layout: &mut RubyLayout,
    measurer: &impl TextMeasurer,
) -> TextBox {
    flow(document, layout, measurer).0
}

/// Draw `document` with the top left corner of its box at `origin`.
pub fn draw(
    document: &ParsedDocument,
    layout: &mut RubyLayout,
    origin: Point,
    measurer: &impl TextMeasurer,
    canvas: &mut impl Canvas,
) -> TextBox {
    let (text_box, lines) = flow(document, layout, measurer);
    let font_size = layout.paint().size;
    let enclosing = layout.base_paint(font_size);

    for (line, items) in text_box.lines.iter().zip(&lines) {
        let baseline = origin.y + line.baseline;
        let mut x = origin.x;

        for item in items {
            match item {
                Item::Plain(text) => {
                    x += draw_formatted(text, &enclosing, Point::new(x, baseline), measurer, canvas);
                }
                Item::Annotated(segment) => {
                    let metrics = layout.draw(
                        segment,
                        font_size,
                        Point::new(x, baseline),
                        line.gloss_baseline,
                        measurer,
                        canvas,
                    );
                    x += metrics.reserved_width;
                }
            }
        }
    }

    text_box
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        layout::RubyStyle,
        markup::MarkupParser,
        renderer::{DisplayList, MonoMeasurer},
        style::Paint,
    };

    const EPSILON: f64 = 1e-3;

    fn parse(markup: &str) -> ParsedDocument {
        MarkupParser::new().parse(markup)
    }

    #[test]
    fn plain_text_is_one_line() {
        let document = parse("abcd");
        let mut layout = RubyLayout::new(RubyStyle::default(), Paint::new(10.0));

        let text_box = measure(&document, &mut layout, &MonoMeasurer::new());

        assert_eq!(text_box.lines.len(), 1);
        assert!((text_box.width - 20.0).abs() < EPSILON);
        assert!((text_box.height - 10.0).abs() < EPSILON);
    }

    #[test]
    fn line_breaks_start_new_lines() {
        let document = parse("ab<br>漢<rt>x</rt>\n<ruby>字<rt>じ</rt></ruby>");
        let mut layout = RubyLayout::new(RubyStyle::default(), Paint::new(10.0));

        let text_box = measure(&document, &mut layout, &MonoMeasurer::new());

        assert_eq!(text_box.lines.len(), 2);
        assert!(text_box.lines[0].gloss_baseline.is_none());
        assert!(text_box.lines[1].gloss_baseline.is_some());
        // the annotated line reserves room for its gloss
        assert!(text_box.lines[1].ascent > text_box.lines[0].ascent);
        assert!((text_box.lines[1].top - text_box.lines[0].height()).abs() < EPSILON);
    }

    #[test]
    fn glosses_share_the_highest_baseline() {
        let markup = "<ruby>a<rt>x</rt></ruby><ruby><big>b</big><rt>y</rt></ruby>";
        let document = parse(markup);
        let measurer = MonoMeasurer::new();

        let mut layout = RubyLayout::new(RubyStyle::default(), Paint::new(20.0));
        let mut canvas = DisplayList::new();
        draw(&document, &mut layout, Point::ZERO, &measurer, &mut canvas);

        let glosses: Vec<_> = canvas
            .texts()
            .filter(|(text, ..)| matches!(*text, "x" | "y"))
            .map(|(_, origin, _)| origin.y)
            .collect();

        assert_eq!(glosses.len(), 2);
        assert!((glosses[0] - glosses[1]).abs() < EPSILON);

        let tight = RubyStyle {
            tight: true,
            ..RubyStyle::default()
        };
        let mut layout = RubyLayout::new(tight, Paint::new(20.0));
        let mut canvas = DisplayList::new();
        draw(&document, &mut layout, Point::ZERO, &measurer, &mut canvas);

        let glosses: Vec<_> = canvas
            .texts()
            .filter(|(text, ..)| matches!(*text, "x" | "y"))
            .map(|(_, origin, _)| origin.y)
            .collect();

        assert!(glosses[1] < glosses[0], "larger base lifts its own gloss");
    }

    #[test]
    fn segments_are_placed_left_to_right() {
        let document = parse("ab<ruby>漢<rt>かんじ</rt></ruby>cd");
        let mut layout = RubyLayout::new(RubyStyle::default(), Paint::new(20.0));
        let mut canvas = DisplayList::new();

        let text_box = draw(
            &document,
            &mut layout,
            Point::new(2.0, 3.0),
            &MonoMeasurer::new(),
            &mut canvas,
        );

        let xs: Vec<_> = canvas
            .texts()
            .map(|(text, origin, _)| (text.to_string(), origin.x))
            .collect();

        // "ab" is 20px, the gloss at 13px reserves 39px.
        assert_eq!(xs[0], ("ab".to_string(), 2.0));
        assert_eq!(xs[1].0, "漢");
        assert!((xs[1].1 - (2.0 + 20.0 + 9.5)).abs() < EPSILON);
        assert_eq!(xs[2].0, "かんじ");
        assert!((xs[2].1 - 22.0).abs() < EPSILON);
        assert_eq!(xs[3].0, "cd");
        assert!((xs[3].1 - (2.0 + 20.0 + 39.0)).abs() < EPSILON);
        assert!((text_box.width - 79.0).abs() < EPSILON);

        let baseline = 3.0 + text_box.lines[0].baseline;
        assert!(canvas.texts().filter(|(t, ..)| *t != "かんじ").all(|(_, o, _)| o.y == baseline));
    }

    #[test]
    fn empty_document_has_one_empty_line() {
        let document = parse("");
        let mut layout = RubyLayout::new(RubyStyle::default(), Paint::new(10.0));

        let text_box = measure(&document, &mut layout, &MonoMeasurer::new());

        assert_eq!(text_box.lines.len(), 1);
        assert_eq!(text_box.width, 0.0);
    }
}
