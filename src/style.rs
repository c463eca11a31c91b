use std::ops::Range;

use tracing::warn;

/// Baseline shift applied by super/subscript, as a fraction of the font size
/// (half of a nominal 0.9em ascent).
const BASELINE_SHIFT_RATIO: f64 = 0.45;

/// A straight (non-premultiplied) 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const BLACK: Rgba = Rgba::rgb(0, 0, 0);
    pub const WHITE: Rgba = Rgba::rgb(0xff, 0xff, 0xff);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 0xff }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Parse `#rgb`, `#rrggbb`, `#aarrggbb` or one of the basic named colors.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();

        if let Some(hex) = value.strip_prefix('#') {
            if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return None;
            }

            let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();

            return match hex.len() {
                3 => {
                    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok();
                    Some(Self::rgb(nibble(0)? * 17, nibble(1)? * 17, nibble(2)? * 17))
                }
                6 => Some(Self::rgb(byte(0)?, byte(2)?, byte(4)?)),
                // Alpha comes first, as in the toolkit color ints this markup targets.
                8 => Some(Self::rgba(byte(2)?, byte(4)?, byte(6)?, byte(0)?)),
                _ => None,
            };
        }

        let named = match value.to_ascii_lowercase().as_str() {
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "red" => Self::rgb(0xff, 0, 0),
            "green" => Self::rgb(0, 0x80, 0),
            "lime" => Self::rgb(0, 0xff, 0),
            "blue" => Self::rgb(0, 0, 0xff),
            "yellow" => Self::rgb(0xff, 0xff, 0),
            "cyan" | "aqua" => Self::rgb(0, 0xff, 0xff),
            "magenta" | "fuchsia" => Self::rgb(0xff, 0, 0xff),
            "gray" | "grey" => Self::rgb(0x80, 0x80, 0x80),
            "silver" => Self::rgb(0xc0, 0xc0, 0xc0),
            "maroon" => Self::rgb(0x80, 0, 0),
            "navy" => Self::rgb(0, 0, 0x80),
            "olive" => Self::rgb(0x80, 0x80, 0),
            "purple" => Self::rgb(0x80, 0, 0x80),
            "teal" => Self::rgb(0, 0x80, 0x80),
            "orange" => Self::rgb(0xff, 0xa5, 0),
            "transparent" => Self::rgba(0, 0, 0, 0),
            _ => return None,
        };

        Some(named)
    }

    /// `#rrggbb`, dropping alpha.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn opacity(self) -> f64 {
        self.a as f64 / 255.0
    }
}

/// One inline style kind. Every kind is applied by [`Paint::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum StyleAttribute {
    Bold,
    Italic,
    Underline,
    Strikethrough,
    ForegroundColor(Rgba),
    BackgroundColor(Rgba),
    /// Multiplies the current size.
    RelativeSize(f64),
    /// Replaces the current size, in pixels.
    AbsoluteSize(f64),
    Superscript,
    Subscript,
    /// A font family name, resolved by the measurer.
    CustomFont(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StyleSpan {
    /// Byte range into the owning text.
    pub range: Range<usize>,
    pub attribute: StyleAttribute,
}

/// Text with inline style ranges. Ranges may nest; the effective style of a
/// character is every covering range applied in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormattedText {
    text: String,
    spans: Vec<StyleSpan>,
}

impl FormattedText {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            spans: Vec::new(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn spans(&self) -> &[StyleSpan] {
        &self.spans
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub(crate) fn push_str(&mut self, s: &str) {
        self.text.push_str(s);
    }

    pub(crate) fn push(&mut self, c: char) {
        self.text.push(c);
    }

    /// Add a style range. Empty ranges are ignored; ranges are clamped to the
    /// text and must fall on char boundaries.
    pub fn push_span(&mut self, range: Range<usize>, attribute: StyleAttribute) {
        let end = range.end.min(self.text.len());

        if range.start >= end {
            return;
        }

        if !self.text.is_char_boundary(range.start) || !self.text.is_char_boundary(end) {
            warn!(?range, "Dropping style span that splits a character");
            return;
        }

        self.spans.push(StyleSpan {
            range: range.start..end,
            attribute,
        });
    }

    /// Append another formatted text, shifting its spans.
    pub fn append(&mut self, other: &FormattedText) {
        let offset = self.text.len();

        self.text.push_str(&other.text);
        self.spans.extend(other.spans.iter().map(|span| StyleSpan {
            range: span.range.start + offset..span.range.end + offset,
            attribute: span.attribute.clone(),
        }));
    }

    /// Copy out a byte range, keeping the spans that overlap it.
    pub fn slice(&self, range: Range<usize>) -> FormattedText {
        let Some(text) = self.text.get(range.clone()) else {
            return FormattedText::default();
        };

        let spans = self
            .spans
            .iter()
            .filter_map(|span| {
                let start = span.range.start.max(range.start);
                let end = span.range.end.min(range.end);

                (start < end).then(|| StyleSpan {
                    range: start - range.start..end - range.start,
                    attribute: span.attribute.clone(),
                })
            })
            .collect();

        FormattedText {
            text: text.to_string(),
            spans,
        }
    }

    /// Split at `\n`, dropping the separators. Always yields at least one line.
    pub fn lines(&self) -> Vec<FormattedText> {
        let mut lines = Vec::new();
        let mut start = 0;

        for (i, _) in self.text.match_indices('\n') {
            lines.push(self.slice(start..i));
            start = i + 1;
        }

        lines.push(self.slice(start..self.text.len()));

        lines
    }

    /// Split into maximal runs sharing the same set of covering spans. A run
    /// boundary occurs wherever a span starts or ends.
    pub fn runs(&self) -> Vec<StyleRun<'_>> {
        let len = self.text.len();

        let mut boundaries = Vec::with_capacity(2 + self.spans.len() * 2);
        boundaries.push(0);
        boundaries.push(len);

        for span in &self.spans {
            boundaries.push(span.range.start);
            boundaries.push(span.range.end);
        }

        boundaries.sort_unstable();
        boundaries.dedup();

        boundaries
            .windows(2)
            .filter(|w| w[0] < w[1])
            .map(|w| {
                let (start, end) = (w[0], w[1]);

                let attributes = self
                    .spans
                    .iter()
                    .filter(|span| span.range.start <= start && span.range.end >= end)
                    .map(|span| &span.attribute)
                    .collect();

                StyleRun {
                    range: start..end,
                    text: &self.text[start..end],
                    attributes,
                }
            })
            .collect()
    }
}

impl From<&str> for FormattedText {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A style-homogeneous slice of a [`FormattedText`].
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRun<'a> {
    pub range: Range<usize>,
    pub text: &'a str,
    pub attributes: Vec<&'a StyleAttribute>,
}

impl StyleRun<'_> {
    pub fn paint(&self, base: &Paint) -> Paint {
        base.resolve(self.attributes.iter().copied())
    }
}

/// Resolved draw state for a run of text.
#[derive(Debug, Clone, PartialEq)]
pub struct Paint {
    /// font size in pixels
    pub size: f64,
    pub color: Rgba,
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    pub background: Option<Rgba>,
    /// vertical offset from the baseline, negative is up
    pub baseline_shift: f64,
    pub font: Option<String>,
}

impl Paint {
    pub fn new(size: f64) -> Self {
        Self {
            size,
            color: Rgba::BLACK,
            bold: false,
            italic: false,
            underline: false,
            strikethrough: false,
            background: None,
            baseline_shift: 0.0,
            font: None,
        }
    }

    pub fn with_color(mut self, color: Rgba) -> Self {
        self.color = color;
        self
    }

    pub fn with_font(mut self, font: Option<String>) -> Self {
        self.font = font;
        self
    }

    pub fn apply(&mut self, attribute: &StyleAttribute) {
        match attribute {
            StyleAttribute::Bold => self.bold = true,
            StyleAttribute::Italic => self.italic = true,
            StyleAttribute::Underline => self.underline = true,
            StyleAttribute::Strikethrough => self.strikethrough = true,
            StyleAttribute::ForegroundColor(color) => self.color = *color,
            StyleAttribute::BackgroundColor(color) => self.background = Some(*color),
            StyleAttribute::RelativeSize(factor) => {
                if factor.is_finite() && *factor > 0.0 {
                    self.size *= factor;
                }
            }
            StyleAttribute::AbsoluteSize(px) => {
                if px.is_finite() && *px > 0.0 {
                    self.size = *px;
                }
            }
            StyleAttribute::Superscript => self.baseline_shift -= self.size * BASELINE_SHIFT_RATIO,
            StyleAttribute::Subscript => self.baseline_shift += self.size * BASELINE_SHIFT_RATIO,
            StyleAttribute::CustomFont(name) => self.font = Some(name.clone()),
        }
    }

    pub fn resolve<'a>(&self, attributes: impl IntoIterator<Item = &'a StyleAttribute>) -> Paint {
        let mut paint = self.clone();

        for attribute in attributes {
            paint.apply(attribute);
        }

        paint
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_colors() {
        assert_eq!(Rgba::parse("#f00"), Some(Rgba::rgb(0xff, 0, 0)));
        assert_eq!(Rgba::parse("#102030"), Some(Rgba::rgb(0x10, 0x20, 0x30)));
        assert_eq!(
            Rgba::parse("#80102030"),
            Some(Rgba::rgba(0x10, 0x20, 0x30, 0x80))
        );
        assert_eq!(Rgba::parse("Navy"), Some(Rgba::rgb(0, 0, 0x80)));
        assert_eq!(Rgba::parse("#12"), None);
        assert_eq!(Rgba::parse("#gg0000"), None);
        assert_eq!(Rgba::parse("chartreuse-ish"), None);
    }

    #[test]
    fn runs_split_where_span_set_changes() {
        let mut text = FormattedText::new("abcdef");
        text.push_span(0..4, StyleAttribute::Bold);
        text.push_span(2..6, StyleAttribute::Italic);

        let runs = text.runs();
        let texts: Vec<_> = runs.iter().map(|r| r.text).collect();
        assert_eq!(texts, ["ab", "cd", "ef"]);

        assert_eq!(runs[0].attributes, [&StyleAttribute::Bold]);
        assert_eq!(
            runs[1].attributes,
            [&StyleAttribute::Bold, &StyleAttribute::Italic]
        );
        assert_eq!(runs[2].attributes, [&StyleAttribute::Italic]);
    }

    #[test]
    fn unstyled_text_is_a_single_run() {
        let text = FormattedText::new("漢字");
        let runs = text.runs();

        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].range, 0..6);
        assert!(runs[0].attributes.is_empty());
    }

    #[test]
    fn empty_text_has_no_runs() {
        assert!(FormattedText::default().runs().is_empty());
    }

    #[test]
    fn spans_inside_a_character_are_dropped() {
        let mut text = FormattedText::new("漢");
        text.push_span(1..3, StyleAttribute::Bold);
        text.push_span(2..2, StyleAttribute::Italic);

        assert!(text.spans().is_empty());
    }

    #[test]
    fn append_shifts_spans() {
        let mut a = FormattedText::new("ab");
        let mut b = FormattedText::new("cd");
        b.push_span(0..1, StyleAttribute::Underline);
        a.append(&b);

        assert_eq!(a.text(), "abcd");
        assert_eq!(a.spans()[0].range, 2..3);
    }

    #[test]
    fn lines_keep_their_styles() {
        let mut text = FormattedText::new("ab\ncd\n");
        text.push_span(1..4, StyleAttribute::Bold);

        let lines = text.lines();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].text(), "ab");
        assert_eq!(lines[0].spans()[0].range, 1..2);
        assert_eq!(lines[1].text(), "cd");
        assert_eq!(lines[1].spans()[0].range, 0..1);
        assert!(lines[2].is_empty());
    }

    #[test]
    fn paint_applies_attributes_in_order() {
        let base = Paint::new(20.0);
        let paint = base.resolve([
            &StyleAttribute::RelativeSize(2.0),
            &StyleAttribute::AbsoluteSize(10.0),
            &StyleAttribute::RelativeSize(1.5),
            &StyleAttribute::ForegroundColor(Rgba::WHITE),
            &StyleAttribute::Superscript,
            &StyleAttribute::CustomFont("serif".into()),
        ]);

        assert_eq!(paint.size, 15.0);
        assert_eq!(paint.color, Rgba::WHITE);
        assert!(paint.baseline_shift < 0.0);
        assert_eq!(paint.font.as_deref(), Some("serif"));
        assert_eq!(base.size, 20.0, "resolve must not touch the base paint");
    }

    #[test]
    fn invalid_sizes_are_ignored() {
        let paint = Paint::new(12.0).resolve([
            &StyleAttribute::RelativeSize(0.0),
            &StyleAttribute::AbsoluteSize(f64::NAN),
        ]);

        assert_eq!(paint.size, 12.0);
    }
}
