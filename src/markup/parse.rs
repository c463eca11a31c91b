use std::{fmt::Write as _, num::NonZeroUsize, sync::LazyLock};

use anyhow::{Context, Result, anyhow};
use regex::Regex;
use tracing::{debug, trace, warn};

use super::{GLOSS_CLOSE, GLOSS_OPEN, RUBY_CLOSE, RUBY_OPEN, interpret, normalize};
use crate::{cache::LayoutCache, style::FormattedText};

/// `<ruby>base<rt>gloss</rt></ruby>`, shortest match first, with optional
/// `<rp>` fallback parentheses after the gloss.
static ANNOTATION_BLOCK: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(r"(?is)<ruby>(.*?)<rt>(.*?)</rt>\s*(?:<rp>.*?</rp>\s*)*</ruby>")
});

static FALLBACK_PARENTHESIS: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?is)<rp>.*?</rp>"));

/// A base run paired with the gloss rendered above it. Both are non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedSegment {
    pub base: FormattedText,
    pub gloss: String,
    /// canonical markup of the whole block
    pub markup: String,
}

impl AnnotatedSegment {
    /// Build a segment from already interpreted parts. Returns `None` when
    /// either part is empty or only whitespace.
    pub fn new(base: FormattedText, gloss: impl Into<String>) -> Option<Self> {
        let gloss = gloss.into();

        if is_blank(base.text()) || is_blank(&gloss) {
            return None;
        }

        let markup = format!("{RUBY_OPEN}{}{GLOSS_OPEN}{gloss}{GLOSS_CLOSE}{RUBY_CLOSE}", base.text());

        Some(Self {
            base,
            gloss,
            markup,
        })
    }

    /// Identity of the segment for layout: base text, its style spans and the
    /// gloss. Segments with equal keys measure identically.
    pub fn layout_key(&self) -> String {
        let text = self.base.text();
        let mut key = format!("{}:{text}{}:{}", text.len(), self.gloss.len(), self.gloss);

        for span in self.base.spans() {
            let _ = write!(key, "|{:?}{:?}", span.range, span.attribute);
        }

        key
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    Plain(FormattedText),
    Annotated(AnnotatedSegment),
}

impl Segment {
    /// The segment's text with annotation delimiters put back around base
    /// and gloss. Inline formatting is not reproduced.
    pub fn reconstruct(&self) -> String {
        match self {
            Segment::Plain(text) => text.text().to_string(),
            Segment::Annotated(segment) => format!(
                "{RUBY_OPEN}{}{GLOSS_OPEN}{}{GLOSS_CLOSE}{RUBY_CLOSE}",
                segment.base.text(),
                segment.gloss
            ),
        }
    }
}

/// Segments in reading order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDocument {
    segments: Vec<Segment>,
}

impl ParsedDocument {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    /// The whole input as one plain segment, interpreted without looking for
    /// annotation blocks.
    pub fn fallback(markup: &str) -> Self {
        let text = interpret(markup);

        if text.is_empty() {
            return Self::default();
        }

        Self {
            segments: vec![Segment::Plain(text)],
        }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Segment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn annotated(&self) -> impl Iterator<Item = &AnnotatedSegment> {
        self.segments.iter().filter_map(|segment| match segment {
            Segment::Annotated(segment) => Some(segment),
            Segment::Plain(_) => None,
        })
    }

    /// Concatenation of [`Segment::reconstruct`] over every segment.
    pub fn reconstruct(&self) -> String {
        self.segments.iter().map(Segment::reconstruct).collect()
    }

    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }
}

impl<'a> IntoIterator for &'a ParsedDocument {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

/// Splits markup into plain and annotated segments, memoizing results by
/// exact input string.
#[derive(Debug)]
pub struct MarkupParser {
    cache: LayoutCache<String, ParsedDocument>,
    scans: usize,
}

impl MarkupParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            cache: LayoutCache::new(capacity),
            scans: 0,
        }
    }

    /// Parse `markup`. Never fails: if scanning goes wrong the whole input is
    /// returned as a single plain segment.
    ///
    /// Blocks whose base or gloss is empty, or only whitespace, are dropped
    /// from the document entirely rather than kept as plain text.
    pub fn parse(&mut self, markup: &str) -> ParsedDocument {
        if let Some(document) = self.cache.get(markup) {
            trace!(len = markup.len(), "Parse cache hit");
            return document.clone();
        }

        let document = match self.scan(markup) {
            Ok(document) => document,
            Err(err) => {
                warn!("Falling back to plain rich text: {err:#}");
                ParsedDocument::fallback(markup)
            }
        };

        self.cache.put(markup.to_string(), document.clone());

        document
    }

    /// Number of inputs actually scanned, i.e. cache misses.
    pub fn scan_count(&self) -> usize {
        self.scans
    }

    pub fn evict_all(&mut self) {
        self.cache.evict_all();
    }

    fn scan(&mut self, markup: &str) -> Result<ParsedDocument> {
        self.scans += 1;

        let block = ANNOTATION_BLOCK
            .as_ref()
            .map_err(|err| anyhow!("annotation pattern unavailable: {err}"))?;

        let canonical = normalize(markup);
        let mut segments = Vec::new();
        let mut last = 0;

        for caps in block.captures_iter(&canonical) {
            let whole = caps.get(0).context("match without a span")?;
            let base = caps.get(1).context("match without a base")?;
            let gloss = caps.get(2).context("match without a gloss")?;

            push_plain(&mut segments, &canonical[last..whole.start()]);
            last = whole.end();

            let base = interpret(&strip_fallback(base.as_str())?);
            let gloss = interpret(&strip_fallback(gloss.as_str())?);
            let gloss = gloss.text().trim();

            if is_blank(base.text()) || gloss.is_empty() {
                debug!(block = whole.as_str(), "Dropping annotation with empty base or gloss");
                continue;
            }

            segments.push(Segment::Annotated(AnnotatedSegment {
                base,
                gloss: gloss.to_string(),
                markup: whole.as_str().to_string(),
            }));
        }

        push_plain(&mut segments, &canonical[last..]);

        debug!(
            segments = segments.len(),
            annotated = segments
                .iter()
                .filter(|s| matches!(s, Segment::Annotated(_)))
                .count(),
            "Parsed markup"
        );

        Ok(ParsedDocument { segments })
    }
}

impl Default for MarkupParser {
    fn default() -> Self {
        Self {
            cache: LayoutCache::default(),
            scans: 0,
        }
    }
}

fn push_plain(segments: &mut Vec<Segment>, markup: &str) {
    if markup.is_empty() {
        return;
    }

    let text = interpret(markup);

    if !text.is_empty() {
        segments.push(Segment::Plain(text));
    }
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

fn strip_fallback(markup: &str) -> Result<String> {
    let re = FALLBACK_PARENTHESIS
        .as_ref()
        .map_err(|err| anyhow!("fallback pattern unavailable: {err}"))?;

    Ok(re.replace_all(markup, "").into_owned())
}
