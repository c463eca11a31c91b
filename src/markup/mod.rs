//! Markup handling: canonicalizing annotation tags, interpreting inline
//! formatting, and splitting a string into plain and annotated segments.
//!
//! An annotation block looks like `<ruby>base<rt>gloss</rt></ruby>`; `base`
//! may carry inline formatting tags, `gloss` is reduced to plain text.

pub mod normalize;
pub mod parse;
pub mod rich;

pub use normalize::normalize;
pub use parse::{AnnotatedSegment, MarkupParser, ParsedDocument, Segment};
pub use rich::interpret;

pub const RUBY_OPEN: &str = "<ruby>";
pub const RUBY_CLOSE: &str = "</ruby>";
pub const GLOSS_OPEN: &str = "<rt>";
pub const GLOSS_CLOSE: &str = "</rt>";

/// Whether `markup` contains any annotation tag, opening or closing.
pub(crate) fn contains_annotation_tag(markup: &str) -> bool {
    let lower = markup.to_ascii_lowercase();

    ["<ruby", "</ruby", "<rt", "</rt"]
        .iter()
        .any(|tag| lower.contains(tag))
}
