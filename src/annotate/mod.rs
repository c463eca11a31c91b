//! Automatic gloss generation: wrap characters an [`Annotator`] knows in
//! annotation blocks.

#[cfg(feature = "pinyin")]
pub mod pinyin;
#[cfg(feature = "romaji")]
pub mod romaji;

use std::ops::RangeInclusive;

use rustc_hash::FxHashMap;

use crate::markup::{GLOSS_CLOSE, GLOSS_OPEN, RUBY_CLOSE, RUBY_OPEN};

pub const CJK_RANGE: RangeInclusive<u32> = 0x4e00..=0x9fff;
pub const KANJI_EXTENDED_A_RANGE: RangeInclusive<u32> = 0x3400..=0x4dbf;
pub const HIRAGANA_RANGE: RangeInclusive<u32> = 0x3040..=0x309f;
pub const KATAKANA_RANGE: RangeInclusive<u32> = 0x30a0..=0x30ff;
pub const JAPANESE_PUNCTUATION_RANGE: RangeInclusive<u32> = 0x3000..=0x303f;
pub const HANGUL_RANGE: RangeInclusive<u32> = 0xac00..=0xd7af;
pub const FULL_WIDTH_RANGE: RangeInclusive<u32> = 0xff00..=0xff60;

const WIDE_RANGES: [RangeInclusive<u32>; 7] = [
    CJK_RANGE,
    KANJI_EXTENDED_A_RANGE,
    HIRAGANA_RANGE,
    KATAKANA_RANGE,
    JAPANESE_PUNCTUATION_RANGE,
    HANGUL_RANGE,
    FULL_WIDTH_RANGE,
];

/// Whether `c` is normally set on a full em.
pub fn is_wide(c: char) -> bool {
    WIDE_RANGES.iter().any(|range| range.contains(&(c as u32)))
}

/// A source of glosses for single characters.
pub trait Annotator: Send + Sync {
    /// The gloss for `ch`, if any.
    fn gloss(&self, ch: char) -> Option<String>;

    /// Returns the character ranges that this annotator can gloss.
    fn ranges(&self) -> &[RangeInclusive<u32>];

    fn covers(&self, ch: char) -> bool {
        self.ranges().iter().any(|range| range.contains(&(ch as u32)))
    }
}

/// Glosses looked up in a fixed table.
#[derive(Debug, Clone, Default)]
pub struct GlossTable {
    glosses: FxHashMap<char, String>,
    ranges: Vec<RangeInclusive<u32>>,
}

impl GlossTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, ch: char, gloss: impl Into<String>) {
        self.glosses.insert(ch, gloss.into());
        self.ranges.push(ch as u32..=ch as u32);
    }

    /// Parse lines of `<char> <gloss>`; blank lines and lines starting with
    /// `#` are skipped, as are lines whose key is not a single character.
    pub fn parse(source: &str) -> Self {
        let mut table = Self::new();

        for line in source.lines() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, gloss)) = line.split_once(char::is_whitespace) else {
                continue;
            };

            let mut chars = key.chars();

            if let (Some(ch), None) = (chars.next(), chars.next()) {
                table.insert(ch, gloss.trim());
            }
        }

        table
    }
}

impl<const N: usize> From<[(char, &str); N]> for GlossTable {
    fn from(entries: [(char, &str); N]) -> Self {
        let mut table = Self::new();

        for (ch, gloss) in entries {
            table.insert(ch, gloss);
        }

        table
    }
}

impl Annotator for GlossTable {
    fn gloss(&self, ch: char) -> Option<String> {
        self.glosses.get(&ch).cloned()
    }

    fn ranges(&self) -> &[RangeInclusive<u32>] {
        &self.ranges
    }
}

/// Wrap every character of `markup`'s text that `annotator` can gloss in its
/// own annotation block. Tags are copied through untouched and text already
/// inside an annotation block is left alone.
pub fn annotate_text(markup: &str, annotator: &dyn Annotator) -> String {
    let mut out = String::with_capacity(markup.len() * 2);
    let mut depth = 0usize;
    let mut rest = markup;

    while !rest.is_empty() {
        if rest.starts_with('<')
            && let Some(end) = rest.find('>')
        {
            let tag = &rest[..=end];
            let lower = tag.to_ascii_lowercase();

            if lower.starts_with("<ruby") {
                depth += 1;
            } else if lower.starts_with("</ruby") {
                depth = depth.saturating_sub(1);
            }

            out.push_str(tag);
            rest = &rest[end + 1..];
            continue;
        }

        let mut chars = rest.chars();
        let Some(ch) = chars.next() else {
            break;
        };
        rest = chars.as_str();

        let gloss = (depth == 0 && annotator.covers(ch))
            .then(|| annotator.gloss(ch))
            .flatten()
            .filter(|gloss| !gloss.is_empty());

        match gloss {
            Some(gloss) => {
                out.push_str(RUBY_OPEN);
                out.push(ch);
                out.push_str(GLOSS_OPEN);
                out.push_str(&gloss);
                out.push_str(GLOSS_CLOSE);
                out.push_str(RUBY_CLOSE);
            }
            None => out.push(ch),
        }
    }

    out
}
