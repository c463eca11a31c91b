use std::ops::RangeInclusive;

use ::pinyin::ToPinyin;

use super::{Annotator, CJK_RANGE};

/// Glosses Han characters with tone-marked pinyin.
#[derive(Debug, Clone, Copy, Default)]
pub struct PinyinAnnotator {
    /// when false, glosses drop tone marks (`han` instead of `hàn`)
    pub tones: bool,
}

impl PinyinAnnotator {
    pub fn new() -> Self {
        Self { tones: true }
    }
}

impl Annotator for PinyinAnnotator {
    fn gloss(&self, ch: char) -> Option<String> {
        let pinyin = ch.to_pinyin()?;

        let text = if self.tones {
            pinyin.with_tone()
        } else {
            pinyin.plain()
        };

        Some(text.to_string())
    }

    fn ranges(&self) -> &[RangeInclusive<u32>] {
        &[CJK_RANGE]
    }
}
