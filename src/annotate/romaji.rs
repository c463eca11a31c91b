use std::ops::RangeInclusive;

use wana_kana::ConvertJapanese;

use super::{Annotator, HIRAGANA_RANGE, KATAKANA_RANGE};

/// Glosses kana with their Hepburn romanization.
#[derive(Debug, Clone, Copy, Default)]
pub struct RomajiAnnotator;

impl Annotator for RomajiAnnotator {
    fn gloss(&self, ch: char) -> Option<String> {
        let kana = ch.to_string();
        let romaji = kana.as_str().to_romaji();

        if romaji.is_empty() || romaji == kana || romaji == "-" {
            return None;
        }

        Some(romaji)
    }

    fn ranges(&self) -> &[RangeInclusive<u32>] {
        &[HIRAGANA_RANGE, KATAKANA_RANGE]
    }
}
