use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::{debug, warn};

use super::contains_annotation_tag;

/// An inline tag whose only content is a single annotation block:
/// `<b><ruby>base<rt>gloss</rt></ruby></b>`.
static WRAPPED_ANNOTATION: LazyLock<Result<Regex, regex::Error>> = LazyLock::new(|| {
    Regex::new(
        r"(?is)<([a-z][a-z0-9]*)(\s[^<>]*)?>\s*<ruby>(.*?)<rt>(.*?)</rt>\s*</ruby>\s*</([a-z][a-z0-9]*)\s*>",
    )
});

/// Move inline tags that wrap a whole annotation block into its base run, so
/// `<b><ruby>漢<rt>かん</rt></ruby></b>` becomes
/// `<ruby><b>漢</b><rt>かん</rt></ruby>`.
///
/// Anything outside that shape passes through unchanged, and so does the
/// whole input if the rewrite cannot run. Applying the result again is a
/// no-op.
pub fn normalize(markup: &str) -> String {
    let re = match WRAPPED_ANNOTATION.as_ref() {
        Ok(re) => re,
        Err(err) => {
            warn!(%err, "Annotation normalizer unavailable, passing markup through");
            return markup.to_string();
        }
    };

    let mut current = markup.to_string();

    // A rewrite never lengthens the markup and moves its `<ruby>` left past
    // the wrapper, so this reaches a fixed point.
    for pass in 0.. {
        let next = re.replace_all(&current, rewrite).into_owned();

        if next == current {
            break;
        }

        debug!(pass, "Moved wrapping tag into annotation base");
        current = next;
    }

    current
}

fn rewrite(caps: &Captures<'_>) -> String {
    let whole = &caps[0];
    let open = &caps[1];
    let close = &caps[5];
    let attributes = caps.get(2).map_or("", |m| m.as_str());
    let base = &caps[3];
    let gloss = &caps[4];

    let is_annotation_tag = |name: &str| {
        ["ruby", "rt", "rp", "rb"]
            .iter()
            .any(|tag| name.eq_ignore_ascii_case(tag))
    };

    // Exactly one block, wrapped by a matching non-annotation tag.
    if !open.eq_ignore_ascii_case(close)
        || is_annotation_tag(open)
        || contains_annotation_tag(base)
        || contains_annotation_tag(gloss)
    {
        return whole.to_string();
    }

    format!("<ruby><{open}{attributes}>{base}</{close}><rt>{gloss}</rt></ruby>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_wrapper_into_base() {
        assert_eq!(
            normalize("<b><ruby>漢字<rt>かんじ</rt></ruby></b>です"),
            "<ruby><b>漢字</b><rt>かんじ</rt></ruby>です"
        );
    }

    #[test]
    fn keeps_wrapper_attributes() {
        assert_eq!(
            normalize(r#"<font color="red"><ruby>字<rt>じ</rt></ruby></font>"#),
            r#"<ruby><font color="red">字</font><rt>じ</rt></ruby>"#
        );
    }

    #[test]
    fn unwrapped_blocks_pass_through() {
        let markup = "<ruby>漢<rt>かん</rt></ruby> and <i>plain</i>";
        assert_eq!(normalize(markup), markup);
    }

    #[test]
    fn independent_blocks_are_normalized_separately() {
        assert_eq!(
            normalize("<b><ruby>a<rt>x</rt></ruby></b><ruby>b<rt>y</rt></ruby><u><ruby>c<rt>z</rt></ruby></u>"),
            "<ruby><b>a</b><rt>x</rt></ruby><ruby>b<rt>y</rt></ruby><ruby><u>c</u><rt>z</rt></ruby>"
        );
    }

    #[test]
    fn wrapper_with_extra_content_is_untouched() {
        let markup = "<b>very <ruby>a<rt>x</rt></ruby></b>";
        assert_eq!(normalize(markup), markup);

        let two_blocks = "<b><ruby>a<rt>x</rt></ruby><ruby>b<rt>y</rt></ruby></b>";
        assert_eq!(normalize(two_blocks), two_blocks);
    }

    #[test]
    fn mismatched_closing_tag_is_untouched() {
        let markup = "<b><ruby>a<rt>x</rt></ruby></i>";
        assert_eq!(normalize(markup), markup);
    }

    #[test]
    fn nested_wrappers_reach_a_fixed_point() {
        let once = normalize("<i><b><ruby>a<rt>x</rt></ruby></b></i>");
        assert_eq!(once, "<ruby><i><b>a</b></i><rt>x</rt></ruby>");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn deeply_nested_wrappers_reach_a_fixed_point() {
        let depth = 40;
        let markup = format!(
            "{}<ruby>a<rt>x</rt></ruby>{}",
            "<b>".repeat(depth),
            "</b>".repeat(depth)
        );

        let once = normalize(&markup);

        assert!(once.starts_with("<ruby><b>"), "{once}");
        assert!(once.ends_with("<rt>x</rt></ruby>"), "{once}");
        assert_eq!(once.matches("<b>").count(), depth);
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn idempotent_on_assorted_inputs() {
        let inputs = [
            "",
            "plain",
            "<ruby>",
            "<b><ruby>a<rt>x</rt></ruby>",
            "<b><ruby><rt>x</rt></ruby></b>",
            "<span style=\"color:#f00\"> <ruby>漢<rt>かん</rt></ruby> </span>",
            "<ruby>a<ruby>b<rt>y</rt></ruby><rt>x</rt></ruby>",
            "<<b>><ruby>a<rt>x</rt></ruby></b>",
        ];

        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "not idempotent for {input:?}");
        }
    }
}
