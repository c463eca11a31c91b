use std::ops::Range;

use html5ever::{LocalName, Namespace, ParseOpts, QualName, parse_fragment, tendril::TendrilSink};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use tracing::{trace, warn};

use crate::style::{FormattedText, Rgba, StyleAttribute};

const BIG_SCALE: f64 = 1.25;
const SMALL_SCALE: f64 = 0.8;
const HEADING_SCALES: [f64; 6] = [1.5, 1.4, 1.3, 1.2, 1.1, 1.0];
const MONOSPACE: &str = "monospace";

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// An element whose children are being walked.
struct OpenElement {
    name: String,
    start: usize,
    /// preorder position, so nested spans apply outermost first
    order: usize,
    attributes: Vec<StyleAttribute>,
}

enum Visit {
    Enter(Handle),
    Exit(OpenElement),
}

/// Interpret inline-formatted markup into styled text.
///
/// The markup is parsed as an HTML fragment in a `<body>`, so misnested and
/// unclosed tags are repaired the way a browser would and every character
/// reference is decoded. Unknown tags contribute their text only. Text is
/// kept verbatim; `<br>` and block boundaries become `\n`.
pub fn interpret(markup: &str) -> FormattedText {
    let context = QualName::new(None, Namespace::from(HTML_NAMESPACE), LocalName::from("body"));
    let dom =
        parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new()).one(markup);

    if !dom.errors.is_empty() {
        trace!(errors = dom.errors.len(), "Repaired malformed rich text");
    }

    let mut out = FormattedText::default();
    let mut spans: Vec<(usize, Range<usize>, StyleAttribute)> = Vec::new();
    let mut opened = 0;
    let mut stack = vec![Visit::Enter(dom.document.clone())];

    while let Some(visit) = stack.pop() {
        let node = match visit {
            Visit::Enter(node) => node,
            Visit::Exit(element) => {
                let block = is_block(&element.name);
                close_element(element, out.len(), &mut spans);

                if block {
                    break_line(&mut out);
                }

                continue;
            }
        };

        match &node.data {
            NodeData::Text { contents } => out.push_str(&contents.borrow()),
            NodeData::Element { name, attrs, .. } => {
                let name = name.local.to_string();

                if name == "br" {
                    out.push('\n');
                    continue;
                }

                if is_block(&name) {
                    break_line(&mut out);
                }

                let attributes: Vec<(String, String)> = attrs
                    .borrow()
                    .iter()
                    .map(|attr| (attr.name.local.to_string(), attr.value.to_string()))
                    .collect();
                let attributes = tag_attributes(&name, &attributes);

                stack.push(Visit::Exit(OpenElement {
                    name,
                    start: out.len(),
                    order: opened,
                    attributes,
                }));
                opened += 1;

                push_children(&mut stack, &node);
            }
            NodeData::Document => push_children(&mut stack, &node),
            // comments, doctypes and processing instructions
            _ => {}
        }
    }

    spans.sort_by_key(|(order, _, _)| *order);

    for (_, range, attribute) in spans {
        out.push_span(range, attribute);
    }

    out
}

fn push_children(stack: &mut Vec<Visit>, node: &Handle) {
    stack.extend(node.children.borrow().iter().rev().cloned().map(Visit::Enter));
}

fn close_element(
    element: OpenElement,
    end: usize,
    spans: &mut Vec<(usize, Range<usize>, StyleAttribute)>,
) {
    for attribute in element.attributes {
        spans.push((element.order, element.start..end, attribute));
    }
}

fn break_line(out: &mut FormattedText) {
    if !out.is_empty() && !out.text().ends_with('\n') {
        out.push('\n');
    }
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "p" | "div" | "li" | "blockquote" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6"
    )
}

fn attribute<'a>(attributes: &'a [(String, String)], key: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.as_str())
}

fn tag_attributes(name: &str, attributes: &[(String, String)]) -> Vec<StyleAttribute> {
    match name {
        "b" | "strong" => vec![StyleAttribute::Bold],
        "i" | "em" | "cite" | "dfn" | "var" => vec![StyleAttribute::Italic],
        "u" | "ins" => vec![StyleAttribute::Underline],
        "s" | "strike" | "del" => vec![StyleAttribute::Strikethrough],
        "big" => vec![StyleAttribute::RelativeSize(BIG_SCALE)],
        "small" => vec![StyleAttribute::RelativeSize(SMALL_SCALE)],
        "sup" => vec![StyleAttribute::Superscript],
        "sub" => vec![StyleAttribute::Subscript],
        "tt" | "code" | "kbd" | "samp" => vec![StyleAttribute::CustomFont(MONOSPACE.into())],
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = name[1..].parse::<usize>().unwrap_or(6).clamp(1, 6);

            vec![
                StyleAttribute::Bold,
                StyleAttribute::RelativeSize(HEADING_SCALES[level - 1]),
            ]
        }
        "font" => font_attributes(attributes),
        "span" => attribute(attributes, "style")
            .map(css_attributes)
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

fn font_attributes(attributes: &[(String, String)]) -> Vec<StyleAttribute> {
    let mut out = Vec::new();

    for (key, value) in attributes {
        match key.as_str() {
            "color" => push_color(&mut out, value, StyleAttribute::ForegroundColor),
            "face" => {
                if !value.trim().is_empty() {
                    out.push(StyleAttribute::CustomFont(value.trim().to_string()));
                }
            }
            "size" => match parse_length(value) {
                Some(length) => out.push(length),
                None => warn!(%value, "Skipping unresolvable font size"),
            },
            "style" => out.extend(css_attributes(value)),
            _ => {}
        }
    }

    out
}

fn css_attributes(style: &str) -> Vec<StyleAttribute> {
    let mut out = Vec::new();

    for declaration in style.split(';') {
        let Some((property, value)) = declaration.split_once(':') else {
            continue;
        };

        let property = property.trim().to_ascii_lowercase();
        let value = value.trim();

        match property.as_str() {
            "color" => push_color(&mut out, value, StyleAttribute::ForegroundColor),
            "background" | "background-color" => {
                push_color(&mut out, value, StyleAttribute::BackgroundColor)
            }
            "font-size" => match parse_length(value) {
                Some(length) => out.push(length),
                None => warn!(%value, "Skipping unresolvable font size"),
            },
            "font-weight" => {
                let bold = value.eq_ignore_ascii_case("bold")
                    || value.eq_ignore_ascii_case("bolder")
                    || value.parse::<u16>().is_ok_and(|weight| weight >= 600);

                if bold {
                    out.push(StyleAttribute::Bold);
                }
            }
            "font-style" => {
                if value.eq_ignore_ascii_case("italic") || value.eq_ignore_ascii_case("oblique") {
                    out.push(StyleAttribute::Italic);
                }
            }
            "font-family" => {
                let family = value
                    .split(',')
                    .next()
                    .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\''))
                    .unwrap_or_default();

                if !family.is_empty() {
                    out.push(StyleAttribute::CustomFont(family.to_string()));
                }
            }
            "text-decoration" | "text-decoration-line" => {
                for word in value.split_whitespace() {
                    match word.to_ascii_lowercase().as_str() {
                        "underline" => out.push(StyleAttribute::Underline),
                        "line-through" => out.push(StyleAttribute::Strikethrough),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    out
}

fn push_color(
    out: &mut Vec<StyleAttribute>,
    value: &str,
    make: impl FnOnce(Rgba) -> StyleAttribute,
) {
    match Rgba::parse(value) {
        Some(color) => out.push(make(color)),
        None => warn!(%value, "Skipping unresolvable color"),
    }
}

/// `12px`, `12`, `1.5em` or `150%`.
fn parse_length(value: &str) -> Option<StyleAttribute> {
    let value = value.trim().to_ascii_lowercase();

    let (number, relative) = if let Some(n) = value.strip_suffix("px") {
        (n.trim().parse::<f64>().ok()?, false)
    } else if let Some(n) = value.strip_suffix("em") {
        (n.trim().parse::<f64>().ok()?, true)
    } else if let Some(n) = value.strip_suffix('%') {
        (n.trim().parse::<f64>().ok()? / 100.0, true)
    } else {
        (value.parse::<f64>().ok()?, false)
    };

    if !number.is_finite() || number <= 0.0 {
        return None;
    }

    Some(if relative {
        StyleAttribute::RelativeSize(number)
    } else {
        StyleAttribute::AbsoluteSize(number)
    })
}
