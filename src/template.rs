//! `{{ name }}` placeholder templates used in URLs, header values and web links.

use crate::service::ServiceInfo;

#[derive(Debug, PartialEq)]
enum Segment<'a> {
    Text(&'a str),
    Var(&'a str),
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse(template: &str) -> Option<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        let (text, after) = rest.split_at(open);
        if text.contains("}}") {
            return None;
        }
        segments.push(Segment::Text(text));

        let after = &after[2..];
        let close = after.find("}}")?;
        let name = after[..close].trim();
        if !is_identifier(name) {
            return None;
        }
        segments.push(Segment::Var(name));
        rest = &after[close + 2..];
    }

    if rest.contains("}}") {
        return None;
    }
    segments.push(Segment::Text(rest));
    Some(segments)
}

/// Whether `template` is well-formed.
pub fn check(template: &str) -> bool {
    parse(template).is_some()
}

/// Substitute service values into `template`.
///
/// Unknown names render empty. A malformed template is returned unchanged.
pub fn render(template: &str, info: &ServiceInfo) -> String {
    let Some(segments) = parse(template) else {
        return template.to_string();
    };

    segments
        .into_iter()
        .map(|segment| match segment {
            Segment::Text(text) => text,
            Segment::Var(name) => info.get(name).unwrap_or(""),
        })
        .collect()
}
