/// A preprocessor directive split into its name and the remainder of the line.
#[derive(Debug, Copy, Clone)]
pub(crate) struct Directive<'a> {
    pub name: &'a str,
    pub rest: &'a str,
}

pub(crate) fn parse(line: &str) -> Option<Directive<'_>> {
    let body = line.trim_start().strip_prefix('#')?.trim_start();
    let end = body
        .find(|c: char| !is_ident_char(c))
        .unwrap_or(body.len());
    if end == 0 {
        return None;
    }

    Some(Directive {
        name: &body[..end],
        rest: body[end..].trim(),
    })
}

/// Name written after a `#pragma stage : <name>` marker.
pub(crate) fn stage_marker(line: &str) -> Option<&str> {
    let directive = parse(line)?;
    if directive.name != "pragma" {
        return None;
    }

    let rest = directive.rest.strip_prefix("stage")?;
    let rest = rest.trim_start().strip_prefix(':')?;
    Some(strip_line_comment(rest).trim())
}

#[inline]
pub(crate) fn is_pragma_once(directive: &Directive) -> bool {
    directive.name == "pragma" && strip_line_comment(directive.rest).trim() == "once"
}

pub(crate) fn strip_line_comment(text: &str) -> &str {
    match text.find("//") {
        Some(idx) => &text[..idx],
        None => text,
    }
}

#[inline]
pub(crate) fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Every identifier appearing in a line of GLSL.
pub(crate) fn identifiers(line: &str) -> impl Iterator<Item = &str> {
    line.split(|c: char| !is_ident_char(c))
        .filter(|token| token.chars().next().is_some_and(|c| !c.is_ascii_digit()))
}

/// Splits a leading identifier off of `text`. Returns the identifier and the remaining text.
pub(crate) fn leading_ident(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    let end = text.find(|c: char| !is_ident_char(c)).unwrap_or(text.len());
    let ident = &text[..end];
    if ident.is_empty() || ident.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some((ident, &text[end..]))
}
