//! Search highlighting over rendered markup.
//!
//! Only text between tags is searched, never the tags themselves, so a
//! query such as `span` or `color` cannot corrupt the markup.

use std::borrow::Cow;

use crate::filter::FilterEngine;
use crate::parser::escape_html;

pub const MARK_OPEN: &str = "<mark class=\"search-hit\">";
pub const MARK_CLOSE: &str = "</mark>";

/// Wrap every match of `filter` inside the text segments of `html`.
pub fn highlight_markup(html: &str, filter: &FilterEngine) -> String {
    let mut out = String::with_capacity(html.len() + 32);
    let mut rest = html;

    while !rest.is_empty() {
        if rest.starts_with('<') {
            match rest.find('>') {
                Some(end) => {
                    out.push_str(&rest[..=end]);
                    rest = &rest[end + 1..];
                }
                None => {
                    // unterminated tag: treat the bracket as text
                    out.push('<');
                    rest = &rest[1..];
                }
            }
            continue;
        }
        let end = rest.find('<').unwrap_or(rest.len());
        highlight_segment(&rest[..end], filter, &mut out);
        rest = &rest[end..];
    }
    out
}

fn highlight_segment(segment: &str, filter: &FilterEngine, out: &mut String) {
    let text = unescape_html(segment);
    let ranges = filter.find_ranges(&text);
    if ranges.is_empty() {
        out.push_str(segment);
        return;
    }

    let mut cursor = 0;
    for range in ranges {
        out.push_str(&escape_html(&text[cursor..range.start]));
        out.push_str(MARK_OPEN);
        out.push_str(&escape_html(&text[range.clone()]));
        out.push_str(MARK_CLOSE);
        cursor = range.end;
    }
    out.push_str(&escape_html(&text[cursor..]));
}

/// Decode the entities [`escape_html`] produces, plus numeric references.
/// Unknown entities are left as written.
pub fn unescape_html(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        match decode_entity(rest) {
            Some((ch, len)) => {
                out.push(ch);
                rest = &rest[len..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Decode the entity at the start of `s`; returns the char and the byte
/// length consumed.
fn decode_entity(s: &str) -> Option<(char, usize)> {
    let semi = s.get(..12).unwrap_or(s).find(';')?;
    let name = &s[1..semi];
    let ch = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        _ => {
            let code = if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                name.strip_prefix('#')?.parse::<u32>().ok()?
            };
            char::from_u32(code)?
        }
    };
    Some((ch, semi + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::render_ansi;

    fn engine(q: &str) -> FilterEngine {
        FilterEngine::new(q).unwrap()
    }

    #[test]
    fn marks_plain_text() {
        assert_eq!(
            highlight_markup("Error: disk full", &engine("error")),
            "<mark class=\"search-hit\">Error</mark>: disk full"
        );
    }

    #[test]
    fn never_touches_tags() {
        let html = render_ansi("\x1b[31mspan color\x1b[0m");
        assert_eq!(html, "<span style=\"color:#A00\">span color</span>");

        let out = highlight_markup(&html, &engine("span"));
        assert_eq!(
            out,
            "<span style=\"color:#A00\"><mark class=\"search-hit\">span</mark> color</span>"
        );

        let out = highlight_markup(&html, &engine("color"));
        assert!(out.starts_with("<span style=\"color:#A00\">"));
        assert!(out.contains("span <mark class=\"search-hit\">color</mark></span>"));
    }

    #[test]
    fn matches_across_entities() {
        let html = render_ansi("a < b && c");
        assert_eq!(html, "a &lt; b &amp;&amp; c");
        assert_eq!(
            highlight_markup(&html, &engine("< b")),
            "a <mark class=\"search-hit\">&lt; b</mark> &amp;&amp; c"
        );
    }

    #[test]
    fn query_matching_entity_text_is_not_a_match() {
        let html = render_ansi("x < y");
        assert_eq!(highlight_markup(&html, &engine("lt")), html);
    }

    #[test]
    fn no_match_returns_input() {
        let html = "<span style=\"font-weight:bold\">ok</span>";
        assert_eq!(highlight_markup(html, &engine("zzz")), html);
    }

    #[test]
    fn unterminated_tag_is_text() {
        assert_eq!(
            highlight_markup("<oops abc", &engine("abc")),
            "<oops <mark class=\"search-hit\">abc</mark>"
        );
    }

    #[test]
    fn unescape_entities() {
        assert_eq!(unescape_html("a &amp; b &lt;c&gt; &quot;d&quot; &#39;e&#39;"), "a & b <c> \"d\" 'e'");
        assert_eq!(unescape_html("&#x41;&#66;"), "AB");
        assert_eq!(unescape_html("&bogus; & alone"), "&bogus; & alone");
        assert!(matches!(unescape_html("plain"), Cow::Borrowed(_)));
    }
}
