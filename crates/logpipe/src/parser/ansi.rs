/// ANSI escape code stripping and markup rendering
///
/// Container logs often carry ANSI color codes from applications writing to
/// a terminal. Classification and search work on the stripped text; the
/// viewer displays the colored form, pre-rendered into HTML spans.

use std::borrow::Cow;

const ESC: u8 = 0x1b;

/// One lexical unit of a raw line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token<'a> {
    /// Plain text between escape sequences
    Text(&'a str),
    /// SGR parameters of a `ESC [ ... m` sequence (may be empty)
    Sgr(&'a str),
    /// Any other escape sequence, dropped on output
    Control,
}

/// Splits a line into text runs and escape sequences.
///
/// Every boundary lands on an ASCII byte, so slicing the `str` is always
/// on a char boundary.
struct Tokens<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Tokens<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }
}

impl<'a> Iterator for Tokens<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Token<'a>> {
        let bytes = self.input.as_bytes();
        let start = self.pos;
        if start >= bytes.len() {
            return None;
        }

        if bytes[start] != ESC {
            let end = bytes[start..]
                .iter()
                .position(|&b| b == ESC)
                .map(|p| start + p)
                .unwrap_or(bytes.len());
            self.pos = end;
            return Some(Token::Text(&self.input[start..end]));
        }

        // Lone trailing ESC byte: incomplete escape sequence
        if start + 1 >= bytes.len() {
            self.pos = bytes.len();
            return Some(Token::Control);
        }

        match bytes[start + 1] {
            // CSI sequence: ESC [ ... (ends with 0x40-0x7E, usually 'm' for colors)
            b'[' => {
                let mut i = start + 2;
                while i < bytes.len() {
                    let b = bytes[i];
                    i += 1;
                    if (0x40..=0x7E).contains(&b) {
                        self.pos = i;
                        if b == b'm' {
                            return Some(Token::Sgr(&self.input[start + 2..i - 1]));
                        }
                        return Some(Token::Control);
                    }
                }
                self.pos = bytes.len();
                Some(Token::Control)
            }
            // OSC sequence: ESC ] ... (ends with BEL 0x07 or ESC \)
            b']' => {
                let mut i = start + 2;
                while i < bytes.len() {
                    if bytes[i] == 0x07 {
                        i += 1;
                        break;
                    }
                    if bytes[i] == ESC && i + 1 < bytes.len() && bytes[i + 1] == b'\\' {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
                self.pos = i;
                Some(Token::Control)
            }
            // Simple Fe sequences (ESC + single char, e.g. ESC N)
            0x40..=0x5F => {
                self.pos = start + 2;
                Some(Token::Control)
            }
            // Not an escape sequence we know: keep the ESC as text
            _ => {
                self.pos = start + 1;
                Some(Token::Text(&self.input[start..start + 1]))
            }
        }
    }
}

/// Strip ANSI escape codes from a line
///
/// Handles:
/// - CSI sequences: `\x1b[...m`
/// - OSC sequences: `\x1b]...`
/// - Other escape sequences
///
/// Returns Cow::Borrowed if no codes were found (Zero Allocation),
/// or Cow::Owned if stripping occurred.
pub fn strip_ansi_codes(input: &str) -> Cow<'_, str> {
    if !input.as_bytes().contains(&ESC) {
        return Cow::Borrowed(input);
    }

    let mut output = String::with_capacity(input.len());
    for token in Tokens::new(input) {
        if let Token::Text(text) = token {
            output.push_str(text);
        }
    }
    Cow::Owned(output)
}

/// Escape text for inclusion in HTML markup.
pub fn escape_html(text: &str) -> Cow<'_, str> {
    if !text.bytes().any(|b| matches!(b, b'&' | b'<' | b'>' | b'"' | b'\'')) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

/// Standard + bright palette (indices 0-15).
const PALETTE: [&str; 16] = [
    "#000", "#A00", "#0A0", "#A50", "#00A", "#A0A", "#0AA", "#AAA",
    "#555", "#F55", "#5F5", "#FF5", "#55F", "#F5F", "#5FF", "#FFF",
];

/// Active SGR state while rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Style {
    fg: Option<String>,
    bg: Option<String>,
    bold: bool,
    dim: bool,
    italic: bool,
    underline: bool,
}

impl Style {
    fn is_plain(&self) -> bool {
        *self == Style::default()
    }

    fn css(&self) -> String {
        let mut parts = Vec::new();
        if let Some(fg) = &self.fg {
            parts.push(format!("color:{}", fg));
        }
        if let Some(bg) = &self.bg {
            parts.push(format!("background-color:{}", bg));
        }
        if self.bold {
            parts.push("font-weight:bold".to_string());
        }
        if self.dim {
            parts.push("opacity:0.5".to_string());
        }
        if self.italic {
            parts.push("font-style:italic".to_string());
        }
        if self.underline {
            parts.push("text-decoration:underline".to_string());
        }
        parts.join(";")
    }

    fn apply(&mut self, params: &str) {
        let codes: Vec<u32> = if params.is_empty() {
            vec![0]
        } else {
            params.split(';').map(|p| p.parse().unwrap_or(0)).collect()
        };

        let mut i = 0;
        while i < codes.len() {
            match codes[i] {
                0 => *self = Style::default(),
                1 => self.bold = true,
                2 => self.dim = true,
                3 => self.italic = true,
                4 => self.underline = true,
                22 => {
                    self.bold = false;
                    self.dim = false;
                }
                23 => self.italic = false,
                24 => self.underline = false,
                c @ 30..=37 => self.fg = Some(PALETTE[(c - 30) as usize].to_string()),
                39 => self.fg = None,
                c @ 40..=47 => self.bg = Some(PALETTE[(c - 40) as usize].to_string()),
                49 => self.bg = None,
                c @ 90..=97 => self.fg = Some(PALETTE[(c - 90 + 8) as usize].to_string()),
                c @ 100..=107 => self.bg = Some(PALETTE[(c - 100 + 8) as usize].to_string()),
                c @ (38 | 48) => {
                    let (color, consumed) = extended_color(&codes[i + 1..]);
                    if let Some(color) = color {
                        if c == 38 {
                            self.fg = Some(color);
                        } else {
                            self.bg = Some(color);
                        }
                    }
                    i += consumed;
                }
                _ => {}
            }
            i += 1;
        }
    }
}

/// Decode the tail of a `38;…`/`48;…` sequence. Returns the color and how
/// many parameters it consumed.
fn extended_color(rest: &[u32]) -> (Option<String>, usize) {
    match rest.first() {
        Some(5) => match rest.get(1) {
            Some(&n) if n < 256 => (Some(color_256(n as u8)), 2),
            Some(_) => (None, 2),
            None => (None, 1),
        },
        Some(2) if rest.len() >= 4 => {
            let channel = |v: u32| v.min(255);
            let color = format!(
                "#{:02x}{:02x}{:02x}",
                channel(rest[1]),
                channel(rest[2]),
                channel(rest[3])
            );
            (Some(color), 4)
        }
        Some(2) => (None, rest.len()),
        _ => (None, 0),
    }
}

fn color_256(n: u8) -> String {
    match n {
        0..=15 => PALETTE[n as usize].to_string(),
        16..=231 => {
            const LEVELS: [u8; 6] = [0, 95, 135, 175, 215, 255];
            let idx = n - 16;
            let r = LEVELS[(idx / 36) as usize];
            let g = LEVELS[((idx % 36) / 6) as usize];
            let b = LEVELS[(idx % 6) as usize];
            format!("#{:02x}{:02x}{:02x}", r, g, b)
        }
        _ => {
            let gray = 8 + (n - 232) * 10;
            format!("#{:02x}{:02x}{:02x}", gray, gray, gray)
        }
    }
}

/// Render a raw line into HTML: SGR colors become `<span style="…">`
/// wrappers, every text run is HTML-escaped, other escapes are dropped.
pub fn render_ansi(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 32);
    let mut style = Style::default();

    for token in Tokens::new(input) {
        match token {
            Token::Text(text) => {
                let escaped = escape_html(text);
                if style.is_plain() {
                    out.push_str(&escaped);
                } else {
                    out.push_str("<span style=\"");
                    out.push_str(&style.css());
                    out.push_str("\">");
                    out.push_str(&escaped);
                    out.push_str("</span>");
                }
            }
            Token::Sgr(params) => style.apply(params),
            Token::Control => {}
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_cow_optimization() {
        let input = "Hello World";
        match strip_ansi_codes(input) {
            Cow::Borrowed(s) => assert_eq!(s, "Hello World"),
            Cow::Owned(_) => panic!("Should not have allocated"),
        }
    }

    #[test]
    fn test_strip_simple_ansi() {
        assert_eq!(strip_ansi_codes("\x1b[32mHello\x1b[0m World"), "Hello World");
    }

    #[test]
    fn test_strip_complex_ansi() {
        let input = "\x1b[2m2026-01-30T03:18:50.827498Z\x1b[0m \x1b[32m INFO\x1b[0m \x1b[2mcluster\x1b[0m\x1b[2m:\x1b[0m Starting";
        assert_eq!(strip_ansi_codes(input), "2026-01-30T03:18:50.827498Z  INFO cluster: Starting");
    }

    #[test]
    fn test_strip_only_codes() {
        assert_eq!(strip_ansi_codes("\x1b[0m\x1b[32m\x1b[1m"), "");
        assert_eq!(strip_ansi_codes(""), "");
    }

    #[test]
    fn test_strip_json_with_ansi() {
        let input = "\x1b[32m{\"level\":\"info\",\"msg\":\"test\"}\x1b[0m";
        assert_eq!(strip_ansi_codes(input), "{\"level\":\"info\",\"msg\":\"test\"}");
    }

    #[test]
    fn test_strip_osc_hyperlink() {
        let input = "\x1b]8;;https://example.com\x07Link\x1b]8;;\x07";
        assert_eq!(strip_ansi_codes(input), "Link");
    }

    #[test]
    fn test_strip_lone_trailing_escape() {
        assert_eq!(strip_ansi_codes("done\x1b"), "done");
    }

    #[test]
    fn test_strip_keeps_multibyte_text() {
        assert_eq!(strip_ansi_codes("\x1b[31mérror ✗\x1b[0m"), "érror ✗");
    }

    #[test]
    fn test_strip_cursor_movement() {
        assert_eq!(strip_ansi_codes("a\x1b[2Kb\x1b[1Ac"), "abc");
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("a < b && c > \"d\" 'e'"), "a &lt; b &amp;&amp; c &gt; &quot;d&quot; &#39;e&#39;");
        assert!(matches!(escape_html("plain"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_render_plain_text_is_escaped() {
        assert_eq!(render_ansi("<b>hi</b>"), "&lt;b&gt;hi&lt;/b&gt;");
    }

    #[test]
    fn test_render_foreground_color() {
        assert_eq!(
            render_ansi("\x1b[31mERROR\x1b[0m boom"),
            "<span style=\"color:#A00\">ERROR</span> boom"
        );
    }

    #[test]
    fn test_render_bold_bright_and_background() {
        assert_eq!(
            render_ansi("\x1b[1;92;44mok\x1b[m"),
            "<span style=\"color:#5F5;background-color:#00A;font-weight:bold\">ok</span>"
        );
    }

    #[test]
    fn test_render_extended_colors() {
        assert_eq!(
            render_ansi("\x1b[38;5;196mred\x1b[0m"),
            "<span style=\"color:#ff0000\">red</span>"
        );
        assert_eq!(
            render_ansi("\x1b[38;2;1;2;3mrgb"),
            "<span style=\"color:#010203\">rgb</span>"
        );
        assert_eq!(
            render_ansi("\x1b[48;5;232mg"),
            "<span style=\"background-color:#080808\">g</span>"
        );
    }

    #[test]
    fn test_render_default_foreground_reset() {
        assert_eq!(render_ansi("\x1b[33mwarn\x1b[39m rest"), "<span style=\"color:#A50\">warn</span> rest");
    }

    #[test]
    fn test_render_drops_non_sgr_sequences() {
        assert_eq!(render_ansi("\x1b]8;;http://x\x07link\x1b]8;;\x07"), "link");
    }
}
