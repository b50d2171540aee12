//! Minimal extraction from the account settings page.
//!
//! The settings markup is small and regular, so a handful of regexes is
//! enough: the first `<code>` element carries the numeric user id, and the
//! `<span>` elements carry the login provider link or avatar.

use std::sync::OnceLock;

use regex::Regex;

/// One `<span>` element of the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    /// Text content with nested tags stripped and entities decoded.
    pub text: String,
    /// `src` attribute of the first nested `<img>`, if any.
    pub img_src: Option<String>,
}

/// Parsed settings page.
#[derive(Debug, Clone, Default)]
pub struct SettingsPage {
    code: Option<String>,
    spans: Vec<Span>,
}

fn code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<code(?:\s[^>]*)?>(.*?)</code>").expect("valid regex"))
}

fn span_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<span(?:\s[^>]*)?>(.*?)</span>").expect("valid regex"))
}

fn img_src_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<img\s[^>]*?src\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"))
}

impl SettingsPage {
    /// Parse a raw response body. Invalid UTF-8 is replaced, never rejected.
    pub fn parse(body: &[u8]) -> Self {
        let html = String::from_utf8_lossy(body);

        let code = code_re()
            .captures(&html)
            .map(|c| text_content(&c[1]));

        let spans = span_re()
            .captures_iter(&html)
            .map(|c| {
                let inner = &c[1];
                let img_src = img_src_re().captures(inner).and_then(|m| {
                    m.get(1)
                        .or_else(|| m.get(2))
                        .map(|s| decode_entities(s.as_str()))
                });
                Span {
                    text: text_content(inner),
                    img_src,
                }
            })
            .collect();

        Self { code, spans }
    }

    /// Text of the first `<code>` element.
    pub fn code_text(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Field `index` of the first `<code>` element's text, split on `-`.
    pub fn code_field(&self, index: usize) -> Option<&str> {
        self.code_text()?.split('-').nth(index).map(str::trim)
    }

    /// Every `<span>` element in document order.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }
}

fn text_content(fragment: &str) -> String {
    decode_entities(&tag_re().replace_all(fragment, "")).trim().to_string()
}

fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}
