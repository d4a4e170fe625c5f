//! Rich-body to Markdown conversion.
//!
//! The pipeline treats conversion as an injected pure function: anything that
//! implements [`ContentConverter`] will do, including plain closures. The
//! default [`HtmlToMarkdown`] walks the `scraper` DOM of the body and emits
//! CommonMark-style Markdown.
//!
//! # Element Mapping
//!
//! | HTML | Markdown |
//! |------|----------|
//! | `h1`..`h6` | `#`..`######` headings |
//! | `p`, `div`, `section`, ... | paragraphs |
//! | `strong`/`b`, `em`/`i` | `**bold**`, `*italic*` |
//! | `a[href]`, `img[src]` | `[text](href)`, `![alt](src)` |
//! | `ul`, `ol` | `- ` / `1. ` lists, nested under the item's content |
//! | `pre`, `code` | fenced blocks, inline backticks |
//! | `blockquote` | `> ` prefixed lines |
//! | `script`, `style`, `head` | dropped |
//!
//! Text is escaped so it stays text: inline markup characters get a
//! backslash, as does anything at the start of a line that would otherwise
//! open a heading, quote, or list. Code spans and fences grow past the
//! longest backtick run they contain, and continuation lines of a list item
//! are indented to the item's content column.

use crate::error::ConversionError;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static TRAILING_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+\n").unwrap());
static EXCESS_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());
static ORDERED_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,9}[.)]").unwrap());

/// Default nesting limit for [`HtmlToMarkdown`].
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Converts an item's rich body into plain Markdown.
pub trait ContentConverter {
    /// Convert one body.
    ///
    /// # Errors
    ///
    /// Returns a [`ConversionError`] if the body cannot be converted; the
    /// pipeline counts the item as failed and moves on.
    fn convert(&self, rich_body: &str) -> Result<String, ConversionError>;
}

impl<F> ContentConverter for F
where
    F: Fn(&str) -> Result<String, ConversionError>,
{
    fn convert(&self, rich_body: &str) -> Result<String, ConversionError> {
        self(rich_body)
    }
}

/// HTML to Markdown converter built on `scraper`.
#[derive(Debug, Clone)]
pub struct HtmlToMarkdown {
    max_depth: usize,
}

impl Default for HtmlToMarkdown {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl HtmlToMarkdown {
    /// Create a converter with a custom element nesting limit.
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self { max_depth }
    }

    fn render_children(
        &self,
        el: ElementRef<'_>,
        list_depth: usize,
        depth: usize,
    ) -> Result<String, ConversionError> {
        if depth > self.max_depth {
            return Err(ConversionError::TooDeep {
                depth: self.max_depth,
            });
        }
        let mut out = String::new();
        for child in el.children() {
            match child.value() {
                Node::Text(text) => push_text(&mut out, text),
                Node::Element(_) => {
                    if let Some(child_el) = ElementRef::wrap(child) {
                        let rendered = self.render_element(child_el, list_depth, depth + 1)?;
                        out.push_str(&rendered);
                    }
                }
                _ => {}
            }
        }
        Ok(out)
    }

    fn render_element(
        &self,
        el: ElementRef<'_>,
        list_depth: usize,
        depth: usize,
    ) -> Result<String, ConversionError> {
        let name = el.value().name();
        let rendered = match name {
            "script" | "style" | "head" | "noscript" | "template" => String::new(),
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level = name[1..].parse::<usize>().unwrap_or(1);
                let inner = self.render_children(el, list_depth, depth)?;
                let inner = WHITESPACE.replace_all(inner.trim(), " ");
                block(&format!("{} {}", "#".repeat(level), inner))
            }
            "p" | "div" | "section" | "article" | "header" | "footer" | "main" | "aside"
            | "nav" | "figure" | "figcaption" | "table" | "thead" | "tbody" => {
                block(self.render_children(el, list_depth, depth)?.trim())
            }
            "tr" => format!("\n{}\n", self.render_children(el, list_depth, depth)?.trim()),
            "td" | "th" => format!("{} ", self.render_children(el, list_depth, depth)?.trim()),
            "br" => "\\\n".to_string(),
            "hr" => block("---"),
            "strong" | "b" => emphasize(&self.render_children(el, list_depth, depth)?, "**"),
            "em" | "i" => emphasize(&self.render_children(el, list_depth, depth)?, "*"),
            "code" => code_span(&el.text().collect::<String>()),
            "pre" => fenced(el),
            "a" => {
                let inner = self.render_children(el, list_depth, depth)?;
                match el.value().attr("href") {
                    Some(href) if inner.trim().is_empty() => format!("<{href}>"),
                    Some(href) => format!("[{}]({href})", inner.trim()),
                    None => inner,
                }
            }
            "img" => match el.value().attr("src") {
                Some(src) => format!(
                    "![{}]({src})",
                    escape_inline(el.value().attr("alt").unwrap_or_default())
                ),
                None => String::new(),
            },
            "ul" => self.render_list(el, false, list_depth, depth)?,
            "ol" => self.render_list(el, true, list_depth, depth)?,
            "blockquote" => {
                let inner = self.render_children(el, list_depth, depth)?;
                let inner = EXCESS_NEWLINES.replace_all(inner.trim(), "\n\n");
                let quoted = inner
                    .lines()
                    .map(|line| {
                        if line.trim().is_empty() {
                            ">".to_string()
                        } else {
                            format!("> {line}")
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                block(&quoted)
            }
            _ => self.render_children(el, list_depth, depth)?,
        };
        Ok(rendered)
    }

    fn render_list(
        &self,
        el: ElementRef<'_>,
        ordered: bool,
        list_depth: usize,
        depth: usize,
    ) -> Result<String, ConversionError> {
        let mut number = el
            .value()
            .attr("start")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(1);
        let mut out = String::new();
        for child in el.children() {
            let Some(li) = ElementRef::wrap(child) else {
                continue;
            };
            if li.value().name() != "li" {
                continue;
            }
            let body = self.render_children(li, list_depth + 1, depth + 1)?;
            let body = EXCESS_NEWLINES.replace_all(body.trim(), "\n\n");
            let marker = if ordered {
                let marker = format!("{number}. ");
                number += 1;
                marker
            } else {
                "- ".to_string()
            };
            out.push_str(&list_item(&marker, &body));
            out.push('\n');
        }
        if list_depth == 0 {
            Ok(block(out.trim_end()))
        } else {
            Ok(format!("\n{}", out.trim_end()))
        }
    }
}

impl ContentConverter for HtmlToMarkdown {
    fn convert(&self, rich_body: &str) -> Result<String, ConversionError> {
        let fragment = Html::parse_fragment(rich_body);
        let raw = self.render_children(fragment.root_element(), 0, 0)?;
        let md = TRAILING_SPACE.replace_all(&raw, "\n");
        let md = EXCESS_NEWLINES.replace_all(&md, "\n\n");
        let md = md.trim();
        if md.is_empty() {
            Ok(String::new())
        } else {
            Ok(format!("{md}\n"))
        }
    }
}

fn block(inner: &str) -> String {
    if inner.is_empty() {
        String::new()
    } else {
        format!("\n\n{inner}\n\n")
    }
}

fn push_text(out: &mut String, text: &str) {
    let collapsed = WHITESPACE.replace_all(text, " ");
    let text = if out.ends_with('\n') || out.ends_with(' ') {
        collapsed.trim_start()
    } else {
        collapsed.as_ref()
    };
    let escaped = escape_inline(text);
    if out.is_empty() || out.ends_with('\n') {
        out.push_str(&escape_line_start(&escaped));
    } else {
        out.push_str(&escaped);
    }
}

fn escape_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '`' | '*' | '_' | '[' | ']' | '<') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape a leading `#`, `>`, `-`, `+` or `1.` so the line is not read as a block.
fn escape_line_start(text: &str) -> String {
    let body = text.trim_start();
    let lead = &text[..text.len() - body.len()];
    if body.starts_with(['#', '>', '-', '+']) {
        return format!("{lead}\\{body}");
    }
    match ORDERED_MARKER.find(body) {
        Some(m) => {
            let digits = m.end() - 1;
            format!("{lead}{}\\{}", &body[..digits], &body[digits..])
        }
        None => text.to_string(),
    }
}

/// Longest run of consecutive backticks in `s`.
fn longest_backtick_run(s: &str) -> usize {
    s.split(|c| c != '`').map(str::len).max().unwrap_or(0)
}

fn code_span(code: &str) -> String {
    if code.is_empty() {
        return String::new();
    }
    let fence = "`".repeat(longest_backtick_run(code) + 1);
    let pad = if code.starts_with('`') || code.ends_with('`') { " " } else { "" };
    format!("{fence}{pad}{code}{pad}{fence}")
}

/// Prefix `body` with `marker`, indenting later lines to the content column.
fn list_item(marker: &str, body: &str) -> String {
    let pad = " ".repeat(marker.len());
    let mut lines = body.lines();
    let mut out = format!("{marker}{}", lines.next().unwrap_or_default());
    for line in lines {
        out.push('\n');
        if !line.is_empty() {
            out.push_str(&pad);
            out.push_str(line);
        }
    }
    out
}

/// Wrap inline content in `marker`, keeping surrounding whitespace outside it.
fn emphasize(inner: &str, marker: &str) -> String {
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        return inner.to_string();
    }
    let lead = if inner.starts_with(char::is_whitespace) { " " } else { "" };
    let trail = if inner.ends_with(char::is_whitespace) { " " } else { "" };
    format!("{lead}{marker}{trimmed}{marker}{trail}")
}

fn fenced(el: ElementRef<'_>) -> String {
    let code: String = el.text().collect();
    let lang = el
        .children()
        .filter_map(ElementRef::wrap)
        .find(|c| c.value().name() == "code")
        .and_then(|c| {
            c.value()
                .classes()
                .find_map(|class| class.strip_prefix("language-"))
                .map(str::to_string)
        })
        .unwrap_or_default();
    let fence = "`".repeat(longest_backtick_run(&code).max(2) + 1);
    format!("\n\n{fence}{lang}\n{}\n{fence}\n\n", code.trim_end_matches('\n'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md(html: &str) -> String {
        HtmlToMarkdown::default().convert(html).unwrap()
    }

    #[test]
    fn test_headings_and_paragraphs() {
        let html = "<h2>Title</h2>\n  <p>Hello <strong>world</strong> and <a href=\"https://x/\">link</a>.</p>";
        assert_eq!(md(html), "## Title\n\nHello **world** and [link](https://x/).\n");
    }

    #[test]
    fn test_empty_body_converts_to_empty_string() {
        assert_eq!(md(""), "");
        assert_eq!(md("<p>   </p>"), "");
    }

    #[test]
    fn test_nested_lists() {
        let html = "<ul><li>One</li><li>Two<ul><li>Sub</li></ul></li></ul>";
        assert_eq!(md(html), "- One\n- Two\n  - Sub\n");
    }

    #[test]
    fn test_ordered_list_honors_start() {
        let html = "<ol start=\"3\"><li>c</li><li>d</li></ol>";
        assert_eq!(md(html), "3. c\n4. d\n");
    }

    #[test]
    fn test_emphasis_keeps_spacing() {
        assert_eq!(md("<p>a<em> b </em>c</p>"), "a *b* c\n");
    }

    #[test]
    fn test_code_and_pre() {
        let html = "<p>Run <code>cargo</code>:</p><pre><code class=\"language-sh\">ls -la\n</code></pre>";
        assert_eq!(md(html), "Run `cargo`:\n\n```sh\nls -la\n```\n");
    }

    #[test]
    fn test_blockquote_and_rule() {
        let html = "<blockquote><p>one</p><p>two</p></blockquote><hr>";
        assert_eq!(md(html), "> one\n>\n> two\n\n---\n");
    }

    #[test]
    fn test_image_and_line_break() {
        let html = "<p><img src=\"/a.png\" alt=\"A\">line<br>next</p>";
        assert_eq!(md(html), "![A](/a.png)line\\\nnext\n");
    }

    #[test]
    fn test_scripts_are_dropped_and_entities_decoded() {
        let html = "<p>Fish &amp; chips</p><script>alert(1)</script><style>p{}</style>";
        assert_eq!(md(html), "Fish & chips\n");
    }

    #[test]
    fn test_code_span_containing_backticks() {
        assert_eq!(md("<code>a`b</code>"), "``a`b``\n");
        assert_eq!(md("<p>x <code>`tick</code></p>"), "x `` `tick ``\n");
    }

    #[test]
    fn test_fence_outgrows_backticks_in_block() {
        let html = "<pre><code>```\nnested\n```</code></pre>";
        assert_eq!(md(html), "````\n```\nnested\n```\n````\n");
    }

    #[test]
    fn test_markdown_characters_in_text_are_escaped() {
        assert_eq!(
            md("<p>1. not a list * star _u_</p>"),
            "1\\. not a list \\* star \\_u\\_\n"
        );
        assert_eq!(md("<p># not a heading</p>"), "\\# not a heading\n");
        assert_eq!(md("<p>- dash</p><p>a [b] &lt;c&gt;</p>"), "\\- dash\n\na \\[b\\] \\<c>\n");
        // Mid-line markers are harmless and left alone.
        assert_eq!(md("<p>x - y 2. z</p>"), "x - y 2. z\n");
    }

    #[test]
    fn test_list_item_paragraphs_stay_in_item() {
        assert_eq!(md("<ul><li><p>a</p><p>b</p></li></ul>"), "- a\n\n  b\n");
        assert_eq!(
            md("<ol start=\"9\"><li>x</li><li><p>y</p><p>z</p></li></ol>"),
            "9. x\n10. y\n\n    z\n"
        );
    }

    #[test]
    fn test_list_nested_under_ordered_item() {
        let html = "<ol><li>Top<ul><li>Sub<ul><li>Deep</li></ul></li></ul></li></ol>";
        assert_eq!(md(html), "1. Top\n   - Sub\n     - Deep\n");
    }

    #[test]
    fn test_nesting_limit_fails() {
        let html = format!("{}x{}", "<span>".repeat(20), "</span>".repeat(20));
        let err = HtmlToMarkdown::with_max_depth(8).convert(&html).unwrap_err();
        assert_eq!(err, ConversionError::TooDeep { depth: 8 });
    }

    #[test]
    fn test_closures_are_converters() {
        let upper = |s: &str| -> Result<String, ConversionError> { Ok(s.to_uppercase()) };
        assert_eq!(upper.convert("abc").unwrap(), "ABC");
    }
}
