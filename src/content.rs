//! Content transformation between HTML, plaintext, and Markdown.
//!
//! All functions here are pure and deterministic. HTML parsing is
//! best-effort: input the parser rejects falls back to a regex tag strip,
//! so malformed markup degrades gracefully instead of failing the write
//! that triggered the derivation.

use html_parser::{Dom, Element, Node};
use log::debug;
use pulldown_cmark::{html, Options, Parser};
use regex::Regex;

/// Derives both stored representations from an HTML body in one step.
///
/// The store calls this whenever `html_content` is set or changed, so the
/// plaintext index and the Markdown rendition always describe the same
/// HTML.
pub fn derive(html_content: &str) -> (String, String) {
    (
        extract_plaintext(html_content),
        html_to_markdown(html_content),
    )
}

/// Extracts the visible text of an HTML fragment.
///
/// Words are separated by single spaces and the result is trimmed.
/// `<script>` and `<style>` contents are dropped, comments are ignored,
/// and basic character entities are decoded. Never fails: unparseable
/// input goes through a tag-stripping fallback.
pub fn extract_plaintext(html_content: &str) -> String {
    match Dom::parse(html_content) {
        Ok(dom) => {
            let mut segments = Vec::new();
            collect_text(&dom.children, &mut segments);
            normalize_whitespace(&segments.join(" "))
        }
        Err(err) => {
            debug!("HTML parse failed, using tag-strip fallback: {}", err);
            strip_tags_fallback(html_content)
        }
    }
}

/// Converts an HTML fragment to Markdown.
///
/// Anchor hrefs are always preserved as `[text](href)` and the output is
/// never hard-wrapped at any column width. Headings, emphasis, inline and
/// fenced code, lists, block quotes, tables, images, and rules are mapped;
/// unknown elements contribute their text content. Unparseable input
/// degrades to plaintext extraction.
pub fn html_to_markdown(html_content: &str) -> String {
    match Dom::parse(html_content) {
        Ok(dom) => {
            let mut writer = MarkdownWriter::default();
            writer.blocks(&dom.children);
            writer.finish()
        }
        Err(err) => {
            debug!("HTML parse failed, using tag-strip fallback: {}", err);
            strip_tags_fallback(html_content)
        }
    }
}

/// Renders Markdown to HTML with tables, strikethrough, task lists, and
/// footnotes enabled. Fenced code blocks carry `language-*` classes that
/// syntax highlighters can pick up. Used for round-trip/export support
/// only; the write path derives from HTML, never toward it.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::new();
    html::push_html(&mut out, parser);
    out
}

/// Collects visible text segments in document order.
fn collect_text(nodes: &[Node], segments: &mut Vec<String>) {
    for node in nodes {
        match node {
            Node::Text(text) => segments.push(decode_entities(text)),
            Node::Element(el) => {
                if !matches!(
                    el.name.to_ascii_lowercase().as_str(),
                    "script" | "style"
                ) {
                    collect_text(&el.children, segments);
                }
            }
            Node::Comment(_) => {}
        }
    }
}

/// Last-resort text extraction for markup the parser rejects.
fn strip_tags_fallback(html_content: &str) -> String {
    let block_re = Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").unwrap();
    let tag_re = Regex::new(r"<[^>]*>").unwrap();

    let without_blocks = block_re.replace_all(html_content, " ");
    let without_tags = tag_re.replace_all(&without_blocks, " ");
    normalize_whitespace(&decode_entities(&without_tags))
}

/// Decodes the basic character entities. `&amp;` must come last so that
/// double-escaped sequences stay literal.
fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Collapses all whitespace runs to single spaces and trims the ends.
fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapses whitespace runs to single spaces but keeps a leading or
/// trailing space, so inline fragments keep their word boundaries.
fn soft_normalize(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_whitespace = false;
    for ch in text.chars() {
        if ch.is_whitespace() {
            if !in_whitespace {
                out.push(' ');
                in_whitespace = true;
            }
        } else {
            out.push(ch);
            in_whitespace = false;
        }
    }
    out
}

/// Concatenated text content with whitespace preserved, for code blocks.
fn raw_text(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(&decode_entities(text)),
            Node::Element(el) => out.push_str(&raw_text(&el.children)),
            Node::Comment(_) => {}
        }
    }
    out
}

fn attr(el: &Element, name: &str) -> Option<String> {
    el.attributes.get(name).and_then(|value| value.clone())
}

fn is_block(name: &str) -> bool {
    matches!(
        name,
        "h1" | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "p"
            | "div"
            | "section"
            | "article"
            | "main"
            | "header"
            | "footer"
            | "aside"
            | "nav"
            | "ul"
            | "ol"
            | "blockquote"
            | "pre"
            | "table"
            | "hr"
    )
}

/// Inline Markdown for a run of nodes.
fn render_inline(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(&soft_normalize(&decode_entities(text))),
            Node::Element(el) => out.push_str(&render_inline_element(el)),
            Node::Comment(_) => {}
        }
    }
    out
}

fn render_inline_element(el: &Element) -> String {
    let name = el.name.to_ascii_lowercase();
    match name.as_str() {
        "strong" | "b" => format!("**{}**", render_inline(&el.children).trim()),
        "em" | "i" => format!("*{}*", render_inline(&el.children).trim()),
        "del" | "s" | "strike" => format!("~~{}~~", render_inline(&el.children).trim()),
        "code" => format!("`{}`", raw_text(&el.children).trim()),
        "a" => {
            let text = render_inline(&el.children);
            match attr(el, "href") {
                // Link targets are never dropped
                Some(href) => format!("[{}]({})", text.trim(), href),
                None => text,
            }
        }
        "img" => format!(
            "![{}]({})",
            attr(el, "alt").unwrap_or_default(),
            attr(el, "src").unwrap_or_default()
        ),
        "br" => "\n".to_string(),
        "script" | "style" => String::new(),
        _ => render_inline(&el.children),
    }
}

/// Streams block-level Markdown. Inline content between block elements is
/// accumulated and flushed as its own paragraph.
#[derive(Default)]
struct MarkdownWriter {
    out: String,
    para: String,
}

impl MarkdownWriter {
    fn blocks(&mut self, nodes: &[Node]) {
        for node in nodes {
            match node {
                Node::Text(text) => self.para.push_str(&soft_normalize(&decode_entities(text))),
                Node::Comment(_) => {}
                Node::Element(el) => {
                    let name = el.name.to_ascii_lowercase();
                    if is_block(&name) {
                        self.block_element(el, &name);
                    } else {
                        self.para.push_str(&render_inline_element(el));
                    }
                }
            }
        }
        self.flush_paragraph();
    }

    fn flush_paragraph(&mut self) {
        let text = self.para.trim().to_string();
        self.para.clear();
        if !text.is_empty() {
            self.out.push_str(&text);
            self.out.push_str("\n\n");
        }
    }

    fn block_element(&mut self, el: &Element, name: &str) {
        self.flush_paragraph();
        match name {
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                let level: usize = name[1..].parse().unwrap_or(1);
                let text = render_inline(&el.children).trim().to_string();
                if !text.is_empty() {
                    self.out.push_str(&"#".repeat(level));
                    self.out.push(' ');
                    self.out.push_str(&text);
                    self.out.push_str("\n\n");
                }
            }
            "p" => {
                let text = render_inline(&el.children).trim().to_string();
                if !text.is_empty() {
                    self.out.push_str(&text);
                    self.out.push_str("\n\n");
                }
            }
            "div" | "section" | "article" | "main" | "header" | "footer" | "aside" | "nav" => {
                self.blocks(&el.children);
            }
            "ul" => {
                self.list(el, 0, false);
                self.out.push('\n');
            }
            "ol" => {
                self.list(el, 0, true);
                self.out.push('\n');
            }
            "blockquote" => {
                let mut inner = MarkdownWriter::default();
                inner.blocks(&el.children);
                for line in inner.finish().lines() {
                    self.out.push_str("> ");
                    self.out.push_str(line);
                    self.out.push('\n');
                }
                self.out.push('\n');
            }
            "pre" => self.code_block(el),
            "table" => self.table(el),
            "hr" => self.out.push_str("---\n\n"),
            _ => {}
        }
    }

    fn list(&mut self, el: &Element, depth: usize, ordered: bool) {
        let mut index = 1usize;
        for node in &el.children {
            let item = match node {
                Node::Element(item) => item,
                _ => continue,
            };
            match item.name.to_ascii_lowercase().as_str() {
                "li" => {}
                "ul" => {
                    self.list(item, depth + 1, false);
                    continue;
                }
                "ol" => {
                    self.list(item, depth + 1, true);
                    continue;
                }
                _ => continue,
            }

            let mut text = String::new();
            let mut sublists: Vec<(&Element, bool)> = Vec::new();
            for child in &item.children {
                match child {
                    Node::Element(sub) if sub.name.eq_ignore_ascii_case("ul") => {
                        sublists.push((sub, false));
                    }
                    Node::Element(sub) if sub.name.eq_ignore_ascii_case("ol") => {
                        sublists.push((sub, true));
                    }
                    Node::Element(sub) => text.push_str(&render_inline_element(sub)),
                    Node::Text(t) => text.push_str(&soft_normalize(&decode_entities(t))),
                    Node::Comment(_) => {}
                }
            }

            self.out.push_str(&"  ".repeat(depth));
            if ordered {
                self.out.push_str(&format!("{}. ", index));
            } else {
                self.out.push_str("- ");
            }
            self.out.push_str(text.trim());
            self.out.push('\n');
            index += 1;

            for (sub, sub_ordered) in sublists {
                self.list(sub, depth + 1, sub_ordered);
            }
        }
    }

    fn code_block(&mut self, el: &Element) {
        let (language, code) = match el.children.first() {
            Some(Node::Element(inner)) if inner.name.eq_ignore_ascii_case("code") => {
                let language = inner
                    .classes
                    .iter()
                    .find_map(|class| class.strip_prefix("language-"))
                    .unwrap_or_default()
                    .to_string();
                (language, raw_text(&inner.children))
            }
            _ => (String::new(), raw_text(&el.children)),
        };

        self.out.push_str("```");
        self.out.push_str(&language);
        self.out.push('\n');
        self.out.push_str(code.trim_matches('\n'));
        self.out.push_str("\n```\n\n");
    }

    fn table(&mut self, el: &Element) {
        let mut rows: Vec<(Vec<String>, bool)> = Vec::new();
        collect_table_rows(el, &mut rows);

        for (i, (cells, is_header)) in rows.iter().enumerate() {
            self.out.push_str("| ");
            self.out.push_str(&cells.join(" | "));
            self.out.push_str(" |\n");
            if i == 0 && *is_header {
                self.out.push_str("| ");
                self.out
                    .push_str(&vec!["---"; cells.len()].join(" | "));
                self.out.push_str(" |\n");
            }
        }
        self.out.push('\n');
    }

    fn finish(mut self) -> String {
        self.flush_paragraph();
        let trimmed = self.out.trim_end().to_string();
        if trimmed.is_empty() {
            trimmed
        } else {
            trimmed + "\n"
        }
    }
}

fn collect_table_rows(el: &Element, rows: &mut Vec<(Vec<String>, bool)>) {
    for node in &el.children {
        let child = match node {
            Node::Element(child) => child,
            _ => continue,
        };
        match child.name.to_ascii_lowercase().as_str() {
            "tr" => {
                let mut cells = Vec::new();
                let mut is_header = false;
                for cell_node in &child.children {
                    if let Node::Element(cell) = cell_node {
                        match cell.name.to_ascii_lowercase().as_str() {
                            "th" => {
                                is_header = true;
                                cells.push(render_inline(&cell.children).trim().to_string());
                            }
                            "td" => cells.push(render_inline(&cell.children).trim().to_string()),
                            _ => {}
                        }
                    }
                }
                if !cells.is_empty() {
                    rows.push((cells, is_header));
                }
            }
            "thead" | "tbody" | "tfoot" => collect_table_rows(child, rows),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plaintext_strips_inline_markup() {
        assert_eq!(
            extract_plaintext("<p>Hello <b>World</b></p>"),
            "Hello World"
        );
    }

    #[test]
    fn plaintext_separates_blocks_with_spaces() {
        assert_eq!(extract_plaintext("<p>first</p><p>second</p>"), "first second");
    }

    #[test]
    fn plaintext_never_contains_tag_delimiters() {
        let samples = [
            "<h1>Title</h1><p>Body with <a href=\"https://example.com\">a link</a>.</p>",
            "<ul><li>one</li><li>two</li></ul>",
            "<div><span>nested <em>emphasis</em></span></div>",
            "plain text, no markup at all",
        ];
        for sample in samples {
            let text = extract_plaintext(sample);
            assert!(
                !text.contains('<') && !text.contains('>'),
                "markup leaked into plaintext of {sample:?}: {text:?}"
            );
        }
    }

    #[test]
    fn plaintext_skips_script_and_style() {
        let html = "<p>visible</p><script>var x = 1;</script><style>p { color: red }</style>";
        assert_eq!(extract_plaintext(html), "visible");
    }

    #[test]
    fn plaintext_decodes_entities() {
        assert_eq!(
            extract_plaintext("<p>Fish &amp; Chips &gt; Salad</p>"),
            "Fish & Chips > Salad"
        );
    }

    #[test]
    fn plaintext_collapses_whitespace() {
        assert_eq!(
            extract_plaintext("<p>  spaced \n  out\ttext  </p>"),
            "spaced out text"
        );
    }

    #[test]
    fn malformed_html_never_fails() {
        // Whatever path these take, extraction must return quietly.
        for sample in ["<p><b>unclosed", "</p>", "<<<>>>", "<a href=>broken</a>", ""] {
            let _ = extract_plaintext(sample);
            let _ = html_to_markdown(sample);
        }
        assert_eq!(extract_plaintext("<p><b>unclosed"), "unclosed");
    }

    #[test]
    fn markdown_keeps_strong_emphasis() {
        let md = html_to_markdown("<p>Hello <b>World</b></p>");
        assert!(md.contains("Hello **World**"), "got {md:?}");
    }

    #[test]
    fn markdown_preserves_link_targets() {
        let md = html_to_markdown("<p>see <a href=\"https://example.com/x\">the docs</a></p>");
        assert!(md.contains("[the docs](https://example.com/x)"), "got {md:?}");
    }

    #[test]
    fn markdown_headings_and_lists() {
        let md = html_to_markdown(
            "<h2>Topics</h2><ul><li>alpha</li><li>beta <b>strong</b></li></ul>",
        );
        assert!(md.contains("## Topics"), "got {md:?}");
        assert!(md.contains("- alpha"), "got {md:?}");
        assert!(md.contains("- beta **strong**"), "got {md:?}");
    }

    #[test]
    fn markdown_is_not_hard_wrapped() {
        let long = "word ".repeat(80);
        let md = html_to_markdown(&format!("<p>{}</p>", long.trim()));
        // One paragraph stays on one line no matter how long it is.
        assert_eq!(md.trim_end().lines().count(), 1);
    }

    #[test]
    fn markdown_fenced_code_with_language() {
        let md = html_to_markdown(
            "<pre><code class=\"language-rust\">fn main() {}\n</code></pre>",
        );
        assert!(md.contains("```rust\nfn main() {}\n```"), "got {md:?}");
    }

    #[test]
    fn markdown_blockquote() {
        let md = html_to_markdown("<blockquote><p>quoted line</p></blockquote>");
        assert!(md.contains("> quoted line"), "got {md:?}");
    }

    #[test]
    fn markdown_table_rows() {
        let md = html_to_markdown(
            "<table><tr><th>k</th><th>v</th></tr><tr><td>a</td><td>1</td></tr></table>",
        );
        assert!(md.contains("| k | v |"), "got {md:?}");
        assert!(md.contains("| --- | --- |"), "got {md:?}");
        assert!(md.contains("| a | 1 |"), "got {md:?}");
    }

    #[test]
    fn markdown_to_html_renders_tables() {
        let html = markdown_to_html("| a | b |\n| --- | --- |\n| 1 | 2 |");
        assert!(html.contains("<table>"), "got {html:?}");
    }

    #[test]
    fn markdown_to_html_fenced_code_keeps_language_class() {
        let html = markdown_to_html("```rust\nfn main() {}\n```");
        assert!(html.contains("language-rust"), "got {html:?}");
    }

    #[test]
    fn derive_produces_both_representations() {
        let (plaintext, markdown) = derive("<p>Hello <b>World</b></p>");
        assert_eq!(plaintext, "Hello World");
        assert!(markdown.contains("**World**"));
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert_eq!(extract_plaintext(""), "");
        assert_eq!(html_to_markdown(""), "");
    }
}
