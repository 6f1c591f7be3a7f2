//! Confluence storage format renderer for pulldown-cmark events.

use std::fmt::Write;

use m2c_languages::LanguageMap;
use pulldown_cmark::{CodeBlockKind, Event, Tag, TagEnd};

use crate::fenced::{FenceMode, FencedCodeRenderer};
use crate::util::{escape_xml, heading_level_to_num};

/// Renders pulldown-cmark events to Confluence XHTML storage format.
///
/// Fenced code blocks are delegated to [`FencedCodeRenderer`], which also
/// handles the reserved `CONFLUENCE-MACRO` declaration blocks. Everything
/// else maps to storage-format XHTML directly.
pub struct ConfluenceRenderer<'a> {
    output: String,
    fenced: FencedCodeRenderer<'a>,
    /// Mode of the fenced block currently being rendered, if any.
    fence: Option<FenceMode>,
    /// Body collected for a macro-declaration block; unused in code mode.
    macro_body: String,
    /// Stack of nested list types (true = ordered, false = unordered).
    list_stack: Vec<bool>,
}

impl ConfluenceRenderer<'static> {
    /// Renderer backed by the bundled language alias table.
    pub fn new() -> Self {
        Self::with_languages(LanguageMap::bundled())
    }
}

impl<'a> ConfluenceRenderer<'a> {
    /// Renderer with an explicitly injected language alias table.
    pub fn with_languages(languages: &'a LanguageMap) -> Self {
        Self {
            output: String::with_capacity(4096),
            fenced: FencedCodeRenderer::new(languages),
            fence: None,
            macro_body: String::new(),
            list_stack: Vec::new(),
        }
    }

    /// Render markdown events to Confluence storage format.
    pub fn render<'e, I>(mut self, events: I) -> String
    where
        I: Iterator<Item = Event<'e>>,
    {
        for event in events {
            self.process_event(event);
        }
        self.output
    }

    fn process_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start_tag(tag),
            Event::End(tag) => self.end_tag(tag),
            Event::Text(text) => self.text(&text),
            Event::Code(code) => self.inline_code(&code),
            Event::Html(html) | Event::InlineHtml(html) => self.raw_html(&html),
            Event::SoftBreak => self.soft_break(),
            Event::HardBreak => self.output.push_str("<br />"),
            Event::Rule => self.output.push_str("<hr />"),
            Event::TaskListMarker(checked) => {
                self.output.push_str(if checked { "[x] " } else { "[ ] " });
            }
            Event::FootnoteReference(_) | Event::InlineMath(_) | Event::DisplayMath(_) => {
                // Not supported in Confluence
            }
        }
    }

    fn start_tag(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if self.fence.is_none() {
                    self.output.push_str("<p>");
                }
            }
            Tag::Heading { level, .. } => {
                write!(self.output, "<h{}>", heading_level_to_num(level)).unwrap();
            }
            Tag::BlockQuote(_) => {
                self.output.push_str(
                    r#"<ac:structured-macro ac:name="info" ac:schema-version="1"><ac:rich-text-body>"#,
                );
            }
            Tag::CodeBlock(kind) => {
                let language = match kind {
                    CodeBlockKind::Fenced(ref info) if !info.is_empty() => {
                        info.split_whitespace().next()
                    }
                    _ => None,
                };
                self.macro_body.clear();
                self.fence = Some(self.fenced.open(language, &mut self.output));
            }
            Tag::List(start) => {
                let ordered = start.is_some();
                self.list_stack.push(ordered);
                self.output.push_str(if ordered { "<ol>" } else { "<ul>" });
            }
            Tag::Item => {
                self.output.push_str("<li>");
            }
            Tag::DefinitionList => {
                self.output.push_str("<dl>");
            }
            Tag::DefinitionListTitle => {
                self.output.push_str("<dt>");
            }
            Tag::DefinitionListDefinition => {
                self.output.push_str("<dd>");
            }
            Tag::Table(_) => {
                self.output.push_str("<table><tbody>");
            }
            Tag::TableHead | Tag::TableRow => {
                self.output.push_str("<tr>");
            }
            Tag::TableCell => {
                self.output.push_str("<td>");
            }
            Tag::Emphasis => {
                self.output.push_str("<em>");
            }
            Tag::Strong => {
                self.output.push_str("<strong>");
            }
            Tag::Strikethrough => {
                self.output.push_str("<s>");
            }
            Tag::Link { dest_url, .. } => {
                write!(self.output, r#"<a href="{}">"#, escape_xml(&dest_url)).unwrap();
            }
            Tag::Image { dest_url, .. } => {
                if dest_url.starts_with("http://") || dest_url.starts_with("https://") {
                    write!(
                        self.output,
                        r#"<ac:image><ri:url ri:value="{}" /></ac:image>"#,
                        escape_xml(&dest_url)
                    )
                    .unwrap();
                } else {
                    // Local file, assumed to be uploaded as an attachment.
                    let filename = dest_url.rsplit('/').next().unwrap_or(&dest_url);
                    write!(
                        self.output,
                        r#"<ac:image><ri:attachment ri:filename="{}" /></ac:image>"#,
                        escape_xml(filename)
                    )
                    .unwrap();
                }
            }
            Tag::FootnoteDefinition(_)
            | Tag::HtmlBlock
            | Tag::MetadataBlock(_)
            | Tag::Superscript
            | Tag::Subscript => {}
        }
    }

    fn end_tag(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Paragraph => {
                if self.fence.is_none() {
                    self.output.push_str("</p>");
                }
            }
            TagEnd::Heading(level) => {
                write!(self.output, "</h{}>", heading_level_to_num(level)).unwrap();
            }
            TagEnd::BlockQuote(_) => {
                self.output
                    .push_str("</ac:rich-text-body></ac:structured-macro>");
            }
            TagEnd::CodeBlock => {
                if let Some(mode) = self.fence.take() {
                    let body = std::mem::take(&mut self.macro_body);
                    self.fenced.close(mode, &body, &mut self.output);
                }
            }
            TagEnd::List(_) => {
                let ordered = self.list_stack.pop().unwrap_or(false);
                self.output.push_str(if ordered { "</ol>" } else { "</ul>" });
            }
            TagEnd::Item => {
                self.output.push_str("</li>");
            }
            TagEnd::DefinitionList => {
                self.output.push_str("</dl>");
            }
            TagEnd::DefinitionListTitle => {
                self.output.push_str("</dt>");
            }
            TagEnd::DefinitionListDefinition => {
                self.output.push_str("</dd>");
            }
            TagEnd::Table => {
                self.output.push_str("</tbody></table>");
            }
            TagEnd::TableHead | TagEnd::TableRow => {
                self.output.push_str("</tr>");
            }
            TagEnd::TableCell => {
                self.output.push_str("</td>");
            }
            TagEnd::Emphasis => {
                self.output.push_str("</em>");
            }
            TagEnd::Strong => {
                self.output.push_str("</strong>");
            }
            TagEnd::Strikethrough => {
                self.output.push_str("</s>");
            }
            TagEnd::Link => {
                self.output.push_str("</a>");
            }
            TagEnd::Image
            | TagEnd::FootnoteDefinition
            | TagEnd::HtmlBlock
            | TagEnd::MetadataBlock(_)
            | TagEnd::Superscript
            | TagEnd::Subscript => {}
        }
    }

    fn text(&mut self, text: &str) {
        match self.fence {
            // Plain code streams through unescaped (CDATA wraps it).
            Some(FenceMode::Code) => self.output.push_str(text),
            // Macro declarations are parsed on block close.
            Some(FenceMode::Macro) => self.macro_body.push_str(text),
            None => self.output.push_str(&escape_xml(text)),
        }
    }

    fn inline_code(&mut self, code: &str) {
        write!(self.output, "<code>{}</code>", escape_xml(code)).unwrap();
    }

    fn raw_html(&mut self, html: &str) {
        self.output.push_str(html);
    }

    fn soft_break(&mut self) {
        self.output.push('\n');
    }
}

impl Default for ConfluenceRenderer<'static> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use m2c_languages::LanguageEntry;
    use pretty_assertions::assert_eq;
    use pulldown_cmark::Parser;

    use super::*;

    fn render(markdown: &str) -> String {
        let parser = Parser::new(markdown);
        ConfluenceRenderer::new().render(parser)
    }

    #[test]
    fn test_basic_paragraph() {
        assert_eq!(render("Hello, world!"), "<p>Hello, world!</p>");
    }

    #[test]
    fn test_heading() {
        assert_eq!(render("# Title"), "<h1>Title</h1>");
    }

    #[test]
    fn test_text_is_escaped_outside_code() {
        assert_eq!(render("a < b & c"), "<p>a &lt; b &amp; c</p>");
    }

    #[test]
    fn test_emphasis_and_strong() {
        assert_eq!(
            render("*em* **strong**"),
            "<p><em>em</em> <strong>strong</strong></p>"
        );
    }

    #[test]
    fn test_lists() {
        assert_eq!(
            render("- a\n- b"),
            "<ul><li>a</li><li>b</li></ul>"
        );
        assert_eq!(
            render("1. a\n2. b"),
            "<ol><li>a</li><li>b</li></ol>"
        );
    }

    #[test]
    fn test_blockquote_becomes_info_macro() {
        let out = render("> Note");
        assert!(out.starts_with(
            r#"<ac:structured-macro ac:name="info" ac:schema-version="1"><ac:rich-text-body>"#
        ));
        assert!(out.ends_with("</ac:rich-text-body></ac:structured-macro>"));
    }

    #[test]
    fn test_inline_code() {
        assert_eq!(render("`x < 1`"), "<p><code>x &lt; 1</code></p>");
    }

    #[test]
    fn test_external_image_uses_url_resource() {
        let out = render("![alt](https://example.com/pic.png)");
        assert!(out.contains(r#"<ac:image><ri:url ri:value="https://example.com/pic.png" /></ac:image>"#));
    }

    #[test]
    fn test_local_image_uses_attachment_resource() {
        let out = render("![alt](images/diagram.png)");
        assert!(out.contains(r#"<ac:image><ri:attachment ri:filename="diagram.png" /></ac:image>"#));
    }

    #[test]
    fn test_fenced_code_block_full_output() {
        let out = render("```python\nx = 1\n```");
        assert_eq!(
            out,
            "<ac:structured-macro ac:name=\"code\" ac:schema-version=\"1\">\
             <ac:parameter ac:name=\"theme\">Confluence</ac:parameter>\
             <ac:parameter ac:name=\"linenumbers\">true</ac:parameter>\
             <ac:parameter ac:name=\"language\">python</ac:parameter>\
             <ac:plain-text-body><![CDATA[ x = 1\n ]]></ac:plain-text-body>\
             </ac:structured-macro>"
        );
    }

    #[test]
    fn test_fenced_code_block_alias_resolution() {
        let out = render("```py\nx = 1\n```");
        assert!(out.contains(r#"<ac:parameter ac:name="language">python</ac:parameter>"#));
    }

    #[test]
    fn test_fenced_code_block_body_not_escaped() {
        let out = render("```xml\n<a href=\"x\">&amp;</a>\n```");
        assert!(out.contains("<![CDATA[ <a href=\"x\">&amp;</a>\n ]]>"));
    }

    #[test]
    fn test_fenced_code_block_without_language() {
        let out = render("```\nplain text\n```");
        assert!(!out.contains(r#"ac:name="language""#));
        assert!(out.contains("<![CDATA[ plain text\n ]]>"));
    }

    #[test]
    fn test_indented_code_block_has_no_language() {
        let out = render("    indented code\n");
        assert!(!out.contains(r#"ac:name="language""#));
        assert!(out.contains("indented code"));
    }

    #[test]
    fn test_confluence_macro_block() {
        let out = render(
            "```CONFLUENCE-MACRO\nname: status\nstatus: green\n  title: Build OK\nplain-text-body: hello\n```",
        );
        assert_eq!(
            out,
            "<ac:structured-macro ac:name=\"status\" ac:status=\"green\">\
             <ac:parameter ac:name=\"title\">Build OK</ac:parameter>\
             <ac:plain-text-body>hello</ac:plain-text-body>\
             </ac:structured-macro>"
        );
    }

    #[test]
    fn test_confluence_macro_block_empty() {
        assert_eq!(
            render("```CONFLUENCE-MACRO\n```"),
            "<ac:structured-macro></ac:structured-macro>"
        );
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let markdown = "# Doc\n\n```py\nx = 1\n```\n\n```CONFLUENCE-MACRO\nname: toc\n  maxLevel: 3\n```";
        assert_eq!(render(markdown), render(markdown));
    }

    #[test]
    fn test_injected_language_map() {
        let languages = LanguageMap::from_entries(vec![LanguageEntry {
            name: "rust".to_owned(),
            aliases: vec!["ferris".to_owned()],
        }]);
        let parser = Parser::new("```ferris\nfn main() {}\n```");
        let out = ConfluenceRenderer::with_languages(&languages).render(parser);
        assert!(out.contains(r#"<ac:parameter ac:name="language">rust</ac:parameter>"#));
    }

    #[test]
    fn test_soft_and_hard_breaks() {
        assert_eq!(render("a\nb"), "<p>a\nb</p>");
        assert_eq!(render("a  \nb"), "<p>a<br />b</p>");
    }

    #[test]
    fn test_horizontal_rule() {
        assert_eq!(render("---"), "<hr />");
    }
}
