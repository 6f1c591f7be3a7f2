//! Fenced code block rendering for Confluence storage format.
//!
//! A fenced block renders one of two ways, selected by its language tag:
//!
//! - any ordinary tag (or none): a `code` structured macro wrapping the
//!   literal block body in a CDATA plain-text body;
//! - the reserved tag [`MACRO_LANGUAGE_TAG`]: the block body is a macro
//!   declaration in a line-oriented mini-language and renders as an
//!   arbitrary structured macro.
//!
//! The mini-language uses indentation as structure. An unindented
//! `key: value` line becomes an attribute on the macro's opening tag
//! (or a nested body element when the key is a recognized content key);
//! an indented one becomes an `<ac:parameter>`. Lines without a colon
//! become parameters with an empty name. No line is a parse error.

use std::fmt::Write;

use m2c_languages::LanguageMap;

/// Reserved fence tag selecting macro-declaration mode. Case-sensitive.
pub const MACRO_LANGUAGE_TAG: &str = "CONFLUENCE-MACRO";

/// Keys that render as nested body elements rather than attributes.
const CONTENT_KEYS: [&str; 2] = ["plain-text-body", "rich-text-body"];

/// Rendering mode chosen when a fence is opened, threaded back in on close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceMode {
    /// Plain code: the body streams straight to the output inside CDATA.
    Code,
    /// Macro declaration: the body is buffered and parsed on close.
    Macro,
}

/// Renders fenced code blocks, resolving language tags through an injected
/// [`LanguageMap`].
///
/// The two-phase [`open`](Self::open)/[`close`](Self::close) API matches the
/// enter/leave convention of an event-walking host renderer: `open` is
/// called on `Start(CodeBlock)`, `close` on `End(CodeBlock)`. In `Code`
/// mode the host writes `Text` events directly to the output between the
/// two calls, so plain code is never buffered. In `Macro` mode nothing is
/// emitted until `close` receives the collected body.
#[derive(Debug, Clone, Copy)]
pub struct FencedCodeRenderer<'a> {
    languages: &'a LanguageMap,
}

impl<'a> FencedCodeRenderer<'a> {
    pub fn new(languages: &'a LanguageMap) -> Self {
        Self { languages }
    }

    /// Open a fenced block. Returns the mode the host must close with.
    pub fn open(&self, language: Option<&str>, out: &mut String) -> FenceMode {
        if language == Some(MACRO_LANGUAGE_TAG) {
            return FenceMode::Macro;
        }

        out.push_str(r#"<ac:structured-macro ac:name="code" ac:schema-version="1">"#);
        out.push_str(r#"<ac:parameter ac:name="theme">Confluence</ac:parameter>"#);
        out.push_str(r#"<ac:parameter ac:name="linenumbers">true</ac:parameter>"#);
        if let Some(tag) = language {
            let resolved = self.languages.lookup(tag);
            write!(
                out,
                r#"<ac:parameter ac:name="language">{resolved}</ac:parameter>"#
            )
            .unwrap();
        }
        // Leading space keeps a body starting with "]]" out of the CDATA
        // delimiter; close() mirrors it.
        out.push_str("<ac:plain-text-body><![CDATA[ ");
        FenceMode::Code
    }

    /// Close a fenced block. `body` is only read in `Macro` mode.
    pub fn close(&self, mode: FenceMode, body: &str, out: &mut String) {
        match mode {
            FenceMode::Code => {
                out.push_str(" ]]></ac:plain-text-body></ac:structured-macro>");
            }
            FenceMode::Macro => write_macro(body, out),
        }
    }
}

/// One classified line of a macro declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
enum MacroLine {
    /// Unindented `key: value` — an `ac:key="value"` opening-tag attribute.
    Attribute { key: String, value: String },
    /// Indented `key: value`, or a line without a colon (empty key) — an
    /// `<ac:parameter ac:name="key">value</ac:parameter>` element.
    Parameter { key: String, value: String },
    /// Unindented line whose key is a recognized content key — a nested
    /// `<ac:key>value</ac:key>` body element.
    ContentSection { key: String, value: String },
}

/// Classify one line of a macro declaration. Blank lines classify to
/// `None`; everything else maps to some emittable element.
fn classify(line: &str) -> Option<MacroLine> {
    let Some((raw_key, raw_value)) = line.split_once(':') else {
        let value = line.trim();
        if value.is_empty() {
            return None;
        }
        return Some(MacroLine::Parameter {
            key: String::new(),
            value: value.to_owned(),
        });
    };

    let key = raw_key.trim();
    let value = raw_value.trim();
    if key.is_empty() {
        // A line starting with a colon has nothing to name; treat it like
        // a colon-free line.
        return Some(MacroLine::Parameter {
            key: String::new(),
            value: value.to_owned(),
        });
    }

    // Leading whitespace before the key demotes the line to a parameter.
    let indented = key.chars().next() != raw_key.chars().next();
    if indented {
        Some(MacroLine::Parameter {
            key: key.to_owned(),
            value: value.to_owned(),
        })
    } else if CONTENT_KEYS.contains(&key) {
        Some(MacroLine::ContentSection {
            key: key.to_owned(),
            value: value.to_owned(),
        })
    } else {
        Some(MacroLine::Attribute {
            key: key.to_owned(),
            value: value.to_owned(),
        })
    }
}

/// Parse a macro declaration body and emit the structured macro.
///
/// Attributes accumulate on the opening tag; parameters and content
/// sections accumulate in the body in declaration order. The whole macro
/// is written in one pass once all lines are classified.
fn write_macro(body: &str, out: &mut String) {
    let mut opening = String::from("<ac:structured-macro");
    let mut children = String::new();

    for line in body.lines() {
        match classify(line) {
            Some(MacroLine::Attribute { key, value }) => {
                write!(opening, r#" ac:{key}="{value}""#).unwrap();
            }
            Some(MacroLine::Parameter { key, value }) => {
                write!(
                    children,
                    r#"<ac:parameter ac:name="{key}">{value}</ac:parameter>"#
                )
                .unwrap();
            }
            Some(MacroLine::ContentSection { key, value }) => {
                write!(children, "<ac:{key}>{value}</ac:{key}>").unwrap();
            }
            None => {}
        }
    }

    out.push_str(&opening);
    out.push('>');
    out.push_str(&children);
    out.push_str("</ac:structured-macro>");
}
