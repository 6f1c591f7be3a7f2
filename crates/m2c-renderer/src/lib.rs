//! Markdown to Confluence storage format renderer.
//!
//! Renders a [`pulldown_cmark`] event stream into the XHTML-based storage
//! format Confluence uses internally (`<ac:structured-macro>` and friends).
//!
//! Fenced code blocks get special treatment:
//! - ordinary blocks become a `code` macro with the language tag resolved
//!   through the [`m2c_languages`] alias table;
//! - blocks fenced with the reserved tag `CONFLUENCE-MACRO` are parsed as
//!   declarative macro descriptions and emitted as arbitrary structured
//!   macros (see [`FencedCodeRenderer`]).
//!
//! # Example
//!
//! ```
//! use m2c_renderer::markdown_to_storage_format;
//!
//! let xml = markdown_to_storage_format("```py\nx = 1\n```");
//! assert!(xml.contains(r#"<ac:parameter ac:name="language">python</ac:parameter>"#));
//! ```

mod fenced;
mod renderer;
mod util;

use pulldown_cmark::{Options, Parser};

pub use fenced::{FenceMode, FencedCodeRenderer, MACRO_LANGUAGE_TAG};
pub use renderer::ConfluenceRenderer;
pub use util::escape_xml;

/// Parser options used by [`markdown_to_storage_format`].
#[must_use]
pub fn parser_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_GFM
}

/// Render a markdown document to Confluence storage format using the
/// bundled language alias table and GFM parser options.
#[must_use]
pub fn markdown_to_storage_format(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, parser_options());
    ConfluenceRenderer::new().render(parser)
}
