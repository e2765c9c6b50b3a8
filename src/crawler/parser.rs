//! HTML fragment parsing and re-rendering
//!
//! Chapter bodies are stored as HTML fragments. This module handles:
//! - Discovering image references in a fragment
//! - Re-rendering a fragment while dropping or rewriting elements
//! - Escaping text and attribute values the same way the renderer does
//!
//! The renderer is deterministic: rendering an already rendered fragment with
//! no rewrites gives back the same string. The chapter store relies on this to
//! keep its heading stamp idempotent across the image rewrite pass.

use scraper::{ElementRef, Html, Node, Selector};

/// Elements that never have children or a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source",
    "track", "wbr",
];

/// Elements the HTML parser reads as raw text; their content is emitted without escaping
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

/// Decision taken for each element while re-rendering a fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rewrite {
    /// Render the element unchanged
    Keep,
    /// Drop the element and everything inside it
    Remove,
    /// Render the element with a new attribute list
    ReplaceAttrs(Vec<(String, String)>),
}

/// Collects the `src` of every `<img>` in a fragment
///
/// Sources are returned in document order without duplicates. Images without
/// a `src` attribute are ignored.
///
/// # Example
///
/// ```
/// use novel_harvest::crawler::parser::image_sources;
///
/// let html = r#"<p>a</p><img src="x.png"><img src="x.png"><img alt="none">"#;
/// assert_eq!(image_sources(html), vec!["x.png".to_string()]);
/// ```
pub fn image_sources(html: &str) -> Vec<String> {
    let fragment = Html::parse_fragment(html);
    let mut sources: Vec<String> = Vec::new();

    if let Ok(img_selector) = Selector::parse("img[src]") {
        for element in fragment.select(&img_selector) {
            if let Some(src) = element.value().attr("src") {
                if !sources.iter().any(|s| s == src) {
                    sources.push(src.to_string());
                }
            }
        }
    }

    sources
}

/// Parses a fragment and renders it back, asking `visit` about every element
///
/// # Arguments
///
/// * `html` - The HTML fragment
/// * `visit` - Called once per element in document order; children of
///   removed elements are not visited
///
/// # Returns
///
/// The re-rendered fragment
pub fn rewrite_fragment<F>(html: &str, mut visit: F) -> String
where
    F: FnMut(&ElementRef<'_>) -> Rewrite,
{
    let fragment = Html::parse_fragment(html);
    let mut out = String::with_capacity(html.len());
    render_children(&fragment.root_element(), &mut out, &mut visit);
    out
}

/// Renders the children of an element, applying `visit` to descendants
pub fn render_inner<F>(element: &ElementRef<'_>, mut visit: F) -> String
where
    F: FnMut(&ElementRef<'_>) -> Rewrite,
{
    let mut out = String::new();
    render_children(element, &mut out, &mut visit);
    out
}

/// Escapes text content: `&`, `<` and `>`
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    push_escaped_text(text, &mut out);
    out
}

/// Escapes an attribute value for use inside double quotes: `&` and `"`
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    push_escaped_attr(value, &mut out);
    out
}

fn render_children<F>(element: &ElementRef<'_>, out: &mut String, visit: &mut F)
where
    F: FnMut(&ElementRef<'_>) -> Rewrite,
{
    let raw_text = RAW_TEXT_ELEMENTS.contains(&element.value().name());

    for child in element.children() {
        match child.value() {
            Node::Element(_) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    render_element(&child_ref, out, visit);
                }
            }
            Node::Text(text) => {
                if raw_text {
                    out.push_str(&text.text);
                } else {
                    push_escaped_text(&text.text, out);
                }
            }
            Node::Comment(comment) => {
                out.push_str("<!--");
                out.push_str(&comment.comment);
                out.push_str("-->");
            }
            _ => {}
        }
    }
}

fn render_element<F>(element: &ElementRef<'_>, out: &mut String, visit: &mut F)
where
    F: FnMut(&ElementRef<'_>) -> Rewrite,
{
    let attrs: Vec<(String, String)> = match visit(element) {
        Rewrite::Remove => return,
        Rewrite::Keep => element
            .value()
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect(),
        Rewrite::ReplaceAttrs(attrs) => attrs,
    };

    let name = element.value().name();
    out.push('<');
    out.push_str(name);
    for (attr_name, attr_value) in &attrs {
        out.push(' ');
        out.push_str(attr_name);
        out.push_str("=\"");
        push_escaped_attr(attr_value, out);
        out.push('"');
    }
    out.push('>');

    if VOID_ELEMENTS.contains(&name) {
        return;
    }

    render_children(element, out, visit);

    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn push_escaped_text(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
}

fn push_escaped_attr(value: &str, out: &mut String) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
}
