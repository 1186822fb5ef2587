//! HTML and terminal rendering of snippets.
//!
//! HTML output is safe to embed: markdown is rendered with raw HTML escaped
//! and script-capable link targets neutralised, code and plain text are
//! escaped.

use std::fmt::Write;

use chrono::Local;
use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};

use crate::format::format_timestamp;
use crate::highlight::highlight;
use crate::{DisplayKind, DisplaySnippet};

/// Link schemes that could run code when clicked.
const UNSAFE_SCHEMES: &[&str] = &["javascript:", "vbscript:", "data:"];

/// Escapes text for use in HTML content and attribute values.
///
/// # Examples
///
/// ```
/// use codedrop_display::escape_html;
///
/// assert_eq!(escape_html("<a href=\"x\">&</a>"), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
/// ```
#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn is_unsafe_url(url: &str) -> bool {
    let lowered = url.trim().to_ascii_lowercase();
    UNSAFE_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme))
}

fn neutralise(url: CowStr<'_>) -> CowStr<'_> {
    if is_unsafe_url(&url) {
        CowStr::Borrowed("#")
    } else {
        url
    }
}

/// Renders markdown to HTML with raw HTML shown as text.
#[must_use]
pub fn render_markdown(source: &str) -> String {
    let options = Options::ENABLE_TABLES | Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TASKLISTS;
    let events = Parser::new_ext(source, options).map(|event| match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Link {
            link_type,
            dest_url: neutralise(dest_url),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => Event::Start(Tag::Image {
            link_type,
            dest_url: neutralise(dest_url),
            title,
            id,
        }),
        other => other,
    });

    let mut output = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut output, events);
    output
}

/// Renders code as numbered, highlighted lines.
///
/// Tokens that span lines are closed at each line end and reopened on the
/// next line so every line is self-contained markup.
#[must_use]
pub fn render_code(source: &str, language: crate::Language) -> String {
    let mut lines: Vec<String> = vec![String::new()];
    for token in highlight(source, language) {
        let class = token.kind.css_class();
        for (i, piece) in token.text.split('\n').enumerate() {
            if i > 0 {
                lines.push(String::new());
            }
            if piece.is_empty() {
                continue;
            }
            let Some(line) = lines.last_mut() else {
                continue;
            };
            match class {
                Some(class) => {
                    let _ = write!(line, r#"<span class="{class}">{}</span>"#, escape_html(piece));
                }
                None => line.push_str(&escape_html(piece)),
            }
        }
    }
    if source.ends_with('\n') && lines.len() > 1 {
        lines.pop();
    }

    let mut output = String::new();
    let _ = write!(
        output,
        r#"<pre class="code"><code class="language-{}">"#,
        language.name()
    );
    for (number, line) in lines.iter().enumerate() {
        let _ = writeln!(
            output,
            r#"<span class="line"><span class="line-number">{}</span>{line}</span>"#,
            number + 1
        );
    }
    output.push_str("</code></pre>");
    output
}

// ============================================================================
// HtmlRenderer
// ============================================================================

/// Renders a [`DisplaySnippet`] as an HTML fragment.
pub struct HtmlRenderer<'a> {
    snippet: &'a DisplaySnippet,
}

impl<'a> HtmlRenderer<'a> {
    /// Creates a renderer for `snippet`.
    #[must_use]
    pub const fn new(snippet: &'a DisplaySnippet) -> Self {
        Self { snippet }
    }

    /// Renders the snippet with its metadata header.
    #[must_use]
    pub fn render(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(
            output,
            r#"<article class="snippet snippet-{}">"#,
            self.snippet.kind.as_str()
        );
        self.write_meta(&mut output);
        output.push_str(&self.render_body());
        output.push_str("\n</article>\n");
        output
    }

    /// Renders only the content.
    #[must_use]
    pub fn render_body(&self) -> String {
        let content = &self.snippet.content;
        match self.snippet.kind {
            DisplayKind::Markdown => {
                format!(r#"<div class="markdown">{}</div>"#, render_markdown(content))
            }
            DisplayKind::Code => {
                let language = self.snippet.resolved_language();
                format!(
                    r#"<div class="code-block" data-language="{}"><button class="copy" type="button" aria-label="Copy code">Copy</button>{}</div>"#,
                    language.name(),
                    render_code(content, language)
                )
            }
            DisplayKind::Plain => format!(r#"<pre class="plain">{}</pre>"#, escape_html(content)),
        }
    }

    fn write_meta(&self, output: &mut String) {
        let created = format_timestamp(&self.snippet.created_at.with_timezone(&Local));
        let expires = format_timestamp(&self.snippet.expires_at.with_timezone(&Local));
        let _ = writeln!(
            output,
            r#"<header class="snippet-meta"><span>Created: {}</span><span>Expires: {}</span><span>Views: {}</span></header>"#,
            escape_html(&created),
            escape_html(&expires),
            self.snippet.views
        );
    }
}

// ============================================================================
// TextRenderer
// ============================================================================

/// Renders a [`DisplaySnippet`] for a terminal.
pub struct TextRenderer<'a> {
    snippet: &'a DisplaySnippet,
}

impl<'a> TextRenderer<'a> {
    /// Creates a renderer for `snippet`.
    #[must_use]
    pub const fn new(snippet: &'a DisplaySnippet) -> Self {
        Self { snippet }
    }

    /// Renders the metadata header followed by the content.
    #[must_use]
    pub fn render(&self) -> String {
        let mut output = String::new();
        let _ = writeln!(
            output,
            "Created: {}",
            format_timestamp(&self.snippet.created_at.with_timezone(&Local))
        );
        let _ = writeln!(
            output,
            "Expires: {}",
            format_timestamp(&self.snippet.expires_at.with_timezone(&Local))
        );
        let _ = writeln!(output, "Views: {}", self.snippet.views);
        if self.snippet.kind == DisplayKind::Code {
            let _ = writeln!(output, "Language: {}", self.snippet.resolved_language());
        }
        output.push('\n');
        output.push_str(&self.render_body());
        output
    }

    /// Renders only the content. Code gets a line-number gutter.
    #[must_use]
    pub fn render_body(&self) -> String {
        let content = &self.snippet.content;
        if self.snippet.kind != DisplayKind::Code {
            let mut body = content.clone();
            if !body.ends_with('\n') {
                body.push('\n');
            }
            return body;
        }

        let lines: Vec<&str> = content.lines().collect();
        let width = lines.len().max(1).to_string().len();
        let mut output = String::new();
        for (number, line) in lines.iter().enumerate() {
            let _ = writeln!(output, "{:>width$} | {line}", number + 1);
        }
        output
    }
}
