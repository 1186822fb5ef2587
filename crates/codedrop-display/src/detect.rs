//! Content-based language guess.

/// Guesses a language from snippet content.
///
/// The checks are cheap substring tests applied in a fixed order; the first
/// match wins. Returns an empty string when nothing matches.
///
/// # Examples
///
/// ```
/// use codedrop_display::detect_language;
///
/// assert_eq!(detect_language("def main():\n    pass"), "python");
/// assert_eq!(detect_language("just words"), "");
/// ```
#[must_use]
pub fn detect_language(content: &str) -> &'static str {
    let has = |needle: &str| content.contains(needle);

    if has("function") || has("const") || has("let") || has("var") {
        "javascript"
    } else if has("import") && has("from") && has("react") {
        "jsx"
    } else if has("class") && has("public") && has("{") {
        "java"
    } else if has("def ") && has(":") {
        "python"
    } else if has("<div") || has("<span") || has("</") {
        "html"
    } else if has("{") && has(":") && has(";") {
        "css"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_javascript_wins_first() {
        assert_eq!(detect_language("const x = 1;"), "javascript");
        // "letter" contains "let" and earlier checks win.
        assert_eq!(detect_language("a letter"), "javascript");
    }

    #[test]
    fn test_jsx() {
        assert_eq!(detect_language("import React from 'react'"), "jsx");
    }

    #[test]
    fn test_java() {
        assert_eq!(detect_language("public class Main { }"), "java");
    }

    #[test]
    fn test_python() {
        assert_eq!(detect_language("def add(a, b):\n    return a + b"), "python");
    }

    #[test]
    fn test_html() {
        assert_eq!(detect_language("<div>hi</div>"), "html");
        assert_eq!(detect_language("<p>hi</p>"), "html");
    }

    #[test]
    fn test_css() {
        assert_eq!(detect_language("body { color: red; }"), "css");
    }

    #[test]
    fn test_nothing_matches() {
        assert_eq!(detect_language("hello world"), "");
        assert_eq!(detect_language(""), "");
    }
}
