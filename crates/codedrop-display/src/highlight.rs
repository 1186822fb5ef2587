//! Lightweight syntax highlighting.
//!
//! A single regex per comment style splits source into comments, strings,
//! numbers and words; words are then checked against the language's keyword
//! list. Good enough for a readable view, not a parser.

use once_cell::sync::Lazy;
use regex::Regex;

/// Kind of a highlighted token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Language keyword.
    Keyword,
    /// String literal.
    String,
    /// Comment.
    Comment,
    /// Numeric literal.
    Number,
    /// Anything else.
    Plain,
}

impl TokenKind {
    /// CSS class for the token, if it is styled.
    #[must_use]
    pub const fn css_class(self) -> Option<&'static str> {
        match self {
            Self::Keyword => Some("tok-keyword"),
            Self::String => Some("tok-string"),
            Self::Comment => Some("tok-comment"),
            Self::Number => Some("tok-number"),
            Self::Plain => None,
        }
    }
}

/// A run of source text with one kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    /// Token kind.
    pub kind: TokenKind,
    /// Source text, possibly spanning lines.
    pub text: &'a str,
}

/// Languages the highlighter knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    /// JavaScript.
    JavaScript,
    /// JSX.
    Jsx,
    /// TypeScript.
    TypeScript,
    /// Python.
    Python,
    /// Rust.
    Rust,
    /// Java.
    Java,
    /// Go.
    Go,
    /// C.
    C,
    /// C++.
    Cpp,
    /// C#.
    CSharp,
    /// Ruby.
    Ruby,
    /// PHP.
    Php,
    /// Shell.
    Bash,
    /// SQL.
    Sql,
    /// HTML.
    Html,
    /// CSS.
    Css,
    /// JSON.
    Json,
    /// YAML.
    Yaml,
}

#[derive(Clone, Copy)]
enum CommentStyle {
    CLike,
    Hash,
    Sql,
    Markup,
}

const STRINGS: &str = r#""(?:\\.|[^"\\])*"|'(?:\\.|[^'\\])*'|`(?:\\.|[^`\\])*`"#;
const REST: &str = r"(?P<number>\b\d+(?:\.\d+)?\b)|(?P<word>[A-Za-z_][A-Za-z0-9_]*)";

fn lexer(comment: &str, strings: &str) -> Option<Regex> {
    Regex::new(&format!(
        r"(?P<comment>{comment})|(?P<string>{strings})|{REST}"
    ))
    .ok()
}

static CLIKE: Lazy<Option<Regex>> = Lazy::new(|| lexer(r"//[^\n]*|/\*[\s\S]*?\*/", STRINGS));
static HASH: Lazy<Option<Regex>> = Lazy::new(|| {
    lexer(
        r"#[^\n]*",
        &format!(r#""""[\s\S]*?"""|'''[\s\S]*?'''|{STRINGS}"#),
    )
});
static SQL: Lazy<Option<Regex>> = Lazy::new(|| lexer(r"--[^\n]*|/\*[\s\S]*?\*/", STRINGS));
static MARKUP: Lazy<Option<Regex>> = Lazy::new(|| lexer(r"<!--[\s\S]*?-->", STRINGS));

const JS_KEYWORDS: &[&str] = &[
    "async", "await", "break", "case", "catch", "class", "const", "continue", "default",
    "delete", "do", "else", "export", "extends", "false", "finally", "for", "from", "function",
    "if", "import", "in", "instanceof", "let", "new", "null", "return", "static", "super",
    "switch", "this", "throw", "true", "try", "typeof", "undefined", "var", "void", "while",
    "yield",
];
const TS_EXTRA: &[&str] = &[
    "any", "boolean", "enum", "implements", "interface", "keyof", "number", "private",
    "protected", "public", "readonly", "string", "type",
];
const PYTHON_KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];
const RUST_KEYWORDS: &[&str] = &[
    "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum",
    "extern", "false", "fn", "for", "if", "impl", "in", "let", "loop", "match", "mod", "move",
    "mut", "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true",
    "type", "unsafe", "use", "where", "while",
];
const JAVA_KEYWORDS: &[&str] = &[
    "abstract", "boolean", "break", "case", "catch", "char", "class", "continue", "default",
    "do", "double", "else", "enum", "extends", "false", "final", "finally", "float", "for",
    "if", "implements", "import", "instanceof", "int", "interface", "long", "new", "null",
    "package", "private", "protected", "public", "return", "static", "super", "switch", "this",
    "throw", "throws", "true", "try", "void", "while",
];
const GO_KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "false", "for",
    "func", "go", "goto", "if", "import", "interface", "map", "nil", "package", "range",
    "return", "select", "struct", "switch", "true", "type", "var",
];
const C_KEYWORDS: &[&str] = &[
    "auto", "break", "case", "char", "const", "continue", "default", "do", "double", "else",
    "enum", "extern", "float", "for", "goto", "if", "int", "long", "return", "short", "signed",
    "sizeof", "static", "struct", "switch", "typedef", "union", "unsigned", "void", "while",
];
const CPP_EXTRA: &[&str] = &[
    "bool", "class", "delete", "false", "namespace", "new", "nullptr", "private", "protected",
    "public", "template", "this", "true", "using", "virtual",
];
const CSHARP_KEYWORDS: &[&str] = &[
    "abstract", "async", "await", "bool", "break", "case", "catch", "class", "const", "else",
    "false", "for", "foreach", "if", "in", "int", "interface", "namespace", "new", "null",
    "private", "protected", "public", "return", "static", "string", "this", "true", "try",
    "using", "var", "void", "while",
];
const RUBY_KEYWORDS: &[&str] = &[
    "begin", "class", "def", "do", "else", "elsif", "end", "ensure", "false", "for", "if",
    "module", "nil", "require", "rescue", "return", "self", "true", "unless", "until", "when",
    "while", "yield",
];
const PHP_KEYWORDS: &[&str] = &[
    "array", "class", "echo", "else", "foreach", "function", "if", "new", "null", "public",
    "private", "return", "static", "use", "while",
];
const BASH_KEYWORDS: &[&str] = &[
    "case", "do", "done", "echo", "elif", "else", "esac", "exit", "export", "fi", "for",
    "function", "if", "in", "local", "return", "then", "while",
];
const SQL_KEYWORDS: &[&str] = &[
    "AND", "AS", "BY", "CREATE", "DELETE", "FROM", "GROUP", "INSERT", "INTO", "JOIN", "LEFT",
    "LIMIT", "NOT", "NULL", "ON", "OR", "ORDER", "SELECT", "SET", "TABLE", "UPDATE", "VALUES",
    "WHERE",
];
const JSON_KEYWORDS: &[&str] = &["false", "null", "true"];
const CSS_KEYWORDS: &[&str] = &["important", "inherit", "initial", "none", "auto"];

impl Language {
    /// Resolves a language hint such as `js`, `Python` or `c++`.
    ///
    /// # Examples
    ///
    /// ```
    /// use codedrop_display::Language;
    ///
    /// assert_eq!(Language::from_hint("ts"), Some(Language::TypeScript));
    /// assert_eq!(Language::from_hint("brainfuck"), None);
    /// ```
    #[must_use]
    pub fn from_hint(hint: &str) -> Option<Self> {
        let language = match hint.trim().to_ascii_lowercase().as_str() {
            "javascript" | "js" | "mjs" | "cjs" | "node" => Self::JavaScript,
            "jsx" => Self::Jsx,
            "typescript" | "ts" | "tsx" => Self::TypeScript,
            "python" | "py" | "python3" => Self::Python,
            "rust" | "rs" => Self::Rust,
            "java" => Self::Java,
            "go" | "golang" => Self::Go,
            "c" | "h" => Self::C,
            "cpp" | "c++" | "cc" | "cxx" | "hpp" => Self::Cpp,
            "csharp" | "c#" | "cs" => Self::CSharp,
            "ruby" | "rb" => Self::Ruby,
            "php" => Self::Php,
            "bash" | "sh" | "shell" | "zsh" => Self::Bash,
            "sql" => Self::Sql,
            "html" | "htm" | "xml" | "markup" => Self::Html,
            "css" => Self::Css,
            "json" => Self::Json,
            "yaml" | "yml" => Self::Yaml,
            _ => return None,
        };
        Some(language)
    }

    /// Picks the language for `content` given an optional hint.
    ///
    /// An absent or unknown hint falls back to [`detect_language`], then to
    /// JavaScript.
    ///
    /// [`detect_language`]: crate::detect_language
    #[must_use]
    pub fn resolve(hint: Option<&str>, content: &str) -> Self {
        hint.and_then(Self::from_hint)
            .or_else(|| Self::from_hint(crate::detect_language(content)))
            .unwrap_or(Self::JavaScript)
    }

    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::JavaScript => "javascript",
            Self::Jsx => "jsx",
            Self::TypeScript => "typescript",
            Self::Python => "python",
            Self::Rust => "rust",
            Self::Java => "java",
            Self::Go => "go",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Ruby => "ruby",
            Self::Php => "php",
            Self::Bash => "bash",
            Self::Sql => "sql",
            Self::Html => "html",
            Self::Css => "css",
            Self::Json => "json",
            Self::Yaml => "yaml",
        }
    }

    const fn comment_style(self) -> CommentStyle {
        match self {
            Self::Python | Self::Ruby | Self::Bash | Self::Yaml => CommentStyle::Hash,
            Self::Sql => CommentStyle::Sql,
            Self::Html => CommentStyle::Markup,
            _ => CommentStyle::CLike,
        }
    }

    fn is_keyword(self, word: &str) -> bool {
        let lists: &[&[&str]] = match self {
            Self::JavaScript | Self::Jsx => &[JS_KEYWORDS],
            Self::TypeScript => &[JS_KEYWORDS, TS_EXTRA],
            Self::Python => &[PYTHON_KEYWORDS],
            Self::Rust => &[RUST_KEYWORDS],
            Self::Java => &[JAVA_KEYWORDS],
            Self::Go => &[GO_KEYWORDS],
            Self::C => &[C_KEYWORDS],
            Self::Cpp => &[C_KEYWORDS, CPP_EXTRA],
            Self::CSharp => &[CSHARP_KEYWORDS],
            Self::Ruby => &[RUBY_KEYWORDS],
            Self::Php => &[PHP_KEYWORDS],
            Self::Bash => &[BASH_KEYWORDS],
            Self::Sql => {
                let upper = word.to_ascii_uppercase();
                return SQL_KEYWORDS.contains(&upper.as_str());
            }
            Self::Json | Self::Yaml => &[JSON_KEYWORDS],
            Self::Css => &[CSS_KEYWORDS],
            Self::Html => &[],
        };
        lists.iter().any(|list| list.contains(&word))
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Splits `source` into tokens. Concatenating the token texts yields `source`.
#[must_use]
pub fn highlight(source: &str, language: Language) -> Vec<Token<'_>> {
    let lexer = match language.comment_style() {
        CommentStyle::CLike => &*CLIKE,
        CommentStyle::Hash => &*HASH,
        CommentStyle::Sql => &*SQL,
        CommentStyle::Markup => &*MARKUP,
    };
    let Some(lexer) = lexer else {
        return vec![Token {
            kind: TokenKind::Plain,
            text: source,
        }];
    };

    let mut tokens = Vec::new();
    let mut last = 0;
    for caps in lexer.captures_iter(source) {
        let (kind, matched) = if let Some(m) = caps.name("comment") {
            (TokenKind::Comment, m)
        } else if let Some(m) = caps.name("string") {
            (TokenKind::String, m)
        } else if let Some(m) = caps.name("number") {
            (TokenKind::Number, m)
        } else if let Some(m) = caps.name("word") {
            let kind = if language.is_keyword(m.as_str()) {
                TokenKind::Keyword
            } else {
                TokenKind::Plain
            };
            (kind, m)
        } else {
            continue;
        };

        if matched.start() > last {
            tokens.push(Token {
                kind: TokenKind::Plain,
                text: &source[last..matched.start()],
            });
        }
        tokens.push(Token {
            kind,
            text: matched.as_str(),
        });
        last = matched.end();
    }
    if last < source.len() {
        tokens.push(Token {
            kind: TokenKind::Plain,
            text: &source[last..],
        });
    }
    tokens
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn kinds<'a>(tokens: &[Token<'a>], kind: TokenKind) -> Vec<&'a str> {
        tokens
            .iter()
            .filter(|t| t.kind == kind)
            .map(|t| t.text)
            .collect()
    }

    #[test]
    fn test_tokens_cover_source() {
        let source = "let x = \"hi\"; // done\nreturn 42;";
        let tokens = highlight(source, Language::JavaScript);
        let joined: String = tokens.iter().map(|t| t.text).collect();
        assert_eq!(joined, source);
    }

    #[test]
    fn test_javascript_tokens() {
        let tokens = highlight("const n = 42; // answer\nlet s = 'x';", Language::JavaScript);
        assert_eq!(kinds(&tokens, TokenKind::Keyword), vec!["const", "let"]);
        assert_eq!(kinds(&tokens, TokenKind::Number), vec!["42"]);
        assert_eq!(kinds(&tokens, TokenKind::Comment), vec!["// answer"]);
        assert_eq!(kinds(&tokens, TokenKind::String), vec!["'x'"]);
    }

    #[test]
    fn test_python_hash_comments_and_docstrings() {
        let source = "def f():\n    \"\"\"doc\nstring\"\"\"\n    return None  # nothing";
        let tokens = highlight(source, Language::Python);
        assert_eq!(kinds(&tokens, TokenKind::Keyword), vec!["def", "return", "None"]);
        assert_eq!(kinds(&tokens, TokenKind::String), vec!["\"\"\"doc\nstring\"\"\""]);
        assert_eq!(kinds(&tokens, TokenKind::Comment), vec!["# nothing"]);
    }

    #[test]
    fn test_keywords_inside_strings_are_not_highlighted() {
        let tokens = highlight("\"fn let\"", Language::Rust);
        assert!(kinds(&tokens, TokenKind::Keyword).is_empty());
    }

    #[test]
    fn test_sql_keywords_are_case_insensitive() {
        let tokens = highlight("select * from users -- all", Language::Sql);
        assert_eq!(kinds(&tokens, TokenKind::Keyword), vec!["select", "from"]);
        assert_eq!(kinds(&tokens, TokenKind::Comment), vec!["-- all"]);
    }

    #[test]
    fn test_identifier_digits_are_not_numbers() {
        let tokens = highlight("let x1 = 2;", Language::JavaScript);
        assert_eq!(kinds(&tokens, TokenKind::Number), vec!["2"]);
    }

    #[test]
    fn test_hint_aliases() {
        assert_eq!(Language::from_hint("JS"), Some(Language::JavaScript));
        assert_eq!(Language::from_hint("py"), Some(Language::Python));
        assert_eq!(Language::from_hint("rs"), Some(Language::Rust));
        assert_eq!(Language::from_hint("c++"), Some(Language::Cpp));
        assert_eq!(Language::from_hint(""), None);
    }

    #[test]
    fn test_resolve_fallbacks() {
        assert_eq!(Language::resolve(Some("rust"), "anything"), Language::Rust);
        assert_eq!(
            Language::resolve(Some("klingon"), "def f():\n  pass"),
            Language::Python
        );
        assert_eq!(Language::resolve(None, "<div></div>"), Language::Html);
        assert_eq!(Language::resolve(None, "plain words"), Language::JavaScript);
    }
}
