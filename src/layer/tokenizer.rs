use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{Result, SchemaGenError};

lazy_static! {
    static ref TOKEN_REGEX: Regex = Regex::new(concat!(
        r#"(?s:"""(?:\\.|[^\\])*?""")"#,
        r#"|(?s:'''(?:\\.|[^\\])*?''')"#,
        r#"|"(?:\\.|[^"\\\n])*""#,
        r#"|'(?:\\.|[^'\\\n])*'"#,
        r"|@[^@\n]*@",
        r"|<[^>\n]*>",
        r"|-?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?",
        r"|-?[A-Za-z_][A-Za-z0-9_]*(?:[:.][A-Za-z_][A-Za-z0-9_]*)*",
        r"|[=(){}\[\],;:]",
        r"|#[^\n]*",
        r"|\s+",
    ))
    .unwrap();
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Quoted string, already unescaped.
    String(String),
    Asset(String),
    Path(String),
    Number,
    Identifier,
    Punct(char),
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text of the token.
    pub text: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }

    pub fn is_identifier(&self, word: &str) -> bool {
        self.kind == TokenKind::Identifier && self.text == word
    }
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn classify(part: &str) -> TokenKind {
    let first = part.chars().next().unwrap_or_default();
    match first {
        '"' | '\'' => {
            let quote_len = if part.len() >= 6 && (part.starts_with("\"\"\"") || part.starts_with("'''")) {
                3
            } else {
                1
            };
            TokenKind::String(unescape(&part[quote_len..part.len() - quote_len]))
        }
        '@' => TokenKind::Asset(part[1..part.len() - 1].to_string()),
        '<' => TokenKind::Path(part[1..part.len() - 1].to_string()),
        '=' | '(' | ')' | '{' | '}' | '[' | ']' | ',' | ';' | ':' => TokenKind::Punct(first),
        c if c.is_ascii_digit() || c == '.' => TokenKind::Number,
        '-' if part[1..].starts_with(|c: char| c.is_ascii_digit() || c == '.') => TokenKind::Number,
        _ => TokenKind::Identifier,
    }
}

/// Split layer text into tokens, dropping whitespace and `#` comments.
///
/// The returned list always ends with an `Eof` token.
pub fn tokenize(text: &str, file: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut column = 1;
    let mut last_end = 0;

    let syntax_error = |unexpected: &str, line, column| SchemaGenError::Parse {
        file: file.to_string(),
        line,
        column,
        message: format!("unexpected text {:?}", unexpected.chars().take(20).collect::<String>()),
    };

    for mat in TOKEN_REGEX.find_iter(text) {
        let part = mat.as_str();
        if mat.start() > last_end {
            return Err(syntax_error(&text[last_end..mat.start()], line, column));
        }

        let skip = part.starts_with('#') || part.trim().is_empty();
        if !skip {
            tokens.push(Token {
                kind: classify(part),
                text: part.to_string(),
                line,
                column,
            });
        }

        let newline_count = part.matches('\n').count();
        if newline_count > 0 {
            line += newline_count;
            if let Some(last_line_part) = part.rsplit('\n').next() {
                column = last_line_part.chars().count() + 1;
            }
        } else {
            column += part.chars().count();
        }
        last_end = mat.end();
    }

    if last_end != text.len() {
        return Err(syntax_error(&text[last_end..], line, column));
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        text: String::new(),
        line,
        column,
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        tokenize(text, "test").unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokenize_prim_header() {
        let tokens = tokenize("class Foo \"Foo\" (\n    inherits = </Typed>\n)", "test").unwrap();
        assert_eq!(tokens[0].text, "class");
        assert_eq!(tokens[2].kind, TokenKind::String("Foo".into()));
        assert_eq!(tokens[3].kind, TokenKind::Punct('('));
        assert_eq!(tokens[4].line, 2);
        assert_eq!(tokens[4].column, 5);
        assert_eq!(tokens[6].kind, TokenKind::Path("/Typed".into()));
        assert_eq!(tokens.last().unwrap().kind, TokenKind::Eof);
    }

    #[test]
    fn test_tokenize_strings() {
        assert_eq!(
            kinds(r#""a\"b" 'c' """multi"line""""#)[..3],
            [
                TokenKind::String("a\"b".into()),
                TokenKind::String("c".into()),
                TokenKind::String("multi\"line".into()),
            ]
        );
        assert_eq!(kinds("\"\"")[0], TokenKind::String(String::new()));
    }

    #[test]
    fn test_tokenize_numbers_and_names() {
        let tokens = tokenize("float3[] xformOp:translate = (0, -1.5, 1e3)", "test").unwrap();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(
            texts,
            ["float3", "[", "]", "xformOp:translate", "=", "(", "0", ",", "-1.5", ",", "1e3", ")", ""]
        );
        assert_eq!(tokens[8].kind, TokenKind::Number);
        assert_eq!(tokens[3].kind, TokenKind::Identifier);
    }

    #[test]
    fn test_comments_and_header_skipped() {
        let tokens = tokenize("#usda 1.0\n# comment\n@./a.usda@", "test").unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Asset("./a.usda".into()));
        assert_eq!(tokens[0].line, 3);
    }

    #[test]
    fn test_tokenize_unexpected_text() {
        let err = tokenize("def \"a\" $", "bad.usda").unwrap_err();
        match err {
            SchemaGenError::Parse { file, line, column, .. } => {
                assert_eq!(file, "bad.usda");
                assert_eq!((line, column), (1, 9));
            }
            other => panic!("expected a parse error, got {other:?}"),
        }
    }
}
