use crate::error::SchemaError;
use crate::utils::{error, quote};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    pub static ref TOKEN_REGEX: Regex = Regex::new(
        r#"(0x[0-9A-Fa-f]+\b|-?\d+\b|::|[=;{}\[\]<>(),:]|"(?:[^"\\\n]|\\.)*"|\b[A-Za-z_][A-Za-z0-9_]*\b|//.*|\s+)"#
    )
    .unwrap();
    pub static ref WHITESPACE_RX: Regex = Regex::new(r"^(//.*|\s+)$").unwrap();
}

#[derive(Debug, PartialEq)]
pub struct Token {
    pub text:   String,
    pub line:   usize,
    pub column: usize,
}

pub fn tokenize_schema(text: &str) -> Result<Vec<Token>, SchemaError> {
    let mut tokens = Vec::new();
    let mut line = 1;
    let mut column = 1;
    let mut last_end = 0;

    for mat in TOKEN_REGEX.find_iter(text) {
        let start = mat.start();
        let part = mat.as_str();

        if start > last_end {
            let unexpected = &text[last_end..start];
            return Err(error(&format!("Syntax error: {}", quote(unexpected)), line, column));
        }

        if !WHITESPACE_RX.is_match(part) {
            tokens.push(Token {
                text: part.to_string(),
                line,
                column,
            });
        }

        let newline_count = part.matches('\n').count();
        if newline_count > 0 {
            line += newline_count;
            if let Some(last_line_part) = part.split('\n').last() {
                column = last_line_part.len() + 1;
            }
        } else {
            column += part.len();
        }

        last_end = mat.end();
    }

    if last_end != text.len() {
        let unexpected = &text[last_end..];
        return Err(error(&format!("Syntax error: {}", quote(unexpected)), line, column));
    }

    // EOF
    tokens.push(Token {
        text: "".to_string(),
        line,
        column,
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(input: &str) -> Vec<String> {
        tokenize_schema(input).unwrap().into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn test_tokenize_simple() {
        let input = "int8 x = 10;";
        let expected = vec![
            Token { text: "int8".into(), line: 1, column: 1 },
            Token { text: "x".into(),    line: 1, column: 6 },
            Token { text: "=".into(),    line: 1, column: 8 },
            Token { text: "10".into(),   line: 1, column: 10 },
            Token { text: ";".into(),    line: 1, column: 12 },
            Token { text: "".into(),     line: 1, column: 13 },
        ];
        assert_eq!(tokenize_schema(input).unwrap(), expected);
    }

    #[test]
    fn test_tokenize_paths_and_templates() {
        assert_eq!(
            texts("::geo::Point[len] array32<varint32>"),
            vec!["::", "geo", "::", "Point", "[", "len", "]", "array32", "<", "varint32", ">", ""]
        );
    }

    #[test]
    fn test_tokenize_literals() {
        assert_eq!(
            texts(r#"x = 0x7F; s = "a \"b\""; n = -3;"#),
            vec!["x", "=", "0x7F", ";", "s", "=", r#""a \"b\"""#, ";", "n", "=", "-3", ";", ""]
        );
    }

    #[test]
    fn test_tokenize_skips_comments_and_tracks_lines() {
        let tokens = tokenize_schema("// header\n  case 1:\n").unwrap();
        assert_eq!(tokens[0], Token { text: "case".into(), line: 2, column: 3 });
        assert_eq!(tokens[1].text, "1");
        assert_eq!(tokens[2].text, ":");
        assert_eq!(tokens.last().map(|t| t.line), Some(3));
    }

    #[test]
    fn test_tokenize_unexpected_text() {
        let err = tokenize_schema("int8 x = 10 @").unwrap_err();
        assert!(
            matches!(err, SchemaError::ParseError { line: 1, column: 13, .. }),
            "expected a ParseError but got {:?}",
            err
        );
    }
}
