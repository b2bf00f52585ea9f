use bolt_common::diagnostics::{codes, Diagnostic};
use bolt_common::text::{TextLoc, TextRange};
use bolt_common::token::{keyword_from_str, Token, TokenKind};

use crate::cursor::Cursor;

fn is_operator_part(c: char) -> bool {
    matches!(
        c,
        '+' | '-' | '*' | '/' | '^' | '&' | '|' | '%' | '$' | '!' | '?' | '>' | '<' | '='
    )
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_part(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// The Bolt scanner. Converts source text into a stream of raw tokens.
///
/// Lexical errors are accumulated as diagnostics rather than aborting the
/// scan; the offending input is skipped and scanning resumes, so a single
/// pass reports every problem in the file.
pub struct Scanner<'src> {
    cursor: Cursor<'src>,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Scanner<'src> {
    pub fn new(source: &'src str) -> Self {
        Self {
            cursor: Cursor::new(source),
            diagnostics: Vec::new(),
        }
    }

    /// Scan the whole input, producing a token vector ending in `EndOfFile`.
    pub fn scan_all(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.read();
            let is_eof = token.kind == TokenKind::EndOfFile;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn unexpected(&mut self, loc: TextLoc, what: impl Into<String>) {
        let range = TextRange::new(loc, loc);
        self.diagnostics.push(
            Diagnostic::error(
                codes::UNEXPECTED_STRING,
                format!("unexpected {:?}", what.into()),
            )
            .with_range(range)
            .with_label(range, "could not classify this input"),
        );
    }

    /// Read the next token, skipping whitespace and comments.
    pub fn read(&mut self) -> Token {
        loop {
            self.cursor
                .eat_while(|c| c == ' ' || c == '\t' || c == '\r' || c == '\n');
            if self.cursor.peek() == Some('#') {
                self.cursor.eat_while(|c| c != '\n');
                continue;
            }
            break;
        }

        let start = self.cursor.loc();

        let Some(c0) = self.cursor.peek() else {
            return Token::new(TokenKind::EndOfFile, TextRange::new(start, start));
        };

        match c0 {
            '0'..='9' => self.read_integer(start),
            c if c.is_ascii_uppercase() => {
                let text = self.read_identifier_text();
                self.token(TokenKind::IdentifierAlt(text), start)
            }
            c if is_identifier_start(c) => {
                let text = self.read_identifier_text();
                match keyword_from_str(&text) {
                    Some(kind) => self.token(kind, start),
                    None => self.token(TokenKind::Identifier(text), start),
                }
            }
            '"' => self.read_string(start),
            '.' => {
                self.cursor.advance();
                if self.cursor.peek() == Some('.') {
                    self.cursor.advance();
                    if self.cursor.peek() == Some('.') {
                        let loc = self.cursor.loc();
                        self.cursor.advance();
                        self.unexpected(loc, ".");
                    }
                    self.token(TokenKind::DotDot, start)
                } else {
                    self.token(TokenKind::Dot, start)
                }
            }
            c if is_operator_part(c) => self.read_operator(start),
            ',' => self.simple(TokenKind::Comma, start),
            ':' => self.simple(TokenKind::Colon, start),
            '(' => self.simple(TokenKind::LParen, start),
            ')' => self.simple(TokenKind::RParen, start),
            '[' => self.simple(TokenKind::LBracket, start),
            ']' => self.simple(TokenKind::RBracket, start),
            '{' => self.simple(TokenKind::LBrace, start),
            '}' => self.simple(TokenKind::RBrace, start),
            '~' => self.simple(TokenKind::Tilde, start),
            '@' => self.simple(TokenKind::At, start),
            other => {
                self.cursor.advance();
                self.unexpected(start, other.to_string());
                // Skip the bad character and continue with whatever follows.
                self.read()
            }
        }
    }

    fn token(&self, kind: TokenKind, start: TextLoc) -> Token {
        Token::new(kind, TextRange::new(start, self.cursor.loc()))
    }

    fn simple(&mut self, kind: TokenKind, start: TextLoc) -> Token {
        self.cursor.advance();
        self.token(kind, start)
    }

    fn read_identifier_text(&mut self) -> String {
        let mut text = String::new();
        while matches!(self.cursor.peek(), Some(c) if is_identifier_part(c)) {
            text.push(self.cursor.advance().unwrap());
        }
        text
    }

    fn read_integer(&mut self, start: TextLoc) -> Token {
        let mut value: i64 = 0;
        let mut overflowed = false;
        while let Some(c @ '0'..='9') = self.cursor.peek() {
            self.cursor.advance();
            let digit = (c as u8 - b'0') as i64;
            match value.checked_mul(10).and_then(|v| v.checked_add(digit)) {
                Some(next) => value = next,
                None => overflowed = true,
            }
        }
        if overflowed {
            self.unexpected(start, "integer literal out of range");
            value = i64::MAX;
        }
        self.token(TokenKind::IntegerLiteral(value), start)
    }

    fn read_string(&mut self, start: TextLoc) -> Token {
        self.cursor.advance(); // consume opening '"'
        let mut text = String::new();
        loop {
            let loc = self.cursor.loc();
            let Some(c) = self.cursor.advance() else {
                self.unexpected(loc, "end of file in string literal");
                break;
            };
            match c {
                '"' => break,
                '\\' => {
                    let escape_loc = self.cursor.loc();
                    match self.cursor.advance() {
                        Some('a') => text.push('\x07'),
                        Some('b') => text.push('\x08'),
                        Some('f') => text.push('\x0C'),
                        Some('n') => text.push('\n'),
                        Some('r') => text.push('\r'),
                        Some('t') => text.push('\t'),
                        Some('v') => text.push('\x0B'),
                        Some('0') => text.push('\0'),
                        Some('\'') => text.push('\''),
                        Some('"') => text.push('"'),
                        Some('\\') => text.push('\\'),
                        Some(other) => self.unexpected(escape_loc, other.to_string()),
                        None => {
                            self.unexpected(escape_loc, "end of file in string literal");
                            break;
                        }
                    }
                }
                other => text.push(other),
            }
        }
        self.token(TokenKind::StringLiteral(text), start)
    }

    fn read_operator(&mut self, start: TextLoc) -> Token {
        let mut text = String::new();
        while matches!(self.cursor.peek(), Some(c) if is_operator_part(c)) {
            text.push(self.cursor.advance().unwrap());
        }
        let kind = match text.as_str() {
            "->" => TokenKind::RArrow,
            "=>" => TokenKind::RArrowAlt,
            "=" => TokenKind::Equals,
            "|" => TokenKind::VBar,
            _ => {
                let bytes = text.as_bytes();
                if bytes[bytes.len() - 1] == b'=' && bytes[bytes.len() - 2] != b'=' {
                    TokenKind::Assignment(text[..text.len() - 1].to_string())
                } else {
                    TokenKind::CustomOperator(text)
                }
            }
        };
        self.token(kind, start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        Scanner::new(source)
            .scan_all()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn empty_source_yields_eof() {
        assert_eq!(kinds(""), vec![TokenKind::EndOfFile]);
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("let mut foo Bar"),
            vec![
                TokenKind::LetKeyword,
                TokenKind::MutKeyword,
                TokenKind::Identifier("foo".into()),
                TokenKind::IdentifierAlt("Bar".into()),
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn operator_classification() {
        assert_eq!(
            kinds("-> => = == + |"),
            vec![
                TokenKind::RArrow,
                TokenKind::RArrowAlt,
                TokenKind::Equals,
                TokenKind::CustomOperator("==".into()),
                TokenKind::CustomOperator("+".into()),
                TokenKind::VBar,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn assignment_reclassification() {
        // A trailing '=' not preceded by '=' splits off as an assignment.
        assert_eq!(
            kinds("+="),
            vec![TokenKind::Assignment("+".into()), TokenKind::EndOfFile]
        );
        assert_eq!(
            kinds("<="),
            vec![TokenKind::Assignment("<".into()), TokenKind::EndOfFile]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#""a\nb\t\"c\"""#),
            vec![
                TokenKind::StringLiteral("a\nb\t\"c\"".into()),
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn invalid_escape_reports_diagnostic() {
        let mut scanner = Scanner::new(r#""\q""#);
        scanner.scan_all();
        let diags = scanner.into_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, codes::UNEXPECTED_STRING);
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            kinds("# a comment\nfoo"),
            vec![TokenKind::Identifier("foo".into()), TokenKind::EndOfFile]
        );
    }

    #[test]
    fn integer_at_i64_max_succeeds() {
        assert_eq!(
            kinds("9223372036854775807"),
            vec![
                TokenKind::IntegerLiteral(i64::MAX),
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn integer_beyond_i64_max_reports() {
        let mut scanner = Scanner::new("9223372036854775808");
        let tokens = scanner.scan_all();
        assert_eq!(tokens[0].kind, TokenKind::IntegerLiteral(i64::MAX));
        let diags = scanner.into_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, codes::UNEXPECTED_STRING);
    }

    #[test]
    fn dot_dot_dot_is_an_error() {
        let mut scanner = Scanner::new("...");
        let tokens = scanner.scan_all();
        assert_eq!(tokens[0].kind, TokenKind::DotDot);
        assert_eq!(scanner.into_diagnostics().len(), 1);
    }

    #[test]
    fn token_ranges_are_tracked() {
        let mut scanner = Scanner::new("let foo");
        let tokens = scanner.scan_all();
        assert_eq!(tokens[0].range.start, TextLoc::new(1, 1));
        assert_eq!(tokens[0].range.end, TextLoc::new(1, 4));
        assert_eq!(tokens[1].range.start, TextLoc::new(1, 5));
        assert_eq!(tokens[1].range.end, TextLoc::new(1, 8));
    }
}
