//! Hand-written Cypher scanner (spec §4.1).
//!
//! A [`Scanner`] is bound to one input string for its whole lifetime; the
//! only valid sequence is create → bind input → repeatedly call
//! [`Scanner::next_token`] → drop. Error state is sticky: once
//! [`Scanner::error`] is `Some`, further calls to `next_token` keep
//! returning `Eof` tokens rather than resuming (spec §4.1's "subsequent
//! calls return EOF").
//!
//! Grounded on `examples/original_source/src/backend/parser/cypher_scanner_api.c`
//! for the lifecycle contract and `tests/test_scanner.c` for literal-lexing
//! edge cases (hex integers, scientific-notation floats, `\uXXXX` escapes,
//! preserved-literal invalid escapes).

pub mod token;

use crate::error::{GraphQLiteError, Location};
use token::{lookup_keyword, Operator, Token, TokenKind};

pub struct Scanner {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
    error: Option<GraphQLiteError>,
}

impl Scanner {
    pub fn new(input: &str) -> Self {
        Scanner {
            chars: input.chars().collect(),
            pos: 0,
            line: 1,
            column: 1,
            error: None,
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn error(&self) -> Option<&GraphQLiteError> {
        self.error.as_ref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    fn loc(&self) -> Location {
        Location::new(self.line, self.column)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    /// Produce the next token. After a sticky scanner error, always
    /// returns `Eof`.
    pub fn next_token(&mut self) -> Token {
        if self.error.is_some() {
            return self.eof_token();
        }

        self.skip_trivia();

        let start_line = self.line;
        let start_col = self.column;
        let start_pos = self.pos;

        let Some(c) = self.peek() else {
            return self.eof_token();
        };

        let kind = if c.is_ascii_digit() {
            self.scan_number()
        } else if c == '"' || c == '\'' {
            self.scan_string(c)
        } else if c == '`' {
            self.scan_backquoted()
        } else if c == '$' {
            self.advance();
            let name = self.scan_ident_text();
            TokenKind::Parameter(name)
        } else if is_ident_start(c) {
            let text = self.scan_ident_text();
            if let Some(kw) = lookup_keyword(&text) {
                TokenKind::Keyword(kw)
            } else {
                TokenKind::Identifier(text)
            }
        } else {
            self.scan_operator_or_char()
        };

        match kind {
            Ok(kind) => {
                let text: String = self.chars[start_pos..self.pos].iter().collect();
                Token {
                    kind,
                    line: start_line,
                    column: start_col,
                    text,
                }
            }
            Err(e) => {
                self.error = Some(e);
                self.eof_token()
            }
        }
    }

    fn eof_token(&self) -> Token {
        Token {
            kind: TokenKind::Eof,
            line: self.line,
            column: self.column,
            text: String::new(),
        }
    }

    fn scan_ident_text(&mut self) -> String {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if is_ident_continue(c) {
                self.advance();
            } else {
                break;
            }
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn scan_backquoted(&mut self) -> Result<TokenKind, GraphQLiteError> {
        self.advance(); // opening `
        let start = self.pos;
        loop {
            match self.peek() {
                None => {
                    return Err(GraphQLiteError::scanner(
                        self.loc(),
                        "unterminated backquoted identifier",
                    ))
                }
                Some('`') => break,
                Some(_) => {
                    self.advance();
                }
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        self.advance(); // closing `
        Ok(TokenKind::BackquotedIdent(text))
    }

    /// Integer (decimal or `0x…` hex) or decimal (including scientific
    /// notation) literal. The `0x`/exponent recognition is delegated to
    /// small `nom` combinators — the one place this scanner reaches for the
    /// parser-combinator crate the rest of the front end avoids, since
    /// matching an optional exponent tail is exactly what `nom` is good at.
    fn scan_number(&mut self) -> Result<TokenKind, GraphQLiteError> {
        use nom::bytes::complete::{tag_no_case, take_while1};
        use nom::character::complete::one_of;
        use nom::combinator::{opt, recognize};
        use nom::sequence::{pair, preceded};
        use nom::Parser;

        let start = self.pos;

        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x') | Some('X')) {
            self.advance();
            self.advance();
            let hex_start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) {
                self.advance();
            }
            if self.pos == hex_start {
                return Err(GraphQLiteError::scanner(self.loc(), "bad hex literal"));
            }
            let text: String = self.chars[hex_start..self.pos].iter().collect();
            let value = i64::from_str_radix(&text, 16)
                .map_err(|_| GraphQLiteError::scanner(self.loc(), "integer literal overflow"))?;
            return Ok(TokenKind::Integer(value));
        }

        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }

        let mut is_decimal = false;
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_decimal = true;
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }

        // Scientific-notation exponent, recognized via nom on the remaining
        // slice so overlapping lookahead (e/E, optional sign, digits) stays
        // declarative instead of another hand-rolled state machine.
        let rest: String = self.chars[self.pos..].iter().collect();
        let exp_parser = recognize(preceded(
            tag_no_case("e"),
            pair(opt(one_of("+-")), take_while1(|c: char| c.is_ascii_digit())),
        ));
        if let Ok((_, matched)) = exp_parser.parse(rest.as_str()) {
            is_decimal = true;
            for _ in 0..matched.chars().count() {
                self.advance();
            }
        }

        let text: String = self.chars[start..self.pos].iter().collect();
        if is_decimal {
            let value = text
                .parse::<f64>()
                .map_err(|_| GraphQLiteError::scanner(self.loc(), "bad decimal literal"))?;
            Ok(TokenKind::Decimal(value))
        } else {
            let value = text
                .parse::<i64>()
                .map_err(|_| GraphQLiteError::scanner(self.loc(), "integer literal overflow"))?;
            Ok(TokenKind::Integer(value))
        }
    }

    fn scan_string(&mut self, quote: char) -> Result<TokenKind, GraphQLiteError> {
        self.advance(); // opening quote
        let mut out = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(GraphQLiteError::scanner(self.loc(), "unterminated string"))
                }
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    self.scan_escape(&mut out)?;
                }
                Some(c) => {
                    out.push(c);
                    self.advance();
                }
            }
        }
        Ok(TokenKind::String(out))
    }

    /// `\n \r \t \b \f \\ \" \' \uXXXX`; any other escape is preserved
    /// literally (backslash + char), per spec §4.1.
    fn scan_escape(&mut self, out: &mut String) -> Result<(), GraphQLiteError> {
        let Some(c) = self.peek() else {
            return Err(GraphQLiteError::scanner(self.loc(), "unterminated escape"));
        };
        match c {
            'n' => {
                out.push('\n');
                self.advance();
            }
            'r' => {
                out.push('\r');
                self.advance();
            }
            't' => {
                out.push('\t');
                self.advance();
            }
            'b' => {
                out.push('\u{8}');
                self.advance();
            }
            'f' => {
                out.push('\u{c}');
                self.advance();
            }
            '\\' => {
                out.push('\\');
                self.advance();
            }
            '"' => {
                out.push('"');
                self.advance();
            }
            '\'' => {
                out.push('\'');
                self.advance();
            }
            'u' => {
                self.advance();
                let start = self.pos;
                for _ in 0..4 {
                    if !matches!(self.peek(), Some(h) if h.is_ascii_hexdigit()) {
                        return Err(GraphQLiteError::scanner(self.loc(), "bad \\u escape"));
                    }
                    self.advance();
                }
                let hex: String = self.chars[start..self.pos].iter().collect();
                let code = u32::from_str_radix(&hex, 16)
                    .map_err(|_| GraphQLiteError::scanner(self.loc(), "bad \\u escape"))?;
                match char::from_u32(code) {
                    Some(ch) => out.push(ch),
                    None => out.push('\u{FFFD}'),
                }
            }
            other => {
                // Invalid escape: preserved literally, documented in spec §4.1.
                out.push('\\');
                out.push(other);
                self.advance();
            }
        }
        Ok(())
    }

    fn scan_operator_or_char(&mut self) -> Result<TokenKind, GraphQLiteError> {
        let c = self.advance().expect("checked by caller");
        let kind = match c {
            '<' => match self.peek() {
                Some('>') => {
                    self.advance();
                    TokenKind::Operator(Operator::NotEq)
                }
                Some('=') => {
                    self.advance();
                    TokenKind::Operator(Operator::LtEq)
                }
                _ => TokenKind::Char('<'),
            },
            '>' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Operator(Operator::GtEq)
                } else {
                    TokenKind::Char('>')
                }
            }
            '!' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Operator(Operator::NotEq)
                } else {
                    TokenKind::Char('!')
                }
            }
            '.' => {
                if self.peek() == Some('.') {
                    self.advance();
                    TokenKind::Operator(Operator::DotDot)
                } else {
                    TokenKind::Char('.')
                }
            }
            ':' => {
                if self.peek() == Some(':') {
                    self.advance();
                    TokenKind::Operator(Operator::TypeCast)
                } else {
                    TokenKind::Char(':')
                }
            }
            '+' => {
                if self.peek() == Some('=') {
                    self.advance();
                    TokenKind::Operator(Operator::PlusEq)
                } else {
                    TokenKind::Char('+')
                }
            }
            '=' => {
                if self.peek() == Some('~') {
                    self.advance();
                    TokenKind::Operator(Operator::RegexEq)
                } else {
                    TokenKind::Char('=')
                }
            }
            '(' | ')' | '[' | ']' | '{' | '}' | ',' | '-' | '*' | '/' | '%' | '|' | ';' => {
                TokenKind::Char(c)
            }
            other => {
                return Err(GraphQLiteError::scanner(
                    self.loc(),
                    format!("unknown character '{other}'"),
                ))
            }
        };
        Ok(kind)
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        let mut s = Scanner::new(input);
        let mut out = Vec::new();
        loop {
            let t = s.next_token();
            if t.is_eof() {
                break;
            }
            out.push(t.kind);
        }
        out
    }

    #[test]
    fn integers_decimal_and_hex() {
        assert_eq!(kinds("123"), vec![TokenKind::Integer(123)]);
        assert_eq!(kinds("0x1F"), vec![TokenKind::Integer(31)]);
        assert_eq!(kinds("0xabc"), vec![TokenKind::Integer(0xabc)]);
        assert_eq!(kinds("0"), vec![TokenKind::Integer(0)]);
    }

    #[test]
    fn decimals_plain_and_scientific() {
        assert_eq!(kinds("123.45"), vec![TokenKind::Decimal(123.45)]);
        let v = match &kinds("1.23e-4")[0] {
            TokenKind::Decimal(f) => *f,
            _ => panic!("expected decimal"),
        };
        assert!((v - 0.000123).abs() < 1e-9);
        let v2 = match &kinds("1.5e+3")[0] {
            TokenKind::Decimal(f) => *f,
            _ => panic!("expected decimal"),
        };
        assert!((v2 - 1500.0).abs() < 1e-9);
    }

    #[test]
    fn strings_and_escapes() {
        assert_eq!(
            kinds("\"hello world\""),
            vec![TokenKind::String("hello world".to_string())]
        );
        assert_eq!(
            kinds("'hello world'"),
            vec![TokenKind::String("hello world".to_string())]
        );
        assert_eq!(kinds("\"\""), vec![TokenKind::String(String::new())]);
        assert_eq!(
            kinds("\"hello\\nworld\""),
            vec![TokenKind::String("hello\nworld".to_string())]
        );
        assert_eq!(
            kinds("\"hello\\\\world\""),
            vec![TokenKind::String("hello\\world".to_string())]
        );
        assert_eq!(
            kinds("\"hello\\u0041world\""),
            vec![TokenKind::String("helloAworld".to_string())]
        );
    }

    #[test]
    fn invalid_escape_preserved_literally() {
        assert_eq!(
            kinds("\"a\\qb\""),
            vec![TokenKind::String("a\\qb".to_string())]
        );
    }

    #[test]
    fn unterminated_string_is_sticky_error() {
        let mut s = Scanner::new("\"abc");
        let t = s.next_token();
        assert!(t.is_eof());
        assert!(s.has_error());
        let t2 = s.next_token();
        assert!(t2.is_eof());
    }

    #[test]
    fn keyword_subsumes_identifier_case_insensitively() {
        assert_eq!(kinds("MATCH"), vec![TokenKind::Keyword(token::Keyword::Match)]);
        assert_eq!(kinds("match"), vec![TokenKind::Keyword(token::Keyword::Match)]);
        assert_eq!(kinds("MaTcH"), vec![TokenKind::Keyword(token::Keyword::Match)]);
        assert_eq!(
            kinds("matcher"),
            vec![TokenKind::Identifier("matcher".to_string())]
        );
    }

    #[test]
    fn multi_char_operators() {
        assert_eq!(kinds("<>"), vec![TokenKind::Operator(Operator::NotEq)]);
        assert_eq!(kinds("!="), vec![TokenKind::Operator(Operator::NotEq)]);
        assert_eq!(kinds("<="), vec![TokenKind::Operator(Operator::LtEq)]);
        assert_eq!(kinds(">="), vec![TokenKind::Operator(Operator::GtEq)]);
        assert_eq!(kinds(".."), vec![TokenKind::Operator(Operator::DotDot)]);
        assert_eq!(kinds("::"), vec![TokenKind::Operator(Operator::TypeCast)]);
        assert_eq!(kinds("+="), vec![TokenKind::Operator(Operator::PlusEq)]);
        assert_eq!(kinds("=~"), vec![TokenKind::Operator(Operator::RegexEq)]);
    }

    #[test]
    fn line_comments_skipped() {
        assert_eq!(
            kinds("RETURN 1 // comment\nRETURN 2"),
            vec![
                TokenKind::Keyword(token::Keyword::Return),
                TokenKind::Integer(1),
                TokenKind::Keyword(token::Keyword::Return),
                TokenKind::Integer(2),
            ]
        );
    }

    #[test]
    fn parameter_and_backquoted() {
        assert_eq!(kinds("$name"), vec![TokenKind::Parameter("name".to_string())]);
        assert_eq!(
            kinds("`weird name`"),
            vec![TokenKind::BackquotedIdent("weird name".to_string())]
        );
    }

    #[test]
    fn unknown_character_is_sticky_error() {
        let mut s = Scanner::new("@");
        let t = s.next_token();
        assert!(t.is_eof());
        assert!(s.has_error());
    }
}
