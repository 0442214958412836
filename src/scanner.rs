// A lexeme is the raw sequence of characters in the source code that represents a meaningful unit.
// A token is a categorized representation of a lexeme, pairing it with its type.

use crate::error::Diagnostics;
use crate::token::{Literal, Token, TokenType, KEYWORDS};

pub struct Scanner<'d> {
    source: Vec<char>,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    line: i32,
    diagnostics: &'d mut Diagnostics,
}

impl<'d> Scanner<'d> {
    pub fn new(source: &str, diagnostics: &'d mut Diagnostics) -> Self {
        Self {
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            diagnostics,
        }
    }

    pub fn scan_tokens(mut self) -> Vec<Token> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token();
        }

        self.tokens.push(Token::new(TokenType::Eof, "", self.line));
        self.tokens
    }

    fn scan_token(&mut self) {
        let c = self.advance();
        match c {
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            ',' => self.add_token(TokenType::Comma),
            '.' => self.add_token(TokenType::Dot),
            '-' => self.add_token(TokenType::Minus),
            '+' => self.add_token(TokenType::Plus),
            ';' => self.add_token(TokenType::Semicolon),
            '*' => self.add_token(TokenType::Star),

            '!' => {
                let kind = if self.r#match('=') { TokenType::BangEqual } else { TokenType::Bang };
                self.add_token(kind);
            }
            '=' => {
                let kind = if self.r#match('=') { TokenType::EqualEqual } else { TokenType::Equal };
                self.add_token(kind);
            }
            '<' => {
                let kind = if self.r#match('=') { TokenType::LessEqual } else { TokenType::Less };
                self.add_token(kind);
            }
            '>' => {
                let kind = if self.r#match('=') { TokenType::GreaterEqual } else { TokenType::Greater };
                self.add_token(kind);
            }

            '/' => {
                if self.r#match('/') {
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenType::Slash);
                }
            }

            ' ' | '\t' | '\r' => (),
            '\n' => self.line += 1,

            '"' => self.string(),

            c if c.is_ascii_digit() => self.number(),
            c if is_alpha(c) => self.identifier(),

            _ => self.diagnostics.error(self.line, "Unexpected character."),
        }
    }

    fn string(&mut self) {
        let start_line = self.line;
        while self.peek() != '"' && !self.is_at_end() {
            if self.peek() == '\n' {
                self.line += 1;
            }
            self.advance();
        }

        if self.is_at_end() {
            self.diagnostics.error(start_line, "Unterminated string.");
            return;
        }

        // the closing quote
        self.advance();

        let value: String = self.source[(self.start + 1)..(self.current - 1)].iter().collect();
        let lexeme: String = self.source[self.start..self.current].iter().collect();
        self.tokens.push(Token::with_literal(
            TokenType::String,
            &lexeme,
            Literal::Str(value),
            self.line,
        ));
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let lexeme: String = self.source[self.start..self.current].iter().collect();
        let value: f64 = lexeme.parse().expect("scanned number lexeme is always valid");
        self.tokens.push(Token::with_literal(
            TokenType::Number,
            &lexeme,
            Literal::Number(value),
            self.line,
        ));
    }

    fn identifier(&mut self) {
        while is_alphanumeric(self.peek()) {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let kind = KEYWORDS.get(text.as_str()).copied().unwrap_or(TokenType::Identifier);
        self.add_token(kind);
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        c
    }

    fn peek(&self) -> char {
        self.source.get(self.current).copied().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.source.get(self.current + 1).copied().unwrap_or('\0')
    }

    fn add_token(&mut self, token_type: TokenType) {
        let text: String = self.source[self.start..self.current].iter().collect();
        self.tokens.push(Token::new(token_type, &text, self.line));
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn r#match(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.source[self.current] != expected {
            return false;
        }
        self.current += 1;
        true
    }
}

fn is_alpha(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_alphanumeric(c: char) -> bool {
    is_alpha(c) || c.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(source: &str) -> (Vec<Token>, Diagnostics) {
        let mut diagnostics = Diagnostics::new();
        let tokens = {
            let scanner = Scanner::new(source, &mut diagnostics);
            scanner.scan_tokens()
        };
        (tokens, diagnostics)
    }

    #[test]
    fn scans_punctuation_and_operators() {
        let (tokens, diagnostics) = scan("(){},.-+;*!=<=>=");
        assert!(!diagnostics.had_error());
        let kinds: Vec<TokenType> = tokens.iter().map(|t| t.token_type).collect();
        assert_eq!(
            kinds,
            vec![
                TokenType::LeftParen,
                TokenType::RightParen,
                TokenType::LeftBrace,
                TokenType::RightBrace,
                TokenType::Comma,
                TokenType::Dot,
                TokenType::Minus,
                TokenType::Plus,
                TokenType::Semicolon,
                TokenType::Star,
                TokenType::BangEqual,
                TokenType::LessEqual,
                TokenType::GreaterEqual,
                TokenType::Eof,
            ]
        );
    }

    #[test]
    fn scans_multiline_string_and_tracks_line_number() {
        let (tokens, diagnostics) = scan("\"a\nb\"");
        assert!(!diagnostics.had_error());
        match &tokens[0].literal {
            Literal::Str(s) => assert_eq!(s, "a\nb"),
            other => panic!("expected string literal, got {other:?}"),
        }
        assert_eq!(tokens[0].line, 2);
    }

    #[test]
    fn unterminated_string_is_a_compile_error() {
        let (_, diagnostics) = scan("\"abc");
        assert!(diagnostics.had_error());
    }

    #[test]
    fn number_literal_parses_as_f64() {
        let (tokens, _) = scan("3.5");
        match tokens[0].literal {
            Literal::Number(n) => assert_eq!(n, 3.5),
            _ => panic!("expected number literal"),
        }
    }

    #[test]
    fn keyword_lexeme_is_reserved_not_identifier() {
        let (tokens, _) = scan("class");
        assert_eq!(tokens[0].token_type, TokenType::Class);
    }

    #[test]
    fn unexpected_character_reports_compile_error_and_continues() {
        let (tokens, diagnostics) = scan("@ 1");
        assert!(diagnostics.had_error());
        // scanning continues past the bad character
        assert_eq!(tokens.last().unwrap().token_type, TokenType::Eof);
        assert!(tokens.iter().any(|t| t.token_type == TokenType::Number));
    }
}
