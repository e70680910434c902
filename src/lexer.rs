use crate::error::{Error, Resource};
use crate::grammar::TokenTable;
use crate::source_location::{SourceLocation, SourceSpan};
use crate::token::{Token, TokenKind};

/// A saved lexer position. Restoring one rewinds the lexer exactly to where it was.
pub type Cursor = SourceLocation;

/// Turns source text into tokens on demand, driven by a grammar's token table.
///
/// The lexer only moves forward on its own; the parser rewinds it explicitly with
/// `save`/`restore` when it backtracks. After the first error every later call
/// produces the `EOF` sentinel.
pub struct Lexer<'a> {
    source: &'a str,
    tokens: &'a TokenTable,
    loc: SourceLocation,
    max_token_len: usize,
    halted: bool,
    emitted_eof: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, tokens: &'a TokenTable) -> Self {
        Lexer {
            source,
            tokens,
            loc: SourceLocation::new(),
            max_token_len: usize::MAX,
            halted: false,
            emitted_eof: false,
        }
    }

    pub fn with_max_token_len(mut self, max_token_len: usize) -> Self {
        self.max_token_len = max_token_len;
        self
    }

    pub fn save(&self) -> Cursor {
        self.loc
    }

    pub fn restore(&mut self, cursor: Cursor) {
        self.loc = cursor;
    }

    fn rest(&self) -> &'a str {
        &self.source[self.loc.offset..]
    }

    fn is_at_end(&self) -> bool {
        self.rest().is_empty()
    }

    fn peek(&self) -> char {
        self.rest().chars().next().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        self.rest().chars().nth(1).unwrap_or('\0')
    }

    fn advance_char(&mut self) -> char {
        let c = self.peek();
        self.loc.advance(c);
        c
    }

    fn advance_bytes(&mut self, len: usize) {
        let end = self.loc.offset + len;
        while self.loc.offset < end {
            self.advance_char();
        }
    }

    fn span_from(&self, start: SourceLocation) -> SourceSpan {
        SourceSpan::new(start, self.loc)
    }

    fn error(&mut self, message: String, start: SourceLocation) -> Error {
        self.halted = true;
        Error::Lexical {
            message,
            location: self.span_from(start),
        }
    }

    fn make_token(
        &mut self,
        kind: TokenKind,
        lexeme: String,
        start: SourceLocation,
    ) -> Result<Token, Error> {
        if lexeme.len() > self.max_token_len {
            self.halted = true;
            return Err(Error::capacity(Resource::TokenText, self.max_token_len));
        }
        Ok(Token::new(kind, lexeme, self.span_from(start)))
    }

    // skips whitespace and comments, returns an error for an unterminated comment
    fn skip_trivia(&mut self) -> Result<(), Error> {
        loop {
            while !self.is_at_end() && self.peek().is_whitespace() {
                self.advance_char();
            }

            let Some((opener, closer)) = self.tokens.comment_at(self.rest()) else {
                return Ok(());
            };
            let start = self.loc;
            self.advance_bytes(opener.len());

            match self.rest().find(closer.as_str()) {
                Some(len) => self.advance_bytes(len + closer.len()),
                // a line comment may run to the end of the input
                None if closer == "\n" => self.advance_bytes(self.rest().len()),
                None => {
                    let message = format!("Unterminated comment, expected '{closer}'");
                    return Err(self.error(message, start));
                }
            }
        }
    }

    fn scan_word(&mut self, start: SourceLocation) -> Result<Token, Error> {
        let mut lexeme = String::new();
        while !self.is_at_end() && (self.peek().is_ascii_alphanumeric() || self.peek() == '_') {
            lexeme.push(self.advance_char());
        }

        match self.tokens.keyword(&lexeme) {
            Some((kind, canonical)) => {
                let (kind, canonical) = (*kind, canonical.clone());
                self.make_token(kind, canonical, start)
            }
            None => self.make_token(TokenKind::id(), lexeme, start),
        }
    }

    fn scan_number(&mut self, start: SourceLocation) -> Result<Token, Error> {
        let mut lexeme = String::new();
        while !self.is_at_end() && self.peek().is_ascii_digit() {
            lexeme.push(self.advance_char());
        }

        // look for fractional part
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            lexeme.push(self.advance_char());
            while !self.is_at_end() && self.peek().is_ascii_digit() {
                lexeme.push(self.advance_char());
            }
            return self.make_token(TokenKind::real(), lexeme, start);
        }

        self.make_token(TokenKind::integer(), lexeme, start)
    }

    fn scan_string(&mut self, start: SourceLocation) -> Result<Token, Error> {
        let quote = self.advance_char();
        let mut text = String::new();

        while !self.is_at_end() && self.peek() != quote {
            text.push(self.advance_char());
        }

        if self.is_at_end() {
            return Err(self.error("Unterminated string".to_string(), start));
        }

        // consume closing quote
        self.advance_char();
        self.make_token(TokenKind::string(), text, start)
    }

    fn scan_symbol(&mut self, start: SourceLocation) -> Result<Token, Error> {
        match self.tokens.longest_symbol(self.rest()) {
            Some((text, kind)) => {
                let lexeme = text.to_string();
                self.advance_bytes(lexeme.len());
                self.make_token(kind, lexeme, start)
            }
            None => {
                let c = self.advance_char();
                Err(self.error(format!("Unexpected character '{c}'"), start))
            }
        }
    }

    /// Produces the next token, or `EOF` once the input (or the lexer) is exhausted.
    pub fn next_token(&mut self) -> Result<Token, Error> {
        if self.halted {
            return Ok(Token::new(TokenKind::eof(), String::new(), self.span_from(self.loc)));
        }

        self.skip_trivia()?;

        let start = self.loc;
        if self.is_at_end() {
            return Ok(Token::new(TokenKind::eof(), String::new(), self.span_from(start)));
        }

        let c = self.peek();
        if c.is_ascii_alphabetic() {
            self.scan_word(start)
        } else if c.is_ascii_digit() {
            self.scan_number(start)
        } else if c == '\'' || c == '"' {
            self.scan_string(start)
        } else {
            self.scan_symbol(start)
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.emitted_eof {
            return None;
        }

        let token = self.next_token();
        match &token {
            Ok(t) if t.is_eof() => self.emitted_eof = true,
            Err(_) => self.emitted_eof = true,
            Ok(_) => (),
        }
        Some(token)
    }
}
