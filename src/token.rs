use crate::source_location::SourceSpan;
use derive_more::Display;
use internment::Intern;

/// The type of a token, named by the grammar's `TOKENS` table or one of the built-in classes.
///
/// Kinds are interned, so comparing the lookahead against a terminal is a pointer comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenKind(Intern<String>);

impl TokenKind {
    pub const ID: &'static str = "ID";
    pub const INTEGER_CONST: &'static str = "INTEGER_CONST";
    pub const REAL_CONST: &'static str = "REAL_CONST";
    pub const STRING_CONST: &'static str = "STRING_CONST";
    pub const EOF: &'static str = "EOF";

    /// Token classes recognised by the lexer without an entry in `TOKENS`.
    pub const BUILTIN: [&'static str; 5] = [
        Self::ID,
        Self::INTEGER_CONST,
        Self::REAL_CONST,
        Self::STRING_CONST,
        Self::EOF,
    ];

    pub fn new(name: &str) -> Self {
        TokenKind(Intern::new(name.to_string()))
    }

    pub fn id() -> Self {
        Self::new(Self::ID)
    }

    pub fn integer() -> Self {
        Self::new(Self::INTEGER_CONST)
    }

    pub fn real() -> Self {
        Self::new(Self::REAL_CONST)
    }

    pub fn string() -> Self {
        Self::new(Self::STRING_CONST)
    }

    pub fn eof() -> Self {
        Self::new(Self::EOF)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_builtin(name: &str) -> bool {
        Self::BUILTIN.contains(&name)
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Display)]
#[display(fmt = "{lexeme}")]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub location: SourceSpan,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: String, location: SourceSpan) -> Self {
        Token {
            kind,
            lexeme,
            location,
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind.as_str() == TokenKind::EOF
    }
}
