use crate::token::TokenKind;
use std::collections::HashMap;

/// The lexical half of a grammar document.
///
/// Entries of the `TOKENS` table whose text starts with a letter are keywords and are matched
/// case-insensitively against whole identifier runs. Every other entry is a literal symbol,
/// matched longest-first.
#[derive(Debug, Clone, Default)]
pub struct TokenTable {
    // upper-cased text -> (kind, canonical text)
    keywords: HashMap<String, (TokenKind, String)>,
    // ordered by descending text length, so the first prefix match is the longest
    symbols: Vec<(String, TokenKind)>,
    // (opener, closer) pairs; a closer of "\n" ends at the end of the line
    comments: Vec<(String, String)>,
    kinds: HashMap<String, TokenKind>,
}

impl TokenTable {
    pub fn new() -> Self {
        let mut table = Self::default();
        for name in TokenKind::BUILTIN {
            table.kinds.insert(name.to_string(), TokenKind::new(name));
        }
        table
    }

    /// Adds one `TOKENS` entry. Returns `false` when `text` is already claimed by another kind.
    pub fn insert(&mut self, name: &str, text: &str) -> bool {
        let kind = TokenKind::new(name);
        self.kinds.insert(name.to_string(), kind);

        if text.starts_with(|c: char| c.is_ascii_alphabetic()) {
            let key = text.to_ascii_uppercase();
            if self.keywords.contains_key(&key) {
                return false;
            }
            self.keywords.insert(key, (kind, text.to_string()));
        } else {
            if self.symbols.iter().any(|(t, _)| t == text) {
                return false;
            }
            self.symbols.push((text.to_string(), kind));
            self.symbols.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        }
        true
    }

    pub fn insert_comment(&mut self, opener: &str, closer: &str) {
        self.comments.push((opener.to_string(), closer.to_string()));
    }

    pub fn kind(&self, name: &str) -> Option<TokenKind> {
        self.kinds.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    pub fn keyword(&self, word: &str) -> Option<&(TokenKind, String)> {
        self.keywords.get(&word.to_ascii_uppercase())
    }

    /// The longest literal symbol that prefixes `input`.
    pub fn longest_symbol(&self, input: &str) -> Option<(&str, TokenKind)> {
        self.symbols
            .iter()
            .find(|(text, _)| input.starts_with(text.as_str()))
            .map(|(text, kind)| (text.as_str(), *kind))
    }

    pub fn comment_at(&self, input: &str) -> Option<&(String, String)> {
        self.comments
            .iter()
            .find(|(opener, _)| input.starts_with(opener.as_str()))
    }
}
