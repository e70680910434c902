pub mod config;
pub mod diagnostics;
pub mod error;
pub mod grammar;
pub mod interpreter;
pub mod lexer;
pub mod parse_tree;
pub mod parser;
pub mod semantic_analyzer;
pub mod session;
pub mod source_location;
pub mod symbol_table;
pub mod token;
