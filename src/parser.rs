use crate::config::Config;
use crate::error::{Error, Resource};
use crate::grammar::{Grammar, GrammarExpression, Name, RepeatKind, Rule};
use crate::lexer::{Cursor, Lexer};
use crate::parse_tree::ParseNode;
use crate::token::{Token, TokenKind};

extern crate restore_macros;
use restore_macros::restore_state_unless_matched;

// Everything needed to rewind the parser to an earlier point.
struct Snapshot {
    cursor: Cursor,
    lookahead: Token,
    mark: usize,
}

// The terminals tried at the furthest token any attempt reached.
struct Expectation {
    found: Token,
    expected: Vec<TokenKind>,
}

/// Interprets a grammar's rules over a token stream, building a `ParseNode` tree.
///
/// Each matcher returns `Ok(true)` on a match and `Ok(false)` on a miss the caller may recover
/// from by trying something else. `Err` is fatal: lexical errors and exhausted capacities end
/// the parse even in the middle of an alternation.
pub struct Parser<'a> {
    grammar: &'a Grammar,
    lexer: Lexer<'a>,
    lookahead: Token,
    // nodes under construction; the last one receives matched children
    nodes: Vec<ParseNode>,
    positions: Vec<Snapshot>,
    furthest: Option<Expectation>,
    max_depth: usize,
    max_backtrack: usize,
}

impl<'a> Parser<'a> {
    pub fn new(grammar: &'a Grammar, source: &'a str, config: &Config) -> Result<Self, Error> {
        let mut lexer =
            Lexer::new(source, grammar.tokens()).with_max_token_len(config.max_token_len);
        let lookahead = lexer.next_token()?;

        Ok(Parser {
            grammar,
            lexer,
            lookahead,
            nodes: Vec::new(),
            positions: Vec::new(),
            furthest: None,
            max_depth: config.max_parse_depth,
            max_backtrack: config.max_backtrack,
        })
    }

    // the methods marked with restore_state_unless_matched hook into save_state,
    // release_state & restore_state: every alternative and every repetition is tried
    // from a snapshot, and rewound to it when it does not match
    fn save_state(&mut self) -> Result<(), Error> {
        if self.positions.len() >= self.max_backtrack {
            return Err(Error::capacity(Resource::Backtrack, self.max_backtrack));
        }

        let mark = self.nodes.last().map_or(0, ParseNode::mark);
        self.positions.push(Snapshot {
            cursor: self.lexer.save(),
            lookahead: self.lookahead.clone(),
            mark,
        });
        Ok(())
    }

    fn release_state(&mut self) {
        self.positions.pop();
    }

    fn restore_state(&mut self) {
        if let Some(snapshot) = self.positions.pop() {
            self.lexer.restore(snapshot.cursor);
            self.lookahead = snapshot.lookahead;
            if let Some(node) = self.nodes.last_mut() {
                node.truncate(snapshot.mark);
            }
        }
    }

    #[restore_state_unless_matched]
    fn attempt(&mut self, expr: &'a GrammarExpression) -> Result<bool, Error> {
        self.match_expression(expr)
    }

    fn match_expression(&mut self, expr: &'a GrammarExpression) -> Result<bool, Error> {
        match expr {
            GrammarExpression::Sequence(items) => {
                for item in items {
                    if !self.match_expression(item)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            GrammarExpression::Alternation(alternatives) => {
                for alternative in alternatives {
                    if self.attempt(alternative)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            GrammarExpression::Repeat(RepeatKind::Optional, inner) => {
                self.attempt(inner)?;
                Ok(true)
            }
            GrammarExpression::Repeat(RepeatKind::ZeroOrMore, inner) => {
                self.repeat(inner)?;
                Ok(true)
            }
            GrammarExpression::Repeat(RepeatKind::OneOrMore, inner) => {
                if !self.attempt(inner)? {
                    return Ok(false);
                }
                self.repeat(inner)?;
                Ok(true)
            }
            GrammarExpression::Terminal(kind) => self.match_terminal(*kind),
            GrammarExpression::NonTerminal(name) => self.match_nonterminal(*name),
        }
    }

    fn repeat(&mut self, inner: &'a GrammarExpression) -> Result<(), Error> {
        loop {
            let before = self.lookahead.location.start.offset;
            if !self.attempt(inner)? {
                return Ok(());
            }

            // an iteration that consumed nothing would match forever
            if self.lookahead.location.start.offset == before {
                return Ok(());
            }
        }
    }

    fn match_terminal(&mut self, kind: TokenKind) -> Result<bool, Error> {
        if self.lookahead.kind != kind {
            self.expect(kind);
            return Ok(false);
        }

        let next = self.lexer.next_token()?;
        let token = std::mem::replace(&mut self.lookahead, next);
        if let Some(node) = self.nodes.last_mut() {
            node.attach(ParseNode::leaf(&token));
        }
        Ok(true)
    }

    fn match_nonterminal(&mut self, name: Name) -> Result<bool, Error> {
        let grammar = self.grammar;
        let rule = grammar
            .rule(name)
            .ok_or_else(|| Error::grammar(format!("rule '{name}' is not defined")))?;

        match self.match_rule(rule)? {
            Some(child) => {
                if let Some(node) = self.nodes.last_mut() {
                    node.attach(child);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn match_rule(&mut self, rule: &'a Rule) -> Result<Option<ParseNode>, Error> {
        if self.nodes.len() >= self.max_depth {
            return Err(Error::capacity(Resource::ParseDepth, self.max_depth));
        }

        self.nodes.push(ParseNode::for_rule(rule));
        let matched = self.match_expression(&rule.expression);
        let node = self.nodes.pop();

        Ok(if matched? { node } else { None })
    }

    // remember what was expected at the furthest point reached, for the error message
    fn expect(&mut self, kind: TokenKind) {
        let offset = self.lookahead.location.start.offset;
        match &mut self.furthest {
            Some(furthest) if furthest.found.location.start.offset > offset => (),
            Some(furthest) if furthest.found.location.start.offset == offset => {
                if !furthest.expected.contains(&kind) {
                    furthest.expected.push(kind);
                }
            }
            _ => {
                self.furthest = Some(Expectation {
                    found: self.lookahead.clone(),
                    expected: vec![kind],
                })
            }
        }
    }

    fn syntax_error(&self) -> Error {
        let (found, expected) = match &self.furthest {
            Some(furthest) => (&furthest.found, furthest.expected.as_slice()),
            None => (&self.lookahead, [].as_slice()),
        };

        let found_text = if found.is_eof() {
            "end of input".to_string()
        } else {
            format!("'{}'", found.lexeme)
        };

        let expected = expected
            .iter()
            .map(|kind| kind.to_string())
            .collect::<Vec<_>>();
        let message = match expected.as_slice() {
            [] => format!("unexpected {found_text}"),
            [one] => format!("expected {one}, found {found_text}"),
            many => format!("expected one of {}, found {found_text}", many.join(", ")),
        };

        Error::Syntax {
            message,
            location: found.location,
        }
    }

    /// Matches the start rule against the whole input.
    pub fn parse(mut self) -> Result<ParseNode, Error> {
        let grammar = self.grammar;
        match self.match_rule(grammar.start())? {
            Some(root) if self.lookahead.is_eof() => Ok(root),
            Some(_) => {
                self.expect(TokenKind::eof());
                Err(self.syntax_error())
            }
            None => Err(self.syntax_error()),
        }
    }
}

pub fn parse(grammar: &Grammar, source: &str, config: &Config) -> Result<ParseNode, Error> {
    Parser::new(grammar, source, config)?.parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tags(node: &ParseNode) -> Vec<&str> {
        node.children().map(|child| child.tag()).collect()
    }

    fn parse_with(grammar: &str, source: &str) -> Result<ParseNode, Error> {
        let grammar = Grammar::from_json(grammar).unwrap();
        parse(&grammar, source, &Config::default())
    }

    #[test]
    fn test_list_rule_keeps_operands_and_operator() {
        let tree = parse_with(
            r#"{
                "START": "expr",
                "TOKENS": { "PLUS": "+" },
                "expr[]": ["term", { "?": ["PLUS", "term"] }],
                "term": "INTEGER_CONST"
            }"#,
            "3+5",
        )
        .unwrap();

        assert_eq!(tree.tag(), "expr");
        assert_eq!(tags(&tree), vec!["term", "PLUS", "term"]);
        assert_eq!(tree.item(2).unwrap().text(), Some("5"));
    }

    #[test]
    fn test_failed_alternative_leaves_no_residue() {
        let tree = parse_with(
            r#"{
                "TOKENS": { "COLON": ":", "ASSIGN": ":=" },
                "program": { "or": [["ID", "COLON", "ID"], ["ID", "ASSIGN", "INTEGER_CONST"]] }
            }"#,
            "x := 1",
        )
        .unwrap();

        assert_eq!(tags(&tree), vec!["ID", "ASSIGN", "INTEGER_CONST"]);
        assert_eq!(tree.identifiers(), vec!["x"]);
    }

    #[test]
    fn test_failed_repetition_leaves_no_residue() {
        let tree = parse_with(
            r#"{
                "START": "items",
                "TOKENS": { "COMMA": "," },
                "items[]": [{ "*": ["ID", "COMMA"] }, "ID"]
            }"#,
            "a, b, c",
        )
        .unwrap();

        // the third iteration matches 'c' before failing on the missing comma
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.identifiers(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_one_or_more_requires_a_match() {
        let grammar = r#"{
            "TOKENS": { "SEMI": ";" },
            "program": { "+": ["ID", "SEMI"] }
        }"#;

        assert_eq!(parse_with(grammar, "a; b;").unwrap().len(), 4);
        assert!(matches!(parse_with(grammar, ""), Err(Error::Syntax { .. })));
    }

    #[test]
    fn test_empty_iteration_ends_repetition() {
        let tree = parse_with(
            r#"{
                "program": [{ "*": { "?": "ID" } }, "INTEGER_CONST"]
            }"#,
            "a b 1",
        )
        .unwrap();

        assert_eq!(tags(&tree), vec!["ID", "ID", "INTEGER_CONST"]);
    }

    #[test]
    fn test_syntax_error_names_furthest_token() {
        let err = parse_with(
            r#"{
                "TOKENS": { "SEMI": ";", "COMMA": "," },
                "program": ["ID", { "or": ["SEMI", "COMMA"] }]
            }"#,
            "x y",
        )
        .unwrap_err();

        match err {
            Error::Syntax { message, location } => {
                assert_eq!(message, "expected one of SEMI, COMMA, found 'y'");
                assert_eq!(location.start.column, 3);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_trailing_input_is_rejected() {
        let err = parse_with(
            r#"{ "TOKENS": { "SEMI": ";" }, "program": ["ID", "SEMI"] }"#,
            "x; y",
        )
        .unwrap_err();

        assert!(matches!(
            err,
            Error::Syntax { ref message, .. } if message == "expected EOF, found 'y'"
        ));
    }

    #[test]
    fn test_lexical_error_is_fatal_inside_alternation() {
        let err = parse_with(
            r#"{ "program": { "or": [["ID", "ID"], ["ID", "INTEGER_CONST"]] } }"#,
            "x ?",
        )
        .unwrap_err();

        assert!(matches!(err, Error::Lexical { .. }));
    }

    #[test]
    fn test_parse_depth_is_bounded() {
        let grammar = Grammar::from_json(
            r#"{
                "TOKENS": { "LPAREN": "(", "RPAREN": ")" },
                "program": { "or": [["LPAREN", "program", "RPAREN"], "ID"] }
            }"#,
        )
        .unwrap();
        let config = Config {
            max_parse_depth: 3,
            ..Config::default()
        };

        assert!(parse(&grammar, "((x))", &config).is_ok());
        assert_eq!(
            parse(&grammar, "(((x)))", &config).unwrap_err(),
            Error::capacity(Resource::ParseDepth, 3)
        );
    }

    #[test]
    fn test_backtrack_stack_is_bounded() {
        let grammar = Grammar::from_json(r#"{ "program": { "or": [{ "or": ["ID"] }] } }"#).unwrap();
        let config = Config {
            max_backtrack: 1,
            ..Config::default()
        };

        assert_eq!(
            parse(&grammar, "x", &config).unwrap_err(),
            Error::capacity(Resource::Backtrack, 1)
        );
    }

    #[test]
    fn test_pascal_procedure_declaration() {
        let grammar = Grammar::from_json(include_str!("../grammars/pascal.json")).unwrap();
        let source = "PROGRAM t; VAR y : INTEGER; \
                      PROCEDURE P(x : INTEGER); BEGIN y := x END; \
                      BEGIN P(7) END.";
        let tree = parse(&grammar, source, &Config::default()).unwrap();

        let block = tree.field("block").unwrap();
        let declarations = block.field("declarations").unwrap();
        assert_eq!(tags(declarations), vec!["var_section", "procedure_declaration"]);

        let procedure = declarations.field("procedure_declaration").unwrap();
        assert_eq!(procedure.field("ID").unwrap().text(), Some("P"));
        let params = procedure.field("formal_parameters").unwrap();
        assert_eq!(params.identifiers(), vec!["x"]);
    }
}
