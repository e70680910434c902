use crate::config::Config;
use crate::error::{Error, Resource};
use crate::grammar::{Grammar, Rule};
use crate::source_location::SourceSpan;
use crate::token::{Token, TokenKind};
use serde::{Deserialize, Serialize};
use std::rc::Rc;

/// A node of the generic parse tree.
///
/// Matching a non-list rule builds a `Record`, whose fields are keyed by the rule or token
/// type that produced them. A key may repeat (`[ID, COMMA, ID]` holds two `ID` fields); lookups
/// return the last one. Matching a list rule builds a `List`, which keeps every child in match
/// order. Matching a terminal builds a `Leaf`.
///
/// Children are shared behind `Rc` so the interpreter can cache procedure bodies without
/// copying them.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseNode {
    Record {
        rule: String,
        fields: Vec<(String, Rc<ParseNode>)>,
    },
    List {
        rule: String,
        items: Vec<Rc<ParseNode>>,
    },
    Leaf {
        token: String,
        text: String,
        location: SourceSpan,
    },
}

impl ParseNode {
    /// The empty node a match of `rule` starts from.
    pub fn for_rule(rule: &Rule) -> Self {
        let name = rule.name.to_string();
        if rule.is_list {
            ParseNode::List {
                rule: name,
                items: Vec::new(),
            }
        } else {
            ParseNode::Record {
                rule: name,
                fields: Vec::new(),
            }
        }
    }

    pub fn leaf(token: &Token) -> Self {
        ParseNode::Leaf {
            token: token.kind.to_string(),
            text: token.lexeme.clone(),
            location: token.location,
        }
    }

    /// The rule name of a `Record` or `List`, the token type of a `Leaf`.
    pub fn tag(&self) -> &str {
        match self {
            ParseNode::Record { rule, .. } | ParseNode::List { rule, .. } => rule.as_str(),
            ParseNode::Leaf { token, .. } => token.as_str(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, ParseNode::Leaf { .. })
    }

    /// Adds `child` under its own tag. Leaves have no children, so attaching to one does nothing.
    pub fn attach(&mut self, child: ParseNode) {
        match self {
            ParseNode::Record { fields, .. } => {
                fields.push((child.tag().to_string(), Rc::new(child)));
            }
            ParseNode::List { items, .. } => items.push(Rc::new(child)),
            ParseNode::Leaf { .. } => (),
        }
    }

    /// The number of children, used as a rollback point by `truncate`.
    pub fn mark(&self) -> usize {
        match self {
            ParseNode::Record { fields, .. } => fields.len(),
            ParseNode::List { items, .. } => items.len(),
            ParseNode::Leaf { .. } => 0,
        }
    }

    /// Drops every child attached after `mark` was taken.
    pub fn truncate(&mut self, mark: usize) {
        match self {
            ParseNode::Record { fields, .. } => fields.truncate(mark),
            ParseNode::List { items, .. } => items.truncate(mark),
            ParseNode::Leaf { .. } => (),
        }
    }

    pub fn children(&self) -> Box<dyn Iterator<Item = &Rc<ParseNode>> + '_> {
        match self {
            ParseNode::Record { fields, .. } => Box::new(fields.iter().map(|(_, child)| child)),
            ParseNode::List { items, .. } => Box::new(items.iter()),
            ParseNode::Leaf { .. } => Box::new(std::iter::empty()),
        }
    }

    pub fn len(&self) -> usize {
        self.mark()
    }

    pub fn is_empty(&self) -> bool {
        self.mark() == 0
    }

    /// The child at `index` in match order.
    pub fn item(&self, index: usize) -> Option<&Rc<ParseNode>> {
        self.children().nth(index)
    }

    /// The last child tagged `hint`.
    pub fn field(&self, hint: &str) -> Option<&Rc<ParseNode>> {
        match self {
            ParseNode::Record { fields, .. } => fields
                .iter()
                .rev()
                .find(|(key, _)| key == hint)
                .map(|(_, child)| child),
            ParseNode::List { items, .. } => items.iter().rev().find(|item| item.tag() == hint),
            ParseNode::Leaf { .. } => None,
        }
    }

    /// Text of the first leaf under this node, in source order.
    pub fn text(&self) -> Option<&str> {
        match self {
            ParseNode::Leaf { text, .. } => Some(text.as_str()),
            _ => self.children().find_map(|child| child.text()),
        }
    }

    /// Span of the first leaf under this node.
    pub fn location(&self) -> Option<SourceSpan> {
        match self {
            ParseNode::Leaf { location, .. } => Some(*location),
            _ => self.children().find_map(|child| child.location()),
        }
    }

    /// Every `ID` leaf under this node, in source order.
    pub fn identifiers(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_identifiers(&mut names);
        names
    }

    fn collect_identifiers<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            ParseNode::Leaf { token, text, .. } => {
                if token == TokenKind::ID {
                    names.push(text.as_str());
                }
            }
            _ => {
                for child in self.children() {
                    child.collect_identifiers(names);
                }
            }
        }
    }

    // appends this subtree to `nodes` in post-order and returns the index of its root
    fn store(&self, nodes: &mut Vec<StoredNode>) -> usize {
        let stored = match self {
            ParseNode::Record { rule, fields } => StoredNode::Record {
                rule: rule.clone(),
                fields: fields
                    .iter()
                    .map(|(key, child)| (key.clone(), child.store(nodes)))
                    .collect(),
            },
            ParseNode::List { rule, items } => StoredNode::List {
                rule: rule.clone(),
                items: items.iter().map(|item| item.store(nodes)).collect(),
            },
            ParseNode::Leaf {
                token,
                text,
                location,
            } => StoredNode::Leaf {
                token: token.clone(),
                text: text.clone(),
                location: *location,
            },
        };
        nodes.push(stored);
        nodes.len() - 1
    }

    /// Serializes the tree as a flat node table, so the JSON nests no deeper however deep
    /// the tree is.
    pub fn to_json(&self) -> Result<String, Error> {
        let mut nodes = Vec::new();
        self.store(&mut nodes);
        Ok(serde_json::to_string_pretty(&StoredTree { nodes })?)
    }

    /// Reloads a persisted tree, checking every rule and token type it names against `grammar`.
    ///
    /// A tree deeper than the parser could have built is refused with a capacity error.
    pub fn from_json(json: &str, grammar: &Grammar, config: &Config) -> Result<Self, Error> {
        let StoredTree { nodes } = serde_json::from_str(json)?;
        // leaves sit one level below the deepest rule node
        let max_depth = config.max_parse_depth + 1;

        let mut built: Vec<Option<(Rc<ParseNode>, usize)>> = Vec::with_capacity(nodes.len());
        for (index, stored) in nodes.into_iter().enumerate() {
            let mut depth = 1;
            let mut take = |child: usize| -> Result<Rc<ParseNode>, Error> {
                let (node, child_depth) = built
                    .get_mut(child)
                    .and_then(Option::take)
                    .ok_or_else(|| {
                        Error::Persist(format!("node {index} cannot take node {child} as a child"))
                    })?;
                depth = depth.max(child_depth + 1);
                Ok(node)
            };

            let node = match stored {
                StoredNode::Record { rule, fields } => ParseNode::Record {
                    rule,
                    fields: fields
                        .into_iter()
                        .map(|(key, child)| take(child).map(|node| (key, node)))
                        .collect::<Result<_, Error>>()?,
                },
                StoredNode::List { rule, items } => ParseNode::List {
                    rule,
                    items: items
                        .into_iter()
                        .map(&mut take)
                        .collect::<Result<_, Error>>()?,
                },
                StoredNode::Leaf {
                    token,
                    text,
                    location,
                } => ParseNode::Leaf {
                    token,
                    text,
                    location,
                },
            };

            if depth > max_depth {
                return Err(Error::capacity(Resource::ParseDepth, config.max_parse_depth));
            }
            built.push(Some((Rc::new(node), depth)));
        }

        // the root comes last and every other node must belong to it
        let root = built.pop().flatten();
        if built.iter().any(Option::is_some) {
            return Err(Error::Persist("tree holds unreachable nodes".to_string()));
        }
        let (root, _) = root.ok_or_else(|| Error::Persist("tree is empty".to_string()))?;

        // `root` is the only handle left, so this never clones
        let root = Rc::try_unwrap(root).unwrap_or_else(|shared| (*shared).clone());
        root.validate(grammar)?;
        Ok(root)
    }

    pub fn validate(&self, grammar: &Grammar) -> Result<(), Error> {
        match self {
            ParseNode::Record { rule, .. } | ParseNode::List { rule, .. } => {
                let is_list = matches!(self, ParseNode::List { .. });
                match grammar.rule_named(rule) {
                    Some(r) if r.is_list == is_list => (),
                    Some(_) => {
                        return Err(Error::Persist(format!(
                            "node for rule '{rule}' has the wrong shape"
                        )))
                    }
                    None => return Err(Error::Persist(format!("unknown rule '{rule}'"))),
                }
            }
            ParseNode::Leaf { token, .. } => {
                if !grammar.tokens().contains(token) {
                    return Err(Error::Persist(format!("unknown token type '{token}'")));
                }
            }
        }

        if let ParseNode::Record { fields, .. } = self {
            if let Some((key, child)) = fields.iter().find(|(key, child)| key != child.tag()) {
                return Err(Error::Persist(format!(
                    "field '{key}' holds a '{}' node",
                    child.tag()
                )));
            }
        }

        self.children().try_for_each(|child| child.validate(grammar))
    }
}

/// A `ParseNode` as written to disk. Children are indices of nodes stored before it.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "node")]
enum StoredNode {
    Record {
        rule: String,
        fields: Vec<(String, usize)>,
    },
    List {
        rule: String,
        items: Vec<usize>,
    },
    Leaf {
        token: String,
        text: String,
        location: SourceSpan,
    },
}

/// Nodes in post-order; the root is the last one.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoredTree {
    nodes: Vec<StoredNode>,
}
