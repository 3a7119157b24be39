//! Compiled node queries.
//!
//! A small location-path language over local element names:
//!
//! - `a/b` child steps, `*` any element, `.` self, `..` parent
//! - `//a` descendants (a leading `/` or `//` anchors at the document node)
//! - predicates: `[b]`, `[b/c]`, `[@attr]`, `[@attr='v']`, `[@attr!='v']`,
//!   `[not(...)]`

use std::collections::HashSet;
use std::fmt;

use crate::error::QueryError;
use crate::xml::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
    SelfNode,
    Parent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NodeTest {
    Any,
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Predicate {
    Exists(NodePath),
    HasAttribute(String),
    AttributeEquals(String, String),
    AttributeNotEquals(String, String),
    Not(Box<Predicate>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    test: NodeTest,
    predicates: Vec<Predicate>,
}

/// A compiled query, evaluated against a context node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePath {
    source: String,
    absolute: bool,
    steps: Vec<Step>,
}

impl NodePath {
    pub fn parse(query: &str) -> Result<Self, QueryError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(QueryError::Empty);
        }
        Parser {
            query: trimmed,
            input: trimmed,
            base: 0,
            position: 0,
        }
        .parse_path()
    }

    /// The self query `.`
    pub fn current() -> Self {
        Self {
            source: ".".to_string(),
            absolute: false,
            steps: vec![Step {
                axis: Axis::SelfNode,
                test: NodeTest::Any,
                predicates: Vec::new(),
            }],
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Nodes matched from `context`, in first-visit order without duplicates
    pub fn select<'a>(&self, context: Node<'a>) -> Vec<Node<'a>> {
        let start = if self.absolute {
            context.document().document_node()
        } else {
            context
        };

        let mut current = vec![start];
        for step in &self.steps {
            let mut seen = HashSet::new();
            let mut next = Vec::new();
            for node in current {
                for candidate in step.candidates(node) {
                    if step.accepts(candidate) && seen.insert(candidate) {
                        next.push(candidate);
                    }
                }
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }
        current
    }

    pub fn matches_any(&self, context: Node<'_>) -> bool {
        !self.select(context).is_empty()
    }
}

impl fmt::Display for NodePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Step {
    fn candidates<'a>(&self, node: Node<'a>) -> Vec<Node<'a>> {
        match self.axis {
            Axis::Child => node.children().collect(),
            Axis::Descendant => node.descendants(),
            Axis::SelfNode => vec![node],
            Axis::Parent => node.parent().into_iter().collect(),
        }
    }

    fn accepts(&self, node: Node<'_>) -> bool {
        let test_passes = match (self.axis, &self.test) {
            (Axis::SelfNode | Axis::Parent, _) => true,
            (_, NodeTest::Any) => !node.is_document(),
            (_, NodeTest::Name(name)) => node.local_name() == name,
        };
        test_passes
            && self
                .predicates
                .iter()
                .all(|predicate| predicate.holds(node))
    }
}

impl Predicate {
    fn holds(&self, node: Node<'_>) -> bool {
        match self {
            Predicate::Exists(path) => path.matches_any(node),
            Predicate::HasAttribute(name) => node.has_attribute(name),
            Predicate::AttributeEquals(name, value) => node.attribute(name) == Some(value.as_str()),
            Predicate::AttributeNotEquals(name, value) => node
                .attribute(name)
                .is_some_and(|actual| actual != value),
            Predicate::Not(inner) => !inner.holds(node),
        }
    }
}

struct Parser<'q> {
    /// Whole query, for error messages
    query: &'q str,
    input: &'q str,
    /// Offset of `input` within `query`
    base: usize,
    position: usize,
}

impl<'q> Parser<'q> {
    fn error(&self, details: impl Into<String>) -> QueryError {
        QueryError::Syntax {
            query: self.query.to_string(),
            offset: self.base + self.position,
            details: details.into(),
        }
    }

    fn rest(&self) -> &'q str {
        &self.input[self.position..]
    }

    fn at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.position += token.len();
            true
        } else {
            false
        }
    }

    fn parse_path(mut self) -> Result<NodePath, QueryError> {
        let mut absolute = false;
        let mut axis = Axis::Child;

        if self.eat("//") {
            absolute = true;
            axis = Axis::Descendant;
        } else if self.eat("/") {
            absolute = true;
            if self.at_end() {
                return Ok(NodePath {
                    source: self.input.to_string(),
                    absolute,
                    steps: Vec::new(),
                });
            }
        }

        let mut steps = Vec::new();
        loop {
            steps.push(self.parse_step(axis)?);
            if self.at_end() {
                break;
            }
            if self.eat("//") {
                axis = Axis::Descendant;
            } else if self.eat("/") {
                axis = Axis::Child;
            } else {
                return Err(self.error("expected '/' between steps"));
            }
        }

        Ok(NodePath {
            source: self.input.to_string(),
            absolute,
            steps,
        })
    }

    fn parse_step(&mut self, axis: Axis) -> Result<Step, QueryError> {
        let (axis, test) = if self.eat("..") {
            (Axis::Parent, NodeTest::Any)
        } else if self.eat(".") {
            (Axis::SelfNode, NodeTest::Any)
        } else if self.eat("*") {
            (axis, NodeTest::Any)
        } else {
            let name = self.parse_name();
            if name.is_empty() {
                return Err(self.error("expected a step"));
            }
            (axis, NodeTest::Name(name.to_string()))
        };

        let mut predicates = Vec::new();
        while self.rest().starts_with('[') {
            predicates.push(self.parse_bracketed()?);
        }

        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn parse_name(&mut self) -> &'q str {
        let rest = self.rest();
        let length = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or(rest.len());
        self.position += length;
        &rest[..length]
    }

    /// Parse `[ ... ]` starting at the current '['
    fn parse_bracketed(&mut self) -> Result<Predicate, QueryError> {
        let open = self.position;
        let mut depth = 0usize;
        let mut quote: Option<char> = None;
        let mut close = None;

        for (offset, c) in self.rest().char_indices() {
            match (quote, c) {
                (Some(q), c) if c == q => quote = None,
                (Some(_), _) => {}
                (None, '\'' | '"') => quote = Some(c),
                (None, '[') => depth += 1,
                (None, ']') => {
                    depth -= 1;
                    if depth == 0 {
                        close = Some(open + offset);
                        break;
                    }
                }
                _ => {}
            }
        }

        let close = close.ok_or_else(|| self.error("unterminated '['"))?;
        let inner = &self.input[open + 1..close];
        let predicate = self.parse_predicate(inner, open + 1)?;
        self.position = close + 1;
        Ok(predicate)
    }

    fn parse_predicate(&self, inner: &'q str, offset: usize) -> Result<Predicate, QueryError> {
        let leading = inner.len() - inner.trim_start().len();
        let expression = inner.trim();
        let offset = offset + leading;

        if expression.is_empty() {
            return Err(QueryError::Syntax {
                query: self.query.to_string(),
                offset: self.base + offset,
                details: "empty predicate".to_string(),
            });
        }

        if let Some(negated) = expression
            .strip_prefix("not(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            let inner = self.parse_predicate(negated, offset + 4)?;
            return Ok(Predicate::Not(Box::new(inner)));
        }

        if let Some(attribute) = expression.strip_prefix('@') {
            return self.parse_attribute_predicate(attribute, offset + 1);
        }

        let nested = Parser {
            query: self.query,
            input: expression,
            base: self.base + offset,
            position: 0,
        };
        Ok(Predicate::Exists(nested.parse_path()?))
    }

    fn parse_attribute_predicate(
        &self,
        expression: &'q str,
        offset: usize,
    ) -> Result<Predicate, QueryError> {
        let name_length = expression
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or(expression.len());
        let name = &expression[..name_length];
        let error = |details: &str| QueryError::Syntax {
            query: self.query.to_string(),
            offset: self.base + offset + name_length,
            details: details.to_string(),
        };

        if name.is_empty() {
            return Err(error("expected an attribute name"));
        }

        let rest = expression[name_length..].trim();
        if rest.is_empty() {
            return Ok(Predicate::HasAttribute(name.to_string()));
        }

        let (negated, literal) = if let Some(literal) = rest.strip_prefix("!=") {
            (true, literal.trim())
        } else if let Some(literal) = rest.strip_prefix('=') {
            (false, literal.trim())
        } else {
            return Err(error("expected '=' or '!='"));
        };

        let value = unquote(literal).ok_or_else(|| error("expected a quoted literal"))?;
        Ok(if negated {
            Predicate::AttributeNotEquals(name.to_string(), value.to_string())
        } else {
            Predicate::AttributeEquals(name.to_string(), value.to_string())
        })
    }
}

fn unquote(literal: &str) -> Option<&str> {
    let quote = literal.chars().next().filter(|c| *c == '\'' || *c == '"')?;
    literal
        .strip_prefix(quote)?
        .strip_suffix(quote)
        .filter(|value| !value.contains(quote))
}
