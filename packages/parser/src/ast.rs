use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Span information for source location tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Expression node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Expression {
    /// String literal
    String { value: String, span: Span },

    /// Number literal
    Number { value: f64, span: Span },

    /// Boolean literal
    Boolean { value: bool, span: Span },

    /// `null` / `undefined`
    Null { span: Span },

    /// Reference to a context binding or arrow parameter
    Identifier { name: String, span: Span },

    /// `[a, b, c]`
    Array { elements: Vec<Expression>, span: Span },

    /// `{ key: value }`
    Object {
        properties: Vec<(String, Expression)>,
        span: Span,
    },

    /// Backtick string interpolation
    Template { parts: Vec<TemplatePart>, span: Span },

    /// Member access (`obj.prop`, `obj?.prop`)
    Member {
        object: Box<Expression>,
        property: String,
        optional: bool,
        span: Span,
    },

    /// Computed member access (`obj[key]`, `obj?.[key]`)
    Index {
        object: Box<Expression>,
        index: Box<Expression>,
        optional: bool,
        span: Span,
    },

    /// Call of a method or arrow function value
    Call {
        callee: Box<Expression>,
        arguments: Vec<Expression>,
        optional: bool,
        span: Span,
    },

    Unary {
        operator: UnaryOp,
        operand: Box<Expression>,
        span: Span,
    },

    Binary {
        left: Box<Expression>,
        operator: BinaryOp,
        right: Box<Expression>,
        span: Span,
    },

    /// `test ? consequent : alternate`
    Conditional {
        test: Box<Expression>,
        consequent: Box<Expression>,
        alternate: Box<Expression>,
        span: Span,
    },

    /// `x => body`, `(a, b) => body`
    Arrow {
        params: Vec<String>,
        body: Box<Expression>,
        span: Span,
    },
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Not,
    Negate,
    Plus,
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Equals,
    NotEquals,
    LessThan,
    LessThanOrEqual,
    GreaterThan,
    GreaterThanOrEqual,
    And,
    Or,
    Coalesce,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Remainder => "%",
            BinaryOp::Equals => "===",
            BinaryOp::NotEquals => "!==",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEqual => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEqual => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Coalesce => "??",
        }
    }
}

/// Template string parts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemplatePart {
    Literal(String),
    Expression(Expression),
}

impl Expression {
    pub fn span(&self) -> Span {
        match self {
            Expression::String { span, .. }
            | Expression::Number { span, .. }
            | Expression::Boolean { span, .. }
            | Expression::Null { span }
            | Expression::Identifier { span, .. }
            | Expression::Array { span, .. }
            | Expression::Object { span, .. }
            | Expression::Template { span, .. }
            | Expression::Member { span, .. }
            | Expression::Index { span, .. }
            | Expression::Call { span, .. }
            | Expression::Unary { span, .. }
            | Expression::Binary { span, .. }
            | Expression::Conditional { span, .. }
            | Expression::Arrow { span, .. } => *span,
        }
    }

    /// Identifiers the expression reads from its environment.
    ///
    /// Arrow parameters are bound locally and are not reported.
    pub fn free_identifiers(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        let mut bound = Vec::new();
        self.collect_free(&mut bound, &mut names);
        names
    }

    fn collect_free(&self, bound: &mut Vec<String>, names: &mut BTreeSet<String>) {
        match self {
            Expression::String { .. }
            | Expression::Number { .. }
            | Expression::Boolean { .. }
            | Expression::Null { .. } => {}
            Expression::Identifier { name, .. } => {
                if !bound.iter().any(|b| b == name) {
                    names.insert(name.clone());
                }
            }
            Expression::Array { elements, .. } => {
                for element in elements {
                    element.collect_free(bound, names);
                }
            }
            Expression::Object { properties, .. } => {
                for (_, value) in properties {
                    value.collect_free(bound, names);
                }
            }
            Expression::Template { parts, .. } => {
                for part in parts {
                    if let TemplatePart::Expression(expr) = part {
                        expr.collect_free(bound, names);
                    }
                }
            }
            Expression::Member { object, .. } => object.collect_free(bound, names),
            Expression::Index { object, index, .. } => {
                object.collect_free(bound, names);
                index.collect_free(bound, names);
            }
            Expression::Call {
                callee, arguments, ..
            } => {
                callee.collect_free(bound, names);
                for argument in arguments {
                    argument.collect_free(bound, names);
                }
            }
            Expression::Unary { operand, .. } => operand.collect_free(bound, names),
            Expression::Binary { left, right, .. } => {
                left.collect_free(bound, names);
                right.collect_free(bound, names);
            }
            Expression::Conditional {
                test,
                consequent,
                alternate,
                ..
            } => {
                test.collect_free(bound, names);
                consequent.collect_free(bound, names);
                alternate.collect_free(bound, names);
            }
            Expression::Arrow { params, body, .. } => {
                let depth = bound.len();
                bound.extend(params.iter().cloned());
                body.collect_free(bound, names);
                bound.truncate(depth);
            }
        }
    }
}
