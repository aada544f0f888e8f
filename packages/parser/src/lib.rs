//! # metaform expression parser
//!
//! Parses the restricted expression language used by computed field
//! descriptors. There are no statements, assignments or loops: an expression
//! is a tree of literals, context reads, operators, method calls and arrow
//! functions, which the evaluator interprets against an explicit binding set.

pub mod ast;
pub mod error;
pub mod parser;
pub mod tokenizer;

pub use ast::{BinaryOp, Expression, Span, TemplatePart, UnaryOp};
#[cfg(feature = "pretty-errors")]
pub use error::format_error;
pub use error::{ParseError, ParseResult};
pub use parser::{parse_expression, Parser};
pub use tokenizer::{tokenize, Token};
