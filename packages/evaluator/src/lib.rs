//! Computed-value evaluator for metaform templates.
//!
//! Expressions are parsed by `metaform-parser` and interpreted over runtime
//! [`Value`]s. Identifiers resolve only to the contexts a descriptor declares
//! or to arrow-function parameters.

pub mod builtins;
pub mod context;
pub mod date;
pub mod error;
pub mod evaluator;
pub mod interpreter;
pub mod scope;
pub mod units;
pub mod value;

#[cfg(test)]
mod tests_expressions;

#[cfg(test)]
mod tests_fallback;

pub use context::ContextBundle;
pub use error::{EvalError, EvalResult};
pub use evaluator::{apply_transform, evaluate, evaluate_computed, evaluate_source, evaluate_strict, Evaluation};
pub use interpreter::Interpreter;
pub use scope::Scope;
pub use units::pair_with_unit;
pub use value::{Closure, DateHelper, Value};
