//! Template model for metaform.
//!
//! A [`Template`] is an ordered tree of groups and [`Field`]s loaded from
//! JSON configuration. Fields carry literal or computed defaults, option
//! sources, document queries and named variants made of
//! [`SubclassOperation`]s. Answers collected against a template are kept in
//! an [`AnswerSet`].

pub mod answers;
pub mod descriptor;
pub mod error;
pub mod field;
pub mod path;
pub mod query;
pub mod subclass;
pub mod template;

pub use answers::AnswerSet;
pub use descriptor::{ActionDescriptor, ComputedDescriptor, ContextName, ValueDescriptor};
pub use error::{TemplateError, TemplateResult, TemplateWarning};
pub use field::{Field, FieldKind, UnitSpec};
pub use path::FieldPath;
pub use query::{Condition, Predicate, QueryMode, QuerySpec};
pub use subclass::{PositionHint, SubclassOperation};
pub use template::{Group, Template, TemplateNode};
