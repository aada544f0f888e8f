//! Template resolution engine for metaform.
//!
//! Merges variant operation sets into a base [`Template`](metaform_template::Template),
//! tracks reactive dependencies between fields, resolves document queries
//! against an injected [`DocumentStore`] and drives a [`FormSession`] from
//! first render to submit.

pub mod config;
pub mod dependency;
pub mod error;
pub mod merge;
pub mod query;
pub mod session;
pub mod store;
pub mod variant;

#[cfg(test)]
mod tests_session;

pub use config::{validate_template, Configuration};
pub use dependency::{affected_fields, affected_options, check_cycles, DependencyGraph};
pub use error::{ConfigError, ConfigResult, SessionError, SessionResult};
pub use merge::{merge, restore_answers};
pub use query::{FieldOption, MetadataCache, QueryResolver};
pub use session::{Diagnostic, FieldState, FieldUpdate, FormSession};
pub use store::{Document, DocumentStore, MemoryStore, StoreError, StoreResult, StoredDocument};
pub use variant::{discover_selectors, resolve_variants, VariantSelector, VariantState};
