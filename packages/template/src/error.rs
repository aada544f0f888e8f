use crate::path::FieldPath;
use thiserror::Error;

pub type TemplateResult<T> = Result<T, TemplateError>;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Unsupported field kind '{kind}' at '{path}'")]
    UnsupportedFieldKind { path: FieldPath, kind: String },

    #[error("Invalid field at '{path}': {message}")]
    InvalidField { path: FieldPath, message: String },

    #[error("Expected a group or a field at '{path}'")]
    InvalidNode { path: FieldPath },

    #[error("Cannot place a node at '{path}': '{blocking}' is a field, not a group")]
    NotAGroup { path: FieldPath, blocking: FieldPath },

    #[error("Reactive dependency cycle: {}", format_cycle(cycle))]
    DependencyCycle { cycle: Vec<FieldPath> },

    #[error("Empty field path")]
    EmptyPath,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn format_cycle(cycle: &[FieldPath]) -> String {
    cycle
        .iter()
        .map(FieldPath::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Non-fatal problem found while validating a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateWarning {
    pub path: FieldPath,
    pub message: String,
}

impl std::fmt::Display for TemplateWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}
