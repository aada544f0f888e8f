use crate::store::StoreError;
use metaform_template::{FieldPath, TemplateError};
use thiserror::Error;

pub type SessionResult<T> = Result<T, SessionError>;
pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("No field at '{path}'")]
    UnknownField { path: FieldPath },

    #[error("Field '{path}' is not a variant selector")]
    NotAVariantSelector { path: FieldPath },

    #[error("Variant selector '{path}' has no variant named '{name}'")]
    UnknownVariant { path: FieldPath, name: String },

    #[error("Field '{path}' declares no action")]
    NoAction { path: FieldPath },

    #[error("Invalid template: {0}")]
    Template(#[from] TemplateError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template '{name}': {source}")]
    Template {
        name: String,
        #[source]
        source: TemplateError,
    },

    #[error("Template '{name}', variant '{variant}': {source}")]
    Variant {
        name: String,
        variant: String,
        #[source]
        source: TemplateError,
    },

    #[error("Unknown template '{name}'")]
    UnknownTemplate { name: String },

    #[error("Document store: {0}")]
    Store(#[from] StoreError),
}
