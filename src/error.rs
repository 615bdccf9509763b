//! Error types for schema generation

use std::path::PathBuf;

use thiserror::Error;

use crate::schema::Diagnostics;

/// Result type for schema generation
pub type Result<T> = std::result::Result<T, SchemaGenError>;

/// Schema generation errors
#[derive(Error, Debug)]
pub enum SchemaGenError {
    /// Missing global metadata, bad paths, unresolvable sublayers.
    #[error("{0}")]
    Config(String),

    #[error("Syntax error in {file} at line {line}, column {column}: {message}")]
    Parse {
        file: String,
        line: usize,
        column: usize,
        message: String,
    },

    /// A single structural problem raised outside the class/property pass.
    #[error("Invalid schema definition at <{path}>\n{message}")]
    Definition { path: String, message: String },

    /// Every problem collected while parsing classes and properties.
    #[error("{0}")]
    SchemaDefinition(Diagnostics),

    #[error(
        "Token identifiers must map to exactly one token value. One-to-Many mapping \
         encountered: {id} maps to \"{existing}\" and \"{conflicting}\""
    )]
    TokenConflict {
        id: String,
        existing: String,
        conflicting: String,
    },

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Error in template {template} at line {line}: {message}")]
    Template {
        template: String,
        line: usize,
        message: String,
    },

    #[error("Plugin info error: {0}")]
    PlugInfo(String),

    #[error("validation failed, {reason}: {}. Please rerun schemagen.", path.display())]
    ValidationFailed { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Settings(#[from] config_crate::ConfigError),
}

impl SchemaGenError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn definition(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Definition {
            path: path.into(),
            message: message.into(),
        }
    }
}
