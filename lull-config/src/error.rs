//! Errors raised while loading [`LullConfig`](crate::LullConfig).

use std::path::PathBuf;

use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested file does not exist.
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    /// Values parsed but broke a rule. Lists every offending field by its
    /// dotted path, e.g. `net.backlog`.
    #[error("Invalid configuration:\n{}", describe(.0))]
    Validation(#[source] ValidationErrors),

    /// A layer could not be read or did not deserialize.
    #[error("Configuration parsing error: {0}")]
    Parsing(#[source] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        ConfigError::Parsing(Box::new(error))
    }
}

impl From<ValidationErrors> for ConfigError {
    fn from(errors: ValidationErrors) -> Self {
        ConfigError::Validation(errors)
    }
}

fn describe(errors: &ValidationErrors) -> String {
    let mut lines = Vec::new();
    collect("", errors, &mut lines);
    lines.sort();
    lines.join("\n")
}

fn collect(prefix: &str, errors: &ValidationErrors, lines: &mut Vec<String>) {
    for (name, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        };
        match kind {
            ValidationErrorsKind::Field(failures) => {
                for failure in failures {
                    let reason = failure.message.as_ref().unwrap_or(&failure.code);
                    lines.push(format!("  - {path}: {reason}"));
                }
            }
            ValidationErrorsKind::Struct(inner) => collect(&path, inner, lines),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    collect(&format!("{path}[{index}]"), inner, lines);
                }
            }
        }
    }
}
