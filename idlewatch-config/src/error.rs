//! Error types for configuration loading and validation

use std::path::PathBuf;
use thiserror::Error;
use validator::{ValidationErrors, ValidationErrorsKind};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Invalid configuration:\n{}", format_validation_errors(.0))]
    Validation(#[source] ValidationErrors),

    #[error("Configuration parsing error: {0}")]
    Parsing(#[from] figment::Error),

    #[error("Configuration rendering error: {0}")]
    Rendering(#[from] serde_yaml::Error),
}

fn format_validation_errors(errors: &ValidationErrors) -> String {
    let mut output = String::new();
    write_errors(&mut output, "", errors);
    output
}

fn write_errors(output: &mut String, prefix: &str, errors: &ValidationErrors) {
    use std::fmt::Write;

    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{prefix}.{field}")
        };
        match kind {
            ValidationErrorsKind::Field(errors) => {
                let _ = writeln!(output, "Field '{}':", path);
                for error in errors {
                    let message = match &error.message {
                        Some(msg) => msg.to_string(),
                        None => error.code.to_string(),
                    };
                    let _ = writeln!(output, "  - {}", message);
                }
            }
            ValidationErrorsKind::Struct(inner) => write_errors(output, &path, inner),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    write_errors(output, &format!("{path}[{index}]"), inner);
                }
            }
        }
    }
}

impl From<ValidationErrors> for ConfigError {
    fn from(errors: ValidationErrors) -> Self {
        ConfigError::Validation(errors)
    }
}
