// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

/// Errors that make a pipeline configuration unusable before any workflow runs
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A circular dependency was detected between workflows
    CyclicDependency {
        /// The cycle path showing the circular dependency
        cycle: Vec<String>,
    },
    /// A `workflow:<name>` reference (or a requested workflow) could not be materialized
    UnknownWorkflow {
        /// The missing workflow name
        name: String,
        /// The workflow that referenced it, if any
        referenced_by: Option<String>,
    },
    /// Two workflows share the same name
    DuplicateWorkflow {
        /// The duplicate workflow name
        name: String,
    },
    /// A step names a custom verb that is not registered
    UnknownVerb {
        /// The workflow containing the step
        workflow: String,
        /// The verb name
        verb: String,
    },
    /// A blob storage or cache was configured without a container
    MissingContainerName {
        /// Which configuration section was missing it (`storage` or `cache`)
        section: String,
    },
    /// A blob storage or cache was configured without usable credentials
    MissingCredentials {
        /// The container that could not be authenticated
        container: String,
    },
    /// Only utf-8 text is supported by storage backends
    UnsupportedEncoding {
        /// The requested encoding
        encoding: String,
    },
    /// A configuration value is out of its accepted range
    InvalidValue {
        /// Dotted path of the offending field
        field: String,
        /// Human readable reason
        reason: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::CyclicDependency { cycle } => {
                write!(f, "Cyclic workflow dependency detected: {}", cycle.join(" -> "))
            }
            ValidationError::UnknownWorkflow {
                name,
                referenced_by: Some(parent),
            } => {
                write!(
                    f,
                    "Workflow '{}' depends on '{}' which is neither configured nor built in",
                    parent, name
                )
            }
            ValidationError::UnknownWorkflow {
                name,
                referenced_by: None,
            } => {
                write!(f, "Workflow '{}' is neither configured nor built in", name)
            }
            ValidationError::DuplicateWorkflow { name } => {
                write!(f, "Duplicate workflow name: '{}'", name)
            }
            ValidationError::UnknownVerb { workflow, verb } => {
                write!(f, "Workflow '{}' uses unknown verb '{}'", workflow, verb)
            }
            ValidationError::MissingContainerName { section } => {
                write!(f, "Blob {} configuration requires a container_name", section)
            }
            ValidationError::MissingCredentials { container } => {
                write!(
                    f,
                    "Blob container '{}' requires either a connection_string or an account_url with account credentials",
                    container
                )
            }
            ValidationError::UnsupportedEncoding { encoding } => {
                write!(f, "Unsupported text encoding '{}', only utf-8 is supported", encoding)
            }
            ValidationError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{}': {}", field, reason)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised while reading a pipeline configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("environment variable '{0}' referenced by the config is not set")]
    MissingEnvVar(String),

    #[error("configuration validation failed:\n{}", join_errors(.0))]
    Invalid(Vec<ValidationError>),
}

impl From<ValidationError> for ConfigError {
    fn from(error: ValidationError) -> Self {
        ConfigError::Invalid(vec![error])
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let cases = vec![
            (
                ValidationError::CyclicDependency {
                    cycle: vec!["a".into(), "b".into(), "a".into()],
                },
                "Cyclic workflow dependency detected: a -> b -> a",
            ),
            (
                ValidationError::UnknownWorkflow {
                    name: "x".into(),
                    referenced_by: Some("y".into()),
                },
                "Workflow 'y' depends on 'x' which is neither configured nor built in",
            ),
            (
                ValidationError::MissingContainerName {
                    section: "storage".into(),
                },
                "Blob storage configuration requires a container_name",
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.to_string(), expected);
        }
    }

    #[test]
    fn test_invalid_joins_all_errors() {
        let error = ConfigError::Invalid(vec![
            ValidationError::DuplicateWorkflow { name: "a".into() },
            ValidationError::DuplicateWorkflow { name: "b".into() },
        ]);
        let text = error.to_string();
        assert!(text.contains("'a'"));
        assert!(text.contains("'b'"));
    }
}
