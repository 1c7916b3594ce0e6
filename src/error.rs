//! Error types for kvirt.
//!
//! Errors are grouped by the layer that raises them: configuration loading,
//! parameter resolution, the hypervisor adapter and plan execution.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for kvirt.
#[derive(Debug, Error)]
pub enum KvirtError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Parameter resolution errors.
    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),

    /// Hypervisor errors.
    #[error("Hypervisor error: {0}")]
    Hypervisor(#[from] HypervisorError),

    /// Plan errors.
    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// The `default` section or its `client` key is missing.
    #[error("Missing default section in config file")]
    MissingDefaultSection,

    /// The selected client has no section of its own.
    #[error("Missing section for client {client} in config file")]
    MissingClientSection {
        /// Name of the selected client.
        client: String,
    },

    /// A client named on the command line is not configured.
    #[error("Client {client} not found in config")]
    UnknownClient {
        /// The requested client.
        client: String,
    },
}

/// Errors raised while merging configuration tiers into a parameter set.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// A required field has no value at any tier.
    #[error("Missing required field: {field}")]
    MissingRequiredField {
        /// Name of the field.
        field: String,
    },

    /// A value cannot be coerced to the field's type.
    #[error("Invalid value '{value}' for field {field}: expected {expected}")]
    InvalidFieldType {
        /// Name of the field.
        field: String,
        /// The offending value, as written.
        value: String,
        /// The expected type.
        expected: &'static str,
    },

    /// A profile reference has no matching entry.
    #[error("Invalid profile {name}")]
    ProfileNotFound {
        /// The referenced profile name.
        name: String,
    },

    /// An entry could not be read from its document.
    #[error("Invalid entry: {message}")]
    MalformedEntry {
        /// What is wrong with the entry.
        message: String,
    },

    /// A script listed in `scripts` does not exist. Never fatal.
    #[error("Script {path} not found. Ignoring...")]
    ScriptNotFound {
        /// Path to the missing script.
        path: PathBuf,
    },
}

/// Errors reported by the hypervisor adapter.
#[derive(Debug, Error)]
pub enum HypervisorError {
    /// The hypervisor could not be reached.
    #[error("Couldn't connect to hypervisor {uri}: {message}")]
    ConnectionFailed {
        /// Connection URI that was tried.
        uri: String,
        /// Description of the failure.
        message: String,
    },

    /// An external tool exited unsuccessfully.
    #[error("{command} failed: {stderr}")]
    CommandFailed {
        /// The command line that failed.
        command: String,
        /// Captured standard error.
        stderr: String,
    },

    /// The VM does not exist.
    #[error("VM {name} not found")]
    VmNotFound {
        /// Name of the VM.
        name: String,
    },

    /// An argument is unusable for the requested operation.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },
}

/// Plan errors.
#[derive(Debug, Error)]
pub enum PlanError {
    /// Deleting with an empty plan name would hit every untagged VM.
    #[error("That would delete every vm...Not doing that")]
    UntaggedDelete,

    /// The plan file was not found.
    #[error("No input file found at {path}")]
    PlanFileNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },
}

/// Result type alias for kvirt operations.
pub type Result<T> = std::result::Result<T, KvirtError>;

impl KvirtError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a parse error for a file.
    #[must_use]
    pub fn parse(message: impl Into<String>, location: impl Into<String>) -> Self {
        Self::ParseError {
            message: message.into(),
            location: Some(location.into()),
        }
    }
}

impl ResolveError {
    /// Creates an invalid field type error.
    #[must_use]
    pub fn invalid(field: &str, value: impl Into<String>, expected: &'static str) -> Self {
        Self::InvalidFieldType {
            field: field.to_string(),
            value: value.into(),
            expected,
        }
    }
}

impl HypervisorError {
    /// Creates a command failure.
    #[must_use]
    pub fn command(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            stderr: stderr.into(),
        }
    }

    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrapped_messages() {
        let err = KvirtError::from(ResolveError::ProfileNotFound {
            name: String::from("centos"),
        });
        assert_eq!(err.to_string(), "Resolution error: Invalid profile centos");

        let err = KvirtError::from(ConfigError::MissingDefaultSection);
        assert!(matches!(err, KvirtError::Config(_)));
    }
}
