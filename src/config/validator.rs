//! Validation of a loaded session and of plans against it.

use std::collections::BTreeSet;
use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::planner::Plan;

use super::session::Session;

/// Transport protocols libvirt accepts in a remote URI.
const KNOWN_PROTOCOLS: &[&str] = &["ssh", "tcp", "tls", "unix"];

/// Validator for sessions and plans.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a session.
    ///
    /// # Errors
    ///
    /// Returns the first validation error if any check fails.
    pub fn validate(&self, session: &Session) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_connection(session, &mut result);
        Self::validate_defaults(session, &mut result);

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }
            .into())
        }
    }

    /// Checks a plan against the session's profiles.
    ///
    /// Problems in a plan only affect individual entries, so they are
    /// reported as warnings.
    #[must_use]
    pub fn check_plan(&self, plan: &Plan, session: &Session) -> ValidationResult {
        let mut result = ValidationResult::default();

        if plan.is_empty() {
            result.warnings.push(format!("Plan {} has no entries", plan.name));
        }

        for entry in &plan.entries {
            if entry.name.trim().is_empty() {
                result.warnings.push(String::from("Plan has an entry with an empty name"));
            }
            if let Some(message) = entry.spec.malformed.as_deref() {
                result.warnings.push(format!("{} will not be deployed: {message}", entry.name));
            }
        }

        let unknown: BTreeSet<&str> = plan
            .referenced_profiles()
            .filter(|profile| !session.profiles.contains_key(*profile))
            .collect();
        for profile in unknown {
            result
                .warnings
                .push(format!("Plan {} references unknown profile {profile}", plan.name));
        }

        result
    }

    fn validate_connection(session: &Session, result: &mut ValidationResult) {
        let connection = &session.connection;
        let field = format!("{}.protocol", session.client);

        if connection.url.is_none()
            && !connection.is_local()
            && !KNOWN_PROTOCOLS.contains(&connection.protocol.as_str())
        {
            result.errors.push(ValidationError {
                field,
                message: format!(
                    "Unknown protocol '{}'. Expected one of: {}",
                    connection.protocol,
                    KNOWN_PROTOCOLS.join(", ")
                ),
            });
        }

        if connection.host.trim().is_empty() {
            result.errors.push(ValidationError {
                field: format!("{}.host", session.client),
                message: String::from("Host cannot be empty"),
            });
        }
    }

    fn validate_defaults(session: &Session, result: &mut ValidationResult) {
        let defaults = &session.defaults;

        if defaults.numcpus == 0 {
            result.errors.push(ValidationError {
                field: String::from("default.numcpus"),
                message: String::from("numcpus must be at least 1"),
            });
        }
        if defaults.memory == 0 {
            result.errors.push(ValidationError {
                field: String::from("default.memory"),
                message: String::from("memory must be at least 1 MB"),
            });
        }
        if defaults.nets.is_empty() {
            result.warnings.push(String::from(
                "No default network; VMs get no NIC unless a profile sets nets",
            ));
        }
        if defaults.disks.is_empty() {
            result.warnings.push(String::from("No default disks"));
        }
        if defaults.pool.trim().is_empty() {
            result.errors.push(ValidationError {
                field: String::from("default.pool"),
                message: String::from("Pool cannot be empty"),
            });
        }
    }
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientsFile, Profiles, VmSpec};
    use crate::planner::PlanEntry;

    fn session() -> Session {
        let mut profiles = Profiles::new();
        profiles.insert(String::from("centos"), VmSpec::default());
        Session::from_documents("kcli.yml", &ClientsFile::local(), profiles).unwrap()
    }

    #[test]
    fn test_local_session_is_valid() {
        let result = ConfigValidator::new().validate(&session()).unwrap();
        assert!(result.is_valid());
    }

    #[test]
    fn test_unknown_protocol() {
        let mut session = session();
        session.connection.host = String::from("10.0.0.2");
        session.connection.protocol = String::from("telnet");

        let err = ConfigValidator::new().validate(&session).unwrap_err();
        assert!(err.to_string().contains("telnet"));
    }

    #[test]
    fn test_zero_cpus() {
        let mut session = session();
        session.defaults.numcpus = 0;
        assert!(ConfigValidator::new().validate(&session).is_err());
    }

    #[test]
    fn test_plan_with_unknown_profile_warns() {
        let plan = Plan::new(
            "lab",
            vec![
                PlanEntry::new(
                    "web",
                    VmSpec {
                        profile: Some(String::from("centos")),
                        ..VmSpec::default()
                    },
                ),
                PlanEntry::new(
                    "db",
                    VmSpec {
                        profile: Some(String::from("fedora")),
                        ..VmSpec::default()
                    },
                ),
            ],
        );

        let result = ConfigValidator::new().check_plan(&plan, &session());
        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("fedora"));
    }

    #[test]
    fn test_plan_with_malformed_entry_warns() {
        let plan = Plan::new(
            "lab",
            vec![PlanEntry::new(
                "bad",
                VmSpec {
                    malformed: Some(String::from("nets: expected a sequence")),
                    ..VmSpec::default()
                },
            )],
        );

        let result = ConfigValidator::new().check_plan(&plan, &session());
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].starts_with("bad will not be deployed"));
    }

    #[test]
    fn test_defaults_without_nets_warn() {
        let mut session = session();
        session.defaults.nets.clear();
        let result = ConfigValidator::new().validate(&session).unwrap();
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].starts_with("No default network"));
    }
}
