//! Configuration module for kvirt.
//!
//! This module handles all configuration-related functionality:
//! - Parsing `kcli.yml`, `kcli_profiles.yml` and plan files
//! - Building the default tier and the per-process [`Session`]
//! - Validation of the selected client and of plans
//! - Generating a configuration for `kcli bootstrap`

mod bootstrap;
mod defaults;
mod parser;
mod session;
mod spec;
mod validator;

pub use bootstrap::{Bootstrap, BOOTSTRAP_NETWORKS};
pub use defaults::DefaultTier;
pub use parser::{write_clients, ConfigParser, CLIENT_ENV, CONFIG_FILE, PROFILES_FILE};
pub use session::{ClientConnection, Session};
pub use spec::{ClientSection, ClientsFile, DefaultSection, Profiles, VmSpec};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
