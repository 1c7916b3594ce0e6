// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden
#![warn(unused_imports)]              // Unused imports
#![warn(unused_variables)]            // Unused variables
#![warn(dead_code)]                   // Unused code

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # kvirt
//!
//! A libvirt front end that creates virtual machines from named profiles
//! and manages groups of them as plans.
//!
//! ## Overview
//!
//! - Configure one or more hypervisors ("clients") in `~/kcli.yml`
//! - Describe reusable VM shapes as profiles in `~/kcli_profiles.yml`
//! - Deploy, start, stop and delete whole plans described in a plan file
//!
//! ## Resolution
//!
//! Every VM parameter is taken from the first tier that sets it:
//!
//! 1. **Explicit**: the plan entry or the command line
//! 2. **Profile**: the profile the entry references
//! 3. **Default**: the selected client, the `default` section, then
//!    built-in values
//!
//! ## Modules
//!
//! - [`config`]: Configuration documents, session and validation
//! - [`resolver`]: Tier precedence and parameter coercion
//! - [`hypervisor`]: Hypervisor abstraction and the virsh backend
//! - [`planner`]: Plan model and batch execution
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! # kcli_plan.yml
//! web:
//!   profile: centos
//!   ips:
//!     - 192.168.122.10
//! db:
//!   profile: centos
//!   memory: 2048
//!   disks:
//!     - 20
//!     - size: 50
//!       pool: fast
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod hypervisor;
pub mod planner;
pub mod resolver;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, Session};
pub use error::{KvirtError, Result};
pub use hypervisor::{Hypervisor, VirshHypervisor};
pub use planner::{PlanExecutor, PlanReport};
pub use resolver::{ConfigResolver, ParameterSet};
