//! Parameter resolution for VM creation.
//!
//! This module merges the explicit, profile and default tiers into a
//! [`ParameterSet`]:
//! - Per-field precedence and required/optional rules
//! - Coercion of loosely typed scalars after resolution
//! - Expansion of script files into first boot commands

mod params;
mod resolve;
mod scripts;
mod value;

pub use params::{Disk, DiskSpec, ParameterSet, Tagging};
pub use resolve::{resolve, ConfigResolver};
pub use scripts::ScriptExpander;
pub use value::ScalarValue;
