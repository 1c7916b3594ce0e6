//! Plan model.

use serde::Serialize;

use crate::config::VmSpec;

/// Plan name used when none is given.
pub const DEFAULT_PLAN_NAME: &str = "kvirt";

/// Plan file used when none is given.
pub const DEFAULT_PLAN_FILE: &str = "kcli_plan.yml";

/// A named batch of VM specifications.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// Plan name; recorded as the description of every VM it creates.
    pub name: String,
    /// Entries in document order.
    pub entries: Vec<PlanEntry>,
}

/// One VM of a plan.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntry {
    /// VM name.
    pub name: String,
    /// Explicit values, possibly referencing a profile.
    pub spec: VmSpec,
}

/// What to do with a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanAction {
    /// Create every entry.
    Deploy,
    /// Start every VM tagged with the plan.
    Start,
    /// Stop every VM tagged with the plan.
    Stop,
    /// Delete every VM tagged with the plan.
    Delete,
}

impl Plan {
    /// Creates a plan.
    #[must_use]
    pub fn new(name: impl Into<String>, entries: Vec<PlanEntry>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }

    /// Returns true if the plan has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Names of the profiles referenced by entries, in entry order.
    pub fn referenced_profiles(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter_map(|entry| entry.spec.profile.as_deref())
    }
}

impl PlanEntry {
    /// Creates an entry.
    #[must_use]
    pub fn new(name: impl Into<String>, spec: VmSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }
}

impl std::fmt::Display for PlanAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Deploy => "deploy",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Delete => "delete",
        };
        write!(f, "{s}")
    }
}

impl PlanAction {
    /// Past participle used in progress messages.
    #[must_use]
    pub const fn done_verb(self) -> &'static str {
        match self {
            Self::Deploy => "deployed",
            Self::Start => "started",
            Self::Stop => "stopped",
            Self::Delete => "deleted",
        }
    }
}
