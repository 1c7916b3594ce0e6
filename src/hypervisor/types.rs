//! Types exchanged with the hypervisor.

use serde::Serialize;

/// A VM as listed by the hypervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VmInfo {
    /// Domain name.
    pub name: String,
    /// Domain state (running, shut off...).
    pub status: String,
    /// Addresses reported for the domain's interfaces.
    pub ips: Vec<String>,
    /// Image the first disk was created from.
    pub source: String,
    /// Plan tag recorded at creation.
    pub description: String,
    /// Profile recorded at creation.
    pub profile: String,
}

/// Result of a creation request the hypervisor processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result")]
pub enum CreateOutcome {
    /// The VM was created.
    #[serde(rename = "success")]
    Created,
    /// The hypervisor refused; `reason` is shown to the user as is.
    #[serde(rename = "failure")]
    Rejected {
        /// Reason given by the hypervisor.
        reason: String,
    },
}

/// Storage pool backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum PoolType {
    /// A directory of image files.
    #[default]
    Dir,
    /// An LVM volume group.
    Logical,
}

impl VmInfo {
    /// Creates an entry with only a name and status.
    #[must_use]
    pub fn new(name: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: status.into(),
            ips: Vec::new(),
            source: String::new(),
            description: String::new(),
            profile: String::new(),
        }
    }

    /// Sets the plan tag.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

impl CreateOutcome {
    /// Creates a rejection.
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }
}

impl PoolType {
    /// Picks the pool type for a path: `/dev` paths are volume groups.
    #[must_use]
    pub fn for_path(path: &str) -> Self {
        if path.contains("/dev") {
            Self::Logical
        } else {
            Self::Dir
        }
    }

    /// Name used by libvirt.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dir => "dir",
            Self::Logical => "logical",
        }
    }
}

impl std::fmt::Display for PoolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
