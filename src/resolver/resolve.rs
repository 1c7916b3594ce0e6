//! Tier precedence and per-VM parameter resolution.
//!
//! Every field is taken from the first tier that has it: explicit values
//! (plan entry or command line), then the referenced profile, then the
//! default tier. Fields with a default can never end up empty; the others
//! stay `None` when neither the explicit tier nor the profile sets them.

use tracing::debug;

use crate::config::{DefaultTier, Profiles, Session, VmSpec};
use crate::error::ResolveError;

use super::params::{DiskSpec, ParameterSet, Tagging};
use super::scripts::ScriptExpander;
use super::value::ScalarValue;

/// Picks the value of `field` from the highest-precedence tier that has one.
///
/// # Errors
///
/// Returns `MissingRequiredField` when no tier has a value and `required`
/// is set.
pub fn resolve<T>(
    field: &str,
    explicit: Option<T>,
    profile: Option<T>,
    default: Option<T>,
    required: bool,
) -> Result<Option<T>, ResolveError> {
    match explicit.or(profile).or(default) {
        Some(value) => Ok(Some(value)),
        None if required => Err(ResolveError::MissingRequiredField {
            field: field.to_string(),
        }),
        None => Ok(None),
    }
}

/// Resolves a field that always has a default.
fn required<T>(
    field: &str,
    explicit: Option<T>,
    profile: Option<T>,
    default: T,
) -> Result<T, ResolveError> {
    resolve(field, explicit, profile, Some(default), true)?.ok_or_else(|| {
        ResolveError::MissingRequiredField {
            field: field.to_string(),
        }
    })
}

/// Resolves a field with no default.
fn optional<T>(
    field: &str,
    explicit: Option<T>,
    profile: Option<T>,
) -> Result<Option<T>, ResolveError> {
    resolve(field, explicit, profile, None, false)
}

/// Merges configuration tiers into parameter sets.
#[derive(Debug)]
pub struct ConfigResolver<'a> {
    /// Lowest-precedence tier.
    defaults: &'a DefaultTier,
    /// Named profiles.
    profiles: &'a Profiles,
    /// Script reader.
    scripts: ScriptExpander,
}

impl<'a> ConfigResolver<'a> {
    /// Creates a resolver over the given default tier and profiles.
    #[must_use]
    pub fn new(defaults: &'a DefaultTier, profiles: &'a Profiles) -> Self {
        Self {
            defaults,
            profiles,
            scripts: ScriptExpander::new(),
        }
    }

    /// Creates a resolver over a session's defaults and profiles.
    #[must_use]
    pub fn from_session(session: &'a Session) -> Self {
        Self::new(&session.defaults, &session.profiles)
    }

    /// Replaces the script expander.
    #[must_use]
    pub fn with_scripts(mut self, scripts: ScriptExpander) -> Self {
        self.scripts = scripts;
        self
    }

    /// Looks up a profile by name.
    ///
    /// # Errors
    ///
    /// Returns `ProfileNotFound` if no profile has that name.
    pub fn profile(&self, name: &str) -> Result<&'a VmSpec, ResolveError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ResolveError::ProfileNotFound {
                name: name.to_string(),
            })
    }

    /// Resolves one VM from its explicit values and optional profile.
    ///
    /// `ips` is only ever taken from the explicit tier.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFieldType` when a numeric or boolean field cannot be
    /// coerced, or `MissingRequiredField` if a defaulted field is empty.
    pub fn resolve_vm(
        &self,
        explicit: &VmSpec,
        profile: Option<&VmSpec>,
        tagging: Tagging,
    ) -> Result<ParameterSet, ResolveError> {
        let empty = VmSpec::default();
        let e = explicit;
        let p = profile.unwrap_or(&empty);
        let d = self.defaults;

        if let Some(message) = e.malformed.as_ref().or(p.malformed.as_ref()) {
            return Err(ResolveError::MalformedEntry {
                message: message.clone(),
            });
        }

        let numcpus = required(
            "numcpus",
            e.numcpus.clone(),
            p.numcpus.clone(),
            ScalarValue::from(d.numcpus),
        )?
        .to_u32("numcpus")?;
        let memory = required(
            "memory",
            e.memory.clone(),
            p.memory.clone(),
            ScalarValue::from(d.memory),
        )?
        .to_u32("memory")?;
        let disksize = required(
            "disksize",
            e.disksize.clone(),
            p.disksize.clone(),
            ScalarValue::from(d.disksize),
        )?
        .to_u32("disksize")?;
        let diskthin = required(
            "diskthin",
            e.diskthin.clone(),
            p.diskthin.clone(),
            ScalarValue::from(d.diskthin),
        )?
        .to_bool("diskthin")?;
        let vnc = required("vnc", e.vnc.clone(), p.vnc.clone(), ScalarValue::from(d.vnc))?
            .to_bool("vnc")?;
        let cloudinit = required(
            "cloudinit",
            e.cloudinit.clone(),
            p.cloudinit.clone(),
            ScalarValue::from(d.cloudinit),
        )?
        .to_bool("cloudinit")?;
        let start = required(
            "start",
            e.start.clone(),
            p.start.clone(),
            ScalarValue::from(d.start),
        )?
        .to_bool("start")?;

        let disks = match optional("disks", e.disks.as_deref(), p.disks.as_deref())? {
            Some(specs) => DiskSpec::to_disks(specs)?,
            None => d.disks.clone(),
        };

        let scripts = optional("scripts", e.scripts.clone(), p.scripts.clone())?;
        let mut cmds = optional("cmds", e.cmds.clone(), p.cmds.clone())?;
        if let Some(paths) = scripts.as_deref() {
            cmds = self.scripts.expand(cmds, paths);
        }

        let params = ParameterSet {
            description: tagging.description,
            title: tagging.title,
            pool: required("pool", e.pool.clone(), p.pool.clone(), d.pool.clone())?,
            template: optional("template", e.template.clone(), p.template.clone())?,
            numcpus,
            memory,
            disks,
            disksize,
            diskinterface: required(
                "diskinterface",
                e.diskinterface.clone(),
                p.diskinterface.clone(),
                d.diskinterface.clone(),
            )?,
            diskthin,
            guestid: required("guestid", e.guestid.clone(), p.guestid.clone(), d.guestid.clone())?,
            nets: required("nets", e.nets.clone(), p.nets.clone(), d.nets.clone())?,
            iso: optional("iso", e.iso.clone(), p.iso.clone())?,
            vnc,
            cloudinit,
            start,
            keys: optional("keys", e.keys.clone(), p.keys.clone())?,
            cmds,
            ips: optional("ips", e.ips.clone(), None)?,
            netmasks: optional("netmasks", e.netmasks.clone(), p.netmasks.clone())?,
            gateway: optional("gateway", e.gateway.clone(), p.gateway.clone())?,
            dns: optional("dns", e.dns.clone(), p.dns.clone())?,
            domain: optional("domain", e.domain.clone(), p.domain.clone())?,
            scripts,
        };

        debug!(
            "Resolved parameters for {}: {} cpus, {} MB, pool {}",
            params.title, params.numcpus, params.memory, params.pool
        );
        Ok(params)
    }
}
