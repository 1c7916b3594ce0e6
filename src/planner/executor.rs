//! Plan executor for deploying and managing plans.
//!
//! Deploy resolves and creates every entry in order. Start, stop and delete
//! act on the VMs whose description carries the plan name. A failure only
//! affects its own VM; the batch always runs to the end.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{KvirtError, PlanError, ResolveError, Result};
use crate::hypervisor::{CreateOutcome, Hypervisor};
use crate::resolver::{ConfigResolver, ParameterSet, Tagging};

use super::plan::{PlanAction, PlanEntry};

/// Executor for plans.
pub struct PlanExecutor<'a, 's> {
    /// Host the VMs live on.
    hypervisor: &'a dyn Hypervisor,
    /// Resolver for deploy entries.
    resolver: &'a ConfigResolver<'s>,
}

/// Outcome for one VM of a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VmOutcome {
    /// VM name.
    pub name: String,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Failure reason (if failed).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Result of executing a plan.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    /// Plan name.
    pub plan: String,
    /// Action executed.
    pub action: PlanAction,
    /// When execution started.
    pub started_at: DateTime<Utc>,
    /// When execution finished.
    pub finished_at: DateTime<Utc>,
    /// One outcome per VM, in processing order.
    pub outcomes: Vec<VmOutcome>,
}

impl<'a, 's> PlanExecutor<'a, 's> {
    /// Creates a new plan executor.
    #[must_use]
    pub const fn new(hypervisor: &'a dyn Hypervisor, resolver: &'a ConfigResolver<'s>) -> Self {
        Self {
            hypervisor,
            resolver,
        }
    }

    /// Executes `action` for the plan named `plan`.
    ///
    /// `entries` are only used by [`PlanAction::Deploy`].
    ///
    /// # Errors
    ///
    /// Returns `UntaggedDelete` when deleting with an empty plan name, or
    /// the listing error if the VMs of the plan cannot be enumerated.
    pub async fn execute(
        &self,
        plan: &str,
        entries: &[PlanEntry],
        action: PlanAction,
    ) -> Result<PlanReport> {
        if action == PlanAction::Delete && plan.is_empty() {
            return Err(PlanError::UntaggedDelete.into());
        }

        let started_at = Utc::now();
        let outcomes = match action {
            PlanAction::Deploy => self.deploy(plan, entries).await,
            PlanAction::Start | PlanAction::Stop | PlanAction::Delete => {
                self.apply(plan, action).await?
            }
        };

        let report = PlanReport {
            plan: plan.to_string(),
            action,
            started_at,
            finished_at: Utc::now(),
            outcomes,
        };
        info!("{report}");
        Ok(report)
    }

    /// Resolves every entry without touching the hypervisor.
    #[must_use]
    pub fn preview(
        &self,
        plan: &str,
        entries: &[PlanEntry],
    ) -> Vec<(String, std::result::Result<ParameterSet, ResolveError>)> {
        entries
            .iter()
            .map(|entry| (entry.name.clone(), self.resolve_entry(plan, entry)))
            .collect()
    }

    fn resolve_entry(
        &self,
        plan: &str,
        entry: &PlanEntry,
    ) -> std::result::Result<ParameterSet, ResolveError> {
        let profile_name = entry.spec.profile.as_deref();
        let profile = profile_name
            .map(|name| self.resolver.profile(name))
            .transpose()?;
        let tagging = Tagging::new(plan, profile_name.unwrap_or(plan));
        self.resolver.resolve_vm(&entry.spec, profile, tagging)
    }

    async fn deploy(&self, plan: &str, entries: &[PlanEntry]) -> Vec<VmOutcome> {
        info!("Deploying plan {plan} ({} vms)", entries.len());
        let mut outcomes = Vec::with_capacity(entries.len());

        for entry in entries {
            let name = entry.name.as_str();
            let params = match self.resolve_entry(plan, entry) {
                Ok(params) => params,
                Err(e) => {
                    error!("{name} not deployed: {e}");
                    outcomes.push(VmOutcome::failed(name, e.to_string()));
                    continue;
                }
            };

            let outcome = match self.hypervisor.create_vm(name, &params).await {
                Ok(CreateOutcome::Created) => {
                    info!("{name} deployed");
                    VmOutcome::succeeded(name)
                }
                Ok(CreateOutcome::Rejected { reason }) => {
                    error!("{name} not deployed: {reason}");
                    VmOutcome::failed(name, reason)
                }
                Err(e) => {
                    error!("{name} not deployed: {e}");
                    VmOutcome::failed(name, failure_reason(&e))
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }

    async fn apply(&self, plan: &str, action: PlanAction) -> Result<Vec<VmOutcome>> {
        let mut names: Vec<String> = self
            .hypervisor
            .list_vms()
            .await?
            .into_iter()
            .filter(|vm| vm.description == plan)
            .map(|vm| vm.name)
            .collect();
        names.sort();

        if names.is_empty() {
            warn!("No vms found for plan {plan}");
        }

        let mut outcomes = Vec::with_capacity(names.len());
        for name in names {
            let result = match action {
                PlanAction::Start => self.hypervisor.start_vm(&name).await,
                PlanAction::Stop => self.hypervisor.stop_vm(&name).await,
                PlanAction::Delete => self.hypervisor.delete_vm(&name).await,
                PlanAction::Deploy => continue,
            };

            match result {
                Ok(()) => {
                    info!("{name} {}", action.done_verb());
                    outcomes.push(VmOutcome::succeeded(name));
                }
                Err(e) => {
                    error!("Failed to {action} {name}: {e}");
                    let reason = failure_reason(&e);
                    outcomes.push(VmOutcome::failed(name, reason));
                }
            }
        }

        Ok(outcomes)
    }
}

/// The hypervisor's own message, without the error category prefix.
fn failure_reason(error: &KvirtError) -> String {
    match error {
        KvirtError::Hypervisor(e) => e.to_string(),
        other => other.to_string(),
    }
}

impl VmOutcome {
    /// Creates a successful outcome.
    #[must_use]
    pub fn succeeded(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: true,
            reason: None,
        }
    }

    /// Creates a failed outcome.
    #[must_use]
    pub fn failed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: false,
            reason: Some(reason.into()),
        }
    }
}

impl PlanReport {
    /// Number of successful VMs.
    #[must_use]
    pub fn successful(&self) -> usize {
        self.outcomes.iter().filter(|o| o.success).count()
    }

    /// Number of failed VMs.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success).count()
    }

    /// Returns true if no VM was processed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Returns true if every VM succeeded.
    #[must_use]
    pub fn all_successful(&self) -> bool {
        self.failed() == 0
    }
}

impl std::fmt::Display for PlanReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Plan {} {}: {} vms, {} successful, {} failed",
            self.plan,
            self.action,
            self.outcomes.len(),
            self.successful(),
            self.failed()
        )
    }
}

#[cfg(test)]
mod tests {
    use mockall::Sequence;

    use super::*;
    use crate::config::{DefaultTier, Profiles, VmSpec};
    use crate::config::ConfigParser;
    use crate::error::HypervisorError;
    use crate::hypervisor::{MockHypervisor, VmInfo};

    fn profiles() -> Profiles {
        let mut profiles = Profiles::new();
        profiles.insert(
            String::from("centos"),
            VmSpec {
                template: Some(String::from("centos.qcow2")),
                numcpus: Some(4_u32.into()),
                ..VmSpec::default()
            },
        );
        profiles
    }

    fn entry(name: &str, profile: Option<&str>) -> PlanEntry {
        PlanEntry::new(
            name,
            VmSpec {
                profile: profile.map(ToString::to_string),
                ..VmSpec::default()
            },
        )
    }

    fn tagged(name: &str, plan: &str) -> VmInfo {
        VmInfo::new(name, "running").with_description(plan)
    }

    #[tokio::test]
    async fn test_deploy_continues_past_failures() {
        let defaults = DefaultTier::default();
        let profiles = profiles();
        let resolver = ConfigResolver::new(&defaults, &profiles);

        let mut hypervisor = MockHypervisor::new();
        hypervisor
            .expect_create_vm()
            .times(3)
            .returning(|name, _| {
                if name == "two" {
                    Ok(CreateOutcome::rejected("Pool fast not found"))
                } else {
                    Ok(CreateOutcome::Created)
                }
            });

        let entries = vec![entry("one", None), entry("two", None), entry("three", None)];
        let report = PlanExecutor::new(&hypervisor, &resolver)
            .execute("lab", &entries, PlanAction::Deploy)
            .await
            .unwrap();

        let names: Vec<&str> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["one", "two", "three"]);
        assert_eq!(report.outcomes[1], VmOutcome::failed("two", "Pool fast not found"));
        assert!(report.outcomes[2].success);
        assert_eq!(report.successful(), 2);
        assert_eq!(report.failed(), 1);
    }

    #[tokio::test]
    async fn test_deploy_records_transport_errors() {
        let defaults = DefaultTier::default();
        let profiles = profiles();
        let resolver = ConfigResolver::new(&defaults, &profiles);

        let mut hypervisor = MockHypervisor::new();
        hypervisor.expect_create_vm().times(2).returning(|name, _| {
            if name == "one" {
                Err(HypervisorError::command("virt-install", "connection reset").into())
            } else {
                Ok(CreateOutcome::Created)
            }
        });

        let entries = vec![entry("one", None), entry("two", None)];
        let report = PlanExecutor::new(&hypervisor, &resolver)
            .execute("lab", &entries, PlanAction::Deploy)
            .await
            .unwrap();

        assert!(!report.outcomes[0].success);
        assert!(report.outcomes[0]
            .reason
            .as_deref()
            .unwrap()
            .contains("connection reset"));
        assert!(report.outcomes[1].success);
    }

    #[tokio::test]
    async fn test_deploy_tags_with_plan_and_profile() {
        let defaults = DefaultTier::default();
        let profiles = profiles();
        let resolver = ConfigResolver::new(&defaults, &profiles);

        let mut hypervisor = MockHypervisor::new();
        hypervisor
            .expect_create_vm()
            .withf(|name, params| {
                name == "web"
                    && params.description == "lab"
                    && params.title == "centos"
                    && params.numcpus == 4
                    && params.template.as_deref() == Some("centos.qcow2")
            })
            .times(1)
            .returning(|_, _| Ok(CreateOutcome::Created));
        hypervisor
            .expect_create_vm()
            .withf(|name, params| {
                name == "db" && params.description == "lab" && params.title == "lab"
            })
            .times(1)
            .returning(|_, _| Ok(CreateOutcome::Created));

        let entries = vec![entry("web", Some("centos")), entry("db", None)];
        let report = PlanExecutor::new(&hypervisor, &resolver)
            .execute("lab", &entries, PlanAction::Deploy)
            .await
            .unwrap();

        assert!(report.all_successful());
    }

    #[tokio::test]
    async fn test_deploy_invalid_profile_fails_only_that_entry() {
        let defaults = DefaultTier::default();
        let profiles = profiles();
        let resolver = ConfigResolver::new(&defaults, &profiles);

        let mut hypervisor = MockHypervisor::new();
        hypervisor
            .expect_create_vm()
            .withf(|name, _| name != "broken")
            .times(2)
            .returning(|_, _| Ok(CreateOutcome::Created));

        let entries = vec![
            entry("one", Some("centos")),
            entry("broken", Some("fedora")),
            entry("three", None),
        ];
        let report = PlanExecutor::new(&hypervisor, &resolver)
            .execute("lab", &entries, PlanAction::Deploy)
            .await
            .unwrap();

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(
            report.outcomes[1],
            VmOutcome::failed("broken", "Invalid profile fedora")
        );
        assert_eq!(report.successful(), 2);
    }

    #[tokio::test]
    async fn test_deploy_coercion_error_fails_only_that_entry() {
        let defaults = DefaultTier::default();
        let profiles = profiles();
        let resolver = ConfigResolver::new(&defaults, &profiles);

        let mut hypervisor = MockHypervisor::new();
        hypervisor
            .expect_create_vm()
            .withf(|name, _| name == "good")
            .times(1)
            .returning(|_, _| Ok(CreateOutcome::Created));

        let bad = PlanEntry::new(
            "bad",
            VmSpec {
                memory: Some("lots".into()),
                ..VmSpec::default()
            },
        );
        let entries = vec![bad, entry("good", None)];
        let report = PlanExecutor::new(&hypervisor, &resolver)
            .execute("lab", &entries, PlanAction::Deploy)
            .await
            .unwrap();

        assert!(!report.outcomes[0].success);
        assert!(report.outcomes[1].success);
    }

    #[tokio::test]
    async fn test_deploy_unreadable_entries_fail_alone() {
        let defaults = DefaultTier::default();
        let profiles = profiles();
        let resolver = ConfigResolver::new(&defaults, &profiles);

        let yaml = r"
good:
  memory: 512
bad:
  disks:
    - size: big
nonet:
  nets: default
";
        let plan = ConfigParser::new().parse_plan(yaml, "lab", None).unwrap();

        let mut hypervisor = MockHypervisor::new();
        hypervisor
            .expect_create_vm()
            .withf(|name, _| name == "good")
            .times(1)
            .returning(|_, _| Ok(CreateOutcome::Created));

        let report = PlanExecutor::new(&hypervisor, &resolver)
            .execute("lab", &plan.entries, PlanAction::Deploy)
            .await
            .unwrap();

        assert!(report.outcomes[0].success);
        assert_eq!(
            report.outcomes[1],
            VmOutcome::failed("bad", "Invalid value 'big' for field disks: expected an integer")
        );
        assert!(!report.outcomes[2].success);
        assert!(report.outcomes[2]
            .reason
            .as_deref()
            .unwrap()
            .contains("nets"));
    }

    #[tokio::test]
    async fn test_stop_filters_by_plan_in_name_order() {
        let defaults = DefaultTier::default();
        let profiles = profiles();
        let resolver = ConfigResolver::new(&defaults, &profiles);

        let mut hypervisor = MockHypervisor::new();
        hypervisor.expect_list_vms().times(1).returning(|| {
            Ok(vec![
                tagged("zeta", "planA"),
                tagged("beta", "planB"),
                tagged("alpha", "planA"),
            ])
        });
        let mut seq = Sequence::new();
        hypervisor
            .expect_stop_vm()
            .withf(|name| name == "alpha")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        hypervisor
            .expect_stop_vm()
            .withf(|name| name == "zeta")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));

        let report = PlanExecutor::new(&hypervisor, &resolver)
            .execute("planA", &[], PlanAction::Stop)
            .await
            .unwrap();

        let names: Vec<&str> = report.outcomes.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["alpha", "zeta"]);
        assert!(report.all_successful());
    }

    #[tokio::test]
    async fn test_start_records_per_vm_errors() {
        let defaults = DefaultTier::default();
        let profiles = profiles();
        let resolver = ConfigResolver::new(&defaults, &profiles);

        let mut hypervisor = MockHypervisor::new();
        hypervisor
            .expect_list_vms()
            .returning(|| Ok(vec![tagged("a", "lab"), tagged("b", "lab")]));
        hypervisor.expect_start_vm().times(2).returning(|name| {
            if name == "a" {
                Err(HypervisorError::VmNotFound {
                    name: name.to_string(),
                }
                .into())
            } else {
                Ok(())
            }
        });

        let report = PlanExecutor::new(&hypervisor, &resolver)
            .execute("lab", &[], PlanAction::Start)
            .await
            .unwrap();

        assert_eq!(report.failed(), 1);
        assert_eq!(report.successful(), 1);
        assert_eq!(report.outcomes[0].reason.as_deref(), Some("VM a not found"));
    }

    #[tokio::test]
    async fn test_no_matching_vms_is_empty_report() {
        let defaults = DefaultTier::default();
        let profiles = profiles();
        let resolver = ConfigResolver::new(&defaults, &profiles);

        let mut hypervisor = MockHypervisor::new();
        hypervisor
            .expect_list_vms()
            .returning(|| Ok(vec![tagged("a", "other")]));

        let report = PlanExecutor::new(&hypervisor, &resolver)
            .execute("lab", &[], PlanAction::Delete)
            .await
            .unwrap();

        assert!(report.is_empty());
        assert!(report.all_successful());
    }

    #[tokio::test]
    async fn test_delete_with_empty_plan_is_rejected() {
        let defaults = DefaultTier::default();
        let profiles = profiles();
        let resolver = ConfigResolver::new(&defaults, &profiles);

        // No expectations: any hypervisor call fails the test.
        let hypervisor = MockHypervisor::new();

        let err = PlanExecutor::new(&hypervisor, &resolver)
            .execute("", &[], PlanAction::Delete)
            .await
            .unwrap_err();

        assert!(matches!(err, KvirtError::Plan(PlanError::UntaggedDelete)));
    }

    #[tokio::test]
    async fn test_listing_failure_is_an_error() {
        let defaults = DefaultTier::default();
        let profiles = profiles();
        let resolver = ConfigResolver::new(&defaults, &profiles);

        let mut hypervisor = MockHypervisor::new();
        hypervisor
            .expect_list_vms()
            .returning(|| Err(HypervisorError::command("virsh list", "no connection").into()));

        let result = PlanExecutor::new(&hypervisor, &resolver)
            .execute("lab", &[], PlanAction::Start)
            .await;

        assert!(result.is_err());
    }

    #[test]
    fn test_preview() {
        let defaults = DefaultTier::default();
        let profiles = profiles();
        let resolver = ConfigResolver::new(&defaults, &profiles);
        let hypervisor = MockHypervisor::new();

        let entries = vec![entry("web", Some("centos")), entry("db", Some("fedora"))];
        let preview = PlanExecutor::new(&hypervisor, &resolver).preview("lab", &entries);

        assert_eq!(preview.len(), 2);
        assert_eq!(preview[0].1.as_ref().unwrap().numcpus, 4);
        assert!(matches!(
            preview[1].1,
            Err(ResolveError::ProfileNotFound { .. })
        ));
    }

    #[test]
    fn test_report_display() {
        let report = PlanReport {
            plan: String::from("lab"),
            action: PlanAction::Stop,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            outcomes: vec![VmOutcome::succeeded("a"), VmOutcome::failed("b", "boom")],
        };
        assert_eq!(
            report.to_string(),
            "Plan lab stop: 2 vms, 1 successful, 1 failed"
        );
    }
}
