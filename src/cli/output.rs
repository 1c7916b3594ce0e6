//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::error::ResolveError;
use crate::hypervisor::VmInfo;
use crate::planner::{PlanAction, PlanReport, VmOutcome};
use crate::resolver::ParameterSet;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// VM row for table display.
#[derive(Tabled)]
struct VmRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Ips")]
    ips: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Description/Plan")]
    description: String,
    #[tabled(rename = "Profile")]
    profile: String,
}

/// Client row for table display.
#[derive(Tabled)]
struct ClientRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Current")]
    current: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats VMs, sorted by name.
    #[must_use]
    pub fn format_vms(&self, vms: &[VmInfo]) -> String {
        let mut vms: Vec<&VmInfo> = vms.iter().collect();
        vms.sort_by(|a, b| a.name.cmp(&b.name));

        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&vms).unwrap_or_default(),
            OutputFormat::Text => {
                let rows: Vec<VmRow> = vms
                    .into_iter()
                    .map(|vm| VmRow {
                        name: vm.name.clone(),
                        status: Self::format_status(&vm.status),
                        ips: vm.ips.join(","),
                        source: vm.source.clone(),
                        description: vm.description.clone(),
                        profile: vm.profile.clone(),
                    })
                    .collect();
                format!("{}\n", Table::new(rows))
            }
        }
    }

    /// Formats the configured clients, marking the current one.
    #[must_use]
    pub fn format_clients(&self, clients: &[String], current: &str) -> String {
        let mut clients: Vec<&String> = clients.iter().collect();
        clients.sort();

        match self.format {
            OutputFormat::Json => {
                let json: Vec<ClientJson<'_>> = clients
                    .into_iter()
                    .map(|name| ClientJson {
                        name,
                        current: name == current,
                    })
                    .collect();
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let rows: Vec<ClientRow> = clients
                    .into_iter()
                    .map(|name| ClientRow {
                        name: name.clone(),
                        current: if name == current {
                            String::from("X")
                        } else {
                            String::new()
                        },
                    })
                    .collect();
                format!("{}\n", Table::new(rows))
            }
        }
    }

    /// Formats a list of names, one per line, sorted.
    #[must_use]
    pub fn format_names<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> String {
        let mut names: Vec<&str> = names.into_iter().collect();
        names.sort_unstable();

        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&names).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();
                for name in names {
                    let _ = writeln!(output, "{name}");
                }
                output
            }
        }
    }

    /// Formats the report of a plan execution.
    #[must_use]
    pub fn format_report(&self, report: &PlanReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => {
                let mut output = String::new();

                if report.is_empty() {
                    let _ = writeln!(
                        output,
                        "{} No vms found for plan {}",
                        "⚠".yellow(),
                        report.plan
                    );
                }

                for outcome in &report.outcomes {
                    let _ = writeln!(output, "{}", Self::format_outcome(report.action, outcome));
                }

                let summary = format!("Plan {} {}!", report.plan, report.action.done_verb());
                let _ = writeln!(
                    output,
                    "{} ({} successful, {} failed)",
                    if report.all_successful() {
                        summary.green()
                    } else {
                        summary.yellow()
                    },
                    report.successful(),
                    report.failed()
                );
                output
            }
        }
    }

    /// Formats the resolved parameters of a plan without deploying it.
    #[must_use]
    pub fn format_preview(
        &self,
        preview: &[(String, Result<ParameterSet, ResolveError>)],
    ) -> String {
        match self.format {
            OutputFormat::Json => {
                let json: Vec<PreviewJson<'_>> = preview
                    .iter()
                    .map(|(name, result)| PreviewJson {
                        name,
                        parameters: result.as_ref().ok(),
                        error: result.as_ref().err().map(ToString::to_string),
                    })
                    .collect();
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => {
                let mut output = String::new();
                for (name, result) in preview {
                    match result {
                        Ok(params) => {
                            let _ = writeln!(output, "{} {}", "✓".green(), name.bold());
                            let yaml = serde_yaml::to_string(params).unwrap_or_default();
                            for line in yaml.lines() {
                                let _ = writeln!(output, "    {line}");
                            }
                        }
                        Err(e) => {
                            let _ = writeln!(output, "{} {}: {e}", "✗".red(), name.bold());
                        }
                    }
                }
                output
            }
        }
    }

    /// Formats a free-form description (vm info, host report).
    #[must_use]
    pub fn format_text(&self, title: &str, text: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "name": title, "info": text });
                serde_json::to_string_pretty(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{text}\n"),
        }
    }

    /// Formats a success message.
    #[must_use]
    pub fn success(&self, message: &str) -> String {
        self.message("success", &"✓".green().to_string(), message)
    }

    /// Formats an error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        self.message("error", &"✗".red().to_string(), message)
    }

    /// Formats a warning message.
    #[must_use]
    pub fn warning(&self, message: &str) -> String {
        self.message("warning", &"⚠".yellow().to_string(), message)
    }

    fn message(&self, status: &str, marker: &str, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": status, "message": message });
                serde_json::to_string(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{marker} {message}"),
        }
    }

    /// Formats one plan outcome the way the plan command reports it.
    fn format_outcome(action: PlanAction, outcome: &VmOutcome) -> String {
        if outcome.success {
            format!("{} {} {}!", "✓".green(), outcome.name, action.done_verb())
        } else {
            let reason = outcome.reason.as_deref().unwrap_or("unknown reason");
            match action {
                PlanAction::Deploy => format!(
                    "{} {} not deployed because of {reason} :(",
                    "✗".red(),
                    outcome.name
                ),
                _ => format!(
                    "{} {} not {}: {reason}",
                    "✗".red(),
                    outcome.name,
                    action.done_verb()
                ),
            }
        }
    }

    /// Formats a VM status with color.
    fn format_status(status: &str) -> String {
        match status {
            "running" => status.green().to_string(),
            "shut off" | "crashed" => status.red().to_string(),
            _ => status.yellow().to_string(),
        }
    }
}

// JSON serialization helpers

#[derive(Serialize)]
struct ClientJson<'a> {
    name: &'a str,
    current: bool,
}

#[derive(Serialize)]
struct PreviewJson<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<&'a ParameterSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn report(outcomes: Vec<VmOutcome>) -> PlanReport {
        PlanReport {
            plan: String::from("lab"),
            action: PlanAction::Deploy,
            started_at: Utc::now(),
            finished_at: Utc::now(),
            outcomes,
        }
    }

    #[test]
    fn test_vm_table_sorted() {
        colored::control::set_override(false);
        let vms = vec![
            VmInfo::new("web", "running").with_description("lab"),
            VmInfo::new("db", "shut off"),
        ];

        let output = OutputFormatter::new(OutputFormat::Text).format_vms(&vms);

        assert!(output.contains("Description/Plan"));
        let db = output.find("db").unwrap();
        let web = output.find("web").unwrap();
        assert!(db < web);
    }

    #[test]
    fn test_vms_json() {
        let vms = vec![VmInfo::new("web", "running")];
        let output = OutputFormatter::new(OutputFormat::Json).format_vms(&vms);
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json[0]["name"], "web");
        assert_eq!(json[0]["status"], "running");
    }

    #[test]
    fn test_clients_marks_current() {
        let clients = vec![String::from("remote"), String::from("local")];
        let output =
            OutputFormatter::new(OutputFormat::Json).format_clients(&clients, "local");
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json[0]["name"], "local");
        assert_eq!(json[0]["current"], true);
        assert_eq!(json[1]["current"], false);
    }

    #[test]
    fn test_names_sorted() {
        let output = OutputFormatter::new(OutputFormat::Text).format_names(["b", "a"]);
        assert_eq!(output, "a\nb\n");
    }

    #[test]
    fn test_report_text() {
        colored::control::set_override(false);
        let report = report(vec![
            VmOutcome::succeeded("web"),
            VmOutcome::failed("db", "Pool fast not found"),
        ]);

        let output = OutputFormatter::new(OutputFormat::Text).format_report(&report);

        assert!(output.contains("web deployed!"));
        assert!(output.contains("db not deployed because of Pool fast not found :("));
        assert!(output.contains("(1 successful, 1 failed)"));
    }

    #[test]
    fn test_report_json() {
        let report = report(vec![VmOutcome::failed("db", "boom")]);
        let output = OutputFormatter::new(OutputFormat::Json).format_report(&report);
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["plan"], "lab");
        assert_eq!(json["action"], "deploy");
        assert_eq!(json["outcomes"][0]["reason"], "boom");
    }

    #[test]
    fn test_preview_json_error() {
        let preview = vec![(
            String::from("db"),
            Err(ResolveError::ProfileNotFound {
                name: String::from("fedora"),
            }),
        )];
        let output = OutputFormatter::new(OutputFormat::Json).format_preview(&preview);
        let json: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json[0]["error"], "Invalid profile fedora");
        assert!(json[0].get("parameters").is_none());
    }
}
