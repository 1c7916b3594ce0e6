//! Expansion of `scripts` into first boot commands.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::ResolveError;

/// Reads script files and turns their lines into commands.
#[derive(Debug, Clone, Default)]
pub struct ScriptExpander {
    /// Directory substituted for a leading `~`.
    home: Option<PathBuf>,
}

impl ScriptExpander {
    /// Creates an expander using the current user's home directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            home: dirs::home_dir(),
        }
    }

    /// Sets the directory substituted for a leading `~`.
    #[must_use]
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    /// Expands a leading `~` or `~/` in `path`.
    #[must_use]
    pub fn expand_home(&self, path: &str) -> PathBuf {
        match (&self.home, path.strip_prefix('~')) {
            (Some(home), Some("")) => home.clone(),
            (Some(home), Some(rest)) if rest.starts_with('/') => {
                home.join(rest.trim_start_matches('/'))
            }
            _ => PathBuf::from(path),
        }
    }

    /// Appends the lines of every script to `cmds`.
    ///
    /// Lines are trimmed and blank lines dropped; order is file order, then
    /// line order. Missing or unreadable scripts are logged and skipped.
    /// `cmds` is returned untouched when no script contributes a line.
    #[must_use]
    pub fn expand(&self, cmds: Option<Vec<String>>, scripts: &[String]) -> Option<Vec<String>> {
        let mut script_cmds = Vec::new();

        for script in scripts {
            let path = self.expand_home(script);
            match read_lines(&path) {
                Ok(lines) => {
                    debug!("Script {} contributes {} commands", path.display(), lines.len());
                    script_cmds.extend(lines);
                }
                Err(e) => warn!("{e}"),
            }
        }

        if script_cmds.is_empty() {
            return cmds;
        }

        let mut merged = cmds.unwrap_or_default();
        merged.extend(script_cmds);
        Some(merged)
    }
}

/// Reads the non-blank, trimmed lines of a script.
fn read_lines(path: &Path) -> Result<Vec<String>, ResolveError> {
    let not_found = || ResolveError::ScriptNotFound {
        path: path.to_path_buf(),
    };

    if !path.is_file() {
        return Err(not_found());
    }

    let content = std::fs::read_to_string(path).map_err(|_| not_found())?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_script(dir: &TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, content).expect("Failed to write script");
        path.display().to_string()
    }

    #[test]
    fn test_expand_appends_in_order() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let first = write_script(&dir, "first.sh", "b\n\n  c  \n");
        let second = write_script(&dir, "second.sh", "d\n");

        let cmds = ScriptExpander::new().expand(Some(vec![String::from("a")]), &[first, second]);

        assert_eq!(
            cmds,
            Some(vec![
                String::from("a"),
                String::from("b"),
                String::from("c"),
                String::from("d"),
            ])
        );
    }

    #[test]
    fn test_expand_creates_cmds() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let script = write_script(&dir, "setup.sh", "yum -y install httpd\n");

        let cmds = ScriptExpander::new().expand(None, &[script]);
        assert_eq!(cmds, Some(vec![String::from("yum -y install httpd")]));
    }

    #[test]
    fn test_missing_script_is_skipped() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let present = write_script(&dir, "present.sh", "echo ok\n");
        let missing = dir.path().join("missing.sh").display().to_string();

        let cmds = ScriptExpander::new().expand(None, &[missing, present]);
        assert_eq!(cmds, Some(vec![String::from("echo ok")]));
    }

    #[test]
    fn test_only_missing_scripts_leave_cmds_alone() {
        let cmds = ScriptExpander::new().expand(None, &[String::from("/nonexistent/kvirt.sh")]);
        assert_eq!(cmds, None);
    }

    #[test]
    fn test_expand_home() {
        let expander = ScriptExpander::default().with_home("/home/kvirt");
        assert_eq!(
            expander.expand_home("~/scripts/web.sh"),
            PathBuf::from("/home/kvirt/scripts/web.sh")
        );
        assert_eq!(expander.expand_home("~"), PathBuf::from("/home/kvirt"));
        assert_eq!(expander.expand_home("/tmp/x.sh"), PathBuf::from("/tmp/x.sh"));
        assert_eq!(expander.expand_home("~other/x.sh"), PathBuf::from("~other/x.sh"));
    }
}
