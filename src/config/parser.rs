//! Configuration parser for the client, profile and plan documents.
//!
//! Documents live in the user's home directory by default (`kcli.yml`,
//! `kcli_profiles.yml`); plans are read from the working directory.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{ConfigError, KvirtError, PlanError, Result};
use crate::planner::{Plan, PlanEntry};

use super::session::Session;
use super::spec::{ClientSection, ClientsFile, DefaultSection, Profiles, VmSpec};

/// Client configuration file name.
pub const CONFIG_FILE: &str = "kcli.yml";

/// Profiles file name.
pub const PROFILES_FILE: &str = "kcli_profiles.yml";

/// Environment variable selecting a client, overriding `default.client`.
pub const CLIENT_ENV: &str = "KCLI_CLIENT";

/// Configuration parser for kvirt documents.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Directory holding the default configuration files.
    home: Option<PathBuf>,
}

impl ConfigParser {
    /// Creates a parser rooted at the user's home directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            home: dirs::home_dir(),
        }
    }

    /// Sets the directory holding the default configuration files.
    #[must_use]
    pub fn with_home(mut self, path: impl Into<PathBuf>) -> Self {
        self.home = Some(path.into());
        self
    }

    /// Default path of the client configuration.
    #[must_use]
    pub fn default_config_path(&self) -> PathBuf {
        self.home_join(CONFIG_FILE)
    }

    /// Default path of the profiles document.
    #[must_use]
    pub fn default_profiles_path(&self) -> PathBuf {
        self.home_join(PROFILES_FILE)
    }

    fn home_join(&self, file: &str) -> PathBuf {
        self.home
            .as_ref()
            .map_or_else(|| PathBuf::from(file), |home| home.join(file))
    }

    /// Loads the session from the client configuration and profiles.
    ///
    /// `KCLI_CLIENT` overrides the selected client.
    ///
    /// # Errors
    ///
    /// Returns an error if a document cannot be parsed or the selected
    /// client is not configured.
    pub fn load_session(
        &self,
        config_path: Option<&Path>,
        profiles_path: Option<&Path>,
    ) -> Result<Session> {
        let config_path = config_path.map_or_else(|| self.default_config_path(), Path::to_path_buf);
        let profiles_path =
            profiles_path.map_or_else(|| self.default_profiles_path(), Path::to_path_buf);

        let mut clients = self.load_clients(&config_path)?;
        Self::apply_env_overrides(&mut clients, |key| std::env::var(key).ok());

        let profiles = self.load_profiles(&profiles_path)?;
        Session::from_documents(config_path, &clients, profiles)
    }

    /// Loads the client configuration.
    ///
    /// A missing file yields a single local client.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_clients(&self, path: &Path) -> Result<ClientsFile> {
        if !path.exists() {
            info!("Using local hypervisor as no {CONFIG_FILE} was found...");
            return Ok(ClientsFile::local());
        }

        info!("Loading configuration from: {}", path.display());
        let content = read_file(path)?;
        self.parse_clients(&content, Some(path))
    }

    /// Parses a client configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or the `default` section is
    /// missing.
    pub fn parse_clients(&self, content: &str, source: Option<&Path>) -> Result<ClientsFile> {
        debug!("Parsing client configuration");

        let serde_yaml::Value::Mapping(mut root) = parse_value(content, source)? else {
            return Err(ConfigError::MissingDefaultSection.into());
        };

        let default_value = root
            .remove("default")
            .ok_or(ConfigError::MissingDefaultSection)?;
        let default: DefaultSection = from_value(default_value, source, "default")?;
        if default.client.is_none() {
            return Err(ConfigError::MissingDefaultSection.into());
        }

        let mut clients = BTreeMap::new();
        for (key, value) in root {
            let name = key_to_string(&key, source)?;
            let section: ClientSection = if value.is_null() {
                ClientSection::default()
            } else {
                from_value(value, source, &name)?
            };
            clients.insert(name, section);
        }

        debug!("Parsed {} client sections", clients.len());
        Ok(ClientsFile { default, clients })
    }

    /// Applies environment overrides to the client configuration.
    pub fn apply_env_overrides(clients: &mut ClientsFile, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(client) = lookup(CLIENT_ENV) {
            debug!("Overriding default.client from environment");
            clients.default.client = Some(client);
        }
    }

    /// Loads the profiles document; a missing file yields no profiles.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_profiles(&self, path: &Path) -> Result<Profiles> {
        if !path.exists() {
            debug!("No profiles file at: {}", path.display());
            return Ok(Profiles::new());
        }

        info!("Loading profiles from: {}", path.display());
        let content = read_file(path)?;
        self.parse_profiles(&content, Some(path))
    }

    /// Parses a profiles document.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_profiles(&self, content: &str, source: Option<&Path>) -> Result<Profiles> {
        let mut profiles = Profiles::new();
        for (name, spec) in parse_spec_mapping(content, source)? {
            profiles.insert(name, spec);
        }
        debug!("Parsed {} profiles", profiles.len());
        Ok(profiles)
    }

    /// Loads a plan file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed.
    pub fn load_plan(&self, path: &Path, name: &str) -> Result<Plan> {
        if !path.exists() {
            return Err(PlanError::PlanFileNotFound {
                path: path.to_path_buf(),
            }
            .into());
        }

        info!("Loading plan {name} from: {}", path.display());
        let content = read_file(path)?;
        self.parse_plan(&content, name, Some(path))
    }

    /// Parses a plan document, keeping entry order.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid or an entry is not a mapping.
    pub fn parse_plan(&self, content: &str, name: &str, source: Option<&Path>) -> Result<Plan> {
        let entries = parse_spec_mapping(content, source)?
            .into_iter()
            .map(|(vm, spec)| PlanEntry::new(vm, spec))
            .collect();
        Ok(Plan::new(name, entries))
    }

    /// Loads the `.env` file next to the configuration if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self, dir: &Path) -> Result<()> {
        let env_path = dir.join(".env");

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                ConfigError::parse(
                    format!("Failed to load .env file: {e}"),
                    env_path.display().to_string(),
                )
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Selects another client by rewriting `default.client`.
    ///
    /// Only the `client` line changes; comments and other keys are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if the client is not configured or the file cannot
    /// be rewritten.
    pub fn switch_client(&self, path: &Path, client: &str) -> Result<()> {
        let clients = self.load_clients(path)?;
        if !clients.clients.contains_key(client) {
            return Err(ConfigError::UnknownClient {
                client: client.to_string(),
            }
            .into());
        }

        let content = if path.exists() {
            read_file(path)?
        } else {
            String::new()
        };
        let edited = replace_client_line(&content, client);
        let content = if selected_client(&edited).as_deref() == Some(client) {
            edited
        } else {
            debug!("Rewriting default section of {} as a document", path.display());
            replace_client_value(&content, client, path)?
        };

        std::fs::write(path, content)?;
        info!("Switched default client to {client}");
        Ok(())
    }
}

/// Replaces the `client:` line of the top-level `default:` block.
///
/// Adds the line, or the block, when missing.
fn replace_client_line(content: &str, client: &str) -> String {
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
    let replacement = |indent: &str| format!("{indent}client: {client}");

    match lines.iter().position(|line| line.trim_end() == "default:") {
        Some(start) => {
            let block_end = lines[start + 1..]
                .iter()
                .position(|line| {
                    !line.trim().is_empty()
                        && !line.starts_with(char::is_whitespace)
                        && !line.starts_with('#')
                })
                .map_or(lines.len(), |offset| start + 1 + offset);
            let block = start + 1..block_end;

            let existing = lines[block.clone()]
                .iter()
                .position(|line| line.trim_start().starts_with("client:"))
                .map(|offset| start + 1 + offset);
            let indent = lines[block]
                .iter()
                .find(|line| line.starts_with(char::is_whitespace) && !line.trim().is_empty())
                .map_or_else(
                    || String::from("  "),
                    |line| line[..line.len() - line.trim_start().len()].to_string(),
                );

            match existing {
                Some(index) => lines[index] = replacement(&indent),
                None => lines.insert(start + 1, replacement(&indent)),
            }
        }
        None => {
            lines.insert(0, String::from("default:"));
            lines.insert(1, replacement("  "));
        }
    }

    let mut edited = lines.join("\n");
    edited.push('\n');
    edited
}

/// Sets `default.client` on the parsed document, keeping unknown keys.
fn replace_client_value(content: &str, client: &str, path: &Path) -> Result<String> {
    let mut value = if content.trim().is_empty() {
        serde_yaml::Value::Mapping(serde_yaml::Mapping::new())
    } else {
        parse_value(content, Some(path))?
    };

    let serde_yaml::Value::Mapping(root) = &mut value else {
        return Err(ConfigError::parse(
            "Configuration is not a mapping",
            path.display().to_string(),
        )
        .into());
    };
    let default = root
        .entry(serde_yaml::Value::from("default"))
        .or_insert_with(|| serde_yaml::Value::Mapping(serde_yaml::Mapping::new()));
    if !default.is_mapping() {
        *default = serde_yaml::Value::Mapping(serde_yaml::Mapping::new());
    }
    if let serde_yaml::Value::Mapping(section) = default {
        section.insert(
            serde_yaml::Value::from("client"),
            serde_yaml::Value::from(client),
        );
    }

    serde_yaml::to_string(&value)
        .map_err(|e| KvirtError::internal(format!("Failed to serialize configuration: {e}")))
}

/// Reads `default.client` from a document, if it parses.
fn selected_client(content: &str) -> Option<String> {
    let value: serde_yaml::Value = serde_yaml::from_str(content).ok()?;
    value
        .get("default")?
        .get("client")?
        .as_str()
        .map(str::to_string)
}

/// Writes a client configuration, optionally backing up the previous file
/// to `<path>.bck`.
///
/// # Errors
///
/// Returns an error if the backup or the write fails.
pub fn write_clients(path: &Path, clients: &ClientsFile, backup: bool) -> Result<()> {
    if backup && path.exists() {
        let mut backup_path = path.as_os_str().to_owned();
        backup_path.push(".bck");
        std::fs::copy(path, &backup_path)?;
        debug!("Backed up {} before rewriting", path.display());
    }

    let value = clients
        .to_yaml_value()
        .map_err(|e| KvirtError::internal(format!("Failed to serialize configuration: {e}")))?;
    let content = serde_yaml::to_string(&value)
        .map_err(|e| KvirtError::internal(format!("Failed to serialize configuration: {e}")))?;

    std::fs::write(path, content)?;
    info!("Wrote configuration to: {}", path.display());
    Ok(())
}

/// Reads a configuration file.
fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| {
        ConfigError::parse(format!("Failed to read file: {e}"), path.display().to_string()).into()
    })
}

/// Parses a document into a YAML value.
fn parse_value(content: &str, source: Option<&Path>) -> Result<serde_yaml::Value> {
    serde_yaml::from_str(content).map_err(|e| {
        ConfigError::ParseError {
            message: format!("YAML parse error: {e}"),
            location: source.map(|p| p.display().to_string()),
        }
        .into()
    })
}

/// Deserializes one section, naming it in the error.
fn from_value<T: serde::de::DeserializeOwned>(
    value: serde_yaml::Value,
    source: Option<&Path>,
    section: &str,
) -> Result<T> {
    serde_yaml::from_value(value).map_err(|e| {
        ConfigError::ParseError {
            message: format!("Invalid section {section}: {e}"),
            location: source.map(|p| p.display().to_string()),
        }
        .into()
    })
}

/// Parses a flat `name -> VmSpec` mapping in document order.
///
/// An entry that does not fit [`VmSpec`] is kept and marked malformed, so
/// only that entry fails to resolve.
fn parse_spec_mapping(content: &str, source: Option<&Path>) -> Result<Vec<(String, VmSpec)>> {
    let root = match parse_value(content, source)? {
        serde_yaml::Value::Null => return Ok(Vec::new()),
        serde_yaml::Value::Mapping(root) => root,
        _ => {
            return Err(ConfigError::ParseError {
                message: String::from("Expected a mapping of names to VM parameters"),
                location: source.map(|p| p.display().to_string()),
            }
            .into());
        }
    };

    let mut entries = Vec::with_capacity(root.len());
    for (key, value) in root {
        let name = key_to_string(&key, source)?;
        let spec = if value.is_null() {
            VmSpec::default()
        } else {
            let profile = value
                .get("profile")
                .and_then(serde_yaml::Value::as_str)
                .map(str::to_string);
            serde_yaml::from_value(value.clone()).unwrap_or_else(|e| {
                let message = describe_malformed(&value, &e);
                warn!("Entry {name} is invalid: {message}");
                VmSpec {
                    profile,
                    malformed: Some(message),
                    ..VmSpec::default()
                }
            })
        };
        entries.push((name, spec));
    }
    Ok(entries)
}

/// Prefixes a deserialization error with the first field that fails alone.
fn describe_malformed(value: &serde_yaml::Value, error: &serde_yaml::Error) -> String {
    let field = value.as_mapping().and_then(|mapping| {
        mapping.iter().find_map(|(key, field_value)| {
            let mut single = serde_yaml::Mapping::new();
            single.insert(key.clone(), field_value.clone());
            let fails =
                serde_yaml::from_value::<VmSpec>(serde_yaml::Value::Mapping(single)).is_err();
            if fails { key.as_str() } else { None }
        })
    });

    let message = error.to_string();
    match field {
        Some(field) if !message.starts_with(field) => format!("{field}: {message}"),
        _ => message,
    }
}

/// Converts a mapping key into a name.
fn key_to_string(key: &serde_yaml::Value, source: Option<&Path>) -> Result<String> {
    match key {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(ConfigError::ParseError {
            message: format!("Invalid name: {other:?}"),
            location: source.map(|p| p.display().to_string()),
        }
        .into()),
    }
}
