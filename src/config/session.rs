//! The per-process configuration session.
//!
//! A [`Session`] is built once from the client configuration and profile
//! documents and then passed by reference to everything that needs it.

use std::path::PathBuf;
use tracing::debug;

use crate::error::{ConfigError, Result};

use super::defaults::DefaultTier;
use super::spec::{ClientSection, ClientsFile, Profiles};

/// Default hypervisor host.
const DEFAULT_HOST: &str = "127.0.0.1";

/// Default remote user.
const DEFAULT_USER: &str = "root";

/// Default transport protocol.
const DEFAULT_PROTOCOL: &str = "ssh";

/// How to reach the selected hypervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConnection {
    /// Hypervisor host.
    pub host: String,
    /// Optional port.
    pub port: Option<u16>,
    /// Remote user.
    pub user: String,
    /// Transport protocol.
    pub protocol: String,
    /// Explicit libvirt URI.
    pub url: Option<String>,
}

impl ClientConnection {
    /// Builds connection settings from a client section.
    #[must_use]
    pub fn from_section(section: &ClientSection) -> Self {
        Self {
            host: section
                .host
                .clone()
                .unwrap_or_else(|| String::from(DEFAULT_HOST)),
            port: section.port,
            user: section
                .user
                .clone()
                .unwrap_or_else(|| String::from(DEFAULT_USER)),
            protocol: section
                .protocol
                .clone()
                .unwrap_or_else(|| String::from(DEFAULT_PROTOCOL)),
            url: section.url.clone(),
        }
    }

    /// Returns true if the hypervisor runs on this machine.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self.host.as_str(), "127.0.0.1" | "localhost" | "::1")
    }

    /// Returns the libvirt connection URI.
    #[must_use]
    pub fn uri(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        if self.is_local() {
            return String::from("qemu:///system");
        }

        let port = self.port.map(|p| format!(":{p}")).unwrap_or_default();
        match self.protocol.as_str() {
            "ssh" => format!(
                "qemu+ssh://{}@{}{port}/system",
                self.user, self.host
            ),
            protocol => format!("qemu+{protocol}://{}{port}/system", self.host),
        }
    }
}

/// Configuration loaded for one invocation.
#[derive(Debug, Clone)]
pub struct Session {
    /// Path of the client configuration file.
    pub config_path: PathBuf,
    /// All configured client names, sorted.
    pub clients: Vec<String>,
    /// The selected client.
    pub client: String,
    /// How to reach the selected client.
    pub connection: ClientConnection,
    /// Default tier for resolution.
    pub defaults: DefaultTier,
    /// Named profiles.
    pub profiles: Profiles,
}

impl Session {
    /// Builds a session from parsed documents.
    ///
    /// VM defaults are layered: built-in values, then the `default`
    /// section, then the selected client's section.
    ///
    /// # Errors
    ///
    /// Returns an error if no client is selected, the selected client has
    /// no section, or a default cannot be coerced.
    pub fn from_documents(
        config_path: impl Into<PathBuf>,
        file: &ClientsFile,
        profiles: Profiles,
    ) -> Result<Self> {
        let client = file
            .default
            .client
            .clone()
            .ok_or(ConfigError::MissingDefaultSection)?;

        let section = file
            .clients
            .get(&client)
            .ok_or_else(|| ConfigError::MissingClientSection {
                client: client.clone(),
            })?;

        let defaults = DefaultTier::default()
            .overlay(&file.default.vm)
            .and_then(|tier| tier.overlay(&section.vm))
            .map_err(|e| ConfigError::validation(e.to_string(), "default"))?;

        let connection = ClientConnection::from_section(section);
        debug!("Selected client {client} at {}", connection.uri());

        Ok(Self {
            config_path: config_path.into(),
            clients: file.clients.keys().cloned().collect(),
            client,
            connection,
            defaults,
            profiles,
        })
    }
}
