//! Service configuration.
//!
//! Loaded once at startup from `~/.config/calhook/config.toml` (or a
//! `--config` override) and passed by reference from then on; core logic
//! never reads ambient global state.

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::descriptor::EventDescriptor;
use crate::error::{CalHookError, CalHookResult};

const DEFAULT_PORT: u16 = 8080;

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))
}

/// Runtime configuration for the webhook service.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Base URL of the provider's REST API
    pub api_base: String,
    /// API key, sent as the `Provider-Token` header on every call
    pub api_key: String,
    /// Calendar the managed events live in
    pub calendar_id: String,
    /// Custom field the link is written to
    pub custom_field: String,
    /// Address the webhook listener binds to
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,
    /// Sub-calendar id to link content (HTML allowed, stored verbatim)
    #[serde(default)]
    pub links: LinkTable,
}

impl AppConfig {
    /// Default config location: ~/.config/calhook/config.toml
    pub fn config_path() -> CalHookResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CalHookError::Config("Could not determine config directory".into()))?
            .join("calhook");

        Ok(config_dir.join("config.toml"))
    }

    /// Load and validate a config file.
    pub fn load(path: &Path) -> CalHookResult<AppConfig> {
        let contents = std::fs::read_to_string(path)?;

        let config: AppConfig = toml::from_str(&contents)
            .map_err(|e| CalHookError::Config(format!("Could not parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Check the fatal preconditions before any webhook is accepted.
    pub fn validate(&self) -> CalHookResult<()> {
        for (key, value) in [
            ("api_base", &self.api_base),
            ("api_key", &self.api_key),
            ("calendar_id", &self.calendar_id),
            ("custom_field", &self.custom_field),
        ] {
            if value.trim().is_empty() {
                return Err(CalHookError::Config(format!("'{key}' must not be empty")));
            }
        }

        if self.links.is_empty() {
            return Err(CalHookError::Config(
                "[links] must map at least one sub-calendar id to link content".into(),
            ));
        }

        Ok(())
    }

    /// Create a sample config file with every option spelled out.
    pub fn create_sample_config(path: &Path) -> CalHookResult<()> {
        let contents = "\
# calhook configuration

# Provider REST API and credentials:
# api_base = \"https://api.example.com\"
# api_key = \"your-api-key\"
# calendar_id = \"your-calendar-id\"

# Custom field the meeting link is written to:
# custom_field = \"meeting_link\"

# Address the webhook listener binds to:
# listen_addr = \"0.0.0.0:8080\"

# Sub-calendar id to link content. Values are stored verbatim under
# {\"html\": ...}, so markup is allowed:
# [links]
# 14156325 = \"<a href=\\\"https://meet.example.com/standup\\\">Join standup</a>\"
# 14098383 = \"https://meet.example.com/retro\"
";

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CalHookError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| CalHookError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }

    /// Find the managed sub-calendar an event update should bind to:
    /// the primary sub-calendar first, then membership order.
    pub fn assign(&self, descriptor: &EventDescriptor) -> Option<LinkAssignment> {
        std::iter::once(descriptor.sub_calendar_id)
            .chain(descriptor.sub_calendar_ids.iter().copied())
            .find_map(|id| {
                self.links.get(id).map(|html| LinkAssignment {
                    sub_calendar_id: id,
                    field: self.custom_field.clone(),
                    html: html.to_string(),
                    managed: self.links.managed_ids(),
                })
            })
    }
}

/// The product of a successful link lookup for one event.
#[derive(Debug, Clone)]
pub struct LinkAssignment {
    /// Managed sub-calendar that triggered this update
    pub sub_calendar_id: i64,
    /// Target custom-field name
    pub field: String,
    /// Link content, written verbatim under `{"html": ...}`
    pub html: String,
    /// Every managed sub-calendar id, for membership collapsing
    pub managed: BTreeSet<i64>,
}

/// Sub-calendar to link-content table, keyed by numeric id.
///
/// TOML table keys are strings; they are parsed at load time so a typoed
/// key fails the whole config instead of silently never matching.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>")]
pub struct LinkTable(BTreeMap<i64, String>);

impl TryFrom<BTreeMap<String, String>> for LinkTable {
    type Error = String;

    fn try_from(raw: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let mut table = BTreeMap::new();
        for (key, value) in raw {
            let id = key
                .parse::<i64>()
                .map_err(|_| format!("[links] key '{key}' is not a numeric sub-calendar id"))?;
            table.insert(id, value);
        }
        Ok(LinkTable(table))
    }
}

impl FromIterator<(i64, String)> for LinkTable {
    fn from_iter<T: IntoIterator<Item = (i64, String)>>(iter: T) -> Self {
        LinkTable(BTreeMap::from_iter(iter))
    }
}

impl LinkTable {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, id: i64) -> Option<&str> {
        self.0.get(&id).map(String::as_str)
    }

    pub fn is_managed(&self, id: i64) -> bool {
        self.0.contains_key(&id)
    }

    pub fn managed_ids(&self) -> BTreeSet<i64> {
        self.0.keys().copied().collect()
    }
}
