//! Endpoint registry: the static world → endpoints table a probe run works from.
//!
//! The registry is loaded once per run, validated up front, and then only read.
//! A built-in copy of the production table ships in the binary; a JSON file with
//! the same shape can replace it.

use crate::types::Endpoint;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

const BUILTIN_REGISTRY: &str = include_str!("../registry.json");

/// Fatal configuration faults. Any of these aborts the run before probing starts.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read registry file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("registry JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("group id must not be empty")]
    EmptyGroupId,

    #[error("duplicate group id: {0}")]
    DuplicateGroup(String),

    #[error("duplicate disabled group id: {0}")]
    DuplicateDisabled(String),

    #[error("group {group}: {slot} has an empty address")]
    EmptyAddress { group: String, slot: Slot },

    #[error("group {group}: {slot} has port 0 (must be 1-65535)")]
    InvalidPort { group: String, slot: Slot },

    #[error("group {group}: channel id must be positive")]
    ZeroChannelId { group: String },

    #[error("group {group}: duplicate channel id {id}")]
    DuplicateChannel { group: String, id: u32 },

    #[error("group {group}: channel ids must be 1..={count}, found {id}")]
    ChannelOutOfRange { group: String, id: u32, count: usize },

    #[error("disabled group {0} has no display metadata and no matching group entry")]
    UnknownDisabledGroup(String),
}

/// Which endpoint of a group an error or probe refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    Login,
    Channel(u32),
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Login => f.write_str("login"),
            Slot::Channel(id) => write!(f, "channel {id}"),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub id: u32,
    #[serde(flatten)]
    pub endpoint: Endpoint,
}

/// One world with its login server and channel servers.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupSpec {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub icon: String,
    pub login: Endpoint,
    #[serde(default)]
    pub channels: Vec<ChannelSpec>,
}

impl GroupSpec {
    /// Check endpoints and channel numbering. Channel ids must be exactly `1..=N`.
    pub fn validate(&self) -> Result<(), RegistryError> {
        check_endpoint(&self.id, Slot::Login, &self.login)?;

        let count = self.channels.len();
        let mut seen = HashSet::with_capacity(count);
        for ch in &self.channels {
            if ch.id == 0 {
                return Err(RegistryError::ZeroChannelId {
                    group: self.id.clone(),
                });
            }
            if !seen.insert(ch.id) {
                return Err(RegistryError::DuplicateChannel {
                    group: self.id.clone(),
                    id: ch.id,
                });
            }
            if ch.id as usize > count {
                return Err(RegistryError::ChannelOutOfRange {
                    group: self.id.clone(),
                    id: ch.id,
                    count,
                });
            }
            check_endpoint(&self.id, Slot::Channel(ch.id), &ch.endpoint)?;
        }
        Ok(())
    }
}

fn check_endpoint(group: &str, slot: Slot, ep: &Endpoint) -> Result<(), RegistryError> {
    if ep.host().trim().is_empty() {
        return Err(RegistryError::EmptyAddress {
            group: group.to_string(),
            slot,
        });
    }
    if ep.port == 0 {
        return Err(RegistryError::InvalidPort {
            group: group.to_string(),
            slot,
        });
    }
    Ok(())
}

/// A disabled-list entry. Metadata may be omitted when `groups` has an entry with the same id.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DisabledSpec {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

/// Display metadata for a disabled group after resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisabledGroup {
    pub id: String,
    pub display_name: String,
    pub icon: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Registry {
    #[serde(default)]
    pub groups: Vec<GroupSpec>,
    #[serde(default)]
    pub disabled: Vec<DisabledSpec>,
}

impl Registry {
    /// Parse and validate a registry from JSON text.
    pub fn from_json_str(s: &str) -> Result<Self, RegistryError> {
        let registry: Registry = serde_json::from_str(s)?;
        registry.validate()?;
        Ok(registry)
    }

    /// Load a registry from a file path. Errors if the file cannot be read, parsed or validated.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// The registry compiled into the binary.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_json_str(BUILTIN_REGISTRY)
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        let mut ids = HashSet::new();
        for g in &self.groups {
            if g.id.trim().is_empty() {
                return Err(RegistryError::EmptyGroupId);
            }
            if !ids.insert(g.id.as_str()) {
                return Err(RegistryError::DuplicateGroup(g.id.clone()));
            }
            g.validate()?;
        }

        let mut disabled_ids = HashSet::new();
        for d in &self.disabled {
            if d.id.trim().is_empty() {
                return Err(RegistryError::EmptyGroupId);
            }
            if !disabled_ids.insert(d.id.as_str()) {
                return Err(RegistryError::DuplicateDisabled(d.id.clone()));
            }
        }

        self.disabled_groups().map(|_| ())
    }

    pub fn is_disabled(&self, id: &str) -> bool {
        self.disabled.iter().any(|d| d.id == id)
    }

    /// Groups to probe, in registry order.
    pub fn enabled_groups(&self) -> impl Iterator<Item = &GroupSpec> + '_ {
        self.groups.iter().filter(|g| !self.is_disabled(&g.id))
    }

    /// Disabled groups in registry order, with metadata resolved.
    pub fn disabled_groups(&self) -> Result<Vec<DisabledGroup>, RegistryError> {
        self.disabled
            .iter()
            .map(|d| {
                let fallback = self.groups.iter().find(|g| g.id == d.id);
                let display_name = d
                    .display_name
                    .clone()
                    .or_else(|| fallback.map(|g| g.display_name.clone()))
                    .ok_or_else(|| RegistryError::UnknownDisabledGroup(d.id.clone()))?;
                let icon = d
                    .icon
                    .clone()
                    .or_else(|| fallback.map(|g| g.icon.clone()))
                    .unwrap_or_default();
                Ok(DisabledGroup {
                    id: d.id.clone(),
                    display_name,
                    icon,
                })
            })
            .collect()
    }

    pub fn endpoint_count(&self) -> usize {
        self.enabled_groups().map(|g| 1 + g.channels.len()).sum()
    }
}
