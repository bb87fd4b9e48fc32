use serde::{Deserialize, Serialize};
use std::fmt;

/// A TCP destination. Port 0 is rejected at registry load time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    #[serde(rename = "ip", alias = "address")]
    pub address: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// The address as a connect target: one pair of surrounding brackets is stripped,
    /// so `[::1]` and `::1` name the same host.
    pub fn host(&self) -> &str {
        let addr = self.address.trim();
        addr.strip_prefix('[')
            .and_then(|a| a.strip_suffix(']'))
            .unwrap_or(addr)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let host = self.host();
        if host.contains(':') {
            write!(f, "[{}]:{}", host, self.port)
        } else {
            write!(f, "{}:{}", host, self.port)
        }
    }
}

/// Binary result of one connection attempt.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProbeOutcome {
    Online,
    Offline,
}

impl ProbeOutcome {
    pub fn is_online(self) -> bool {
        matches!(self, ProbeOutcome::Online)
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProbeOutcome::Online => "online",
            ProbeOutcome::Offline => "offline",
        })
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ChannelResult {
    pub id: u32,
    #[serde(rename = "status")]
    pub outcome: ProbeOutcome,
}

/// Login server entry. Serialized flat as `{ ip, port, status }`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LoginResult {
    #[serde(flatten)]
    pub endpoint: Endpoint,
    #[serde(rename = "status")]
    pub outcome: ProbeOutcome,
}

impl LoginResult {
    pub fn new(endpoint: &Endpoint, outcome: ProbeOutcome) -> Self {
        Self {
            endpoint: endpoint.clone(),
            outcome,
        }
    }
}

/// Status of one world. When `disabled` is set every outcome is a synthetic `Offline`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GroupResult {
    pub id: String,
    #[serde(rename = "name")]
    pub display_name: String,
    pub icon: String,
    #[serde(rename = "isDisabled")]
    pub disabled: bool,
    #[serde(rename = "loginServer")]
    pub login: LoginResult,
    pub channels: Vec<ChannelResult>,
}

impl GroupResult {
    pub fn online_channels(&self) -> usize {
        self.channels
            .iter()
            .filter(|c| c.outcome.is_online())
            .count()
    }
}

/// The published document. Field names are polled by external consumers and must not change.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FleetSnapshot {
    #[serde(rename = "worlds")]
    pub groups: Vec<GroupResult>,
    #[serde(rename = "lastChecked")]
    pub generated_at: String,
    #[serde(rename = "probeInterval")]
    pub probe_interval_seconds: u64,
}

/// Aggregate counts over the enabled groups of a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub logins_online: usize,
    pub logins_total: usize,
    pub channels_online: usize,
    pub channels_total: usize,
}

impl FleetSnapshot {
    pub fn summary(&self) -> SnapshotSummary {
        self.groups
            .iter()
            .filter(|g| !g.disabled)
            .fold(SnapshotSummary::default(), |mut acc, g| {
                acc.logins_total += 1;
                if g.login.outcome.is_online() {
                    acc.logins_online += 1;
                }
                acc.channels_total += g.channels.len();
                acc.channels_online += g.online_channels();
                acc
            })
    }
}
