use crate::prober::{Prober, TcpProber};
use crate::registry::{DisabledGroup, GroupSpec, Registry, RegistryError, Slot};
use crate::types::{ChannelResult, Endpoint, FleetSnapshot, GroupResult, LoginResult, ProbeOutcome};
use ::time::{macros::format_description, OffsetDateTime};
use futures_util::future::try_join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Channel rows emitted for a disabled world.
pub const DISABLED_CHANNEL_COUNT: u32 = 20;
/// Placeholder login endpoint reported for a disabled world. Never contacted.
pub const DISABLED_LOGIN_ADDRESS: &str = "0.0.0.0";
pub const DISABLED_LOGIN_PORT: u16 = 8484;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CONCURRENCY: usize = 512;
pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 60;

/// Probes every enabled world of a registry and assembles the published snapshot.
///
/// - Each login and channel endpoint is probed in its own task; all groups fan out at once.
/// - A shared `Semaphore` caps simultaneous connect attempts across the whole run.
/// - Results are joined back and ordered by registry position and channel id, never by completion order.
#[derive(Clone)]
pub struct FleetScanner {
    prober: Arc<dyn Prober>,
    timeout: Duration,
    permits: Arc<Semaphore>,
    concurrency: usize,
    probe_interval_secs: u64,
}

impl FleetScanner {
    pub fn new(prober: Arc<dyn Prober>, timeout: Duration) -> Self {
        Self {
            prober,
            timeout,
            permits: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
            concurrency: DEFAULT_CONCURRENCY,
            probe_interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
        }
    }

    /// Maximum in-flight connect attempts, clamped to 1..=5000.
    ///
    /// The connect timeout starts once a permit is held, so a cap below the number of
    /// endpoints stretches a run to roughly `ceil(endpoints / cap)` timeouts.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.clamp(1, 5_000);
        self.permits = Arc::new(Semaphore::new(self.concurrency));
        self
    }

    /// Number of sequential timeout windows a run over `endpoints` may need, if more than one.
    pub fn queued_rounds(&self, endpoints: usize) -> Option<usize> {
        let rounds = endpoints.div_ceil(self.concurrency);
        (rounds > 1).then_some(rounds)
    }

    pub fn with_probe_interval(mut self, secs: u64) -> Self {
        self.probe_interval_secs = secs;
        self
    }

    /// Probe one enabled group. Fails only if the group definition itself is malformed.
    pub async fn probe_group(&self, group: &GroupSpec) -> Result<GroupResult, RegistryError> {
        group.validate()?;

        let targets = std::iter::once((Slot::Login, group.login.clone())).chain(
            group
                .channels
                .iter()
                .map(|ch| (Slot::Channel(ch.id), ch.endpoint.clone())),
        );

        let mut set = JoinSet::new();
        let mut slots = HashMap::with_capacity(group.channels.len() + 1);
        for (slot, endpoint) in targets {
            let prober = self.prober.clone();
            let permits = self.permits.clone();
            let timeout = self.timeout;
            let handle = set.spawn(async move {
                // Held until the probe completes; the semaphore is never closed.
                let _permit = permits.acquire_owned().await;
                prober.probe(&endpoint, timeout).await
            });
            slots.insert(handle.id(), slot);
        }

        // Every slot starts Offline so a task that dies still yields a row.
        let mut login = ProbeOutcome::Offline;
        let mut channels: Vec<ChannelResult> = group
            .channels
            .iter()
            .map(|ch| ChannelResult {
                id: ch.id,
                outcome: ProbeOutcome::Offline,
            })
            .collect();
        channels.sort_by_key(|c| c.id);

        while let Some(res) = set.join_next_with_id().await {
            let (task_id, outcome) = match res {
                Ok(done) => done,
                Err(err) => {
                    error!(
                        group = %group.id,
                        slot = ?slots.get(&err.id()),
                        error = %err,
                        "probe task failed, recording offline"
                    );
                    continue;
                }
            };
            match slots.get(&task_id) {
                Some(Slot::Login) => login = outcome,
                Some(Slot::Channel(id)) => {
                    if let Ok(idx) = channels.binary_search_by_key(id, |c| c.id) {
                        channels[idx].outcome = outcome;
                    }
                }
                None => {}
            }
        }

        let result = GroupResult {
            id: group.id.clone(),
            display_name: group.display_name.clone(),
            icon: group.icon.clone(),
            disabled: false,
            login: LoginResult::new(&group.login, login),
            channels,
        };
        info!(
            group = %result.id,
            login = %login,
            online = result.online_channels(),
            total = result.channels.len(),
            "probed group"
        );
        Ok(result)
    }

    /// Run one full probe cycle over `registry`.
    ///
    /// The registry is validated before any connection is attempted. Enabled groups come
    /// first in registry order, followed by disabled placeholders in registry order.
    pub async fn build_snapshot(&self, registry: &Registry) -> Result<FleetSnapshot, RegistryError> {
        registry.validate()?;
        let disabled = registry.disabled_groups()?;
        let enabled: Vec<&GroupSpec> = registry.enabled_groups().collect();
        let endpoints = registry.endpoint_count();

        info!(
            enabled = enabled.len(),
            disabled = disabled.len(),
            endpoints,
            timeout_ms = self.timeout.as_millis() as u64,
            "starting probe run"
        );

        if let Some(rounds) = self.queued_rounds(endpoints) {
            warn!(
                endpoints,
                concurrency = self.concurrency,
                rounds,
                "concurrency below endpoint count, run may span several timeouts"
            );
        }

        let mut groups = try_join_all(enabled.into_iter().map(|g| self.probe_group(g))).await?;
        groups.extend(disabled.iter().map(disabled_placeholder));

        Ok(FleetSnapshot {
            groups,
            generated_at: now_iso_like(),
            probe_interval_seconds: self.probe_interval_secs,
        })
    }
}

impl Default for FleetScanner {
    fn default() -> Self {
        Self::new(Arc::new(TcpProber), DEFAULT_TIMEOUT)
    }
}

/// Probe `registry` over real TCP with default concurrency and interval.
pub async fn build_snapshot(registry: &Registry, timeout: Duration) -> Result<FleetSnapshot, RegistryError> {
    FleetScanner::new(Arc::new(TcpProber), timeout)
        .build_snapshot(registry)
        .await
}

/// Synthetic result for a disabled world. No endpoint is contacted.
pub fn disabled_placeholder(group: &DisabledGroup) -> GroupResult {
    GroupResult {
        id: group.id.clone(),
        display_name: group.display_name.clone(),
        icon: group.icon.clone(),
        disabled: true,
        login: LoginResult::new(
            &Endpoint::new(DISABLED_LOGIN_ADDRESS, DISABLED_LOGIN_PORT),
            ProbeOutcome::Offline,
        ),
        channels: (1..=DISABLED_CHANNEL_COUNT)
            .map(|id| ChannelResult {
                id,
                outcome: ProbeOutcome::Offline,
            })
            .collect(),
    }
}

fn now_iso_like() -> String {
    // UTC with millisecond precision, e.g. 2026-01-01T00:00:00.000Z
    let now = OffsetDateTime::now_utc();
    now.format(format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    ))
    .unwrap_or_else(|_| String::from("1970-01-01T00:00:00.000Z"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_all_offline() {
        let g = disabled_placeholder(&DisabledGroup {
            id: "okab".into(),
            display_name: "Okab".into(),
            icon: "O".into(),
        });
        assert!(g.disabled);
        assert_eq!(g.login.outcome, ProbeOutcome::Offline);
        assert_eq!(g.login.endpoint, Endpoint::new("0.0.0.0", 8484));
        assert_eq!(g.channels.len(), DISABLED_CHANNEL_COUNT as usize);
        assert!(g.channels.iter().all(|c| c.outcome == ProbeOutcome::Offline));
        let ids: Vec<u32> = g.channels.iter().map(|c| c.id).collect();
        assert_eq!(ids, (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn timestamp_is_utc_millis() {
        let ts = now_iso_like();
        assert_eq!(ts.len(), "2026-01-01T00:00:00.000Z".len());
        assert!(ts.ends_with('Z'));
        assert_eq!(&ts[10..11], "T");
        assert_eq!(&ts[19..20], ".");
    }

    #[test]
    fn concurrency_is_clamped() {
        let s = FleetScanner::default().with_concurrency(0);
        assert_eq!(s.permits.available_permits(), 1);
        let s = FleetScanner::default().with_concurrency(1_000_000);
        assert_eq!(s.permits.available_permits(), 5_000);
    }

    #[test]
    fn queued_rounds_only_when_cap_is_below_endpoints() {
        let s = FleetScanner::default();
        assert_eq!(s.queued_rounds(63), None);
        let s = s.with_concurrency(20);
        assert_eq!(s.queued_rounds(20), None);
        assert_eq!(s.queued_rounds(21), Some(2));
        assert_eq!(s.queued_rounds(63), Some(4));
        assert_eq!(s.queued_rounds(0), None);
    }
}
