//! Runs every probe once per tick and reduces the results to "busy" or "idle".

use crate::config::{PollConfig, UnknownPolicy};
use crate::probe::{ActivityProbe, ProbeResult};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

/// Result of one probe within a tick. `result` is `None` when the probe was
/// skipped because an earlier probe already reported activity.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    pub probe: String,
    pub result: Option<ProbeResult>,
}

/// One aggregation cycle, in probe registration order.
#[derive(Debug, Clone)]
pub struct Tick {
    pub timestamp: DateTime<Utc>,
    pub reports: Vec<ProbeReport>,
}

impl Tick {
    /// Results of the probes that actually ran
    pub fn results(&self) -> impl Iterator<Item = &ProbeResult> {
        self.reports.iter().filter_map(|r| r.result.as_ref())
    }

    /// Whether the host is in use under the given policy for `Unknown`
    pub fn is_busy(&self, policy: UnknownPolicy) -> bool {
        self.results().any(|result| match result {
            ProbeResult::Active(_) => true,
            ProbeResult::Inactive => false,
            ProbeResult::Unknown(_) => policy == UnknownPolicy::Busy,
        })
    }
}

pub struct ActivityAggregator {
    probes: Vec<Box<dyn ActivityProbe>>,
    stop_at_first_active: bool,
    unknown_policy: UnknownPolicy,
}

impl ActivityAggregator {
    pub fn new(probes: Vec<Box<dyn ActivityProbe>>) -> Self {
        Self {
            probes,
            stop_at_first_active: false,
            unknown_policy: UnknownPolicy::Idle,
        }
    }

    pub fn with_poll_config(mut self, config: &PollConfig) -> Self {
        self.stop_at_first_active = config.stop_at_first_active;
        self.unknown_policy = config.unknown_policy;
        self
    }

    pub fn probe_count(&self) -> usize {
        self.probes.len()
    }

    pub fn unknown_policy(&self) -> UnknownPolicy {
        self.unknown_policy
    }

    /// Check every probe in sequence and record each result
    pub async fn run_tick(&self) -> Tick {
        let timestamp = Utc::now();
        let mut reports = Vec::with_capacity(self.probes.len());
        let mut found_active = false;

        for probe in &self.probes {
            if found_active && self.stop_at_first_active {
                debug!(probe = probe.name(), "Skipped, activity already found");
                reports.push(ProbeReport {
                    probe: probe.name().to_string(),
                    result: None,
                });
                continue;
            }

            let result = probe.check().await;
            match &result {
                ProbeResult::Unknown(_) => {
                    warn!(probe = probe.name(), result = %result, "Probe check failed")
                }
                _ => info!(probe = probe.name(), result = %result, "Probe checked"),
            }

            found_active |= result.is_active();
            reports.push(ProbeReport {
                probe: probe.name().to_string(),
                result: Some(result),
            });
        }

        Tick { timestamp, reports }
    }

    /// Run one tick and report whether the system is busy
    pub async fn aggregate(&self) -> bool {
        self.run_tick().await.is_busy(self.unknown_policy)
    }
}
