//! Health check timing
//!
//! "Probes should be configured in such a way that they start failing about
//! time when the leader key is expiring."
//! - https://github.com/zalando/patroni/blob/v2.0.1/docs/rest_api.rst
//! - https://github.com/zalando/patroni/blob/v2.0.1/docs/watchdog.rst

use k8s_openapi::api::core::v1::Probe;

use crate::crd::PatroniSpec;

/// Probe thresholds and timeouts, in seconds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeTiming {
    pub timeout_seconds: i32,
    pub period_seconds: i32,
    pub success_threshold: i32,
    pub failure_threshold: i32,
}

impl ProbeTiming {
    /// Derive timings from the Patroni loop interval and leader lease.
    ///
    /// A non-positive sync period cannot divide anything; the floors apply.
    pub fn compute(sync_period_seconds: i32, leader_lease_duration_seconds: i32) -> Self {
        let timeout = sync_period_seconds / 2;
        let failure = leader_lease_duration_seconds
            .checked_div(sync_period_seconds)
            .filter(|_| sync_period_seconds > 0)
            .unwrap_or(0);

        Self {
            timeout_seconds: timeout.max(1),
            period_seconds: sync_period_seconds,
            success_threshold: 1,
            failure_threshold: failure.max(1),
        }
    }

    pub fn from_spec(spec: &PatroniSpec) -> Self {
        Self::compute(spec.sync_period_seconds, spec.leader_lease_duration_seconds)
    }

    /// Copy these timings onto a probe
    // TODO: when the probe times out, failure triggers at
    // (failure_threshold × period_seconds + timeout_seconds); subtract the timeout.
    pub fn apply(&self, probe: &mut Probe) {
        probe.timeout_seconds = Some(self.timeout_seconds);
        probe.period_seconds = Some(self.period_seconds);
        probe.success_threshold = Some(self.success_threshold);
        probe.failure_threshold = Some(self.failure_threshold);
    }
}
