//! # Prometheus Metrics
//!
//! Flow outcome counters and latency for a simulation run. Rendered in the
//! Prometheus text exposition format at the end of the run.
//!
//! All metrics live in a dedicated [`prometheus::Registry`] so they do not
//! collide with the default global registry.

use asset_ledger::flow::{FlowError, ProtocolFailure};
use asset_ledger::notary::CommitFailure;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Issuances that reached the ledger.
    pub issued_total: IntCounter,
    /// Transfers that reached the ledger.
    pub transferred_total: IntCounter,
    /// Flows a counterparty refused to sign.
    pub refused_total: IntCounter,
    /// Flows that lost a race for an input.
    pub conflicted_total: IntCounter,
    /// Flows that failed for any other reason.
    pub failed_total: IntCounter,
    /// Wall time from proposal to outcome, committed or not.
    pub flow_latency_seconds: Histogram,
}

fn counter(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntCounter> {
    let counter = IntCounter::new(name, help)?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl NodeMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("asset".into()), None)?;

        let issued_total = counter(&registry, "issued_total", "Committed issuance flows")?;
        let transferred_total =
            counter(&registry, "transferred_total", "Committed transfer flows")?;
        let refused_total = counter(
            &registry,
            "refused_total",
            "Flows refused by a counterparty's signing policy or contract check",
        )?;
        let conflicted_total = counter(
            &registry,
            "conflicted_total",
            "Flows rejected by the notary because an input was already consumed",
        )?;
        let failed_total = counter(&registry, "failed_total", "Flows that failed otherwise")?;

        let flow_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "flow_latency_seconds",
                "Time from proposal to outcome in seconds",
            )
            .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;
        registry.register(Box::new(flow_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            issued_total,
            transferred_total,
            refused_total,
            conflicted_total,
            failed_total,
            flow_latency_seconds,
        })
    }

    /// Count a failed flow under the right outcome.
    pub fn record_failure(&self, error: &FlowError) {
        match error {
            FlowError::Protocol(ProtocolFailure::CounterpartyRefused { .. }) => {
                self.refused_total.inc()
            }
            FlowError::Commit(CommitFailure::Conflict { .. }) => self.conflicted_total.inc(),
            _ => self.failed_total.inc(),
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
