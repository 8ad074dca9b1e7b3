//! # Simulation
//!
//! Builds a [`LocalNetwork`] from a [`NodeConfig`] and replays its script:
//! every issuance in order, then every transfer in order. Each step is one
//! flow; its outcome (committed or the typed failure) goes into the report
//! and the metrics. A failed step never stops the run.

use anyhow::{Context, Result};
use asset_ledger::flow::{AcceptAll, SigningPolicy, StaticIssuerRegistry, WhitelistPolicy};
use asset_ledger::{FlowError, LedgerKeypair, LocalNetwork, Participant};
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::{IssuanceStep, NodeConfig, PolicyKind, TransferStep};
use crate::metrics::NodeMetrics;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    Committed { tx_hash: String },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: String,
    #[serde(flatten)]
    pub outcome: StepOutcome,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct HoldingReport {
    pub owner: String,
    pub address: String,
    pub content: String,
    pub issuer: String,
    pub state_ref: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub notary: String,
    pub steps: Vec<StepReport>,
    pub holdings: Vec<HoldingReport>,
    pub transactions: usize,
}

impl SimulationReport {
    pub fn committed(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Committed { .. }))
            .count()
    }
}

pub struct Simulation {
    network: LocalNetwork,
    metrics: NodeMetrics,
    watchers: Vec<JoinHandle<()>>,
}

impl Simulation {
    /// Bring up the notary and every configured party.
    pub fn start(config: &NodeConfig, metrics: NodeMetrics) -> Result<Self> {
        let mut network = LocalNetwork::new(config.ledger.clone(), config.notary.clone());
        let registry = Arc::new(StaticIssuerRegistry::new(config.whitelist.issuers.iter().cloned()));

        let mut watchers = Vec::new();
        for party in &config.parties {
            let policy: Arc<dyn SigningPolicy> = match party.policy {
                PolicyKind::AcceptAll => Arc::new(AcceptAll),
                PolicyKind::Whitelist => Arc::new(WhitelistPolicy::new(registry.clone())),
            };
            let participant = match &party.secret_key {
                Some(hex) => {
                    let keypair = LedgerKeypair::from_hex(hex)
                        .with_context(|| format!("bad secret_key for party {}", party.name))?;
                    network.add_participant_with_key(party.name.clone(), keypair, policy)
                }
                None => network.add_participant(party.name.clone(), policy),
            };
            watchers.push(watch_vault(participant));
        }

        info!(
            notary = %config.notary,
            parties = config.parties.len(),
            issuers = ?registry.names(),
            "network started"
        );
        Ok(Self {
            network,
            metrics,
            watchers,
        })
    }

    pub fn network(&self) -> &LocalNetwork {
        &self.network
    }

    /// Replay the script and tear the watchers down.
    pub async fn run(self, config: &NodeConfig) -> Result<SimulationReport> {
        let mut steps = Vec::new();
        for step in &config.issuances {
            steps.push(self.issue(step).await?);
        }
        for step in &config.transfers {
            steps.push(self.transfer(step).await?);
        }

        let mut holdings = Vec::new();
        for participant in self.network.participants() {
            for held in participant.holdings() {
                holdings.push(HoldingReport {
                    owner: participant.party().name.clone(),
                    address: participant.party().address(),
                    content: held.record.content,
                    issuer: held.record.issuer.name,
                    state_ref: held.state_ref.to_string(),
                });
            }
        }

        for watcher in &self.watchers {
            watcher.abort();
        }

        Ok(SimulationReport {
            notary: self.network.notary().name,
            steps,
            holdings,
            transactions: self.network.sequencer().transaction_count(),
        })
    }

    async fn issue(&self, step: &IssuanceStep) -> Result<StepReport> {
        let owner = self.participant(&step.owner)?;
        let label = format!("issue {:?} from {} to {}", step.content, step.issuer, step.owner);

        let started = Instant::now();
        let result = owner.request_issuance_from(step.content.clone(), &step.issuer).await;
        if result.is_ok() {
            self.metrics.issued_total.inc();
        }
        Ok(self.report(label, started, result.map(|tx| tx.tx_hash.to_hex())))
    }

    async fn transfer(&self, step: &TransferStep) -> Result<StepReport> {
        let sender = self.participant(&step.from)?;
        let label = format!(
            "move {:?} (issued by {}) from {} to {}",
            step.content, step.issuer, step.from, step.to
        );

        let held = sender.holdings().into_iter().find(|h| {
            h.record.content == step.content && h.record.issuer.name == step.issuer
        });
        let Some(held) = held else {
            warn!(step = %label, "sender holds no matching record");
            return Ok(StepReport {
                step: label,
                outcome: StepOutcome::Failed {
                    error: format!("{} holds no {:?} issued by {}", step.from, step.content, step.issuer),
                },
                elapsed_ms: 0,
            });
        };

        let started = Instant::now();
        let result = sender.request_transfer_to(&held, &step.to).await;
        if result.is_ok() {
            self.metrics.transferred_total.inc();
        }
        Ok(self.report(label, started, result.map(|tx| tx.tx_hash.to_hex())))
    }

    fn report(
        &self,
        step: String,
        started: Instant,
        result: Result<String, FlowError>,
    ) -> StepReport {
        let elapsed = started.elapsed();
        self.metrics.flow_latency_seconds.observe(elapsed.as_secs_f64());

        let outcome = match result {
            Ok(tx_hash) => {
                info!(step = %step, tx = %tx_hash, "step committed");
                StepOutcome::Committed { tx_hash }
            }
            Err(e) => {
                warn!(step = %step, error = %e, "step failed");
                self.metrics.record_failure(&e);
                StepOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        StepReport {
            step,
            outcome,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    fn participant(&self, name: &str) -> Result<Arc<Participant>> {
        self.network
            .participant(name)
            .with_context(|| format!("no participant named {}", name))
    }
}

/// Log every record committed to `participant` as it lands.
fn watch_vault(participant: Arc<Participant>) -> JoinHandle<()> {
    let mut feed = Box::pin(participant.vault().subscribe(participant.party()));
    let owner = participant.party().name.clone();
    tokio::spawn(async move {
        while let Some(event) = feed.next().await {
            info!(
                owner = %owner,
                content = %event.state.record.content,
                state = %event.state.state_ref,
                committed_at = %event.committed_at.to_rfc3339(),
                "received"
            );
        }
    })
}
