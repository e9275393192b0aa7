//! Fee detection and accumulation
//!
//! Fee sources report inflows; the [`FeeTracker`] validates, deduplicates and
//! accumulates them until an epoch claims the pending total. Settlement
//! subtracts exactly the claimed amount, so inflows recorded while an epoch
//! is executing carry over to the next one.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use iceloop_common::{FeeEvent, FeeSourceError, MAX_FEE_AMOUNT};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Producer of fee inflow events
#[async_trait]
pub trait FeeSource: Send + Sync {
    /// Source name for logs
    fn name(&self) -> &'static str;

    /// Return fee events observed since the previous call
    async fn detect(&self) -> Result<Vec<FeeEvent>, FeeSourceError>;
}

/// Fee source selector read from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeeSourceKind {
    #[default]
    Simulated,
    Channel,
}

/// Fee source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSourceSettings {
    pub source: FeeSourceKind,
    /// Seconds between fee polls
    pub poll_interval_seconds: u64,
    /// Amount reported per poll by the simulated source
    pub simulated_amount: Decimal,
    /// Provenance tag for simulated events
    pub provenance: String,
    /// Buffer size of the channel source
    pub channel_buffer: usize,
}

impl Default for FeeSourceSettings {
    fn default() -> Self {
        Self {
            source: FeeSourceKind::Simulated,
            poll_interval_seconds: 60,
            simulated_amount: Decimal::new(5, 2),
            provenance: "trading-fees".to_string(),
            channel_buffer: 1024,
        }
    }
}

/// Build the configured fee source. The channel source also returns the
/// injector that feeds it.
pub fn build_fee_source(
    settings: &FeeSourceSettings,
) -> (Arc<dyn FeeSource>, Option<FeeInjector>) {
    match settings.source {
        FeeSourceKind::Simulated => (
            Arc::new(SimulatedFeeSource::new(
                settings.simulated_amount,
                settings.provenance.clone(),
            )),
            None,
        ),
        FeeSourceKind::Channel => {
            let (source, injector) = ChannelFeeSource::new(settings.channel_buffer);
            (Arc::new(source), Some(injector))
        }
    }
}

/// Reports a fixed amount on every poll
#[derive(Debug)]
pub struct SimulatedFeeSource {
    amount: Decimal,
    provenance: String,
    sequence: AtomicU64,
}

impl SimulatedFeeSource {
    pub fn new(amount: Decimal, provenance: impl Into<String>) -> Self {
        Self {
            amount,
            provenance: provenance.into(),
            sequence: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl FeeSource for SimulatedFeeSource {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn detect(&self) -> Result<Vec<FeeEvent>, FeeSourceError> {
        if self.amount <= Decimal::ZERO {
            return Ok(Vec::new());
        }
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(vec![FeeEvent::new(
            format!("sim-fee-{seq}"),
            self.amount,
            self.provenance.clone(),
        )])
    }
}

/// Fee source fed by an external producer through a bounded channel
pub struct ChannelFeeSource {
    rx: tokio::sync::Mutex<mpsc::Receiver<FeeEvent>>,
}

/// Sending half of a [`ChannelFeeSource`]
#[derive(Debug, Clone)]
pub struct FeeInjector {
    tx: mpsc::Sender<FeeEvent>,
}

impl ChannelFeeSource {
    pub fn new(buffer: usize) -> (Self, FeeInjector) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            Self {
                rx: tokio::sync::Mutex::new(rx),
            },
            FeeInjector { tx },
        )
    }
}

impl FeeInjector {
    /// Queue a fee event for the next poll
    pub async fn inject(&self, event: FeeEvent) -> Result<(), FeeSourceError> {
        event.validate()?;
        self.tx
            .send(event)
            .await
            .map_err(|_| FeeSourceError::Unavailable("fee channel closed".into()))
    }
}

#[async_trait]
impl FeeSource for ChannelFeeSource {
    fn name(&self) -> &'static str {
        "channel"
    }

    async fn detect(&self) -> Result<Vec<FeeEvent>, FeeSourceError> {
        let mut rx = self.rx.lock().await;
        let mut events = Vec::new();
        loop {
            match rx.try_recv() {
                Ok(event) => events.push(event),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    if events.is_empty() {
                        return Err(FeeSourceError::Unavailable(
                            "all fee injectors dropped".into(),
                        ));
                    }
                    break;
                }
            }
        }
        Ok(events)
    }
}

/// Pending fees claimed by an epoch, settled only on success
#[derive(Debug, Clone, PartialEq)]
pub struct FeeClaim {
    pub amount: Decimal,
    /// Event log length at claim time; events before it are covered
    through: usize,
    last_reference: Option<String>,
}

/// Point-in-time view of the tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeTrackerSnapshot {
    pub pending: Decimal,
    pub unprocessed_events: usize,
    pub total_events: usize,
    pub lifetime_collected: Decimal,
    pub lifetime_allocated: Decimal,
    pub duplicates_rejected: u64,
    pub last_processed_reference: Option<String>,
}

#[derive(Debug, Default)]
struct FeeLedger {
    pending: Decimal,
    events: Vec<FeeEvent>,
    seen: HashSet<String>,
    settled_through: usize,
    last_processed_reference: Option<String>,
    lifetime_collected: Decimal,
    lifetime_allocated: Decimal,
    duplicates_rejected: u64,
}

/// Accumulates fee inflows between epochs
#[derive(Debug, Default)]
pub struct FeeTracker {
    ledger: Mutex<FeeLedger>,
}

impl FeeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one fee event. Returns false for duplicates and invalid events.
    pub fn record(&self, event: FeeEvent) -> bool {
        if let Err(e) = event.validate() {
            warn!(error = %e, "Rejected fee event");
            return false;
        }

        let mut ledger = self.ledger.lock();
        if ledger.seen.contains(&event.reference) {
            ledger.duplicates_rejected += 1;
            debug!(reference = %event.reference, "Duplicate fee event ignored");
            return false;
        }

        let Some(pending) = ledger
            .pending
            .checked_add(event.amount)
            .filter(|total| *total <= MAX_FEE_AMOUNT)
        else {
            warn!(
                reference = %event.reference,
                amount = %event.amount,
                pending = %ledger.pending,
                "Rejected fee event above the pending ceiling"
            );
            return false;
        };

        ledger.seen.insert(event.reference.clone());
        ledger.pending = pending;
        ledger.lifetime_collected = ledger.lifetime_collected.saturating_add(event.amount);
        debug!(
            reference = %event.reference,
            amount = %event.amount,
            provenance = %event.provenance,
            pending = %ledger.pending,
            "Fee recorded"
        );
        ledger.events.push(FeeEvent {
            processed: false,
            ..event
        });
        true
    }

    /// Record a batch, returning how many events were accepted
    pub fn record_all(&self, events: impl IntoIterator<Item = FeeEvent>) -> usize {
        events.into_iter().map(|e| self.record(e)).filter(|accepted| *accepted).count()
    }

    /// Accumulated fees not yet settled
    pub fn pending(&self) -> Decimal {
        self.ledger.lock().pending
    }

    /// Claim everything pending right now
    pub fn claim(&self) -> FeeClaim {
        let ledger = self.ledger.lock();
        FeeClaim {
            amount: ledger.pending,
            through: ledger.events.len(),
            last_reference: ledger.events.last().map(|e| e.reference.clone()),
        }
    }

    /// Settle a claim after a successful epoch
    pub fn settle(&self, claim: &FeeClaim) {
        let mut ledger = self.ledger.lock();
        let start = ledger.settled_through.min(claim.through);
        for event in &mut ledger.events[start..claim.through] {
            event.processed = true;
        }
        ledger.settled_through = ledger.settled_through.max(claim.through);
        ledger.pending -= claim.amount;
        ledger.lifetime_allocated = ledger.lifetime_allocated.saturating_add(claim.amount);
        if claim.last_reference.is_some() {
            ledger.last_processed_reference = claim.last_reference.clone();
        }
        info!(
            settled = %claim.amount,
            carried_over = %ledger.pending,
            "Fees settled"
        );
    }

    /// Most recent events, newest last
    pub fn recent_events(&self, limit: usize) -> Vec<FeeEvent> {
        let ledger = self.ledger.lock();
        let skip = ledger.events.len().saturating_sub(limit);
        ledger.events[skip..].to_vec()
    }

    pub fn snapshot(&self) -> FeeTrackerSnapshot {
        let ledger = self.ledger.lock();
        FeeTrackerSnapshot {
            pending: ledger.pending,
            unprocessed_events: ledger.events.len() - ledger.settled_through,
            total_events: ledger.events.len(),
            lifetime_collected: ledger.lifetime_collected,
            lifetime_allocated: ledger.lifetime_allocated,
            duplicates_rejected: ledger.duplicates_rejected,
            last_processed_reference: ledger.last_processed_reference.clone(),
        }
    }
}

/// Poll `source` on an interval and feed the tracker until shutdown
pub fn spawn_fee_poller(
    source: Arc<dyn FeeSource>,
    tracker: Arc<FeeTracker>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        info!(source = source.name(), interval_secs = interval.as_secs(), "Fee poller started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    poll_once(source.as_ref(), &tracker).await;
                }
                _ = shutdown.changed() => {
                    info!("Fee poller stopping");
                    break;
                }
            }
        }
    })
}

#[instrument(skip_all, fields(source = source.name()))]
async fn poll_once(source: &dyn FeeSource, tracker: &FeeTracker) {
    match source.detect().await {
        Ok(events) if events.is_empty() => {}
        Ok(events) => {
            let seen = events.len();
            let accepted = tracker.record_all(events);
            debug!(seen, accepted, "Fee poll complete");
        }
        Err(e) => warn!(error = %e, "Fee detection failed"),
    }
}
