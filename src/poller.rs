use crate::coin::{CoinRecord, SortKey};
use crate::error::FetchError;
use crate::source::CoinSource;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Which view owns a poller. The grid and the tab list poll independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PollerId {
    Grid,
    Tabs,
}

#[derive(Clone, Debug)]
pub enum PollEventKind {
    Started,
    Loaded(Vec<CoinRecord>),
    Failed(FetchError),
}

/// One message from a poller task. `seq` increases per request within a
/// generation; `generation` changes every time the owner restarts its poller.
#[derive(Clone, Debug)]
pub struct PollEvent {
    pub poller: PollerId,
    pub generation: u64,
    pub seq: u64,
    pub kind: PollEventKind,
}

/// Owning handle of a running poller. Cancelling (or dropping) it stops the
/// ticker, and in-flight fetches finishing afterwards send nothing.
#[derive(Debug)]
pub struct PollerHandle {
    id: PollerId,
    generation: u64,
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            info!("Poller {:?} generation {} cancelled", self.id, self.generation);
        }
        self.task.abort();
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[derive(Clone, Debug)]
pub struct PollerConfig {
    pub id: PollerId,
    pub generation: u64,
    pub sort: Option<SortKey>,
    pub interval: Duration,
}

/// Fetches immediately, then once per `interval`. Each fetch runs on its own
/// task so a hung request never delays the next tick.
pub fn spawn_poller<S: CoinSource>(
    source: Arc<S>,
    config: PollerConfig,
    event_tx: UnboundedSender<PollEvent>,
) -> PollerHandle {
    let cancelled = Arc::new(AtomicBool::new(false));
    let cancelled_bg = cancelled.clone();
    let PollerConfig {
        id,
        generation,
        sort,
        interval: period,
    } = config;

    info!(
        "Starting poller {:?} generation {} (sort={:?}, every {:?})",
        id, generation, sort, period
    );

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut seq: u64 = 0;

        loop {
            interval.tick().await;
            if cancelled_bg.load(Ordering::Acquire) {
                return;
            }
            seq += 1;

            let send = |kind: PollEventKind| PollEvent {
                poller: id,
                generation,
                seq,
                kind,
            };
            if event_tx.send(send(PollEventKind::Started)).is_err() {
                debug!("Poller {:?} receiver dropped; stopping", id);
                return;
            }

            let source = source.clone();
            let cancelled = cancelled_bg.clone();
            let tx = event_tx.clone();
            let started = send(PollEventKind::Started);
            tokio::spawn(async move {
                let kind = match source.fetch_coins(sort).await {
                    Ok(coins) => PollEventKind::Loaded(coins),
                    Err(err) => {
                        warn!("Poller {:?} fetch #{} failed: {}", id, started.seq, err);
                        PollEventKind::Failed(err)
                    }
                };
                if cancelled.load(Ordering::Acquire) {
                    debug!("Dropping late result #{} for cancelled poller {:?}", started.seq, id);
                    return;
                }
                let _ = tx.send(PollEvent { kind, ..started });
            });
        }
    });

    PollerHandle {
        id,
        generation,
        cancelled,
        task,
    }
}
