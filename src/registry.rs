use crate::coin::{self, CoinRecord};
use crate::poller::{PollEvent, PollEventKind};
use tracing::{debug, warn};

/// What a view does with its list when a poll fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Keep the last good snapshot.
    RetainStale,
    /// Replace the list with a single synthetic fallback coin.
    SubstituteFallback,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    Started,
    Replaced,
    Failed,
    /// Result older than one already applied.
    Stale,
    /// Event from a previous poller generation.
    Ignored,
}

/// Latest coin list for one polling view.
#[derive(Clone, Debug)]
pub struct CoinRegistry {
    coins: Vec<CoinRecord>,
    policy: FailurePolicy,
    failure_message: &'static str,
    generation: u64,
    in_flight: usize,
    last_applied_seq: u64,
    error: Option<String>,
    ticks: u64,
}

impl CoinRegistry {
    pub fn new(policy: FailurePolicy, failure_message: &'static str) -> Self {
        Self {
            coins: Vec::new(),
            policy,
            failure_message,
            generation: 0,
            in_flight: 0,
            last_applied_seq: 0,
            error: None,
            ticks: 0,
        }
    }

    pub fn coins(&self) -> &[CoinRecord] {
        &self.coins
    }

    pub fn find(&self, id: &str) -> Option<&CoinRecord> {
        self.coins.iter().find(|c| c.id == id)
    }

    pub fn is_loading(&self) -> bool {
        self.in_flight > 0
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    #[cfg(test)]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Number of successful snapshots applied so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Switches to a new poller generation. Current data stays visible until
    /// the new poller delivers; anything from older generations is ignored.
    pub fn begin_generation(&mut self, generation: u64) {
        self.generation = generation;
        self.in_flight = 0;
        self.last_applied_seq = 0;
    }

    pub fn apply(&mut self, event: PollEvent) -> ApplyOutcome {
        if event.generation != self.generation {
            debug!(
                "Ignoring {:?} event from generation {} (current {})",
                event.poller, event.generation, self.generation
            );
            return ApplyOutcome::Ignored;
        }

        match event.kind {
            PollEventKind::Started => {
                self.in_flight += 1;
                self.error = None;
                ApplyOutcome::Started
            }
            PollEventKind::Loaded(coins) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                if event.seq <= self.last_applied_seq {
                    debug!(
                        "Discarding stale {:?} snapshot #{} (have #{})",
                        event.poller, event.seq, self.last_applied_seq
                    );
                    return ApplyOutcome::Stale;
                }
                self.last_applied_seq = event.seq;
                self.coins = coins;
                self.ticks += 1;
                ApplyOutcome::Replaced
            }
            PollEventKind::Failed(err) => {
                self.in_flight = self.in_flight.saturating_sub(1);
                if event.seq <= self.last_applied_seq {
                    return ApplyOutcome::Stale;
                }
                self.last_applied_seq = event.seq;
                warn!("{:?} poll failed: {}", event.poller, err);
                self.error = Some(self.failure_message.to_string());
                if self.policy == FailurePolicy::SubstituteFallback {
                    self.coins = vec![coin::fallback_coin()];
                }
                ApplyOutcome::Failed
            }
        }
    }
}
