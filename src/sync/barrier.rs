use crate::core::{Context, MqError, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio::sync::Notify;

const WAITING: u8 = 0;
const RELEASED: u8 = 1;
const BROKEN: u8 = 2;

/// One generation of a phase.
#[derive(Default)]
struct Round {
    outcome: AtomicU8,
    notify: Notify,
}

impl Round {
    fn outcome(&self) -> u8 {
        self.outcome.load(Ordering::SeqCst)
    }

    fn finish(&self, outcome: u8) {
        self.outcome.store(outcome, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

struct PhaseState {
    arrived: usize,
    round: Arc<Round>,
}

/// Cyclic barrier for one phase.
struct Phase {
    parties: usize,
    state: Mutex<PhaseState>,
}

impl Phase {
    fn new(parties: usize) -> Self {
        Self {
            parties,
            state: Mutex::new(PhaseState {
                arrived: 0,
                round: Arc::new(Round::default()),
            }),
        }
    }

    /// Starts a fresh round, returning the one that just ended.
    fn rotate(state: &mut PhaseState) -> Arc<Round> {
        state.arrived = 0;
        std::mem::replace(&mut state.round, Arc::new(Round::default()))
    }

    async fn wait(&self, ctx: &Context) -> Result<bool> {
        if let Some(err) = ctx.err() {
            return Err(err);
        }

        let round = {
            let mut state = self.state.lock();
            state.arrived += 1;
            if state.arrived == self.parties {
                Self::rotate(&mut state).finish(RELEASED);
                return Ok(true);
            }
            Arc::clone(&state.round)
        };

        let notified = round.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if round.outcome() == WAITING {
            tokio::select! {
                biased;
                _ = &mut notified => {}
                err = ctx.done() => {
                    if self.break_round(&round) || round.outcome() != RELEASED {
                        return Err(err);
                    }
                }
            }
        }

        match round.outcome() {
            RELEASED => Ok(false),
            _ => Err(MqError::BrokenBarrier),
        }
    }

    /// Breaks `round` if it is still the current one. Returns whether it did.
    fn break_round(&self, round: &Arc<Round>) -> bool {
        let mut state = self.state.lock();
        if !Arc::ptr_eq(&state.round, round) {
            return false;
        }
        Self::rotate(&mut state).finish(BROKEN);
        true
    }
}

/// Reusable two-phase barrier.
///
/// `parties` tasks wait for each other in [`enter`](Self::enter) before doing their work,
/// and again in [`leave`](Self::leave) afterwards. Both phases reset once released, so
/// the same barrier serves any number of rounds.
///
/// A party whose context ends while waiting breaks the round: it gets its context error,
/// the other parties waiting in that round get [`MqError::BrokenBarrier`], and the phase
/// starts over empty.
pub struct CyclicDoubleBarrier {
    parties: usize,
    entry: Phase,
    exit: Phase,
}

impl CyclicDoubleBarrier {
    /// # Panics
    ///
    /// Panics if `parties` is zero.
    pub fn new(parties: usize) -> Self {
        assert!(parties > 0, "parties must be a positive number");
        Self {
            parties,
            entry: Phase::new(parties),
            exit: Phase::new(parties),
        }
    }

    pub fn parties(&self) -> usize {
        self.parties
    }

    /// Waits until every party has entered. Returns `true` for exactly one party.
    pub async fn enter(&self, ctx: &Context) -> Result<bool> {
        self.entry.wait(ctx).await
    }

    /// Waits until every party has left. Returns `true` for exactly one party.
    pub async fn leave(&self, ctx: &Context) -> Result<bool> {
        self.exit.wait(ctx).await
    }
}
