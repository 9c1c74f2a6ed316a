//! Single-flight token refresh: `Idle -> Refreshing -> Idle`.
//!
//! The first caller to hit an expired token becomes the leader and starts the
//! refresh. Everyone arriving while it runs is queued behind it. When the
//! refresh settles, the queue is drained front to back so waiters replay in
//! arrival order.
//!
//! Every successful refresh bumps a generation counter. A caller passes the
//! generation it saw before its request went out, so a 401 that lands after a
//! refresh already finished replays at once instead of starting another.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshSettlement {
    Refreshed,
    Failed { reason: String },
}

#[derive(Debug, Default)]
struct RefreshState {
    refreshing: bool,
    generation: u64,
    waiters: VecDeque<oneshot::Sender<RefreshSettlement>>,
}

/// Ticket returned by [`RefreshCoordinator::enqueue`].
#[derive(Debug)]
pub struct RefreshTicket {
    pub receiver: oneshot::Receiver<RefreshSettlement>,
    /// This caller must start the refresh.
    pub is_leader: bool,
}

#[derive(Debug, Default)]
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    refresh_count: AtomicU64,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the waiter queue, becoming leader if no refresh is running.
    ///
    /// `seen_generation` is [`generation`](Self::generation) as read before
    /// the rejected request was issued. If a refresh has succeeded since and
    /// none is running, the ticket is already settled with `Refreshed`.
    /// Check and enqueue happen under one lock.
    pub fn enqueue(&self, seen_generation: u64) -> RefreshTicket {
        let (sender, receiver) = oneshot::channel();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if !state.refreshing && state.generation != seen_generation {
            let _ = sender.send(RefreshSettlement::Refreshed);
            return RefreshTicket {
                receiver,
                is_leader: false,
            };
        }

        let is_leader = !state.refreshing;
        if is_leader {
            state.refreshing = true;
            self.refresh_count.fetch_add(1, Ordering::Relaxed);
        }
        state.waiters.push_back(sender);

        RefreshTicket {
            receiver,
            is_leader,
        }
    }

    /// Release every waiter with `settlement` and return to idle.
    ///
    /// Returns how many waiters were released.
    pub fn settle(&self, settlement: RefreshSettlement) -> usize {
        let waiters = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.refreshing = false;
            if settlement == RefreshSettlement::Refreshed {
                state.generation += 1;
            }
            std::mem::take(&mut state.waiters)
        };

        let released = waiters.len();
        for waiter in waiters {
            // A waiter whose caller went away is simply skipped.
            let _ = waiter.send(settlement.clone());
        }
        released
    }

    /// Successful refreshes so far.
    pub fn generation(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .generation
    }

    pub fn is_refreshing(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .refreshing
    }

    pub fn waiting(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .waiters
            .len()
    }

    /// Refresh operations started since creation.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_count.load(Ordering::Relaxed)
    }
}
