//! Published screen state.
//!
//! Subscribers receive the current value on subscription and then every
//! publish, in order and without coalescing. Every publish is tagged with
//! an epoch; starting a new transition bumps it, and writes carrying an
//! older epoch are refused under the same lock, so a refresh that was
//! superseded can never publish.

use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use super::ScreenState;

struct Published {
    current: ScreenState,
    epoch: u64,
    subscribers: Vec<mpsc::UnboundedSender<ScreenState>>,
}

impl Published {
    fn set(&mut self, state: ScreenState) {
        tracing::trace!("Publishing {} (epoch {})", state.name(), self.epoch);
        self.subscribers.retain(|tx| tx.send(state.clone()).is_ok());
        self.current = state;
    }
}

/// Holder of the single published [`ScreenState`]
pub struct StateHolder {
    inner: Mutex<Published>,
}

impl StateHolder {
    pub fn new(initial: ScreenState) -> Self {
        Self {
            inner: Mutex::new(Published {
                current: initial,
                epoch: 0,
                subscribers: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Published> {
        // Poisoning is ignored: every write replaces `current` whole
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Last published value
    pub fn current(&self) -> ScreenState {
        self.lock().current.clone()
    }

    /// Current value together with the epoch it belongs to
    pub fn snapshot(&self) -> (u64, ScreenState) {
        let inner = self.lock();
        (inner.epoch, inner.current.clone())
    }

    pub fn subscribe(&self) -> StateSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        // Receiver is alive, the send cannot fail
        let _ = tx.send(inner.current.clone());
        inner.subscribers.push(tx);
        StateSubscription { rx }
    }

    /// Start a new epoch with `state`. Everything still holding an older
    /// epoch loses the right to publish.
    pub(crate) fn begin(&self, state: ScreenState) -> u64 {
        let mut inner = self.lock();
        inner.epoch += 1;
        inner.set(state);
        inner.epoch
    }

    /// Publish `state` if `epoch` is still the current one
    pub(crate) fn publish(&self, epoch: u64, state: ScreenState) -> bool {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return false;
        }
        inner.set(state);
        true
    }

    /// Derive the next state from the current one, atomically. `next`
    /// returning `None` publishes nothing.
    pub(crate) fn update<F>(&self, epoch: u64, next: F) -> bool
    where
        F: FnOnce(&ScreenState) -> Option<ScreenState>,
    {
        let mut inner = self.lock();
        if inner.epoch != epoch {
            return false;
        }
        match next(&inner.current) {
            Some(state) => {
                inner.set(state);
                true
            }
            None => false,
        }
    }
}

/// In-order stream of published states
pub struct StateSubscription {
    rx: mpsc::UnboundedReceiver<ScreenState>,
}

impl StateSubscription {
    /// Wait for the next published state. `None` once the holder is gone.
    pub async fn next(&mut self) -> Option<ScreenState> {
        self.rx.recv().await
    }

    /// Next already-published state, without waiting
    pub fn try_next(&mut self) -> Option<ScreenState> {
        self.rx.try_recv().ok()
    }

    /// Everything published since the last read
    pub fn drain(&mut self) -> Vec<ScreenState> {
        std::iter::from_fn(|| self.try_next()).collect()
    }
}

impl Stream for StateSubscription {
    type Item = ScreenState;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
