//! One-shot side effects for the host (navigation, transient messages).
//!
//! Every attached subscriber receives every effect, each through its own
//! bounded buffer. While nobody is attached, effects accumulate in a backlog
//! that the next subscriber starts with. Once a buffer (or the backlog) is
//! full, producers wait for room instead of dropping anything.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use futures::future::join_all;
use futures::{Stream, StreamExt};
use serde::Serialize;
use tokio::sync::{Notify, mpsc};

use crate::models::Product;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SideEffect {
    NavigateToProduct(Product),
    NavigateToInvestmentsComingSoon,
}

/// Navigation capabilities the host provides
pub trait Navigator {
    fn navigate_to_product(&mut self, product: &Product);
    fn show_coming_soon(&mut self);
}

struct Channel {
    capacity: usize,
    /// Effects emitted while no subscriber was attached
    backlog: VecDeque<SideEffect>,
    subscribers: Vec<(u64, mpsc::Sender<SideEffect>)>,
    next_id: u64,
}

struct Shared {
    channel: Mutex<Channel>,
    /// Signalled when the backlog is handed to a subscriber
    room: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Channel> {
        self.channel
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Producer side of the effect channel. Cheap to clone.
#[derive(Clone)]
pub struct SideEffects {
    shared: Arc<Shared>,
}

impl SideEffects {
    /// `capacity` effects are buffered per subscriber (and in the backlog)
    /// before producers start waiting
    pub fn new(capacity: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                channel: Mutex::new(Channel {
                    capacity: capacity.max(1),
                    backlog: VecDeque::new(),
                    subscribers: Vec::new(),
                    next_id: 0,
                }),
                room: Notify::new(),
            }),
        }
    }

    /// Deliver an effect to every subscriber, waiting for buffer room if
    /// necessary
    pub async fn emit(&self, effect: SideEffect) {
        tracing::debug!("Side effect: {:?}", effect);
        loop {
            // Registered before the lock so a hand-off in between still wakes us
            let room = self.shared.room.notified();
            let targets: Vec<_> = {
                let mut channel = self.shared.lock();
                channel.subscribers.retain(|(_, tx)| !tx.is_closed());
                if channel.subscribers.is_empty() && channel.backlog.len() < channel.capacity {
                    channel.backlog.push_back(effect);
                    return;
                }
                channel.subscribers.iter().map(|(_, tx)| tx.clone()).collect()
            };

            if targets.is_empty() {
                tracing::trace!("Side effect backlog full, waiting for a subscriber");
                room.await;
                continue;
            }

            let sends = targets.iter().map(|tx| tx.send(effect.clone()));
            let delivered = join_all(sends).await.iter().filter(|r| r.is_ok()).count();
            if delivered > 0 {
                return;
            }
            // Every target detached while we waited; fall back to the backlog
        }
    }

    /// Attach a subscriber. The first subscriber after a quiet period starts
    /// with the backlog.
    pub fn subscribe(&self) -> SideEffectStream {
        let mut channel = self.shared.lock();
        let (tx, rx) = mpsc::channel(channel.capacity);
        for effect in channel.backlog.drain(..) {
            // The backlog never exceeds the buffer capacity
            let _ = tx.try_send(effect);
        }
        let id = channel.next_id;
        channel.next_id += 1;
        channel.subscribers.push((id, tx));
        drop(channel);

        self.shared.room.notify_waiters();
        SideEffectStream {
            id,
            rx,
            shared: Arc::downgrade(&self.shared),
        }
    }
}

/// Consumer side of the effect channel.
///
/// Dropping the last subscriber returns its undelivered effects to the
/// backlog, so subscribing again continues where it left off.
pub struct SideEffectStream {
    id: u64,
    rx: mpsc::Receiver<SideEffect>,
    shared: Weak<Shared>,
}

impl SideEffectStream {
    /// Wait for the next effect. `None` once every producer is gone.
    pub async fn next(&mut self) -> Option<SideEffect> {
        self.rx.recv().await
    }

    pub fn into_stream(self) -> impl Stream<Item = SideEffect> {
        futures::stream::unfold(self, |mut effects| async move {
            let effect = effects.next().await?;
            Some((effect, effects))
        })
    }

    /// Forward every effect to `navigator` until the producers are gone
    pub async fn dispatch<N: Navigator>(self, navigator: &mut N) {
        let mut effects = std::pin::pin!(self.into_stream());
        while let Some(effect) = effects.next().await {
            match effect {
                SideEffect::NavigateToProduct(product) => navigator.navigate_to_product(&product),
                SideEffect::NavigateToInvestmentsComingSoon => navigator.show_coming_soon(),
            }
        }
    }
}

impl Drop for SideEffectStream {
    fn drop(&mut self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        let mut channel = shared.lock();
        channel.subscribers.retain(|(id, _)| *id != self.id);
        // Closed first: a producer still waiting on this buffer retries elsewhere
        self.rx.close();
        if channel.subscribers.is_empty() {
            while let Ok(effect) = self.rx.try_recv() {
                channel.backlog.push_back(effect);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::product;
    use futures::{FutureExt, StreamExt};
    use std::time::Duration;

    #[tokio::test]
    async fn test_effects_buffer_until_consumed() {
        let effects = SideEffects::new(4);
        effects.emit(SideEffect::NavigateToInvestmentsComingSoon).await;
        effects
            .emit(SideEffect::NavigateToProduct(product(1, "Acme")))
            .await;
        let mut stream = effects.subscribe();
        assert_eq!(
            stream.next().await,
            Some(SideEffect::NavigateToInvestmentsComingSoon)
        );
        assert_eq!(
            stream.next().await,
            Some(SideEffect::NavigateToProduct(product(1, "Acme")))
        );
        assert!(stream.next().now_or_never().is_none());
    }

    #[tokio::test]
    async fn test_full_buffer_suspends_producer() {
        let effects = SideEffects::new(1);
        effects.emit(SideEffect::NavigateToInvestmentsComingSoon).await;

        let producer = effects.clone();
        let blocked = tokio::spawn(async move {
            producer
                .emit(SideEffect::NavigateToProduct(product(2, "Globex")))
                .await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        let mut stream = effects.subscribe();
        assert_eq!(
            stream.next().await,
            Some(SideEffect::NavigateToInvestmentsComingSoon)
        );
        blocked.await.unwrap();
        assert_eq!(
            stream.next().await,
            Some(SideEffect::NavigateToProduct(product(2, "Globex")))
        );
    }

    #[tokio::test]
    async fn test_resubscribe_continues_from_buffer() {
        let effects = SideEffects::new(8);
        for id in 1..=3 {
            effects
                .emit(SideEffect::NavigateToProduct(product(id, "P")))
                .await;
        }

        let mut first = effects.subscribe();
        assert_eq!(
            first.next().await,
            Some(SideEffect::NavigateToProduct(product(1, "P")))
        );
        drop(first);

        let rest: Vec<_> = effects.subscribe().into_stream().take(2).collect().await;
        assert_eq!(
            rest,
            vec![
                SideEffect::NavigateToProduct(product(2, "P")),
                SideEffect::NavigateToProduct(product(3, "P")),
            ]
        );
        assert!(effects.subscribe().next().now_or_never().is_none());
    }

    #[tokio::test]
    async fn test_every_subscriber_sees_every_effect() {
        let effects = SideEffects::new(4);
        let mut a = effects.subscribe();
        let mut b = effects.subscribe();

        effects
            .emit(SideEffect::NavigateToProduct(product(1, "Acme")))
            .await;
        effects.emit(SideEffect::NavigateToInvestmentsComingSoon).await;

        for stream in [&mut a, &mut b] {
            assert_eq!(
                stream.next().await,
                Some(SideEffect::NavigateToProduct(product(1, "Acme")))
            );
            assert_eq!(
                stream.next().await,
                Some(SideEffect::NavigateToInvestmentsComingSoon)
            );
        }
    }

    #[tokio::test]
    async fn test_detached_subscriber_does_not_block_others() {
        let effects = SideEffects::new(1);
        let mut kept = effects.subscribe();
        let dropped = effects.subscribe();
        drop(dropped);

        let producer = effects.clone();
        let emitting = tokio::spawn(async move {
            for id in 1..=3 {
                producer
                    .emit(SideEffect::NavigateToProduct(product(id, "P")))
                    .await;
            }
        });

        for id in 1..=3 {
            assert_eq!(
                kept.next().await,
                Some(SideEffect::NavigateToProduct(product(id, "P")))
            );
        }
        emitting.await.unwrap();
    }

    #[tokio::test]
    async fn test_slow_subscriber_suspends_producer() {
        let effects = SideEffects::new(1);
        let mut fast = effects.subscribe();
        let mut slow = effects.subscribe();

        effects.emit(SideEffect::NavigateToInvestmentsComingSoon).await;
        assert_eq!(
            fast.next().await,
            Some(SideEffect::NavigateToInvestmentsComingSoon)
        );

        let producer = effects.clone();
        let blocked = tokio::spawn(async move {
            producer
                .emit(SideEffect::NavigateToProduct(product(5, "Hooli")))
                .await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        assert_eq!(
            slow.next().await,
            Some(SideEffect::NavigateToInvestmentsComingSoon)
        );
        blocked.await.unwrap();
        assert_eq!(
            fast.next().await,
            Some(SideEffect::NavigateToProduct(product(5, "Hooli")))
        );
        assert_eq!(
            slow.next().await,
            Some(SideEffect::NavigateToProduct(product(5, "Hooli")))
        );
    }

    #[derive(Default)]
    struct RecordingNavigator {
        products: Vec<i64>,
        coming_soon: usize,
    }

    impl Navigator for RecordingNavigator {
        fn navigate_to_product(&mut self, product: &Product) {
            self.products.push(product.id);
        }

        fn show_coming_soon(&mut self) {
            self.coming_soon += 1;
        }
    }

    #[tokio::test]
    async fn test_dispatch_drives_navigator_until_closed() {
        let effects = SideEffects::new(4);
        effects
            .emit(SideEffect::NavigateToProduct(product(7, "Initech")))
            .await;
        effects.emit(SideEffect::NavigateToInvestmentsComingSoon).await;

        let stream = effects.subscribe();
        drop(effects);

        let mut navigator = RecordingNavigator::default();
        stream.dispatch(&mut navigator).await;
        assert_eq!(navigator.products, vec![7]);
        assert_eq!(navigator.coming_soon, 1);
    }
}
