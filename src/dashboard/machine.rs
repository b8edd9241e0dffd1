//! Dashboard state machine.
//!
//! Every transition goes through [`DashboardMachine::request_transition`]:
//! the in-flight refresh is aborted, `Loading(next)` is published, and the
//! machine immediately resolves `next` into content (starting a phased
//! refresh) or fullscreen playback.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;

use super::effects::{SideEffect, SideEffectStream, SideEffects};
use super::holder::{StateHolder, StateSubscription};
use super::phase::{self, LoadingPhase};
use super::source::DataSource;
use super::{ContentState, PendingTransition, ScreenState};
use crate::config::DashboardConfig;
use crate::models::{Broadcast, Investment, Product};
use crate::task::{PollResult, poll_task};

/// How often [`DashboardMachine::settle`] checks on the refresh
const SETTLE_POLL_INTERVAL: Duration = Duration::from_millis(10);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared with the refresh task
struct Shared {
    state: StateHolder,
    sources: Vec<Box<dyn DataSource>>,
    source_timeout: Duration,
    /// Most recent broadcast any refresh published; playback reads its URL
    last_broadcast: Mutex<Option<Broadcast>>,
}

/// The dashboard screen's state machine
pub struct DashboardMachine {
    shared: Arc<Shared>,
    /// In-flight phased refresh. Holding this lock serializes transitions.
    refresh: Mutex<Option<JoinHandle<()>>>,
    effects: SideEffects,
}

impl DashboardMachine {
    /// Create a machine in the initial `Loading` state. Sources are merged
    /// in the order given; later sources win when two write the same field.
    pub fn new(sources: Vec<Box<dyn DataSource>>, config: &DashboardConfig) -> Self {
        tracing::debug!("Dashboard created with {} sources", sources.len());
        Self {
            shared: Arc::new(Shared {
                state: StateHolder::new(ScreenState::Loading(PendingTransition::initial())),
                sources,
                source_timeout: Duration::from_secs(config.source_timeout_secs),
                last_broadcast: Mutex::new(None),
            }),
            refresh: Mutex::new(None),
            effects: SideEffects::new(config.side_effect_capacity),
        }
    }

    /// Resolve the initial loading state. Must run inside a tokio runtime;
    /// calling it again once started does nothing.
    pub fn start(&self) {
        let mut refresh = lock(&self.refresh);
        let (epoch, state) = self.shared.state.snapshot();
        match state {
            ScreenState::Loading(next) => self.enter_loading(&mut refresh, epoch, next),
            other => tracing::debug!("Dashboard already started ({})", other.name()),
        }
    }

    /// Last published state
    pub fn state(&self) -> ScreenState {
        self.shared.state.current()
    }

    pub fn subscribe(&self) -> StateSubscription {
        self.shared.state.subscribe()
    }

    pub fn side_effects(&self) -> SideEffectStream {
        self.effects.subscribe()
    }

    /// Whether a phased refresh is still running
    pub fn is_refreshing(&self) -> bool {
        let mut refresh = lock(&self.refresh);
        match poll_task(&mut refresh) {
            PollResult::Pending => true,
            PollResult::Complete(Err(e)) if e.is_panic() => {
                tracing::error!("Dashboard refresh panicked: {}", e);
                false
            }
            _ => false,
        }
    }

    /// Wait until no refresh is running
    pub async fn settle(&self) {
        while self.is_refreshing() {
            tokio::time::sleep(SETTLE_POLL_INTERVAL).await;
        }
    }

    /// Cancel whatever is loading and move towards `next`
    pub fn request_transition(&self, next: PendingTransition) {
        let mut refresh = lock(&self.refresh);
        self.transition(&mut refresh, next);
    }

    fn transition(&self, refresh: &mut Option<JoinHandle<()>>, next: PendingTransition) {
        if let Some(job) = refresh.take() {
            job.abort();
        }

        tracing::debug!("Transition to {:?}", next);
        let epoch = self.shared.state.begin(ScreenState::Loading(next.clone()));
        self.enter_loading(refresh, epoch, next);
    }

    fn enter_loading(&self, refresh: &mut Option<JoinHandle<()>>, epoch: u64, next: PendingTransition) {
        match next {
            PendingTransition::ToContent {
                from_player,
                last_position,
            } => {
                let content = ContentState::new(from_player, last_position);
                if self.shared.state.publish(epoch, ScreenState::Content(content)) {
                    *refresh = Some(tokio::spawn(refresh_content(self.shared.clone(), epoch)));
                }
            }
            PendingTransition::ToPlayback { last_position } => {
                let link = lock(&self.shared.last_broadcast).as_ref().and_then(|broadcast| {
                    broadcast
                        .playback_link()
                        .map(|(link_type, url)| (link_type, url.to_string()))
                });

                match link {
                    Some((link_type, url)) => {
                        tracing::info!("Entering fullscreen playback of {}", url);
                        self.shared.state.publish(
                            epoch,
                            ScreenState::FullscreenPlayback {
                                url,
                                link_type,
                                initial_position: last_position.unwrap_or(0),
                            },
                        );
                    }
                    None => {
                        tracing::warn!("No playable broadcast, returning to content");
                        self.transition(
                            refresh,
                            PendingTransition::ToContent {
                                from_player: true,
                                last_position: 0,
                            },
                        );
                    }
                }
            }
        }
    }

    pub async fn on_product_selected(&self, product: Product) {
        self.effects.emit(SideEffect::NavigateToProduct(product)).await;
    }

    /// Investment details are not available yet; every selection only
    /// announces that.
    pub async fn on_investment_selected(&self, _investment: &Investment) {
        self.effects
            .emit(SideEffect::NavigateToInvestmentsComingSoon)
            .await;
    }

    pub fn on_fullscreen(&self, last_position: i64) {
        self.request_transition(PendingTransition::ToPlayback {
            last_position: Some(last_position),
        });
    }

    pub fn on_exit_fullscreen(&self, last_position: i64, is_playing: bool) {
        self.request_transition(PendingTransition::leave_player(last_position, is_playing));
    }

    /// Back navigation only means something while in fullscreen playback.
    /// Returns whether a transition happened.
    pub fn navigate_back(&self, last_position: i64, is_playing: bool) -> bool {
        let mut refresh = lock(&self.refresh);
        if !self.shared.state.current().is_playback() {
            tracing::debug!("Back navigation ignored outside playback");
            return false;
        }
        self.transition(
            &mut refresh,
            PendingTransition::leave_player(last_position, is_playing),
        );
        true
    }
}

impl Drop for DashboardMachine {
    fn drop(&mut self) {
        if let Some(job) = lock(&self.refresh).take() {
            job.abort();
        }
    }
}

/// Walk the loading phases, merging each phase's results into the
/// published content. Stops as soon as a newer transition owns the state.
async fn refresh_content(shared: Arc<Shared>, epoch: u64) {
    let start = Instant::now();

    for phase in LoadingPhase::sequence() {
        let updates = phase::load_phase(phase, &shared.sources, shared.source_timeout).await;
        let loaded = updates.iter().filter(|u| u.is_some()).count();

        let applied = shared.state.update(epoch, |current| {
            let ScreenState::Content(content) = current else {
                return None;
            };

            let merged = shared.sources.iter().zip(updates).fold(
                content.clone(),
                |state, (source, update)| match update {
                    Some(update) => source.create_state(state, update),
                    None => state,
                },
            );

            if let Some(broadcast) = &merged.broadcast {
                *lock(&shared.last_broadcast) = Some(broadcast.clone());
            }
            Some(ScreenState::Content(merged))
        });

        if !applied {
            tracing::debug!("Refresh superseded before merging {}", phase.description());
            return;
        }
        tracing::debug!(
            "Merged {} ({} of {} sources)",
            phase.description(),
            loaded,
            shared.sources.len()
        );
    }

    tracing::info!(
        "Dashboard refreshed in {:.1}s",
        start.elapsed().as_secs_f32()
    );
}
