//! Loading phases and the per-phase fan-out.

use std::time::Duration;

use serde::Serialize;

use super::source::{DataSource, PartialUpdate};

/// Steps of a dashboard refresh, executed strictly in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LoadingPhase {
    Broadcast,
    Investments,
    FutureProducts,
    News,
}

impl LoadingPhase {
    pub const ALL: [LoadingPhase; 4] = [
        LoadingPhase::Broadcast,
        LoadingPhase::Investments,
        LoadingPhase::FutureProducts,
        LoadingPhase::News,
    ];

    /// Phases in the order a refresh walks them
    pub fn sequence() -> impl Iterator<Item = LoadingPhase> {
        Self::ALL.into_iter()
    }

    pub fn description(&self) -> &'static str {
        match self {
            LoadingPhase::Broadcast => "current broadcast",
            LoadingPhase::Investments => "investments",
            LoadingPhase::FutureProducts => "future products",
            LoadingPhase::News => "news",
        }
    }
}

/// Run every source relevant to `phase` concurrently and wait for all of them.
///
/// The result has one slot per registered source, in registration order, so
/// the caller can merge deterministically no matter which source finished
/// first. A source that fails, times out or skips the phase leaves `None`.
pub(crate) async fn load_phase(
    phase: LoadingPhase,
    sources: &[Box<dyn DataSource>],
    timeout: Duration,
) -> Vec<Option<PartialUpdate>> {
    let loads = sources.iter().map(|source| async move {
        if !source.handles(phase) {
            return None;
        }

        match tokio::time::timeout(timeout, source.load_data(phase)).await {
            Ok(Ok(update)) => update,
            Ok(Err(e)) => {
                tracing::warn!(
                    "{} failed to load {}: {:#}",
                    source.name(),
                    phase.description(),
                    e
                );
                None
            }
            Err(_) => {
                tracing::warn!(
                    "{} timed out loading {} after {:?}",
                    source.name(),
                    phase.description(),
                    timeout
                );
                None
            }
        }
    });

    futures::future::join_all(loads).await
}
