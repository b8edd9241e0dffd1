//! Playback collaborator.
//!
//! The dashboard never drives the player itself. It only needs to know whether
//! a broadcast is playable and where the viewer stopped, so this module keeps
//! the player-side bookkeeping the host reports back with.

use std::time::Duration;

use futures::Stream;
use serde::Serialize;

/// Streaming protocol of a playback URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LinkType {
    Hls,
    Dash,
    #[default]
    Unknown,
}

/// State reported by the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PlaybackState {
    #[default]
    Idle,
    Play,
    Pause,
    Error,
}

/// Host-side record of one fullscreen playback
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackSession {
    pub url: String,
    pub link_type: LinkType,
    pub position: i64,
    pub state: PlaybackState,
}

impl PlaybackSession {
    pub fn new(url: impl Into<String>, link_type: LinkType, start_from: i64) -> Self {
        Self {
            url: url.into(),
            link_type,
            position: start_from.max(0),
            state: PlaybackState::Idle,
        }
    }

    pub fn on_state_changed(&mut self, state: PlaybackState) {
        tracing::debug!("Player state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    pub fn advance(&mut self, millis: i64) {
        if self.state == PlaybackState::Play {
            self.position = self.position.saturating_add(millis.max(0));
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Play
    }
}

/// Sample the player's position every `interval`, forever.
///
/// The first value is produced after one full interval, not immediately.
pub fn position_stream<F>(interval: Duration, read: F) -> impl Stream<Item = i64>
where
    F: FnMut() -> i64,
{
    futures::stream::unfold(read, move |mut read| async move {
        tokio::time::sleep(interval).await;
        let position = read();
        Some((position, read))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicI64, Ordering};

    #[test]
    fn test_session_only_advances_while_playing() {
        let mut session = PlaybackSession::new("https://cdn/live.m3u8", LinkType::Hls, 1_000);
        session.advance(500);
        assert_eq!(session.position, 1_000);

        session.on_state_changed(PlaybackState::Play);
        session.advance(500);
        assert_eq!(session.position, 1_500);
        assert!(session.is_playing());

        session.on_state_changed(PlaybackState::Pause);
        session.advance(500);
        assert_eq!(session.position, 1_500);
        assert!(!session.is_playing());
    }

    #[test]
    fn test_negative_start_is_clamped() {
        let session = PlaybackSession::new("u", LinkType::Dash, -10);
        assert_eq!(session.position, 0);
        assert_eq!(session.state, PlaybackState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_position_stream_samples_on_interval() {
        let position = Arc::new(AtomicI64::new(0));
        let reader = position.clone();
        let stream = position_stream(Duration::from_millis(100), move || {
            reader.fetch_add(100, Ordering::SeqCst) + 100
        });

        let samples: Vec<i64> = stream.take(3).collect().await;
        assert_eq!(samples, vec![100, 200, 300]);
        assert_eq!(position.load(Ordering::SeqCst), 300);
    }
}
