//! Dashboard screen core.
//!
//! This module handles:
//! - The screen state machine (loading, content, fullscreen playback)
//! - Phased, cancellable refresh of the content from several data sources
//! - One-shot side effects (navigation, messages) for the host
//!
//! The host subscribes to [`DashboardMachine::subscribe`] and
//! [`DashboardMachine::side_effects`] and forwards input events to the
//! machine's methods. State is only ever written by the machine.

mod effects;
mod holder;
mod machine;
mod phase;
mod source;

use serde::Serialize;

use crate::models::{Broadcast, Investment, NewsPost, Product};
use crate::player::LinkType;

pub use effects::{Navigator, SideEffect};
pub use machine::DashboardMachine;
pub use source::{ApiDataSource, CacheDataSource, DataSource};

/// What the machine enters once the current loading step finishes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PendingTransition {
    ToContent { from_player: bool, last_position: i64 },
    ToPlayback { last_position: Option<i64> },
}

impl PendingTransition {
    /// Where every fresh screen starts
    pub fn initial() -> Self {
        PendingTransition::ToContent {
            from_player: false,
            last_position: 0,
        }
    }

    /// Return from the player. The position is only kept when the player
    /// was actually playing.
    pub fn leave_player(last_position: i64, is_playing: bool) -> Self {
        PendingTransition::ToContent {
            from_player: is_playing,
            last_position: if is_playing { last_position } else { 0 },
        }
    }
}

/// Dashboard content. Every optional field starts unset and is filled in as
/// the loading phases complete.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ContentState {
    pub broadcast: Option<Broadcast>,
    pub autoplay: bool,
    pub initial_position: i64,
    pub investments: Option<Vec<Investment>>,
    pub future_products: Option<Vec<Product>>,
    pub news: Option<Vec<NewsPost>>,
}

impl ContentState {
    pub fn new(autoplay: bool, initial_position: i64) -> Self {
        Self {
            autoplay,
            initial_position,
            ..Default::default()
        }
    }
}

/// State of the dashboard screen
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ScreenState {
    Loading(PendingTransition),
    Content(ContentState),
    FullscreenPlayback {
        url: String,
        link_type: LinkType,
        initial_position: i64,
    },
}

impl ScreenState {
    pub fn name(&self) -> &'static str {
        match self {
            ScreenState::Loading(_) => "loading",
            ScreenState::Content(_) => "content",
            ScreenState::FullscreenPlayback { .. } => "fullscreen",
        }
    }

    pub fn as_content(&self) -> Option<&ContentState> {
        match self {
            ScreenState::Content(content) => Some(content),
            _ => None,
        }
    }

    pub fn is_playback(&self) -> bool {
        matches!(self, ScreenState::FullscreenPlayback { .. })
    }
}

impl Default for ScreenState {
    fn default() -> Self {
        ScreenState::Loading(PendingTransition::initial())
    }
}
