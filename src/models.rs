//! Domain records shared by the dashboard, the product cache and the REST client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::player::LinkType;

/// Funding stage a product is listed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    EarlyInvestments,
    VentureCapital,
    PrivateInvestments,
    GoingPublic,
    Ipo,
    #[default]
    Uncategorized,
}

impl Category {
    /// Key used by the backend in `category=` filters and in the cache
    pub fn key(&self) -> &'static str {
        match self {
            Category::EarlyInvestments => "early_investments",
            Category::VentureCapital => "venture_capital",
            Category::PrivateInvestments => "private_investments",
            Category::GoingPublic => "going_public",
            Category::Ipo => "ipo",
            Category::Uncategorized => "uncategorized",
        }
    }

    /// Inverse of [`Category::key`]; unknown keys map to `Uncategorized`
    pub fn from_key(key: &str) -> Self {
        match key {
            "early_investments" => Category::EarlyInvestments,
            "venture_capital" => Category::VentureCapital,
            "private_investments" => Category::PrivateInvestments,
            "going_public" => Category::GoingPublic,
            "ipo" => Category::Ipo,
            _ => Category::Uncategorized,
        }
    }
}

/// A company listed on the show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub company: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Streaming endpoints of a broadcast
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BroadcastVideo {
    #[serde(default)]
    pub playback_hls: Option<String>,
    #[serde(default)]
    pub playback_dash: Option<String>,
}

/// The currently airing (or last aired) episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Broadcast {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub broadcast_video: Option<BroadcastVideo>,
    #[serde(default)]
    pub products: Vec<Product>,
}

impl Broadcast {
    /// Pick the URL the player should open. HLS is preferred over DASH.
    pub fn playback_link(&self) -> Option<(LinkType, &str)> {
        let video = self.broadcast_video.as_ref()?;
        if let Some(hls) = video.playback_hls.as_deref() {
            return Some((LinkType::Hls, hls));
        }
        video
            .playback_dash
            .as_deref()
            .map(|dash| (LinkType::Dash, dash))
    }

    pub fn has_playable_url(&self) -> bool {
        self.playback_link().is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Investment {
    pub id: i64,
    pub company: String,
    /// Amount raised so far, in whole dollars
    #[serde(default)]
    pub raised: u64,
    #[serde(default)]
    pub goal: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsPost {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    pub published_at: DateTime<Utc>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn product(id: i64, company: &str) -> Product {
        Product {
            id,
            company: company.to_string(),
            category: Category::EarlyInvestments,
            summary: None,
            logo_url: None,
            updated_at: DateTime::from_timestamp(1_600_000_000 + id, 0).unwrap_or_default(),
        }
    }

    pub fn broadcast(hls: Option<&str>, dash: Option<&str>) -> Broadcast {
        Broadcast {
            id: 7,
            title: "Episode 7".to_string(),
            broadcast_video: Some(BroadcastVideo {
                playback_hls: hls.map(str::to_string),
                playback_dash: dash.map(str::to_string),
            }),
            products: Vec::new(),
        }
    }

    pub fn investment(id: i64) -> Investment {
        Investment {
            id,
            company: format!("Company {id}"),
            raised: 1_000 * id as u64,
            goal: 10_000,
        }
    }

    pub fn news(id: i64, title: &str) -> NewsPost {
        NewsPost {
            id,
            title: title.to_string(),
            url: None,
            published_at: DateTime::from_timestamp(1_600_000_000, 0).unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::broadcast;
    use super::*;

    #[test]
    fn test_playback_link_prefers_hls() {
        let b = broadcast(Some("https://cdn/live.m3u8"), Some("https://cdn/live.mpd"));
        assert_eq!(b.playback_link(), Some((LinkType::Hls, "https://cdn/live.m3u8")));

        let b = broadcast(None, Some("https://cdn/live.mpd"));
        assert_eq!(b.playback_link(), Some((LinkType::Dash, "https://cdn/live.mpd")));

        let b = broadcast(None, None);
        assert!(!b.has_playable_url());
    }

    #[test]
    fn test_broadcast_without_video_is_not_playable() {
        let b = Broadcast {
            id: 1,
            title: "Pilot".to_string(),
            broadcast_video: None,
            products: Vec::new(),
        };
        assert_eq!(b.playback_link(), None);
    }

    #[test]
    fn test_category_keys_round_trip() {
        for category in [
            Category::EarlyInvestments,
            Category::VentureCapital,
            Category::PrivateInvestments,
            Category::GoingPublic,
            Category::Ipo,
            Category::Uncategorized,
        ] {
            assert_eq!(Category::from_key(category.key()), category);
        }
        assert_eq!(Category::from_key("mystery"), Category::Uncategorized);
    }
}
