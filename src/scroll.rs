//! Scroll-driven header animation for the product editor.
//!
//! The editor header collapses as the list scrolls: the card slides up, the
//! logo shrinks, secondary rows fade out and the toolbar dims. Every value is
//! derived from a single "effective" factor in `[0, 1]`, where `1.0` means
//! fully expanded (list at its anchor) and `0.0` fully collapsed.

use serde::{Deserialize, Serialize};

/// Fraction of the range over which the edit button fades out
const SECONDARY_HIDE_FACTOR: f32 = 0.6;

/// Toolbar becomes interactive at or above this factor
const TOOLBAR_ACTIVE_THRESHOLD: f32 = 0.8;

/// Reference distances, in pixels, the animation interpolates between
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollMetrics {
    /// Card top padding when fully expanded; also the scroll distance
    /// over which the header collapses
    #[serde(default = "default_initial_offset")]
    pub initial_offset: i32,
    /// Card top padding when fully collapsed
    #[serde(default = "default_final_offset")]
    pub final_offset: i32,
    #[serde(default = "default_image_max_size")]
    pub image_max_size: i32,
    #[serde(default = "default_image_min_size")]
    pub image_min_size: i32,
    /// Top margin of the money rows when fully expanded
    #[serde(default = "default_item_offset")]
    pub item_offset: i32,
    #[serde(default = "default_progress_max_height")]
    pub progress_max_height: i32,
    #[serde(default = "default_progress_min_height")]
    pub progress_min_height: i32,
}

impl Default for ScrollMetrics {
    fn default() -> Self {
        Self {
            initial_offset: default_initial_offset(),
            final_offset: default_final_offset(),
            image_max_size: default_image_max_size(),
            image_min_size: default_image_min_size(),
            item_offset: default_item_offset(),
            progress_max_height: default_progress_max_height(),
            progress_min_height: default_progress_min_height(),
        }
    }
}

fn default_initial_offset() -> i32 {
    160
}

fn default_final_offset() -> i32 {
    24
}

fn default_image_max_size() -> i32 {
    96
}

fn default_image_min_size() -> i32 {
    48
}

fn default_item_offset() -> i32 {
    8
}

fn default_progress_max_height() -> i32 {
    32
}

fn default_progress_min_height() -> i32 {
    8
}

/// Every visual value of one animation frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScrollFrame {
    pub effective: f32,
    pub top_padding: i32,
    pub image_size: i32,
    pub emphasis_alpha: f32,
    pub item_offset_top: i32,
    pub secondary_fade: f32,
    pub toolbar_opacity: f32,
    pub toolbar_active: bool,
    pub skip_alpha: f32,
    pub progress_height: i32,
    pub progress_alpha: f32,
}

impl ScrollMetrics {
    /// Frame for a scroll offset, or the resting frame when `None`
    pub fn frame(&self, offset_top: Option<i32>) -> ScrollFrame {
        match offset_top {
            Some(offset) => self.frame_at(offset),
            None => self.reset(),
        }
    }

    /// Raw scroll factor: how far the list has travelled relative to
    /// `initial_offset`. Not clamped.
    pub fn scroll_factor(&self, offset_top: i32) -> f32 {
        if offset_top == 0 || self.initial_offset == 0 {
            return 0.0;
        }
        offset_top as f32 / self.initial_offset as f32
    }

    /// Inverted, clamped factor: `1.0` at the anchor, `0.0` once collapsed
    pub fn effective(&self, offset_top: i32) -> f32 {
        1.0 - self.scroll_factor(offset_top).clamp(0.0, 1.0)
    }

    pub fn frame_at(&self, offset_top: i32) -> ScrollFrame {
        let effective = self.effective(offset_top);
        let collapsed = 1.0 - effective;

        let padding_span = self.initial_offset.saturating_sub(self.final_offset);
        let size_diff = self.image_max_size.saturating_sub(self.image_min_size);
        let height_diff = self.progress_max_height.saturating_sub(self.progress_min_height);

        let emphasis = emphasis_alpha(effective);

        ScrollFrame {
            effective,
            top_padding: ((padding_span as f32 * effective) as i32).saturating_add(self.final_offset),
            image_size: self
                .image_max_size
                .saturating_sub((size_diff as f32 * collapsed) as i32),
            emphasis_alpha: emphasis,
            item_offset_top: (self.item_offset as f32 * emphasis) as i32,
            secondary_fade: secondary_fade(effective),
            toolbar_opacity: effective,
            toolbar_active: effective >= TOOLBAR_ACTIVE_THRESHOLD,
            skip_alpha: effective,
            progress_height: (self.progress_max_height as f32 - height_diff as f32 * collapsed)
                .round() as i32,
            progress_alpha: effective,
        }
    }

    /// Resting frame used when the content cannot scroll: everything fully
    /// expanded and opaque.
    pub fn reset(&self) -> ScrollFrame {
        ScrollFrame {
            effective: 1.0,
            top_padding: self.initial_offset,
            image_size: self.image_max_size,
            emphasis_alpha: 1.0,
            item_offset_top: self.item_offset,
            secondary_fade: 1.0,
            toolbar_opacity: 1.0,
            toolbar_active: true,
            skip_alpha: 1.0,
            progress_height: self.progress_max_height,
            progress_alpha: 1.0,
        }
    }
}

/// Ramp that only starts in the upper half: 0 up to 0.5, 1 from 0.7.
pub fn emphasis_alpha(effective: f32) -> f32 {
    // (effective - 0.5) * 5, rearranged so 0.7 lands exactly on 1.0 in f32
    (effective * 5.0 - 2.5).clamp(0.0, 1.0)
}

/// Ramp that is only non-zero over the last `SECONDARY_HIDE_FACTOR` of the range
pub fn secondary_fade(effective: f32) -> f32 {
    (1.0 - (1.0 - effective) / SECONDARY_HIDE_FACTOR).clamp(0.0, 1.0)
}

/// Accumulates scroll deltas the way a list's scroll listener reports them
#[derive(Debug, Clone)]
pub struct ScrollTracker {
    metrics: ScrollMetrics,
    offset_top: i32,
}

impl ScrollTracker {
    pub fn new(metrics: ScrollMetrics) -> Self {
        Self {
            metrics,
            offset_top: 0,
        }
    }

    /// Rebuild a tracker from a persisted scroll factor
    pub fn restore(metrics: ScrollMetrics, factor: f32) -> Self {
        let factor = if factor.is_finite() {
            factor.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            offset_top: (metrics.initial_offset as f32 * factor).round() as i32,
            metrics,
        }
    }

    /// Apply a scroll delta. When the list can no longer scroll towards the
    /// top the header rests fully expanded.
    pub fn on_scrolled(&mut self, dy: i32, can_scroll_top: bool) -> ScrollFrame {
        self.offset_top = self.offset_top.saturating_add(dy);
        if can_scroll_top {
            self.metrics.frame_at(self.offset_top)
        } else {
            self.metrics.reset()
        }
    }

    pub fn offset_top(&self) -> i32 {
        self.offset_top
    }

    /// Clamped scroll factor, suitable for persisting across view recreation
    pub fn scroll_factor(&self) -> f32 {
        self.metrics.scroll_factor(self.offset_top).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> ScrollMetrics {
        ScrollMetrics::default()
    }

    #[test]
    fn test_anchor_is_fully_expanded() {
        let m = metrics();
        let frame = m.frame_at(0);
        assert_eq!(frame.effective, 1.0);
        assert_eq!(frame.top_padding, m.initial_offset);
        assert_eq!(frame.image_size, m.image_max_size);
        assert_eq!(frame.progress_height, m.progress_max_height);
        assert_eq!(frame.secondary_fade, 1.0);
        assert!(frame.toolbar_active);
    }

    #[test]
    fn test_full_travel_is_fully_collapsed() {
        let m = metrics();
        let frame = m.frame_at(m.initial_offset);
        assert_eq!(frame.effective, 0.0);
        assert_eq!(frame.top_padding, m.final_offset);
        assert_eq!(frame.image_size, m.image_min_size);
        assert_eq!(frame.progress_height, m.progress_min_height);
        assert_eq!(frame.emphasis_alpha, 0.0);
        assert_eq!(frame.item_offset_top, 0);
        assert_eq!(frame.secondary_fade, 0.0);
        assert_eq!(frame.toolbar_opacity, 0.0);
        assert!(!frame.toolbar_active);
    }

    #[test]
    fn test_offsets_beyond_range_saturate() {
        let m = metrics();
        assert_eq!(m.frame_at(i32::MAX), m.frame_at(m.initial_offset));
        // Overscroll above the anchor clamps to expanded
        assert_eq!(m.frame_at(-40).effective, 1.0);
        assert_eq!(m.frame_at(i32::MIN).top_padding, m.initial_offset);
    }

    #[test]
    fn test_reset_matches_anchor_frame() {
        let m = metrics();
        assert_eq!(m.reset(), m.frame_at(0));
        assert_eq!(m.frame(None), m.frame(Some(0)));
    }

    #[test]
    fn test_emphasis_ramp() {
        assert_eq!(emphasis_alpha(0.0), 0.0);
        assert_eq!(emphasis_alpha(0.5), 0.0);
        assert_eq!(emphasis_alpha(0.7), 1.0);
        assert_eq!(emphasis_alpha(0.95), 1.0);

        let mut previous = 0.0;
        for step in 0..=100 {
            let e = 0.5 + 0.2 * step as f32 / 100.0;
            let alpha = emphasis_alpha(e);
            assert!(alpha >= previous, "not monotonic at {e}");
            assert!((0.0..=1.0).contains(&alpha));
            previous = alpha;
        }
    }

    #[test]
    fn test_emphasis_reaches_one_from_scroll_offset() {
        let m = metrics();
        // 48 / 160 = 0.3 travelled, 0.7 effective
        let frame = m.frame_at(48);
        assert_eq!(frame.emphasis_alpha, 1.0);
        assert_eq!(frame.item_offset_top, m.item_offset);
    }

    #[test]
    fn test_toolbar_threshold() {
        let m = metrics();
        // 0.2 travelled
        assert!(m.frame_at(32).toolbar_active);
        // 0.25 travelled
        assert!(!m.frame_at(40).toolbar_active);
    }

    #[test]
    fn test_secondary_fade_only_near_top() {
        assert_eq!(secondary_fade(0.0), 0.0);
        assert_eq!(secondary_fade(0.4), 0.0);
        assert!((secondary_fade(0.7) - 0.5).abs() < 1e-5);
        assert_eq!(secondary_fade(1.0), 1.0);
    }

    #[test]
    fn test_midway_interpolation() {
        let m = metrics();
        let frame = m.frame_at(80);
        assert!((frame.effective - 0.5).abs() < f32::EPSILON);
        assert_eq!(frame.top_padding, 24 + 68);
        assert_eq!(frame.image_size, 96 - 24);
        assert_eq!(frame.progress_height, 32 - 12);
        assert_eq!(frame.emphasis_alpha, 0.0);
    }

    #[test]
    fn test_zero_initial_offset_does_not_divide() {
        let m = ScrollMetrics {
            initial_offset: 0,
            ..ScrollMetrics::default()
        };
        assert_eq!(m.scroll_factor(50), 0.0);
        assert_eq!(m.effective(50), 1.0);
    }

    #[test]
    fn test_tracker_accumulates_and_resets_at_top() {
        let m = metrics();
        let mut tracker = ScrollTracker::new(m);

        let frame = tracker.on_scrolled(80, true);
        assert!((frame.effective - 0.5).abs() < f32::EPSILON);
        let frame = tracker.on_scrolled(80, true);
        assert_eq!(frame.effective, 0.0);
        assert_eq!(tracker.scroll_factor(), 1.0);

        // Back at the top of the list the header rests expanded
        let frame = tracker.on_scrolled(-160, false);
        assert_eq!(frame, m.reset());
        assert_eq!(tracker.offset_top(), 0);
    }

    #[test]
    fn test_tracker_saturates() {
        let mut tracker = ScrollTracker::new(metrics());
        tracker.on_scrolled(i32::MAX, true);
        tracker.on_scrolled(i32::MAX, true);
        assert_eq!(tracker.offset_top(), i32::MAX);
    }

    #[test]
    fn test_tracker_restore_from_factor() {
        let m = metrics();
        let tracker = ScrollTracker::restore(m, 0.25);
        assert_eq!(tracker.offset_top(), 40);
        assert_eq!(tracker.scroll_factor(), 0.25);

        let tracker = ScrollTracker::restore(m, f32::NAN);
        assert_eq!(tracker.offset_top(), 0);
    }
}
