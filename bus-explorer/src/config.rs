use serde::{Deserialize, Serialize};

use bus_network::LatLng;

use crate::navigation::Viewport;

/// Tunables for the explorer. Every field has a default, so JS can pass in just what it wants to
/// override.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExplorerConfig {
    /// Where the map starts when the URL doesn't say
    pub default_center: LatLng,
    pub default_zoom: f64,

    /// How many stop markers to aim for per zoom level, before clamping
    pub stops_per_zoom: f64,
    pub min_stop_markers: usize,
    pub max_stop_markers: usize,
    /// Screen-space distance between consecutive kept stop markers
    pub min_pixel_gap: f64,

    /// How long to ignore viewport reports after an instant programmatic jump, if the map never
    /// reports the move finishing
    pub instant_move_grace_ms: f64,
    /// The same for animated moves, which scale with distance and zoom change
    pub min_animated_grace_ms: f64,
    pub max_animated_grace_ms: f64,

    /// Viewport centers closer than this (in degrees) count as unchanged
    pub viewport_epsilon: f64,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            // Tokyo
            default_center: LatLng::new(35.6762, 139.6503),
            default_zoom: 11.0,
            stops_per_zoom: 20.0,
            min_stop_markers: 80,
            max_stop_markers: 250,
            min_pixel_gap: 28.0,
            instant_move_grace_ms: 150.0,
            min_animated_grace_ms: 400.0,
            max_animated_grace_ms: 2000.0,
            viewport_epsilon: 1e-5,
        }
    }
}

impl ExplorerConfig {
    pub fn default_viewport(&self) -> Viewport {
        Viewport::new(
            self.default_center.lat,
            self.default_center.lng,
            self.default_zoom,
        )
    }

    /// Zoomed out, there's less room, so show fewer stops.
    pub fn target_stop_count(&self, zoom: f64) -> usize {
        let wanted = (zoom * self.stops_per_zoom).floor().max(0.0) as usize;
        // Don't use clamp; a bad config with min > max shouldn't panic
        wanted.max(self.min_stop_markers).min(self.max_stop_markers)
    }

    /// How long the map widget plausibly spends moving from one viewport to another.
    pub fn grace_window_ms(&self, from: &Viewport, to: &Viewport, animate: bool) -> f64 {
        if !animate {
            return self.instant_move_grace_ms;
        }
        let km = from.center().dist_to(to.center());
        let zoom_delta = (from.zoom - to.zoom).abs();
        let ms = self.min_animated_grace_ms + 250.0 * (1.0 + km).log2() + 150.0 * zoom_delta;
        ms.min(self.max_animated_grace_ms)
    }
}
