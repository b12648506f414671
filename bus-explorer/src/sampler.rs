use std::borrow::Borrow;

use serde::{Deserialize, Serialize};

use bus_network::{LatLng, Stop};

/// A position in the map container, in pixels.
#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f64,
    pub y: f64,
}

impl ScreenPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dist_to(self, other: ScreenPoint) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Thins out stops so their markers don't pile on top of each other.
///
/// If there are already few enough stops, they're returned untouched. Otherwise walk them in order
/// and keep a stop when it's at least `min_pixel_gap` away from the last kept one, until
/// `target_total` are kept. This is greedy, so the result depends on the input order; callers
/// should pass stops in a stable order.
pub fn sample<S, P>(stops: Vec<S>, mut project: P, target_total: usize, min_pixel_gap: f64) -> Vec<S>
where
    S: Borrow<Stop>,
    P: FnMut(LatLng) -> ScreenPoint,
{
    if stops.len() <= target_total {
        return stops;
    }

    let mut kept = Vec::new();
    let mut last_kept: Option<ScreenPoint> = None;
    for stop in stops {
        if kept.len() >= target_total {
            break;
        }
        let pt = project(stop.borrow().pos());
        if last_kept.map_or(true, |last| pt.dist_to(last) >= min_pixel_gap) {
            last_kept = Some(pt);
            kept.push(stop);
        }
    }
    kept
}
