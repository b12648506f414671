use serde::{Deserialize, Serialize};

use bus_network::{BBox, LatLng};

use crate::config::ExplorerConfig;
use crate::url_state::{parse_url_state, UrlState};

/// Where the map is looking.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub lat: f64,
    pub lng: f64,
    pub zoom: f64,
}

impl Viewport {
    pub fn new(lat: f64, lng: f64, zoom: f64) -> Self {
        Self { lat, lng, zoom }
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    /// Ignores drift below what the URL can even represent.
    pub fn differs_from(&self, other: &Viewport, epsilon: f64) -> bool {
        (self.lat - other.lat).abs() > epsilon
            || (self.lng - other.lng).abs() > epsilon
            || self.zoom.round() != other.zoom.round()
    }
}

/// What the map widget reports once a move or zoom settles.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewportEvent {
    pub bounds: BBox,
    pub center: LatLng,
    pub zoom: f64,
}

impl ViewportEvent {
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.center.lat, self.center.lng, self.zoom)
    }
}

/// Everything about navigation that's addressable by URL. There's one of these per explorer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationState {
    pub route_id: Option<String>,
    pub show_all: bool,
    pub viewport: Viewport,
}

impl NavigationState {
    /// Falls back to the default viewport when any part of it is missing or malformed. The route
    /// is whatever the URL says; callers must resolve it against the network.
    pub fn from_search(search: &str, config: &ExplorerConfig) -> Self {
        Self::from_url_state(parse_url_state(search), config)
    }

    pub fn from_url_state(url: UrlState, config: &ExplorerConfig) -> Self {
        let viewport = match (url.lat, url.lng, url.zoom) {
            (Some(lat), Some(lng), Some(zoom)) => Viewport::new(lat, lng, zoom),
            (Some(lat), Some(lng), None) => Viewport::new(lat, lng, config.default_zoom),
            _ => config.default_viewport(),
        };
        Self {
            route_id: url.route,
            show_all: url.all.unwrap_or(false),
            viewport,
        }
    }

    /// The parameters a route pick or "show all" toggle writes
    pub fn selection_url_state(&self) -> UrlState {
        UrlState {
            route: self.route_id.clone(),
            all: Some(self.show_all),
            ..Default::default()
        }
    }

    /// The parameters a pan or zoom writes. The route has to be carried along, or it'd be removed.
    pub fn viewport_url_state(&self) -> UrlState {
        UrlState {
            route: self.route_id.clone(),
            lat: Some(self.viewport.lat),
            lng: Some(self.viewport.lng),
            zoom: Some(self.viewport.zoom),
            ..Default::default()
        }
    }

    pub fn to_url_state(&self) -> UrlState {
        UrlState {
            route: self.route_id.clone(),
            all: Some(self.show_all),
            lat: Some(self.viewport.lat),
            lng: Some(self.viewport.lng),
            zoom: Some(self.viewport.zoom),
        }
    }
}
