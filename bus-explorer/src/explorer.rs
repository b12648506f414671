use std::collections::{BTreeSet, HashMap};

use log::{debug, info};
use serde::Serialize;

use bus_network::{BBox, BusNetwork, LatLng, Route, Stop};

use crate::config::ExplorerConfig;
use crate::navigation::{NavigationState, Viewport, ViewportEvent};
use crate::sampler::{sample, ScreenPoint};
use crate::spatial::filter_in_viewport;
use crate::sync::{MoveCause, MoveToken, ViewportSync};
use crate::url_state::{build_search, parse_url_state, HistoryMode, UrlState};

/// Something the host has to do on the explorer's behalf. Map commands carry a token; the host
/// should call `on_move_completed` with it once the map finishes moving.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Effect {
    /// Write this query string to the address bar, creating a history entry or not
    UpdateUrl { mode: HistoryMode, search: String },
    FitPoints {
        points: Vec<LatLng>,
        token: MoveToken,
    },
    SetView {
        center: LatLng,
        zoom: f64,
        animate: bool,
        token: MoveToken,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u32);

pub type VisibleRoutesCallback = Box<dyn FnMut(&BTreeSet<String>)>;

/// Owns navigation state for one map, keeps it in sync with the URL, and decides what to draw.
///
/// Everything runs on one thread, driven by the host: user actions, map reports, animation frames,
/// and browser history events. Operations that might change the URL or move the map return
/// [`Effect`]s rather than doing it themselves. Timing-sensitive operations take the current time
/// in milliseconds.
pub struct Explorer {
    network: BusNetwork,
    config: ExplorerConfig,
    state: NavigationState,
    /// Mirrors the address bar's query string
    search: String,
    url_had_viewport: bool,
    sync: ViewportSync,
    map_ready: bool,
    /// The last viewport the map reported, including ones caused by the app itself
    rendered: Option<ViewportEvent>,
    selected_stop: Option<String>,
    visible_route_ids: BTreeSet<String>,
    subscribers: Vec<(SubscriptionId, VisibleRoutesCallback)>,
    next_subscription: u32,
    disposed: bool,
}

impl Explorer {
    pub fn new(network: BusNetwork, config: ExplorerConfig, search: &str) -> Self {
        let url = parse_url_state(search);
        let url_had_viewport = url.lat.is_some() && url.lng.is_some();
        let mut state = NavigationState::from_url_state(url, &config);
        state.route_id = state
            .route_id
            .and_then(|key| resolve_route(&network, &key));
        let sync = ViewportSync::new(state.viewport);

        let mut explorer = Self {
            network,
            config,
            state,
            search: search.to_string(),
            url_had_viewport,
            sync,
            map_ready: false,
            rendered: None,
            selected_stop: None,
            visible_route_ids: BTreeSet::new(),
            subscribers: Vec::new(),
            next_subscription: 0,
            disposed: false,
        };
        explorer.refresh_visible();
        explorer
    }

    pub fn network(&self) -> &BusNetwork {
        &self.network
    }

    pub fn config(&self) -> &ExplorerConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ExplorerConfig) {
        self.config = config;
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    /// The query string as the explorer last left it
    pub fn search(&self) -> &str {
        &self.search
    }

    /// Once the map is first ready, moves it to wherever the URL said. Until then, nothing that
    /// would move the map is emitted, and nothing is queued for later either.
    pub fn set_map_ready(&mut self, ready: bool, now_ms: f64) -> Vec<Effect> {
        if self.disposed {
            return Vec::new();
        }
        let was_ready = self.map_ready;
        self.map_ready = ready;
        if !ready || was_ready {
            return Vec::new();
        }

        // Old links might name a route, but not say where to look
        let fit_route = if self.url_had_viewport {
            None
        } else {
            self.selected_route().map(route_points)
        };
        match fit_route {
            Some(points) => vec![self.fit(points, false, now_ms)],
            None => {
                let from = self.current_viewport();
                let to = self.state.viewport;
                vec![self.set_view(from, to, false, false, now_ms)]
            }
        }
    }

    /// Selects a route by ID, or clears the selection. Unknown IDs clear it. This closes any stop
    /// details and fits the map to the route.
    pub fn select_route(&mut self, route_id: Option<&str>, now_ms: f64) -> Vec<Effect> {
        if self.disposed {
            return Vec::new();
        }
        let route = route_id.and_then(|id| self.network.route(id));
        let new_id = route.map(|r| r.route_id.clone());
        let points = route.map(route_points);
        self.selected_stop = None;

        let mut effects = Vec::new();
        if new_id != self.state.route_id {
            self.state.route_id = new_id;
            effects.push(self.write_url(self.state.selection_url_state(), HistoryMode::Push));
        }
        // Re-selecting the same route still refocuses on it
        if let Some(points) = points {
            if self.map_ready {
                effects.push(self.fit(points, false, now_ms));
            }
        }
        self.refresh_visible();
        effects
    }

    /// Showing every route means not focusing on one.
    pub fn set_show_all(&mut self, show_all: bool) -> Vec<Effect> {
        if self.disposed {
            return Vec::new();
        }
        let clears_route = show_all && self.state.route_id.is_some();
        if show_all == self.state.show_all && !clears_route {
            return Vec::new();
        }
        if show_all {
            self.state.route_id = None;
            self.selected_stop = None;
        }
        self.state.show_all = show_all;
        let effect = self.write_url(self.state.selection_url_state(), HistoryMode::Push);
        self.refresh_visible();
        vec![effect]
    }

    /// Call when a move or zoom settles. Nothing happens until the next animation frame, so a burst
    /// of these only counts once.
    pub fn on_viewport_changed(&mut self, event: ViewportEvent) {
        if !self.disposed {
            self.sync.queue(event);
        }
    }

    /// Handles the last viewport reported since the previous frame. What's drawn always follows
    /// the map, but only user-driven moves are written back to the URL, without a new history
    /// entry.
    pub fn on_animation_frame(&mut self, now_ms: f64) -> Vec<Effect> {
        if self.disposed {
            return Vec::new();
        }
        let Some((event, cause)) = self.sync.take_pending(now_ms) else {
            return Vec::new();
        };
        self.rendered = Some(event);
        self.refresh_visible();

        match cause {
            MoveCause::User => {}
            MoveCause::History => {
                debug!("Ignoring viewport change while restoring from history");
                return Vec::new();
            }
            MoveCause::App => {
                debug!("Ignoring viewport change while the app is moving the map");
                return Vec::new();
            }
        }

        let viewport = event.viewport();
        if !self.sync.accept(viewport, self.config.viewport_epsilon) {
            return Vec::new();
        }
        self.state.viewport = viewport;
        vec![self.write_url(self.state.viewport_url_state(), HistoryMode::Replace)]
    }

    /// The map finished a move the explorer asked for. Returns false for stale or unknown tokens.
    pub fn on_move_completed(&mut self, token: MoveToken) -> bool {
        if self.disposed {
            return false;
        }
        self.sync.complete_move(token)
    }

    /// The browser went back or forward to `search`. Restores everything from it and moves the map
    /// there, without writing the URL.
    pub fn on_pop_state(&mut self, search: &str, now_ms: f64) -> Vec<Effect> {
        if self.disposed {
            return Vec::new();
        }
        info!("Restoring navigation state from {:?}", search);
        self.search = search.to_string();

        let from = self.current_viewport();
        let url = parse_url_state(search);
        let url_has_viewport = url.lat.is_some() && url.lng.is_some();
        let mut restored = NavigationState::from_url_state(url, &self.config);
        restored.route_id = restored
            .route_id
            .and_then(|key| resolve_route(&self.network, &key));
        self.state = restored;
        self.selected_stop = None;
        // The URL already says this
        self.sync.mark_synced(self.state.viewport);

        let mut effects = Vec::new();
        if self.map_ready {
            // Like on startup, a route without a viewport means looking at the route
            let fit_route = if url_has_viewport {
                None
            } else {
                self.selected_route().map(route_points)
            };
            match fit_route {
                Some(points) => effects.push(self.fit(points, true, now_ms)),
                None => {
                    let to = self.state.viewport;
                    effects.push(self.set_view(from, to, true, true, now_ms));
                }
            }
        } else {
            debug!("Map isn't ready; not restoring the viewport");
        }
        self.refresh_visible();
        effects
    }

    pub fn selected_route(&self) -> Option<&Route> {
        self.state
            .route_id
            .as_deref()
            .and_then(|id| self.network.route(id))
    }

    pub fn select_stop(&mut self, stop_id: &str) -> bool {
        if self.network.stop(stop_id).is_none() {
            return false;
        }
        self.selected_stop = Some(stop_id.to_string());
        true
    }

    pub fn clear_stop(&mut self) {
        self.selected_stop = None;
    }

    pub fn selected_stop(&self) -> Option<&Stop> {
        self.selected_stop
            .as_deref()
            .and_then(|id| self.network.stop(id))
    }

    /// The selected route alone, or with "show all" on, every route touching the viewport.
    pub fn visible_routes(&self) -> Vec<&Route> {
        if let Some(route) = self.selected_route() {
            return vec![route];
        }
        match self.rendered {
            Some(event) if self.state.show_all => {
                filter_in_viewport(&self.network.routes, &event.bounds)
            }
            _ => Vec::new(),
        }
    }

    /// For polling. Subscribing is better.
    pub fn visible_route_ids(&self) -> &BTreeSet<String> {
        &self.visible_route_ids
    }

    /// Every stop of the selected route, or a decluttered sample of the visible routes' stops
    /// inside the viewport. `project` turns a position into map container pixels.
    pub fn displayed_stops<P: FnMut(LatLng) -> ScreenPoint>(&self, project: P) -> Vec<&Stop> {
        if let Some(route) = self.selected_route() {
            return route.stops.iter().collect();
        }
        let Some(event) = self.rendered else {
            return Vec::new();
        };

        let mut stops: Vec<&Stop> = Vec::new();
        let mut index: HashMap<&str, usize> = HashMap::new();
        for route in self.visible_routes() {
            for stop in &route.stops {
                if !event.bounds.contains(stop.pos()) {
                    continue;
                }
                // The first route to reach a stop fixes its place, the last one its name
                if let Some(&idx) = index.get(stop.id.as_str()) {
                    stops[idx] = stop;
                } else {
                    index.insert(stop.id.as_str(), stops.len());
                    stops.push(stop);
                }
            }
        }

        sample(
            stops,
            project,
            self.config.target_stop_count(event.zoom),
            self.config.min_pixel_gap,
        )
    }

    /// `callback` is called right away with the current set, then whenever it changes.
    pub fn subscribe_visible_routes(&mut self, mut callback: VisibleRoutesCallback) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        if self.disposed {
            return id;
        }
        callback(&self.visible_route_ids);
        self.subscribers.push((id, callback));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(x, _)| *x != id);
        self.subscribers.len() != before
    }

    /// Drops every subscriber and forgets any move in flight. Afterwards, every handler does
    /// nothing.
    pub fn dispose(&mut self) {
        self.disposed = true;
        self.subscribers.clear();
        self.sync.cancel();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    fn write_url(&mut self, url: UrlState, mode: HistoryMode) -> Effect {
        self.search = build_search(&url, &self.search);
        Effect::UpdateUrl {
            mode,
            search: self.search.clone(),
        }
    }

    fn current_viewport(&self) -> Viewport {
        self.rendered
            .map(|event| event.viewport())
            .unwrap_or(self.state.viewport)
    }

    fn fit(&mut self, points: Vec<LatLng>, restoring: bool, now_ms: f64) -> Effect {
        let from = self.current_viewport();
        // The map picks the zoom, so only guess at how far it'll travel
        let center = BBox::around(points.iter().copied()).center();
        let to = Viewport::new(center.lat, center.lng, from.zoom);
        let grace_ms = self.config.grace_window_ms(&from, &to, true);
        let token = self.sync.begin_move(now_ms, grace_ms, restoring);
        Effect::FitPoints { points, token }
    }

    fn set_view(
        &mut self,
        from: Viewport,
        to: Viewport,
        animate: bool,
        restoring: bool,
        now_ms: f64,
    ) -> Effect {
        let grace_ms = self.config.grace_window_ms(&from, &to, animate);
        let token = self.sync.begin_move(now_ms, grace_ms, restoring);
        Effect::SetView {
            center: to.center(),
            zoom: to.zoom,
            animate,
            token,
        }
    }

    fn refresh_visible(&mut self) {
        let ids: BTreeSet<String> = self
            .visible_routes()
            .into_iter()
            .map(|r| r.route_id.clone())
            .collect();
        if ids == self.visible_route_ids {
            return;
        }
        self.visible_route_ids = ids;
        for (_, callback) in &mut self.subscribers {
            callback(&self.visible_route_ids);
        }
    }
}

// Match by ID, or by display name for links made before IDs were used
fn resolve_route(network: &BusNetwork, key: &str) -> Option<String> {
    network
        .route(key)
        .or_else(|| network.route_by_name(key))
        .map(|r| r.route_id.clone())
}

fn route_points(route: &Route) -> Vec<LatLng> {
    if route.stops.is_empty() {
        route.coordinates.clone()
    } else {
        route.stops.iter().map(Stop::pos).collect()
    }
}
