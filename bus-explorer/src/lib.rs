mod catalog;
mod config;
mod explorer;
mod navigation;
mod sampler;
mod spatial;
mod sync;
mod url_state;

use std::collections::BTreeSet;
use std::sync::Once;

use geojson::{Feature, FeatureCollection, Geometry};
use log::{info, warn};
use wasm_bindgen::prelude::*;

use bus_network::{BusNetwork, LatLng, Route, Stop};

pub use catalog::{network_stats, route_color, search_routes, NetworkStats, RouteSummary, SortBy};
pub use config::ExplorerConfig;
pub use explorer::{Effect, Explorer, SubscriptionId, VisibleRoutesCallback};
pub use navigation::{NavigationState, Viewport, ViewportEvent};
pub use sampler::{sample, ScreenPoint};
pub use spatial::filter_in_viewport;
pub use sync::{MoveCause, MoveToken, ViewportSync};
pub use url_state::{build_search, parse_url_state, HistoryMode, UrlState};

static START: Once = Once::new();

fn setup() {
    START.call_once(|| {
        // Panics shouldn't happen, but if they do, console.log them.
        console_error_panic_hook::set_once();
        // The host might've set up logging already
        #[cfg(target_arch = "wasm32")]
        let _ = console_log::init_with_level(log::Level::Info);
    });
}

/// The JS-facing explorer. Every handler returning effects gives back a list of
/// `{ type: "updateUrl" | "fitPoints" | "setView", ... }` objects for the caller to carry out.
#[wasm_bindgen]
pub struct JsBusExplorer {
    explorer: Explorer,
    load_failed: bool,
}

#[wasm_bindgen]
impl JsBusExplorer {
    /// Takes a network from `odpt-to-bus-network` and the current `location.search`.
    #[wasm_bindgen(constructor)]
    pub fn new(network_bytes: &[u8], search: &str) -> Result<JsBusExplorer, JsValue> {
        setup();

        info!("Got {} bytes, deserializing", network_bytes.len());
        let network: BusNetwork = bincode::deserialize(network_bytes).map_err(err_to_js)?;
        Ok(Self::from_network(network, false, search))
    }

    /// Overrides any subset of the tunables. Bad input is logged and ignored.
    #[wasm_bindgen(js_name = setConfig)]
    pub fn set_config(&mut self, input: JsValue) {
        match serde_wasm_bindgen::from_value(input) {
            Ok(config) => {
                self.explorer.set_config(config);
            }
            Err(err) => {
                warn!("Bad input to setConfig: {}", err);
            }
        }
    }

    /// The data couldn't be fetched or parsed. The UI should say so, rather than just showing an
    /// empty map.
    #[wasm_bindgen(js_name = loadFailed)]
    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    #[wasm_bindgen(js_name = setMapReady)]
    pub fn set_map_ready(&mut self, ready: bool, now_ms: f64) -> Result<JsValue, JsValue> {
        effects_to_js(self.explorer.set_map_ready(ready, now_ms))
    }

    /// Pass `undefined` to clear the selection.
    #[wasm_bindgen(js_name = selectRoute)]
    pub fn select_route(
        &mut self,
        route_id: Option<String>,
        now_ms: f64,
    ) -> Result<JsValue, JsValue> {
        effects_to_js(self.explorer.select_route(route_id.as_deref(), now_ms))
    }

    #[wasm_bindgen(js_name = setShowAll)]
    pub fn set_show_all(&mut self, show_all: bool) -> Result<JsValue, JsValue> {
        effects_to_js(self.explorer.set_show_all(show_all))
    }

    /// Expects `{ bounds: { minLat, minLng, maxLat, maxLng }, center: { lat, lng }, zoom }`.
    #[wasm_bindgen(js_name = onViewportChanged)]
    pub fn on_viewport_changed(&mut self, input: JsValue) -> Result<(), JsValue> {
        let event: ViewportEvent = serde_wasm_bindgen::from_value(input).map_err(err_to_js)?;
        self.explorer.on_viewport_changed(event);
        Ok(())
    }

    #[wasm_bindgen(js_name = onAnimationFrame)]
    pub fn on_animation_frame(&mut self, now_ms: f64) -> Result<JsValue, JsValue> {
        effects_to_js(self.explorer.on_animation_frame(now_ms))
    }

    #[wasm_bindgen(js_name = onMoveCompleted)]
    pub fn on_move_completed(&mut self, token: u32) -> bool {
        self.explorer.on_move_completed(MoveToken(token))
    }

    #[wasm_bindgen(js_name = onPopState)]
    pub fn on_pop_state(&mut self, search: &str, now_ms: f64) -> Result<JsValue, JsValue> {
        effects_to_js(self.explorer.on_pop_state(search, now_ms))
    }

    #[wasm_bindgen(js_name = selectStop)]
    pub fn select_stop(&mut self, stop_id: &str) -> bool {
        self.explorer.select_stop(stop_id)
    }

    #[wasm_bindgen(js_name = clearStop)]
    pub fn clear_stop(&mut self) {
        self.explorer.clear_stop();
    }

    /// The selected stop, or `undefined`
    #[wasm_bindgen(js_name = selectedStop)]
    pub fn selected_stop(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.explorer.selected_stop()).map_err(err_to_js)
    }

    #[wasm_bindgen(js_name = visibleRouteIds)]
    pub fn visible_route_ids(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(self.explorer.visible_route_ids()).map_err(err_to_js)
    }

    /// `callback` gets an array of route IDs now, and again whenever the set changes. Returns an
    /// ID for `unsubscribe`.
    #[wasm_bindgen(js_name = subscribeVisibleRoutes)]
    pub fn subscribe_visible_routes(&mut self, callback: js_sys::Function) -> u32 {
        let id = self.explorer.subscribe_visible_routes(Box::new(move |ids: &BTreeSet<String>| {
            let result = serde_wasm_bindgen::to_value(ids)
                .map_err(|err| JsValue::from_str(&err.to_string()))
                .and_then(|ids| callback.call1(&JsValue::NULL, &ids));
            if let Err(err) = result {
                warn!("Visible routes subscriber failed: {:?}", err);
            }
        }));
        id.0
    }

    pub fn unsubscribe(&mut self, id: u32) -> bool {
        self.explorer.unsubscribe(SubscriptionId(id))
    }

    /// A FeatureCollection with a LineString per visible route. Properties: `route_id`, `name`,
    /// `color`, `selected`.
    #[wasm_bindgen(js_name = renderRoutes)]
    pub fn render_routes(&self) -> Result<String, JsValue> {
        let selected = self.explorer.state().route_id.as_deref();
        let features = self
            .explorer
            .visible_routes()
            .into_iter()
            .map(|route| route_feature(route, selected == Some(route.route_id.as_str())))
            .collect();
        to_geojson_string(features)
    }

    /// A FeatureCollection with a Point per stop worth drawing. `project(lat, lng)` must return the
    /// `{ x, y }` container pixel of a position.
    #[wasm_bindgen(js_name = renderStops)]
    pub fn render_stops(&self, project_fn: js_sys::Function) -> Result<String, JsValue> {
        let project = |pt: LatLng| -> ScreenPoint {
            let result = project_fn
                .call2(&JsValue::NULL, &pt.lat.into(), &pt.lng.into())
                .and_then(|x| serde_wasm_bindgen::from_value(x).map_err(err_to_js));
            match result {
                Ok(screen) => screen,
                Err(err) => {
                    warn!("Couldn't project {:?}: {:?}", pt, err);
                    ScreenPoint::default()
                }
            }
        };
        let features = self
            .explorer
            .displayed_stops(project)
            .into_iter()
            .map(stop_feature)
            .collect();
        to_geojson_string(features)
    }

    #[wasm_bindgen(js_name = networkStats)]
    pub fn network_stats(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&network_stats(&self.explorer.network().routes))
            .map_err(err_to_js)
    }

    /// `sortBy` is `"name"`, `"distance"`, or `"stops"`, defaulting to name. Returns route IDs.
    #[wasm_bindgen(js_name = searchRoutes)]
    pub fn search_routes(&self, query: &str, sort_by: JsValue) -> Result<JsValue, JsValue> {
        let sort_by: SortBy = if sort_by.is_undefined() {
            SortBy::default()
        } else {
            serde_wasm_bindgen::from_value(sort_by).map_err(err_to_js)?
        };
        let ids: Vec<&str> = search_routes(&self.explorer.network().routes, query, sort_by)
            .into_iter()
            .map(|r| r.route_id.as_str())
            .collect();
        serde_wasm_bindgen::to_value(&ids).map_err(err_to_js)
    }

    pub fn state(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(self.explorer.state()).map_err(err_to_js)
    }

    /// The query string as the explorer last wrote it
    pub fn search(&self) -> String {
        self.explorer.search().to_string()
    }

    /// Call on unmount. Afterwards, nothing calls back into JS.
    pub fn dispose(&mut self) {
        self.explorer.dispose();
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
impl JsBusExplorer {
    /// Fetches and converts the raw ODPT documents directly. This always succeeds; if the data
    /// couldn't be loaded, the explorer is empty and `loadFailed` is true.
    pub async fn load(
        stops_url: String,
        patterns_url: String,
        search: String,
    ) -> Result<JsBusExplorer, JsValue> {
        setup();

        let (network, report) =
            odpt_to_bus_network::load(&http::HttpSource, &stops_url, &patterns_url).await;
        Ok(Self::from_network(network, report.failed, &search))
    }
}

impl JsBusExplorer {
    fn from_network(network: BusNetwork, load_failed: bool, search: &str) -> Self {
        info!(
            "Explorer has {} routes and {} stops",
            network.routes.len(),
            network.stops.len()
        );
        Self {
            explorer: Explorer::new(network, ExplorerConfig::default(), search),
            load_failed,
        }
    }
}

#[wasm_bindgen(js_name = routeColor)]
pub fn js_route_color(route_name: &str) -> String {
    route_color(route_name).to_string()
}

fn route_feature(route: &Route, selected: bool) -> Feature {
    let mut feature = Feature::from(Geometry::new(geojson::Value::LineString(
        route.coordinates.iter().map(position).collect(),
    )));
    feature.set_property("route_id", route.route_id.clone());
    feature.set_property("name", route.route_name.clone());
    feature.set_property("color", route_color(&route.route_name));
    feature.set_property("selected", selected);
    feature
}

fn stop_feature(stop: &Stop) -> Feature {
    let mut feature = Feature::from(Geometry::new(geojson::Value::Point(position(&stop.pos()))));
    feature.set_property("stop_id", stop.id.clone());
    feature.set_property("name", stop.name.clone());
    feature.set_property("name_en", stop.name_en.clone());
    feature.set_property("routes", stop.routes.clone());
    feature
}

fn position(pt: &LatLng) -> Vec<f64> {
    vec![pt.lng, pt.lat]
}

fn to_geojson_string(features: Vec<Feature>) -> Result<String, JsValue> {
    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };
    serde_json::to_string(&collection).map_err(err_to_js)
}

fn effects_to_js(effects: Vec<Effect>) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(&effects).map_err(err_to_js)
}

fn err_to_js<E: std::fmt::Display>(err: E) -> JsValue {
    JsValue::from_str(&err.to_string())
}

#[cfg(target_arch = "wasm32")]
mod http {
    use anyhow::{anyhow, bail, Result};
    use gloo_net::http::Request;

    use odpt_to_bus_network::DataSource;

    /// Treats resources as URLs.
    pub struct HttpSource;

    impl DataSource for HttpSource {
        async fn fetch(&self, resource: &str) -> Result<String> {
            // These errors hold JS values, so they can't go in an anyhow::Error as-is
            let resp = Request::get(resource)
                .send()
                .await
                .map_err(|err| anyhow!("fetching {}: {}", resource, err))?;
            if !resp.ok() {
                bail!("{} returned {}", resource, resp.status());
            }
            resp.text()
                .await
                .map_err(|err| anyhow!("reading {}: {}", resource, err))
        }
    }
}
