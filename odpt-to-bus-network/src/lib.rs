mod raw;
#[cfg(test)]
mod tests;

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use log::{error, info, warn};
use serde::Serialize;
use serde_json::Value;

use bus_network::{BusNetwork, Route, Stop};

pub use raw::{RawPattern, RawStop};

pub const STOPS_RESOURCE: &str = "BusstopPole.json";
pub const PATTERNS_RESOURCE: &str = "BusroutePattern.json";

/// Somewhere the two raw documents can be fetched from.
#[allow(async_fn_in_trait)]
pub trait DataSource {
    async fn fetch(&self, resource: &str) -> Result<String>;
}

/// Reads resources as paths relative to a root directory.
pub struct FileSource {
    pub root: PathBuf,
}

impl FileSource {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }
}

impl DataSource for FileSource {
    async fn fetch(&self, resource: &str) -> Result<String> {
        let path = self.root.join(resource);
        std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))
    }
}

/// What happened to the input along the way. None of this affects the result, it's just for
/// noticing gaps in the data.
#[derive(Clone, Default, PartialEq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub stop_records: usize,
    pub route_records: usize,
    /// Malformed, missing an ID or coordinates, or a duplicate ID
    pub skipped_stops: usize,
    /// Malformed or missing an ID
    pub skipped_patterns: usize,
    /// References to stops that don't exist, dropped from their route
    pub unresolved_stop_refs: usize,
    /// Patterns left with fewer than 2 stops and fewer than 2 path points
    pub dropped_routes: usize,
    /// Fetching or parsing a whole document failed, so the network is empty
    pub failed: bool,
}

/// Fetches both documents concurrently and builds the network. This never fails; if anything
/// goes wrong fetching or parsing, it logs and returns an empty network, with `failed` set in the
/// report.
pub async fn load<S: DataSource>(
    source: &S,
    stops_resource: &str,
    patterns_resource: &str,
) -> (BusNetwork, IngestReport) {
    let (stops, patterns) = futures::join!(
        source.fetch(stops_resource),
        source.fetch(patterns_resource)
    );
    let result = match (stops, patterns) {
        (Ok(stops), Ok(patterns)) => build_network(&stops, &patterns),
        (Err(err), _) | (_, Err(err)) => Err(err),
    };
    match result {
        Ok(pair) => pair,
        Err(err) => {
            error!("Error loading bus data: {err:#}");
            (
                BusNetwork::default(),
                IngestReport {
                    failed: true,
                    ..Default::default()
                },
            )
        }
    }
}

/// Normalizes raw stop and route pattern JSON into a network. Only fails if either document isn't
/// a JSON array; individual bad records are skipped and counted.
pub fn build_network(stops_json: &str, patterns_json: &str) -> Result<(BusNetwork, IngestReport)> {
    let raw_stops = parse_array(stops_json).context("parsing stops")?;
    let raw_patterns = parse_array(patterns_json).context("parsing route patterns")?;

    let mut report = IngestReport {
        stop_records: raw_stops.len(),
        route_records: raw_patterns.len(),
        ..Default::default()
    };

    let stops = normalize_stops(raw_stops, &mut report);
    let routes = normalize_routes(raw_patterns, &stops, &mut report);

    info!(
        "Got {} stops and {} routes from {} stop and {} pattern records",
        stops.len(),
        routes.len(),
        report.stop_records,
        report.route_records
    );
    if report.skipped_stops > 0 || report.skipped_patterns > 0 {
        warn!(
            "Skipped {} stop records and {} pattern records",
            report.skipped_stops, report.skipped_patterns
        );
    }
    if report.unresolved_stop_refs > 0 {
        warn!(
            "{} stop references point to unknown stops",
            report.unresolved_stop_refs
        );
    }
    if report.dropped_routes > 0 {
        info!(
            "Dropped {} routes without enough points to draw",
            report.dropped_routes
        );
    }

    Ok((BusNetwork { stops, routes }, report))
}

fn parse_array(input: &str) -> Result<Vec<Value>> {
    match serde_json::from_str(input)? {
        Value::Array(list) => Ok(list),
        _ => bail!("expected a JSON array"),
    }
}

fn normalize_stops(raw_stops: Vec<Value>, report: &mut IngestReport) -> Vec<Stop> {
    let mut stops: Vec<Stop> = Vec::new();
    let mut seen = HashSet::new();
    for value in raw_stops {
        let stop = serde_json::from_value::<RawStop>(value)
            .ok()
            .and_then(RawStop::normalize);
        match stop {
            // IDs must be unique; the first record wins
            Some(stop) if seen.insert(stop.id.clone()) => {
                stops.push(stop);
            }
            _ => {
                report.skipped_stops += 1;
            }
        }
    }
    stops
}

fn normalize_routes(
    raw_patterns: Vec<Value>,
    stops: &[Stop],
    report: &mut IngestReport,
) -> Vec<Route> {
    let lookup: HashMap<&str, &Stop> = stops.iter().map(|s| (s.id.as_str(), s)).collect();

    let mut routes = Vec::new();
    for value in raw_patterns {
        let Ok(mut pattern) = serde_json::from_value::<RawPattern>(value) else {
            report.skipped_patterns += 1;
            continue;
        };
        let Some(route_id) = pattern.route_id() else {
            report.skipped_patterns += 1;
            continue;
        };

        let mut route_stops = Vec::new();
        for order in pattern.sorted_stop_order() {
            let Some(stop) = order.stop.as_deref().and_then(|id| lookup.get(id)) else {
                report.unresolved_stop_refs += 1;
                continue;
            };
            let mut stop = (*stop).clone();
            if let Some(note) = order.note.filter(|x| !x.is_empty()) {
                stop.name = note;
            }
            route_stops.push(stop);
        }

        let path = pattern.path();
        match Route::from_parts(
            route_id,
            pattern.route_name(),
            pattern.route_name_ja(),
            route_stops,
            path,
        ) {
            Some(route) => routes.push(route),
            None => {
                report.dropped_routes += 1;
            }
        }
    }
    routes
}

#[cfg(target_arch = "wasm32")]
use std::sync::Once;
#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
static START: Once = Once::new();

/// Converts the two raw documents into the bincoded network `JsBusExplorer` expects.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen()]
pub fn convert(stops_json: String, patterns_json: String) -> Result<Vec<u8>, JsValue> {
    START.call_once(|| {
        // bus-explorer might've set up logging already, in the same module
        let _ = console_log::init_with_level(log::Level::Info);
        console_error_panic_hook::set_once();
    });

    let (network, _) = build_network(&stops_json, &patterns_json)
        .map_err(|err| JsValue::from_str(&err.to_string()))?;
    bincode::serialize(&network).map_err(|err| JsValue::from_str(&err.to_string()))
}
