use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use bus_network::Route;

const PALETTE: [&str; 15] = [
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FECA57", "#FF9FF3", "#54A0FF", "#5F27CD",
    "#00D2D3", "#FF9F43", "#C44569", "#F8B500", "#6C5CE7", "#A29BFE", "#FD79A8",
];

/// Summarizes a whole network. All distances are km.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStats {
    pub total_routes: usize,
    /// Stops are counted once per route serving them
    pub total_stops: usize,
    /// The mean of each route's average stop spacing
    pub mean_avg_distance: f64,
    pub total_distance: f64,
    /// How many routes have an average spacing of at most 1, 2, 5 km, or more
    pub histogram: [usize; 4],
    pub top_routes: Vec<RouteSummary>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSummary {
    pub route_id: String,
    pub route_name: String,
    pub avg_distance: f64,
    pub num_stops: usize,
}

pub fn network_stats(routes: &[Route]) -> NetworkStats {
    let mut histogram = [0; 4];
    for route in routes {
        let bucket = if route.avg_distance <= 1.0 {
            0
        } else if route.avg_distance <= 2.0 {
            1
        } else if route.avg_distance <= 5.0 {
            2
        } else {
            3
        };
        histogram[bucket] += 1;
    }

    let mean_avg_distance = if routes.is_empty() {
        0.0
    } else {
        routes.iter().map(|r| r.avg_distance).sum::<f64>() / routes.len() as f64
    };

    let mut top: Vec<&Route> = routes.iter().collect();
    top.sort_by(|a, b| cmp_desc(a.avg_distance, b.avg_distance));
    let top_routes = top
        .into_iter()
        .take(10)
        .map(|r| RouteSummary {
            route_id: r.route_id.clone(),
            route_name: r.route_name.clone(),
            avg_distance: r.avg_distance,
            num_stops: r.num_stops,
        })
        .collect();

    NetworkStats {
        total_routes: routes.len(),
        total_stops: routes.iter().map(|r| r.num_stops).sum(),
        mean_avg_distance,
        total_distance: routes.iter().map(|r| r.total_distance).sum(),
        histogram,
        top_routes,
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    Name,
    /// Widest average stop spacing first
    Distance,
    /// Most stops first
    Stops,
}

/// Routes whose display name contains `query`, ignoring case, or whose Japanese name contains it
/// exactly. An empty query matches everything.
pub fn search_routes<'a>(routes: &'a [Route], query: &str, sort_by: SortBy) -> Vec<&'a Route> {
    let needle = query.to_lowercase();
    let mut matches: Vec<&Route> = routes
        .iter()
        .filter(|r| {
            r.route_name.to_lowercase().contains(&needle) || r.route_name_ja.contains(query)
        })
        .collect();
    match sort_by {
        SortBy::Name => matches.sort_by(|a, b| a.route_name.cmp(&b.route_name)),
        SortBy::Distance => matches.sort_by(|a, b| cmp_desc(a.avg_distance, b.avg_distance)),
        SortBy::Stops => matches.sort_by(|a, b| b.num_stops.cmp(&a.num_stops)),
    }
    matches
}

/// A stable color for a route, so it looks the same everywhere it's drawn. The hash is the
/// classic JS `(hash << 5) - hash` over UTF-16 code units, with the same int32 wrapping.
pub fn route_color(route_name: &str) -> &'static str {
    let mut hash: i64 = 0;
    for unit in route_name.encode_utf16() {
        let shifted = (hash as i32).wrapping_shl(5) as i64;
        hash = unit as i64 + (shifted - hash);
    }
    PALETTE[(hash.unsigned_abs() % PALETTE.len() as u64) as usize]
}

fn cmp_desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}
