use geo::{BoundingRect, Distance, HaversineMeasure, MultiPoint, Point, Rect};
use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometers between two points, using the Haversine formula.
pub fn distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    // The radius sets the units
    HaversineMeasure::new(EARTH_RADIUS_KM)
        .distance(Point::new(lng1, lat1), Point::new(lng2, lat2))
}

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug, Default)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn dist_to(self, other: LatLng) -> f64 {
        distance(self.lat, self.lng, other.lat, other.lng)
    }
}

/// An axis-aligned rectangle in lat/lng space. The all-zero box stands in for "no points".
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct BBox {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl BBox {
    pub fn new(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> Self {
        Self {
            min_lat,
            min_lng,
            max_lat,
            max_lng,
        }
    }

    /// The tightest box around some points, or the degenerate zero box if there are none.
    pub fn around<I: IntoIterator<Item = LatLng>>(pts: I) -> Self {
        let pts: MultiPoint<f64> = pts
            .into_iter()
            .map(|pt| Point::new(pt.lng, pt.lat))
            .collect();
        pts.bounding_rect().map(BBox::from).unwrap_or_default()
    }

    /// Touching edges count as intersecting.
    pub fn intersects(&self, other: &BBox) -> bool {
        !(self.min_lat > other.max_lat
            || self.max_lat < other.min_lat
            || self.min_lng > other.max_lng
            || self.max_lng < other.min_lng)
    }

    pub fn contains(&self, pt: LatLng) -> bool {
        pt.lat >= self.min_lat
            && pt.lat <= self.max_lat
            && pt.lng >= self.min_lng
            && pt.lng <= self.max_lng
    }

    pub fn center(&self) -> LatLng {
        LatLng::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lng + self.max_lng) / 2.0,
        )
    }
}

impl From<Rect<f64>> for BBox {
    fn from(rect: Rect<f64>) -> Self {
        // geo uses x for longitude and y for latitude
        BBox::new(rect.min().y, rect.min().x, rect.max().y, rect.max().x)
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub id: String,
    pub name: String,
    pub name_en: String,
    pub lat: f64,
    pub lng: f64,
    /// Route patterns referencing this stop, in no particular order
    pub routes: Vec<String>,
}

impl Stop {
    pub fn pos(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

#[derive(Serialize, Deserialize, Clone, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub route_id: String,
    pub route_name: String,
    pub route_name_ja: String,
    /// In traversal order. A stop's name may be overridden by the route's note for it.
    pub stops: Vec<Stop>,
    /// The polyline to draw
    pub coordinates: Vec<LatLng>,
    pub num_stops: usize,
    /// Kilometers
    pub total_distance: f64,
    /// Kilometers per segment
    pub avg_distance: f64,
    pub bounds: BBox,
}

impl Route {
    /// Derives the polyline, distance metrics, and bounds. `path` is explicit geometry from the
    /// source, possibly empty. Returns `None` when there are fewer than 2 stops and fewer than 2
    /// path points, since there's nothing worth drawing.
    pub fn from_parts(
        route_id: String,
        route_name: String,
        route_name_ja: String,
        stops: Vec<Stop>,
        path: Vec<LatLng>,
    ) -> Option<Route> {
        if stops.len() < 2 && path.len() < 2 {
            return None;
        }

        let coordinates = if path.is_empty() {
            stops.iter().map(Stop::pos).collect()
        } else {
            path
        };

        // Measure along the stops when we can; the drawn path may wander past the first and last
        // stop
        let measured: Vec<LatLng> = if stops.len() >= 2 {
            stops.iter().map(Stop::pos).collect()
        } else {
            coordinates.clone()
        };
        let total_distance: f64 = measured.windows(2).map(|pair| pair[0].dist_to(pair[1])).sum();
        let avg_distance = if measured.len() < 2 {
            0.0
        } else {
            total_distance / (measured.len() - 1) as f64
        };

        let bounds = if coordinates.is_empty() {
            BBox::around(stops.iter().map(Stop::pos))
        } else {
            BBox::around(coordinates.iter().copied())
        };

        Some(Route {
            route_id,
            route_name,
            route_name_ja,
            num_stops: stops.len(),
            stops,
            coordinates,
            total_distance,
            avg_distance,
            bounds,
        })
    }
}

/// Everything the explorer needs, produced once by ingestion and immutable afterwards.
#[derive(Serialize, Deserialize, Clone, PartialEq, Debug, Default)]
pub struct BusNetwork {
    pub stops: Vec<Stop>,
    /// In ingestion order
    pub routes: Vec<Route>,
}

impl BusNetwork {
    pub fn is_empty(&self) -> bool {
        self.stops.is_empty() && self.routes.is_empty()
    }

    pub fn route(&self, route_id: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.route_id == route_id)
    }

    /// Older links stored the display name instead of the ID
    pub fn route_by_name(&self, name: &str) -> Option<&Route> {
        self.routes
            .iter()
            .find(|r| r.route_name == name)
            .or_else(|| self.routes.iter().find(|r| r.route_name_ja == name))
    }

    pub fn stop(&self, stop_id: &str) -> Option<&Stop> {
        self.stops.iter().find(|s| s.id == stop_id)
    }
}
