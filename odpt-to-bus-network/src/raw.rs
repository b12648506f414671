//! Loosely-typed records as they appear in ODPT's `BusstopPole.json` and `BusroutePattern.json`.
//! Every field is optional here; nothing optional survives past `normalize`.

use serde::Deserialize;
use serde_json::Value;

use bus_network::{LatLng, Stop};

#[derive(Deserialize, Default)]
pub struct RawStop {
    #[serde(rename = "@id")]
    pub id: Option<String>,
    #[serde(rename = "owl:sameAs")]
    pub same_as: Option<String>,
    pub title: Option<RawTitle>,
    #[serde(rename = "dc:title")]
    pub dc_title: Option<String>,
    #[serde(rename = "geo:lat")]
    pub lat: Option<f64>,
    #[serde(rename = "geo:long")]
    pub lng: Option<f64>,
    #[serde(rename = "odpt:busroutePattern")]
    pub route_patterns: Option<Vec<String>>,
}

#[derive(Deserialize, Default)]
pub struct RawTitle {
    pub ja: Option<String>,
    pub en: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct RawPattern {
    #[serde(rename = "@id")]
    pub id: Option<String>,
    #[serde(rename = "owl:sameAs")]
    pub same_as: Option<String>,
    #[serde(rename = "dc:title")]
    pub dc_title: Option<String>,
    #[serde(rename = "odpt:pattern")]
    pub pattern: Option<String>,
    #[serde(rename = "odpt:busstopPoleOrder")]
    pub stop_order: Option<Vec<RawStopOrder>>,
    #[serde(rename = "ug:region")]
    pub region: Option<RawRegion>,
}

#[derive(Deserialize, Default)]
pub struct RawStopOrder {
    #[serde(rename = "odpt:busstopPole")]
    pub stop: Option<String>,
    #[serde(rename = "odpt:index")]
    pub index: Option<f64>,
    #[serde(rename = "odpt:note")]
    pub note: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct RawRegion {
    // Left untyped; LineString and MultiLineString nest differently
    pub coordinates: Option<Value>,
}

impl RawStop {
    /// Stops without an ID or coordinates are useless to us.
    pub fn normalize(self) -> Option<Stop> {
        let id = non_empty(self.same_as).or_else(|| non_empty(self.id))?;
        let lat = self.lat.filter(|x| x.is_finite())?;
        let lng = self.lng.filter(|x| x.is_finite())?;
        let (ja, en) = match self.title {
            Some(title) => (non_empty(title.ja), non_empty(title.en)),
            None => (None, None),
        };
        Some(Stop {
            id,
            name: ja.or_else(|| non_empty(self.dc_title)).unwrap_or_default(),
            name_en: en.unwrap_or_default(),
            lat,
            lng,
            routes: self.route_patterns.unwrap_or_default(),
        })
    }
}

impl RawPattern {
    pub fn route_id(&self) -> Option<String> {
        non_empty(self.same_as.clone()).or_else(|| non_empty(self.id.clone()))
    }

    /// `odpt.BusroutePattern:Toei.Ou57.30301.1` is named `Ou57`
    pub fn route_name(&self) -> String {
        self.same_as
            .as_deref()
            .and_then(|x| x.split('.').nth(2))
            .filter(|x| !x.is_empty())
            .map(|x| x.to_string())
            .or_else(|| non_empty(self.pattern.clone()))
            .unwrap_or_default()
    }

    pub fn route_name_ja(&self) -> String {
        non_empty(self.dc_title.clone()).unwrap_or_default()
    }

    /// Stop references sorted by their explicit index. Entries without one go last, keeping their
    /// relative order.
    pub fn sorted_stop_order(&mut self) -> Vec<RawStopOrder> {
        let mut order = self.stop_order.take().unwrap_or_default();
        order.sort_by(|a, b| match (a.index, b.index) {
            (Some(a), Some(b)) => a.total_cmp(&b),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        order
    }

    /// The explicit geometry as (lat, lng), or empty. The source stores (lng, lat).
    pub fn path(&self) -> Vec<LatLng> {
        let mut path = Vec::new();
        if let Some(coordinates) = self.region.as_ref().and_then(|r| r.coordinates.as_ref()) {
            collect_positions(coordinates, &mut path);
        }
        path
    }
}

// Flattens any nesting of positions, so a MultiLineString becomes its parts end to end
fn collect_positions(value: &Value, out: &mut Vec<LatLng>) {
    let Some(array) = value.as_array() else {
        return;
    };
    if array.first().map_or(false, Value::is_number) {
        if let [lng, lat, ..] = array.as_slice() {
            if let (Some(lng), Some(lat)) = (lng.as_f64(), lat.as_f64()) {
                if lng.is_finite() && lat.is_finite() {
                    out.push(LatLng::new(lat, lng));
                }
            }
        }
        return;
    }
    for x in array {
        collect_positions(x, out);
    }
}

fn non_empty(x: Option<String>) -> Option<String> {
    x.filter(|x| !x.is_empty())
}
