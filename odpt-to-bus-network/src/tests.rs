use std::collections::HashMap;

use anyhow::anyhow;
use serde_json::json;

use crate::*;

struct MemorySource(HashMap<&'static str, String>);

impl DataSource for MemorySource {
    async fn fetch(&self, resource: &str) -> Result<String> {
        self.0
            .get(resource)
            .cloned()
            .ok_or_else(|| anyhow!("404 {resource}"))
    }
}

fn stops_json() -> String {
    json!([
        {
            "@id": "urn:uuid:1",
            "owl:sameAs": "odpt.BusstopPole:Toei.Shibuya.1",
            "title": { "ja": "渋谷駅前", "en": "Shibuya Sta." },
            "dc:title": "渋谷駅前",
            "geo:lat": 35.658,
            "geo:long": 139.701,
            "odpt:busroutePattern": ["odpt.BusroutePattern:Toei.To01.1"]
        },
        {
            "@id": "urn:uuid:2",
            "owl:sameAs": "odpt.BusstopPole:Toei.Aoyama.1",
            "dc:title": "青山一丁目",
            "geo:lat": 35.672,
            "geo:long": 139.724
        },
        {
            "@id": "urn:uuid:3",
            "title": { "ja": "六本木駅前" },
            "geo:lat": 35.663,
            "geo:long": 139.732,
            "odpt:busroutePattern": []
        },
        // No coordinates
        { "owl:sameAs": "odpt.BusstopPole:Toei.Nowhere.1", "dc:title": "?" },
        // Not even an object
        42
    ])
    .to_string()
}

fn patterns_json() -> String {
    json!([
        {
            "@id": "urn:uuid:p1",
            "owl:sameAs": "odpt.BusroutePattern:Toei.To01.1",
            "dc:title": "都01",
            "odpt:busstopPoleOrder": [
                { "odpt:index": 3, "odpt:busstopPole": "urn:uuid:3" },
                { "odpt:index": 1, "odpt:busstopPole": "odpt.BusstopPole:Toei.Shibuya.1" },
                { "odpt:index": 2, "odpt:busstopPole": "odpt.BusstopPole:Toei.Missing.1" },
                { "odpt:index": 2, "odpt:busstopPole": "odpt.BusstopPole:Toei.Aoyama.1", "odpt:note": "青山一丁目(外苑前方面)" }
            ]
        },
        {
            "@id": "urn:uuid:p2",
            "odpt:pattern": "Ghost",
            "dc:title": "幽霊",
            "odpt:busstopPoleOrder": [
                { "odpt:index": 1, "odpt:busstopPole": "odpt.BusstopPole:Toei.Missing.1" },
                { "odpt:index": 2, "odpt:busstopPole": "odpt.BusstopPole:Toei.Missing.2" }
            ]
        },
        {
            "owl:sameAs": "odpt.BusroutePattern:Toei.Ou57.30301.1",
            "odpt:busstopPoleOrder": [],
            "ug:region": {
                "type": "LineString",
                "coordinates": [[139.70, 35.65], [139.71, 35.66], [139.72]]
            }
        },
        {
            "@id": "urn:uuid:p4",
            "ug:region": {
                "type": "MultiLineString",
                "coordinates": [[[139.70, 35.65]], [[139.75, 35.70], [139.80, 35.72]]]
            }
        },
        { "dc:title": "no id at all" }
    ])
    .to_string()
}

#[test]
fn test_stops() {
    let (network, report) = build_network(&stops_json(), "[]").unwrap();
    assert_eq!(report.stop_records, 5);
    assert_eq!(report.skipped_stops, 2);

    let ids: Vec<&str> = network.stops.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "odpt.BusstopPole:Toei.Shibuya.1",
            "odpt.BusstopPole:Toei.Aoyama.1",
            "urn:uuid:3"
        ]
    );

    let shibuya = &network.stops[0];
    assert_eq!(shibuya.name, "渋谷駅前");
    assert_eq!(shibuya.name_en, "Shibuya Sta.");
    assert_eq!(shibuya.routes, vec!["odpt.BusroutePattern:Toei.To01.1"]);

    // Falls back to dc:title
    assert_eq!(network.stops[1].name, "青山一丁目");
    assert_eq!(network.stops[1].name_en, "");
    assert!(network.stops[1].routes.is_empty());
}

#[test]
fn test_duplicate_stop_ids() {
    let stops = json!([
        { "owl:sameAs": "a", "dc:title": "first", "geo:lat": 1.0, "geo:long": 2.0 },
        { "owl:sameAs": "a", "dc:title": "second", "geo:lat": 3.0, "geo:long": 4.0 }
    ])
    .to_string();
    let (network, report) = build_network(&stops, "[]").unwrap();
    assert_eq!(network.stops.len(), 1);
    assert_eq!(network.stops[0].name, "first");
    assert_eq!(report.skipped_stops, 1);
}

#[test]
fn test_routes() {
    let (network, report) = build_network(&stops_json(), &patterns_json()).unwrap();
    assert_eq!(report.route_records, 5);
    assert_eq!(report.skipped_patterns, 1);
    assert_eq!(report.dropped_routes, 1);
    // One in the first pattern, two in the ghost
    assert_eq!(report.unresolved_stop_refs, 3);
    assert!(!report.failed);

    let ids: Vec<&str> = network.routes.iter().map(|r| r.route_id.as_str()).collect();
    assert_eq!(
        ids,
        vec![
            "odpt.BusroutePattern:Toei.To01.1",
            "odpt.BusroutePattern:Toei.Ou57.30301.1",
            "urn:uuid:p4"
        ]
    );

    let to01 = &network.routes[0];
    assert_eq!(to01.route_name, "To01");
    assert_eq!(to01.route_name_ja, "都01");
    // Sorted by index, with the missing stop dropped and the note overriding the name
    let names: Vec<&str> = to01.stops.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["渋谷駅前", "青山一丁目(外苑前方面)", "六本木駅前"]);
    assert_eq!(to01.num_stops, 3);
    // The stop itself keeps its own name
    assert_eq!(network.stops[1].name, "青山一丁目");

    // No explicit path, so the stops make the polyline
    let stop_pts: Vec<_> = to01.stops.iter().map(|s| s.pos()).collect();
    assert_eq!(to01.coordinates, stop_pts);
    let expected = bus_network::distance(35.658, 139.701, 35.672, 139.724)
        + bus_network::distance(35.672, 139.724, 35.663, 139.732);
    assert!((to01.total_distance - expected).abs() < 1e-9);
    assert!((to01.avg_distance - expected / 2.0).abs() < 1e-9);
    assert_eq!(to01.bounds.min_lat, 35.658);
    assert_eq!(to01.bounds.max_lng, 139.732);

    // Only geometry, stored as (lng, lat) and missing a coordinate in the last entry
    let ou57 = &network.routes[1];
    assert_eq!(ou57.route_name, "Ou57");
    assert_eq!(ou57.route_name_ja, "");
    assert_eq!(ou57.num_stops, 0);
    assert_eq!(
        ou57.coordinates,
        vec![
            bus_network::LatLng::new(35.65, 139.70),
            bus_network::LatLng::new(35.66, 139.71)
        ]
    );
    assert!(ou57.total_distance > 0.0);
    assert_eq!(ou57.avg_distance, ou57.total_distance);

    // MultiLineString parts are joined
    assert_eq!(network.routes[2].coordinates.len(), 3);
    assert_eq!(network.routes[2].route_name, "");
}

#[test]
fn test_all_refs_missing_and_no_geometry_is_dropped() {
    let (network, _) = build_network(&stops_json(), &patterns_json()).unwrap();
    assert!(network.routes.iter().all(|r| r.route_id != "urn:uuid:p2"));
}

#[test]
fn test_not_an_array() {
    assert!(build_network("{}", "[]").is_err());
    assert!(build_network("[]", "not json").is_err());
}

#[test]
fn test_load() {
    let source = MemorySource(HashMap::from([
        (STOPS_RESOURCE, stops_json()),
        (PATTERNS_RESOURCE, patterns_json()),
    ]));
    let (network, report) =
        futures::executor::block_on(load(&source, STOPS_RESOURCE, PATTERNS_RESOURCE));
    assert_eq!(network.stops.len(), 3);
    assert_eq!(network.routes.len(), 3);
    assert!(!report.failed);
}

#[test]
fn test_load_degrades_to_empty() {
    // One fetch fails
    let source = MemorySource(HashMap::from([(STOPS_RESOURCE, stops_json())]));
    let (network, report) =
        futures::executor::block_on(load(&source, STOPS_RESOURCE, PATTERNS_RESOURCE));
    assert!(network.is_empty());
    assert!(report.failed);

    // One document is garbage
    let source = MemorySource(HashMap::from([
        (STOPS_RESOURCE, stops_json()),
        (PATTERNS_RESOURCE, "<html>".to_string()),
    ]));
    let (network, report) =
        futures::executor::block_on(load(&source, STOPS_RESOURCE, PATTERNS_RESOURCE));
    assert!(network.is_empty());
    assert!(report.failed);
}

#[test]
fn test_file_source() {
    let dir = std::env::temp_dir().join(format!("odpt-to-bus-network-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(STOPS_RESOURCE), stops_json()).unwrap();
    std::fs::write(dir.join(PATTERNS_RESOURCE), patterns_json()).unwrap();

    let (network, report) = futures::executor::block_on(load(
        &FileSource::new(&dir),
        STOPS_RESOURCE,
        PATTERNS_RESOURCE,
    ));
    assert_eq!(network.routes.len(), 3);
    assert!(!report.failed);

    std::fs::remove_dir_all(&dir).unwrap();
}
