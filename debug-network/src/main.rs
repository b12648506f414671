use geojson::{Feature, Geometry, Value};

use bus_network::{BusNetwork, LatLng};

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        println!("Pass in a network.bin file");
        std::process::exit(1);
    }
    let bytes = std::fs::read(&args[1]).unwrap();
    let network: BusNetwork = bincode::deserialize(&bytes).unwrap();

    // Roughly what the explorer draws, minus the viewport filtering and stop sampling
    let mut features = Vec::new();
    for (idx, route) in network.routes.iter().enumerate() {
        let line = route.coordinates.iter().map(|pt| position(*pt)).collect();
        let mut f = Feature::from(Geometry::new(Value::LineString(line)));
        f.set_property("route_idx", idx);
        f.set_property("route_id", route.route_id.clone());
        f.set_property("route_name", route.route_name.clone());
        f.set_property("route_name_ja", route.route_name_ja.clone());
        f.set_property("num_stops", route.num_stops);
        f.set_property("total_distance_km", route.total_distance);
        f.set_property("avg_distance_km", route.avg_distance);
        features.push(f);
    }
    for stop in &network.stops {
        let mut f = Feature::from(Geometry::new(Value::Point(position(stop.pos()))));
        f.set_property("stop_id", stop.id.clone());
        f.set_property("name", stop.name.clone());
        f.set_property("name_en", stop.name_en.clone());
        f.set_property("num_routes", stop.routes.len());
        features.push(f);
    }
    let gj = geojson::GeoJson::from(features.into_iter().collect::<geojson::FeatureCollection>());
    std::fs::write("debug.geojson", serde_json::to_string_pretty(&gj).unwrap()).unwrap();
}

// GeoJSON wants (lng, lat)
fn position(pt: LatLng) -> Vec<f64> {
    vec![pt.lng, pt.lat]
}
