use bus_network::{BBox, Route};

/// Routes whose bounding box touches the viewport, in input order.
///
/// This only compares rectangles, so a route bending around the viewport without entering it can
/// still show up. Checking the actual polyline isn't worth it for deciding what to draw.
pub fn filter_in_viewport<'a>(routes: &'a [Route], bbox: &BBox) -> Vec<&'a Route> {
    routes
        .iter()
        .filter(|route| route.bounds.intersects(bbox))
        .collect()
}
