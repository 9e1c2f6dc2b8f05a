//! Region geometry in GeoJSON form (lon/lat degrees, EPSG:4326).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `[lon, lat]`
pub type Position = [f64; 2];

/// A closed ring of positions. The last position repeats the first.
pub type Ring = Vec<Position>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    /// Exterior ring followed by any holes.
    Polygon { coordinates: Vec<Ring> },
    MultiPolygon { coordinates: Vec<Vec<Ring>> },
}

impl Geometry {
    /// Axis-aligned rectangle, for fixtures.
    #[cfg(test)]
    pub fn rectangle(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Geometry::Polygon {
            coordinates: vec![vec![
                [min_lon, min_lat],
                [max_lon, min_lat],
                [max_lon, max_lat],
                [min_lon, max_lat],
                [min_lon, min_lat],
            ]],
        }
    }

    fn polygons(&self) -> Vec<&[Ring]> {
        match self {
            Geometry::Polygon { coordinates } => vec![coordinates.as_slice()],
            Geometry::MultiPolygon { coordinates } => {
                coordinates.iter().map(|p| p.as_slice()).collect()
            }
        }
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        self.polygons()
            .into_iter()
            .any(|rings| polygon_contains(rings, lon, lat))
    }

    pub fn bounds(&self) -> Option<BoundingBox> {
        let mut positions = self
            .polygons()
            .into_iter()
            .flat_map(|rings| rings.iter().take(1))
            .flatten();

        let first = positions.next()?;
        let mut bbox = BoundingBox {
            min_lon: first[0],
            min_lat: first[1],
            max_lon: first[0],
            max_lat: first[1],
        };
        for p in positions {
            bbox.min_lon = bbox.min_lon.min(p[0]);
            bbox.min_lat = bbox.min_lat.min(p[1]);
            bbox.max_lon = bbox.max_lon.max(p[0]);
            bbox.max_lat = bbox.max_lat.max(p[1]);
        }

        Some(bbox)
    }
}

// Even-odd rule: inside the exterior ring and outside every hole.
fn polygon_contains(rings: &[Ring], lon: f64, lat: f64) -> bool {
    match rings.split_first() {
        Some((exterior, holes)) => {
            ring_contains(exterior, lon, lat) && !holes.iter().any(|h| ring_contains(h, lon, lat))
        }
        None => false,
    }
}

fn ring_contains(ring: &[Position], lon: f64, lat: f64) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }

    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = (ring[i][0], ring[i][1]);
        let (xj, yj) = (ring[j][0], ring[j][1]);
        if (yi > lat) != (yj > lat) && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }

    inside
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_lon <= other.max_lon
            && other.min_lon <= self.max_lon
            && self.min_lat <= other.max_lat
            && other.min_lat <= self.max_lat
    }

    pub fn center(&self) -> Position {
        [
            (self.min_lon + self.max_lon) / 2.0,
            (self.min_lat + self.max_lat) / 2.0,
        ]
    }
}

/// A GeoJSON feature with free-form properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Feature {
    /// Compares a property with a string value, as administrative names are.
    pub fn property_equals(&self, field: &str, value: &str) -> bool {
        match self.properties.get(field) {
            Some(Value::String(s)) => s == value,
            Some(Value::Number(n)) => n.to_string() == value,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn square_with_hole() -> Geometry {
        Geometry::Polygon {
            coordinates: vec![
                vec![[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]],
                vec![[4.0, 4.0], [6.0, 4.0], [6.0, 6.0], [4.0, 6.0], [4.0, 4.0]],
            ],
        }
    }

    #[test]
    fn should_contain_point_inside_exterior() {
        let g = square_with_hole();
        assert!(g.contains(1.0, 1.0));
        assert!(g.contains(9.5, 2.0));
    }

    #[test]
    fn should_exclude_points_in_hole_and_outside() {
        let g = square_with_hole();
        assert!(!g.contains(5.0, 5.0));
        assert!(!g.contains(11.0, 5.0));
        assert!(!g.contains(-0.5, -0.5));
    }

    #[test]
    fn should_contain_point_in_any_part_of_multipolygon() {
        let g = Geometry::MultiPolygon {
            coordinates: vec![
                vec![vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0], [0.0, 0.0]]],
                vec![vec![[5.0, 5.0], [6.0, 5.0], [6.0, 6.0], [5.0, 6.0], [5.0, 5.0]]],
            ],
        };
        assert!(g.contains(0.5, 0.5));
        assert!(g.contains(5.5, 5.5));
        assert!(!g.contains(3.0, 3.0));
    }

    #[test]
    fn should_compute_bounds() {
        let g = Geometry::rectangle(30.0, -4.0, 42.0, 6.0);
        let b = g.bounds().unwrap();
        assert_eq!(b.min_lon, 30.0);
        assert_eq!(b.max_lat, 6.0);
        assert_eq!(b.center(), [36.0, 1.0]);
    }

    #[test]
    fn should_parse_geojson_feature() {
        let json = r#"{
            "type": "Feature",
            "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]},
            "properties": {"ADM0_NAME": "Kenya", "ADM0_CODE": 133}
        }"#;
        let f: Feature = serde_json::from_str(json).unwrap();

        assert!(f.property_equals("ADM0_NAME", "Kenya"));
        assert!(f.property_equals("ADM0_CODE", "133"));
        assert!(!f.property_equals("ADM0_NAME", "Uganda"));
        assert!(matches!(f.geometry, Some(Geometry::Polygon { .. })));
    }
}
