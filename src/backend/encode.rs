//! Encodes expression graphs in the Earth Engine REST `Expression` format.
//!
//! Every function call and geometry is stored once in `values` under its own
//! key and referenced elsewhere with `valueReference`. Nodes shared through
//! the graph's `Arc`s, and identical geometries, are therefore sent once no
//! matter how many composites use them.

use std::collections::HashMap;

use serde_json::{json, Map, Value};

use crate::{
    expr::{CollectionNode, DateRange, Image, ImageCollection, ImageNode, Property},
    geometry::Geometry,
};

/// `{"result": <key>, "values": {<key>: <node>, ...}}`
pub fn expression(image: &Image) -> Value {
    let mut encoder = Encoder::default();
    let root = encoder.image(image);
    encoder.finish(root)
}

/// Like [`expression`], with the image clipped to `region` and resampled to
/// `scale` meters, as an export expects.
pub fn export_expression(image: &Image, region: &Geometry, scale: f64) -> Value {
    let mut encoder = Encoder::default();
    let input = encoder.image(image);
    let geometry = encoder.geometry(region);
    let root = encoder.invoke(
        "Image.clipToBoundsAndScale",
        json!({
            "input": reference(&input),
            "geometry": reference(&geometry),
            "scale": constant(json!(scale)),
        }),
    );
    encoder.finish(root)
}

fn constant(value: Value) -> Value {
    json!({ "constantValue": value })
}

fn reference(key: &str) -> Value {
    json!({ "valueReference": key })
}

#[derive(Default)]
struct Encoder {
    values: Map<String, Value>,
    /// Graph node address -> key. The graph outlives the encoder, so
    /// addresses stay unique.
    nodes: HashMap<*const (), String>,
    /// Encoded coordinates -> key.
    geometries: HashMap<String, String>,
}

impl Encoder {
    fn finish(self, root: String) -> Value {
        json!({
            "result": root,
            "values": self.values,
        })
    }

    fn invoke(&mut self, function: &str, arguments: Value) -> String {
        let key = self.values.len().to_string();
        self.values.insert(
            key.clone(),
            json!({
                "functionInvocationValue": {
                    "functionName": function,
                    "arguments": arguments,
                }
            }),
        );
        key
    }

    fn image(&mut self, image: &Image) -> String {
        let address = image.node() as *const ImageNode as *const ();
        if let Some(key) = self.nodes.get(&address) {
            return key.clone();
        }

        let key = match image.node() {
            ImageNode::Reduce {
                collection,
                reducer,
            } => {
                let collection = self.collection(collection);
                self.invoke(
                    &format!("reduce.{}", reducer.name()),
                    json!({ "collection": reference(&collection) }),
                )
            }
            ImageNode::Clip { input, geometry } => {
                let input = self.image(input);
                let geometry = self.geometry(geometry);
                self.invoke(
                    "Image.clip",
                    json!({
                        "input": reference(&input),
                        "geometry": reference(&geometry),
                    }),
                )
            }
            ImageNode::Set { input, key, value } => {
                let input = self.image(input);
                self.invoke(
                    "Element.set",
                    json!({
                        "object": reference(&input),
                        "key": constant(json!(key)),
                        "value": constant(property_value(value)),
                    }),
                )
            }
        };

        self.nodes.insert(address, key.clone());
        key
    }

    fn collection(&mut self, collection: &ImageCollection) -> String {
        let address = collection.node() as *const CollectionNode as *const ();
        if let Some(key) = self.nodes.get(&address) {
            return key.clone();
        }

        let key = match collection.node() {
            CollectionNode::Load { id } => {
                self.invoke("ImageCollection.load", json!({ "id": constant(json!(id)) }))
            }
            CollectionNode::FilterBounds { input, geometry } => {
                let input = self.collection(input);
                let geometry = self.geometry(geometry);
                let filter = self.invoke(
                    "Filter.intersects",
                    json!({
                        "leftField": constant(json!(".all")),
                        "rightValue": reference(&geometry),
                    }),
                );
                self.filter(&input, &filter)
            }
            CollectionNode::FilterDate { input, range } => {
                let input = self.collection(input);
                let range = self.date_range(range);
                let filter = self.invoke(
                    "Filter.dateRangeContains",
                    json!({
                        "leftValue": reference(&range),
                        "rightField": constant(json!("system:time_start")),
                    }),
                );
                self.filter(&input, &filter)
            }
            CollectionNode::FromImages { images } => {
                let images: Vec<Value> = images
                    .iter()
                    .map(|image| reference(&self.image(image)))
                    .collect();
                self.invoke(
                    "ImageCollection.fromImages",
                    json!({ "images": { "arrayValue": { "values": images } } }),
                )
            }
        };

        self.nodes.insert(address, key.clone());
        key
    }

    fn filter(&mut self, collection: &str, filter: &str) -> String {
        self.invoke(
            "Collection.filter",
            json!({
                "collection": reference(collection),
                "filter": reference(filter),
            }),
        )
    }

    fn date_range(&mut self, range: &DateRange) -> String {
        let start = self.invoke("Date", json!({ "value": constant(json!(range.start.to_string())) }));
        let end = self.invoke("Date", json!({ "value": constant(json!(range.end.to_string())) }));

        self.invoke(
            "DateRange",
            json!({
                "start": reference(&start),
                "end": reference(&end),
            }),
        )
    }

    fn geometry(&mut self, geometry: &Geometry) -> String {
        let (function, coordinates) = match geometry {
            Geometry::Polygon { coordinates } => ("GeometryConstructors.Polygon", json!(coordinates)),
            Geometry::MultiPolygon { coordinates } => {
                ("GeometryConstructors.MultiPolygon", json!(coordinates))
            }
        };

        let fingerprint = format!("{function}{coordinates}");
        if let Some(key) = self.geometries.get(&fingerprint) {
            return key.clone();
        }

        let key = self.invoke(
            function,
            json!({
                "coordinates": constant(coordinates),
                "evenOdd": constant(json!(true)),
            }),
        );
        self.geometries.insert(fingerprint, key.clone());
        key
    }
}

fn property_value(value: &Property) -> Value {
    match value {
        Property::Int(v) => json!(v),
        Property::Float(v) => json!(v),
        Property::Text(v) => json!(v),
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::season::{seasonal_composites, SeasonWindow, YearRange};

    /// The call stored under `key`.
    fn call<'a>(encoded: &'a Value, key: &Value) -> &'a Value {
        &encoded["values"][key.as_str().unwrap()]["functionInvocationValue"]
    }

    fn root(encoded: &Value) -> &Value {
        call(encoded, &encoded["result"])
    }

    /// The call referenced by argument `name` of `parent`.
    fn arg<'a>(encoded: &'a Value, parent: &Value, name: &str) -> &'a Value {
        call(encoded, &parent["arguments"][name]["valueReference"])
    }

    fn count_calls(encoded: &Value, function: &str) -> usize {
        encoded["values"]
            .as_object()
            .unwrap()
            .values()
            .filter(|v| v["functionInvocationValue"]["functionName"] == function)
            .count()
    }

    #[test]
    fn should_encode_seasonal_sum() {
        let range = DateRange::parse("1981-03-01", "1981-06-01").unwrap();
        let image = ImageCollection::load("UCSB-CHG/CHIRPS/DAILY")
            .filter_date(range)
            .sum()
            .set("year", 1981);

        let encoded = expression(&image);

        let set = root(&encoded);
        assert_eq!(set["functionName"], "Element.set");
        assert_eq!(set["arguments"]["key"]["constantValue"], "year");
        assert_eq!(set["arguments"]["value"]["constantValue"], 1981);

        let sum = arg(&encoded, set, "object");
        assert_eq!(sum["functionName"], "reduce.sum");

        let filter = arg(&encoded, sum, "collection");
        assert_eq!(filter["functionName"], "Collection.filter");
        let date_filter = arg(&encoded, filter, "filter");
        assert_eq!(date_filter["functionName"], "Filter.dateRangeContains");
        let date_range = arg(&encoded, date_filter, "leftValue");
        let start = arg(&encoded, date_range, "start");
        assert_eq!(start["arguments"]["value"]["constantValue"], "1981-03-01");

        let load = arg(&encoded, filter, "collection");
        assert_eq!(load["functionName"], "ImageCollection.load");
        assert_eq!(load["arguments"]["id"]["constantValue"], "UCSB-CHG/CHIRPS/DAILY");
    }

    #[test]
    fn should_wrap_export_in_clip_to_bounds_and_scale() {
        let region = Geometry::rectangle(33.9, -4.7, 41.9, 5.0);
        let image = ImageCollection::from_images(vec![ImageCollection::load("c").sum()])
            .mean()
            .clip(&region);

        let encoded = export_expression(&image, &region, 5000.0);

        let outer = root(&encoded);
        assert_eq!(outer["functionName"], "Image.clipToBoundsAndScale");
        assert_eq!(outer["arguments"]["scale"]["constantValue"], 5000.0);
        assert_eq!(
            arg(&encoded, outer, "geometry")["functionName"],
            "GeometryConstructors.Polygon"
        );

        let clip = arg(&encoded, outer, "input");
        assert_eq!(clip["functionName"], "Image.clip");
        let mean = arg(&encoded, clip, "input");
        assert_eq!(mean["functionName"], "reduce.mean");
        let images = &arg(&encoded, mean, "collection")["arguments"]["images"]["arrayValue"]["values"];
        assert_eq!(images.as_array().unwrap().len(), 1);
    }

    #[test]
    fn should_send_shared_region_once() {
        let region = Geometry::rectangle(33.9, -4.7, 41.9, 5.0);
        let collection = ImageCollection::load("UCSB-CHG/CHIRPS/DAILY").filter_bounds(&region);
        let years = YearRange::new(1981, 2024).unwrap();
        let composites = seasonal_composites(&collection, years, &SeasonWindow::mam()).unwrap();
        let climatology = ImageCollection::from_images(composites).mean().clip(&region);

        let encoded = export_expression(&climatology, &region, 5000.0);

        assert_eq!(count_calls(&encoded, "GeometryConstructors.Polygon"), 1);
        assert_eq!(count_calls(&encoded, "Filter.intersects"), 1);
        assert_eq!(count_calls(&encoded, "ImageCollection.load"), 1);
        assert_eq!(count_calls(&encoded, "reduce.sum"), 44);
    }
}
