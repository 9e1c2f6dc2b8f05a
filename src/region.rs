//! Resolves an administrative region name to its boundary geometry.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    backend::Backend,
    error::{PipelineResult, ResolutionError},
    geometry::Geometry,
};

/// Selects features of a boundary dataset whose `field` equals `value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionFilter {
    pub dataset: String,
    pub field: String,
    pub value: String,
}

impl RegionFilter {
    pub fn new(dataset: &str, field: &str, value: &str) -> Self {
        RegionFilter {
            dataset: dataset.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        }
    }
}

impl Default for RegionFilter {
    /// Kenya in the FAO GAUL 2015 country layer.
    fn default() -> Self {
        RegionFilter::new("FAO/GAUL/2015/level0", "ADM0_NAME", "Kenya")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub name: String,
    pub geometry: Geometry,
}

/// Returns the single feature matching `filter`.
///
/// Duplicate administrative records are an error rather than being resolved
/// by taking the first one.
pub async fn resolve(backend: &dyn Backend, filter: &RegionFilter) -> PipelineResult<Region> {
    let features = backend.list_features(filter).await?;

    let feature = match features.len() {
        0 => {
            return Err(ResolutionError::NotFound {
                dataset: filter.dataset.clone(),
                field: filter.field.clone(),
                value: filter.value.clone(),
            }
            .into())
        }
        1 => features.into_iter().next(),
        count => {
            return Err(ResolutionError::Ambiguous {
                dataset: filter.dataset.clone(),
                field: filter.field.clone(),
                value: filter.value.clone(),
                count,
            }
            .into())
        }
    };

    let geometry = feature
        .and_then(|f| f.geometry)
        .ok_or_else(|| ResolutionError::MissingGeometry {
            field: filter.field.clone(),
            value: filter.value.clone(),
        })?;
    info!(region = %filter.value, dataset = %filter.dataset, "region resolved");

    Ok(Region {
        name: filter.value.clone(),
        geometry,
    })
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use serde_json::{json, Map, Value};

    use super::*;
    use crate::{backend::local::LocalBackend, error::PipelineError, geometry::Feature};

    fn feature(name: &str, geometry: Option<Geometry>) -> Feature {
        let mut properties = Map::new();
        properties.insert("ADM0_NAME".to_string(), Value::String(name.to_string()));
        properties.insert("ADM0_CODE".to_string(), json!(133));
        Feature {
            geometry,
            properties,
        }
    }

    fn backend(features: Vec<Feature>) -> LocalBackend {
        LocalBackend::new().with_features("FAO/GAUL/2015/level0", features)
    }

    #[tokio::test]
    async fn should_resolve_single_match() {
        let kenya = Geometry::rectangle(33.9, -4.7, 41.9, 5.0);
        let backend = backend(vec![
            feature("Kenya", Some(kenya.clone())),
            feature("Uganda", Some(Geometry::rectangle(29.5, -1.5, 35.0, 4.2))),
        ]);

        let region = resolve(&backend, &RegionFilter::default()).await.unwrap();

        assert_eq!(region.name, "Kenya");
        assert_eq!(region.geometry, kenya);
    }

    #[tokio::test]
    async fn should_fail_when_nothing_matches() {
        let backend = backend(vec![feature("Uganda", None)]);

        let result = resolve(&backend, &RegionFilter::default()).await;

        assert!(matches!(
            result,
            Err(PipelineError::Resolution(ResolutionError::NotFound { .. }))
        ));
    }

    #[tokio::test]
    async fn should_fail_on_duplicate_records() {
        let g = Geometry::rectangle(0.0, 0.0, 1.0, 1.0);
        let backend = backend(vec![
            feature("Kenya", Some(g.clone())),
            feature("Kenya", Some(g)),
        ]);

        let result = resolve(&backend, &RegionFilter::default()).await;

        assert!(matches!(
            result,
            Err(PipelineError::Resolution(ResolutionError::Ambiguous { count: 2, .. }))
        ));
    }

    #[tokio::test]
    async fn should_fail_without_geometry() {
        let backend = backend(vec![feature("Kenya", None)]);

        let result = resolve(&backend, &RegionFilter::default()).await;

        assert!(matches!(
            result,
            Err(PipelineError::Resolution(ResolutionError::MissingGeometry { .. }))
        ));
    }

    #[tokio::test]
    async fn should_report_unknown_dataset_as_backend_error() {
        let backend = LocalBackend::new();

        let result = resolve(&backend, &RegionFilter::default()).await;

        assert!(matches!(result, Err(PipelineError::Backend(_))));
    }
}
