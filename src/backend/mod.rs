//! Evaluation backends.
//!
//! Expressions built in [`crate::expr`] are only ever evaluated here. A
//! backend either evaluates them itself ([`local::LocalBackend`]) or forwards
//! them to a hosted service ([`earthengine::EarthEngineBackend`]).

pub mod earthengine;
pub mod encode;
pub mod local;

use async_trait::async_trait;

use crate::{
    error::BackendError,
    export::{ExportFormat, ExportRequest},
    expr::Image,
    geometry::Feature,
    legend::{Color, VisParams},
    raster::{Grid, Raster},
    region::RegionFilter,
};

pub use earthengine::EarthEngineBackend;
pub use local::LocalBackend;

/// What a backend hands back for a map layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerSource {
    /// `{z}/{x}/{y}` tile URL template served by the backend.
    Tiles { url_template: String },
    /// Rendered pixels, `None` where the image has no data.
    Pixels {
        grid: Grid,
        colors: Vec<Option<Color>>,
    },
}

/// Handle of a submitted export job.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTask {
    pub id: String,
    pub destination: String,
}

#[async_trait]
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    /// Features of `filter.dataset` whose `filter.field` equals `filter.value`.
    async fn list_features(&self, filter: &RegionFilter) -> Result<Vec<Feature>, BackendError>;

    /// Evaluates `image` to pixels.
    async fn compute(&self, image: &Image) -> Result<Raster, BackendError>;

    async fn create_map_layer(
        &self,
        image: &Image,
        vis: &VisParams,
    ) -> Result<LayerSource, BackendError>;

    /// Submits an export job and returns as soon as it is accepted.
    async fn start_export(&self, request: &ExportRequest) -> Result<ExportTask, BackendError>;

    fn supports_format(&self, format: ExportFormat) -> bool;
}
