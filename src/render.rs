//! Caller-owned map state: view, layers and overlay widgets.

use tracing::info;

use crate::{
    backend::{Backend, LayerSource},
    error::PipelineResult,
    expr::Image,
    geometry::{Geometry, Position},
    legend::{VisParams, Widget},
};

#[derive(Debug, Clone, PartialEq)]
pub struct MapLayer {
    pub name: String,
    pub vis: VisParams,
    pub source: LayerSource,
}

#[derive(Debug, Default)]
pub struct MapContext {
    pub center: Option<Position>,
    pub zoom: Option<u8>,
    pub layers: Vec<MapLayer>,
    pub widgets: Vec<Widget>,
}

impl MapContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn center_on(&mut self, geometry: &Geometry, zoom: u8) {
        self.center = geometry.bounds().map(|b| b.center());
        self.zoom = Some(zoom);
    }

    /// Asks the backend to render `image` and records the resulting layer.
    pub async fn add_layer(
        &mut self,
        backend: &dyn Backend,
        image: &Image,
        vis: &VisParams,
        name: &str,
    ) -> PipelineResult<&MapLayer> {
        vis.validate()?;
        let source = backend.create_map_layer(image, vis).await?;
        info!(layer = name, backend = backend.name(), "map layer added");

        self.layers.push(MapLayer {
            name: name.to_string(),
            vis: vis.clone(),
            source,
        });

        Ok(&self.layers[self.layers.len() - 1])
    }

    pub fn add_widget(&mut self, widget: Widget) {
        self.widgets.push(widget);
    }
}

// -- Tests -------------------------------------------------------------------
