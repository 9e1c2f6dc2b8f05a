//! In-process evaluator over gridded daily frames held in memory.
//!
//! Implements the masked semantics of the hosted service: reductions skip
//! no-data, a pixel with nothing to reduce stays no-data, and clipping masks
//! pixels whose centre falls outside the geometry.

use std::{
    collections::HashMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use futures::future::join_all;
use tokio::task::{self, JoinHandle};
use tracing::{debug, info, warn};

use super::{Backend, ExportTask, LayerSource};
use crate::{
    error::BackendError,
    export::{ExportFormat, ExportRequest},
    expr::{CollectionNode, Image, ImageCollection, ImageNode, Property, Reducer},
    geometry::{Feature, FeatureCollection, Geometry},
    geotiff,
    legend::VisParams,
    parquet,
    raster::{Grid, Raster},
    region::RegionFilter,
    season::TIME_START_PROPERTY,
};

/// Meters per degree of latitude, used to turn an export scale into a pixel size.
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Pixel limit applied when a request does not set one.
const DEFAULT_MAX_PIXELS: u64 = 100_000_000;

/// One dated raster of a daily collection.
#[derive(Debug, Clone)]
pub struct Frame {
    pub date: NaiveDate,
    pub raster: Arc<Raster>,
}

impl Frame {
    pub fn new(date: NaiveDate, raster: Raster) -> Self {
        Frame {
            date,
            raster: Arc::new(raster),
        }
    }
}

#[derive(Debug, Clone)]
struct DailyCollection {
    grid: Grid,
    frames: Vec<Frame>,
}

/// Read-only data the evaluator works from. Shared with export jobs.
#[derive(Debug, Clone, Default)]
struct Catalog {
    collections: HashMap<String, DailyCollection>,
    features: HashMap<String, Vec<Feature>>,
}

/// Frames selected by a collection expression.
struct Selection {
    grid: Option<Grid>,
    items: Vec<(Option<NaiveDate>, Arc<Raster>)>,
}

impl Catalog {
    fn select(&self, collection: &ImageCollection) -> Result<Selection, BackendError> {
        match collection.node() {
            CollectionNode::Load { id } => {
                let source = self
                    .collections
                    .get(id)
                    .ok_or_else(|| BackendError::UnknownCollection(id.clone()))?;
                Ok(Selection {
                    grid: Some(source.grid),
                    items: source
                        .frames
                        .iter()
                        .map(|f| (Some(f.date), Arc::clone(&f.raster)))
                        .collect(),
                })
            }
            CollectionNode::FilterBounds { input, geometry } => {
                let mut selection = self.select(input)?;
                let bounds = geometry.bounds();
                selection.items.retain(|(_, raster)| match &bounds {
                    Some(b) => raster.grid.footprint().intersects(b),
                    None => false,
                });
                Ok(selection)
            }
            CollectionNode::FilterDate { input, range } => {
                let mut selection = self.select(input)?;
                selection
                    .items
                    .retain(|(date, _)| date.is_some_and(|d| range.contains(d)));
                Ok(selection)
            }
            CollectionNode::FromImages { images } => {
                let mut items = Vec::with_capacity(images.len());
                for image in images {
                    items.push((image_date(image), Arc::new(self.evaluate(image)?)));
                }
                Ok(Selection {
                    grid: items.first().map(|(_, r)| r.grid),
                    items,
                })
            }
        }
    }

    fn evaluate(&self, image: &Image) -> Result<Raster, BackendError> {
        match image.node() {
            ImageNode::Reduce {
                collection,
                reducer,
            } => {
                let selection = self.select(collection)?;
                let grid = selection
                    .grid
                    .ok_or_else(|| BackendError::EmptyCollection(describe(collection)))?;
                let rasters: Vec<&Raster> = selection.items.iter().map(|(_, r)| r.as_ref()).collect();
                debug!(reducer = reducer.name(), frames = rasters.len(), "reduce");
                match reducer {
                    Reducer::Sum => Raster::sum(grid, &rasters),
                    Reducer::Mean => Raster::mean(grid, &rasters),
                }
            }
            ImageNode::Clip { input, geometry } => Ok(self.evaluate(input)?.clip(geometry)),
            ImageNode::Set { input, .. } => self.evaluate(input),
        }
    }

    fn export(
        &self,
        request: &ExportRequest,
        evaluated: Option<Arc<Raster>>,
        path: &Path,
    ) -> Result<PathBuf, BackendError> {
        let raster = match evaluated {
            Some(raster) => raster,
            None => Arc::new(self.evaluate(&request.image)?),
        };
        let max = request.max_pixels.unwrap_or(DEFAULT_MAX_PIXELS);
        let resampled = resample(&raster, &request.region, request.scale, max)?;
        geotiff::write(path, &resampled)?;

        Ok(path.to_path_buf())
    }
}

// Images built from a collection carry their window start as a timestamp.
fn image_date(image: &Image) -> Option<NaiveDate> {
    match image.property(TIME_START_PROPERTY)? {
        Property::Int(ms) => DateTime::from_timestamp_millis(ms).map(|t| t.date_naive()),
        _ => None,
    }
}

fn describe(collection: &ImageCollection) -> String {
    match collection.node() {
        CollectionNode::Load { id } => id.clone(),
        CollectionNode::FilterBounds { input, .. } | CollectionNode::FilterDate { input, .. } => {
            describe(input)
        }
        CollectionNode::FromImages { .. } => "images".to_string(),
    }
}

/// Nearest-neighbour resampling onto a grid covering `region` at `scale` meters.
fn resample(
    raster: &Raster,
    region: &Geometry,
    scale: f64,
    max_pixels: u64,
) -> Result<Raster, BackendError> {
    let bounds = region
        .bounds()
        .ok_or_else(|| BackendError::Malformed("export region is empty".to_string()))?;
    let cell = scale / METERS_PER_DEGREE;
    let too_many = |pixels: u64| BackendError::TooManyPixels {
        pixels,
        max: max_pixels,
    };

    // Sizes are bounded as floats first; a tiny scale gives counts past u64.
    let columns = ((bounds.max_lon - bounds.min_lon) / cell).ceil().max(1.0);
    let rows = ((bounds.max_lat - bounds.min_lat) / cell).ceil().max(1.0);
    if !(columns * rows <= max_pixels as f64) {
        // `as` saturates, so an overflowing count reports u64::MAX.
        return Err(too_many((columns * rows) as u64));
    }

    let (width, height) = (columns as u64, rows as u64);
    let pixels = width
        .checked_mul(height)
        .filter(|p| *p <= max_pixels)
        .ok_or_else(|| too_many(width.saturating_mul(height)))?;
    let (Ok(width), Ok(height)) = (usize::try_from(width), usize::try_from(height)) else {
        return Err(too_many(pixels));
    };

    let grid = Grid {
        origin_lon: bounds.min_lon + cell / 2.0,
        origin_lat: bounds.max_lat - cell / 2.0,
        cell,
        width,
        height,
    };
    let values = (0..grid.len())
        .map(|i| {
            let (lon, lat) = grid.pixel_center(i);
            raster.get(lon, lat)
        })
        .collect();

    Ok(Raster { grid, values }.clip(region))
}

struct PendingExport {
    task: ExportTask,
    handle: JoinHandle<Result<PathBuf, BackendError>>,
}

/// Result of a finished local export job.
#[derive(Debug)]
pub struct ExportOutcome {
    pub task: ExportTask,
    pub result: Result<PathBuf, BackendError>,
}

pub struct LocalBackend {
    catalog: Arc<Catalog>,
    output_dir: PathBuf,
    pending: Mutex<Vec<PendingExport>>,
    /// Images already evaluated, so rendering and exporting the same graph
    /// node reduce the collection once.
    evaluated: Mutex<Vec<(Image, Arc<Raster>)>>,
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalBackend {
    /// An empty backend exporting to the home directory.
    pub fn new() -> Self {
        LocalBackend {
            catalog: Arc::new(Catalog::default()),
            output_dir: dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")),
            pending: Mutex::new(Vec::new()),
            evaluated: Mutex::new(Vec::new()),
        }
    }

    fn catalog_mut(&mut self) -> &mut Catalog {
        Arc::make_mut(&mut self.catalog)
    }

    pub fn with_collection(mut self, id: &str, grid: Grid, mut frames: Vec<Frame>) -> Self {
        frames.sort_by_key(|f| f.date);
        self.catalog_mut()
            .collections
            .insert(id.to_string(), DailyCollection { grid, frames });
        self
    }

    pub fn with_features(mut self, id: &str, features: Vec<Feature>) -> Self {
        self.catalog_mut().features.insert(id.to_string(), features);
        self
    }

    pub fn with_output_dir(mut self, dir: &Path) -> Self {
        self.output_dir = dir.to_path_buf();
        self
    }

    /// Loads a daily collection from a long-format Parquet table.
    pub fn with_collection_file(self, id: &str, path: &Path) -> Result<Self, BackendError> {
        let (grid, frames) = parquet::load_daily(path)?;
        info!(
            collection = id,
            frames = frames.len(),
            width = grid.width,
            height = grid.height,
            "collection loaded"
        );
        Ok(self.with_collection(id, grid, frames))
    }

    /// Loads a feature collection from a GeoJSON file.
    pub fn with_features_file(self, id: &str, path: &Path) -> Result<Self, BackendError> {
        let reader = BufReader::new(File::open(path)?);
        let collection: FeatureCollection = serde_json::from_reader(reader)?;
        info!(dataset = id, features = collection.features.len(), "features loaded");
        Ok(self.with_features(id, collection.features))
    }

    fn cached(&self, image: &Image) -> Option<Arc<Raster>> {
        self.evaluated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|(seen, _)| seen.same_node(image))
            .map(|(_, raster)| Arc::clone(raster))
    }

    fn evaluate_once(&self, image: &Image) -> Result<Arc<Raster>, BackendError> {
        if let Some(raster) = self.cached(image) {
            debug!("reusing evaluated image");
            return Ok(raster);
        }

        let raster = Arc::new(self.catalog.evaluate(image)?);
        self.evaluated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((image.clone(), Arc::clone(&raster)));

        Ok(raster)
    }

    /// Waits for every export submitted so far.
    pub async fn finish(&self) -> Vec<ExportOutcome> {
        let pending: Vec<PendingExport> = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();

        let (tasks, handles): (Vec<_>, Vec<_>) =
            pending.into_iter().map(|p| (p.task, p.handle)).unzip();

        join_all(handles)
            .await
            .into_iter()
            .zip(tasks)
            .map(|(joined, task)| {
                let result = joined.unwrap_or_else(|e| Err(BackendError::Task(e.to_string())));
                if let Err(e) = &result {
                    warn!(task = %task.id, error = %e, "export failed");
                }
                ExportOutcome { task, result }
            })
            .collect()
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn list_features(&self, filter: &RegionFilter) -> Result<Vec<Feature>, BackendError> {
        let features = self
            .catalog
            .features
            .get(&filter.dataset)
            .ok_or_else(|| BackendError::UnknownFeatures(filter.dataset.clone()))?;

        Ok(features
            .iter()
            .filter(|f| f.property_equals(&filter.field, &filter.value))
            .cloned()
            .collect())
    }

    async fn compute(&self, image: &Image) -> Result<Raster, BackendError> {
        Ok(self.evaluate_once(image)?.as_ref().clone())
    }

    async fn create_map_layer(
        &self,
        image: &Image,
        vis: &VisParams,
    ) -> Result<LayerSource, BackendError> {
        let raster = self.evaluate_once(image)?;
        let colors = raster
            .values
            .iter()
            .map(|v| v.map(|x| vis.color_at(f64::from(x))))
            .collect();

        Ok(LayerSource::Pixels {
            grid: raster.grid,
            colors,
        })
    }

    async fn start_export(&self, request: &ExportRequest) -> Result<ExportTask, BackendError> {
        let path = self.output_dir.join(request.file_name());
        let task = ExportTask {
            id: format!("local-{}", request.description),
            destination: path.to_string_lossy().to_string(),
        };

        let catalog = Arc::clone(&self.catalog);
        let evaluated = self.cached(&request.image);
        let request = request.clone();
        let handle = task::spawn_blocking(move || catalog.export(&request, evaluated, &path));

        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PendingExport {
                task: task.clone(),
                handle,
            });

        Ok(task)
    }

    fn supports_format(&self, format: ExportFormat) -> bool {
        format == ExportFormat::GeoTiff
    }
}


// -- Tests -------------------------------------------------------------------
