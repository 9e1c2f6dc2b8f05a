//! The seasonal climatology workflow, end to end.
//!
//! Settings are checked in full before the backend is first contacted. After
//! that the steps run in order: resolve the region, build one composite per
//! year, average them, add the map layer and legend, submit the export.

use tracing::info;

use crate::{
    backend::{Backend, ExportTask},
    cli::create_spinner,
    climatology::climatology,
    config::PipelineConfig,
    error::{ConfigError, PipelineResult},
    export::{self, validate_description, validate_scale, ExportFormat, ExportRequest},
    expr::{DateRange, Image, ImageCollection},
    legend::{Legend, VisParams},
    region::{self, Region},
    render::MapContext,
    season::{seasonal_composites, year_windows, SeasonWindow, YearRange},
};

/// Settings that passed validation.
#[derive(Debug, Clone)]
pub struct Validated {
    pub range: DateRange,
    pub years: YearRange,
    pub window: SeasonWindow,
    pub vis: VisParams,
    pub legend: Legend,
    pub format: ExportFormat,
}

/// Checks every setting without touching the backend.
pub fn validate(config: &PipelineConfig, backend: &dyn Backend) -> Result<Validated, ConfigError> {
    let vis = config.visualization.vis_params()?;
    let legend = Legend::build(&config.legend.title, &vis.palette, &config.legend.labels)?;

    let range = config.collection.date_range()?;
    let years = config.season.years()?;
    let window = config.season.window();
    year_windows(years, &window)?;

    validate_scale(config.export.scale)?;
    validate_description(&config.export.description)?;
    let format: ExportFormat = config.export.format.parse()?;
    if !backend.supports_format(format) {
        return Err(ConfigError::FormatNotAvailable {
            backend: backend.name().to_string(),
            format: format.to_string(),
        });
    }

    Ok(Validated {
        range,
        years,
        window,
        vis,
        legend,
        format,
    })
}

/// The expression graph for a resolved region, before anything is rendered.
#[derive(Debug, Clone)]
pub struct Plan {
    pub region: Region,
    pub composites: usize,
    pub climatology: Image,
}

#[derive(Debug)]
pub struct PipelineOutcome {
    pub plan: Plan,
    pub legend: Legend,
    pub map: MapContext,
    pub task: ExportTask,
}

async fn build(
    backend: &dyn Backend,
    config: &PipelineConfig,
    settings: &Validated,
) -> PipelineResult<Plan> {
    let bar = create_spinner(format!("Resolving {}...", config.region.value));
    let region = region::resolve(backend, &config.region).await?;
    bar.finish_with_message(format!("Resolved {}", region.name));

    let collection = ImageCollection::load(&config.collection.id)
        .filter_bounds(&region.geometry)
        .filter_date(settings.range);

    let composites = seasonal_composites(&collection, settings.years, &settings.window)?;
    let count = composites.len();
    info!(
        composites = count,
        season = %settings.window,
        first = settings.years.first,
        last = settings.years.last,
        "seasonal composites built"
    );
    let climatology = climatology(composites, &region.geometry)?;

    Ok(Plan {
        region,
        composites: count,
        climatology,
    })
}

/// Resolves the region and builds the climatology expression. Nothing is
/// rendered or exported.
pub async fn plan(backend: &dyn Backend, config: &PipelineConfig) -> PipelineResult<Plan> {
    let settings = validate(config, backend)?;
    build(backend, config, &settings).await
}

/// Runs the whole workflow and returns once the export has been submitted.
pub async fn run(backend: &dyn Backend, config: &PipelineConfig) -> PipelineResult<PipelineOutcome> {
    let settings = validate(config, backend)?;
    let plan = build(backend, config, &settings).await?;

    let mut map = MapContext::new();
    map.center_on(&plan.region.geometry, config.map.zoom);

    let bar = create_spinner("Rendering map layer...".to_string());
    map.add_layer(backend, &plan.climatology, &settings.vis, &config.map.layer_name)
        .await?;
    map.add_widget(settings.legend.to_panel());
    bar.finish_with_message("Map layer ready");

    let request = ExportRequest::new(
        plan.climatology.clone(),
        &config.export.description,
        &plan.region.geometry,
        config.export.scale,
        &config.export.format,
    )?
    .with_folder(config.export.folder.clone())
    .with_max_pixels(config.export.max_pixels);

    let bar = create_spinner(format!("Submitting {} export...", settings.format));
    let task = export::submit(backend, &request).await?;
    bar.finish_with_message(format!("Export submitted as {}", task.id));

    Ok(PipelineOutcome {
        plan,
        legend: settings.legend,
        map,
        task,
    })
}

// -- Tests -------------------------------------------------------------------
