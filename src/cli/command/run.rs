use std::path::Path;

use anyhow::{anyhow, Result};

use super::{load_config, make_backend, SelectedBackend};
use crate::{
    backend::{Backend, LayerSource},
    cli::{create_spinner, BackendArgs, Overrides},
    pipeline::{self, PipelineOutcome},
    raster::RasterSummary,
};

pub async fn run(config_path: Option<&Path>, args: &BackendArgs, overrides: &Overrides) -> Result<String> {
    let config = load_config(config_path, overrides)?;
    let backend = make_backend(args, &config).await?;

    let outcome = pipeline::run(backend.as_backend(), &config).await?;
    print_summary(&outcome);

    match &backend {
        // Local exports run in the background; wait so the file exists on exit.
        SelectedBackend::Local(local) => {
            // Already evaluated for the map layer, so this is a lookup.
            let raster = local.compute(&outcome.plan.climatology).await?;
            println!("{}", describe(&raster.summary()));

            let bar = create_spinner("Writing export...".to_string());
            let outcomes = local.finish().await;
            bar.finish_with_message("Export finished");

            let finished = outcomes
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("export task {} was lost", outcome.task.id))?;
            let path = finished.result?;

            Ok(path.to_string_lossy().to_string())
        }
        SelectedBackend::EarthEngine(_) => Ok(format!(
            "{} (task {})",
            outcome.task.destination, outcome.task.id
        )),
    }
}

fn print_summary(outcome: &PipelineOutcome) {
    println!(
        "{}: {} seasonal composites averaged",
        outcome.plan.region.name, outcome.plan.composites
    );

    for layer in &outcome.map.layers {
        match &layer.source {
            LayerSource::Tiles { url_template } => println!("Layer `{}`: {}", layer.name, url_template),
            LayerSource::Pixels { grid, colors } => println!(
                "Layer `{}`: {}x{} pixels, {} with data",
                layer.name,
                grid.width,
                grid.height,
                colors.iter().flatten().count()
            ),
        }
    }

    print!("{}", outcome.legend);
}

fn describe(summary: &RasterSummary) -> String {
    let coverage = format!("{}/{} pixels with data", summary.defined, summary.pixels);
    match (summary.min, summary.max, summary.mean) {
        (Some(min), Some(max), Some(mean)) => {
            format!("Climatology: {coverage}, min {min:.1}, max {max:.1}, mean {mean:.1} mm")
        }
        _ => format!("Climatology: {coverage}"),
    }
}

// -- Tests -------------------------------------------------------------------
