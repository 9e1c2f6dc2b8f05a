use std::path::Path;

use anyhow::Result;

use super::load_config;
use crate::{cli::Overrides, legend::Legend};

pub fn legend(config_path: Option<&Path>) -> Result<String> {
    let config = load_config(config_path, &Overrides::default())?;
    let vis = config.visualization.vis_params()?;
    let legend = Legend::build(&config.legend.title, &vis.palette, &config.legend.labels)?;

    Ok(legend.to_string())
}

// -- Tests -------------------------------------------------------------------
