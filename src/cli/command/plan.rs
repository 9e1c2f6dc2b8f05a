use std::path::Path;

use anyhow::Result;

use super::{load_config, make_backend};
use crate::{
    backend::encode,
    cli::{BackendArgs, Overrides},
    pipeline,
};

/// Returns the climatology expression as pretty-printed JSON.
pub async fn plan(config_path: Option<&Path>, args: &BackendArgs, overrides: &Overrides) -> Result<String> {
    let config = load_config(config_path, overrides)?;
    let backend = make_backend(args, &config).await?;

    let plan = pipeline::plan(backend.as_backend(), &config).await?;
    let expression = encode::expression(&plan.climatology);

    Ok(serde_json::to_string_pretty(&expression)?)
}
