pub mod legend;
pub mod plan;
pub mod run;

use std::path::Path;

use anyhow::{anyhow, Result};

pub use legend::legend;
pub use plan::plan;
pub use run::run;

use crate::{
    backend::{Backend, EarthEngineBackend, LocalBackend},
    cli::{create_spinner, BackendArgs, BackendKind, Overrides},
    config::PipelineConfig,
};

/// Reads the settings file, if any, and applies command line overrides.
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<PipelineConfig> {
    let mut config = match path {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(first_year) = overrides.first_year {
        config.season.first_year = first_year;
    }
    if let Some(last_year) = overrides.last_year {
        config.season.last_year = last_year;
    }
    if let Some(scale) = overrides.scale {
        config.export.scale = scale;
    }
    if let Some(format) = &overrides.format {
        config.export.format.clone_from(format);
    }
    if let Some(description) = &overrides.description {
        config.export.description.clone_from(description);
    }
    if overrides.folder.is_some() {
        config.export.folder.clone_from(&overrides.folder);
    }

    Ok(config)
}

pub enum SelectedBackend {
    Local(LocalBackend),
    EarthEngine(EarthEngineBackend),
}

impl SelectedBackend {
    pub fn as_backend(&self) -> &dyn Backend {
        match self {
            SelectedBackend::Local(backend) => backend,
            SelectedBackend::EarthEngine(backend) => backend,
        }
    }
}

/// Builds the backend named on the command line. The local backend loads its
/// collection and boundaries up front under the ids the settings refer to.
pub async fn make_backend(args: &BackendArgs, config: &PipelineConfig) -> Result<SelectedBackend> {
    match args.backend {
        BackendKind::Local => {
            let collection_file = args
                .collection_file
                .clone()
                .ok_or_else(|| anyhow!("--collection-file is required with the local backend"))?;
            let boundaries_file = args
                .boundaries_file
                .clone()
                .ok_or_else(|| anyhow!("--boundaries-file is required with the local backend"))?;
            let collection_id = config.collection.id.clone();
            let dataset = config.region.dataset.clone();

            let bar = create_spinner("Loading local data...".to_string());
            let mut backend = tokio::task::spawn_blocking(move || {
                LocalBackend::new()
                    .with_collection_file(&collection_id, &collection_file)?
                    .with_features_file(&dataset, &boundaries_file)
            })
            .await??;
            bar.finish_with_message("Local data loaded");

            if let Some(output_dir) = &args.output_dir {
                backend = backend.with_output_dir(output_dir);
            }

            Ok(SelectedBackend::Local(backend))
        }
        BackendKind::Earthengine => {
            let project = args
                .project
                .as_deref()
                .ok_or_else(|| anyhow!("--project is required with the Earth Engine backend"))?;
            let token = args.token.as_deref().ok_or_else(|| {
                anyhow!("--token or EE_ACCESS_TOKEN is required with the Earth Engine backend")
            })?;

            Ok(SelectedBackend::EarthEngine(
                EarthEngineBackend::new(project, token).with_base_url(&args.api_url),
            ))
        }
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use super::*;
    use crate::backend::earthengine::DEFAULT_BASE_URL;

    fn local_args() -> BackendArgs {
        BackendArgs {
            backend: BackendKind::Local,
            collection_file: None,
            boundaries_file: None,
            output_dir: None,
            project: None,
            token: None,
            api_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    #[test]
    fn should_apply_overrides() {
        let overrides = Overrides {
            first_year: Some(1991),
            last_year: Some(2020),
            scale: Some(1000.0),
            format: Some("TFRecord".to_string()),
            description: Some("MAM_1991_2020".to_string()),
            folder: Some("exports".to_string()),
        };

        let config = load_config(None, &overrides).unwrap();

        assert_eq!(config.season.years().unwrap().len(), 30);
        assert_eq!(config.export.scale, 1000.0);
        assert_eq!(config.export.format, "TFRecord");
        assert_eq!(config.export.description, "MAM_1991_2020");
        assert_eq!(config.export.folder.as_deref(), Some("exports"));
    }

    #[test]
    fn should_keep_defaults_without_overrides() {
        let config = load_config(None, &Overrides::default()).unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[tokio::test]
    async fn should_require_local_data_files() {
        let config = PipelineConfig::default();

        let result = make_backend(&local_args(), &config).await;
        assert!(result.is_err());

        let args = BackendArgs {
            collection_file: Some(PathBuf::from("/nonexistent/daily.parquet")),
            boundaries_file: Some(PathBuf::from("/nonexistent/gaul.geojson")),
            ..local_args()
        };
        assert!(make_backend(&args, &config).await.is_err());
    }

    #[tokio::test]
    async fn should_require_project_and_token_for_earth_engine() {
        let config = PipelineConfig::default();
        let args = BackendArgs {
            backend: BackendKind::Earthengine,
            project: Some("my-project".to_string()),
            ..local_args()
        };

        assert!(make_backend(&args, &config).await.is_err());

        let args = BackendArgs {
            token: Some("abc".to_string()),
            ..args
        };
        let backend = make_backend(&args, &config).await.unwrap();
        assert_eq!(backend.as_backend().name(), "earthengine");
    }
}
