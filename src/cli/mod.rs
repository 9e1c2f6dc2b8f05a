//! Command line interface.

pub mod command;

use std::{path::PathBuf, time::Duration};

use clap::{command, Args, Parser, Subcommand, ValueEnum};
use indicatif::ProgressBar;

use crate::backend::earthengine::DEFAULT_BASE_URL;

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Long-term seasonal rainfall climatology for an administrative region
pub struct Cli {
    /// TOML settings file; defaults reproduce the Kenya MAM rainfall run
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the climatology, add the map layer and submit the export
    Run {
        #[command(flatten)]
        backend: BackendArgs,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Print the encoded expression graph without rendering or exporting
    Plan {
        #[command(flatten)]
        backend: BackendArgs,
        #[command(flatten)]
        overrides: Overrides,
    },
    /// Print the legend
    Legend {},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Evaluate in process from local files
    Local,
    /// Earth Engine REST API
    Earthengine,
}

#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
    #[arg(long, value_enum, default_value_t = BackendKind::Local)]
    pub backend: BackendKind,

    /// Daily collection as a long-format Parquet file (local backend)
    #[arg(long)]
    pub collection_file: Option<PathBuf>,

    /// Region boundaries as a GeoJSON FeatureCollection (local backend)
    #[arg(long)]
    pub boundaries_file: Option<PathBuf>,

    /// Where local exports are written; defaults to the home directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Cloud project (Earth Engine backend)
    #[arg(long)]
    pub project: Option<String>,

    /// OAuth access token (Earth Engine backend)
    #[arg(long, env = "EE_ACCESS_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Earth Engine API root
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub api_url: String,
}

#[derive(Args, Debug, Clone, Default)]
pub struct Overrides {
    #[arg(long)]
    pub first_year: Option<i32>,

    #[arg(long)]
    pub last_year: Option<i32>,

    /// Export pixel size in meters
    #[arg(long)]
    pub scale: Option<f64>,

    /// GeoTIFF or TFRecord
    #[arg(long)]
    pub format: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// Drive folder for remote exports
    #[arg(long)]
    pub folder: Option<String>,
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_parse_run_options() {
        let cli = Cli::try_parse_from([
            "mamclim",
            "run",
            "--backend",
            "earthengine",
            "--project",
            "my-project",
            "--token",
            "abc",
            "--scale",
            "1000",
            "--config",
            "kenya.toml",
        ])
        .unwrap();

        assert_eq!(cli.config, Some(PathBuf::from("kenya.toml")));
        match cli.command {
            Commands::Run { backend, overrides } => {
                assert_eq!(backend.backend, BackendKind::Earthengine);
                assert_eq!(backend.project.as_deref(), Some("my-project"));
                assert_eq!(backend.token.as_deref(), Some("abc"));
                assert_eq!(overrides.scale, Some(1000.0));
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn should_default_to_local_backend() {
        let cli = Cli::try_parse_from(["mamclim", "plan"]).unwrap();

        match cli.command {
            Commands::Plan { backend, .. } => assert_eq!(backend.backend, BackendKind::Local),
            _ => panic!("expected plan"),
        }
    }
}
