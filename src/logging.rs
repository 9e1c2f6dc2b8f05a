//! Log output for the command line.
//!
//! Events go to stderr so they interleave with the progress spinners and never
//! mix with printed results. `RUST_LOG` overrides the level.

use std::io;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub fn init_logging(verbose: bool) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let default_level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{default_level},reqwest=warn,hyper=warn"))
    });

    let fmt_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(verbose)
        .with_filter(env_filter);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialise logging")
}
