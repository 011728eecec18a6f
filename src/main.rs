//! Solve the configured design and print the summary.
//!
//! Reads `icarus.toml` from the working directory when present, otherwise
//! solves the baseline.  Progress goes to stderr (`RUST_LOG` controls the
//! level); the summary goes to stdout.

use anyhow::{Context, Result};
use icarus::{AircraftDesign, DesignConfig};
use std::path::Path;
use tracing_subscriber::EnvFilter;

const CONFIG_FILE: &str = "icarus.toml";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("icarus=info")))
        .with_writer(std::io::stderr)
        .init();

    let config = if Path::new(CONFIG_FILE).exists() {
        tracing::info!(path = CONFIG_FILE, "loading configuration");
        DesignConfig::from_path(CONFIG_FILE).with_context(|| format!("failed to load {CONFIG_FILE}"))?
    } else {
        DesignConfig::baseline()
    };

    let design = AircraftDesign::build(&config).context("failed to build the design model")?;
    let outcome = design.solve().context("solver could not start")?;
    let report = design.report(&outcome).context("failed to resolve the solution")?;
    print!("{report}");
    Ok(())
}
