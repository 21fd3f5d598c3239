// Copyright (c) 2026, Chad Hogan
// All rights reserved.
//
// This source code is licensed under the BSD-3-Clause license found in the
// LICENSE file in the root directory of this source tree.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use okada_disloc::core::regular_grid;
use okada_disloc::io;
use okada_disloc::processor::DislocProcessor;

#[derive(Parser)]
#[command(
    name = "okada-disloc",
    about = "Surface displacement of rectangular dislocation faults (Okada, 1985)"
)]
struct Cli {
    /// Fault model file (.json or .toml)
    #[arg(short = 'm', long)]
    model: PathBuf,

    /// Regular observation grid: e_min,e_max,n_min,n_max,nx,ny
    #[arg(long, conflicts_with = "coords", required_unless_present = "coords")]
    grid: Option<String>,

    /// Observation points, one "easting,northing" per line (.csv)
    #[arg(long)]
    coords: Option<PathBuf>,

    /// Number of worker threads (0 = all cores)
    #[arg(long, default_value = "0")]
    threads: usize,

    /// Also project onto a line of sight: theta,phi in radians
    #[arg(long)]
    los: Option<String>,

    /// Output file path (.csv or .json)
    #[arg(short = 'o', long, default_value = "displacement.csv")]
    output: PathBuf,

    /// Log debug events to stderr
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn parse_floats(s: &str, what: &str) -> Result<Vec<f64>> {
    s.split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("invalid --{}: expected comma-separated numbers", what))
}

fn parse_grid(s: &str) -> Result<((f64, f64), (f64, f64), usize, usize)> {
    let parts = parse_floats(s, "grid")?;
    if parts.len() != 6 {
        bail!(
            "--grid expects e_min,e_max,n_min,n_max,nx,ny, got {} values",
            parts.len()
        );
    }
    let count = |v: f64, name: &str| -> Result<usize> {
        if v.fract() != 0.0 || v < 1.0 {
            bail!("--grid {} must be a positive integer, got {}", name, v);
        }
        Ok(v as usize)
    };
    Ok((
        (parts[0], parts[1]),
        (parts[2], parts[3]),
        count(parts[4], "nx")?,
        count(parts[5], "ny")?,
    ))
}

fn parse_los(s: &str) -> Result<(f64, f64)> {
    let parts = parse_floats(s, "los")?;
    if parts.len() != 2 {
        bail!("--los expects theta,phi, got {} values", parts.len());
    }
    Ok((parts[0], parts[1]))
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let model = io::load_model(&cli.model)
        .with_context(|| format!("loading model {}", cli.model.display()))?;
    if model.sources.is_empty() {
        bail!("model {} has no sources", cli.model.display());
    }

    let coords = match (&cli.grid, &cli.coords) {
        (Some(grid), None) => {
            let (easting, northing, nx, ny) = parse_grid(grid)?;
            regular_grid(easting, northing, nx, ny)?
        }
        (None, Some(path)) => io::load_coordinates(path)
            .with_context(|| format!("loading coordinates {}", path.display()))?,
        _ => bail!("exactly one of --grid or --coords must be given"),
    };
    let los = cli.los.as_deref().map(parse_los).transpose()?;

    let result = DislocProcessor::new().process(&model.as_sources(), coords.view(), cli.threads)?;
    let los = los.map(|(theta, phi)| result.line_of_sight(theta, phi));

    io::save_result(&result, coords.view(), los.as_ref(), &cli.output)
        .with_context(|| format!("writing {}", cli.output.display()))?;
    info!(
        points = result.len(),
        output = %cli.output.display(),
        "displacement written"
    );

    Ok(())
}
