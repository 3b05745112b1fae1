//! `generate` command implementation.

use anyhow::{Context, Result};
use ingestion::WheelTrace;
use tracing::info;

use super::load_blueprint;
use crate::cli::GenerateArgs;

/// Execute the `generate` command
pub fn run_generate(args: &GenerateArgs) -> Result<()> {
    let blueprint = load_blueprint(&args.config)?;

    let mut simulation = blueprint.simulation.clone().unwrap_or_default();
    if let Some(revolutions) = args.revolutions {
        simulation.revolutions = revolutions;
    }

    let edges = WheelTrace::from_config(&blueprint.crank, &simulation).build();
    ingestion::write_trace(&args.out, &edges)
        .with_context(|| format!("Failed to write trace to {}", args.out.display()))?;

    info!(
        out = %args.out.display(),
        edges = edges.len(),
        revolutions = simulation.revolutions,
        "Trace written"
    );
    println!("Wrote {} edges to {}", edges.len(), args.out.display());
    Ok(())
}
