//! `run` command implementation.

use anyhow::{Context, Result};
use tracing::info;

use super::load_blueprint;
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig, TraceSource};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");
    let blueprint = load_blueprint(&args.config)?;

    info!(
        wheel = ?blueprint.crank.wheel,
        teeth_till_gap = blueprint.crank.teeth_till_gap,
        teeth_in_gap = blueprint.crank.teeth_in_gap,
        dependents = blueprint.links.dependents.len(),
        "Configuration loaded"
    );

    let trace = resolve_trace(args, &blueprint)?;

    // Dry run - just validate and exit
    if args.dry_run {
        info!(trace = ?trace, "Dry run mode - configuration is valid, exiting");
        return Ok(());
    }

    // Initialize Metrics (optional)
    if args.metrics_port != 0 {
        observability::install_exporter(args.metrics_port)?;
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        trace,
        max_events: (args.max_events != 0).then_some(args.max_events),
        run_out: args.run_out,
    });

    info!("Starting engine run...");
    let stats = pipeline.run().await.context("Engine run failed")?;

    if args.json {
        let json = serde_json::to_string_pretty(&stats.report())
            .context("Failed to serialize run report")?;
        println!("{}", json);
    } else {
        stats.print_summary();
    }

    info!("Crank Sync finished");
    Ok(())
}

/// A recorded trace wins over the configured simulation
fn resolve_trace(
    args: &RunArgs,
    blueprint: &contracts::EngineBlueprint,
) -> Result<TraceSource, CliError> {
    if let Some(ref path) = args.trace {
        return Ok(TraceSource::Recorded(path.clone()));
    }
    let mut simulation = blueprint
        .simulation
        .clone()
        .ok_or_else(|| CliError::no_trace_source(args.config.display().to_string()))?;
    if let Some(revolutions) = args.revolutions {
        info!(revolutions, "Overriding revolutions from CLI");
        simulation.revolutions = revolutions;
    }
    Ok(TraceSource::Synthetic(simulation))
}
